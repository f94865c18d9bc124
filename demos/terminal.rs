use std::error::Error;

use btserial::{listener, BluetoothSerial, BluezTransport, DeviceId, Event, EventName, SerialConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing::metadata::LevelFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let address = std::env::args().nth(1).ok_or("usage: terminal <device address>")?;

    let transport = BluezTransport::default_adapter().await?;
    let mut serial = BluetoothSerial::with_config(transport, SerialConfig::default().delimiter("\r\n"));
    if !serial.is_enabled().await? {
        serial.enable().await?;
    }

    serial.on(
        EventName::Data,
        listener(|event| {
            if let Event::Data { data, .. } = event {
                print!("{data}");
            }
        }),
    )?;
    serial.on(EventName::ConnectionLost, listener(|event| info!("{:?}", event)))?;

    let info = serial.connect(&DeviceId::new(address)).await?;
    info!("{}", info.message);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !serial.is_connected().await? {
            break;
        }
        serial.write_packets(&format!("{line}\r\n")).await?;
    }

    serial.disconnect().await?;
    info!("disconnected!");

    Ok(())
}
