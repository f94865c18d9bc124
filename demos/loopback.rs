use std::error::Error;

use btserial::{listener, BluetoothSerial, Device, Event, EventName, MemoryTransport, PacketSize, SerialConfig};
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

    let transport = MemoryTransport::new().with_paired(Device::new("98:D3:31:F5:1A:2B", "HC-06"));
    let config = SerialConfig::default().packet_size(PacketSize::new(20)?);
    let mut serial = BluetoothSerial::with_config(transport, config);

    let on_event = listener(|event| match event {
        Event::Data { data, .. } => info!("received {:?}", data),
        other => info!("{:?}", other),
    });
    serial.on(EventName::ConnectionSuccess, on_event.clone())?;
    serial.on(EventName::ConnectionLost, on_event.clone())?;
    serial.on(EventName::Data, on_event)?;
    serial.with_delimiter("\n").await?;

    let device = serial.list().await?.into_iter().next().ok_or("no paired device")?;
    info!("connecting to {}", device);
    serial.connect(device.id()).await?;

    let packets = serial.write_packets("Zażółć gęślą jaźń\nPchnąć w tę łódź jeża\n").await?;
    info!("sent {} packets", packets);
    for (i, packet) in serial.transport().writes().iter().enumerate() {
        info!("packet {}: {:02x?}", i, packet);
    }

    // Echo everything back as if the device answered
    for packet in serial.transport().writes() {
        serial.transport().receive(&packet)?;
    }

    serial.transport().drop_connection();
    serial.remove_all_listeners();

    Ok(())
}
