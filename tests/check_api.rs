#![allow(clippy::let_unit_value)]

use btserial::*;

fn assert_send<T: Send>(t: T) -> T {
    t
}

async fn check_adapter_apis<T: Transport>(serial: &BluetoothSerial<T>) -> Result<Device> {
    let _enabled: Result<bool> = assert_send(serial.is_enabled()).await;
    let _enabled: Result<bool> = assert_send(serial.enable()).await;
    let _enabled: Result<bool> = assert_send(serial.request_enable()).await;
    let _disabled: Result<bool> = assert_send(serial.disable()).await;
    let _name: Result<String> = assert_send(serial.adapter_name()).await;
    let _res: Result<bool> = assert_send(serial.set_adapter_name("printer-host")).await;

    let devices: Result<Vec<Device>> = assert_send(serial.list()).await;
    let _unpaired: Result<Vec<Device>> = assert_send(serial.discover_unpaired_devices()).await;
    let _cancelled: Result<bool> = assert_send(serial.cancel_discovery()).await;
    let _visible: Result<bool> = assert_send(serial.make_discoverable(std::time::Duration::from_secs(120))).await;

    Ok(devices?.into_iter().next().unwrap())
}

async fn check_device_apis<T: Transport>(serial: &BluetoothSerial<T>, device: &Device) -> Result<()> {
    let _paired: Result<bool> = assert_send(serial.pair_device(device.id())).await;
    let _info: Result<ConnectionInfo> = assert_send(serial.connect(device.id())).await;
    let _info: Result<ConnectionInfo> =
        assert_send(serial.connect_with_service(device.id(), btuuid::DIALUP_NETWORKING)).await;
    let _connected: Result<bool> = assert_send(serial.is_connected()).await;
    let _res: Result<()> = assert_send(serial.disconnect()).await;
    let _listening: Result<bool> = assert_send(serial.listen_for_incoming_connections("printer-host")).await;
    let _listening: Result<bool> =
        assert_send(serial.listen_for_incoming_connections_with_service("printer-host", btuuid::SERIAL_PORT)).await;
    let _stopped: Result<bool> = assert_send(serial.stop_listening()).await;
    let _unpaired: Result<bool> = assert_send(serial.unpair_device(device.id())).await;

    Ok(())
}

async fn check_write_apis<T: Transport>(serial: &BluetoothSerial<T>) -> Result<()> {
    let _ack: Result<bool> = assert_send(serial.write("text")).await;
    let _ack: Result<bool> = assert_send(serial.write(&[0x1bu8, 0x40])).await;
    let _count: Result<usize> = assert_send(serial.write_packets("text")).await;
    let _count: Result<usize> = assert_send(serial.write_packets_with_size(b"bytes", PacketSize::new(20)?)).await;

    let writer = PacketWriter::new(serial.transport()).packet_size(PacketSize::DEFAULT);
    let _count: Result<usize> = assert_send(writer.write_packets("text")).await;

    Ok(())
}

#[allow(unused)]
async fn check_apis() -> Result<()> {
    let mut serial = BluetoothSerial::new(MemoryTransport::new());
    let device = check_adapter_apis(&serial).await?;
    check_device_apis(&serial, &device).await?;
    check_write_apis(&serial).await?;

    let _res: Result<()> = assert_send(serial.with_delimiter("\r\n")).await;
    let _res: Result<()> = assert_send(serial.with_code_page(CodePage::default())).await;

    Ok(())
}

#[cfg(all(target_os = "linux", feature = "bluez"))]
#[allow(unused)]
async fn check_bluez_apis() -> Result<()> {
    let transport: Result<BluezTransport> = assert_send(BluezTransport::new(BluezConfig::default())).await;
    let serial = BluetoothSerial::new(transport?);
    let device = check_adapter_apis(&serial).await?;
    check_device_apis(&serial, &device).await?;
    check_write_apis(&serial).await?;

    Ok(())
}

fn main() {}
