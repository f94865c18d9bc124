//! Bluetooth service class UUIDs used by serial links

use uuid::Uuid;

/// This is the Bluetooth Base UUID. It is used with 16-bit UUIDs
/// [defined](https://www.bluetooth.com/specifications/assigned-numbers/) by the Bluetooth SIG.
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Const function to create a 16-bit Bluetooth UUID
pub const fn bluetooth_uuid_from_u16(uuid: u16) -> Uuid {
    Uuid::from_u128(((uuid as u128) << 96) | BLUETOOTH_BASE_UUID)
}

/// Returns the 16-bit short form of `uuid`, if it has one
pub fn try_to_u16(uuid: &Uuid) -> Option<u16> {
    let u = uuid.as_u128();
    let short = (u & ((1 << 96) - 1)) == BLUETOOTH_BASE_UUID && ((u >> 96) as u32) & 0xffff0000 == 0;
    short.then_some((u >> 96) as u16)
}

/// Serial Port Profile, the service connected to by default
pub const SERIAL_PORT: Uuid = bluetooth_uuid_from_u16(0x1101);

/// Dial-up Networking
pub const DIALUP_NETWORKING: Uuid = bluetooth_uuid_from_u16(0x1103);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_port_uuid() {
        assert_eq!(
            SERIAL_PORT,
            Uuid::parse_str("00001101-0000-1000-8000-00805F9B34FB").unwrap()
        );
        assert_eq!(try_to_u16(&SERIAL_PORT), Some(0x1101));
        assert_eq!(try_to_u16(&Uuid::from_u128(0x1234)), None);
        assert_eq!(try_to_u16(&Uuid::from_u128((0x1_0000u128 << 96) | BLUETOOTH_BASE_UUID)), None);
    }
}
