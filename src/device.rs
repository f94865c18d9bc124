/// A platform-specific device identifier.
///
/// On Android and Linux it contains the Bluetooth address in the format `AB:CD:EF:01:23:45`. On iOS it is the
/// peripheral UUID assigned by CoreBluetooth.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates an identifier from its platform-specific string form
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        DeviceId(id)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        DeviceId(id.to_owned())
    }
}

/// A snapshot of a remote Bluetooth device, as returned by a device listing or a discovery run.
///
/// Devices are not owned by this crate. A new listing replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Device {
    id: DeviceId,
    name: String,
    class: Option<u32>,
}

impl Device {
    /// Creates a device snapshot
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        Device {
            id: id.into(),
            name: name.into(),
            class: None,
        }
    }

    /// Attaches the Bluetooth class of device reported by the platform
    pub fn with_class(mut self, class: u32) -> Self {
        self.class = Some(class);
        self
    }

    /// This device's identifier
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// The display name for this device
    ///
    /// This is the name assigned by the OS or read from the device. It may be empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The Bluetooth class of device, if the platform reports one
    pub fn class(&self) -> Option<u32> {
        self.class
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "<{}>", self.id)
        } else {
            write!(f, "{}<{}>", self.name, self.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_display_matches_list_format() {
        let device = Device::new("00:11:22:33:44:55", "HC-06");
        assert_eq!(device.to_string(), "HC-06<00:11:22:33:44:55>");
        assert_eq!(Device::new("AA:BB:CC:DD:EE:FF", "").to_string(), "<AA:BB:CC:DD:EE:FF>");
    }

    #[test]
    fn class_is_optional() {
        let device = Device::new("00:11:22:33:44:55", "printer");
        assert_eq!(device.class(), None);
        assert_eq!(device.with_class(0x1f00).class(), Some(0x1f00));
    }
}
