//! Serial link configuration

use crate::codepage::{CodePage, UnmappablePolicy};
use crate::packet::PacketSize;
use crate::{btuuid, Uuid};

/// Settings used by [`BluetoothSerial`][crate::BluetoothSerial] for writes, reads and connections.
///
/// ```
/// # use btserial::{CodePage, PacketSize, SerialConfig};
/// let config = SerialConfig::default()
///     .packet_size(PacketSize::new(20)?)
///     .code_page(CodePage::for_label("cp1251")?)
///     .delimiter("\r\n");
/// assert_eq!(config.packet_size.get(), 20);
/// # Ok::<(), btserial::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SerialConfig {
    /// Size of every packet sent by `write_packets`
    pub packet_size: PacketSize,
    /// Code page text payloads are encoded with. It is handed to the transport on connect and decodes `data` events.
    pub code_page: CodePage,
    /// How characters outside the code page are handled
    pub unmappable: UnmappablePolicy,
    /// Delimiter inbound bytes are split on. Empty means every read is delivered as is.
    pub delimiter: String,
    /// Service class connected to by [`connect`][crate::BluetoothSerial::connect]
    pub service_uuid: Uuid,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            packet_size: PacketSize::DEFAULT,
            code_page: CodePage::default(),
            unmappable: UnmappablePolicy::default(),
            delimiter: String::new(),
            service_uuid: btuuid::SERIAL_PORT,
        }
    }
}

impl SerialConfig {
    /// Sets the packet size
    pub fn packet_size(mut self, packet_size: PacketSize) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// Sets the code page
    pub fn code_page(mut self, code_page: CodePage) -> Self {
        self.code_page = code_page;
        self
    }

    /// Sets the unmappable character policy
    pub fn unmappable(mut self, policy: UnmappablePolicy) -> Self {
        self.unmappable = policy;
        self
    }

    /// Sets the receive delimiter
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Sets the service UUID
    pub fn service_uuid(mut self, service_uuid: Uuid) -> Self {
        self.service_uuid = service_uuid;
        self
    }
}
