#![warn(missing_docs)]

//! Btserial is a thin cross-platform binding to native Bluetooth Serial Port Profile (SPP) stacks for [Rust].
//!
//! Radio handling, pairing and socket I/O are done by a platform [`Transport`]. Btserial forwards calls to it,
//! multiplexes the events it emits to application listeners, and turns outbound text into fixed-size packets in a
//! legacy single-byte code page, which is what most serial peripherals (receipt printers, fiscal devices, embedded
//! displays) expect.
//!
//! [Rust]: https://www.rust-lang.org/
//!
//! # Usage
//!
//! ```rust
//!# use btserial::{listener, BluetoothSerial, Device, EventName, MemoryTransport};
//!# #[tokio::main]
//!# async fn main() -> Result<(), btserial::Error> {
//!let transport = MemoryTransport::new().with_paired(Device::new("98:D3:31:F5:1A:2B", "HC-06"));
//!let mut serial = BluetoothSerial::new(transport);
//!
//!serial.on(EventName::ConnectionLost, listener(|event| println!("{event:?}")))?;
//!
//!let devices = serial.list().await?;
//!serial.connect(devices[0].id()).await?;
//!
//!// 12 bytes in windows-1250, padded to one 64-byte packet
//!let packets = serial.write_packets("PRINT Łódź\r\n").await?;
//!assert_eq!(packets, 1);
//!#
//!#    Ok(())
//!# }
//! ```
//!
//! # Overview
//!
//! - [`BluetoothSerial`] is the application handle. It owns one transport, the listeners subscribed through it, and
//!   a [`SerialConfig`].
//! - [`PacketWriter`] encodes a message, cuts it into space-padded packets of [`PacketSize`] bytes and writes them
//!   strictly in order, stopping at the first failed write.
//! - [`EventRegistry`] records which listeners are subscribed to which [`EventName`] and removes them exactly, by
//!   name, or all at once.
//! - [`Transport`] is the native capability contract. [`ListenerSet`] is the dispatch table implementations deliver
//!   events through.
//!
//! # Transports
//!
//! [`MemoryTransport`] runs entirely in process. It records writes, fails writes on request and emits events on
//! demand, which makes it the transport of choice for tests.
//!
//! On Linux the `bluez` feature adds `BluezTransport`, which opens RFCOMM sockets through BlueZ. It requires the Tokio
//! runtime.
//!
//! # Feature flags
//!
//! - `serde`: serializing/deserializing configuration, device identifiers and event names
//! - `bluez`: the BlueZ backend (Linux only)

pub mod btuuid;
mod buffer;
mod codepage;
mod config;
mod device;
pub mod error;
mod event;
mod memory;
mod packet;
mod registry;
mod serial;
mod transport;

#[cfg(all(target_os = "linux", feature = "bluez"))]
mod bluer;

#[cfg(all(target_os = "linux", feature = "bluez"))]
pub use crate::bluer::{BluezConfig, BluezTransport};
pub use buffer::DelimitedBuffer;
pub use codepage::{CodePage, UnmappablePolicy};
pub use config::SerialConfig;
pub use device::{Device, DeviceId};
pub use error::{Error, ErrorKind};
pub use event::{listener, Event, EventName, Listener, ListenerSet};
pub use memory::MemoryTransport;
pub use packet::{packetize, Packet, PacketSize, PacketWriter, Packets, Payload, PADDING};
pub use registry::EventRegistry;
pub use serial::BluetoothSerial;
pub use transport::{ConnectionInfo, Transport};
pub use uuid::Uuid;

/// Convenience alias for a result with [`Error`]
pub type Result<T, E = Error> = core::result::Result<T, E>;
