//! BlueZ backend
//!
//! Serial links are RFCOMM sockets opened through the `bluer` crate. Adapter power changes are watched in a
//! background task and forwarded as [`BluetoothEnabled`][crate::Event::BluetoothEnabled] and
//! [`BluetoothDisabled`][crate::Event::BluetoothDisabled] events.
//!
//! The backend requires a Tokio runtime.

mod error;
mod transport;

pub use transport::{BluezConfig, BluezTransport};
