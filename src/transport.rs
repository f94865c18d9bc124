//! The native capability contract.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ErrorKind;
use crate::{CodePage, Device, DeviceId, EventName, Listener, Result, Uuid};

/// Result of a successful [`Transport::connect`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionInfo {
    /// Address of the connected device
    pub remote_address: String,
    /// Human readable status from the native layer, e.g. `Connected to HC-06`
    pub message: String,
}

/// A native Bluetooth serial stack.
///
/// This is the seam platform backends plug into. Implementations perform the actual radio, pairing and socket work;
/// this crate only forwards calls and multiplexes the events they emit.
///
/// Events are delivered by invoking the listeners registered with [`on`][Transport::on]. Implementations usually keep
/// them in a [`ListenerSet`][crate::ListenerSet].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Lists previously paired (bonded) devices
    async fn list(&self) -> Result<Vec<Device>>;

    /// Runs a discovery pass and returns the unpaired devices that were found
    async fn discover_unpaired_devices(&self) -> Result<Vec<Device>>;

    /// Cancels a running discovery pass
    async fn cancel_discovery(&self) -> Result<bool> {
        Ok(true)
    }

    /// Whether the adapter is powered on
    async fn is_enabled(&self) -> Result<bool>;

    /// Powers the adapter on
    ///
    /// # Platform specifics
    ///
    /// Only Android allows applications to toggle the adapter. The default implementation fails with
    /// [`TransportUnavailable`][ErrorKind::TransportUnavailable].
    async fn enable(&self) -> Result<bool> {
        Err(crate::Error::new(
            ErrorKind::TransportUnavailable,
            None,
            "enabling Bluetooth is not supported on this platform",
        ))
    }

    /// Powers the adapter off
    ///
    /// The default implementation fails with [`TransportUnavailable`][ErrorKind::TransportUnavailable].
    async fn disable(&self) -> Result<bool> {
        Err(crate::Error::new(
            ErrorKind::TransportUnavailable,
            None,
            "disabling Bluetooth is not supported on this platform",
        ))
    }

    /// Asks the user to power the adapter on
    ///
    /// Defaults to [`enable`][Transport::enable].
    async fn request_enable(&self) -> Result<bool> {
        self.enable().await
    }

    /// Opens a serial connection to the device with the given id and service UUID
    async fn connect(&self, id: &DeviceId, service: Uuid) -> Result<ConnectionInfo>;

    /// Closes the active connection, if any
    async fn disconnect(&self) -> Result<()>;

    /// Whether a serial connection is active
    async fn is_connected(&self) -> Result<bool>;

    /// Writes `bytes` to the active connection
    ///
    /// Returns the native acknowledgement.
    async fn write(&self, bytes: &[u8]) -> Result<bool>;

    /// Sets the delimiter used to split inbound bytes into [`Data`][crate::Event::Data] events
    async fn set_delimiter(&self, delimiter: &str) -> Result<()>;

    /// Sets the code page inbound chunks are decoded with for [`Data`][crate::Event::Data] events
    async fn set_code_page(&self, code_page: CodePage) -> Result<()>;

    /// Accepts connections from remote devices on a server socket advertised as `service_name`/`service`.
    ///
    /// Accepted connections replace the active one and are reported as
    /// [`ConnectionSuccess`][crate::Event::ConnectionSuccess] with `is_incoming` set. Fails with
    /// [`AlreadyListening`][ErrorKind::AlreadyListening] if a server socket is already open.
    async fn listen_for_incoming_connections(&self, _service_name: &str, _service: Uuid) -> Result<bool> {
        Err(ErrorKind::NotSupported.into())
    }

    /// Closes the server socket opened by [`listen_for_incoming_connections`][Self::listen_for_incoming_connections].
    ///
    /// The active connection is left open. Returns `false` if nothing was listening.
    async fn stop_listening(&self) -> Result<bool> {
        Err(ErrorKind::NotSupported.into())
    }

    /// Makes the adapter visible to discovery for `duration`
    async fn make_discoverable(&self, _duration: Duration) -> Result<bool> {
        Err(ErrorKind::NotSupported.into())
    }

    /// Pairs with the device with the given id
    async fn pair_device(&self, _id: &DeviceId) -> Result<bool> {
        Err(ErrorKind::NotSupported.into())
    }

    /// Removes the pairing with the device with the given id
    async fn unpair_device(&self, _id: &DeviceId) -> Result<bool> {
        Err(ErrorKind::NotSupported.into())
    }

    /// Sets the name this adapter is visible under
    async fn set_adapter_name(&self, _name: &str) -> Result<bool> {
        Err(ErrorKind::NotSupported.into())
    }

    /// The name this adapter is visible under
    async fn adapter_name(&self) -> Result<String> {
        Err(ErrorKind::NotSupported.into())
    }

    /// Registers a native listener for `name`
    ///
    /// Each call is a separate registration.
    fn on(&self, name: EventName, listener: Listener) -> Result<()>;

    /// Removes one native registration of `listener` for `name`
    ///
    /// Removing a registration that does not exist is not an error.
    fn off(&self, name: EventName, listener: &Listener) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn list(&self) -> Result<Vec<Device>> {
        (**self).list().await
    }

    async fn discover_unpaired_devices(&self) -> Result<Vec<Device>> {
        (**self).discover_unpaired_devices().await
    }

    async fn cancel_discovery(&self) -> Result<bool> {
        (**self).cancel_discovery().await
    }

    async fn is_enabled(&self) -> Result<bool> {
        (**self).is_enabled().await
    }

    async fn enable(&self) -> Result<bool> {
        (**self).enable().await
    }

    async fn disable(&self) -> Result<bool> {
        (**self).disable().await
    }

    async fn request_enable(&self) -> Result<bool> {
        (**self).request_enable().await
    }

    async fn connect(&self, id: &DeviceId, service: Uuid) -> Result<ConnectionInfo> {
        (**self).connect(id, service).await
    }

    async fn disconnect(&self) -> Result<()> {
        (**self).disconnect().await
    }

    async fn is_connected(&self) -> Result<bool> {
        (**self).is_connected().await
    }

    async fn write(&self, bytes: &[u8]) -> Result<bool> {
        (**self).write(bytes).await
    }

    async fn set_delimiter(&self, delimiter: &str) -> Result<()> {
        (**self).set_delimiter(delimiter).await
    }

    async fn set_code_page(&self, code_page: CodePage) -> Result<()> {
        (**self).set_code_page(code_page).await
    }

    async fn listen_for_incoming_connections(&self, service_name: &str, service: Uuid) -> Result<bool> {
        (**self).listen_for_incoming_connections(service_name, service).await
    }

    async fn stop_listening(&self) -> Result<bool> {
        (**self).stop_listening().await
    }

    async fn make_discoverable(&self, duration: Duration) -> Result<bool> {
        (**self).make_discoverable(duration).await
    }

    async fn pair_device(&self, id: &DeviceId) -> Result<bool> {
        (**self).pair_device(id).await
    }

    async fn unpair_device(&self, id: &DeviceId) -> Result<bool> {
        (**self).unpair_device(id).await
    }

    async fn set_adapter_name(&self, name: &str) -> Result<bool> {
        (**self).set_adapter_name(name).await
    }

    async fn adapter_name(&self) -> Result<String> {
        (**self).adapter_name().await
    }

    fn on(&self, name: EventName, listener: Listener) -> Result<()> {
        (**self).on(name, listener)
    }

    fn off(&self, name: EventName, listener: &Listener) -> Result<()> {
        (**self).off(name, listener)
    }
}
