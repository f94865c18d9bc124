//! The application-facing handle

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::ErrorKind;
use crate::packet::{PacketSize, PacketWriter, Payload};
use crate::transport::ConnectionInfo;
use crate::{
    btuuid, CodePage, Device, DeviceId, Error, EventName, EventRegistry, Listener, Result, SerialConfig, Transport,
    Uuid,
};

/// A Bluetooth serial port bound to one native [`Transport`].
///
/// Owns the transport, the [`EventRegistry`] of listeners subscribed through it, and the [`SerialConfig`] used for
/// connecting and writing. Dropping the handle unsubscribes every listener that is still registered.
#[derive(Debug)]
pub struct BluetoothSerial<T: Transport> {
    transport: Arc<T>,
    registry: EventRegistry<Arc<T>>,
    config: SerialConfig,
}

impl<T: Transport> BluetoothSerial<T> {
    /// Creates a handle with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SerialConfig::default())
    }

    /// Creates a handle with the given configuration.
    ///
    /// The configured delimiter and code page are handed to the transport on the next [`connect`][Self::connect],
    /// [`listen_for_incoming_connections`][Self::listen_for_incoming_connections], or their `with_*` setter.
    pub fn with_config(transport: T, config: SerialConfig) -> Self {
        Self::from_arc(Arc::new(transport), config)
    }

    /// Creates a handle around a transport that is shared with other code
    pub fn from_arc(transport: Arc<T>, config: SerialConfig) -> Self {
        BluetoothSerial {
            registry: EventRegistry::new(transport.clone()),
            transport,
            config,
        }
    }

    /// The native transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The listeners subscribed through this handle
    pub fn registry(&self) -> &EventRegistry<Arc<T>> {
        &self.registry
    }

    /// The active configuration
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Lists paired devices
    pub async fn list(&self) -> Result<Vec<Device>> {
        self.transport.list().await
    }

    /// Discovers unpaired devices in range
    pub async fn discover_unpaired_devices(&self) -> Result<Vec<Device>> {
        self.transport.discover_unpaired_devices().await
    }

    /// Cancels a running discovery
    pub async fn cancel_discovery(&self) -> Result<bool> {
        self.transport.cancel_discovery().await
    }

    /// Whether the adapter is powered on
    pub async fn is_enabled(&self) -> Result<bool> {
        self.transport.is_enabled().await
    }

    /// Powers the adapter on
    pub async fn enable(&self) -> Result<bool> {
        self.transport.enable().await
    }

    /// Powers the adapter off
    pub async fn disable(&self) -> Result<bool> {
        self.transport.disable().await
    }

    /// Asks the user to power the adapter on
    pub async fn request_enable(&self) -> Result<bool> {
        self.transport.request_enable().await
    }

    /// Pairs with a device
    pub async fn pair_device(&self, id: &DeviceId) -> Result<bool> {
        self.transport.pair_device(id).await
    }

    /// Removes the pairing with a device
    pub async fn unpair_device(&self, id: &DeviceId) -> Result<bool> {
        self.transport.unpair_device(id).await
    }

    /// Sets the adapter's visible name
    pub async fn set_adapter_name(&self, name: &str) -> Result<bool> {
        self.transport.set_adapter_name(name).await
    }

    /// The adapter's visible name
    pub async fn adapter_name(&self) -> Result<String> {
        self.transport.adapter_name().await
    }

    /// Connects to a device using the configured service UUID
    pub async fn connect(&self, id: &DeviceId) -> Result<ConnectionInfo> {
        self.connect_with_service(id, self.config.service_uuid).await
    }

    /// Connects to a device using the given service UUID
    pub async fn connect_with_service(&self, id: &DeviceId, service: Uuid) -> Result<ConnectionInfo> {
        self.configure_receive().await?;
        match btuuid::try_to_u16(&service) {
            Some(short) => debug!(%id, "connecting to service {short:#06x}"),
            None => debug!(%id, %service, "connecting"),
        }
        let info = self.transport.connect(id, service).await?;
        info!(remote_address = %info.remote_address, "{}", info.message);
        Ok(info)
    }

    /// Accepts connections from remote devices on the configured service UUID.
    ///
    /// Accepted connections are reported as [`ConnectionSuccess`][crate::Event::ConnectionSuccess] events with
    /// `is_incoming` set.
    pub async fn listen_for_incoming_connections(&self, service_name: &str) -> Result<bool> {
        self.listen_for_incoming_connections_with_service(service_name, self.config.service_uuid)
            .await
    }

    /// Accepts connections from remote devices on the given service UUID
    pub async fn listen_for_incoming_connections_with_service(
        &self,
        service_name: &str,
        service: Uuid,
    ) -> Result<bool> {
        self.configure_receive().await?;
        self.transport.listen_for_incoming_connections(service_name, service).await
    }

    /// Stops accepting incoming connections. The active connection stays open.
    pub async fn stop_listening(&self) -> Result<bool> {
        self.transport.stop_listening().await
    }

    /// Makes the adapter visible to discovery for `duration`
    pub async fn make_discoverable(&self, duration: Duration) -> Result<bool> {
        self.transport.make_discoverable(duration).await
    }

    /// Closes the active connection
    pub async fn disconnect(&self) -> Result<()> {
        self.transport.disconnect().await
    }

    /// Whether a connection is active
    pub async fn is_connected(&self) -> Result<bool> {
        self.transport.is_connected().await
    }

    /// Writes `payload` with a single native write, without packetizing.
    ///
    /// Text is encoded through the configured code page. Returns the native acknowledgement.
    pub async fn write<'p>(&self, payload: impl Into<Payload<'p>>) -> Result<bool> {
        let bytes = payload.into().encode(self.config.code_page, self.config.unmappable)?;
        if !self.transport.is_connected().await? {
            return Err(Error::new(ErrorKind::NotConnected, None, "cannot write without a connection"));
        }
        debug!(bytes = bytes.len(), "writing");
        self.transport.write(&bytes).await
    }

    /// Writes `payload` as fixed-size packets using the configured packet size.
    ///
    /// See [`PacketWriter::write_packets`].
    pub async fn write_packets<'p>(&self, payload: impl Into<Payload<'p>>) -> Result<usize> {
        self.write_packets_with_size(payload, self.config.packet_size).await
    }

    /// Writes `payload` as fixed-size packets of `packet_size` bytes.
    pub async fn write_packets_with_size<'p>(
        &self,
        payload: impl Into<Payload<'p>>,
        packet_size: PacketSize,
    ) -> Result<usize> {
        let payload = payload.into();
        self.writer().packet_size(packet_size).write_packets(payload).await
    }

    /// Sets the delimiter inbound bytes are split on and forwards it to the transport
    pub async fn with_delimiter(&mut self, delimiter: &str) -> Result<()> {
        self.transport.set_delimiter(delimiter).await?;
        self.config.delimiter = delimiter.to_owned();
        Ok(())
    }

    /// Sets the code page inbound data is decoded and outbound text encoded with, and forwards it to the transport
    pub async fn with_code_page(&mut self, code_page: CodePage) -> Result<()> {
        self.transport.set_code_page(code_page).await?;
        self.config.code_page = code_page;
        Ok(())
    }

    /// Subscribes `listener` to the events named `name`
    pub fn on(&mut self, name: EventName, listener: Listener) -> Result<()> {
        self.registry.subscribe(name, listener)
    }

    /// Removes one subscription of `listener` to `name`
    pub fn off(&mut self, name: EventName, listener: &Listener) {
        self.registry.unsubscribe(name, listener)
    }

    /// Removes every subscription
    pub fn remove_all_listeners(&mut self) {
        self.registry.unsubscribe_all()
    }

    /// Removes every subscription to `name`
    pub fn remove_listeners(&mut self, name: EventName) {
        self.registry.unsubscribe_by_name(name)
    }

    async fn configure_receive(&self) -> Result<()> {
        self.transport.set_delimiter(&self.config.delimiter).await?;
        self.transport.set_code_page(self.config.code_page).await
    }

    fn writer(&self) -> PacketWriter<'_, T> {
        PacketWriter::new(&*self.transport)
            .packet_size(self.config.packet_size)
            .code_page(self.config.code_page)
            .unmappable(self.config.unmappable)
    }
}
