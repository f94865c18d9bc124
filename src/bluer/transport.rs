use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bluer::rfcomm::{Listener as RfcommListener, SocketAddr, Stream};
use bluer::{AdapterEvent, AdapterProperty, Address, Session};
use futures_lite::{FutureExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::error::kind_from_io;
use crate::buffer::DelimitedBuffer;
use crate::codepage::CodePage;
use crate::error::ErrorKind;
use crate::transport::ConnectionInfo;
use crate::{Device, DeviceId, Error, Event, EventName, Listener, ListenerSet, Result, Transport, Uuid};

const READ_BUFFER_SIZE: usize = 1024;
const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Settings for [`BluezTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BluezConfig {
    /// Name of the adapter to use, e.g. `hci0`. The default adapter is used if unset.
    pub adapter: Option<String>,
    /// RFCOMM channel serial connections are opened and accepted on
    pub channel: u8,
    /// How long [`discover_unpaired_devices`][Transport::discover_unpaired_devices] scans for
    pub discovery_duration: Duration,
    /// Code page inbound bytes are decoded with for [`Data`][Event::Data] events until
    /// [`set_code_page`][Transport::set_code_page] is called
    pub code_page: CodePage,
}

impl Default for BluezConfig {
    fn default() -> Self {
        BluezConfig {
            adapter: None,
            channel: 1,
            discovery_duration: Duration::from_secs(10),
            code_page: CodePage::default(),
        }
    }
}

#[derive(Debug)]
struct Link {
    address: Address,
    writer: WriteHalf<Stream>,
    reader: JoinHandle<()>,
}

struct Inner {
    _session: Session,
    adapter: bluer::Adapter,
    config: BluezConfig,
    listeners: ListenerSet,
    link: tokio::sync::Mutex<Option<Link>>,
    buffer: Mutex<DelimitedBuffer>,
    code_page: Mutex<CodePage>,
    server: Mutex<Option<JoinHandle<()>>>,
    cancel_discovery: Notify,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("adapter", &self.adapter.name())
            .field("config", &self.config)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn emit(&self, event: &Event) {
        let count = self.listeners.emit(event);
        trace!(event = %event.name(), listeners = count, "event emitted");
    }

    fn buffer(&self) -> MutexGuard<'_, DelimitedBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn code_page(&self) -> MutexGuard<'_, CodePage> {
        self.code_page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn server(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, remote_address: &str, bytes: &[u8]) {
        let chunks = self.buffer().push(bytes);
        let code_page = *self.code_page();
        self.emit(&Event::RawData {
            remote_address: remote_address.to_owned(),
            data: bytes.to_vec(),
        });
        for chunk in chunks {
            self.emit(&Event::Data {
                remote_address: remote_address.to_owned(),
                data: code_page.decode(&chunk),
            });
        }
    }

    /// Makes `stream` the active link and starts reading from it
    fn attach(self: &Arc<Self>, link: &mut Option<Link>, address: Address, stream: Stream) {
        if let Some(old) = link.take() {
            debug!(address = %old.address, "closing previous connection");
            old.reader.abort();
        }
        self.buffer().take_all();
        let (reader, writer) = tokio::io::split(stream);
        let reader = tokio::spawn(read_loop(self.clone(), address, reader));
        *link = Some(Link {
            address,
            writer,
            reader,
        });
    }

    async fn connected(&self, address: Address, is_incoming: bool) -> ConnectionInfo {
        let name = match self.device(address).await {
            Ok(device) => device.name().to_owned(),
            Err(_) => address.to_string(),
        };
        let info = ConnectionInfo {
            remote_address: address.to_string(),
            message: format!("Connected to {name}"),
        };
        self.emit(&Event::ConnectionSuccess {
            remote_address: info.remote_address.clone(),
            message: info.message.clone(),
            is_incoming,
        });
        info
    }

    async fn device(&self, address: Address) -> Result<Device> {
        let device = self.adapter.device(address)?;
        let name = device.alias().await?;
        let device_info = Device::new(address.to_string(), name);
        Ok(match device.class().await? {
            Some(class) => device_info.with_class(class),
            None => device_info,
        })
    }
}

/// A [`Transport`] backed by BlueZ RFCOMM sockets.
///
/// Connections are opened and accepted on a fixed RFCOMM channel ([`BluezConfig::channel`]); the service UUID passed
/// to [`connect`][Transport::connect] and
/// [`listen_for_incoming_connections`][Transport::listen_for_incoming_connections] is only logged.
#[derive(Debug)]
pub struct BluezTransport {
    inner: Arc<Inner>,
    power_watch: JoinHandle<()>,
}

impl BluezTransport {
    /// Opens a BlueZ session and binds to the configured adapter
    pub async fn new(config: BluezConfig) -> Result<Self> {
        let session = Session::new().await?;
        let adapter = match &config.adapter {
            Some(name) => session.adapter(name)?,
            None => session.default_adapter().await?,
        };
        debug!(adapter = adapter.name(), channel = config.channel, "opened BlueZ adapter");

        let code_page = config.code_page;
        let inner = Arc::new(Inner {
            _session: session,
            adapter,
            config,
            listeners: ListenerSet::new(),
            link: tokio::sync::Mutex::new(None),
            buffer: Mutex::new(DelimitedBuffer::default()),
            code_page: Mutex::new(code_page),
            server: Mutex::new(None),
            cancel_discovery: Notify::new(),
        });
        let power_watch = tokio::spawn(watch_power(inner.clone()));
        Ok(BluezTransport { inner, power_watch })
    }

    /// Opens the default adapter with the default configuration
    pub async fn default_adapter() -> Result<Self> {
        Self::new(BluezConfig::default()).await
    }

    /// The configuration in use
    pub fn config(&self) -> &BluezConfig {
        &self.inner.config
    }
}

impl Drop for BluezTransport {
    fn drop(&mut self) {
        self.power_watch.abort();
        if let Some(server) = self.inner.server().take() {
            server.abort();
        }
        if let Ok(mut link) = self.inner.link.try_lock() {
            if let Some(link) = link.take() {
                link.reader.abort();
            }
        }
    }
}

fn parse_address(id: &DeviceId) -> Result<Address> {
    id.as_str().parse().map_err(|_| {
        Error::new(
            ErrorKind::InvalidParameter,
            None,
            format!("`{id}` is not a Bluetooth address"),
        )
    })
}

async fn watch_power(inner: Arc<Inner>) {
    let events = match inner.adapter.events().await {
        Ok(events) => events,
        Err(err) => {
            warn!("cannot watch adapter power: {err}");
            return;
        }
    };
    futures_lite::pin!(events);
    while let Some(event) = events.next().await {
        match event {
            AdapterEvent::PropertyChanged(AdapterProperty::Powered(true)) => inner.emit(&Event::BluetoothEnabled),
            AdapterEvent::PropertyChanged(AdapterProperty::Powered(false)) => inner.emit(&Event::BluetoothDisabled),
            _ => {}
        }
    }
}

async fn accept_loop(inner: Arc<Inner>, listener: RfcommListener) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                info!(address = %remote.addr, "accepted incoming connection");
                let mut link = inner.link.lock().await;
                inner.attach(&mut link, remote.addr, stream);
                drop(link);
                inner.connected(remote.addr, true).await;
            }
            Err(err) => {
                warn!("accepting a connection failed: {err}");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

async fn read_loop(inner: Arc<Inner>, address: Address, mut reader: ReadHalf<Stream>) {
    let remote_address = address.to_string();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let message = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break format!("Connection to {remote_address} was closed by the remote device"),
            Ok(n) => inner.deliver(&remote_address, &buf[..n]),
            Err(err) => break format!("Connection to {remote_address} was lost: {err}"),
        }
    };

    {
        let mut link = inner.link.lock().await;
        if link.as_ref().is_some_and(|link| link.address == address) {
            *link = None;
        }
    }
    inner.buffer().take_all();
    info!(%remote_address, "{message}");
    inner.emit(&Event::ConnectionLost {
        remote_address,
        message,
    });
}

#[async_trait]
impl Transport for BluezTransport {
    async fn list(&self) -> Result<Vec<Device>> {
        let mut devices = Vec::new();
        for address in self.inner.adapter.device_addresses().await? {
            if self.inner.adapter.device(address)?.is_paired().await? {
                devices.push(self.inner.device(address).await?);
            }
        }
        Ok(devices)
    }

    async fn discover_unpaired_devices(&self) -> Result<Vec<Device>> {
        let events = self.inner.adapter.discover_devices().await?;
        futures_lite::pin!(events);

        let mut found = Vec::new();
        let scan = async {
            while let Some(event) = events.next().await {
                if let AdapterEvent::DeviceAdded(address) = event {
                    if !found.contains(&address) {
                        found.push(address);
                    }
                }
            }
        };
        let stop = async {
            let deadline = tokio::time::sleep(self.inner.config.discovery_duration);
            deadline.or(self.inner.cancel_discovery.notified()).await;
        };
        scan.or(stop).await;
        debug!(found = found.len(), "discovery finished");

        let mut devices = Vec::new();
        for address in found {
            if !self.inner.adapter.device(address)?.is_paired().await? {
                devices.push(self.inner.device(address).await?);
            }
        }
        Ok(devices)
    }

    async fn cancel_discovery(&self) -> Result<bool> {
        self.inner.cancel_discovery.notify_waiters();
        Ok(true)
    }

    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.inner.adapter.is_powered().await?)
    }

    async fn enable(&self) -> Result<bool> {
        self.inner.adapter.set_powered(true).await?;
        Ok(true)
    }

    async fn disable(&self) -> Result<bool> {
        self.inner.adapter.set_powered(false).await?;
        Ok(true)
    }

    async fn connect(&self, id: &DeviceId, service: Uuid) -> Result<ConnectionInfo> {
        let address = parse_address(id)?;
        let mut link = self.inner.link.lock().await;
        if let Some(old) = link.take() {
            debug!(address = %old.address, "closing previous connection");
            old.reader.abort();
        }

        let channel = self.inner.config.channel;
        debug!(%address, channel, %service, "opening RFCOMM stream");
        let stream = match Stream::connect(SocketAddr::new(address, channel)).await {
            Ok(stream) => stream,
            Err(err) => {
                let message = format!("Unable to connect to device {id}");
                self.inner.emit(&Event::ConnectionFailed {
                    remote_address: id.to_string(),
                    message: message.clone(),
                });
                return Err(Error::new(ErrorKind::ConnectionFailed, Some(Box::new(err)), message));
            }
        };

        self.inner.attach(&mut link, address, stream);
        drop(link);
        Ok(self.inner.connected(address, false).await)
    }

    async fn disconnect(&self) -> Result<()> {
        let link = self.inner.link.lock().await.take();
        if let Some(mut link) = link {
            link.reader.abort();
            if let Err(err) = link.writer.shutdown().await {
                debug!(address = %link.address, "shutdown failed: {err}");
            }
            self.inner.buffer().take_all();
            info!(address = %link.address, "disconnected");
        }
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.inner.link.lock().await.is_some())
    }

    async fn write(&self, bytes: &[u8]) -> Result<bool> {
        let mut guard = self.inner.link.lock().await;
        let link = guard.as_mut().ok_or(ErrorKind::NotConnected)?;
        link.writer
            .write_all(bytes)
            .await
            .map_err(|err| Error::new(kind_from_io(err.kind()), Some(Box::new(err)), "RFCOMM write failed"))?;
        Ok(true)
    }

    async fn set_delimiter(&self, delimiter: &str) -> Result<()> {
        self.inner.buffer().set_delimiter(delimiter);
        Ok(())
    }

    async fn set_code_page(&self, code_page: CodePage) -> Result<()> {
        *self.inner.code_page() = code_page;
        Ok(())
    }

    async fn listen_for_incoming_connections(&self, service_name: &str, service: Uuid) -> Result<bool> {
        if self.inner.server().is_some() {
            return Err(ErrorKind::AlreadyListening.into());
        }
        let channel = self.inner.config.channel;
        let listener = RfcommListener::bind(SocketAddr::new(Address::any(), channel)).await?;
        info!(service_name, %service, channel, "listening for incoming connections");

        let mut server = self.inner.server();
        if server.is_some() {
            return Err(ErrorKind::AlreadyListening.into());
        }
        *server = Some(tokio::spawn(accept_loop(self.inner.clone(), listener)));
        Ok(true)
    }

    async fn stop_listening(&self) -> Result<bool> {
        let server = self.inner.server().take();
        match server {
            Some(server) => {
                server.abort();
                debug!("stopped listening for incoming connections");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn make_discoverable(&self, duration: Duration) -> Result<bool> {
        let timeout = u32::try_from(duration.as_secs()).map_err(|_| {
            Error::new(
                ErrorKind::InvalidParameter,
                None,
                format!("discoverable duration {duration:?} is too long"),
            )
        })?;
        self.inner.adapter.set_discoverable_timeout(timeout).await?;
        self.inner.adapter.set_discoverable(true).await?;
        Ok(true)
    }

    async fn pair_device(&self, id: &DeviceId) -> Result<bool> {
        let device = self.inner.adapter.device(parse_address(id)?)?;
        if !device.is_paired().await? {
            device.pair().await?;
        }
        Ok(true)
    }

    async fn unpair_device(&self, id: &DeviceId) -> Result<bool> {
        self.inner.adapter.remove_device(parse_address(id)?).await?;
        Ok(true)
    }

    async fn set_adapter_name(&self, name: &str) -> Result<bool> {
        self.inner.adapter.set_alias(name.to_owned()).await?;
        Ok(true)
    }

    async fn adapter_name(&self) -> Result<String> {
        Ok(self.inner.adapter.alias().await?)
    }

    fn on(&self, name: EventName, listener: Listener) -> Result<()> {
        self.inner.listeners.add(name, listener);
        Ok(())
    }

    fn off(&self, name: EventName, listener: &Listener) -> Result<()> {
        self.inner.listeners.remove(name, listener);
        Ok(())
    }
}
