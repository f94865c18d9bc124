//! An in-process transport
//!
//! [`MemoryTransport`] behaves like a native serial stack without any radio: it keeps device lists and a connection
//! flag, records every write, and emits events when told to. It can be told to fail or refuse a given write, which
//! makes it suitable for exercising the write path and the event plumbing in tests and demos.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::buffer::DelimitedBuffer;
use crate::codepage::CodePage;
use crate::error::ErrorKind;
use crate::transport::ConnectionInfo;
use crate::{Device, DeviceId, Error, Event, EventName, Listener, ListenerSet, Result, Transport, Uuid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteFault {
    Fail,
    Nack,
}

#[derive(Debug)]
struct State {
    paired: Vec<Device>,
    unpaired: Vec<Device>,
    enabled: bool,
    toggle_supported: bool,
    adapter_name: String,
    connected: Option<Device>,
    writes: Vec<Vec<u8>>,
    write_attempts: usize,
    faults: BTreeMap<usize, WriteFault>,
    buffer: DelimitedBuffer,
    code_page: CodePage,
    listening: Option<Uuid>,
    discoverable_for: Option<Duration>,
}

/// A [`Transport`] that lives entirely in memory.
#[derive(Debug)]
pub struct MemoryTransport {
    listeners: ListenerSet,
    state: Mutex<State>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Creates an enabled transport with no known devices
    pub fn new() -> Self {
        MemoryTransport {
            listeners: ListenerSet::new(),
            state: Mutex::new(State {
                paired: Vec::new(),
                unpaired: Vec::new(),
                enabled: true,
                toggle_supported: true,
                adapter_name: String::from("memory"),
                connected: None,
                writes: Vec::new(),
                write_attempts: 0,
                faults: BTreeMap::new(),
                buffer: DelimitedBuffer::default(),
                code_page: CodePage::default(),
                listening: None,
                discoverable_for: None,
            }),
        }
    }

    /// Adds a device to the paired list
    pub fn with_paired(self, device: Device) -> Self {
        self.lock().paired.push(device);
        self
    }

    /// Adds a device that discovery will find
    pub fn with_unpaired(self, device: Device) -> Self {
        self.lock().unpaired.push(device);
        self
    }

    /// Sets the code page inbound bytes are decoded with for `data` events until
    /// [`set_code_page`][Transport::set_code_page] is called
    pub fn with_code_page(self, code_page: CodePage) -> Self {
        self.lock().code_page = code_page;
        self
    }

    /// Makes [`enable`][Transport::enable] and [`disable`][Transport::disable] fail with
    /// [`TransportUnavailable`][ErrorKind::TransportUnavailable], as on platforms that do not let applications toggle
    /// the adapter
    pub fn without_power_control(self) -> Self {
        self.lock().toggle_supported = false;
        self
    }

    /// The dispatch table listeners are registered in
    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Every successful write so far, oldest first
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Clears the recorded writes. Write indices keep counting.
    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Makes the write attempt with the given zero-based index fail with an error
    pub fn fail_write_at(&self, index: usize) {
        self.lock().faults.insert(index, WriteFault::Fail);
    }

    /// Makes the write attempt with the given zero-based index return a negative acknowledgement
    pub fn nack_write_at(&self, index: usize) {
        self.lock().faults.insert(index, WriteFault::Nack);
    }

    /// Simulates bytes arriving on the connection.
    ///
    /// Emits [`RawData`][Event::RawData] with the bytes as received, then one [`Data`][Event::Data] event per
    /// delimited chunk. Fails with [`NotConnected`][ErrorKind::NotConnected] if there is no connection.
    pub fn receive(&self, bytes: &[u8]) -> Result<()> {
        let (remote_address, chunks) = {
            let mut state = self.lock();
            let remote_address = match &state.connected {
                Some(device) => device.id().to_string(),
                None => return Err(ErrorKind::NotConnected.into()),
            };
            let code_page = state.code_page;
            let chunks: Vec<String> = state
                .buffer
                .push(bytes)
                .iter()
                .map(|chunk| code_page.decode(chunk))
                .collect();
            (remote_address, chunks)
        };

        self.emit(&Event::RawData {
            remote_address: remote_address.clone(),
            data: bytes.to_vec(),
        });
        for data in chunks {
            self.emit(&Event::Data {
                remote_address: remote_address.clone(),
                data,
            });
        }
        Ok(())
    }

    /// The service UUID the server socket is open for, if any
    pub fn listening_for(&self) -> Option<Uuid> {
        self.lock().listening
    }

    /// How long the last [`make_discoverable`][Transport::make_discoverable] call asked to stay visible
    pub fn discoverable_for(&self) -> Option<Duration> {
        self.lock().discoverable_for
    }

    /// Simulates a remote device connecting to the server socket.
    ///
    /// The device replaces the active connection and [`ConnectionSuccess`][Event::ConnectionSuccess] is emitted with
    /// `is_incoming` set. Fails with [`NotConnected`][ErrorKind::NotConnected] unless
    /// [`listen_for_incoming_connections`][Transport::listen_for_incoming_connections] is active.
    pub fn accept_incoming(&self, device: Device) -> Result<()> {
        {
            let mut state = self.lock();
            if state.listening.is_none() {
                return Err(Error::new(
                    ErrorKind::NotConnected,
                    None,
                    "not listening for incoming connections",
                ));
            }
            state.buffer.take_all();
            if let Some(old) = state.connected.replace(device.clone()) {
                debug!(device = %old, "closed previous connection");
            }
        }
        info!(device = %device, "accepted incoming connection");
        self.emit(&Event::ConnectionSuccess {
            remote_address: device.id().to_string(),
            message: format!("Connected to {}", device.name()),
            is_incoming: true,
        });
        Ok(())
    }

    /// Simulates the remote side going away. Emits [`ConnectionLost`][Event::ConnectionLost] if there was a
    /// connection.
    pub fn drop_connection(&self) {
        let lost = {
            let mut state = self.lock();
            state.buffer.take_all();
            state.connected.take()
        };
        if let Some(device) = lost {
            info!(device = %device, "connection lost");
            self.emit(&Event::ConnectionLost {
                remote_address: device.id().to_string(),
                message: format!("Connection to {} was lost", device.name()),
            });
        }
    }

    /// Simulates the adapter being switched on or off outside the application.
    ///
    /// Emits [`BluetoothEnabled`][Event::BluetoothEnabled] or [`BluetoothDisabled`][Event::BluetoothDisabled] when the
    /// state changes. Switching off drops the connection first.
    pub fn set_enabled(&self, enabled: bool) {
        let changed = {
            let mut state = self.lock();
            std::mem::replace(&mut state.enabled, enabled) != enabled
        };
        if !changed {
            return;
        }
        if enabled {
            self.emit(&Event::BluetoothEnabled);
        } else {
            self.drop_connection();
            self.emit(&Event::BluetoothDisabled);
        }
    }

    /// Delivers `event` to the listeners registered for it and returns how many were called
    pub fn emit(&self, event: &Event) -> usize {
        let count = self.listeners.emit(event);
        debug!(event = %event.name(), listeners = count, "event emitted");
        count
    }

    fn find_device(state: &State, id: &DeviceId) -> Option<Device> {
        state
            .paired
            .iter()
            .chain(state.unpaired.iter())
            .find(|d| d.id() == id)
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn power(&self, enabled: bool) -> Result<bool> {
        if !self.lock().toggle_supported {
            return Err(Error::new(
                ErrorKind::TransportUnavailable,
                None,
                "the adapter cannot be switched by applications",
            ));
        }
        self.set_enabled(enabled);
        Ok(true)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn list(&self) -> Result<Vec<Device>> {
        Ok(self.lock().paired.clone())
    }

    async fn discover_unpaired_devices(&self) -> Result<Vec<Device>> {
        let state = self.lock();
        if !state.enabled {
            return Err(Error::new(ErrorKind::TransportUnavailable, None, "Bluetooth is disabled"));
        }
        Ok(state.unpaired.clone())
    }

    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.lock().enabled)
    }

    async fn enable(&self) -> Result<bool> {
        self.power(true)
    }

    async fn disable(&self) -> Result<bool> {
        self.power(false)
    }

    async fn connect(&self, id: &DeviceId, service: Uuid) -> Result<ConnectionInfo> {
        let device = {
            let mut state = self.lock();
            let device = if state.enabled { Self::find_device(&state, id) } else { None };
            if let Some(device) = &device {
                state.buffer.take_all();
                if let Some(old) = state.connected.replace(device.clone()) {
                    debug!(device = %old, "closed previous connection");
                }
            }
            device
        };

        let Some(device) = device else {
            let message = format!("Unable to connect to device {id}");
            self.emit(&Event::ConnectionFailed {
                remote_address: id.to_string(),
                message: message.clone(),
            });
            return Err(Error::new(ErrorKind::ConnectionFailed, None, message));
        };

        info!(device = %device, %service, "connected");
        let info = ConnectionInfo {
            remote_address: device.id().to_string(),
            message: format!("Connected to {}", device.name()),
        };
        self.emit(&Event::ConnectionSuccess {
            remote_address: info.remote_address.clone(),
            message: info.message.clone(),
            is_incoming: false,
        });
        Ok(info)
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.lock();
        state.buffer.take_all();
        if let Some(device) = state.connected.take() {
            debug!(device = %device, "disconnected");
        }
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.lock().connected.is_some())
    }

    async fn write(&self, bytes: &[u8]) -> Result<bool> {
        let mut state = self.lock();
        if state.connected.is_none() {
            return Err(ErrorKind::NotConnected.into());
        }
        let index = state.write_attempts;
        state.write_attempts += 1;
        match state.faults.remove(&index) {
            Some(WriteFault::Fail) => Err(Error::new(
                ErrorKind::Other,
                None,
                format!("write {index} failed"),
            )),
            Some(WriteFault::Nack) => Ok(false),
            None => {
                state.writes.push(bytes.to_vec());
                Ok(true)
            }
        }
    }

    async fn set_delimiter(&self, delimiter: &str) -> Result<()> {
        self.lock().buffer.set_delimiter(delimiter);
        Ok(())
    }

    async fn set_code_page(&self, code_page: CodePage) -> Result<()> {
        self.lock().code_page = code_page;
        Ok(())
    }

    async fn listen_for_incoming_connections(&self, service_name: &str, service: Uuid) -> Result<bool> {
        let mut state = self.lock();
        if !state.enabled {
            return Err(Error::new(ErrorKind::TransportUnavailable, None, "Bluetooth is disabled"));
        }
        if state.listening.is_some() {
            return Err(ErrorKind::AlreadyListening.into());
        }
        state.listening = Some(service);
        debug!(service_name, %service, "listening for incoming connections");
        Ok(true)
    }

    async fn stop_listening(&self) -> Result<bool> {
        Ok(self.lock().listening.take().is_some())
    }

    async fn make_discoverable(&self, duration: Duration) -> Result<bool> {
        let mut state = self.lock();
        if !state.enabled {
            return Err(Error::new(ErrorKind::TransportUnavailable, None, "Bluetooth is disabled"));
        }
        state.discoverable_for = Some(duration);
        Ok(true)
    }

    async fn pair_device(&self, id: &DeviceId) -> Result<bool> {
        let mut state = self.lock();
        if state.paired.iter().any(|d| d.id() == id) {
            return Ok(true);
        }
        let index = state
            .unpaired
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, None, format!("no device {id}")))?;
        let device = state.unpaired.remove(index);
        state.paired.push(device);
        Ok(true)
    }

    async fn unpair_device(&self, id: &DeviceId) -> Result<bool> {
        let mut state = self.lock();
        let index = state
            .paired
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, None, format!("device {id} is not paired")))?;
        let device = state.paired.remove(index);
        state.unpaired.push(device);
        Ok(true)
    }

    async fn set_adapter_name(&self, name: &str) -> Result<bool> {
        self.lock().adapter_name = name.to_owned();
        Ok(true)
    }

    async fn adapter_name(&self) -> Result<String> {
        Ok(self.lock().adapter_name.clone())
    }

    fn on(&self, name: EventName, listener: Listener) -> Result<()> {
        self.listeners.add(name, listener);
        Ok(())
    }

    fn off(&self, name: EventName, listener: &Listener) -> Result<()> {
        self.listeners.remove(name, listener);
        Ok(())
    }
}
