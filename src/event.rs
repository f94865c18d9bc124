//! Native events and the listener table transports dispatch them through.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ErrorKind;
use crate::Error;

/// Names of the events a transport can deliver.
///
/// Each name maps to the string key the native modules use (see [`EventName::as_str`]).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub enum EventName {
    /// The adapter was powered on
    BluetoothEnabled,
    /// The adapter was powered off
    BluetoothDisabled,
    /// A serial connection was established
    ConnectionSuccess,
    /// A connection attempt failed
    ConnectionFailed,
    /// An established connection dropped
    ConnectionLost,
    /// Delimited text was received
    Data,
    /// Bytes were received, exactly as read from the socket
    RawData,
    /// The native layer reported an error outside of any pending call
    Error,
}

impl EventName {
    /// Every event name, in declaration order
    pub const ALL: [EventName; 8] = [
        EventName::BluetoothEnabled,
        EventName::BluetoothDisabled,
        EventName::ConnectionSuccess,
        EventName::ConnectionFailed,
        EventName::ConnectionLost,
        EventName::Data,
        EventName::RawData,
        EventName::Error,
    ];

    /// The native string key of this event
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::BluetoothEnabled => "bluetoothEnabled",
            EventName::BluetoothDisabled => "bluetoothDisabled",
            EventName::ConnectionSuccess => "connectionSuccess",
            EventName::ConnectionFailed => "connectionFailed",
            EventName::ConnectionLost => "connectionLost",
            EventName::Data => "data",
            EventName::RawData => "rawData",
            EventName::Error => "error",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::new(ErrorKind::InvalidParameter, None, format!("unknown event name `{s}`")))
    }
}

/// An event delivered to listeners.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The adapter was powered on
    BluetoothEnabled,
    /// The adapter was powered off
    BluetoothDisabled,
    /// A serial connection was established
    ConnectionSuccess {
        /// Address of the remote device
        remote_address: String,
        /// Human readable status from the native layer
        message: String,
        /// `true` when the remote device initiated the connection
        is_incoming: bool,
    },
    /// A connection attempt failed
    ConnectionFailed {
        /// Address of the remote device
        remote_address: String,
        /// Human readable status from the native layer
        message: String,
    },
    /// An established connection dropped
    ConnectionLost {
        /// Address of the remote device
        remote_address: String,
        /// Human readable status from the native layer
        message: String,
    },
    /// Delimited text was received
    Data {
        /// Address of the remote device
        remote_address: String,
        /// Decoded text, including the trailing delimiter when one is configured
        data: String,
    },
    /// Bytes were received
    RawData {
        /// Address of the remote device
        remote_address: String,
        /// The bytes as read from the socket
        data: Vec<u8>,
    },
    /// The native layer reported an error
    Error {
        /// Error description
        message: String,
    },
}

impl Event {
    /// The name this event is dispatched under
    pub fn name(&self) -> EventName {
        match self {
            Event::BluetoothEnabled => EventName::BluetoothEnabled,
            Event::BluetoothDisabled => EventName::BluetoothDisabled,
            Event::ConnectionSuccess { .. } => EventName::ConnectionSuccess,
            Event::ConnectionFailed { .. } => EventName::ConnectionFailed,
            Event::ConnectionLost { .. } => EventName::ConnectionLost,
            Event::Data { .. } => EventName::Data,
            Event::RawData { .. } => EventName::RawData,
            Event::Error { .. } => EventName::Error,
        }
    }
}

/// An application callback.
///
/// Two listeners are the same listener when they are clones of one `Arc`. Keep a clone of the listener passed to
/// `on` in order to remove it again later.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

/// Wraps a closure into a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Compares the data pointers only; vtable pointers are not unique across codegen units.
pub(crate) fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// The dispatch table a [`Transport`][crate::Transport] implementation keeps for registrations made through
/// `on`/`off`.
///
/// Every `add` is a separate registration, so a listener added twice is invoked twice per event. Listeners are
/// invoked in registration order, outside of the internal lock, so a listener may add or remove listeners.
#[derive(Default)]
pub struct ListenerSet {
    entries: Mutex<Vec<(EventName, Listener)>>,
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet").field("len", &self.len()).finish()
    }
}

impl ListenerSet {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for events named `name`.
    pub fn add(&self, name: EventName, listener: Listener) {
        self.lock().push((name, listener));
    }

    /// Removes the oldest registration of `listener` under `name`.
    ///
    /// Returns `false` if there was none.
    pub fn remove(&self, name: EventName, listener: &Listener) -> bool {
        let mut entries = self.lock();
        match entries
            .iter()
            .position(|(n, l)| *n == name && same_listener(l, listener))
        {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every registration.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Invokes every listener registered under `event.name()` and returns how many were called.
    pub fn emit(&self, event: &Event) -> usize {
        let name = event.name();
        let targets: Vec<Listener> = self
            .lock()
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, l)| l.clone())
            .collect();
        for target in &targets {
            target(event);
        }
        targets.len()
    }

    /// Number of registrations under `name`
    pub fn count(&self, name: EventName) -> usize {
        self.lock().iter().filter(|(n, _)| *n == name).count()
    }

    /// Total number of registrations
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(EventName, Listener)>> {
        // A panicking listener runs outside the lock, so the table itself is never left half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (
            hits,
            listener(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn event_names_round_trip_through_native_keys() {
        for name in EventName::ALL {
            assert_eq!(name.as_str().parse::<EventName>().unwrap(), name);
        }
        assert_eq!("rawData".parse::<EventName>().unwrap(), EventName::RawData);

        let err = "read".parse::<EventName>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn event_reports_its_name() {
        let event = Event::ConnectionLost {
            remote_address: "00:11:22:33:44:55".into(),
            message: "lost".into(),
        };
        assert_eq!(event.name(), EventName::ConnectionLost);
        assert_eq!(Event::BluetoothEnabled.name(), EventName::BluetoothEnabled);
    }

    #[test]
    fn emit_reaches_only_matching_listeners() {
        let set = ListenerSet::new();
        let (enabled_hits, on_enabled) = counter();
        let (disabled_hits, on_disabled) = counter();
        set.add(EventName::BluetoothEnabled, on_enabled);
        set.add(EventName::BluetoothDisabled, on_disabled);

        assert_eq!(set.emit(&Event::BluetoothEnabled), 1);
        assert_eq!(enabled_hits.load(Ordering::SeqCst), 1);
        assert_eq!(disabled_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_registrations_are_tracked_separately() {
        let set = ListenerSet::new();
        let (hits, l) = counter();
        set.add(EventName::Data, l.clone());
        set.add(EventName::Data, l.clone());

        let data = Event::Data {
            remote_address: String::new(),
            data: "x".into(),
        };
        set.emit(&data);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(set.remove(EventName::Data, &l));
        set.emit(&data);
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        assert!(set.remove(EventName::Data, &l));
        assert!(!set.remove(EventName::Data, &l));
        assert!(set.is_empty());
    }

    #[test]
    fn emit_follows_registration_order() {
        let set = ListenerSet::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tagged = |tag: &'static str| {
            let calls = calls.clone();
            listener(move |_| calls.lock().unwrap().push(tag))
        };
        let a = tagged("a");
        set.add(EventName::BluetoothEnabled, a.clone());
        set.add(EventName::BluetoothEnabled, tagged("b"));
        set.add(EventName::BluetoothDisabled, tagged("other"));
        set.add(EventName::BluetoothEnabled, a);

        assert_eq!(set.emit(&Event::BluetoothEnabled), 3);
        assert_eq!(*calls.lock().unwrap(), ["a", "b", "a"]);
    }

    #[test]
    fn remove_requires_the_same_arc() {
        let set = ListenerSet::new();
        let (_, a) = counter();
        let (_, b) = counter();
        set.add(EventName::Error, a.clone());

        assert!(!set.remove(EventName::Error, &b));
        assert!(!set.remove(EventName::Data, &a));
        assert!(set.remove(EventName::Error, &a));
    }

    #[test]
    fn listeners_may_reenter_the_table() {
        let set = Arc::new(ListenerSet::new());
        let inner = set.clone();
        let (hits, counting) = counter();
        let registering = listener(move |_| inner.add(EventName::Error, counting.clone()));
        set.add(EventName::BluetoothEnabled, registering);

        set.emit(&Event::BluetoothEnabled);
        assert_eq!(set.count(EventName::Error), 1);
        set.emit(&Event::Error { message: "boom".into() });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
