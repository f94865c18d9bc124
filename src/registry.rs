//! Application-side bookkeeping of event subscriptions.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::event::same_listener;
use crate::{EventName, Listener, Result, Transport};

/// Tracks the listeners an application has subscribed through one transport.
///
/// Every subscription is forwarded to the transport's [`on`][Transport::on] and recorded, so it can later be removed
/// exactly, by event name, or all at once. The registry removes whatever is still registered when it is dropped.
pub struct EventRegistry<T: Transport> {
    transport: T,
    listeners: BTreeMap<EventName, Vec<Listener>>,
}

impl<T: Transport> std::fmt::Debug for EventRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<EventName, usize> = self.listeners.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventRegistry").field("listeners", &counts).finish()
    }
}

impl<T: Transport> EventRegistry<T> {
    /// Creates an empty registry bound to `transport`
    pub fn new(transport: T) -> Self {
        EventRegistry {
            transport,
            listeners: BTreeMap::new(),
        }
    }

    /// The transport subscriptions are forwarded to
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Subscribes `listener` to events named `name`.
    ///
    /// The same listener may be subscribed more than once; each call is a separate registration and the listener is
    /// invoked once per registration. The registration is only recorded if the transport accepts it.
    pub fn subscribe(&mut self, name: EventName, listener: Listener) -> Result<()> {
        self.transport.on(name, listener.clone())?;
        self.listeners.entry(name).or_default().push(listener);
        debug!(event = %name, "listener subscribed");
        Ok(())
    }

    /// Removes one registration of exactly this `name`/`listener` pair.
    ///
    /// Does nothing if the pair was never subscribed.
    pub fn unsubscribe(&mut self, name: EventName, listener: &Listener) {
        let Some(registered) = self.listeners.get_mut(&name) else {
            return;
        };
        let Some(index) = registered.iter().position(|l| same_listener(l, listener)) else {
            return;
        };
        let removed = registered.remove(index);
        if registered.is_empty() {
            self.listeners.remove(&name);
        }
        self.release(name, &removed);
    }

    /// Removes every registration under `name`. Other event names are untouched.
    pub fn unsubscribe_by_name(&mut self, name: EventName) {
        if let Some(registered) = self.listeners.remove(&name) {
            debug!(event = %name, count = registered.len(), "removing listeners");
            for listener in &registered {
                self.release(name, listener);
            }
        }
    }

    /// Removes every registration under every name.
    pub fn unsubscribe_all(&mut self) {
        for (name, registered) in std::mem::take(&mut self.listeners) {
            for listener in &registered {
                self.release(name, listener);
            }
        }
    }

    /// Number of registrations under `name`
    pub fn listener_count(&self, name: EventName) -> usize {
        self.listeners.get(&name).map_or(0, Vec::len)
    }

    /// Total number of registrations
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    /// `true` if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn release(&self, name: EventName, listener: &Listener) {
        // The local entry is already gone at this point.
        if let Err(err) = self.transport.off(name, listener) {
            warn!(event = %name, "native unsubscribe failed: {err}");
        }
    }
}

impl<T: Transport> Drop for EventRegistry<T> {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::error::ErrorKind;
    use crate::{listener, CodePage, ConnectionInfo, Device, DeviceId, Error, Event, ListenerSet, Uuid};

    /// Records native on/off calls and dispatches through a [`ListenerSet`].
    #[derive(Default)]
    struct Native {
        set: ListenerSet,
        calls: Mutex<Vec<(&'static str, EventName)>>,
        fail_off: bool,
    }

    #[async_trait]
    impl Transport for Native {
        async fn list(&self) -> Result<Vec<Device>> {
            Ok(Vec::new())
        }
        async fn discover_unpaired_devices(&self) -> Result<Vec<Device>> {
            Ok(Vec::new())
        }
        async fn is_enabled(&self) -> Result<bool> {
            Ok(true)
        }
        async fn connect(&self, _id: &DeviceId, _service: Uuid) -> Result<ConnectionInfo> {
            Err(ErrorKind::NotSupported.into())
        }
        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }
        async fn is_connected(&self) -> Result<bool> {
            Ok(false)
        }
        async fn write(&self, _bytes: &[u8]) -> Result<bool> {
            Err(ErrorKind::NotConnected.into())
        }
        async fn set_delimiter(&self, _delimiter: &str) -> Result<()> {
            Ok(())
        }
        async fn set_code_page(&self, _code_page: CodePage) -> Result<()> {
            Ok(())
        }
        fn on(&self, name: EventName, listener: Listener) -> Result<()> {
            self.calls.lock().unwrap().push(("on", name));
            self.set.add(name, listener);
            Ok(())
        }
        fn off(&self, name: EventName, listener: &Listener) -> Result<()> {
            self.calls.lock().unwrap().push(("off", name));
            self.set.remove(name, listener);
            if self.fail_off {
                Err(Error::new(ErrorKind::Internal, None, "bridge gone"))
            } else {
                Ok(())
            }
        }
    }

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

    fn lost() -> Event {
        Event::ConnectionLost {
            remote_address: "00:11:22:33:44:55".into(),
            message: "gone".into(),
        }
    }

    #[test]
    fn subscribe_forwards_to_native_on() {
        let native = Arc::new(Native::default());
        let mut registry = EventRegistry::new(native.clone());
        let (hits, l) = counter();

        registry.subscribe(EventName::ConnectionLost, l).unwrap();
        assert_eq!(registry.listener_count(EventName::ConnectionLost), 1);
        assert_eq!(native.set.emit(&lost()), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(*native.calls.lock().unwrap(), [("on", EventName::ConnectionLost)]);
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let native = Arc::new(Native::default());
        let mut registry = EventRegistry::new(native.clone());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tagged = |tag: &'static str| {
            let calls = calls.clone();
            listener(move |_| calls.lock().unwrap().push(tag))
        };
        let a = tagged("a");
        let b = tagged("b");

        registry.subscribe(EventName::ConnectionLost, a.clone()).unwrap();
        registry.subscribe(EventName::ConnectionLost, b).unwrap();
        registry.subscribe(EventName::ConnectionLost, a.clone()).unwrap();
        native.set.emit(&lost());
        assert_eq!(*calls.lock().unwrap(), ["a", "b", "a"]);

        // The oldest registration of `a` goes first
        calls.lock().unwrap().clear();
        registry.unsubscribe(EventName::ConnectionLost, &a);
        native.set.emit(&lost());
        assert_eq!(*calls.lock().unwrap(), ["b", "a"]);
    }

    #[test]
    fn unsubscribe_of_unknown_pair_is_a_silent_no_op() {
        let native = Arc::new(Native::default());
        let mut registry = EventRegistry::new(native.clone());
        let (_, l) = counter();

        registry.unsubscribe(EventName::Data, &l);
        registry.subscribe(EventName::Data, l.clone()).unwrap();
        registry.unsubscribe(EventName::RawData, &l);

        assert_eq!(registry.len(), 1);
        assert_eq!(native.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_subscription_needs_two_removals() {
        let native = Arc::new(Native::default());
        let mut registry = EventRegistry::new(native.clone());
        let (hits, l) = counter();

        registry.subscribe(EventName::ConnectionLost, l.clone()).unwrap();
        registry.subscribe(EventName::ConnectionLost, l.clone()).unwrap();
        native.set.emit(&lost());
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        registry.unsubscribe(EventName::ConnectionLost, &l);
        native.set.emit(&lost());
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        registry.unsubscribe(EventName::ConnectionLost, &l);
        native.set.emit(&lost());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribe_all_silences_every_listener() {
        let native = Arc::new(Native::default());
        let mut registry = EventRegistry::new(native.clone());
        let (hits, l) = counter();
        for name in EventName::ALL {
            registry.subscribe(name, l.clone()).unwrap();
        }

        registry.unsubscribe_all();
        assert!(registry.is_empty());
        assert!(native.set.is_empty());
        native.set.emit(&lost());
        native.set.emit(&Event::BluetoothEnabled);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_by_name_leaves_other_names_alone() {
        let native = Arc::new(Native::default());
        let mut registry = EventRegistry::new(native.clone());
        let (lost_hits, on_lost) = counter();
        let (enabled_hits, on_enabled) = counter();
        registry.subscribe(EventName::ConnectionLost, on_lost.clone()).unwrap();
        registry.subscribe(EventName::ConnectionLost, on_lost).unwrap();
        registry.subscribe(EventName::BluetoothEnabled, on_enabled).unwrap();

        registry.unsubscribe_by_name(EventName::ConnectionLost);
        native.set.emit(&lost());
        native.set.emit(&Event::BluetoothEnabled);

        assert_eq!(lost_hits.load(Ordering::SeqCst), 0);
        assert_eq!(enabled_hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn native_off_failure_still_drops_local_entry() {
        let native = Arc::new(Native {
            fail_off: true,
            ..Native::default()
        });
        let mut registry = EventRegistry::new(native.clone());
        let (_, l) = counter();
        registry.subscribe(EventName::Error, l.clone()).unwrap();

        registry.unsubscribe(EventName::Error, &l);
        assert!(registry.is_empty());
    }

    #[test]
    fn drop_releases_remaining_registrations() {
        let native = Arc::new(Native::default());
        let (_, l) = counter();
        {
            let mut registry = EventRegistry::new(native.clone());
            registry.subscribe(EventName::Data, l.clone()).unwrap();
            registry.subscribe(EventName::RawData, l).unwrap();
        }
        assert!(native.set.is_empty());
        assert_eq!(
            native.calls.lock().unwrap().iter().filter(|(call, _)| *call == "off").count(),
            2
        );
    }
}
