use crate::nt::table::{NetworkTable, NetworkTableEntry};
use crate::nt::value::Value;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::ops::BitOr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Origin id of changes made through this process' own API.
pub const LOCAL_ORIGIN: u64 = 0;

const UPDATE_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotifyFlags(u8);

impl NotifyFlags {
    pub const NONE: NotifyFlags = NotifyFlags(0);
    /// Fire once on registration if the entry already exists.
    pub const IMMEDIATE: NotifyFlags = NotifyFlags(0x01);
    /// Also fire for changes made by this process.
    pub const LOCAL: NotifyFlags = NotifyFlags(0x02);
    pub const NEW: NotifyFlags = NotifyFlags(0x04);
    pub const UPDATE: NotifyFlags = NotifyFlags(0x10);

    pub fn contains(self, other: NotifyFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for NotifyFlags {
    type Output = NotifyFlags;

    fn bitor(self, rhs: NotifyFlags) -> NotifyFlags {
        NotifyFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryNotification {
    pub key: String,
    pub value: Value,
    pub flags: NotifyFlags,
}

type ListenerFn = Arc<dyn Fn(&EntryNotification) + Send + Sync>;

struct Listener {
    key: String,
    flags: NotifyFlags,
    callback: ListenerFn,
}

/// A committed change, fanned out to the transport sessions.
#[derive(Debug, Clone)]
pub struct Update {
    pub key: String,
    pub value: Value,
    pub origin: u64,
}

struct Inner {
    entries: Mutex<BTreeMap<String, Value>>,
    listeners: Mutex<Vec<Listener>>,
    updates: broadcast::Sender<Update>,
    next_peer: AtomicU64,
}

#[derive(Clone)]
pub struct NetworkTableInstance {
    inner: Arc<Inner>,
}

impl Default for NetworkTableInstance {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl NetworkTableInstance {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        NetworkTableInstance {
            inner: Arc::new(Inner {
                entries: Mutex::new(BTreeMap::new()),
                listeners: Mutex::new(Vec::new()),
                updates,
                next_peer: AtomicU64::new(LOCAL_ORIGIN + 1),
            }),
        }
    }

    /// Table rooted at `/<name>`.
    pub fn get_table(&self, name: &str) -> NetworkTable {
        NetworkTable::new(self.clone(), name)
    }

    pub fn get_entry(&self, key: &str) -> NetworkTableEntry {
        NetworkTableEntry::new(self.clone(), key)
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        lock(&self.inner.entries).get(key).cloned()
    }

    /// Stores a value written by this process.
    /// Returns false if the entry already holds a value of another type.
    pub fn set_value(&self, key: &str, value: Value) -> bool {
        self.apply(key, value, LOCAL_ORIGIN)
    }

    /// Stores a value coming from `origin` (a transport peer or [`LOCAL_ORIGIN`]),
    /// fans it out and fires matching listeners.
    pub fn apply(&self, key: &str, value: Value, origin: u64) -> bool {
        let is_new = {
            let mut entries = lock(&self.inner.entries);
            match entries.get(key) {
                Some(old) if !old.same_type(&value) => {
                    warn!(
                        "Rejected {} value for entry '{}' holding a {}",
                        value.type_name(),
                        key,
                        old.type_name()
                    );
                    return false;
                }
                Some(old) if *old == value => return true,
                Some(_) => {
                    entries.insert(key.to_string(), value.clone());
                    false
                }
                None => {
                    entries.insert(key.to_string(), value.clone());
                    true
                }
            }
        };

        // No subscribers simply means no transport is running.
        let _ = self.inner.updates.send(Update {
            key: key.to_string(),
            value: value.clone(),
            origin,
        });

        let mut flags = if is_new { NotifyFlags::NEW } else { NotifyFlags::UPDATE };
        if origin == LOCAL_ORIGIN {
            flags = flags | NotifyFlags::LOCAL;
        }
        self.notify(key, &value, flags);
        true
    }

    fn notify(&self, key: &str, value: &Value, flags: NotifyFlags) {
        let callbacks: Vec<ListenerFn> = lock(&self.inner.listeners)
            .iter()
            .filter(|l| l.key == key && Self::wants(l.flags, flags))
            .map(|l| l.callback.clone())
            .collect();
        if callbacks.is_empty() {
            return;
        }
        let notification = EntryNotification {
            key: key.to_string(),
            value: value.clone(),
            flags,
        };
        for callback in callbacks {
            callback(&notification);
        }
    }

    fn wants(listener_flags: NotifyFlags, event: NotifyFlags) -> bool {
        if event.contains(NotifyFlags::LOCAL) && !listener_flags.contains(NotifyFlags::LOCAL) {
            return false;
        }
        (event.contains(NotifyFlags::NEW) && listener_flags.contains(NotifyFlags::NEW))
            || (event.contains(NotifyFlags::UPDATE) && listener_flags.contains(NotifyFlags::UPDATE))
    }

    pub fn add_entry_listener<F>(&self, key: &str, flags: NotifyFlags, callback: F)
    where
        F: Fn(&EntryNotification) + Send + Sync + 'static,
    {
        let callback: ListenerFn = Arc::new(callback);
        lock(&self.inner.listeners).push(Listener {
            key: key.to_string(),
            flags,
            callback: callback.clone(),
        });
        debug!("Registered listener on '{}' ({:?})", key, flags);

        if flags.contains(NotifyFlags::IMMEDIATE) {
            if let Some(value) = self.get_value(key) {
                callback(&EntryNotification {
                    key: key.to_string(),
                    value,
                    flags: NotifyFlags::IMMEDIATE | NotifyFlags::NEW,
                });
            }
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.inner.updates.subscribe()
    }

    pub(crate) fn snapshot(&self) -> Vec<(String, Value)> {
        lock(&self.inner.entries)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn next_peer_id(&self) -> u64 {
        self.inner.next_peer.fetch_add(1, Ordering::Relaxed)
    }
}
