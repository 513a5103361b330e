//! Named service registry with change notification.
//!
//! # Responsibilities
//! - Keep an ordered instance list per service name (upsert by id)
//! - Push the full updated list to every watcher of a name on each mutation
//! - Replay the current list to a watcher at subscribe time
//!
//! # Design Decisions
//! - Independent of the load balancer; no breakers or health state here
//! - Callbacks run after the registry lock is released, so a callback may call
//!   back into the registry
//! - Deliveries for one name are queued under the lock and drained by a single
//!   caller at a time; watchers see lists in mutation order. A mutation made
//!   while another thread is draining returns once queued.
//! - A failing or panicking callback is logged and skipped, never propagated
//! - Channel subscribers see the latest list; intermediate lists may coalesce
//! - Names with no instances, watchers or subscribers are dropped from the map

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use crate::instance::ServiceInstance;

/// Error returned by a watcher callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct WatchError(pub String);

impl WatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Watcher callback, invoked with the full instance list of one service.
pub type WatchCallback = Arc<dyn Fn(&[ServiceInstance]) -> Result<(), WatchError> + Send + Sync>;

/// Identity of a registered callback, used to unwatch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

/// One list to hand to a set of watchers.
struct Delivery {
    list: Vec<ServiceInstance>,
    targets: Vec<(WatchId, WatchCallback)>,
}

struct ServiceEntry {
    instances: Vec<ServiceInstance>,
    watchers: Vec<(WatchId, WatchCallback)>,
    channel: watch::Sender<Vec<ServiceInstance>>,
    pending: VecDeque<Delivery>,
    /// Set while some caller is draining `pending`.
    delivering: bool,
}

impl ServiceEntry {
    fn new() -> Self {
        let (channel, _) = watch::channel(Vec::new());
        Self {
            instances: Vec::new(),
            watchers: Vec::new(),
            channel,
            pending: VecDeque::new(),
            delivering: false,
        }
    }

    /// Publish the current list to channel subscribers and queue it for every
    /// watcher. Returns `true` if the caller must drain the queue.
    fn publish(&mut self) -> bool {
        self.channel.send_replace(self.instances.clone());
        if self.watchers.is_empty() {
            return false;
        }
        let delivery = Delivery {
            list: self.instances.clone(),
            targets: self.watchers.clone(),
        };
        self.enqueue(delivery)
    }

    fn enqueue(&mut self, delivery: Delivery) -> bool {
        self.pending.push_back(delivery);
        if self.delivering {
            return false;
        }
        self.delivering = true;
        true
    }

    fn is_idle(&self) -> bool {
        self.instances.is_empty()
            && self.watchers.is_empty()
            && self.pending.is_empty()
            && !self.delivering
            && self.channel.receiver_count() == 0
    }
}

/// Channel-based subscription to one service's instance list.
#[derive(Debug)]
pub struct ServiceWatch {
    rx: watch::Receiver<Vec<ServiceInstance>>,
}

impl ServiceWatch {
    /// The list as of now; at subscribe time this is the replayed current value.
    pub fn current(&self) -> Vec<ServiceInstance> {
        self.rx.borrow().clone()
    }

    /// Wait for the next mutation and return the updated list.
    ///
    /// Returns `None` once the registry has been dropped.
    pub async fn changed(&mut self) -> Option<Vec<ServiceInstance>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Registry of named service instance sets.
#[derive(Default)]
pub struct ServiceDiscovery {
    services: Mutex<HashMap<String, ServiceEntry>>,
    next_watch: AtomicU64,
}

impl std::fmt::Debug for ServiceDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDiscovery")
            .field("services", &self.service_names())
            .finish()
    }
}

/// Process-wide registry for callers that do not construct their own.
pub fn global() -> &'static ServiceDiscovery {
    static GLOBAL: OnceLock<ServiceDiscovery> = OnceLock::new();
    GLOBAL.get_or_init(ServiceDiscovery::new)
}

impl ServiceDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    fn services(&self) -> MutexGuard<'_, HashMap<String, ServiceEntry>> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `instance` under `name`, replacing any entry with the same id.
    pub fn register_service(&self, name: &str, instance: ServiceInstance) {
        let (count, drain) = {
            let mut services = self.services();
            let entry = services
                .entry(name.to_string())
                .or_insert_with(ServiceEntry::new);
            match entry.instances.iter_mut().find(|i| i.id == instance.id) {
                Some(existing) => *existing = instance,
                None => entry.instances.push(instance),
            }
            (entry.instances.len(), entry.publish())
        };
        tracing::debug!(service = %name, instances = count, "Service registered");
        if drain {
            self.drain(name);
        }
    }

    /// Remove the instance `id` from `name`. Watchers of a known name are
    /// notified even when no instance matched.
    pub fn deregister_service(&self, name: &str, id: &str) {
        let drain = {
            let mut services = self.services();
            let Some(entry) = services.get_mut(name) else {
                tracing::debug!(service = %name, instance = %id, "Deregister ignored, unknown service");
                return;
            };
            entry.instances.retain(|i| i.id != id);
            let drain = entry.publish();
            if !drain && entry.is_idle() {
                services.remove(name);
            }
            drain
        };
        tracing::debug!(service = %name, instance = %id, "Service deregistered");
        if drain {
            self.drain(name);
        }
    }

    /// Current instances of `name`; empty if the name is unknown.
    pub fn discover_service(&self, name: &str) -> Vec<ServiceInstance> {
        self.services()
            .get(name)
            .map(|e| e.instances.clone())
            .unwrap_or_default()
    }

    /// Register a callback and invoke it with the current list before any
    /// later notification for `name`.
    pub fn watch_service(&self, name: &str, callback: WatchCallback) -> WatchId {
        let id = WatchId(self.next_watch.fetch_add(1, Ordering::Relaxed));
        let drain = {
            let mut services = self.services();
            let entry = services
                .entry(name.to_string())
                .or_insert_with(ServiceEntry::new);
            entry.watchers.push((id, callback.clone()));
            let replay = Delivery {
                list: entry.instances.clone(),
                targets: vec![(id, callback)],
            };
            entry.enqueue(replay)
        };
        if drain {
            self.drain(name);
        }
        id
    }

    /// Remove a callback. Returns `false` if it was not registered under `name`.
    pub fn unwatch_service(&self, name: &str, id: WatchId) -> bool {
        let mut services = self.services();
        let Some(entry) = services.get_mut(name) else {
            return false;
        };
        let before = entry.watchers.len();
        entry.watchers.retain(|(watch_id, _)| *watch_id != id);
        let removed = entry.watchers.len() != before;
        if entry.is_idle() {
            services.remove(name);
        }
        removed
    }

    /// Channel subscription; `current()` replays the list at subscribe time.
    ///
    /// Names left behind by dropped subscriptions are reclaimed here.
    pub fn subscribe(&self, name: &str) -> ServiceWatch {
        let mut services = self.services();
        services.retain(|_, entry| !entry.is_idle());
        let entry = services
            .entry(name.to_string())
            .or_insert_with(ServiceEntry::new);
        ServiceWatch {
            rx: entry.channel.subscribe(),
        }
    }

    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services().keys().cloned().collect();
        names.sort();
        names
    }

    /// Deliver queued lists for `name` until the queue stays empty.
    ///
    /// Only the caller that set `delivering` runs this, so deliveries for one
    /// name never overlap or reorder.
    fn drain(&self, name: &str) {
        loop {
            let (batch, live) = {
                let mut services = self.services();
                let Some(entry) = services.get_mut(name) else {
                    return;
                };
                if entry.pending.is_empty() {
                    entry.delivering = false;
                    if entry.is_idle() {
                        services.remove(name);
                    }
                    return;
                }
                let batch: Vec<Delivery> = entry.pending.drain(..).collect();
                let live: HashSet<WatchId> = entry.watchers.iter().map(|(id, _)| *id).collect();
                (batch, live)
            };

            for delivery in &batch {
                for (id, callback) in &delivery.targets {
                    // Skip watchers removed after the list was queued.
                    if live.contains(id) {
                        invoke(name, *id, callback, &delivery.list);
                    }
                }
            }
        }
    }
}

fn invoke(name: &str, id: WatchId, callback: &WatchCallback, list: &[ServiceInstance]) {
    match catch_unwind(AssertUnwindSafe(|| callback(list))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(service = %name, watcher = ?id, error = %e, "Service watcher failed");
        }
        Err(_) => {
            tracing::error!(service = %name, watcher = ?id, "Service watcher panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use crate::instance::InstanceSpec;

    fn instance(id: &str, port: u16) -> ServiceInstance {
        ServiceInstance::from_spec(InstanceSpec::new(id, "10.0.0.1", port), SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn test_register_upserts_by_id() {
        let discovery = ServiceDiscovery::new();
        discovery.register_service("api", instance("a", 1));
        discovery.register_service("api", instance("b", 2));
        discovery.register_service("api", instance("a", 3));

        let list = discovery.discover_service("api");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "a");
        assert_eq!(list[0].port, 3);
        assert_eq!(list[1].id, "b");
    }

    #[test]
    fn test_unknown_service_is_empty() {
        let discovery = ServiceDiscovery::new();
        assert!(discovery.discover_service("nope").is_empty());
    }

    #[test]
    fn test_unwatch_unknown() {
        let discovery = ServiceDiscovery::new();
        let id = discovery.watch_service("api", Arc::new(|_: &[ServiceInstance]| Ok::<(), WatchError>(())));
        assert!(!discovery.unwatch_service("other", id));
        assert!(discovery.unwatch_service("api", id));
        assert!(!discovery.unwatch_service("api", id));
    }

    #[test]
    fn test_idle_names_are_dropped() {
        let discovery = ServiceDiscovery::new();
        discovery.deregister_service("ghost", "x");

        let id = discovery.watch_service("temp", Arc::new(|_: &[ServiceInstance]| Ok::<(), WatchError>(())));
        assert!(discovery.unwatch_service("temp", id));

        drop(discovery.subscribe("brief"));
        let _kept = discovery.subscribe("kept");

        discovery.register_service("api", instance("a", 1));
        discovery.deregister_service("api", "a");

        assert_eq!(discovery.service_names(), vec!["kept".to_string()]);
    }

    #[test]
    fn test_global_is_shared() {
        let a = global() as *const ServiceDiscovery;
        let b = global() as *const ServiceDiscovery;
        assert_eq!(a, b);
    }
}
