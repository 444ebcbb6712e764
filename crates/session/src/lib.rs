//! The peer registry: per-peer candidate endpoints, replay/send counters and
//! a liveness state machine, grounded on the same `Table`/`Timer`/`ReadLock`
//! shape this project's teacher lineage uses for its session table, adapted
//! from a port-allocation problem to a NAT-traversal one.

pub mod record;
pub mod table;

pub use record::{ActivePath, CandidateEndpoint, EndpointSource, Liveness, PeerRecord};
pub use table::{ReadLock, Table};

use std::{
    collections::hash_map::Entry,
    net::SocketAddr,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::RwLock;

pub type PeerId = [u8; 32];
pub type RelayToken = [u8; 16];

/// Observer hooks for liveness transitions, mirroring the teacher's
/// `ServiceHandler`/`Observer` trait shape: every method has a no-op
/// default so implementers only override what they need.
pub trait PeerObserver: Send + Sync {
    #[allow(unused_variables)]
    fn on_live(&self, peer_id: &PeerId) {}

    #[allow(unused_variables)]
    fn on_stale(&self, peer_id: &PeerId) {}

    #[allow(unused_variables)]
    fn on_dead(&self, peer_id: &PeerId) {}

    #[allow(unused_variables)]
    fn on_roam(&self, peer_id: &PeerId, new_addr: SocketAddr) {}
}

/// A monotone tick counter, advanced once per second by the registry's
/// background sweeper. Cheap to read from any thread without a lock.
#[derive(Default)]
pub struct Timer(AtomicU64);

impl Timer {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn add(&self, n: u64) -> u64 {
        self.0.fetch_add(n, Ordering::Relaxed) + n
    }
}

const STALE_AFTER: Duration = Duration::from_secs(30);
const DEAD_AFTER_MISSED_PROBES: u32 = 3;

pub struct PeerRegistry<T> {
    peers: RwLock<Table<PeerId, PeerRecord>>,
    timer: Timer,
    handler: T,
}

impl<T: PeerObserver + Clone + Send + Sync + 'static> PeerRegistry<T> {
    /// Creates a registry and spawns its background sweeper thread, which
    /// advances the timer and retires peers that have gone quiet.
    ///
    /// The sweeper holds only a `Weak` reference, so the registry's drop is
    /// never blocked on the sweeper thread's next wakeup.
    pub fn new(handler: T) -> Arc<Self> {
        let registry = Arc::new(Self {
            peers: RwLock::new(Table::with_capacity(64)),
            timer: Timer::default(),
            handler,
        });

        let weak: Weak<Self> = Arc::downgrade(&registry);
        thread::spawn(move || {
            loop {
                thread::sleep(Duration::from_secs(1));

                let Some(registry) = weak.upgrade() else {
                    break;
                };

                registry.timer.add(1);
                registry.sweep();
            }
        });

        registry
    }

    fn sweep(&self) {
        let now = Instant::now();
        let mut to_dead = Vec::new();
        let mut to_stale = Vec::new();

        {
            let mut peers = self.peers.write();
            for (peer_id, record) in peers.iter_mut() {
                match record.liveness {
                    Liveness::Live => {
                        let idle = record
                            .last_inbound
                            .map(|t| now.duration_since(t))
                            .unwrap_or(STALE_AFTER);
                        if idle >= STALE_AFTER {
                            record.liveness = Liveness::Stale;
                            to_stale.push(*peer_id);
                        }
                    }
                    Liveness::Stale => {
                        if record.probe_fail_streak >= DEAD_AFTER_MISSED_PROBES {
                            record.liveness = Liveness::Dead;
                            record.active_path = None;
                            to_dead.push(*peer_id);
                        }
                    }
                    _ => {}
                }
            }
        }

        for peer_id in to_stale {
            self.handler.on_stale(&peer_id);
        }
        for peer_id in to_dead {
            self.handler.on_dead(&peer_id);
        }
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Returns the record for `peer_id`, creating an `unknown`-state one if
    /// this is the first time the registry has seen it.
    pub fn get_or_create(&self, peer_id: &PeerId) -> ReadLock<'_, PeerId, Table<PeerId, PeerRecord>> {
        {
            let peers = self.peers.upgradable_read();
            if peers.contains_key(peer_id) {
                return ReadLock {
                    key: peer_id,
                    lock: parking_lot::RwLockUpgradableReadGuard::downgrade(peers),
                };
            }

            let mut peers = parking_lot::RwLockUpgradableReadGuard::upgrade(peers);
            if let Entry::Vacant(entry) = peers.entry(*peer_id) {
                entry.insert(PeerRecord::new(*peer_id));
            }
        }

        ReadLock {
            key: peer_id,
            lock: self.peers.read(),
        }
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<ReadLock<'_, PeerId, Table<PeerId, PeerRecord>>> {
        let peers = self.peers.read();
        if peers.contains_key(peer_id) {
            Some(ReadLock {
                key: peer_id,
                lock: peers,
            })
        } else {
            None
        }
    }

    /// Records an authenticated inbound packet. Returns `false` if the
    /// counter was rejected as a replay (caller must drop the packet).
    pub fn accept_inbound(&self, peer_id: &PeerId, counter: u64, source: SocketAddr) -> bool {
        let mut peers = self.peers.write();
        let record = peers
            .entry(*peer_id)
            .or_insert_with(|| PeerRecord::new(*peer_id));

        if !record.replay_window.accept(counter) {
            return false;
        }

        let roamed = record
            .active_path
            .as_ref()
            .is_some_and(|p| !matches!(p, ActivePath::Candidate(a) if *a == source));

        record.last_inbound = Some(Instant::now());
        record.probe_fail_streak = 0;
        if record.liveness == Liveness::Unknown || record.liveness == Liveness::Probing {
            record.liveness = Liveness::Live;
            drop(peers);
            self.handler.on_live(peer_id);
            if roamed {
                self.handler.on_roam(peer_id, source);
            }
            return true;
        }
        if record.liveness == Liveness::Stale {
            record.liveness = Liveness::Live;
        }

        drop(peers);
        if roamed {
            self.handler.on_roam(peer_id, source);
        }
        true
    }

    /// Allocates the next strictly-increasing send counter for `peer_id`.
    /// Returns `None` on `u64` overflow (caller must rekey or reset).
    pub fn next_send_counter(&self, peer_id: &PeerId) -> Option<u64> {
        let mut peers = self.peers.write();
        let record = peers
            .entry(*peer_id)
            .or_insert_with(|| PeerRecord::new(*peer_id));
        record.send_counter = record.send_counter.checked_add(1)?;
        Some(record.send_counter)
    }

    pub fn remove(&self, peer_id: &PeerId) {
        self.peers.write().remove(peer_id);
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.read().keys().copied().collect()
    }

    /// Applies `f` to the record for `peer_id` under the write lock, for
    /// callers (path manager, channel mux) that need to mutate more than one
    /// field atomically.
    pub fn with_mut<R>(&self, peer_id: &PeerId, f: impl FnOnce(&mut PeerRecord) -> R) -> Option<R> {
        let mut peers = self.peers.write();
        peers.get_mut(peer_id).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct NoopObserver;
    impl PeerObserver for NoopObserver {}

    #[test]
    fn first_inbound_packet_marks_peer_live() {
        let registry = PeerRegistry::new(NoopObserver);
        let peer_id = [1u8; 32];
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert!(registry.accept_inbound(&peer_id, 1, addr));
        let record = registry.get(&peer_id).unwrap();
        assert_eq!(record.liveness, Liveness::Live);
    }

    #[test]
    fn replayed_counter_is_rejected() {
        let registry = PeerRegistry::new(NoopObserver);
        let peer_id = [2u8; 32];
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert!(registry.accept_inbound(&peer_id, 5, addr));
        assert!(!registry.accept_inbound(&peer_id, 5, addr));
    }

    #[test]
    fn send_counter_is_strictly_monotone() {
        let registry = PeerRegistry::new(NoopObserver);
        let peer_id = [3u8; 32];

        let a = registry.next_send_counter(&peer_id).unwrap();
        let b = registry.next_send_counter(&peer_id).unwrap();
        let c = registry.next_send_counter(&peer_id).unwrap();
        assert!(a < b && b < c);
    }
}
