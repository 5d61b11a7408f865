//! The process-wide directory of groups, devices, services and pending
//! connections (spec.md §3, §4.4).
//!
//! A single [`std::sync::Mutex`] (`groupsM` in spec.md) guards every
//! sub-registry. A synchronous mutex is the right choice, not a
//! `tokio::sync::Mutex`, precisely because the locking discipline forbids
//! socket I/O while the lock is held (spec.md §4.4): every critical section
//! here is non-async, so there is never an `.await` between lock and unlock.

use crate::connid::ConnIdAllocator;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::BufWriter;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{oneshot, Mutex as AsyncMutex};

pub type Writer = BufWriter<OwnedWriteHalf>;
pub type SharedWriter = Arc<AsyncMutex<Writer>>;
pub type SharedReader = Arc<AsyncMutex<OwnedReadHalf>>;

/// A registered session handle (`ConnSet` in spec.md §3).
///
/// `reader` is populated only for pending CONNECT entries, where it is later
/// handed to the LINK worker for splicing; JOIN/DISCOVER/LISTEN entries keep
/// their reader local to the owning worker and store `None` here, since no
/// other session ever needs to read from them.
pub struct ConnSet {
    pub writer: SharedWriter,
    pub reader: Option<SharedReader>,
    pub available: bool,
    /// Fired by the LINK worker once the spliced pair has torn down, so the
    /// original CONNECT worker can stop waiting without re-polling a reader
    /// it no longer owns (spec.md §4.5's "synchronization signal" idea,
    /// reused here for the CONNECT/LINK handoff).
    pub closed_tx: Option<oneshot::Sender<()>>,
}

impl ConnSet {
    pub fn new(writer: SharedWriter) -> Self {
        Self {
            writer,
            reader: None,
            available: true,
            closed_tx: None,
        }
    }
}

/// One logical namespace's four sub-registries (spec.md §3).
#[derive(Default)]
pub struct Group {
    pub discoverable: HashMap<String, ConnSet>,
    pub discovering: HashMap<String, ConnSet>,
    pub serving: HashMap<String, HashMap<String, ConnSet>>,
    pub connections: HashMap<u64, ConnSet>,
}

impl Group {
    fn is_empty(&self) -> bool {
        self.discoverable.is_empty()
            && self.discovering.is_empty()
            && self.serving.is_empty()
            && self.connections.is_empty()
    }
}

/// Point-in-time cardinalities, used by the statistics sampler (spec.md §4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryStats {
    pub groups: usize,
    pub discoverable: usize,
    pub discovering: usize,
    pub serving: usize,
    pub connections: usize,
}

/// Process-wide directory of groups (spec.md §4.4).
pub struct Directory {
    groups: Mutex<HashMap<String, Group>>,
    conn_ids: ConnIdAllocator,
    active_sessions: AtomicUsize,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            conn_ids: ConnIdAllocator::new(),
            active_sessions: AtomicUsize::new(0),
        }
    }

    /// Resolves an (possibly empty) group name to the string actually used
    /// as the registry key, substituting the peer's IP per spec.md §3.
    pub fn resolve_group_name(group: &str, peer_ip: IpAddr) -> String {
        if group.is_empty() {
            peer_ip.to_string()
        } else {
            group.to_string()
        }
    }

    pub fn session_started(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_ended(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Removes a group if every one of its sub-registries is empty
    /// (lazy destruction, spec.md §3 invariant 4).
    fn prune_if_empty(groups: &mut HashMap<String, Group>, group: &str) {
        if groups.get(group).is_some_and(Group::is_empty) {
            groups.remove(group);
        }
    }

    // ---- JOIN (discoverable) ----------------------------------------

    /// Registers `discoverable[address]` and snapshots every `discovering`
    /// writer in the same group, as a single critical section.
    ///
    /// This must be one lock acquisition, not insert-then-snapshot as two
    /// separate calls: spec.md §8 requires that a DISCOVER session present
    /// before a JOIN receives exactly one notification for that JOIN. If
    /// JOIN's insert and its fan-out snapshot were separated, a concurrent
    /// DISCOVER could register and take its own initial-batch snapshot in
    /// between them — seeing the new `discoverable[address]` in its batch
    /// *and* still being present for JOIN's fan-out snapshot, producing two
    /// deliveries. One lock acquisition orders the two commands relative to
    /// each other and collapses the race to exactly one delivery path.
    pub fn join_and_snapshot_discovering(
        &self,
        group: &str,
        address: String,
        writer: SharedWriter,
    ) -> Vec<SharedWriter> {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        let g = groups.entry(group.to_string()).or_default();
        g.discoverable.insert(address, ConnSet::new(writer));
        g.discovering.values().map(|c| c.writer.clone()).collect()
    }

    pub fn leave_discoverable(&self, group: &str, address: &str) {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        if let Some(g) = groups.get_mut(group) {
            g.discoverable.remove(address);
        }
        Self::prune_if_empty(&mut groups, group);
    }

    // ---- DISCOVER (discovering) --------------------------------------

    /// Snapshots `discoverable` addresses excluding `address`, then
    /// registers `discovering[address]`, as a single critical section —
    /// the DISCOVER-side half of the same JOIN/DISCOVER atomicity
    /// requirement described on [`Directory::join_and_snapshot_discovering`].
    pub fn discover_and_snapshot_discoverable(
        &self,
        group: &str,
        address: String,
        writer: SharedWriter,
    ) -> Vec<String> {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        let g = groups.entry(group.to_string()).or_default();
        let batch = g
            .discoverable
            .keys()
            .filter(|a| a.as_str() != address.as_str())
            .cloned()
            .collect();
        g.discovering.insert(address, ConnSet::new(writer));
        batch
    }

    pub fn leave_discovering(&self, group: &str, address: &str) {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        if let Some(g) = groups.get_mut(group) {
            g.discovering.remove(address);
        }
        Self::prune_if_empty(&mut groups, group);
    }

    // ---- LISTEN (serving) ---------------------------------------------

    /// Inserts `serving[address][uuid]` iff it does not already exist.
    /// Returns `false` (and leaves the registry untouched) if it does —
    /// the caller refuses without touching the registry (spec.md §4.3, §7).
    pub fn listen(&self, group: &str, address: &str, uuid: &str, writer: SharedWriter) -> bool {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        let g = groups.entry(group.to_string()).or_default();
        let services = g.serving.entry(address.to_string()).or_default();
        if services.contains_key(uuid) {
            return false;
        }
        services.insert(uuid.to_string(), ConnSet::new(writer));
        true
    }

    pub fn leave_serving(&self, group: &str, address: &str, uuid: &str) {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        if let Some(g) = groups.get_mut(group) {
            if let Some(services) = g.serving.get_mut(address) {
                services.remove(uuid);
                if services.is_empty() {
                    g.serving.remove(address);
                }
            }
        }
        Self::prune_if_empty(&mut groups, group);
    }

    /// Validates and claims `serving[addr][uuid]` for a CONNECT (spec.md
    /// §4.3, cmd 4): checks existence and availability, and flips
    /// `available = false` atomically with the check, all under one lock
    /// acquisition. Returns the service's writer handle on success.
    pub fn claim_service(&self, group: &str, addr: &str, uuid: &str) -> Option<SharedWriter> {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        let conn = groups
            .get_mut(group)?
            .serving
            .get_mut(addr)?
            .get_mut(uuid)?;
        if !conn.available {
            return None;
        }
        conn.available = false;
        Some(conn.writer.clone())
    }

    /// Restores `serving[addr][uuid].available = true` if the entry still
    /// exists (spec.md §4.3, cmd 4, exit cleanup). A no-op if the LISTEN
    /// session has since exited and removed the entry.
    pub fn restore_service_available(&self, group: &str, addr: &str, uuid: &str) {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        if let Some(conn) = groups
            .get_mut(group)
            .and_then(|g| g.serving.get_mut(addr))
            .and_then(|services| services.get_mut(uuid))
        {
            conn.available = true;
        }
    }

    // ---- CONNECT (connections) -----------------------------------------

    pub fn next_conn_id(&self) -> u64 {
        self.conn_ids.next()
    }

    pub fn insert_connection(
        &self,
        group: &str,
        conn_id: u64,
        writer: SharedWriter,
        reader: SharedReader,
        closed_tx: oneshot::Sender<()>,
    ) {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        let mut entry = ConnSet::new(writer);
        entry.reader = Some(reader);
        entry.closed_tx = Some(closed_tx);
        groups
            .entry(group.to_string())
            .or_default()
            .connections
            .insert(conn_id, entry);
    }

    pub fn connection_available(&self, group: &str, conn_id: u64) -> bool {
        let groups = self.groups.lock().expect("groupsM poisoned");
        groups
            .get(group)
            .and_then(|g| g.connections.get(&conn_id))
            .map(|c| c.available)
            .unwrap_or(false)
    }

    /// Removes `connections[connId]` on the CONNECT worker's exit (spec.md
    /// §4.3, cmd 4). Returns whatever `closed_tx` was left over (there
    /// normally isn't one left: LINK takes it when it claims the entry).
    pub fn remove_connection(&self, group: &str, conn_id: u64) {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        if let Some(g) = groups.get_mut(group) {
            g.connections.remove(&conn_id);
        }
        Self::prune_if_empty(&mut groups, group);
    }

    /// LINK's claim (spec.md §4.3, cmd 5): looks up `connections[connId]`,
    /// captures its reader/writer, flips `available = false`, and hands
    /// back the `closed_tx` so LINK can signal teardown later. Returns
    /// `None` if the connection id is unknown — LINK terminates silently.
    pub fn claim_connection(
        &self,
        group: &str,
        conn_id: u64,
    ) -> Option<(SharedReader, SharedWriter, oneshot::Sender<()>)> {
        let mut groups = self.groups.lock().expect("groupsM poisoned");
        let conn = groups.get_mut(group)?.connections.get_mut(&conn_id)?;
        let reader = conn.reader.clone()?;
        let writer = conn.writer.clone();
        let closed_tx = conn.closed_tx.take()?;
        conn.available = false;
        Some((reader, writer, closed_tx))
    }

    pub fn stats(&self) -> DirectoryStats {
        let groups = self.groups.lock().expect("groupsM poisoned");
        let mut stats = DirectoryStats {
            groups: groups.len(),
            ..Default::default()
        };
        for g in groups.values() {
            stats.discoverable += g.discoverable.len();
            stats.discovering += g.discovering.len();
            stats.serving += g.serving.values().map(HashMap::len).sum::<usize>();
            stats.connections += g.connections.len();
        }
        stats
    }

    #[cfg(test)]
    pub fn group_count(&self) -> usize {
        self.groups.lock().expect("groupsM poisoned").len()
    }
}
