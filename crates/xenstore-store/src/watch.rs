use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::path::home_subtree_prefix;

/// A registered subscription (§4.D). `token` is the caller-supplied opaque
/// value echoed back on every fired event; it is never interpreted here.
/// `is_relative` records whether `path` was supplied in relative form, so
/// delivered event paths can be rewritten the same way (§8 scenarios S2/S3).
#[derive(Debug, Clone, PartialEq, Eq)]
struct Watch {
    domid: u32,
    path: Vec<u8>,
    token: Vec<u8>,
    is_relative: bool,
}

/// An event queued for delivery to one guest's worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub path: Vec<u8>,
    pub token: Vec<u8>,
}

/// Active subscriptions plus each guest's queue of events not yet collected
/// by its worker (§4.D). Locking order is registry lock, then the pending
/// map's lock — never the reverse, and never nested under a guest's own
/// worker-stack lock, which is always a leaf.
pub struct WatchRegistry {
    watches: Mutex<Vec<Watch>>,
    pending: Mutex<HashMap<u32, VecDeque<PendingEvent>>>,
}

impl WatchRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { watches: Mutex::new(Vec::new()), pending: Mutex::new(HashMap::new()) }
    }

    /// Registers `domid`'s interest in `path`. If a watch with the same
    /// `(path, token)` already exists for any guest, its `is_relative` flag
    /// is updated in place rather than inserting a duplicate (§4.D `add`).
    /// If `path_exists` (the caller already resolved this against the
    /// store), a synthetic event fires immediately so the watcher learns
    /// the current state without racing a concurrent write.
    pub fn add(&self, domid: u32, path: &[u8], token: &[u8], is_relative: bool, path_exists: bool) {
        let mut watches = self.watches.lock().unwrap();
        if let Some(existing) = watches.iter_mut().find(|w| w.path == path && w.token == token) {
            existing.is_relative = is_relative;
        } else {
            watches.push(Watch { domid, path: path.to_vec(), token: token.to_vec(), is_relative });
        }
        drop(watches);

        if path_exists {
            let delivered = Self::deliver_path(path, domid, is_relative);
            let mut pending = self.pending.lock().unwrap();
            pending.entry(domid).or_default().push_back(PendingEvent {
                path: delivered,
                token: token.to_vec(),
            });
        }
    }

    /// Unregisters a single `(domid, path, token)` subscription.
    pub fn remove(&self, domid: u32, path: &[u8], token: &[u8]) {
        let mut watches = self.watches.lock().unwrap();
        watches.retain(|w| !(w.domid == domid && w.path == path && w.token == token));
    }

    /// `RESET_WATCHES`: clears every subscription in the directory, not just
    /// the caller's — reproduced as-is even though only the issuing guest's
    /// watches would usually be expected to go away.
    pub fn reset_all(&self) {
        self.watches.lock().unwrap().clear();
        self.pending.lock().unwrap().clear();
    }

    /// Removes every subscription and queued event belonging to `domid`,
    /// called when a guest's connection is torn down.
    pub fn purge(&self, domid: u32) {
        self.watches.lock().unwrap().retain(|w| w.domid != domid);
        self.pending.lock().unwrap().remove(&domid);
    }

    /// Fires every watch whose registered path is a byte-wise prefix of
    /// `changed_path` (so `/a` matches a watch on `/a` and on `/`, the same
    /// `memcmp`-on-prefix-length rule the source uses — not a slash-aware
    /// ancestor check, so a watch on `/ab` also matches a change at
    /// `/abc`). `source_domid`'s own watches are skipped: a guest does not
    /// see events caused by its own request.
    pub fn notify(&self, changed_path: &[u8], source_domid: u32) {
        let watches = self.watches.lock().unwrap();
        let matches: Vec<&Watch> = watches
            .iter()
            .filter(|w| w.domid != source_domid && changed_path.starts_with(w.path.as_slice()))
            .collect();
        if matches.is_empty() {
            return;
        }
        let mut pending = self.pending.lock().unwrap();
        for watch in matches {
            let delivered = Self::deliver_path(changed_path, watch.domid, watch.is_relative);
            pending.entry(watch.domid).or_default().push_back(PendingEvent {
                path: delivered,
                token: watch.token.clone(),
            });
        }
    }

    /// Drains and returns every event queued for `domid`, in arrival order.
    pub fn drain(&self, domid: u32) -> Vec<PendingEvent> {
        let mut pending = self.pending.lock().unwrap();
        pending.remove(&domid).map(Vec::from).unwrap_or_default()
    }

    /// `true` if `domid` has at least one event waiting.
    #[must_use]
    pub fn has_pending(&self, domid: u32) -> bool {
        self.pending.lock().unwrap().get(&domid).is_some_and(|q| !q.is_empty())
    }

    /// Rewrites an absolute changed path for delivery to `owner`: stripped
    /// of its home-subtree prefix if the watch was registered relative,
    /// left as-is otherwise (or if the prefix doesn't actually match, which
    /// should not happen for a well-formed relative watch).
    fn deliver_path(absolute_path: &[u8], owner: u32, is_relative: bool) -> Vec<u8> {
        if !is_relative {
            return absolute_path.to_vec();
        }
        let prefix = home_subtree_prefix(owner);
        absolute_path.strip_prefix(prefix.as_slice()).map_or_else(|| absolute_path.to_vec(), <[u8]>::to_vec)
    }
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_on_an_existing_path_fires_immediately() {
        let reg = WatchRegistry::new();
        reg.add(7, b"/a", b"tok", false, true);
        assert_eq!(reg.drain(7), vec![PendingEvent { path: b"/a".to_vec(), token: b"tok".to_vec() }]);
    }

    #[test]
    fn registering_on_a_missing_path_does_not_fire() {
        let reg = WatchRegistry::new();
        reg.add(7, b"/a", b"tok", false, false);
        assert!(reg.drain(7).is_empty());
    }

    #[test]
    fn notify_matches_byte_wise_prefix_not_path_segments() {
        let reg = WatchRegistry::new();
        reg.add(1, b"/ab", b"tok", false, false);
        reg.notify(b"/abc", 9);
        assert_eq!(reg.drain(1).len(), 1);
    }

    #[test]
    fn notify_suppresses_the_source_domains_own_watch() {
        let reg = WatchRegistry::new();
        reg.add(5, b"/a", b"tok", false, false);
        reg.notify(b"/a/b", 5);
        assert!(reg.drain(5).is_empty());
    }

    #[test]
    fn notify_wakes_every_other_watcher_of_an_ancestor_path() {
        let reg = WatchRegistry::new();
        reg.add(1, b"/a", b"t1", false, false);
        reg.add(2, b"/a/b", b"t2", false, false);
        reg.notify(b"/a/b/c", 3);
        assert_eq!(reg.drain(1).len(), 1);
        assert_eq!(reg.drain(2).len(), 1);
    }

    #[test]
    fn reset_all_clears_every_domains_watches() {
        let reg = WatchRegistry::new();
        reg.add(1, b"/a", b"t1", false, false);
        reg.add(2, b"/a", b"t2", false, false);
        reg.reset_all();
        reg.notify(b"/a", 99);
        assert!(reg.drain(1).is_empty());
        assert!(reg.drain(2).is_empty());
    }

    #[test]
    fn purge_drops_only_the_named_domain() {
        let reg = WatchRegistry::new();
        reg.add(1, b"/a", b"t1", false, false);
        reg.add(2, b"/a", b"t2", false, false);
        reg.purge(1);
        reg.notify(b"/a", 99);
        assert!(reg.drain(1).is_empty());
        assert_eq!(reg.drain(2).len(), 1);
    }

    #[test]
    fn remove_is_specific_to_one_token() {
        let reg = WatchRegistry::new();
        reg.add(1, b"/a", b"t1", false, false);
        reg.add(1, b"/a", b"t2", false, false);
        reg.remove(1, b"/a", b"t1");
        reg.notify(b"/a", 99);
        assert_eq!(reg.drain(1), vec![PendingEvent { path: b"/a".to_vec(), token: b"t2".to_vec() }]);
    }

    #[test]
    fn relative_watch_delivers_path_stripped_of_home_subtree() {
        let reg = WatchRegistry::new();
        reg.add(3, b"/local/domain/3/cfg", b"tok", true, false);
        reg.notify(b"/local/domain/3/cfg/x", 0);
        assert_eq!(
            reg.drain(3),
            vec![PendingEvent { path: b"cfg/x".to_vec(), token: b"tok".to_vec() }]
        );
    }

    #[test]
    fn absolute_watch_delivers_full_path() {
        let reg = WatchRegistry::new();
        reg.add(3, b"/local/domain/3/cfg", b"tok", false, false);
        reg.notify(b"/local/domain/3/cfg/x", 0);
        assert_eq!(
            reg.drain(3),
            vec![PendingEvent { path: b"/local/domain/3/cfg/x".to_vec(), token: b"tok".to_vec() }]
        );
    }
}
