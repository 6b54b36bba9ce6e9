//! The hierarchical key/value tree, path normalization, and watch fan-out
//! that back the xenstore directory service (§4.B, §4.C, §4.D). The store
//! and watch registry are plain, lock-guarded data structures; this crate's
//! only cross-cutting piece is [`DirectoryService`], which pairs the two so
//! every mutation notifies the watches it should.

mod error;
mod path;
mod tree;
mod watch;

pub use error::StoreError;
pub use path::{construct_path, home_subtree_prefix, is_abs_path, is_root_path, tokenize, ABS_PATH_MAX, MAX_LOCALPATH_LEN};
pub use tree::Store;
pub use watch::{PendingEvent, WatchRegistry};

/// Bundles a [`Store`] and [`WatchRegistry`] instantiated once at startup
/// and shared by every guest worker, per the design note on avoiding global
/// mutable state (§9): callers thread one `DirectoryService` through
/// instead of reaching for statics.
#[derive(Default)]
pub struct DirectoryService {
    store: Store,
    watches: WatchRegistry,
}

impl DirectoryService {
    #[must_use]
    pub fn new() -> Self {
        Self { store: Store::new(), watches: WatchRegistry::new() }
    }

    /// # Errors
    ///
    /// See [`Store::write`].
    pub fn write(&self, path: &[u8], value: &[u8], domid: u32) -> Result<(), StoreError> {
        self.store.write(path, value)?;
        self.watches.notify(path, domid);
        Ok(())
    }

    /// # Errors
    ///
    /// See [`Store::mkdir`].
    pub fn mkdir(&self, path: &[u8], domid: u32) -> Result<(), StoreError> {
        self.store.mkdir(path)?;
        self.watches.notify(path, domid);
        Ok(())
    }

    /// # Errors
    ///
    /// See [`Store::read`].
    pub fn read(&self, path: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.store.read(path)
    }

    /// # Errors
    ///
    /// See [`Store::directory`].
    pub fn directory(&self, path: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        self.store.directory(path)
    }

    /// # Errors
    ///
    /// See [`Store::rm`].
    pub fn rm(&self, path: &[u8], domid: u32) -> Result<(), StoreError> {
        self.store.rm(path)?;
        self.watches.notify(path, domid);
        Ok(())
    }

    /// Registers `domid`'s watch on `path` (already resolved to an absolute
    /// path by the caller; `is_relative` records whether that resolution
    /// added the home-subtree prefix, so delivered events can be rewritten
    /// the same way), firing an initial synthetic event if the path already
    /// exists (§4.D).
    pub fn watch(&self, domid: u32, path: &[u8], token: &[u8], is_relative: bool) {
        let exists = self.store.exists(path);
        self.watches.add(domid, path, token, is_relative, exists);
    }

    pub fn unwatch(&self, domid: u32, path: &[u8], token: &[u8]) {
        self.watches.remove(domid, path, token);
    }

    pub fn reset_watches(&self) {
        self.watches.reset_all();
    }

    /// Drops every watch and queued event belonging to `domid` (teardown).
    pub fn purge_domain(&self, domid: u32) {
        self.watches.purge(domid);
    }

    /// Collects `domid`'s pending watch events for delivery.
    pub fn drain_events(&self, domid: u32) -> Vec<PendingEvent> {
        self.watches.drain(domid)
    }

    #[must_use]
    pub fn has_pending_events(&self, domid: u32) -> bool {
        self.watches.has_pending(domid)
    }
}
