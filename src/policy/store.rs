//! Versioned, atomically swapped policy store.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::policy::PolicySnapshot;

/// Holds the current [`PolicySnapshot`].
///
/// Reads are lock-free. Installs are serialized by a writer lock so the
/// version comparison and the swap happen as one step.
pub struct PolicyStore {
    current: ArcSwap<PolicySnapshot>,
    writer: Mutex<()>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(PolicySnapshot::empty()),
            writer: Mutex::new(()),
        }
    }

    /// The snapshot in force right now.
    pub fn current(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    pub fn version(&self) -> i64 {
        self.current.load().version
    }

    /// Install `snapshot` if its version is strictly newer.
    pub fn set_snapshot(&self, snapshot: PolicySnapshot) -> bool {
        self.install(snapshot, |_| {})
    }

    /// Install `snapshot` if its version is strictly newer, then run
    /// `on_installed` while still holding the writer lock.
    ///
    /// Returns whether the snapshot was installed.
    pub fn install<F>(&self, snapshot: PolicySnapshot, on_installed: F) -> bool
    where
        F: FnOnce(&PolicySnapshot),
    {
        let _guard = self.writer.lock().expect("policy store mutex poisoned");

        let installed_version = self.current.load().version;
        if snapshot.version <= installed_version {
            tracing::debug!(
                offered = snapshot.version,
                installed = installed_version,
                "Ignoring policy snapshot that is not newer"
            );
            return false;
        }

        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        on_installed(snapshot.as_ref());

        tracing::info!(
            version = snapshot.version,
            endpoints = snapshot.endpoints.len(),
            blocklists = snapshot.blocked_ip_lists.len(),
            block = snapshot.block,
            "Installed policy snapshot"
        );
        true
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}
