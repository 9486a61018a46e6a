//! The seam to the repository sync transport.
//!
//! The core produces `(dataKey, syncKey)` pairs and consumes a
//! checkout/pull/push primitive; the transport itself (content-addressed,
//! 3-way merge) lives outside this workspace and plugs in through
//! [`SyncRepo`].

use std::path::Path;

use strongbox_core::{fileio, Result};

/// A repository transport. `pull` and `push` report whether the working
/// tree changed ("dirty"), which tells callers to re-read their files.
pub trait SyncRepo {
    /// Makes sure the repository exists locally, cloning if needed.
    fn checkout(&self, dir: &Path, sync_key: &[u8]) -> Result<()>;

    fn pull(&self, dir: &Path, sync_key: &[u8]) -> Result<bool>;

    fn push(&self, dir: &Path, sync_key: &[u8]) -> Result<bool>;
}

/// A transport-less stand-in: keeps the directory skeleton in place and
/// reports every sync as clean. Used by the CLI when no server transport
/// is wired up, and by tests.
pub struct LocalSync;

impl SyncRepo for LocalSync {
    fn checkout(&self, dir: &Path, _sync_key: &[u8]) -> Result<()> {
        fileio::ensure_dir(dir)
    }

    fn pull(&self, dir: &Path, _sync_key: &[u8]) -> Result<bool> {
        fileio::ensure_dir(dir)?;
        Ok(false)
    }

    fn push(&self, dir: &Path, _sync_key: &[u8]) -> Result<bool> {
        fileio::ensure_dir(dir)?;
        Ok(false)
    }
}
