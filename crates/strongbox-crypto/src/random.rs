//! Process-wide random number source.
//!
//! All secret key material comes from one ChaCha20 generator, seeded once at
//! init from OS entropy mixed with machine-local noise (root directory path
//! and metadata, clocks, process ids, and any host-supplied bytes).

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

use strongbox_core::{Error, Result};

static RNG: Lazy<Mutex<Option<ChaCha20Rng>>> = Lazy::new(|| Mutex::new(None));

/// Process start marker, so the monotonic clock contributes to the seed.
static STARTED: Lazy<std::time::Instant> = Lazy::new(std::time::Instant::now);

/// Seeds the generator. Called once from initialization; a second call is a
/// `Reinitialization` error so nothing can silently rewind the stream.
pub fn seed_rng(root_dir: &Path, extra: &[u8]) -> Result<()> {
    let mut guard = RNG.lock()?;
    if guard.is_some() {
        return Err(Error::Reinitialization);
    }
    *guard = Some(ChaCha20Rng::from_seed(gather_seed(root_dir, extra)));
    Ok(())
}

/// Draws `len` random bytes. Tests and ad-hoc callers that never ran the
/// full init fall back to a lazily OS-seeded generator.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut guard = RNG.lock()?;
    let rng = guard.get_or_insert_with(ChaCha20Rng::from_entropy);

    let mut out = vec![0u8; len];
    rng.fill_bytes(&mut out);
    Ok(out)
}

/// A version-4 UUID string, used to name per-wallet directories.
pub fn random_uuid() -> Result<String> {
    let mut b = random_bytes(16)?;
    b[6] = (b[6] & 0x0f) | 0x40;
    b[8] = (b[8] & 0x3f) | 0x80;
    Ok(format!(
        "{}-{}-{}-{}-{}",
        hex::encode(&b[0..4]),
        hex::encode(&b[4..6]),
        hex::encode(&b[6..8]),
        hex::encode(&b[8..10]),
        hex::encode(&b[10..16]),
    ))
}

fn gather_seed(root_dir: &Path, extra: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();

    // OS entropy carries the security; the other inputs only matter on
    // targets where the OS source is weak.
    let mut os = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut os);
    hasher.update(os);

    hasher.update(root_dir.to_string_lossy().as_bytes());
    if let Ok(meta) = std::fs::metadata(root_dir) {
        hasher.update(meta.len().to_le_bytes());
        if let Ok(modified) = meta.modified() {
            if let Ok(age) = modified.duration_since(UNIX_EPOCH) {
                hasher.update(age.as_nanos().to_le_bytes());
            }
        }
    }

    if let Ok(now) = SystemTime::now().duration_since(UNIX_EPOCH) {
        hasher.update(now.as_nanos().to_le_bytes());
    }
    hasher.update(STARTED.elapsed().as_nanos().to_le_bytes());

    hasher.update(std::process::id().to_le_bytes());
    #[cfg(unix)]
    hasher.update(std::os::unix::process::parent_id().to_le_bytes());

    hasher.update(extra);
    hasher.finalize().into()
}
