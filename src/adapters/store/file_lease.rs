use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::errors::{LayerlockError, Result};
use crate::core::traits::lease::{Lease, LeaseManager};

/// Lease manager writing marker files under `<store>/leases/`. A blob
/// sweeper honoring the layout treats content written while a marker
/// exists as referenced.
pub struct FileLeaseManager {
    dir: PathBuf,
}

impl FileLeaseManager {
    pub fn new(store_root: &Path) -> Self {
        Self {
            dir: store_root.join("leases"),
        }
    }
}

struct FileLease {
    path: PathBuf,
}

impl Lease for FileLease {}

impl Drop for FileLease {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl LeaseManager for FileLeaseManager {
    fn acquire(&self) -> Result<Box<dyn Lease>> {
        fs::create_dir_all(&self.dir).map_err(|e| LayerlockError::LeaseFailed {
            detail: format!("could not create {}: {e}", self.dir.display()),
        })?;

        // Sequence number keeps names unique on coarse clocks.
        static SEQ: AtomicU64 = AtomicU64::new(0);

        let now = chrono::Utc::now();
        let name = format!(
            "lease-{}-{}-{}",
            std::process::id(),
            now.timestamp_nanos_opt().unwrap_or_default(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let path = self.dir.join(name);
        fs::write(&path, now.to_rfc3339()).map_err(|e| LayerlockError::LeaseFailed {
            detail: format!("could not write {}: {e}", path.display()),
        })?;

        Ok(Box::new(FileLease { path }))
    }
}
