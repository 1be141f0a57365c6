//! # mapping: per-device filename to content-id store
//!
//! Each device owns one persisted mapping document associating local
//! filenames with the opaque content identifiers the device assigned at
//! upload time. The document is a flat JSON object so a mapping written by
//! any past version of the service stays readable.
//!
//! Persistence is strictly best-effort: a missing, corrupt or unreadable
//! document degrades to an empty mapping (re-uploading everything is
//! self-healing), and a failed save is logged and retried implicitly by the
//! next mutation. Nothing in this module returns an error.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::IteratorRandom;
use tracing::{debug, warn};

/// Durable filename → content-id association for one device.
///
/// Exclusively owned by one reconciler; reloaded from disk at the start of
/// every pass rather than cached across cycles.
#[derive(Debug)]
pub struct MappingStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

/// Filesystem-safe transform of a device address, shared with the pairing
/// token filename convention.
pub fn sanitize_address(address: &str) -> String {
    address.replace(['.', ':'], "_")
}

impl MappingStore {
    /// Load (or initialize empty) the mapping document for a device address.
    pub fn for_device(token_dir: &Path, address: &str) -> Self {
        let path = token_dir.join(format!("tv_{}_mapping.json", sanitize_address(address)));
        Self::load(path)
    }

    fn load(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => {
                    debug!(path = %path.display(), entries = entries.len(), "Loaded content mapping");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt mapping document, starting from empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read mapping document, starting from empty");
                BTreeMap::new()
            }
        };
        MappingStore { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn content_id(&self, filename: &str) -> Option<&str> {
        self.entries.get(filename).map(String::as_str)
    }

    /// Reverse view (content id → filename), built once per inventory
    /// partition so lookups stay logarithmic.
    pub fn reverse_index(&self) -> BTreeMap<&str, &str> {
        self.entries
            .iter()
            .map(|(filename, content_id)| (content_id.as_str(), filename.as_str()))
            .collect()
    }

    pub fn filenames(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Deterministic pick: first mapped content id in filename order.
    pub fn first_content_id(&self) -> Option<&str> {
        self.entries.values().next().map(String::as_str)
    }

    /// Uniform random pick among all mapped content ids.
    pub fn random_content_id(&self) -> Option<&str> {
        self.entries
            .values()
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    /// Record one association and persist immediately, so a crash mid-batch
    /// loses at most the in-flight upload.
    pub fn put(&mut self, filename: &str, content_id: &str) {
        self.entries
            .insert(filename.to_string(), content_id.to_string());
        self.persist();
    }

    pub fn remove(&mut self, filename: &str) {
        if self.entries.remove(filename).is_some() {
            self.persist();
        }
    }

    /// Remove a batch of filenames with a single persist at the end.
    pub fn remove_many<'a>(&mut self, filenames: impl IntoIterator<Item = &'a String>) {
        let mut changed = false;
        for filename in filenames {
            changed |= self.entries.remove(filename).is_some();
        }
        if changed {
            self.persist();
        }
    }

    fn persist(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %self.path.display(), error = %e, "Failed to create mapping directory");
                return;
            }
        }
        let payload = match serde_json::to_string_pretty(&self.entries) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to serialize mapping");
                return;
            }
        };
        // Write-then-rename so a crash never leaves a truncated document.
        let tmp = self.path.with_extension("json.tmp");
        if let Err(e) = fs::write(&tmp, payload) {
            warn!(path = %tmp.display(), error = %e, "Failed to write mapping document");
            return;
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to replace mapping document");
        }
    }
}
