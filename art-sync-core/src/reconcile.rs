//! # reconcile: per-device synchronisation pass
//!
//! One [`Reconciler`] drives one device through a single best-effort pass:
//!
//! 1. Fetch the device inventory and partition it into tracked content
//!    (present in the mapping store) and unknown content (uploaded
//!    out-of-band or left over from a mapping loss).
//! 2. Diff the shared local snapshot against the tracked set.
//! 3. Snapshot slideshow settings *before* any mutation - devices reset the
//!    slideshow when the active content set changes, so the pre-mutation
//!    state is the only reliable source of what the user had.
//! 4. Upload additions sequentially with spacing and bounded retries,
//!    persisting each new mapping entry as soon as its upload lands.
//! 5. Delete tracked removals as one batch (mapping persisted once on
//!    success), then unknown content as a second batch when the removal
//!    policy is enabled.
//! 6. Re-select a visible image, reapply the slideshow snapshot, and apply
//!    the per-cycle brightness value.
//!
//! Every step degrades independently: a failure is logged and either
//! retried within the pass (uploads) or left for the next cycle to
//! recompute (deletes, selection). Under dry-run, every mutating action is
//! logged as simulated, treated as succeeding, and nothing is persisted.

use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};

use crate::config::{
    SlideshowPolicy, SyncConfig, DELETE_DELAY, UPLOAD_ATTEMPTS, UPLOAD_DELAY, UPLOAD_RETRY_DELAY,
};
use crate::contract::{ArtDevice, DeviceError, ImageKind, SlideshowSettings, UploadRequest};
use crate::mapping::MappingStore;

/// Upload/delete sets computed from one local snapshot and one tracked set.
///
/// Both are set differences over the same inputs, so they are disjoint by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub to_upload: BTreeSet<String>,
    pub to_delete: BTreeSet<String>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }
}

/// `to_upload = local - tracked`, `to_delete = tracked - local`.
pub fn compute_diff(local: &BTreeSet<String>, tracked: &BTreeSet<String>) -> Diff {
    Diff {
        to_upload: local.difference(tracked).cloned().collect(),
        to_delete: tracked.difference(local).cloned().collect(),
    }
}

/// Partition a device inventory by mapping membership: content ids with a
/// reverse mapping become tracked filenames, everything else is unknown.
pub fn partition_inventory(
    inventory: &[String],
    store: &MappingStore,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let reverse = store.reverse_index();
    let mut tracked = BTreeSet::new();
    let mut unknown = BTreeSet::new();
    for content_id in inventory {
        match reverse.get(content_id.as_str()) {
            Some(filename) => {
                tracked.insert((*filename).to_string());
            }
            None => {
                unknown.insert(content_id.clone());
            }
        }
    }
    (tracked, unknown)
}

/// Outcome of one reconciliation pass against one device.
#[derive(Debug, Default, serde::Serialize)]
pub struct SyncReport {
    pub uploaded: Vec<String>,
    pub upload_failed: Vec<String>,
    pub deleted: Vec<String>,
    pub unknown_removed: usize,
    pub unknown_kept: usize,
    pub selected: Option<String>,
    pub brightness: Option<u8>,
}

impl SyncReport {
    fn mutated(&self) -> bool {
        !self.uploaded.is_empty() || !self.deleted.is_empty() || self.unknown_removed > 0
    }
}

/// Drives one synchronisation pass for one connected device session.
pub struct Reconciler<'a, D: ArtDevice> {
    device: &'a D,
    config: &'a SyncConfig,
    store: MappingStore,
    dry_run: bool,
}

impl<'a, D: ArtDevice> Reconciler<'a, D> {
    /// Loads the device's mapping document fresh; state is never carried
    /// across cycles except through that document.
    pub fn new(device: &'a D, config: &'a SyncConfig, dry_run: bool) -> Self {
        let store = MappingStore::for_device(&config.token_dir, device.address());
        Reconciler {
            device,
            config,
            store,
            dry_run,
        }
    }

    /// Run the pass against a shared local snapshot. `brightness` is the
    /// per-cycle value computed by the orchestrator, applied regardless of
    /// whether any content changed.
    pub async fn run(
        &mut self,
        local: &BTreeSet<String>,
        brightness: Option<u8>,
    ) -> Result<SyncReport, DeviceError> {
        let device = self.device.address().to_string();
        let inventory = self.device.list_inventory().await?;
        let (tracked, unknown) = partition_inventory(&inventory, &self.store);
        let diff = compute_diff(local, &tracked);
        info!(
            %device,
            local = local.len(),
            tracked = tracked.len(),
            unknown = unknown.len(),
            to_upload = diff.to_upload.len(),
            to_delete = diff.to_delete.len(),
            dry_run = self.dry_run,
            "Computed reconciliation sets"
        );

        let removing_unknown = self.config.remove_unknown && !unknown.is_empty();
        let mutating = !diff.is_empty() || removing_unknown;

        // Step 3 before any mutation, per the slideshow-reset assumption.
        let slideshow = if mutating && !local.is_empty() {
            self.capture_slideshow().await
        } else {
            None
        };

        let mut report = SyncReport::default();

        for filename in &diff.to_upload {
            match self.upload_one(filename).await {
                Ok(()) => report.uploaded.push(filename.clone()),
                Err(e) => {
                    warn!(%device, filename, error = %e, "Upload failed, will retry next cycle");
                    report.upload_failed.push(filename.clone());
                }
            }
            if !self.dry_run {
                tokio::time::sleep(UPLOAD_DELAY).await;
            }
        }

        self.delete_tracked(&diff.to_delete, &mut report).await;

        if self.config.remove_unknown {
            if !self.dry_run && !unknown.is_empty() {
                tokio::time::sleep(DELETE_DELAY).await;
            }
            self.delete_unknown(&unknown, &mut report).await;
        } else {
            report.unknown_kept = unknown.len();
            if !unknown.is_empty() {
                info!(
                    %device,
                    unknown = unknown.len(),
                    "Leaving untracked device content in place (removal disabled)"
                );
            }
        }

        if report.mutated() {
            self.reselect(slideshow.as_ref(), &diff, &mut report).await;
        }

        if let Some(level) = brightness {
            self.apply_brightness(level).await;
            report.brightness = Some(level);
        }

        info!(
            %device,
            uploaded = report.uploaded.len(),
            failed = report.upload_failed.len(),
            deleted = report.deleted.len(),
            unknown_removed = report.unknown_removed,
            "Reconciliation pass completed"
        );
        Ok(report)
    }

    async fn capture_slideshow(&self) -> Option<SlideshowSettings> {
        match &self.config.slideshow {
            SlideshowPolicy::Override(settings) => {
                if settings.enabled() {
                    debug!(device = self.device.address(), ?settings, "Using configured slideshow override");
                    Some(settings.clone())
                } else {
                    None
                }
            }
            SlideshowPolicy::PreserveDevice => match self.device.get_slideshow().await {
                Ok(Some(settings)) => {
                    info!(
                        device = self.device.address(),
                        value = %settings.value,
                        kind = settings.kind.as_wire(),
                        "Captured slideshow settings before mutation"
                    );
                    Some(settings)
                }
                Ok(None) => {
                    debug!(device = self.device.address(), "Slideshow is off, nothing to restore");
                    None
                }
                Err(e) => {
                    debug!(device = self.device.address(), error = %e, "Could not read slideshow settings");
                    None
                }
            },
        }
    }

    async fn upload_one(&mut self, filename: &str) -> Result<(), DeviceError> {
        let device = self.device.address();
        if self.dry_run {
            info!(%device, filename, "[dry-run] Would upload image");
            return Ok(());
        }
        let path = self.config.artwork_dir.join(filename);
        let data = tokio::fs::read(&path).await.map_err(|e| -> DeviceError {
            format!("failed to read {}: {e}", path.display()).into()
        })?;

        let mut last_error: DeviceError = "upload never attempted".into();
        for attempt in 1..=UPLOAD_ATTEMPTS {
            let request = UploadRequest {
                filename,
                data: &data,
                file_type: ImageKind::from_filename(filename),
                matte: self.config.matte.as_deref(),
            };
            match self.device.upload(request).await {
                Ok(content_id) => {
                    info!(%device, filename, %content_id, "Uploaded image");
                    self.store.put(filename, &content_id);
                    return Ok(());
                }
                Err(e) => {
                    warn!(%device, filename, attempt, error = %e, "Upload attempt failed");
                    last_error = e;
                    if attempt < UPLOAD_ATTEMPTS {
                        tokio::time::sleep(UPLOAD_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(last_error)
    }

    async fn delete_tracked(&mut self, to_delete: &BTreeSet<String>, report: &mut SyncReport) {
        if to_delete.is_empty() {
            return;
        }
        let device = self.device.address();
        let content_ids: Vec<String> = to_delete
            .iter()
            .filter_map(|f| self.store.content_id(f).map(str::to_string))
            .collect();
        if self.dry_run {
            info!(%device, files = ?to_delete, "[dry-run] Would delete tracked images");
            report.deleted.extend(to_delete.iter().cloned());
            return;
        }
        match self.device.delete_batch(&content_ids).await {
            Ok(()) => {
                self.store.remove_many(to_delete.iter());
                info!(%device, count = content_ids.len(), "Deleted tracked images");
                report.deleted.extend(to_delete.iter().cloned());
            }
            Err(e) => {
                // Mapping untouched: the next cycle recomputes the same diff.
                warn!(%device, error = %e, "Batch delete failed, keeping mapping entries");
            }
        }
    }

    async fn delete_unknown(&mut self, unknown: &BTreeSet<String>, report: &mut SyncReport) {
        if unknown.is_empty() {
            return;
        }
        let device = self.device.address();
        if self.dry_run {
            info!(%device, content_ids = ?unknown, "[dry-run] Would delete untracked device content");
            report.unknown_removed = unknown.len();
            return;
        }
        let content_ids: Vec<String> = unknown.iter().cloned().collect();
        match self.device.delete_batch(&content_ids).await {
            Ok(()) => {
                info!(%device, count = content_ids.len(), "Deleted untracked device content");
                report.unknown_removed = content_ids.len();
            }
            Err(e) => warn!(%device, error = %e, "Failed to delete untracked device content"),
        }
    }

    /// After a mutation, pick a mapped image to keep the device off its
    /// built-in default art, then reapply the captured slideshow settings.
    async fn reselect(
        &mut self,
        slideshow: Option<&SlideshowSettings>,
        diff: &Diff,
        report: &mut SyncReport,
    ) {
        let device = self.device.address();
        let shuffle = slideshow.map(|s| s.kind.is_shuffle()).unwrap_or(false);

        if self.dry_run {
            // The store was not mutated; approximate what would remain mapped.
            let remaining = self
                .store
                .filenames()
                .difference(&diff.to_delete)
                .count()
                + diff.to_upload.len();
            if remaining > 0 {
                info!(%device, shuffle, "[dry-run] Would select a mapped image to avoid default art");
                if slideshow.is_some() {
                    info!(%device, "[dry-run] Would restore slideshow settings");
                }
            }
            return;
        }

        let chosen = if shuffle {
            self.store.random_content_id()
        } else {
            self.store.first_content_id()
        }
        .map(str::to_string);
        let Some(content_id) = chosen else {
            debug!(%device, "No mapped content left to select");
            return;
        };

        match self.device.select_content(&content_id, true).await {
            Ok(()) => {
                info!(%device, %content_id, shuffle, "Selected image to avoid default art");
                report.selected = Some(content_id);
                if let Some(settings) = slideshow {
                    match self.device.set_slideshow(settings).await {
                        Ok(()) => info!(%device, value = %settings.value, "Restored slideshow settings"),
                        Err(e) => warn!(%device, error = %e, "Failed to restore slideshow settings"),
                    }
                }
            }
            Err(e) => error!(%device, %content_id, error = %e, "Failed to select image"),
        }
    }

    async fn apply_brightness(&self, level: u8) {
        let device = self.device.address();
        if self.dry_run {
            info!(%device, level, "[dry-run] Would set brightness");
            return;
        }
        match self.device.set_brightness(level).await {
            Ok(()) => info!(%device, level, "Applied brightness"),
            Err(e) => warn!(%device, level, error = %e, "Failed to set brightness"),
        }
    }
}
