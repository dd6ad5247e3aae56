//! Sync orchestration: discover, download missing assets, reconcile.
//!
//! One cycle runs discover → resolve → download → reconcile under a
//! single-flight guard per album instance. Reconciliation (deleting cached
//! blobs absent from the discovered set) only runs after a confirmed
//! non-empty, well-formed discovery — a transient empty or failed response
//! must never empty the cache. Per-asset download failures are logged and
//! skipped; they never abort the cycle.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::cache::BlobStore;
use crate::retry::{self, RetryConfig};
use crate::stream::{AlbumSource, AssetLocation, StreamClient, StreamError};

/// Shared per-album sync state: the single-flight flag, the staleness
/// timestamp, and the viewer-visible skip offset. All of it is ephemeral —
/// the cache directory is the only state that survives a restart.
#[derive(Debug, Default)]
pub struct SyncState {
    in_progress: AtomicBool,
    skip_offset: AtomicU64,
    last_sync_at: Mutex<Option<DateTime<Utc>>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        *self.last_sync_at.lock().expect("sync state lock poisoned")
    }

    pub fn skip_offset(&self) -> u64 {
        self.skip_offset.load(Ordering::SeqCst)
    }

    /// Advance the skip offset by one, shifting the rotation bucket for all
    /// viewers. Returns the new offset.
    pub fn advance_skip(&self) -> u64 {
        self.skip_offset.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn begin_sync(&self) -> Option<SyncGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SyncGuard(&self.in_progress))
    }

    fn stamp_completed(&self, now: DateTime<Utc>) {
        *self.last_sync_at.lock().expect("sync state lock poisoned") = Some(now);
    }
}

/// Clears the single-flight flag on every exit path, including early
/// returns and panics inside a cycle.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Counters from one completed sync cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncRunStats {
    pub discovered: usize,
    pub downloaded: usize,
    pub failed_downloads: usize,
    pub deleted: usize,
    pub failed_deletes: usize,
}

/// Result of a `sync()` call that did not fail outright.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Another cycle holds the single-flight guard; nothing was done.
    AlreadySyncing,
    /// Discovery returned zero photos; the cache was left untouched.
    EmptyAlbum,
    /// A full cycle ran: downloads and reconciliation happened.
    Completed(SyncRunStats),
}

/// Drives sync cycles for one album instance.
pub struct SyncOrchestrator {
    client: StreamClient,
    store: Arc<BlobStore>,
    state: Arc<SyncState>,
    source: tokio::sync::Mutex<AlbumSource>,
    retry: RetryConfig,
    concurrent_downloads: usize,
}

impl SyncOrchestrator {
    pub fn new(
        client: StreamClient,
        store: Arc<BlobStore>,
        state: Arc<SyncState>,
        source: AlbumSource,
        retry: RetryConfig,
        concurrent_downloads: usize,
    ) -> Self {
        Self {
            client,
            store,
            state,
            source: tokio::sync::Mutex::new(source),
            retry,
            concurrent_downloads: concurrent_downloads.max(1),
        }
    }

    pub fn state(&self) -> &Arc<SyncState> {
        &self.state
    }

    /// Run one sync cycle, or return immediately if one is already running.
    ///
    /// Every discovery-phase failure leaves the cache untouched and the
    /// staleness timestamp unchanged; the previous good cache keeps serving.
    pub async fn sync(&self) -> Result<SyncOutcome, StreamError> {
        let Some(_guard) = self.state.begin_sync() else {
            debug!("sync already in progress, skipping");
            return Ok(SyncOutcome::AlreadySyncing);
        };
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> Result<SyncOutcome, StreamError> {
        let mut records = {
            let mut source = self.source.lock().await;
            match self.client.discover(&mut source).await {
                Ok(records) => records,
                Err(StreamError::EmptyAlbum) => {
                    info!("album stream returned no photos; preserving existing cache");
                    return Ok(SyncOutcome::EmptyAlbum);
                }
                Err(e) => {
                    warn!(error = %e, "discovery failed; cache left untouched");
                    return Err(e);
                }
            }
        };
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        debug!(count = ids.len(), "discovered stream photos");

        {
            let source = self.source.lock().await;
            let mut locations = match self.client.resolve_assets(&source, &ids).await {
                Ok(locations) => locations,
                Err(e) => {
                    warn!(error = %e, "asset resolution failed; cache left untouched");
                    return Err(e);
                }
            };
            for record in &mut records {
                record.location = locations.remove(&record.id);
            }
        }

        let mut pending: Vec<(String, AssetLocation)> = Vec::new();
        for record in records {
            match record.location {
                Some(location) => {
                    if !self.store.has(&record.id).await {
                        pending.push((record.id, location));
                    }
                }
                None => {
                    debug!(id = %record.id, "no download location resolved, skipping this cycle")
                }
            }
        }

        let mut stats = SyncRunStats {
            discovered: ids.len(),
            ..Default::default()
        };

        let results: Vec<bool> = stream::iter(pending)
            .map(|(id, location)| async move { self.download_one(&id, &location).await })
            .buffer_unordered(self.concurrent_downloads)
            .collect()
            .await;
        stats.downloaded = results.iter().filter(|ok| **ok).count();
        stats.failed_downloads = results.len() - stats.downloaded;

        // Downloads are done (or skipped); now drop everything the stream no
        // longer contains. A failed delete is retried on the next cycle.
        let valid: HashSet<&str> = ids.iter().map(String::as_str).collect();
        match self.store.list().await {
            Ok(cached) => {
                for stale in cached.iter().filter(|id| !valid.contains(id.as_str())) {
                    match self.store.delete(stale).await {
                        Ok(()) => {
                            debug!(id = %stale, "removed stale cache entry");
                            stats.deleted += 1;
                        }
                        Err(e) => {
                            warn!(id = %stale, error = %e, "failed to remove stale entry");
                            stats.failed_deletes += 1;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "could not list cache for reconciliation, skipping");
            }
        }

        self.state.stamp_completed(Utc::now());
        info!(
            discovered = stats.discovered,
            downloaded = stats.downloaded,
            failed = stats.failed_downloads,
            deleted = stats.deleted,
            "sync cycle complete"
        );
        Ok(SyncOutcome::Completed(stats))
    }

    async fn download_one(&self, id: &str, location: &AssetLocation) -> bool {
        let fetched = retry::with_backoff(&self.retry, StreamError::is_retryable, || {
            self.client.fetch_asset(location)
        })
        .await;
        match fetched {
            Ok(bytes) => match self.store.write(id, &bytes).await {
                Ok(()) => {
                    debug!(id, size = bytes.len(), "asset cached");
                    true
                }
                Err(e) => {
                    warn!(id, error = %e, "failed to write asset to cache");
                    false
                }
            },
            Err(e) => {
                warn!(id, error = %e, "asset download failed, skipping this cycle");
                false
            }
        }
    }
}
