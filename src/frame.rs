//! Photo frame facade: one album instance's sync engine and rotating view.
//!
//! Assembles the HTTP session, blob store, orchestrator, and selector from a
//! [`FrameConfig`] and exposes the small surface the host embeds: `sync`,
//! `select_image`, `skip`, `last_sync_at`, and the non-blocking staleness
//! trigger.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::{BlobStore, CacheError};
use crate::config::FrameConfig;
use crate::rotation::RotationSelector;
use crate::stream::{build_http_client, AlbumSource, StreamClient, StreamError, StreamSession};
use crate::sync::{SyncOrchestrator, SyncOutcome, SyncState};

pub struct PhotoFrame {
    orchestrator: Arc<SyncOrchestrator>,
    selector: RotationSelector,
    state: Arc<SyncState>,
    store: Arc<BlobStore>,
    staleness_ttl: chrono::Duration,
}

impl PhotoFrame {
    /// Open a frame with a real HTTP session (browser-like headers, fixed
    /// per-request timeout).
    pub async fn open(config: &FrameConfig) -> anyhow::Result<Self> {
        let client = build_http_client(config.request_timeout)?;
        Self::open_with_session(config, Arc::new(client)).await
    }

    /// Open a frame over an injected session. This is the seam embedders and
    /// tests use to substitute transports.
    pub async fn open_with_session(
        config: &FrameConfig,
        session: Arc<dyn StreamSession>,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(BlobStore::open(&config.cache_root, config.instance_key()).await?);
        let state = Arc::new(SyncState::new());
        let orchestrator = Arc::new(SyncOrchestrator::new(
            StreamClient::new(session),
            store.clone(),
            state.clone(),
            AlbumSource::new(config.token.clone(), config.album_name.clone()),
            config.retry,
            config.concurrent_downloads,
        ));
        let selector =
            RotationSelector::new(store.clone(), state.clone(), config.rotation_interval);
        let staleness_ttl = chrono::Duration::from_std(config.staleness_ttl)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        Ok(Self {
            orchestrator,
            selector,
            state,
            store,
            staleness_ttl,
        })
    }

    /// Run one sync cycle now (or join the no-op if one is in flight).
    pub async fn sync(&self) -> Result<SyncOutcome, StreamError> {
        self.orchestrator.sync().await
    }

    /// The image every viewer of this album sees at `now`.
    pub async fn select_image(&self, now: DateTime<Utc>) -> Option<Vec<u8>> {
        self.selector.select_image(now).await
    }

    /// Advance to the next image for all viewers.
    pub fn skip(&self) {
        let offset = self.state.advance_skip();
        debug!(offset, "rotation skipped forward");
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.state.last_sync_at()
    }

    /// Kick off a background sync when the cache has gone stale. Returns
    /// immediately; the read path is never blocked behind the network.
    pub fn maybe_trigger_sync(&self, now: DateTime<Utc>) {
        if self.state.sync_in_progress() {
            return;
        }
        let stale = match self.state.last_sync_at() {
            None => true,
            Some(at) => now.signed_duration_since(at) > self.staleness_ttl,
        };
        if !stale {
            return;
        }
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            match orchestrator.sync().await {
                Ok(outcome) => debug!(?outcome, "background sync finished"),
                Err(e) => warn!(error = %e, "background sync failed; serving cached images"),
            }
        });
    }

    pub fn cache_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Currently cached identifiers, for status reporting.
    pub async fn cached_ids(&self) -> Result<std::collections::BTreeSet<String>, CacheError> {
        self.store.list().await
    }
}
