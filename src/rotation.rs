//! Deterministic time-bucketed image selection.
//!
//! The displayed image is a pure function of the rotation bucket
//! (`floor(now / rotation_interval) + skip_offset`) and the sorted cache
//! listing, so concurrent viewers of the same album always agree on the
//! current image and separate album instances never interfere. No
//! process-wide random state is involved.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::BlobStore;
use crate::sync::SyncState;

/// Bounded retry against the reconciliation race: a listed blob may be
/// deleted before we read it.
const SELECT_ATTEMPTS: u32 = 5;

pub struct RotationSelector {
    store: Arc<BlobStore>,
    state: Arc<SyncState>,
    rotation_interval: Duration,
}

impl RotationSelector {
    pub fn new(store: Arc<BlobStore>, state: Arc<SyncState>, rotation_interval: Duration) -> Self {
        Self {
            store,
            state,
            rotation_interval,
        }
    }

    /// Pick the image for the instant `now`.
    ///
    /// Returns `None` when the cache is empty (a never-yet-synced album) or
    /// when every candidate vanished between listing and reading — the
    /// caller treats both as "no image right now", never as an error.
    pub async fn select_image(&self, now: DateTime<Utc>) -> Option<Vec<u8>> {
        let ids: Vec<String> = match self.store.list().await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "could not list cache for selection");
                return None;
            }
        };
        if ids.is_empty() {
            return None;
        }

        let bucket = self.bucket_for(now);
        for attempt in 0..SELECT_ATTEMPTS {
            let id = &ids[select_index(bucket, attempt, ids.len())];
            match self.store.read(id).await {
                Ok(bytes) => return Some(bytes),
                Err(e) if e.is_not_found() => {
                    debug!(id, attempt, "selected blob vanished, retrying");
                }
                Err(e) => {
                    warn!(id, attempt, error = %e, "failed to read selected blob");
                }
            }
        }
        None
    }

    fn bucket_for(&self, now: DateTime<Utc>) -> u64 {
        let interval = self.rotation_interval.as_secs().max(1);
        let slot = now.timestamp().max(0) as u64 / interval;
        slot.wrapping_add(self.state.skip_offset())
    }
}

/// Pure selection hash: SHA-256 over `(bucket, attempt)`, truncated to 64
/// bits, reduced mod the candidate count. `attempt` 0 is the primary pick;
/// higher attempts re-roll for the vanished-blob retry.
pub(crate) fn select_index(bucket: u64, attempt: u32, len: usize) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(bucket.to_be_bytes());
    hasher.update(attempt.to_be_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % len as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    const INTERVAL: u64 = 300;

    fn test_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("photoframe_rotation_tests")
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn selector_with(
        name: &str,
        ids: &[&str],
    ) -> (RotationSelector, Arc<BlobStore>, Arc<SyncState>) {
        let store = Arc::new(BlobStore::open(&test_root(name), "tok").await.unwrap());
        for id in ids {
            // Blob content names its id so tests can identify the pick.
            store.write(id, id.as_bytes()).await.unwrap();
        }
        let state = Arc::new(SyncState::new());
        let selector = RotationSelector::new(
            store.clone(),
            state.clone(),
            Duration::from_secs(INTERVAL),
        );
        (selector, store, state)
    }

    fn at_bucket(bucket: u64) -> DateTime<Utc> {
        Utc.timestamp_opt((bucket * INTERVAL) as i64, 0).unwrap()
    }

    #[test]
    fn test_select_index_is_stable_and_in_range() {
        for len in [1usize, 2, 3, 17] {
            for bucket in 0..50u64 {
                let idx = select_index(bucket, 0, len);
                assert!(idx < len);
                assert_eq!(idx, select_index(bucket, 0, len));
            }
        }
    }

    #[tokio::test]
    async fn test_selection_is_deterministic() {
        let (selector, _, _) = selector_with("deterministic", &["a", "b", "c"]).await;
        let now = at_bucket(42);
        let first = selector.select_image(now).await.unwrap();
        for _ in 0..5 {
            assert_eq!(selector.select_image(now).await.unwrap(), first);
        }
        let expected = select_index(42, 0, 3);
        assert_eq!(first, ["a", "b", "c"][expected].as_bytes());
    }

    #[tokio::test]
    async fn test_empty_store_selects_nothing() {
        let (selector, _, _) = selector_with("empty", &[]).await;
        assert!(selector.select_image(at_bucket(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_skip_shifts_bucket_and_accumulates() {
        let (selector, _, state) = selector_with("skip", &["a", "b", "c"]).await;
        let now = at_bucket(7);

        for skips in 1..=4u64 {
            state.advance_skip();
            assert_eq!(state.skip_offset(), skips);
            let picked = selector.select_image(now).await.unwrap();
            let expected = select_index(7 + skips, 0, 3);
            assert_eq!(picked, ["a", "b", "c"][expected].as_bytes());
        }
    }

    #[tokio::test]
    async fn test_vanished_blob_falls_back_to_retry_pick() {
        let (selector, store, _) = selector_with("vanished", &["a", "b", "c"]).await;

        // Find a bucket whose primary pick differs from its first retry,
        // then sabotage the primary pick: replace the blob with a directory
        // of the same name so the listing still sees it but the read fails.
        let bucket = (0..10_000u64)
            .find(|b| select_index(*b, 0, 3) != select_index(*b, 1, 3))
            .unwrap();
        let primary = ["a", "b", "c"][select_index(bucket, 0, 3)];
        let path = store.dir().join(format!("{primary}.jpg"));
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let picked = selector.select_image(at_bucket(bucket)).await.unwrap();
        assert_ne!(picked, primary.as_bytes());
    }

    #[tokio::test]
    async fn test_all_candidates_unreadable_selects_nothing() {
        let (selector, store, _) = selector_with("unreadable", &["a", "b"]).await;
        for id in ["a", "b"] {
            let path = store.dir().join(format!("{id}.jpg"));
            std::fs::remove_file(&path).unwrap();
            std::fs::create_dir(&path).unwrap();
        }
        assert!(selector.select_image(at_bucket(3)).await.is_none());
    }

    #[tokio::test]
    async fn test_single_candidate_always_selected() {
        let (selector, _, _) = selector_with("single", &["only"]).await;
        for bucket in 0..20 {
            assert_eq!(
                selector.select_image(at_bucket(bucket)).await.unwrap(),
                b"only"
            );
        }
    }
}
