//! photoframe-rs — shared-album photo frame engine.
//!
//! Synchronizes an iCloud shared album (the undocumented `sharedstreams`
//! protocol, including shard relocation) into a local per-album blob cache,
//! and serves a deterministically rotating image selection from that cache.
//! Sync runs off the read path under a single-flight guard; a failed or
//! empty sync never disturbs previously cached images.

#![warn(clippy::all)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod frame;
pub mod retry;
pub mod rotation;
pub mod shutdown;
pub mod stream;
pub mod sync;

pub use cache::BlobStore;
pub use config::FrameConfig;
pub use frame::PhotoFrame;
pub use rotation::RotationSelector;
pub use stream::{AlbumSource, StreamClient};
pub use sync::{SyncOrchestrator, SyncOutcome, SyncRunStats, SyncState};
