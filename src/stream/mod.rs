//! Shared-stream protocol client.
//!
//! A shared album lives behind a token-addressed `sharedstreams` endpoint on
//! a per-album shard host. The service answers the first handshake for a
//! fresh session with a relocation (status 330 carrying an
//! `X-Apple-MMe-Host` field) naming the real shard; the client follows that
//! relocation at most once per discovery and remembers the new host for the
//! rest of the session.

pub mod error;
pub mod session;
pub mod types;

pub use error::StreamError;
pub use session::{build_http_client, JsonResponse, StreamSession};
pub use types::{AssetLocation, PhotoRecord};

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use self::types::{WebAssetUrlsResponse, WebStreamResponse};

/// Shard host assigned to fresh sessions before the service relocates the
/// token to its real partition.
pub const DEFAULT_SHARD_HOST: &str = "p23-sharedstreams.icloud.com";

const RELOCATION_STATUS: u16 = 330;
const RELOCATION_HOST_FIELD: &str = "X-Apple-MMe-Host";

/// Identity of one shared album: its token plus the shard host currently
/// believed to serve it. `shard_host` is session-scoped state, never
/// persisted; each album instance resolves its own shard independently.
#[derive(Debug, Clone)]
pub struct AlbumSource {
    pub token: String,
    pub album_name: String,
    pub shard_host: String,
}

impl AlbumSource {
    pub fn new(token: impl Into<String>, album_name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            album_name: album_name.into(),
            shard_host: DEFAULT_SHARD_HOST.to_string(),
        }
    }

    fn base_url(&self) -> String {
        format!("https://{}/{}/sharedstreams", self.shard_host, self.token)
    }
}

/// Client for one album's stream endpoints. Stateless apart from the shared
/// HTTP session; all shard state lives in the [`AlbumSource`] the caller
/// owns.
pub struct StreamClient {
    session: Arc<dyn StreamSession>,
}

impl StreamClient {
    pub fn new(session: Arc<dyn StreamSession>) -> Self {
        Self { session }
    }

    /// Handshake against the source's shard host and return the current
    /// photo set.
    ///
    /// A relocation response updates `source.shard_host` and retries the
    /// handshake exactly once; a second relocation fails with
    /// [`StreamError::RedirectUnresolved`]. A well-formed response with zero
    /// photos is [`StreamError::EmptyAlbum`].
    pub async fn discover(
        &self,
        source: &mut AlbumSource,
    ) -> Result<Vec<PhotoRecord>, StreamError> {
        let mut relocated = false;
        loop {
            let url = format!("{}/webstream", source.base_url());
            let resp = self
                .session
                .post_json(&url, &json!({"streamCtag": null}))
                .await?;

            if let Some(host) = relocation_target(&resp) {
                if relocated {
                    return Err(StreamError::RedirectUnresolved(host));
                }
                debug!(from = %source.shard_host, to = %host, "stream relocated to new shard");
                source.shard_host = host;
                relocated = true;
                continue;
            }
            if resp.status == RELOCATION_STATUS {
                return Err(StreamError::Protocol(
                    "relocation response without a host".into(),
                ));
            }
            check_status(resp.status, "webstream")?;

            let stream: WebStreamResponse = serde_json::from_value(resp.body)
                .map_err(|e| StreamError::Protocol(format!("malformed webstream body: {e}")))?;
            if stream.photos.is_empty() {
                return Err(StreamError::EmptyAlbum);
            }
            debug!(
                album = %source.album_name,
                photos = stream.photos.len(),
                "stream handshake succeeded"
            );
            return Ok(stream
                .photos
                .into_iter()
                .map(|p| PhotoRecord {
                    id: p.photo_guid,
                    location: None,
                })
                .collect());
        }
    }

    /// Resolve download locations for a batch of ids in a single call.
    ///
    /// An id absent from the returned map is a per-asset miss the caller
    /// skips; only transport or body-level failures are errors.
    pub async fn resolve_assets(
        &self,
        source: &AlbumSource,
        ids: &[String],
    ) -> Result<HashMap<String, AssetLocation>, StreamError> {
        let url = format!("{}/webasseturls", source.base_url());
        let resp = self
            .session
            .post_json(&url, &json!({"photoGuids": ids}))
            .await?;
        check_status(resp.status, "webasseturls")?;

        let parsed: WebAssetUrlsResponse = serde_json::from_value(resp.body)
            .map_err(|e| StreamError::Protocol(format!("malformed webasseturls body: {e}")))?;
        Ok(parsed.items)
    }

    /// Fetch one asset's raw bytes from its resolved location.
    pub async fn fetch_asset(&self, location: &AssetLocation) -> Result<Vec<u8>, StreamError> {
        self.session.get_bytes(&location.download_url()).await
    }
}

/// Extract the relocation host if the response signals one, whether via the
/// 330 status or the bare relocation field.
fn relocation_target(resp: &JsonResponse) -> Option<String> {
    resp.body
        .get(RELOCATION_HOST_FIELD)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(String::from)
}

fn check_status(status: u16, endpoint: &str) -> Result<(), StreamError> {
    if status == 200 {
        Ok(())
    } else if status == 429 || status >= 500 {
        Err(StreamError::Network(format!(
            "{endpoint} returned HTTP {status}"
        )))
    } else {
        Err(StreamError::Protocol(format!(
            "{endpoint} returned HTTP {status}"
        )))
    }
}
