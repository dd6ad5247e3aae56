use std::collections::HashMap;

use serde::Deserialize;

/// A photo present in the current stream snapshot.
///
/// Produced fresh each discovery; never persisted. The download location is
/// filled in by asset resolution and stays `None` for ids the service did
/// not resolve (a per-asset miss, not a failure).
#[derive(Debug, Clone)]
pub struct PhotoRecord {
    pub id: String,
    pub location: Option<AssetLocation>,
}

/// One entry of the `webstream` handshake's `photos` array.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamPhoto {
    #[serde(rename = "photoGuid")]
    pub photo_guid: String,
}

/// Body of a successful `webstream` handshake response. A body without a
/// `photos` array is malformed; a present-but-empty array is the distinct
/// empty-album condition.
#[derive(Debug, Deserialize)]
pub struct WebStreamResponse {
    pub photos: Vec<StreamPhoto>,
}

/// Where an asset's bytes live: CDN host plus path, joined verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetLocation {
    pub url_location: String,
    pub url_path: String,
}

impl AssetLocation {
    pub fn download_url(&self) -> String {
        format!("https://{}{}", self.url_location, self.url_path)
    }
}

/// Body of a `webasseturls` response: identifier -> download location.
#[derive(Debug, Deserialize)]
pub struct WebAssetUrlsResponse {
    pub items: HashMap<String, AssetLocation>,
}
