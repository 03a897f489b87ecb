use std::collections::HashMap;

use reqwest::Client;
use reqwest::header::REFERER;
use tracing::{debug, info};

use crate::errors::{CoreError, Result};
use crate::extractor::{ExtractorLink, LinkKind};
use crate::http::{ensure_success, fix_url};
use crate::quality::Quality;

/// one `#EXT-X-STREAM-INF` entry of a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub bandwidth: u64,
    pub resolution: Option<(u32, u32)>,
    pub uri: String,
}

/// parses the variant streams of a master playlist, in playlist order.
///
/// media playlists have no variants and yield an empty list.
pub fn parse_variants(text: &str) -> Vec<Variant> {
    let mut out = Vec::new();
    let mut pending: Option<(u64, Option<(u32, u32)>)> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let mut bandwidth = 0;
            let mut resolution = None;
            for part in attrs.split(',') {
                let kv = part.trim();
                if let Some(v) = kv.strip_prefix("BANDWIDTH=") {
                    bandwidth = v.parse::<u64>().unwrap_or(0);
                } else if let Some((w, h)) =
                    kv.strip_prefix("RESOLUTION=").and_then(|v| v.split_once('x'))
                    && let (Ok(w), Ok(h)) = (w.parse::<u32>(), h.parse::<u32>())
                {
                    resolution = Some((w, h));
                }
            }
            pending = Some((bandwidth, resolution));
            continue;
        }

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((bandwidth, resolution)) = pending.take() {
            out.push(Variant {
                bandwidth,
                resolution,
                uri: line.to_string(),
            });
        }
    }

    out
}

/// expands hls manifests into one link per quality variant.
#[derive(Debug, Clone)]
pub struct M3u8Helper {
    client: Client,
}

impl M3u8Helper {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// fetches `stream_url` and returns a link per variant.
    ///
    /// a media playlist (no variants) yields a single link to `stream_url` itself.
    /// every link carries `referer` and `headers`.
    pub async fn generate(
        &self,
        source: &str,
        stream_url: &str,
        referer: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Vec<ExtractorLink>> {
        info!(%stream_url, "expanding hls manifest");

        let mut req = self.client.get(stream_url).header(REFERER, referer);
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = req.send().await.map_err(|source| CoreError::Request {
            context: format!("loading manifest {stream_url}"),
            source,
        })?;
        let resp = ensure_success(resp, &format!("manifest {stream_url}")).await?;
        let text = resp.text().await.map_err(|source| CoreError::ResponseBody {
            context: format!("reading manifest {stream_url}"),
            source,
        })?;

        let link = |url: String, quality: Quality| {
            let mut link =
                ExtractorLink::new(source, url, referer, quality).with_headers(headers.clone());
            link.kind = LinkKind::M3u8;
            link
        };

        let variants = parse_variants(&text);
        if variants.is_empty() {
            debug!(%stream_url, "manifest has no variants; using it as is");
            return Ok(vec![link(stream_url.to_string(), Quality::Unknown)]);
        }

        let links: Vec<ExtractorLink> = variants
            .into_iter()
            .filter_map(|variant| {
                let url = fix_url(stream_url, &variant.uri)?;
                let quality = variant
                    .resolution
                    .map(|(_, h)| Quality::from_height(h))
                    .unwrap_or_default();
                Some(link(url, quality))
            })
            .collect();

        debug!(%stream_url, count = links.len(), "expanded manifest variants");
        Ok(links)
    }
}
