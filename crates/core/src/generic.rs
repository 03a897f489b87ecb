use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, REFERER};
use tracing::debug;

use crate::errors::{CoreError, Result};
use crate::extractor::{Extractor, ExtractorLink, SubtitleFile};
use crate::http::{ensure_success, origin_of};
use crate::m3u8::M3u8Helper;
use crate::quality::Quality;

static M3U8_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(https?:(?:\\?/){2}[^"'\s<>]+?\.m3u8[^"'\s<>]*)"#).ok()
});

static FILE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"["']?file["']?\s*:\s*["'](https?:[^"']+)["']"#).ok());

static MP4_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(https?:(?:\\?/){2}[^"'\s<>]+?\.mp4[^"'\s<>]*)"#).ok()
});

static TRACK_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"["']?file["']?\s*:\s*["']([^"']+\.(?:vtt|srt)[^"']*)["']\s*,\s*["']?label["']?\s*:\s*["']([^"']*)["']"#,
    )
    .ok()
});

fn first_capture(re: &LazyLock<Option<Regex>>, text: &str) -> Option<String> {
    re.as_ref()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace('\\', ""))
}

fn is_subtitle(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    path.ends_with(".vtt") || path.ends_with(".srt")
}

/// first `file:` entry that is not a subtitle track.
fn first_video_file(text: &str) -> Option<String> {
    FILE_RE
        .as_ref()?
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().replace('\\', ""))
        .find(|url| !is_subtitle(url))
}

/// catch-all extractor that sniffs stream urls out of an embed page.
///
/// prefers an hls manifest, then a player `file:` entry, then any `.mp4` url.
pub struct GenericExtractor {
    client: Client,
    m3u8: M3u8Helper,
}

impl GenericExtractor {
    pub fn new(client: Client) -> Self {
        Self {
            m3u8: M3u8Helper::new(client.clone()),
            client,
        }
    }

    async fn fetch_page(&self, url: &str, referer: Option<&str>) -> Result<String> {
        let mut req = self
            .client
            .get(url)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8");
        if let Some(referer) = referer {
            req = req.header(REFERER, referer);
        }

        let resp = req.send().await.map_err(|source| CoreError::Request {
            context: format!("loading embed page {url}"),
            source,
        })?;
        let resp = ensure_success(resp, &format!("embed page {url}")).await?;
        resp.text().await.map_err(|source| CoreError::ResponseBody {
            context: format!("reading embed page {url}"),
            source,
        })
    }
}

#[async_trait]
impl Extractor for GenericExtractor {
    fn name(&self) -> &str {
        "Generic"
    }

    fn main_url(&self) -> &str {
        ""
    }

    async fn get_url(
        &self,
        url: &str,
        referer: Option<&str>,
        on_subtitle: &(dyn Fn(SubtitleFile) + Send + Sync),
        on_link: &(dyn Fn(ExtractorLink) + Send + Sync),
    ) -> Result<()> {
        let page = self.fetch_page(url, referer).await?;
        let stream_referer = origin_of(url)
            .map(|o| format!("{o}/"))
            .unwrap_or_else(|| url.to_string());

        if let Some(re) = TRACK_RE.as_ref() {
            for caps in re.captures_iter(&page) {
                let (Some(file), Some(label)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                on_subtitle(SubtitleFile {
                    lang: label.as_str().to_string(),
                    url: file.as_str().replace('\\', ""),
                });
            }
        }

        if let Some(manifest) = first_capture(&M3U8_RE, &page) {
            debug!(%url, %manifest, "embed exposes an hls manifest");
            let links = self
                .m3u8
                .generate(self.name(), &manifest, &stream_referer, &HashMap::new())
                .await?;
            links.into_iter().for_each(on_link);
            return Ok(());
        }

        let direct = first_video_file(&page).or_else(|| first_capture(&MP4_RE, &page));
        match direct {
            Some(video) => {
                debug!(%url, %video, "embed exposes a direct file");
                on_link(ExtractorLink::new(
                    self.name(),
                    video,
                    stream_referer,
                    Quality::Unknown,
                ));
                Ok(())
            }
            None => Err(CoreError::NoSource {
                url: url.to_string(),
            }),
        }
    }
}
