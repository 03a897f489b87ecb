use std::collections::{BTreeMap, HashMap};

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use serde::de::{DeserializeOwned, Error as _, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use kuronime_core::crypto::decrypt;
use kuronime_core::http::ensure_success;
use kuronime_core::quality::strip_label_prefix;
use kuronime_core::{
    ExtractorLink, Quality, SubtitleFile, extract_encoded_string, join_settled,
    join_settled_bounded,
};

use crate::client::{KuronimeClient, SiteContext};
use crate::errors::{KuronimeError, Result};

/// passphrase shared by the `src` and `mirror` payloads.
pub const KEY: &[u8; 16] = b"3&!Z0M,VIZ;dZW==";

pub const SOURCES_PATH: &str = "/api/v9/sources";

const SCRIPT_SELECTOR: &str = "div#content script";
const SCRIPT_MARKER: &str = "is_singular";

/// response of the sources api. either field may be missing or null.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Servers {
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub mirror: Option<String>,
}

#[derive(Debug, Serialize)]
struct SourcesRequest<'a> {
    id: &'a str,
}

/// one embed url from the decrypted mirror map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEmbed {
    /// top level key of the mirror map (e.g. `embed`).
    pub provider: String,
    /// quality label with its letter prefix removed (`v720` -> `720`).
    pub quality_hint: String,
    pub quality: Quality,
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MirrorGroup {
    Qualities(BTreeMap<String, MirrorEntry>),
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MirrorEntry {
    Url(String),
    Servers(BTreeMap<String, String>),
    Other(IgnoredAny),
}

/// drops trailing control bytes and spaces left in the last cipher block.
fn trim_block_padding(plaintext: &[u8]) -> &[u8] {
    let end = plaintext
        .iter()
        .rposition(|b| *b > b' ')
        .map_or(0, |i| i + 1);
    &plaintext[..end]
}

/// decodes the first json value of the plaintext, ignoring anything after it.
fn first_json_value<T: DeserializeOwned>(plaintext: &[u8]) -> serde_json::Result<T> {
    serde_json::Deserializer::from_slice(trim_block_padding(plaintext))
        .into_iter::<T>()
        .next()
        .unwrap_or_else(|| Err(serde_json::Error::custom("empty plaintext")))
}

/// strips one level of string quoting the way the site's encoder applies it.
fn unquote_loosely(text: &str) -> Option<String> {
    let rest = text.strip_prefix('"')?;
    let inner = rest.rfind('"').map_or(rest, |end| &rest[..end]);
    Some(inner.replace("\\\"", "\""))
}

/// recovers the manifest url from a decrypted `src` payload.
///
/// the payload is a json string wrapping either the url itself or an object
/// with a `src` field. backslashes left by the encoder are removed.
pub fn resolve_source(plaintext: &[u8]) -> Option<String> {
    let inner = match first_json_value::<Value>(plaintext) {
        Ok(Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(err) => {
            debug!(error = %err, "src plaintext is not json; unquoting by hand");
            let text = String::from_utf8_lossy(trim_block_padding(plaintext)).into_owned();
            unquote_loosely(text.trim())?
        }
    };

    let url = match serde_json::from_str::<Value>(&inner) {
        Ok(Value::Object(map)) => map.get("src").and_then(Value::as_str)?.to_string(),
        _ => inner,
    };

    let url = url.replace('\\', "").trim().to_string();
    if url.is_empty() { None } else { Some(url) }
}

/// flattens a decrypted `mirror` payload into one entry per embed url.
///
/// accepts `{provider: {label: url}}` and `{provider: {label: {server: url}}}`;
/// entries of any other shape are skipped.
pub fn parse_mirrors(plaintext: &[u8]) -> serde_json::Result<Vec<MirrorEmbed>> {
    let value = match first_json_value::<Value>(plaintext)? {
        Value::String(inner) => serde_json::from_str::<Value>(&inner)?,
        value => value,
    };
    let groups: BTreeMap<String, MirrorGroup> = serde_json::from_value(value)?;

    let mut embeds = Vec::new();
    for (provider, group) in groups {
        let MirrorGroup::Qualities(qualities) = group else {
            continue;
        };

        for (label, entry) in qualities {
            let quality_hint = strip_label_prefix(&label).to_string();
            let quality = Quality::from_name(&quality_hint);
            let urls = match entry {
                MirrorEntry::Url(url) => vec![url],
                MirrorEntry::Servers(servers) => servers.into_values().collect(),
                MirrorEntry::Other(_) => Vec::new(),
            };

            embeds.extend(urls.into_iter().filter(|u| !u.trim().is_empty()).map(|url| {
                MirrorEmbed {
                    provider: provider.clone(),
                    quality_hint: quality_hint.clone(),
                    quality,
                    url,
                }
            }));
        }
    }

    Ok(embeds)
}

/// text of the episode script that carries the encoded id.
fn episode_script(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(sel) = Selector::parse(SCRIPT_SELECTOR) else {
        return String::new();
    };

    doc.select(&sel)
        .map(|script| script.text().collect::<String>())
        .find(|text| text.contains(SCRIPT_MARKER))
        .unwrap_or_default()
}

impl KuronimeClient {
    /// resolves an episode page into playable links.
    ///
    /// links and subtitles are emitted through the callbacks as they are found, in
    /// no particular order. only a failed page/api request or a page without an
    /// encoded id is an error; the source and mirror branches fail independently
    /// and quietly. returns `false` when the api had nothing to resolve.
    pub async fn load_links(
        &self,
        data: &str,
        on_subtitle: &(dyn Fn(SubtitleFile) + Send + Sync),
        on_link: &(dyn Fn(ExtractorLink) + Send + Sync),
    ) -> Result<bool> {
        info!(episode = %data, "loading links");
        let (site, html) = self
            .fetch_page(data, &format!("episode page {data}"))
            .await?;

        let id = extract_encoded_string(&episode_script(&html))
            .ok_or(KuronimeError::PayloadNotFound)?;
        debug!(id_len = id.len(), "found encoded id");

        let Some(servers) = self.fetch_servers(&id, &site).await? else {
            return Ok(false);
        };

        if servers.src.is_none() && servers.mirror.is_none() {
            warn!(episode = %data, "sources api returned neither src nor mirror");
            return Ok(false);
        }

        let branches: Vec<BoxFuture<'_, Result<usize>>> = vec![
            self.emit_source(servers.src.as_deref(), on_link).boxed(),
            self.emit_mirrors(servers.mirror.as_deref(), &site, on_subtitle, on_link)
                .boxed(),
        ];
        let settled = join_settled("load links", branches).await;

        info!(
            episode = %data,
            source_links = ?settled.first().copied().flatten(),
            mirror_embeds = ?settled.get(1).copied().flatten(),
            "links settled"
        );
        Ok(true)
    }

    async fn fetch_servers(&self, id: &str, site: &SiteContext) -> Result<Option<Servers>> {
        let url = format!("{}{SOURCES_PATH}", self.api_url);
        let body = serde_json::to_string(&SourcesRequest { id }).map_err(|source| {
            KuronimeError::Parse {
                context: "encoding sources request".to_string(),
                source,
            }
        })?;

        let resp = self
            .client
            .post(&url)
            .headers(self.headers(Some(&site.referer()), true))
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|source| KuronimeError::Request {
                context: "requesting sources api".to_string(),
                source,
            })?;

        let resp = ensure_success(resp, "sources api").await?;
        let text = resp
            .text()
            .await
            .map_err(|source| KuronimeError::ResponseBody {
                context: "reading sources api body".to_string(),
                source,
            })?;

        match serde_json::from_str::<Servers>(&text) {
            Ok(servers) => Ok(Some(servers)),
            Err(err) => {
                warn!(error = %err, "sources api returned an unexpected body");
                Ok(None)
            }
        }
    }

    async fn emit_source(
        &self,
        src: Option<&str>,
        on_link: &(dyn Fn(ExtractorLink) + Send + Sync),
    ) -> Result<usize> {
        let Some(src) = src else {
            debug!("no src payload");
            return Ok(0);
        };

        let plaintext = decrypt(src, KEY)?;
        let Some(manifest) = resolve_source(&plaintext) else {
            debug!("src payload held no manifest url");
            return Ok(0);
        };

        let headers = HashMap::from([("Origin".to_string(), self.api_url.clone())]);
        let links = self
            .m3u8
            .generate(self.name(), &manifest, &format!("{}/", self.api_url), &headers)
            .await?;

        let count = links.len();
        links.into_iter().for_each(on_link);
        Ok(count)
    }

    async fn emit_mirrors(
        &self,
        mirror: Option<&str>,
        site: &SiteContext,
        on_subtitle: &(dyn Fn(SubtitleFile) + Send + Sync),
        on_link: &(dyn Fn(ExtractorLink) + Send + Sync),
    ) -> Result<usize> {
        let Some(mirror) = mirror else {
            debug!("no mirror payload");
            return Ok(0);
        };

        let plaintext = decrypt(mirror, KEY)?;
        let embeds = parse_mirrors(&plaintext).map_err(|source| KuronimeError::Parse {
            context: "parsing mirror map".to_string(),
            source,
        })?;
        debug!(count = embeds.len(), "dispatching mirror embeds");

        let referer = site.referer();
        let tasks: Vec<BoxFuture<'_, Result<bool>>> = embeds
            .iter()
            .map(|embed| {
                self.dispatch_embed(embed, &referer, on_subtitle, on_link)
                    .boxed()
            })
            .collect();
        let settled = join_settled_bounded("mirror embeds", tasks, self.embed_concurrency).await;

        Ok(settled.into_iter().flatten().count())
    }

    async fn dispatch_embed(
        &self,
        embed: &MirrorEmbed,
        referer: &str,
        on_subtitle: &(dyn Fn(SubtitleFile) + Send + Sync),
        on_link: &(dyn Fn(ExtractorLink) + Send + Sync),
    ) -> Result<bool> {
        let hint = embed.quality;
        let hinted = move |link: ExtractorLink| on_link(link.with_quality_hint(hint));

        self.extractors
            .load_extractor(&embed.url, Some(referer), on_subtitle, &hinted)
            .await
            .map_err(|source| KuronimeError::EmbedExtraction {
                url: embed.url.clone(),
                source,
            })
    }
}
