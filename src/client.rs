use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use reqwest::Client as ReqwestClient;
use tracing::debug;

use kuronime_core::http::{ensure_success, fix_url, origin_of};
use kuronime_core::{ExtractorRegistry, M3u8Helper};

use crate::errors::{KuronimeError, Result};

/// display name attached to links produced by this provider.
pub const NAME: &str = "Kuronime+";
/// default site base url.
pub const MAIN_URL: &str = "https://kuronime.biz";
/// default origin of the link resolver api.
pub const API_URL: &str = "https://animeku.org";

/// effective origin of the site for one operation.
///
/// the site moves between mirror domains; the origin is taken from the final url
/// of a request made by the operation itself and passed along explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    pub origin: String,
}

impl SiteContext {
    pub fn from_url(url: &str, fallback: &str) -> Self {
        let origin = origin_of(url)
            .or_else(|| origin_of(fallback))
            .unwrap_or_else(|| fallback.trim_end_matches('/').to_string());
        Self { origin }
    }

    /// `origin/`, as sent in `Referer` headers.
    pub fn referer(&self) -> String {
        format!("{}/", self.origin)
    }

    pub fn fix_url(&self, href: &str) -> Option<String> {
        fix_url(&self.referer(), href)
    }
}

pub struct KuronimeClient {
    pub(crate) main_url: String,
    pub(crate) api_url: String,
    pub(crate) client: ReqwestClient,
    pub(crate) m3u8: M3u8Helper,
    pub(crate) extractors: ExtractorRegistry,
    pub(crate) embed_concurrency: usize,
}

impl KuronimeClient {
    pub(crate) fn from_parts(
        main_url: String,
        api_url: String,
        client: ReqwestClient,
        extractors: ExtractorRegistry,
        embed_concurrency: usize,
    ) -> Self {
        Self {
            main_url: main_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            m3u8: M3u8Helper::new(client.clone()),
            client,
            extractors,
            embed_concurrency,
        }
    }

    pub fn name(&self) -> &str {
        NAME
    }

    pub fn main_url(&self) -> &str {
        &self.main_url
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    pub(crate) fn headers(&self, referer: Option<&str>, is_api: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(if is_api {
                "application/json, text/javascript, */*; q=0.01"
            } else {
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
            }),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("id-ID,id;q=0.9,en;q=0.8"));

        if let Some(referer) = referer
            && let Ok(v) = HeaderValue::from_str(referer)
        {
            headers.insert(REFERER, v);
        }

        headers
    }

    /// GETs an html page, returning the site context of its final url and the body.
    pub(crate) async fn fetch_page(&self, url: &str, context: &str) -> Result<(SiteContext, String)> {
        let resp = self
            .client
            .get(url)
            .headers(self.headers(None, false))
            .send()
            .await
            .map_err(|source| KuronimeError::Request {
                context: format!("getting {context}"),
                source,
            })?;

        let resp = ensure_success(resp, context).await?;
        let site = SiteContext::from_url(resp.url().as_str(), &self.main_url);
        debug!(%url, origin = %site.origin, "fetched page");

        let text = resp
            .text()
            .await
            .map_err(|source| KuronimeError::ResponseBody {
                context: format!("reading {context}"),
                source,
            })?;

        Ok((site, text))
    }

    /// follows redirects of the configured base url to find the live mirror.
    pub async fn resolve_site(&self) -> Result<SiteContext> {
        let resp = self
            .client
            .get(&self.main_url)
            .headers(self.headers(None, false))
            .send()
            .await
            .map_err(|source| KuronimeError::Request {
                context: "resolving site origin".to_string(),
                source,
            })?;

        let site = SiteContext::from_url(resp.url().as_str(), &self.main_url);
        debug!(origin = %site.origin, "resolved site origin");
        Ok(site)
    }
}
