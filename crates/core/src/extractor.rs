use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, info};

use crate::errors::Result;
use crate::quality::Quality;

/// how a link should be played back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Video,
    M3u8,
    Dash,
}

impl LinkKind {
    /// guesses the kind from the url path extension.
    pub fn infer(url: &str) -> Self {
        let path = Url::parse(url)
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_else(|_| url.to_ascii_lowercase());

        if path.ends_with(".m3u8") {
            Self::M3u8
        } else if path.ends_with(".mpd") {
            Self::Dash
        } else {
            Self::Video
        }
    }
}

/// a playable stream emitted by a provider or an extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorLink {
    /// provider or extractor that produced the link.
    pub source: String,
    /// display name.
    pub name: String,
    pub url: String,
    /// referer the player must send when requesting `url`.
    pub referer: String,
    pub quality: Quality,
    pub kind: LinkKind,
    /// additional request headers required by the host.
    pub headers: HashMap<String, String>,
}

impl ExtractorLink {
    pub fn new(
        source: impl Into<String>,
        url: impl Into<String>,
        referer: impl Into<String>,
        quality: Quality,
    ) -> Self {
        let source = source.into();
        let url = url.into();
        Self {
            name: source.clone(),
            kind: LinkKind::infer(&url),
            source,
            url,
            referer: referer.into(),
            quality,
            headers: HashMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// fills in `hint` when the extractor could not tell the quality itself.
    pub fn with_quality_hint(mut self, hint: Quality) -> Self {
        self.quality = self.quality.or(hint);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleFile {
    pub lang: String,
    pub url: String,
}

/// resolves a third-party embed page into playable links.
///
/// implementations emit through the callbacks as they go; both callbacks may be
/// invoked concurrently from several extractions.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    /// base url of the host this extractor understands.
    fn main_url(&self) -> &str;

    /// whether this extractor handles `url`. defaults to a host suffix match on [`Self::main_url`].
    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };

        Url::parse(self.main_url())
            .ok()
            .and_then(|main| main.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .is_some_and(|main_host| host == main_host || host.ends_with(&format!(".{main_host}")))
    }

    async fn get_url(
        &self,
        url: &str,
        referer: Option<&str>,
        on_subtitle: &(dyn Fn(SubtitleFile) + Send + Sync),
        on_link: &(dyn Fn(ExtractorLink) + Send + Sync),
    ) -> Result<()>;
}

/// ordered set of extractors with an optional catch-all.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
    fallback: Option<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// registers an extractor. earlier registrations win when several match.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        debug!(name = extractor.name(), "registering extractor");
        self.extractors.push(extractor);
    }

    /// extractor tried when no registered one matches.
    pub fn set_fallback(&mut self, extractor: Arc<dyn Extractor>) {
        self.fallback = Some(extractor);
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty() && self.fallback.is_none()
    }

    fn find(&self, url: &str) -> Option<&Arc<dyn Extractor>> {
        let parsed = Url::parse(url).ok()?;
        self.extractors
            .iter()
            .find(|e| e.matches(&parsed))
            .or(self.fallback.as_ref())
    }

    /// runs the extractor for `url`. returns `false` when none applies.
    pub async fn load_extractor(
        &self,
        url: &str,
        referer: Option<&str>,
        on_subtitle: &(dyn Fn(SubtitleFile) + Send + Sync),
        on_link: &(dyn Fn(ExtractorLink) + Send + Sync),
    ) -> Result<bool> {
        let Some(extractor) = self.find(url) else {
            debug!(%url, "no extractor for embed");
            return Ok(false);
        };

        info!(%url, extractor = extractor.name(), "running extractor");
        extractor.get_url(url, referer, on_subtitle, on_link).await?;
        Ok(true)
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field(
                "extractors",
                &self.extractors.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("fallback", &self.fallback.as_ref().map(|e| e.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Fixed {
        name: &'static str,
        main_url: &'static str,
    }

    #[async_trait]
    impl Extractor for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn main_url(&self) -> &str {
            self.main_url
        }

        async fn get_url(
            &self,
            url: &str,
            referer: Option<&str>,
            _on_subtitle: &(dyn Fn(SubtitleFile) + Send + Sync),
            on_link: &(dyn Fn(ExtractorLink) + Send + Sync),
        ) -> Result<()> {
            on_link(ExtractorLink::new(
                self.name,
                format!("{url}/video.mp4"),
                referer.unwrap_or_default(),
                Quality::Unknown,
            ));
            Ok(())
        }
    }

    fn registry() -> ExtractorRegistry {
        let mut registry = ExtractorRegistry::new();
        registry.register(Arc::new(Fixed {
            name: "alpha",
            main_url: "https://www.alpha.test",
        }));
        registry
    }

    #[test]
    fn link_kind_is_inferred_from_path() {
        assert_eq!(LinkKind::infer("https://a.test/x/master.m3u8?t=1"), LinkKind::M3u8);
        assert_eq!(LinkKind::infer("https://a.test/manifest.mpd"), LinkKind::Dash);
        assert_eq!(LinkKind::infer("https://a.test/v.mp4"), LinkKind::Video);
    }

    #[test]
    fn quality_hint_only_fills_unknown() {
        let link = ExtractorLink::new("x", "https://a.test/v.mp4", "", Quality::Unknown);
        assert_eq!(link.with_quality_hint(Quality::Height(720)).quality, Quality::Height(720));

        let link = ExtractorLink::new("x", "https://a.test/v.mp4", "", Quality::Height(360));
        assert_eq!(link.with_quality_hint(Quality::Height(720)).quality, Quality::Height(360));
    }

    #[tokio::test]
    async fn load_extractor_dispatches_on_host() {
        let links = Mutex::new(Vec::new());
        let on_link = |link: ExtractorLink| links.lock().unwrap().push(link);

        let handled = registry()
            .load_extractor("https://cdn.alpha.test/e/1", Some("https://site.test/"), &|_| {}, &on_link)
            .await
            .expect("extractor succeeds");

        assert!(handled);
        let links = links.into_inner().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].source, "alpha");
        assert_eq!(links[0].referer, "https://site.test/");
    }

    #[tokio::test]
    async fn load_extractor_reports_unhandled_urls() {
        let handled = registry()
            .load_extractor("https://beta.test/e/1", None, &|_| {}, &|_| {})
            .await
            .expect("no extractor is not an error");
        assert!(!handled);
    }

    #[tokio::test]
    async fn fallback_catches_unmatched_hosts() {
        let mut registry = registry();
        registry.set_fallback(Arc::new(Fixed {
            name: "fallback",
            main_url: "",
        }));

        let links = Mutex::new(Vec::new());
        let on_link = |link: ExtractorLink| links.lock().unwrap().push(link.source);

        let handled = registry
            .load_extractor("https://beta.test/e/1", None, &|_| {}, &on_link)
            .await
            .expect("fallback succeeds");

        assert!(handled);
        assert_eq!(links.into_inner().unwrap(), vec!["fallback".to_string()]);
    }
}
