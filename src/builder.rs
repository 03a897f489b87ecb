use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;

use kuronime_core::http::build_client;
use kuronime_core::{DEFAULT_CONCURRENCY, Extractor, ExtractorRegistry, GenericExtractor};

use crate::client::{API_URL, KuronimeClient, MAIN_URL};
use crate::errors::{KuronimeError, Result};

pub struct KuronimeBuilder {
    main_url: String,
    api_url: String,
    timeout: Option<Duration>,
    embed_concurrency: usize,
    extractors: Vec<Arc<dyn Extractor>>,
    generic_fallback: bool,
}

impl Default for KuronimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KuronimeBuilder {
    /// creates a builder pointing at the public site and resolver api.
    pub fn new() -> Self {
        Self {
            main_url: MAIN_URL.to_string(),
            api_url: API_URL.to_string(),
            timeout: None,
            embed_concurrency: DEFAULT_CONCURRENCY,
            extractors: Vec::new(),
            generic_fallback: true,
        }
    }

    /// sets the site base url (e.g. a mirror domain).
    pub fn main_url(mut self, url: &str) -> Self {
        self.main_url = url.to_string();
        self
    }

    /// sets the origin serving `/api/v9/sources`.
    pub fn api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }

    /// request timeout applied by the http client.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// caps concurrent embed extractions per `load_links` call.
    pub fn embed_concurrency(mut self, limit: usize) -> Self {
        self.embed_concurrency = limit.max(1);
        self
    }

    /// registers an embed extractor; earlier registrations take precedence.
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// whether unmatched embeds go through [`GenericExtractor`]. on by default.
    pub fn generic_fallback(mut self, enabled: bool) -> Self {
        self.generic_fallback = enabled;
        self
    }

    /// builds a [`KuronimeClient`] using the configured options.
    pub fn build(&self) -> Result<KuronimeClient> {
        for url in [&self.main_url, &self.api_url] {
            Url::parse(url).map_err(|_| KuronimeError::BaseUrl { url: url.clone() })?;
        }

        let client = build_client(self.timeout)?;

        let mut registry = ExtractorRegistry::new();
        for extractor in &self.extractors {
            registry.register(Arc::clone(extractor));
        }
        if self.generic_fallback {
            registry.set_fallback(Arc::new(GenericExtractor::new(client.clone())));
        }

        Ok(KuronimeClient::from_parts(
            self.main_url.clone(),
            self.api_url.clone(),
            client,
            registry,
            self.embed_concurrency,
        ))
    }
}
