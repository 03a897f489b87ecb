use thiserror::Error;

use kuronime_core::{CoreError, DecryptError};

pub type Result<T> = std::result::Result<T, KuronimeError>;

#[derive(Debug, Error)]
pub enum KuronimeError {
    #[error("failed to parse {url} as a base URL")]
    BaseUrl { url: String },

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("HTTP request failed while {context}: {source}")]
    Request {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body while {context}: {source}")]
    ResponseBody {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no id found")]
    PayloadNotFound,

    #[error("decryption failed: {0}")]
    Decrypt(#[from] DecryptError),

    #[error("failed to decode JSON while {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("embed extraction failed for {url}: {source}")]
    EmbedExtraction {
        url: String,
        #[source]
        source: CoreError,
    },

    #[error("missing {what} on {url}")]
    MissingElement { what: &'static str, url: String },

    #[error("{0}")]
    Message(String),
}

impl KuronimeError {
    /// request or status failures; the only kinds that abort `load_links` besides [`Self::PayloadNotFound`].
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            Self::Request { .. }
                | Self::ResponseBody { .. }
                | Self::Core(CoreError::Request { .. })
                | Self::Core(CoreError::ResponseBody { .. })
                | Self::Core(CoreError::HttpStatus { .. })
        )
    }
}
