use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// failures of the symmetric decryption unit.
///
/// every variant records the length of the payload that was being decrypted.
#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("payload of {len} chars is not valid base64: {source}")]
    Base64 {
        len: usize,
        #[source]
        source: base64::DecodeError,
    },

    #[error("ciphertext of {len} bytes is not a multiple of the 16 byte block size")]
    Misaligned { len: usize },

    #[error("key of {key_len} bytes rejected for a {len} byte ciphertext")]
    InvalidKey { len: usize, key_len: usize },

    #[error("cipher failed on a {len} byte ciphertext")]
    Cipher { len: usize },

    #[error("malformed cryptojs envelope ({len} bytes): {reason}")]
    Envelope { len: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("request client build failed while {context}: {source}")]
    BuildClient {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed while {context}: {source}")]
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

    #[error("{context} returned {status}\nresponse text:\n{body}")]
    HttpStatus {
        context: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("no playable source found in embed page {url}")]
    NoSource { url: String },

    #[error(transparent)]
    Decrypt(#[from] DecryptError),
}
