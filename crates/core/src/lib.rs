pub mod crypto;
pub mod errors;
pub mod extractor;
pub mod fanout;
pub mod generic;
pub mod http;
pub mod m3u8;
pub mod payload;
pub mod quality;

pub use errors::{CoreError, DecryptError, Result};
pub use extractor::{Extractor, ExtractorLink, ExtractorRegistry, LinkKind, SubtitleFile};
pub use fanout::{DEFAULT_CONCURRENCY, join_settled, join_settled_bounded};
pub use generic::GenericExtractor;
pub use m3u8::M3u8Helper;
pub use payload::extract_encoded_string;
pub use quality::Quality;
