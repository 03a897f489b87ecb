pub mod builder;
pub mod catalog;
pub mod client;
pub mod errors;
pub mod links;
pub mod prelude;

pub use builder::*;
pub use catalog::*;
pub use client::*;
pub use errors::*;
pub use links::*;

pub use kuronime_core;
pub use kuronime_core::{Extractor, ExtractorLink, LinkKind, Quality, SubtitleFile};
