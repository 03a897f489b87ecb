pub use crate::builder::KuronimeBuilder;
pub use crate::catalog::{
    AnimeDetails, Episode, HomePage, MainPageSection, SearchResult, ShowStatus, TvType,
    main_page_sections,
};
pub use crate::client::{KuronimeClient, SiteContext};
pub use crate::errors::{KuronimeError, Result};

pub use kuronime_core::{Extractor, ExtractorLink, LinkKind, Quality, SubtitleFile};
