use std::str::FromStr;

use clap::{Args, ValueEnum};

use kuronime::prelude::*;

#[derive(Debug, Clone, Args)]
pub struct AppArgs {
    /// Logging verbosity (error, warn, info, debug)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Site base url, for when kuronime moves to a mirror domain
    #[arg(long, env = "KURONIME_URL")]
    pub main_url: Option<String>,

    /// Origin of the link resolver api
    #[arg(long, env = "KURONIME_API_URL")]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Number of embeds extracted at once
    #[arg(long, default_value_t = kuronime::kuronime_core::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SectionArg {
    /// New Episodes
    New,
    /// Popular Anime
    Popular,
    /// Movies
    Movies,
}

impl SectionArg {
    pub fn section(self) -> &'static MainPageSection {
        let sections = main_page_sections();
        let index = match self {
            Self::New => 0,
            Self::Popular => 1,
            Self::Movies => 2,
        };
        &sections[index.min(sections.len() - 1)]
    }
}

#[derive(Debug, Clone, Args)]
pub struct HomeArgs {
    /// Home page section to list
    #[arg(short, long, value_enum, default_value = "new")]
    pub section: SectionArg,

    /// Page number (1-indexed)
    #[arg(short, long, default_value_t = 1)]
    pub page: u32,

    #[command(flatten)]
    pub app_args: AppArgs,
}

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Title to search for
    pub query: String,

    #[command(flatten)]
    pub app_args: AppArgs,
}

#[derive(Debug, Clone, Args)]
pub struct LoadArgs {
    /// Series url, or an episode url of the series
    pub url: String,

    #[command(flatten)]
    pub app_args: AppArgs,
}

#[derive(Debug, Clone, Args)]
pub struct LinksArgs {
    /// Episode page url
    #[arg(short, long)]
    pub episode: Option<String>,

    /// Links to keep (all, highest, lowest or e.g. 720p)
    #[arg(short, long, default_value = "all")]
    pub quality: QualityPreference,

    /// Search and pick the episode with interactive prompts
    #[arg(short, long)]
    pub interactive: bool,

    #[command(flatten)]
    pub app_args: AppArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreference {
    All,
    Highest,
    Lowest,
    Exact(u32),
}

impl QualityPreference {
    /// filters `links` down to the preferred quality, best first.
    ///
    /// an exact height nobody offers falls back to the highest one. unknown
    /// qualities are only picked when no link reports a height.
    pub fn select(self, mut links: Vec<ExtractorLink>) -> Vec<ExtractorLink> {
        links.sort_by(|a, b| b.quality.cmp(&a.quality));

        let pick = |quality: Option<Quality>, links: Vec<ExtractorLink>| match quality {
            Some(q) => links.into_iter().filter(|l| l.quality == q).collect(),
            None => links,
        };

        match self {
            Self::All => links,
            Self::Highest => {
                let best = links.first().map(|l| l.quality);
                pick(best, links)
            }
            Self::Lowest => {
                let worst = links
                    .iter()
                    .rev()
                    .map(|l| l.quality)
                    .find(Quality::is_known)
                    .or_else(|| links.last().map(|l| l.quality));
                pick(worst, links)
            }
            Self::Exact(height) => {
                let wanted = Quality::from_height(height);
                if links.iter().any(|l| l.quality == wanted) {
                    pick(Some(wanted), links)
                } else {
                    Self::Highest.select(links)
                }
            }
        }
    }
}

impl FromStr for QualityPreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "all" => Ok(Self::All),
            "highest" => Ok(Self::Highest),
            "lowest" => Ok(Self::Lowest),
            other => other
                .trim_end_matches('p')
                .parse::<u32>()
                .map(Self::Exact)
                .map_err(|_| format!("invalid quality: {s}")),
        }
    }
}

impl std::fmt::Display for QualityPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Highest => write!(f, "highest"),
            Self::Lowest => write!(f, "lowest"),
            Self::Exact(height) => write!(f, "{height}p"),
        }
    }
}
