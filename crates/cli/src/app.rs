use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

use kuronime::prelude::*;

use crate::args::*;
use crate::logger::*;
use crate::prompt::*;
use crate::render::*;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub links_args: LinksArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List a home page section
    Home(HomeArgs),
    /// Search anime by title
    Search(SearchArgs),
    /// Show series details and episodes
    Load(LoadArgs),
    /// Resolve playable links of an episode
    Links(LinksArgs),
}

impl Cli {
    fn app_args(&self) -> &AppArgs {
        match &self.command {
            Some(Commands::Home(args)) => &args.app_args,
            Some(Commands::Search(args)) => &args.app_args,
            Some(Commands::Load(args)) => &args.app_args,
            Some(Commands::Links(args)) => &args.app_args,
            None => &self.links_args.app_args,
        }
    }
}

#[derive(Debug)]
pub struct App {
    cli: Cli,
    logger: Arc<CliLogger>,
}

impl App {
    pub fn new() -> Self {
        let cli = Cli::parse();
        let logger = Arc::new(CliLogger::new(&cli.app_args().log_level));
        init_tracing(Arc::clone(&logger));
        Self { cli, logger }
    }

    pub async fn run(&self) -> bool {
        let result = match &self.cli.command {
            Some(Commands::Home(args)) => self.home(args).await,
            Some(Commands::Search(args)) => self.search(args).await,
            Some(Commands::Load(args)) => self.load(args).await,
            Some(Commands::Links(args)) => self.links(args).await,
            None => self.links(&self.cli.links_args).await,
        };

        if let Err(err) = result {
            self.logger.failed(format!("{err}"));
            return false;
        }
        true
    }

    fn client(&self, args: &AppArgs) -> Result<KuronimeClient> {
        let mut builder = KuronimeBuilder::new().embed_concurrency(args.concurrency);
        if let Some(url) = &args.main_url {
            builder = builder.main_url(url);
        }
        if let Some(url) = &args.api_url {
            builder = builder.api_url(url);
        }
        if let Some(secs) = args.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    pub async fn home(&self, args: &HomeArgs) -> Result<()> {
        let kuronime = self.client(&args.app_args)?;
        let section = args.section.section();

        let page = self
            .logger
            .while_loading(
                format!("loading {} page {}", section.name, args.page),
                kuronime.get_main_page(section, args.page),
            )
            .await?;

        render_home(&page);
        Ok(())
    }

    pub async fn search(&self, args: &SearchArgs) -> Result<()> {
        let kuronime = self.client(&args.app_args)?;
        let results = self
            .logger
            .while_loading(
                format!("searching {}", args.query),
                kuronime.search(&args.query),
            )
            .await?;

        self.logger
            .success(format!("{} result(s)", results.len().yellow()));
        render_results(&results);
        Ok(())
    }

    pub async fn load(&self, args: &LoadArgs) -> Result<()> {
        let kuronime = self.client(&args.app_args)?;
        let details = self
            .logger
            .while_loading(format!("loading {}", args.url), kuronime.load(&args.url))
            .await?;

        render_details(&details);
        Ok(())
    }

    pub async fn links(&self, args: &LinksArgs) -> Result<()> {
        let logger = &self.logger;
        let kuronime = self.client(&args.app_args)?;

        let (episode, quality) = match &args.episode {
            Some(episode) if !args.interactive => (episode.clone(), args.quality),
            _ => self.pick_episode(&kuronime, args.quality).await?,
        };

        let links = Mutex::new(Vec::new());
        let subtitles = Mutex::new(Vec::new());
        let found = logger
            .while_loading(
                format!("resolving {episode}"),
                kuronime.load_links(
                    &episode,
                    &|sub| {
                        if let Ok(mut subtitles) = subtitles.lock() {
                            subtitles.push(sub);
                        }
                    },
                    &|link| {
                        if let Ok(mut links) = links.lock() {
                            links.push(link);
                        }
                    },
                ),
            )
            .await?;

        let links = links.into_inner().unwrap_or_default();
        let subtitles = subtitles.into_inner().unwrap_or_default();

        if !found {
            logger.warn("the episode has no sources");
            return Ok(());
        }
        if links.is_empty() {
            logger.warn("no playable links could be extracted");
            return Ok(());
        }

        let selected = quality.select(links);
        logger.success(format!(
            "{} link(s) with quality {}",
            selected.len().yellow(),
            quality.yellow()
        ));
        render_links(&selected, &subtitles);
        Ok(())
    }

    /// search, series and episode prompts; returns the chosen episode url.
    async fn pick_episode(
        &self,
        kuronime: &KuronimeClient,
        quality: QualityPreference,
    ) -> Result<(String, QualityPreference)> {
        let query = prompt_query()?;
        let results = self
            .logger
            .while_loading(format!("searching {query}"), kuronime.search(&query))
            .await?;
        let series = select_series(results)?;

        let details = self
            .logger
            .while_loading(format!("loading {}", series.title), kuronime.load(&series.url))
            .await?;
        let episode = select_episode(details.episodes)?;
        let quality = select_quality(quality)?;

        Ok((episode.url, quality))
    }
}
