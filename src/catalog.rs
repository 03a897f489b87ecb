use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info};

use kuronime_core::http::ensure_success;

use crate::client::{KuronimeClient, SiteContext};
use crate::errors::{KuronimeError, Result};

static EPISODE_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"nonton-(.+)-episode").expect("episode slug regex must compile"));

static MOVIE_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"nonton-(.+)-movie").expect("movie slug regex must compile"));

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d, (\d+)").expect("year regex must compile"));

static EPISODE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[.,]?\d*)").expect("episode number regex must compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvType {
    Anime,
    AnimeMovie,
    Ova,
}

impl TvType {
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("ova") || label.contains("special") {
            Self::Ova
        } else if label.contains("movie") {
            Self::AnimeMovie
        } else {
            Self::Anime
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowStatus {
    Completed,
    Ongoing,
}

impl ShowStatus {
    /// anything other than `Ongoing` counts as completed.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Ongoing" => Self::Ongoing,
            _ => Self::Completed,
        }
    }
}

/// a listing entry from the home page or search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    /// series page url.
    pub url: String,
    pub poster: Option<String>,
    /// latest subbed episode, when listed.
    pub episode: Option<u32>,
    pub tv_type: TvType,
}

#[derive(Debug, Clone)]
pub struct HomePage {
    pub name: String,
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainPageSection {
    /// path prefix; the page number is appended.
    pub path: &'static str,
    pub name: &'static str,
}

const MAIN_PAGE_SECTIONS: [MainPageSection; 3] = [
    MainPageSection {
        path: "/page/",
        name: "New Episodes",
    },
    MainPageSection {
        path: "/popular-anime/page/",
        name: "Popular Anime",
    },
    MainPageSection {
        path: "/movies/page/",
        name: "Movies",
    },
];

pub fn main_page_sections() -> &'static [MainPageSection] {
    &MAIN_PAGE_SECTIONS
}

#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub url: String,
    pub name: String,
    pub number: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AnimeDetails {
    pub title: String,
    pub url: String,
    pub poster: Option<String>,
    pub tags: Vec<String>,
    pub tv_type: TvType,
    pub year: Option<i32>,
    pub status: Option<ShowStatus>,
    pub description: String,
    pub trailer: Option<String>,
    /// oldest first.
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Deserialize)]
struct AjaxSearch {
    #[serde(default)]
    anime: Vec<AjaxGroup>,
}

#[derive(Debug, Deserialize)]
struct AjaxGroup {
    #[serde(default)]
    all: Vec<AjaxEntry>,
}

#[derive(Debug, Deserialize)]
struct AjaxEntry {
    post_title: Option<String>,
    post_link: Option<String>,
    post_image: Option<String>,
    post_latest: Option<String>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid selector")
}

fn own_text(el: ElementRef<'_>) -> String {
    el.children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect()
}

fn joined_text(root: ElementRef<'_>, sel: &Selector) -> String {
    root.select(sel)
        .map(|e| e.text().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// maps an episode or movie page to its series page.
pub fn proper_anime_link(site: &SiteContext, uri: &str) -> String {
    if uri.contains("/anime/") {
        return uri.to_string();
    }

    let prefix = site.referer();
    let title = uri.strip_prefix(prefix.as_str()).unwrap_or(uri);

    let slug = if title.contains("-episode") && !title.contains("-movie") {
        EPISODE_SLUG_RE.captures(title).and_then(|c| c.get(1))
    } else if title.contains("-movie") {
        MOVIE_SLUG_RE.captures(title).and_then(|c| c.get(1))
    } else {
        None
    }
    .map_or(title, |m| m.as_str());

    format!("{}/anime/{slug}", site.origin)
}

fn parse_articles(html: &str, site: &SiteContext) -> Vec<SearchResult> {
    let doc = Html::parse_document(html);
    let article_sel = selector("article");
    let link_sel = selector("a");
    let title_sel = selector(".bsuxtt, .tt > h4");
    let view_sel = selector("div.view, div.bt");
    let img_sel = selector("img");
    let ep_sel = selector(".ep");
    let type_sel = selector(".bt > span");

    doc.select(&article_sel)
        .filter_map(|article| {
            let href = article
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| site.fix_url(href))?;

            let poster = article
                .select(&view_sel)
                .next()
                .and_then(|e| e.next_siblings().find_map(ElementRef::wrap))
                .and_then(|sibling| {
                    sibling.select(&img_sel).find_map(|img| {
                        img.value()
                            .attr("data-src")
                            .or_else(|| img.value().attr("src"))
                    })
                })
                .and_then(|src| site.fix_url(src));

            let episode = joined_text(article, &ep_sel)
                .chars()
                .filter(char::is_ascii_digit)
                .collect::<String>()
                .parse::<u32>()
                .ok();

            let tv_type = TvType::from_label(
                &article
                    .select(&type_sel)
                    .next()
                    .map(|e| e.text().collect::<String>())
                    .unwrap_or_default(),
            );

            Some(SearchResult {
                title: joined_text(article, &title_sel).trim().to_string(),
                url: proper_anime_link(site, &href),
                poster,
                episode,
                tv_type,
            })
        })
        .collect()
}

fn parse_details(html: &str, url: &str, site: &SiteContext) -> Result<AnimeDetails> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let first = |css: &str| root.select(&selector(css)).next();

    let title = first(".entry-title")
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| KuronimeError::MissingElement {
            what: "title",
            url: url.to_string(),
        })?;

    let poster = first("div.l[itemprop=image] > img")
        .and_then(|img| img.value().attr("data-src"))
        .and_then(|src| site.fix_url(src));

    let tags = root
        .select(&selector(".infodetail > ul > li:nth-child(2) > a"))
        .map(|a| a.text().collect::<String>().trim().to_string())
        .collect();

    let type_label = first(".infodetail > ul > li:nth-child(7)")
        .map(|e| {
            own_text(e)
                .trim()
                .trim_start_matches(':')
                .trim()
                .to_lowercase()
        })
        .unwrap_or_else(|| "tv".to_string());

    let trailer = first("div.tply iframe")
        .and_then(|e| e.value().attr("data-src"))
        .map(str::to_string);

    let year = YEAR_RE
        .captures(&joined_text(root, &selector(".infodetail > ul > li:nth-child(5)")))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok());

    let status = first(".infodetail > ul > li:nth-child(3)").map(|e| {
        let label: String = own_text(e)
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        ShowStatus::from_label(&label)
    });

    let description = joined_text(root, &selector("span.const > p"));

    let link_sel = selector("a");
    let mut episodes: Vec<Episode> = root
        .select(&selector("div.bixbox.bxcl > ul > li"))
        .filter_map(|li| {
            let a = li.select(&link_sel).next()?;
            let href = a.value().attr("href").and_then(|h| site.fix_url(h))?;
            let name = a.text().collect::<String>().trim().to_string();
            let number = EPISODE_NUMBER_RE
                .captures(&name)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok());
            Some(Episode {
                url: href,
                name,
                number,
            })
        })
        .collect();
    episodes.reverse();

    Ok(AnimeDetails {
        title,
        url: url.to_string(),
        poster,
        tags,
        tv_type: TvType::from_label(&type_label),
        year,
        status,
        description,
        trailer,
        episodes,
    })
}

impl KuronimeClient {
    /// loads one page of a home page section.
    pub async fn get_main_page(&self, section: &MainPageSection, page: u32) -> Result<HomePage> {
        let url = format!("{}{}{page}", self.main_url, section.path);
        let (site, html) = self
            .fetch_page(&url, &format!("{} page {page}", section.name))
            .await?;

        let items = parse_articles(&html, &site);
        debug!(section = section.name, page, count = items.len(), "parsed home page");
        Ok(HomePage {
            name: section.name.to_string(),
            items,
        })
    }

    /// searches titles through the site's ajax endpoint.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let site = self.resolve_site().await?;
        let url = format!("{}/wp-admin/admin-ajax.php", site.origin);
        info!(%query, "searching");

        let resp = self
            .client
            .post(&url)
            .headers(self.headers(Some(&site.referer()), true))
            .header("X-Requested-With", "XMLHttpRequest")
            .form(&[("action", "ajaxy_sf"), ("sf_value", query), ("search", "false")])
            .send()
            .await
            .map_err(|source| KuronimeError::Request {
                context: format!("searching {query}"),
                source,
            })?;

        let resp = ensure_success(resp, "search api").await?;
        let text = resp
            .text()
            .await
            .map_err(|source| KuronimeError::ResponseBody {
                context: "reading search body".to_string(),
                source,
            })?;

        let parsed: AjaxSearch =
            serde_json::from_str(&text).map_err(|source| KuronimeError::Parse {
                context: "parsing search json".to_string(),
                source,
            })?;

        let results = parsed
            .anime
            .into_iter()
            .next()
            .map(|group| group.all)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                let url = site.fix_url(entry.post_link.as_deref()?)?;
                Some(SearchResult {
                    title: entry.post_title.unwrap_or_default(),
                    url,
                    poster: entry.post_image.and_then(|p| site.fix_url(&p)),
                    episode: entry.post_latest.and_then(|l| l.trim().parse().ok()),
                    tv_type: TvType::Anime,
                })
            })
            .collect::<Vec<_>>();

        debug!(%query, count = results.len(), "search finished");
        Ok(results)
    }

    /// loads series details and the episode list.
    pub async fn load(&self, url: &str) -> Result<AnimeDetails> {
        let (site, html) = self.fetch_page(url, &format!("series page {url}")).await?;
        parse_details(&html, url, &site)
    }
}
