use inquire::*;
use kuronime::prelude::*;

use crate::args::*;

fn prompt_error(what: &str) -> impl FnOnce(InquireError) -> KuronimeError + '_ {
    move |err| KuronimeError::Message(format!("failed to read {what}: {err}"))
}

pub fn prompt_query() -> Result<String> {
    let query = Text::new("search:")
        .with_help_message("part of the anime title")
        .prompt()
        .map_err(prompt_error("search query"))?;

    let query = query.trim().to_string();
    if query.is_empty() {
        return Err(KuronimeError::Message("search query is empty".to_string()));
    }
    Ok(query)
}

/// picks one entry of `items`, labelled by `label`.
fn select_index<T>(message: &str, items: &[T], label: impl Fn(&T) -> String) -> Result<usize> {
    let options: Vec<String> = items.iter().map(label).collect();
    let picked = Select::new(message, options)
        .with_page_size(15)
        .raw_prompt()
        .map_err(prompt_error(message))?;
    Ok(picked.index)
}

pub fn select_series(mut results: Vec<SearchResult>) -> Result<SearchResult> {
    if results.is_empty() {
        return Err(KuronimeError::Message("no anime matched the query".to_string()));
    }

    let index = select_index("anime:", &results, |r| match r.episode {
        Some(ep) => format!("{} (ep {ep})", r.title),
        None => r.title.clone(),
    })?;
    Ok(results.swap_remove(index))
}

pub fn select_episode(mut episodes: Vec<Episode>) -> Result<Episode> {
    if episodes.is_empty() {
        return Err(KuronimeError::Message("series has no episodes".to_string()));
    }

    // newest first reads better in a list
    episodes.reverse();
    let index = select_index("episode:", &episodes, |e| e.name.clone())?;
    Ok(episodes.swap_remove(index))
}

pub fn select_quality(current: QualityPreference) -> Result<QualityPreference> {
    let choices = vec!["all", "highest", "1080p", "720p", "480p", "360p", "lowest"];
    let start = choices
        .iter()
        .position(|c| *c == current.to_string())
        .unwrap_or(0);

    Select::new("preferred quality:", choices)
        .with_starting_cursor(start)
        .prompt()
        .map_err(prompt_error("quality"))?
        .parse::<QualityPreference>()
        .map_err(KuronimeError::Message)
}
