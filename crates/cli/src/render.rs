use owo_colors::OwoColorize;

use kuronime::prelude::*;

fn tv_type_label(tv_type: TvType) -> &'static str {
    match tv_type {
        TvType::Anime => "tv",
        TvType::AnimeMovie => "movie",
        TvType::Ova => "ova",
    }
}

pub fn render_results(results: &[SearchResult]) {
    for (i, result) in results.iter().enumerate() {
        let episode = result
            .episode
            .map(|ep| format!("ep {ep}"))
            .unwrap_or_default();
        println!(
            "{:>3}. {} {} {}",
            (i + 1).dimmed(),
            result.title.bold(),
            tv_type_label(result.tv_type).cyan(),
            episode.yellow()
        );
        println!("     {}", result.url.dimmed());
    }
}

pub fn render_home(page: &HomePage) {
    println!("{}", page.name.bold().green());
    render_results(&page.items);
}

pub fn render_details(details: &AnimeDetails) {
    println!("{}", details.title.bold().green());

    let status = match details.status {
        Some(ShowStatus::Ongoing) => "ongoing",
        Some(ShowStatus::Completed) => "completed",
        None => "unknown",
    };
    let year = details
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "----".to_string());
    println!(
        "{} · {} · {}",
        tv_type_label(details.tv_type).cyan(),
        year.yellow(),
        status.magenta()
    );

    if !details.tags.is_empty() {
        println!("{}", details.tags.join(", ").dimmed());
    }
    if !details.description.is_empty() {
        println!("\n{}\n", details.description);
    }

    for episode in &details.episodes {
        let number = episode
            .number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("{:>5} {}", number.yellow(), episode.url);
    }
}

pub fn render_links(links: &[ExtractorLink], subtitles: &[SubtitleFile]) {
    for link in links {
        let kind = match link.kind {
            LinkKind::M3u8 => "hls",
            LinkKind::Dash => "dash",
            LinkKind::Video => "video",
        };
        println!(
            "{:>8} {:>5} {}",
            link.quality.to_string().yellow(),
            kind.cyan(),
            link.name.bold()
        );
        println!("         {}", link.url);
        if !link.referer.is_empty() {
            println!("         {} {}", "referer".dimmed(), link.referer.dimmed());
        }
    }

    for subtitle in subtitles {
        println!("{:>8} {}", subtitle.lang.magenta(), subtitle.url);
    }
}
