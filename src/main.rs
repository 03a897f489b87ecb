use std::sync::Mutex;

use kuronime::{KuronimeBuilder, main_page_sections};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let kuronime = KuronimeBuilder::new().build()?;

    let section = &main_page_sections()[0];
    let home = kuronime.get_main_page(section, 1).await?;
    println!("{}: {} entries", home.name, home.items.len());

    let Some(first) = home.items.first() else {
        return Ok(());
    };

    let details = kuronime.load(&first.url).await?;
    println!("{} ({} episodes)", details.title, details.episodes.len());

    let Some(episode) = details.episodes.last() else {
        return Ok(());
    };

    let links = Mutex::new(Vec::new());
    let found = kuronime
        .load_links(
            &episode.url,
            &|sub| println!("subtitle: {} {}", sub.lang, sub.url),
            &|link| {
                if let Ok(mut links) = links.lock() {
                    links.push(link);
                }
            },
        )
        .await?;

    println!("found: {found}");
    for link in links.into_inner().unwrap_or_default() {
        println!("{} [{}] {}", link.name, link.quality, link.url);
    }
    Ok(())
}
