use biderja::{
    cli::Cli,
    config::{Config, get_app_data_prefix},
    fetcher::{ContentSource, RemoteContent},
    logging::{self, LogLevel},
    models::{Manga, PageSlot},
    sequencer,
    session::default_address_base,
    state::State,
    sync::ReaderQuery,
    ui::reader::Reader,
};

use chrono::Local;
use clap::Parser;
use eyre::{Result, eyre};
use reqwest::Url;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path.clone())?,
        None => Config::new()?,
    };
    if let Some(api_url) = &cli.api_url {
        config.settings.api_base_url = api_url.clone();
    }
    if let Some(direction) = cli.direction {
        config.settings.reading_direction = direction;
    }

    // The terminal UI owns stdout and stderr, so it logs to a file.
    let interactive = !cli.history && !cli.dump && !cli.list && cli.search.is_none();
    let log_file = if interactive {
        Some(get_app_data_prefix()?.join("biderja.log"))
    } else {
        None
    };
    logging::init(LogLevel::from_flags(cli.verbose, cli.debug), log_file)?;

    if cli.history {
        return print_history();
    }

    if cli.list {
        let content = RemoteContent::from_settings(&config.settings)?;
        return print_catalog(&content.list_manga()?);
    }
    if let Some(term) = &cli.search {
        let content = RemoteContent::from_settings(&config.settings)?;
        return print_catalog(&content.search_manga(term)?);
    }

    let query = resolve_query(&cli, &config)?;
    if cli.dump {
        let query = query.ok_or_else(|| eyre!("no manga given and no reading history"))?;
        return dump_episode(&config, &query);
    }

    let mut reader = Reader::new(config)?;
    reader.run(query)
}

fn address_base(config: &Config) -> Url {
    match Url::parse(&config.settings.address_base) {
        Ok(url) => url,
        Err(err) => {
            log::warn!(
                "invalid address base {}: {err}",
                config.settings.address_base
            );
            default_address_base()
        }
    }
}

/// Position to open: the address, then the command line overrides, and the
/// last read manga when neither names one.
fn resolve_query(cli: &Cli, config: &Config) -> Result<Option<ReaderQuery>> {
    let mut query = match &cli.address {
        Some(address) => Some(ReaderQuery::parse(address, &address_base(config))?),
        None if cli.manga.is_some() => Some(ReaderQuery::default()),
        None => State::new()?.get_last_read()?,
    };

    if let Some(query) = &mut query {
        if let Some(manga) = &cli.manga {
            query.manga = Some(manga.clone());
        }
        if let Some(chapter) = cli.chapter {
            query.chapter = chapter.max(1);
        }
        if let Some(page) = cli.page {
            query.page = page;
        }
    }
    Ok(query)
}

fn print_history() -> Result<()> {
    let state = State::new()?;
    let library = state.get_from_history()?;
    if library.is_empty() {
        println!("No reading history");
        return Ok(());
    }
    for (n, item) in library.iter().enumerate() {
        let last_read = item.last_read.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        let title = item.title.as_deref().unwrap_or(&item.manga_id);
        println!(
            "{:>3}. {last_read}  {title} [manga={}&chapter={}&page={}]",
            n + 1,
            item.manga_id,
            item.chapter,
            item.page
        );
    }
    Ok(())
}

fn print_catalog(catalog: &[Manga]) -> Result<()> {
    if catalog.is_empty() {
        println!("No manga found");
        return Ok(());
    }
    for manga in catalog {
        let chapters = manga.episodes.len();
        if chapters > 0 {
            println!("{:>8}  {} ({chapters} chapters)", manga.id, manga.display_title());
        } else {
            println!("{:>8}  {}", manga.id, manga.display_title());
        }
    }
    Ok(())
}

fn dump_episode(config: &Config, query: &ReaderQuery) -> Result<()> {
    let manga_id = query
        .manga
        .as_deref()
        .ok_or_else(|| eyre!("no manga given"))?;
    let content = RemoteContent::from_settings(&config.settings)?;
    let manga = content.fetch_manga(manga_id)?;
    let episode = content.fetch_episode(&manga, query.chapter)?;

    let direction = config.settings.reading_direction;
    let slots = sequencer::sequence(&episode.pages, direction);
    println!(
        "{} - chapter {} ({}, {} slots)",
        manga.display_title(),
        episode.number,
        direction.as_str(),
        slots.len()
    );
    for (index, slot) in slots.iter().enumerate() {
        let number = sequencer::display_number(index, slots.len(), direction);
        match slot {
            PageSlot::Page {
                url, translation, ..
            } => {
                println!("{index:>4}  p.{number:<4} {url}");
                if let Some(text) = translation {
                    println!("{:>11}{}", "", text.replace('\n', " "));
                }
            }
            PageSlot::Blank { .. } => println!("{index:>4}  p.{number:<4} (blank)"),
        }
    }
    Ok(())
}
