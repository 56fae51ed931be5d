use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::models::ReadingDirection;

#[derive(Parser, Debug)]
#[clap(
    name = "biderja",
    version,
    about = "A terminal manga reader with right-to-left page flipping.",
    long_about = None
)]
pub struct Cli {
    /// Print reading history
    #[clap(short = 'r', long)]
    pub history: bool,

    /// Print the page slots of the addressed chapter instead of reading it
    #[clap(short, long)]
    pub dump: bool,

    /// List the manga available on the backend
    #[clap(short, long)]
    pub list: bool,

    /// Search the backend catalog by title
    #[clap(short, long, value_name = "QUERY")]
    pub search: Option<String>,

    /// Use a specific configuration file
    #[clap(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Enable debug output
    #[clap(long)]
    pub debug: bool,

    /// Manga id (overrides the address)
    #[clap(long, value_name = "ID")]
    pub manga: Option<String>,

    /// Chapter number (overrides the address)
    #[clap(long, value_name = "N")]
    pub chapter: Option<u32>,

    /// Page index, starting at 0 (overrides the address)
    #[clap(long, value_name = "P")]
    pub page: Option<usize>,

    /// Reading direction
    #[clap(long, value_name = "rtl|ltr", value_parser = parse_direction)]
    pub direction: Option<ReadingDirection>,

    /// Base URL of the manga API
    #[clap(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Reader address, e.g. "manga=42&chapter=3&page=5" or a full URL
    #[clap(name = "ADDRESS")]
    pub address: Option<String>,
}

fn parse_direction(value: &str) -> Result<ReadingDirection, String> {
    ReadingDirection::parse(value).ok_or_else(|| format!("unknown direction '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_and_overrides() {
        let cli = Cli::parse_from([
            "biderja",
            "manga=42&chapter=3",
            "--page",
            "5",
            "--direction",
            "ltr",
            "-vv",
        ]);
        assert_eq!(cli.address.as_deref(), Some("manga=42&chapter=3"));
        assert_eq!(cli.page, Some(5));
        assert_eq!(cli.direction, Some(ReadingDirection::Ltr));
        assert_eq!(cli.verbose, 2);
        assert!(!cli.dump);
    }

    #[test]
    fn test_catalog_flags() {
        let cli = Cli::parse_from(["biderja", "-s", "one piece"]);
        assert_eq!(cli.search.as_deref(), Some("one piece"));
        assert!(!cli.list);
        assert!(Cli::parse_from(["biderja", "--list"]).list);
    }

    #[test]
    fn test_rejects_unknown_direction() {
        assert!(Cli::try_parse_from(["biderja", "--direction", "up"]).is_err());
    }
}
