use serde::{Deserialize, Serialize};

use crate::locale::Language;
use crate::models::ReadingDirection;

pub const DEFAULT_API_BASE_URL: &str = "https://lightblue-coyote-949011.hostingersite.com/api";
pub const DEFAULT_STORAGE_BASE_URL: &str =
    "https://lightblue-coyote-949011.hostingersite.com/storage/manga_pages";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub storage_base_url: String,
    pub address_base: String,
    pub reading_direction: ReadingDirection,
    pub language: Language,
    pub double_spread: bool,
    pub show_progress_indicator: bool,
    pub mouse_support: bool,
    pub auto_advance_delay_ms: u64,
    pub ui_autohide_ms: u64,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage_base_url: DEFAULT_STORAGE_BASE_URL.to_string(),
            address_base: crate::session::DEFAULT_ADDRESS_BASE.to_string(),
            reading_direction: ReadingDirection::Rtl,
            language: Language::Ar,
            double_spread: true,
            show_progress_indicator: true,
            mouse_support: false,
            auto_advance_delay_ms: 1500,
            ui_autohide_ms: 3000,
            request_timeout_secs: 15,
            cache_ttl_secs: 300,
        }
    }
}

/// User-facing key bindings. Each value is a single character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeymapConfig {
    pub next_page: String,
    pub prev_page: String,
    pub next_episode: String,
    pub prev_episode: String,
    pub first_page: String,
    pub last_page: String,
    pub history_back: String,
    pub history_forward: String,
    pub copy_address: String,
    pub add_bookmark: String,
    pub show_bookmarks: String,
    pub library: String,
    pub reload: String,
    pub double_spread_toggle: String,
    pub direction_toggle: String,
    pub quit: String,
    pub help: String,
}

impl Default for KeymapConfig {
    fn default() -> Self {
        Self {
            next_page: "l".to_string(),
            prev_page: "h".to_string(),
            next_episode: "L".to_string(),
            prev_episode: "H".to_string(),
            first_page: "g".to_string(),
            last_page: "G".to_string(),
            history_back: "[".to_string(),
            history_forward: "]".to_string(),
            copy_address: "y".to_string(),
            add_bookmark: "b".to_string(),
            show_bookmarks: "B".to_string(),
            library: "R".to_string(),
            reload: "r".to_string(),
            double_spread_toggle: "D".to_string(),
            direction_toggle: "d".to_string(),
            quit: "q".to_string(),
            help: "?".to_string(),
        }
    }
}

impl KeymapConfig {
    /// (key, description) pairs for the help window.
    pub fn help_entries(&self) -> Vec<(&str, &'static str)> {
        vec![
            (self.next_page.as_str(), "Next page"),
            (self.prev_page.as_str(), "Previous page"),
            (self.next_episode.as_str(), "Next chapter"),
            (self.prev_episode.as_str(), "Previous chapter"),
            (self.first_page.as_str(), "First page"),
            (self.last_page.as_str(), "Last page"),
            (self.history_back.as_str(), "Back in address history"),
            (self.history_forward.as_str(), "Forward in address history"),
            (self.copy_address.as_str(), "Copy reader address"),
            (self.add_bookmark.as_str(), "Add bookmark"),
            (self.show_bookmarks.as_str(), "Show bookmarks"),
            (self.library.as_str(), "Library"),
            (self.reload.as_str(), "Reload manga"),
            (self.double_spread_toggle.as_str(), "Toggle two-page spread"),
            (self.direction_toggle.as_str(), "Toggle reading direction"),
            (self.help.as_str(), "Help"),
            (self.quit.as_str(), "Quit"),
        ]
    }
}
