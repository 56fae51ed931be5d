use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingDirection {
    #[default]
    Rtl,
    Ltr,
}

impl ReadingDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rtl" => Some(ReadingDirection::Rtl),
            "ltr" => Some(ReadingDirection::Ltr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingDirection::Rtl => "rtl",
            ReadingDirection::Ltr => "ltr",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ReadingDirection::Rtl => ReadingDirection::Ltr,
            ReadingDirection::Ltr => ReadingDirection::Rtl,
        }
    }
}

/// A manga record as served by the backend, episodes and raw pages nested.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manga {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub arabic_title: Option<String>,
    #[serde(default)]
    pub episode_label: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub episodes: Vec<EpisodeRecord>,
}

impl Manga {
    pub fn episode(&self, number: u32) -> Option<&EpisodeRecord> {
        self.episodes.iter().find(|ep| ep.number == number)
    }

    pub fn episode_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.episodes.iter().map(|ep| ep.number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }

    pub fn display_title(&self) -> &str {
        self.arabic_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub number: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pages: Vec<RawPage>,
}

/// Page entry before its image reference is resolved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPage {
    #[serde(default, alias = "image_url")]
    pub image: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, alias = "derja_translation")]
    pub translation: Option<String>,
}

impl RawPage {
    pub fn is_blank(&self) -> bool {
        self.kind.as_deref() == Some("blank")
            || self.image.as_deref().is_none_or(|image| image.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Content {
        url: String,
        translation: Option<String>,
    },
    Blank,
}

/// An episode whose pages carry absolute image URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub manga_id: String,
    pub number: u32,
    pub pages: Vec<Page>,
}

/// One renderable position of the flip surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSlot {
    Page {
        url: String,
        key: usize,
        translation: Option<String>,
    },
    Blank {
        key: usize,
    },
}

impl PageSlot {
    pub fn key(&self) -> usize {
        match self {
            PageSlot::Page { key, .. } | PageSlot::Blank { key } => *key,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            PageSlot::Page { url, .. } => Some(url),
            PageSlot::Blank { .. } => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, PageSlot::Blank { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaturalSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScaledDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryItem {
    pub last_read: chrono::DateTime<chrono::Utc>,
    pub manga_id: String,
    pub title: Option<String>,
    pub chapter: u32,
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub name: String,
    pub chapter: u32,
    pub page: usize,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}
