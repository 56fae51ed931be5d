use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::FetchError;
use crate::models::{Episode, Manga, NaturalSize, Page};
use crate::settings::Settings;

/// Access to manga records, resolved episodes and image measurements.
pub trait ContentSource {
    fn fetch_manga(&self, id: &str) -> Result<Manga, FetchError>;
    fn fetch_episode(&self, manga: &Manga, number: u32) -> Result<Episode, FetchError>;
    fn measure_image(&self, url: &str) -> Result<NaturalSize, FetchError>;
}

#[derive(Debug, Clone)]
struct CachedManga {
    manga: Manga,
    fetched_at: Instant,
}

/// Manga records fetched earlier, each valid for `ttl`.
#[derive(Debug, Clone)]
pub struct MangaCache {
    ttl: Duration,
    entries: HashMap<String, CachedManga>,
}

impl MangaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, id: &str, now: Instant) -> Option<Manga> {
        self.entries
            .get(id)
            .filter(|entry| now.saturating_duration_since(entry.fetched_at) < self.ttl)
            .map(|entry| entry.manga.clone())
    }

    pub fn insert(&mut self, manga: Manga, now: Instant) {
        self.entries.insert(
            manga.id.clone(),
            CachedManga {
                manga,
                fetched_at: now,
            },
        );
    }

    pub fn invalidate(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measurement {
    Pending,
    Ready(NaturalSize),
    Failed,
}

/// Natural image sizes keyed by URL. Each URL is measured at most once.
#[derive(Debug, Clone, Default)]
pub struct ImageSizes {
    entries: HashMap<String, Measurement>,
}

impl ImageSizes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `url` has never been requested, meaning the caller
    /// should start a measurement.
    pub fn request(&mut self, url: &str) -> bool {
        if self.entries.contains_key(url) {
            return false;
        }
        self.entries.insert(url.to_string(), Measurement::Pending);
        true
    }

    /// Record the outcome of a measurement. Later outcomes for an already
    /// resolved URL are ignored.
    pub fn resolve(&mut self, url: &str, size: Option<NaturalSize>) -> bool {
        let entry = self
            .entries
            .entry(url.to_string())
            .or_insert(Measurement::Pending);
        if *entry != Measurement::Pending {
            return false;
        }
        *entry = match size {
            Some(size) => Measurement::Ready(size),
            None => Measurement::Failed,
        };
        true
    }

    pub fn get(&self, url: &str) -> Option<NaturalSize> {
        match self.entries.get(url) {
            Some(Measurement::Ready(size)) => Some(*size),
            _ => None,
        }
    }

    pub fn is_failed(&self, url: &str) -> bool {
        matches!(self.entries.get(url), Some(Measurement::Failed))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Manga>,
}

/// Turn a stored image reference into a URL anyone can fetch. Absolute
/// references are kept as they are.
pub fn resolve_image_url(
    storage_base: &Url,
    manga_id: &str,
    episode: u32,
    image: &str,
) -> Result<String, FetchError> {
    let image = image.trim();
    if image.starts_with("http://") || image.starts_with("https://") {
        return Ok(image.to_string());
    }

    let mut url = storage_base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| FetchError::Network(format!("invalid storage url {storage_base}")))?;
        segments.pop_if_empty();
        segments.push(manga_id);
        segments.push(&episode.to_string());
        for part in image.split('/').filter(|part| !part.is_empty()) {
            segments.push(part);
        }
    }
    Ok(url.to_string())
}

/// Resolve one episode of an already fetched manga record.
pub fn resolve_episode(
    storage_base: &Url,
    manga: &Manga,
    number: u32,
) -> Result<Episode, FetchError> {
    let record = manga
        .episode(number)
        .ok_or_else(|| FetchError::EpisodeNotFound {
            manga_id: manga.id.clone(),
            number,
        })?;

    let mut pages = Vec::with_capacity(record.pages.len());
    for raw in &record.pages {
        if raw.is_blank() {
            pages.push(Page::Blank);
            continue;
        }
        let image = raw.image.as_deref().unwrap_or_default();
        pages.push(Page::Content {
            url: resolve_image_url(storage_base, &manga.id, number, image)?,
            translation: raw
                .translation
                .as_ref()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        });
    }

    Ok(Episode {
        manga_id: manga.id.clone(),
        number,
        pages,
    })
}

/// Read the pixel size from an encoded image without decoding pixels.
pub fn image_dimensions(bytes: &[u8]) -> Result<NaturalSize, FetchError> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| FetchError::Network(err.to_string()))?
        .into_dimensions()
        .map_err(|err| FetchError::Network(err.to_string()))?;
    Ok(NaturalSize { width, height })
}

/// HTTP client for the manga backend.
#[derive(Debug, Clone)]
pub struct RemoteContent {
    client: reqwest::blocking::Client,
    api_base: Url,
    storage_base: Url,
    cache: Arc<Mutex<MangaCache>>,
}

impl RemoteContent {
    pub fn new(
        api_base: &str,
        storage_base: &str,
        timeout: Duration,
        cache: MangaCache,
    ) -> eyre::Result<Self> {
        let api_base = Url::parse(api_base)?;
        let storage_base = Url::parse(storage_base)?;

        let mut builder = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("biderja");
        if is_loopback(&api_base) {
            builder = builder.no_proxy();
        }

        Ok(Self {
            client: builder.build()?,
            api_base,
            storage_base,
            cache: Arc::new(Mutex::new(cache)),
        })
    }

    pub fn from_settings(settings: &Settings) -> eyre::Result<Self> {
        Self::new(
            &settings.api_base_url,
            &settings.storage_base_url,
            Duration::from_secs(settings.request_timeout_secs),
            MangaCache::new(Duration::from_secs(settings.cache_ttl_secs)),
        )
    }

    pub fn storage_base(&self) -> &Url {
        &self.storage_base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.api_base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| FetchError::Network(format!("invalid api url {}", self.api_base)))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        not_found: impl FnOnce() -> FetchError,
    ) -> Result<T, FetchError> {
        log::debug!("GET {url}");
        let response = self.client.get(url).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(not_found());
        }
        Ok(response.error_for_status()?.json()?)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, MangaCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch a manga record from the backend, skipping the cache.
    pub fn refresh(&self, id: &str) -> Result<Manga, FetchError> {
        let url = self.endpoint(&["manga", id])?;
        let manga: Option<Manga> =
            self.get_json(url, || FetchError::MangaNotFound(id.to_string()))?;
        let manga = manga.ok_or_else(|| FetchError::MangaNotFound(id.to_string()))?;
        self.lock_cache().insert(manga.clone(), Instant::now());
        Ok(manga)
    }

    pub fn invalidate(&self, id: &str) -> bool {
        self.lock_cache().invalidate(id)
    }

    pub fn list_manga(&self) -> Result<Vec<Manga>, FetchError> {
        let url = self.endpoint(&["manga"])?;
        let list: Vec<Manga> =
            self.get_json(url, || FetchError::Network("manga list missing".into()))?;
        let now = Instant::now();
        let mut cache = self.lock_cache();
        for manga in list.iter().filter(|m| !m.episodes.is_empty()) {
            cache.insert(manga.clone(), now);
        }
        Ok(list)
    }

    pub fn search_manga(&self, query: &str) -> Result<Vec<Manga>, FetchError> {
        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut().append_pair("q", query);
        let response: SearchResponse =
            self.get_json(url, || FetchError::Network("search unavailable".into()))?;
        Ok(response.results)
    }
}

impl ContentSource for RemoteContent {
    fn fetch_manga(&self, id: &str) -> Result<Manga, FetchError> {
        if let Some(manga) = self.lock_cache().get(id, Instant::now()) {
            log::debug!("manga {id} served from cache");
            return Ok(manga);
        }
        self.refresh(id)
    }

    fn fetch_episode(&self, manga: &Manga, number: u32) -> Result<Episode, FetchError> {
        let record = self.fetch_manga(&manga.id)?;
        resolve_episode(&self.storage_base, &record, number)
    }

    fn measure_image(&self, url: &str) -> Result<NaturalSize, FetchError> {
        log::debug!("measuring {url}");
        let bytes = self.client.get(url).send()?.error_for_status()?.bytes()?;
        image_dimensions(&bytes)
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("127.0.0.1") | Some("localhost"))
}
