use std::borrow::Cow;
use std::time::{Duration, Instant};

use reqwest::Url;

/// Settle time between arriving on the last page and moving to the next
/// episode, long enough for the page-turn animation to finish.
pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(1500);

pub const MANGA_PARAM: &str = "manga";
pub const CHAPTER_PARAM: &str = "chapter";
pub const PAGE_PARAM: &str = "page";

/// Reader position as carried by the address query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderQuery {
    pub manga: Option<String>,
    pub chapter: u32,
    pub page: usize,
}

impl Default for ReaderQuery {
    fn default() -> Self {
        Self {
            manga: None,
            chapter: 1,
            page: 0,
        }
    }
}

impl ReaderQuery {
    pub fn new(manga: impl Into<String>, chapter: u32, page: usize) -> Self {
        Self {
            manga: Some(manga.into()),
            chapter: chapter.max(1),
            page,
        }
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Cow<'a, str>, Cow<'a, str>)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_ref() {
                MANGA_PARAM => {
                    let value = value.trim();
                    query.manga = (!value.is_empty()).then(|| value.to_string());
                }
                CHAPTER_PARAM => {
                    query.chapter = value
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n >= 1)
                        .unwrap_or(1);
                }
                PAGE_PARAM => {
                    query.page = value.trim().parse::<usize>().unwrap_or(0);
                }
                _ => {}
            }
        }
        query
    }

    pub fn from_url(url: &Url) -> Self {
        Self::from_pairs(url.query_pairs())
    }

    /// Accepts a full address or a bare query string such as
    /// `manga=42&chapter=3&page=5`.
    pub fn parse(input: &str, base: &Url) -> eyre::Result<Self> {
        let input = input.trim();
        if input.contains("://") {
            let url = Url::parse(input)?;
            return Ok(Self::from_url(&url));
        }
        let mut url = base.clone();
        url.set_query(Some(input.trim_start_matches('?')));
        Ok(Self::from_url(&url))
    }

    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.set_query(None);
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(manga) = &self.manga {
                pairs.append_pair(MANGA_PARAM, manga);
            }
            pairs.append_pair(CHAPTER_PARAM, &self.chapter.to_string());
            pairs.append_pair(PAGE_PARAM, &self.page.to_string());
        }
        url
    }
}

/// Copy of `url` with only its `page` parameter set to `page`.
pub fn with_page_param(url: &Url, page: usize) -> Url {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    match pairs.iter_mut().find(|(k, _)| k == PAGE_PARAM) {
        Some((_, value)) => *value = page.to_string(),
        None => pairs.push((PAGE_PARAM.to_string(), page.to_string())),
    }

    let mut updated = url.clone();
    updated.set_query(None);
    updated.query_pairs_mut().extend_pairs(pairs);
    updated
}

/// Browser-style address history: pushes drop the forward entries,
/// replaces rewrite the current one.
#[derive(Debug, Clone)]
pub struct AddressHistory {
    entries: Vec<Url>,
    index: usize,
}

impl AddressHistory {
    pub fn new(initial: Url) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
        }
    }

    pub fn current(&self) -> &Url {
        &self.entries[self.index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, url: Url) {
        if *self.current() == url {
            return;
        }
        self.entries.truncate(self.index + 1);
        self.entries.push(url);
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, url: Url) {
        self.entries[self.index] = url;
    }

    pub fn back(&mut self) -> Option<&Url> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(&self.entries[self.index])
    }

    pub fn forward(&mut self) -> Option<&Url> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(&self.entries[self.index])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAdvance {
    pub from_episode: u32,
    pub deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub page: usize,
    pub changed: bool,
    pub clamped: bool,
}

/// Current-page state of the flip surface.
#[derive(Debug, Clone)]
pub struct FlipSync {
    episode: Option<u32>,
    page_count: usize,
    current: usize,
    surface: u64,
    at_terminal: bool,
    pending: Option<PendingAdvance>,
    settle_delay: Duration,
}

impl Default for FlipSync {
    fn default() -> Self {
        Self::new(AUTO_ADVANCE_DELAY)
    }
}

impl FlipSync {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            episode: None,
            page_count: 0,
            current: 0,
            surface: 0,
            at_terminal: false,
            pending: None,
            settle_delay,
        }
    }

    pub fn episode(&self) -> Option<u32> {
        self.episode
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Identity of the mounted surface; changes on every mount so that no
    /// animation state carries over between episodes.
    pub fn surface(&self) -> u64 {
        self.surface
    }

    pub fn pending_advance(&self) -> Option<PendingAdvance> {
        self.pending
    }

    pub fn clamp(&self, page: usize) -> usize {
        page.min(self.page_count.saturating_sub(1))
    }

    pub fn is_last_page(&self) -> bool {
        self.page_count > 0 && self.current >= self.page_count - 1
    }

    pub fn mount(&mut self, episode: u32, page_count: usize, start_page: usize) -> usize {
        self.episode = Some(episode);
        self.page_count = page_count;
        self.current = self.clamp(start_page);
        self.surface += 1;
        self.at_terminal = false;
        self.pending = None;
        self.current
    }

    /// Remount the same episode with a new slot count, e.g. after the
    /// reading direction changed.
    pub fn remount(&mut self, page_count: usize) -> usize {
        match self.episode {
            Some(episode) => {
                let pending = self.pending;
                let current = self.mount(episode, page_count, self.current);
                self.pending = pending;
                current
            }
            None => self.current,
        }
    }

    /// A flip made by the reader. Arriving on the last page schedules one
    /// advance; later flip events while still there do not.
    pub fn flip_to(&mut self, page: usize, now: Instant) -> usize {
        let Some(episode) = self.episode else {
            return self.current;
        };
        if self.page_count == 0 {
            return self.current;
        }

        self.current = self.clamp(page);
        if self.is_last_page() {
            if !self.at_terminal {
                self.at_terminal = true;
                if self.pending.is_none() {
                    log::debug!(
                        "last page of episode {episode} reached, advancing in {:?}",
                        self.settle_delay
                    );
                    self.pending = Some(PendingAdvance {
                        from_episode: episode,
                        deadline: now + self.settle_delay,
                    });
                }
            }
        } else {
            self.at_terminal = false;
        }
        self.current
    }

    /// Bring the surface in line with a page number read from the address.
    pub fn reconcile(&mut self, requested: usize) -> Reconciled {
        let page = self.clamp(requested);
        let changed = page != self.current;
        self.current = page;
        self.at_terminal = self.is_last_page();
        Reconciled {
            page,
            changed,
            clamped: page != requested,
        }
    }

    /// The episode to advance to, once the settle delay has elapsed.
    pub fn poll_advance(&mut self, now: Instant) -> Option<u32> {
        let pending = self.pending?;
        if now < pending.deadline {
            return None;
        }
        self.pending = None;
        Some(pending.from_episode + 1)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }
}
