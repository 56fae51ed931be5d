use std::time::{Duration, Instant};

use reqwest::Url;

use crate::error::{Boundary, FetchError};
use crate::fetcher::ImageSizes;
use crate::locale::Message;
use crate::models::{
    Episode, Manga, NaturalSize, Page, PageSlot, ReadingDirection, ScaledDimensions, ViewportSize,
};
use crate::navigator::{EpisodeNavigator, HistoryMode, NavDecision, NavTicket};
use crate::sequencer;
use crate::sync::{AUTO_ADVANCE_DELAY, AddressHistory, FlipSync, ReaderQuery, with_page_param};
use crate::viewport::{ScaleChange, ViewportScaler};

/// Idle time after which the header and footer are hidden.
pub const UI_AUTOHIDE_DELAY: Duration = Duration::from_millis(3000);

pub const DEFAULT_ADDRESS_BASE: &str = "biderja://reader/";

pub fn default_address_base() -> Url {
    Url::parse(DEFAULT_ADDRESS_BASE).expect("built-in address base is a valid url")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: Message,
}

impl Notice {
    pub fn info(message: Message) -> Self {
        Self {
            level: NoticeLevel::Info,
            message,
        }
    }

    pub fn warning(message: Message) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message,
        }
    }

    pub fn error(message: Message) -> Self {
        Self {
            level: NoticeLevel::Error,
            message,
        }
    }

    fn for_fetch_error(err: &FetchError) -> Self {
        Self::error(match err {
            FetchError::MangaNotFound(_) => Message::MangaNotFound,
            FetchError::EpisodeNotFound { .. } => Message::EpisodeNotFound,
            FetchError::Network(_) => Message::NetworkError,
        })
    }

    fn for_boundary(boundary: Boundary) -> Self {
        Self::info(match boundary {
            Boundary::First => Message::FirstEpisode,
            Boundary::Last => Message::LastEpisode,
        })
    }
}

/// Everything that can happen to the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    /// Start reading at an address (command line, library pick).
    Open(ReaderQuery),
    MangaLoaded {
        id: String,
        result: Result<Manga, FetchError>,
    },
    EpisodeLoaded {
        ticket: NavTicket,
        result: Result<Episode, FetchError>,
    },
    ImageMeasured {
        url: String,
        result: Result<NaturalSize, FetchError>,
    },
    Resized(ViewportSize),
    FlipTo(usize),
    FlipForward,
    FlipBackward,
    FirstPage,
    LastPage,
    /// The address was changed from outside the flip surface.
    AddressChanged(ReaderQuery),
    HistoryBack,
    HistoryForward,
    PrevEpisode,
    NextEpisode,
    GoToEpisode(i64),
    /// Fetch the shown manga again and restore the current position.
    Reload,
    ToggleDirection,
    ToggleSpread,
    Interaction,
    Tick,
}

impl ReaderEvent {
    fn is_user_input(&self) -> bool {
        !matches!(
            self,
            ReaderEvent::MangaLoaded { .. }
                | ReaderEvent::EpisodeLoaded { .. }
                | ReaderEvent::ImageMeasured { .. }
                | ReaderEvent::Resized(_)
                | ReaderEvent::Tick
        )
    }
}

/// Work the session asks its host to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchManga(String),
    FetchEpisode { manga: Manga, ticket: NavTicket },
    MeasureImage(String),
    Notify(Notice),
    SavePosition(ReaderQuery),
    Redraw,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub direction: ReadingDirection,
    pub double_spread: bool,
    pub auto_advance_delay: Duration,
    pub autohide_delay: Duration,
    pub address_base: Url,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            direction: ReadingDirection::default(),
            double_spread: true,
            auto_advance_delay: AUTO_ADVANCE_DELAY,
            autohide_delay: UI_AUTOHIDE_DELAY,
            address_base: default_address_base(),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingOpen {
    query: ReaderQuery,
    mode: HistoryMode,
}

/// Reader state machine. Events go in through [`ReaderSession::dispatch`]
/// and come back out as [`Effect`]s; the session itself never does I/O.
#[derive(Debug)]
pub struct ReaderSession {
    options: SessionOptions,
    direction: ReadingDirection,
    double_spread: bool,
    manga: Option<Manga>,
    navigator: Option<EpisodeNavigator>,
    pending_manga: Option<String>,
    pending_open: Option<PendingOpen>,
    episode: Option<Episode>,
    slots: Vec<PageSlot>,
    flip: FlipSync,
    scaler: ViewportScaler,
    sizes: ImageSizes,
    measured_url: Option<String>,
    history: Option<AddressHistory>,
    chrome_visible: bool,
    chrome_deadline: Option<Instant>,
}

impl ReaderSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            direction: options.direction,
            double_spread: options.double_spread,
            flip: FlipSync::new(options.auto_advance_delay),
            options,
            manga: None,
            navigator: None,
            pending_manga: None,
            pending_open: None,
            episode: None,
            slots: Vec::new(),
            scaler: ViewportScaler::new(),
            sizes: ImageSizes::new(),
            measured_url: None,
            history: None,
            chrome_visible: true,
            chrome_deadline: None,
        }
    }

    pub fn open(&mut self, query: ReaderQuery, now: Instant) -> Vec<Effect> {
        self.dispatch(ReaderEvent::Open(query), now)
    }

    pub fn dispatch(&mut self, event: ReaderEvent, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        if event.is_user_input() && self.touch(now) {
            effects.push(Effect::Redraw);
        }

        let mut handled = match event {
            ReaderEvent::Open(query) => self.on_open(query),
            ReaderEvent::MangaLoaded { id, result } => self.on_manga_loaded(id, result),
            ReaderEvent::EpisodeLoaded { ticket, result } => self.on_episode_loaded(ticket, result),
            ReaderEvent::ImageMeasured { url, result } => self.on_image_measured(url, result),
            ReaderEvent::Resized(viewport) => self.on_resized(viewport),
            ReaderEvent::FlipTo(page) => self.flip_to(page, now),
            ReaderEvent::FlipForward => {
                let target = sequencer::flip_forward(
                    self.flip.current(),
                    self.slots.len(),
                    self.double_spread,
                );
                self.flip_to(target, now)
            }
            ReaderEvent::FlipBackward => {
                let target = sequencer::flip_backward(
                    self.flip.current(),
                    self.slots.len(),
                    self.double_spread,
                );
                self.flip_to(target, now)
            }
            ReaderEvent::FirstPage => self.flip_to(0, now),
            ReaderEvent::LastPage => self.flip_to(self.slots.len().saturating_sub(1), now),
            ReaderEvent::AddressChanged(query) => self.navigate(query, HistoryMode::Push),
            ReaderEvent::HistoryBack => self.on_history(false),
            ReaderEvent::HistoryForward => self.on_history(true),
            ReaderEvent::PrevEpisode => self.step_episode(-1),
            ReaderEvent::NextEpisode => self.step_episode(1),
            ReaderEvent::GoToEpisode(number) => self.go_to_episode(number, 0, HistoryMode::Push),
            ReaderEvent::Reload => self.reload(),
            ReaderEvent::ToggleDirection => self.toggle_direction(),
            ReaderEvent::ToggleSpread => {
                self.double_spread = !self.double_spread;
                let message = if self.double_spread {
                    Message::SpreadOn
                } else {
                    Message::SpreadOff
                };
                vec![Effect::Notify(Notice::info(message)), Effect::Redraw]
            }
            ReaderEvent::Interaction => Vec::new(),
            ReaderEvent::Tick => self.on_tick(now),
        };

        effects.append(&mut handled);
        effects.dedup();
        effects
    }

    // Chrome

    fn touch(&mut self, now: Instant) -> bool {
        let was_hidden = !self.chrome_visible;
        self.chrome_visible = true;
        self.chrome_deadline = Some(now + self.options.autohide_delay);
        was_hidden
    }

    fn on_tick(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.chrome_visible && self.chrome_deadline.is_some_and(|deadline| now >= deadline) {
            self.chrome_visible = false;
            self.chrome_deadline = None;
            effects.push(Effect::Redraw);
        }
        if let Some(next) = self.flip.poll_advance(now) {
            log::info!("auto-advancing to episode {next}");
            effects.extend(self.go_to_episode(i64::from(next), 0, HistoryMode::Push));
        }
        effects
    }

    /// Earliest moment at which a [`ReaderEvent::Tick`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let chrome = self.chrome_deadline.filter(|_| self.chrome_visible);
        match (chrome, self.flip.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // Loading

    fn on_open(&mut self, query: ReaderQuery) -> Vec<Effect> {
        if query.manga.is_none() {
            return vec![Effect::Notify(Notice::error(Message::NoManga)), Effect::Redraw];
        }
        let url = query.to_url(&self.options.address_base);
        match &mut self.history {
            Some(history) => history.push(url),
            None => self.history = Some(AddressHistory::new(url)),
        }
        self.navigate(query, HistoryMode::Replace)
    }

    fn navigate(&mut self, query: ReaderQuery, mode: HistoryMode) -> Vec<Effect> {
        let Some(manga_id) = query.manga.clone() else {
            return vec![Effect::Notify(Notice::error(Message::NoManga))];
        };

        let same_manga = self.manga.as_ref().is_some_and(|m| m.id == manga_id);
        if !same_manga {
            self.pending_open = Some(PendingOpen { query, mode });
            if self.pending_manga.as_deref() == Some(manga_id.as_str()) {
                return Vec::new();
            }
            self.pending_manga = Some(manga_id.clone());
            return vec![Effect::FetchManga(manga_id), Effect::Redraw];
        }

        // Back on the manga already shown: loads for anything else are abandoned.
        self.pending_manga = None;
        self.pending_open = None;

        if self.flip.episode() == Some(query.chapter) {
            if let Some(navigator) = self.navigator.as_mut() {
                navigator.cancel();
            }
            return self.reconcile(query.page, mode);
        }
        self.go_to_episode(i64::from(query.chapter), query.page, mode)
    }

    fn reload(&mut self) -> Vec<Effect> {
        let Some(query) = self.position() else {
            return vec![Effect::Notify(Notice::error(Message::NoManga))];
        };
        let Some(manga_id) = query.manga.clone() else {
            return Vec::new();
        };
        if let Some(navigator) = self.navigator.as_mut() {
            navigator.cancel();
        }
        log::info!("reloading manga {manga_id}");
        self.pending_open = Some(PendingOpen {
            query,
            mode: HistoryMode::Keep,
        });
        self.pending_manga = Some(manga_id.clone());
        vec![Effect::FetchManga(manga_id), Effect::Redraw]
    }

    fn on_manga_loaded(&mut self, id: String, result: Result<Manga, FetchError>) -> Vec<Effect> {
        if self.pending_manga.as_deref() != Some(id.as_str()) {
            log::debug!("dropping stale manga response for {id}");
            return Vec::new();
        }
        self.pending_manga = None;
        let pending = self.pending_open.take();

        let manga = match result {
            Ok(manga) => manga,
            Err(err) => {
                log::warn!("failed to load manga {id}: {err}");
                return vec![Effect::Notify(Notice::for_fetch_error(&err)), Effect::Redraw];
            }
        };

        log::info!("loaded manga {} ({} episodes)", manga.id, manga.episodes.len());
        self.navigator = Some(EpisodeNavigator::new(&manga));
        self.manga = Some(manga);
        self.unmount();

        let Some(PendingOpen { query, mode }) = pending else {
            return vec![Effect::Redraw];
        };
        let mut effects = self.go_to_episode(i64::from(query.chapter), query.page, mode);
        // Arriving with an address that names no episode is a missing episode,
        // not the end of the book.
        for effect in &mut effects {
            if let Effect::Notify(notice) = effect {
                if matches!(notice.message, Message::FirstEpisode | Message::LastEpisode) {
                    *notice = Notice::error(Message::EpisodeNotFound);
                }
            }
        }
        effects
    }

    fn unmount(&mut self) {
        self.episode = None;
        self.slots.clear();
        self.scaler.reset();
        self.measured_url = None;
    }

    // Episode navigation

    fn step_episode(&mut self, delta: i64) -> Vec<Effect> {
        let Some(navigator) = self.navigator.as_mut() else {
            return Vec::new();
        };
        let decision = navigator.step(delta);
        self.apply_decision(decision)
    }

    fn go_to_episode(&mut self, target: i64, start_page: usize, mode: HistoryMode) -> Vec<Effect> {
        let Some(navigator) = self.navigator.as_mut() else {
            return Vec::new();
        };
        let decision = navigator.go_to(target, start_page, mode);
        self.apply_decision(decision)
    }

    fn apply_decision(&mut self, decision: NavDecision) -> Vec<Effect> {
        match decision {
            NavDecision::Fetch(ticket) => match &self.manga {
                Some(manga) => vec![
                    Effect::FetchEpisode {
                        manga: manga.clone(),
                        ticket,
                    },
                    Effect::Redraw,
                ],
                None => Vec::new(),
            },
            NavDecision::AlreadyPending(number) => {
                log::debug!("episode {number} is already loading");
                Vec::new()
            }
            NavDecision::Boundary(boundary) => vec![Effect::Notify(Notice::for_boundary(boundary))],
        }
    }

    fn on_episode_loaded(
        &mut self,
        ticket: NavTicket,
        result: Result<Episode, FetchError>,
    ) -> Vec<Effect> {
        let Some(navigator) = self.navigator.as_mut() else {
            return Vec::new();
        };
        if navigator.manga_id() != ticket.manga_id {
            return Vec::new();
        }

        let episode = match result {
            Ok(episode) => {
                if !navigator.accept(&ticket) {
                    log::debug!("dropping stale response for episode {}", ticket.episode);
                    return Vec::new();
                }
                episode
            }
            Err(err) => {
                if !navigator.fail(&ticket) {
                    return Vec::new();
                }
                log::warn!("failed to load episode {}: {err}", ticket.episode);
                return vec![Effect::Notify(Notice::for_fetch_error(&err)), Effect::Redraw];
            }
        };

        self.mount(episode, &ticket)
    }

    fn mount(&mut self, episode: Episode, ticket: &NavTicket) -> Vec<Effect> {
        self.slots = sequencer::sequence(&episode.pages, self.direction);
        self.scaler.reset();
        let current = self.flip.mount(episode.number, self.slots.len(), ticket.start_page);
        self.measured_url = episode.pages.iter().find_map(|page| match page {
            Page::Content { url, .. } => Some(url.clone()),
            Page::Blank => None,
        });
        log::info!(
            "showing episode {} of {} at page {current} ({} slots)",
            episode.number,
            episode.manga_id,
            self.slots.len()
        );
        self.episode = Some(episode);

        self.record_address(ticket.history, current != ticket.start_page);

        let mut effects = Vec::new();
        if let Some(position) = self.position() {
            effects.push(Effect::SavePosition(position));
        }
        effects.extend(self.request_measurement());
        effects.push(Effect::Redraw);
        effects
    }

    fn request_measurement(&mut self) -> Vec<Effect> {
        let Some(url) = self.measured_url.clone() else {
            return Vec::new();
        };
        if let Some(size) = self.sizes.get(&url) {
            self.scaler.set_natural_size(size);
            return Vec::new();
        }
        if self.sizes.request(&url) {
            return vec![Effect::MeasureImage(url)];
        }
        Vec::new()
    }

    fn on_image_measured(
        &mut self,
        url: String,
        result: Result<NaturalSize, FetchError>,
    ) -> Vec<Effect> {
        let size = match result {
            Ok(size) => Some(size),
            Err(err) => {
                log::warn!("could not measure {url}: {err}");
                None
            }
        };
        if !self.sizes.resolve(&url, size) {
            return Vec::new();
        }
        if self.measured_url.as_deref() != Some(url.as_str()) {
            return Vec::new();
        }
        match size {
            Some(size) => match self.scaler.set_natural_size(size) {
                ScaleChange::Updated(_) => vec![Effect::Redraw],
                ScaleChange::Unchanged => Vec::new(),
            },
            None => vec![
                Effect::Notify(Notice::warning(Message::ImageUnavailable)),
                Effect::Redraw,
            ],
        }
    }

    fn on_resized(&mut self, viewport: ViewportSize) -> Vec<Effect> {
        match self.scaler.resize(viewport) {
            ScaleChange::Updated(_) => vec![Effect::Redraw],
            ScaleChange::Unchanged => Vec::new(),
        }
    }

    // Page state and address

    fn flip_to(&mut self, page: usize, now: Instant) -> Vec<Effect> {
        if self.episode.is_none() {
            return Vec::new();
        }
        let before = self.flip.current();
        let current = self.flip.flip_to(page, now);
        if current == before {
            return Vec::new();
        }
        if let Some(history) = &mut self.history {
            let url = with_page_param(history.current(), current);
            history.replace(url);
        }
        vec![Effect::Redraw]
    }

    fn reconcile(&mut self, requested: usize, mode: HistoryMode) -> Vec<Effect> {
        let reconciled = self.flip.reconcile(requested);
        self.record_address(mode, reconciled.clamped);
        if reconciled.changed {
            vec![Effect::Redraw]
        } else {
            Vec::new()
        }
    }

    fn record_address(&mut self, mode: HistoryMode, clamped: bool) {
        let Some(position) = self.position() else {
            return;
        };
        let url = position.to_url(&self.options.address_base);
        match &mut self.history {
            None => self.history = Some(AddressHistory::new(url)),
            Some(history) => match mode {
                HistoryMode::Push => history.push(url),
                HistoryMode::Replace => history.replace(url),
                HistoryMode::Keep if clamped => {
                    let rewritten = with_page_param(history.current(), position.page);
                    history.replace(rewritten);
                }
                HistoryMode::Keep => {}
            },
        }
    }

    fn on_history(&mut self, forward: bool) -> Vec<Effect> {
        let Some(history) = &mut self.history else {
            return Vec::new();
        };
        let target = if forward {
            history.forward()
        } else {
            history.back()
        };
        match target.map(ReaderQuery::from_url) {
            Some(query) => self.navigate(query, HistoryMode::Keep),
            None => Vec::new(),
        }
    }

    fn toggle_direction(&mut self) -> Vec<Effect> {
        let previous = self.direction;
        self.direction = previous.toggled();
        let message = match self.direction {
            ReadingDirection::Rtl => Message::DirectionRtl,
            ReadingDirection::Ltr => Message::DirectionLtr,
        };
        let mut effects = vec![Effect::Notify(Notice::info(message))];

        if let Some(episode) = &self.episode {
            let raw_len = episode.pages.len();
            let current = self.flip.current();
            let raw = sequencer::raw_index(current, raw_len, previous)
                .or_else(|| sequencer::raw_index(current + 1, raw_len, previous))
                .unwrap_or(0);
            self.slots = sequencer::sequence(&episode.pages, self.direction);
            self.flip.remount(self.slots.len());
            let target = sequencer::slot_index(raw, raw_len, self.direction);
            let reconciled = self.flip.reconcile(target);
            if let Some(history) = &mut self.history {
                let url = with_page_param(history.current(), reconciled.page);
                history.replace(url);
            }
        }
        effects.push(Effect::Redraw);
        effects
    }

    // Read access for the renderer

    pub fn manga(&self) -> Option<&Manga> {
        self.manga.as_ref()
    }

    pub fn episode(&self) -> Option<&Episode> {
        self.episode.as_ref()
    }

    pub fn slots(&self) -> &[PageSlot] {
        &self.slots
    }

    pub fn current_page(&self) -> usize {
        self.flip.current()
    }

    pub fn surface(&self) -> u64 {
        self.flip.surface()
    }

    pub fn direction(&self) -> ReadingDirection {
        self.direction
    }

    pub fn double_spread(&self) -> bool {
        self.double_spread
    }

    pub fn chrome_visible(&self) -> bool {
        self.chrome_visible
    }

    pub fn scaled(&self) -> Option<ScaledDimensions> {
        self.scaler.scaled()
    }

    pub fn natural_size(&self) -> Option<NaturalSize> {
        self.scaler.natural()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_manga.is_some()
            || self
                .navigator
                .as_ref()
                .is_some_and(|navigator| navigator.in_flight().is_some())
    }

    /// No image size is known yet for the mounted episode.
    pub fn awaiting_image(&self) -> bool {
        self.measured_url
            .as_deref()
            .is_some_and(|url| self.sizes.get(url).is_none() && !self.sizes.is_failed(url))
    }

    pub fn image_failed(&self) -> bool {
        self.measured_url
            .as_deref()
            .is_some_and(|url| self.sizes.is_failed(url))
    }

    pub fn address(&self) -> Option<&Url> {
        self.history.as_ref().map(AddressHistory::current)
    }

    pub fn position(&self) -> Option<ReaderQuery> {
        let manga = self.manga.as_ref()?;
        let episode = self.flip.episode()?;
        Some(ReaderQuery::new(manga.id.clone(), episode, self.flip.current()))
    }

    pub fn display_number(&self, index: usize) -> usize {
        sequencer::display_number(index, self.slots.len(), self.direction)
    }

    /// Slot indices on screen, left to right.
    pub fn visible_slots(&self) -> Vec<usize> {
        if self.slots.is_empty() {
            return Vec::new();
        }
        let current = self.flip.current();
        if !self.double_spread {
            return vec![current];
        }
        match sequencer::spread_of(current, self.slots.len()) {
            (first, Some(second)) => match self.direction {
                ReadingDirection::Rtl => vec![second, first],
                ReadingDirection::Ltr => vec![first, second],
            },
            (first, None) => vec![first],
        }
    }

    pub fn previous_episode(&self) -> Option<u32> {
        let navigator = self.navigator.as_ref()?;
        let current = i64::from(navigator.current()?);
        navigator.check(current - 1).ok()
    }

    pub fn next_episode(&self) -> Option<u32> {
        let navigator = self.navigator.as_ref()?;
        let current = i64::from(navigator.current()?);
        navigator.check(current + 1).ok()
    }
}
