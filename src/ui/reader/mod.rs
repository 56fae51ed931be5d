use arboard::Clipboard;
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame, Terminal,
};
use reqwest::Url;

use crate::config::Config;
use crate::fetcher::{ContentSource, RemoteContent};
use crate::locale::{Language, Message};
use crate::models::{Bookmark, LibraryItem, ReadingDirection, ViewportSize};
use crate::session::{
    default_address_base, Effect, NoticeLevel, ReaderEvent, ReaderSession, SessionOptions,
};
use crate::settings::{KeymapConfig, Settings};
use crate::state::State;
use crate::sync::ReaderQuery;
use crate::ui::board::{Board, FALLBACK_CELL_SIZE};
use crate::ui::windows::{
    bookmarks::BookmarksWindow, help::HelpWindow, library::LibraryWindow,
};

/// How long a notice stays on screen.
const MESSAGE_LIFETIME: Duration = Duration::from_secs(3);
/// Poll interval while a worker thread may still deliver a result.
const BUSY_POLL: Duration = Duration::from_millis(50);
const IDLE_POLL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    Reader,
    Help,
    Bookmarks,
    Library,
}

/// Application state that encompasses the reader session and UI state
#[derive(Debug)]
pub struct ApplicationState {
    pub session: ReaderSession,
    pub config: Config,
    pub ui_state: UiState,
    pub should_quit: bool,
    pub count_prefix: String, // e.g. "12" before the next-chapter key
}

impl ApplicationState {
    pub fn new(config: Config) -> Self {
        let session = ReaderSession::new(session_options(&config.settings));
        Self {
            session,
            config,
            ui_state: UiState::new(),
            should_quit: false,
            count_prefix: String::new(),
        }
    }

    pub fn language(&self) -> Language {
        self.config.settings.language
    }

    fn take_count(&mut self) -> Option<u32> {
        let count = self.count_prefix.parse().ok().filter(|n| *n > 0);
        self.count_prefix.clear();
        count
    }
}

pub fn session_options(settings: &Settings) -> SessionOptions {
    let address_base = Url::parse(&settings.address_base).unwrap_or_else(|err| {
        log::warn!("invalid address base {}: {err}", settings.address_base);
        default_address_base()
    });
    SessionOptions {
        direction: settings.reading_direction,
        double_spread: settings.double_spread,
        auto_advance_delay: Duration::from_millis(settings.auto_advance_delay_ms),
        autohide_delay: Duration::from_millis(settings.ui_autohide_ms),
        address_base,
    }
}

/// UI-specific state management
#[derive(Debug, Clone)]
pub struct UiState {
    pub active_window: WindowType,
    pub bookmarks: Vec<Bookmark>,
    pub bookmarks_selected_index: usize,
    pub library_items: Vec<LibraryItem>,
    pub library_selected_index: usize,
    pub help_scroll_offset: u16,
    pub message: Option<String>,
    pub message_type: MessageType,
    pub message_time: Option<Instant>,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    pub fn new() -> Self {
        Self {
            active_window: WindowType::Reader,
            bookmarks: Vec::new(),
            bookmarks_selected_index: 0,
            library_items: Vec::new(),
            library_selected_index: 0,
            help_scroll_offset: 0,
            message: None,
            message_type: MessageType::Info,
            message_time: None,
        }
    }

    pub fn set_message(&mut self, message: String, message_type: MessageType) {
        self.message = Some(message);
        self.message_type = message_type;
        self.message_time = Some(Instant::now());
    }

    pub fn clear_message(&mut self) {
        self.message = None;
        self.message_time = None;
    }

    /// Returns true if the current message has expired (older than 3 seconds).
    pub fn message_expired(&self) -> bool {
        self.message_time
            .is_some_and(|t| t.elapsed() >= MESSAGE_LIFETIME)
    }

    pub fn open_window(&mut self, window_type: WindowType) {
        if window_type == WindowType::Help {
            self.help_scroll_offset = 0;
        }
        self.active_window = window_type;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Info,
    Warning,
    Error,
}

impl From<NoticeLevel> for MessageType {
    fn from(level: NoticeLevel) -> Self {
        match level {
            NoticeLevel::Info => MessageType::Info,
            NoticeLevel::Warning => MessageType::Warning,
            NoticeLevel::Error => MessageType::Error,
        }
    }
}

/// What a key press in the reader window asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderAction {
    Session(ReaderEvent),
    CopyAddress,
    AddBookmark,
    ShowBookmarks,
    Library,
    Reload,
    Help,
    Quit,
}

/// Run a fetch or measurement effect on a worker thread; the outcome comes
/// back as a [`ReaderEvent`] on `tx`. Other effects are left to the caller.
pub fn spawn_effect<S>(
    source: &S,
    tx: &Sender<ReaderEvent>,
    effect: Effect,
) -> Option<thread::JoinHandle<()>>
where
    S: ContentSource + Clone + Send + 'static,
{
    let source = source.clone();
    let tx = tx.clone();
    let job: Box<dyn FnOnce(&S) -> ReaderEvent + Send> = match effect {
        Effect::FetchManga(id) => Box::new(move |source: &S| {
            let result = source.fetch_manga(&id);
            ReaderEvent::MangaLoaded { id, result }
        }),
        Effect::FetchEpisode { manga, ticket } => Box::new(move |source: &S| {
            let result = source.fetch_episode(&manga, ticket.episode);
            ReaderEvent::EpisodeLoaded { ticket, result }
        }),
        Effect::MeasureImage(url) => Box::new(move |source: &S| {
            let result = source.measure_image(&url);
            ReaderEvent::ImageMeasured { url, result }
        }),
        _ => return None,
    };
    Some(thread::spawn(move || {
        let event = job(&source);
        // The reader may already be gone.
        let _ = tx.send(event);
    }))
}

/// Main reader application struct
pub struct Reader {
    state: Rc<RefCell<ApplicationState>>,
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    db_state: State,
    board: Board,
    clipboard: Option<Clipboard>,
    content: RemoteContent,
    events_tx: Sender<ReaderEvent>,
    events_rx: Receiver<ReaderEvent>,
}

impl Reader {
    /// Create a new Reader instance
    pub fn new(config: Config) -> eyre::Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;

        let db_state = State::new()?;
        let content = RemoteContent::from_settings(&config.settings)?;
        let clipboard = match Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(err) => {
                log::warn!("clipboard unavailable: {err}");
                None
            }
        };
        let board = Board::new().with_language(config.settings.language);
        let (events_tx, events_rx) = mpsc::channel();

        Ok(Self {
            state: Rc::new(RefCell::new(ApplicationState::new(config))),
            terminal,
            db_state,
            board,
            clipboard,
            content,
            events_tx,
            events_rx,
        })
    }

    /// Run the main application loop, starting at `query` or in the library.
    pub fn run(&mut self, query: Option<ReaderQuery>) -> eyre::Result<()> {
        let mouse_support = self.state.borrow().config.settings.mouse_support;

        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
        if mouse_support {
            crossterm::execute!(io::stdout(), crossterm::event::EnableMouseCapture)?;
        }

        self.terminal.clear()?;
        self.terminal.hide_cursor()?;

        let result = self.event_loop(query);

        // Persist current reading position before cleaning up
        let persisted = self.persist_state();

        self.terminal.clear()?;
        self.terminal.show_cursor()?;
        if mouse_support {
            crossterm::execute!(io::stdout(), crossterm::event::DisableMouseCapture)?;
        }
        crossterm::execute!(io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
        crossterm::terminal::disable_raw_mode()?;

        result.and(persisted)
    }

    fn event_loop(&mut self, query: Option<ReaderQuery>) -> eyre::Result<()> {
        self.handle_resize()?;
        match query {
            Some(query) => self.dispatch(ReaderEvent::Open(query))?,
            None => self.open_library_window()?,
        }

        loop {
            if self.state.borrow().should_quit {
                break;
            }

            // Results from worker threads
            while let Ok(event) = self.events_rx.try_recv() {
                self.dispatch(event)?;
            }
            self.dispatch(ReaderEvent::Tick)?;

            {
                let mut state = self.state.borrow_mut();
                if state.ui_state.message_expired() {
                    state.ui_state.clear_message();
                }
            }

            {
                let state = self.state.clone();
                let board = &self.board;
                self.terminal.draw(|f| {
                    let state_ref = state.borrow();
                    Self::render_static(f, &state_ref, board);
                })?;
            }

            let poll_timeout = {
                let state = self.state.borrow();
                let session = &state.session;
                let busy = session.is_loading() || session.awaiting_image();
                Self::poll_timeout(
                    Instant::now(),
                    session.next_deadline(),
                    state.ui_state.message_time,
                    busy,
                )
            };

            if !crossterm::event::poll(poll_timeout)? {
                continue;
            }

            match crossterm::event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key_event(key)?,
                Event::Mouse(mouse) => self.handle_mouse_event(mouse)?,
                Event::Resize(_, _) => self.handle_resize()?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Time to wait for input before the loop has work of its own.
    pub fn poll_timeout(
        now: Instant,
        deadline: Option<Instant>,
        message_time: Option<Instant>,
        busy: bool,
    ) -> Duration {
        let mut timeout = if busy { BUSY_POLL } else { IDLE_POLL };
        if let Some(deadline) = deadline {
            timeout = timeout.min(deadline.saturating_duration_since(now));
        }
        if let Some(shown) = message_time {
            let expiry = shown + MESSAGE_LIFETIME;
            timeout = timeout.min(expiry.saturating_duration_since(now));
        }
        timeout
    }

    fn dispatch(&mut self, event: ReaderEvent) -> eyre::Result<()> {
        let effects = self
            .state
            .borrow_mut()
            .session
            .dispatch(event, Instant::now());
        self.perform_effects(effects)
    }

    fn perform_effects(&mut self, effects: Vec<Effect>) -> eyre::Result<()> {
        for effect in effects {
            match effect {
                Effect::Notify(notice) => {
                    let mut state = self.state.borrow_mut();
                    let text = notice.message.text(state.language()).to_string();
                    state.ui_state.set_message(text, notice.level.into());
                }
                Effect::SavePosition(position) => self.save_position(&position)?,
                // The loop redraws after every pass.
                Effect::Redraw => {}
                effect => {
                    spawn_effect(&self.content, &self.events_tx, effect);
                }
            }
        }
        Ok(())
    }

    fn save_position(&mut self, position: &ReaderQuery) -> eyre::Result<()> {
        let Some(manga_id) = position.manga.as_deref() else {
            return Ok(());
        };
        let title = {
            let state = self.state.borrow();
            state
                .session
                .manga()
                .filter(|manga| manga.id == manga_id)
                .map(|manga| manga.display_title().to_string())
        };
        self.db_state.set_last_reading_state(position)?;
        self.db_state.update_library(manga_id, title.as_deref())?;
        self.refresh_bookmarks()?;
        Ok(())
    }

    fn persist_state(&mut self) -> eyre::Result<()> {
        let position = self.state.borrow().session.position();
        if let Some(position) = position {
            self.save_position(&position)?;
        }
        Ok(())
    }

    /// Terminal size in pixels, assuming an 8x16 cell when the terminal
    /// does not report pixel dimensions.
    pub fn viewport_size(
        columns: u16,
        rows: u16,
        width_px: u16,
        height_px: u16,
    ) -> (ViewportSize, (f64, f64)) {
        let cell = if columns > 0 && rows > 0 && width_px > 0 && height_px > 0 {
            (
                f64::from(width_px) / f64::from(columns),
                f64::from(height_px) / f64::from(rows),
            )
        } else {
            FALLBACK_CELL_SIZE
        };
        let viewport = ViewportSize {
            width: f64::from(columns) * cell.0,
            height: f64::from(rows) * cell.1,
        };
        (viewport, cell)
    }

    fn handle_resize(&mut self) -> eyre::Result<()> {
        let (viewport, cell) = match crossterm::terminal::window_size() {
            Ok(size) => Self::viewport_size(size.columns, size.rows, size.width, size.height),
            Err(_) => {
                let (columns, rows) = crossterm::terminal::size().unwrap_or((80, 24));
                Self::viewport_size(columns, rows, 0, 0)
            }
        };
        self.board.set_cell_size(cell.0, cell.1);
        self.dispatch(ReaderEvent::Resized(viewport))
    }

    /// Handle keyboard input events
    fn handle_key_event(&mut self, key: KeyEvent) -> eyre::Result<()> {
        let active_window = self.state.borrow().ui_state.active_window;
        self.dispatch(ReaderEvent::Interaction)?;

        if active_window == WindowType::Reader {
            let mut state = self.state.borrow_mut();
            if state.ui_state.message.is_some() {
                state.ui_state.clear_message();
            }
            // Count prefix, e.g. "12" + next chapter jumps to chapter 12
            if let KeyCode::Char(c) = key.code {
                if c.is_ascii_digit() && key.modifiers.difference(KeyModifiers::SHIFT).is_empty() {
                    if state.count_prefix.len() < 6 {
                        state.count_prefix.push(c);
                    }
                    return Ok(());
                }
            }
        }

        match active_window {
            WindowType::Help => self.handle_help_mode_keys(key)?,
            WindowType::Bookmarks => self.handle_bookmarks_mode_keys(key)?,
            WindowType::Library => self.handle_library_mode_keys(key)?,
            WindowType::Reader => {
                let count = self.state.borrow_mut().take_count();
                self.handle_normal_mode_keys(key, count)?;
            }
        }
        Ok(())
    }

    /// Map a key press in the reader window to an action.
    pub fn reader_action(
        key: &KeyEvent,
        keymap: &KeymapConfig,
        direction: ReadingDirection,
    ) -> Option<ReaderAction> {
        // The arrow pointing towards the unread side advances.
        let (left, right) = match direction {
            ReadingDirection::Rtl => (ReaderEvent::FlipForward, ReaderEvent::FlipBackward),
            ReadingDirection::Ltr => (ReaderEvent::FlipBackward, ReaderEvent::FlipForward),
        };

        let event = match key.code {
            KeyCode::Left => left,
            KeyCode::Right => right,
            KeyCode::Char(' ') | KeyCode::PageDown => ReaderEvent::FlipForward,
            KeyCode::Backspace | KeyCode::PageUp => ReaderEvent::FlipBackward,
            KeyCode::Home => ReaderEvent::FirstPage,
            KeyCode::End => ReaderEvent::LastPage,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Some(ReaderAction::Quit);
            }
            KeyCode::Char(c) => return Self::bound_action(c, keymap),
            _ => return None,
        };
        Some(ReaderAction::Session(event))
    }

    fn bound_action(c: char, keymap: &KeymapConfig) -> Option<ReaderAction> {
        let bindings = [
            (&keymap.next_page, ReaderAction::Session(ReaderEvent::FlipForward)),
            (&keymap.prev_page, ReaderAction::Session(ReaderEvent::FlipBackward)),
            (&keymap.next_episode, ReaderAction::Session(ReaderEvent::NextEpisode)),
            (&keymap.prev_episode, ReaderAction::Session(ReaderEvent::PrevEpisode)),
            (&keymap.first_page, ReaderAction::Session(ReaderEvent::FirstPage)),
            (&keymap.last_page, ReaderAction::Session(ReaderEvent::LastPage)),
            (&keymap.history_back, ReaderAction::Session(ReaderEvent::HistoryBack)),
            (&keymap.history_forward, ReaderAction::Session(ReaderEvent::HistoryForward)),
            (&keymap.double_spread_toggle, ReaderAction::Session(ReaderEvent::ToggleSpread)),
            (&keymap.direction_toggle, ReaderAction::Session(ReaderEvent::ToggleDirection)),
            (&keymap.copy_address, ReaderAction::CopyAddress),
            (&keymap.add_bookmark, ReaderAction::AddBookmark),
            (&keymap.show_bookmarks, ReaderAction::ShowBookmarks),
            (&keymap.library, ReaderAction::Library),
            (&keymap.reload, ReaderAction::Reload),
            (&keymap.help, ReaderAction::Help),
            (&keymap.quit, ReaderAction::Quit),
        ];
        bindings
            .into_iter()
            .find(|(binding, _)| binding.chars().eq(std::iter::once(c)))
            .map(|(_, action)| action)
    }

    /// Expand a count prefix: a chapter key jumps to chapter N, a page key
    /// flips N times.
    pub fn apply_count(event: ReaderEvent, count: Option<u32>) -> Vec<ReaderEvent> {
        let Some(count) = count else {
            return vec![event];
        };
        match event {
            ReaderEvent::NextEpisode | ReaderEvent::PrevEpisode => {
                vec![ReaderEvent::GoToEpisode(i64::from(count))]
            }
            ReaderEvent::FlipForward | ReaderEvent::FlipBackward => {
                vec![event; count.min(999) as usize]
            }
            event => vec![event],
        }
    }

    /// Handle keys in normal reading mode
    fn handle_normal_mode_keys(&mut self, key: KeyEvent, count: Option<u32>) -> eyre::Result<()> {
        let action = {
            let state = self.state.borrow();
            Self::reader_action(&key, &state.config.keymap, state.session.direction())
        };
        let Some(action) = action else {
            return Ok(());
        };

        match action {
            ReaderAction::Session(event) => {
                for event in Self::apply_count(event, count) {
                    self.dispatch(event)?;
                }
            }
            ReaderAction::CopyAddress => self.copy_address(),
            ReaderAction::AddBookmark => self.add_bookmark()?,
            ReaderAction::ShowBookmarks => self.open_bookmarks_window()?,
            ReaderAction::Library => self.open_library_window()?,
            ReaderAction::Reload => self.reload()?,
            ReaderAction::Help => self.state.borrow_mut().ui_state.open_window(WindowType::Help),
            ReaderAction::Quit => self.state.borrow_mut().should_quit = true,
        }
        Ok(())
    }

    /// Click halves and wheel turns behave like the arrow keys.
    pub fn mouse_action(
        mouse: &MouseEvent,
        width: u16,
        direction: ReadingDirection,
    ) -> Option<ReaderEvent> {
        let (left, right) = match direction {
            ReadingDirection::Rtl => (ReaderEvent::FlipForward, ReaderEvent::FlipBackward),
            ReadingDirection::Ltr => (ReaderEvent::FlipBackward, ReaderEvent::FlipForward),
        };
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) if mouse.column < width / 2 => Some(left),
            MouseEventKind::Down(MouseButton::Left) => Some(right),
            MouseEventKind::ScrollDown => Some(ReaderEvent::FlipForward),
            MouseEventKind::ScrollUp => Some(ReaderEvent::FlipBackward),
            _ => None,
        }
    }

    fn handle_mouse_event(&mut self, mouse: MouseEvent) -> eyre::Result<()> {
        let event = {
            let state = self.state.borrow();
            if state.ui_state.active_window != WindowType::Reader {
                return Ok(());
            }
            let (width, _) = crossterm::terminal::size().unwrap_or((80, 24));
            Self::mouse_action(&mouse, width, state.session.direction())
        };
        match event {
            Some(event) => self.dispatch(event),
            None => Ok(()),
        }
    }

    fn handle_list_nav(&self, key: &KeyEvent, list_len: usize, index: &mut usize) -> bool {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.state.borrow_mut().ui_state.open_window(WindowType::Reader);
                true
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if list_len > 0 {
                    *index = (*index + 1).min(list_len - 1);
                }
                true
            }
            KeyCode::Char('k') | KeyCode::Up => {
                *index = index.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    fn handle_bookmarks_mode_keys(&mut self, key: KeyEvent) -> eyre::Result<()> {
        let (list_len, mut index) = {
            let s = self.state.borrow();
            (s.ui_state.bookmarks.len(), s.ui_state.bookmarks_selected_index)
        };
        if self.handle_list_nav(&key, list_len, &mut index) {
            self.state.borrow_mut().ui_state.bookmarks_selected_index = index;
            return Ok(());
        }
        match key.code {
            KeyCode::Char('d') => self.delete_selected_bookmark()?,
            KeyCode::Enter => self.jump_to_selected_bookmark()?,
            _ => {}
        }
        Ok(())
    }

    fn handle_library_mode_keys(&mut self, key: KeyEvent) -> eyre::Result<()> {
        let (list_len, mut index) = {
            let s = self.state.borrow();
            (s.ui_state.library_items.len(), s.ui_state.library_selected_index)
        };
        if self.handle_list_nav(&key, list_len, &mut index) {
            self.state.borrow_mut().ui_state.library_selected_index = index;
            return Ok(());
        }
        match key.code {
            KeyCode::Char('d') => self.delete_selected_library_item()?,
            KeyCode::Enter => self.open_selected_library_item()?,
            _ => {}
        }
        Ok(())
    }

    fn handle_help_mode_keys(&mut self, key: KeyEvent) -> eyre::Result<()> {
        let (term_width, term_height) = crossterm::terminal::size().unwrap_or((80, 24));
        let total_lines = {
            let state = self.state.borrow();
            HelpWindow::lines(&state.config.keymap.help_entries()).len()
        };
        let max_offset =
            HelpWindow::max_scroll_offset(Rect::new(0, 0, term_width, term_height), total_lines);

        let mut state = self.state.borrow_mut();
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter => {
                state.ui_state.open_window(WindowType::Reader);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                state.ui_state.help_scroll_offset =
                    state.ui_state.help_scroll_offset.saturating_add(1).min(max_offset);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                state.ui_state.help_scroll_offset =
                    state.ui_state.help_scroll_offset.saturating_sub(1);
            }
            _ => {}
        }
        Ok(())
    }

    fn set_message(&self, message: Message, message_type: MessageType) {
        let mut state = self.state.borrow_mut();
        let text = message.text(state.language()).to_string();
        state.ui_state.set_message(text, message_type);
    }

    /// Drop the cached record so the refetch reaches the backend.
    fn reload(&mut self) -> eyre::Result<()> {
        let manga_id = self
            .state
            .borrow()
            .session
            .manga()
            .map(|manga| manga.id.clone());
        if let Some(id) = manga_id {
            self.content.invalidate(&id);
        }
        self.dispatch(ReaderEvent::Reload)
    }

    fn copy_address(&mut self) {
        let address = self
            .state
            .borrow()
            .session
            .address()
            .map(|url| url.to_string());
        let Some(address) = address else {
            self.set_message(Message::NoManga, MessageType::Warning);
            return;
        };
        let copied = match self.clipboard.as_mut() {
            Some(clipboard) => match clipboard.set_text(address) {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("could not copy address: {err}");
                    false
                }
            },
            None => false,
        };
        if copied {
            self.set_message(Message::AddressCopied, MessageType::Info);
        } else {
            self.set_message(Message::ClipboardUnavailable, MessageType::Warning);
        }
    }

    fn current_manga_id(&self) -> Option<String> {
        self.state.borrow().session.manga().map(|manga| manga.id.clone())
    }

    fn add_bookmark(&mut self) -> eyre::Result<()> {
        let (position, name) = {
            let state = self.state.borrow();
            let Some(position) = state.session.position() else {
                drop(state);
                self.set_message(Message::NoManga, MessageType::Warning);
                return Ok(());
            };
            let language = state.language();
            let name = format!(
                "{} {}, {} {}",
                Message::Chapter.text(language),
                position.chapter,
                Message::Page.text(language),
                state.session.display_number(position.page)
            );
            (position, name)
        };
        let Some(manga_id) = position.manga.as_deref() else {
            return Ok(());
        };
        // Bookmarks hang off the reading state row.
        self.db_state.set_last_reading_state(&position)?;
        self.db_state
            .insert_bookmark(manga_id, &name, position.chapter, position.page)?;
        self.refresh_bookmarks()?;
        self.set_message(Message::BookmarkAdded, MessageType::Info);
        Ok(())
    }

    fn delete_selected_bookmark(&mut self) -> eyre::Result<()> {
        let Some(manga_id) = self.current_manga_id() else {
            return Ok(());
        };
        let bookmark_name = {
            let state = self.state.borrow();
            state
                .ui_state
                .bookmarks
                .get(state.ui_state.bookmarks_selected_index)
                .map(|bookmark| bookmark.name.clone())
        };
        if let Some(name) = bookmark_name {
            self.db_state.delete_bookmark(&manga_id, &name)?;
            self.refresh_bookmarks()?;
        }
        Ok(())
    }

    fn refresh_bookmarks(&mut self) -> eyre::Result<()> {
        let bookmarks = match self.current_manga_id() {
            Some(manga_id) => self.db_state.get_bookmarks(&manga_id)?,
            None => Vec::new(),
        };
        let mut state = self.state.borrow_mut();
        state.ui_state.bookmarks = bookmarks;
        if state.ui_state.bookmarks_selected_index >= state.ui_state.bookmarks.len() {
            state.ui_state.bookmarks_selected_index =
                state.ui_state.bookmarks.len().saturating_sub(1);
        }
        Ok(())
    }

    fn open_bookmarks_window(&mut self) -> eyre::Result<()> {
        self.refresh_bookmarks()?;
        let mut state = self.state.borrow_mut();
        state.ui_state.bookmarks_selected_index = 0;
        state.ui_state.open_window(WindowType::Bookmarks);
        Ok(())
    }

    fn jump_to_selected_bookmark(&mut self) -> eyre::Result<()> {
        let Some(manga_id) = self.current_manga_id() else {
            return Ok(());
        };
        let target = {
            let state = self.state.borrow();
            state
                .ui_state
                .bookmarks
                .get(state.ui_state.bookmarks_selected_index)
                .map(|bookmark| ReaderQuery::new(manga_id, bookmark.chapter, bookmark.page))
        };
        if let Some(query) = target {
            self.state.borrow_mut().ui_state.open_window(WindowType::Reader);
            self.dispatch(ReaderEvent::AddressChanged(query))?;
        }
        Ok(())
    }

    fn open_library_window(&mut self) -> eyre::Result<()> {
        let library_items = self.db_state.get_from_history()?;
        let mut state = self.state.borrow_mut();
        state.ui_state.library_items = library_items;
        state.ui_state.library_selected_index = 0;
        state.ui_state.open_window(WindowType::Library);
        Ok(())
    }

    fn delete_selected_library_item(&mut self) -> eyre::Result<()> {
        let manga_id = {
            let state = self.state.borrow();
            state
                .ui_state
                .library_items
                .get(state.ui_state.library_selected_index)
                .map(|item| item.manga_id.clone())
        };
        if let Some(manga_id) = manga_id {
            self.db_state.delete_from_library(&manga_id)?;
            let library_items = self.db_state.get_from_history()?;
            let mut state = self.state.borrow_mut();
            state.ui_state.library_items = library_items;
            if state.ui_state.library_selected_index >= state.ui_state.library_items.len() {
                state.ui_state.library_selected_index =
                    state.ui_state.library_items.len().saturating_sub(1);
            }
        }
        Ok(())
    }

    fn open_selected_library_item(&mut self) -> eyre::Result<()> {
        let query = {
            let state = self.state.borrow();
            state
                .ui_state
                .library_items
                .get(state.ui_state.library_selected_index)
                .map(|item| ReaderQuery::new(item.manga_id.clone(), item.chapter, item.page))
        };
        if let Some(query) = query {
            self.state.borrow_mut().ui_state.open_window(WindowType::Reader);
            self.dispatch(ReaderEvent::Open(query))?;
        }
        Ok(())
    }

    fn render_static(frame: &mut Frame, state: &ApplicationState, board: &Board) {
        Self::render_reader_static(frame, state, board);

        let language = state.language();
        match state.ui_state.active_window {
            WindowType::Help => {
                let lines = HelpWindow::lines(&state.config.keymap.help_entries());
                HelpWindow::render(
                    frame,
                    frame.area(),
                    Message::Help.text(language),
                    &lines,
                    state.ui_state.help_scroll_offset,
                );
            }
            WindowType::Bookmarks => BookmarksWindow::render(
                frame,
                frame.area(),
                Message::Bookmarks.text(language),
                &state.ui_state.bookmarks,
                state.ui_state.bookmarks_selected_index,
            ),
            WindowType::Library => {
                let entries: Vec<String> = state
                    .ui_state
                    .library_items
                    .iter()
                    .map(Self::format_library_item)
                    .collect();
                LibraryWindow::render(
                    frame,
                    frame.area(),
                    Message::Library.text(language),
                    &entries,
                    state.ui_state.library_selected_index,
                );
            }
            WindowType::Reader => {}
        }

        if let Some(ref message) = state.ui_state.message {
            Self::render_message_static(frame, message, &state.ui_state.message_type);
        }
    }

    pub fn format_library_item(item: &LibraryItem) -> String {
        let last_read_local = item.last_read.with_timezone(&Local);
        let last_read_str = last_read_local.format("%I:%M%p %b %d").to_string();
        let title = item.title.as_deref().unwrap_or(&item.manga_id);
        format!(
            "{} {}: {} (ch. {}, p. {})",
            last_read_str,
            item.manga_id,
            title,
            item.chapter,
            item.page
        )
    }

    fn render_reader_static(frame: &mut Frame, state: &ApplicationState, board: &Board) {
        let session = &state.session;
        let settings = &state.config.settings;
        let language = state.language();
        let chrome = session.chrome_visible();
        let show_gauge = chrome && settings.show_progress_indicator && !session.slots().is_empty();

        let chunks = Layout::default()
            .direction(ratatui::layout::Direction::Vertical)
            .constraints([
                Constraint::Length(if chrome { 1 } else { 0 }),
                Constraint::Min(0),
                Constraint::Length(if chrome { 1 } else { 0 }),
                Constraint::Length(if show_gauge { 1 } else { 0 }),
            ])
            .split(frame.area());

        board.render(frame, chunks[1], session);
        if !chrome {
            return;
        }

        let title = match (session.manga(), session.episode()) {
            (Some(manga), Some(episode)) => {
                let label = manga
                    .episode_label
                    .as_deref()
                    .unwrap_or(Message::Chapter.text(language));
                format!("{} - {} {}", manga.display_title(), label, episode.number)
            }
            (Some(manga), None) => manga.display_title().to_string(),
            _ => "biderja".to_string(),
        };
        let mut flags = vec![session.direction().as_str().to_ascii_uppercase()];
        if session.double_spread() {
            flags.push("x2".to_string());
        }
        if session.is_loading() {
            flags.push(Message::Loading.text(language).to_string());
        }
        let right_text = flags.join(" ");
        let header_line = Self::build_header_line(&title, Some(&right_text), chunks[0].width);
        frame.render_widget(Paragraph::new(Line::from(header_line)), chunks[0]);

        let footer_line = Self::build_footer_line(state, chunks[2].width);
        frame.render_widget(Paragraph::new(Line::from(footer_line)), chunks[2]);

        if show_gauge {
            let total = session.slots().len();
            let ratio = (session.current_page() + 1) as f64 / total as f64;
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(Color::Blue))
                .ratio(ratio.clamp(0.0, 1.0))
                .label(format!("{}/{}", session.current_page() + 1, total));
            frame.render_widget(gauge, chunks[3]);
        }
    }

    /// Episode hints on the sides, page position in the middle. In RTL the
    /// next chapter sits on the left.
    fn build_footer_line(state: &ApplicationState, width: u16) -> String {
        let session = &state.session;
        let language = state.language();
        let previous = session
            .previous_episode()
            .map(|n| format!("{} {n}", Message::PreviousChapter.text(language)));
        let next = session
            .next_episode()
            .map(|n| format!("{} {n}", Message::NextChapter.text(language)));
        let center = if session.slots().is_empty() {
            String::new()
        } else {
            format!(
                "{} {} / {}",
                Message::Page.text(language),
                session.display_number(session.current_page()),
                session.slots().len()
            )
        };
        let (left, right) = match session.direction() {
            ReadingDirection::Rtl => (next, previous),
            ReadingDirection::Ltr => (previous, next),
        };
        Self::layout_three(
            left.as_deref().unwrap_or(""),
            &center,
            right.as_deref().unwrap_or(""),
            width,
        )
    }

    pub fn layout_three(left: &str, center: &str, right: &str, width: u16) -> String {
        let width = width as usize;
        let mut buffer = vec![' '; width];
        let mut place = |text: &str, start: usize| {
            for (i, ch) in text.chars().enumerate() {
                if let Some(cell) = buffer.get_mut(start + i) {
                    *cell = ch;
                }
            }
        };
        let center_len = center.chars().count();
        let right_len = right.chars().count();
        place(left, 0);
        place(center, width.saturating_sub(center_len) / 2);
        place(right, width.saturating_sub(right_len));
        buffer.into_iter().collect()
    }

    pub fn build_header_line(title: &str, right_text: Option<&str>, width: u16) -> String {
        let width = width as usize;
        if width == 0 {
            return String::new();
        }

        let mut buffer = vec![' '; width];
        let right_len = right_text.map(|text| text.chars().count()).unwrap_or(0);
        let content_width = if right_len > 0 {
            width.saturating_sub(right_len + 1)
        } else {
            width
        };

        let title_chars: Vec<char> = title.chars().take(content_width).collect();
        let title_start = (content_width.saturating_sub(title_chars.len())) / 2;
        for (i, ch) in title_chars.into_iter().enumerate() {
            if title_start + i < buffer.len() {
                buffer[title_start + i] = ch;
            }
        }

        if let Some(right_text) = right_text {
            let start = width.saturating_sub(right_len);
            for (i, ch) in right_text.chars().enumerate() {
                if start + i < buffer.len() {
                    buffer[start + i] = ch;
                }
            }
        }

        buffer.into_iter().collect()
    }

    fn render_message_static(frame: &mut Frame, message: &str, message_type: &MessageType) {
        let color = match message_type {
            MessageType::Info => Color::Blue,
            MessageType::Warning => Color::Yellow,
            MessageType::Error => Color::Red,
        };

        let message_paragraph = Paragraph::new(message)
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: true });

        let frame_area = frame.area();
        let area = Rect {
            x: frame_area.x + 2,
            y: frame_area.y + 2,
            width: frame_area.width.saturating_sub(4),
            height: 3.min(frame_area.height.saturating_sub(2)),
        };

        frame.render_widget(Clear, area);
        frame.render_widget(message_paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::{Episode, Manga, NaturalSize, Page};
    use crate::navigator::{HistoryMode, NavTicket};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[derive(Clone)]
    struct CannedSource;

    impl ContentSource for CannedSource {
        fn fetch_manga(&self, id: &str) -> Result<Manga, FetchError> {
            if id == "42" {
                Ok(Manga {
                    id: id.to_string(),
                    title: "Answer".to_string(),
                    ..Manga::default()
                })
            } else {
                Err(FetchError::MangaNotFound(id.to_string()))
            }
        }

        fn fetch_episode(&self, manga: &Manga, number: u32) -> Result<Episode, FetchError> {
            Ok(Episode {
                manga_id: manga.id.clone(),
                number,
                pages: vec![Page::Blank],
            })
        }

        fn measure_image(&self, _url: &str) -> Result<NaturalSize, FetchError> {
            Ok(NaturalSize {
                width: 800,
                height: 1200,
            })
        }
    }

    #[test]
    fn test_arrows_follow_reading_direction() {
        let keymap = KeymapConfig::default();
        assert_eq!(
            Reader::reader_action(&key(KeyCode::Left), &keymap, ReadingDirection::Rtl),
            Some(ReaderAction::Session(ReaderEvent::FlipForward))
        );
        assert_eq!(
            Reader::reader_action(&key(KeyCode::Left), &keymap, ReadingDirection::Ltr),
            Some(ReaderAction::Session(ReaderEvent::FlipBackward))
        );
        assert_eq!(
            Reader::reader_action(&key(KeyCode::Right), &keymap, ReadingDirection::Rtl),
            Some(ReaderAction::Session(ReaderEvent::FlipBackward))
        );
        assert_eq!(
            Reader::reader_action(&key(KeyCode::Char(' ')), &keymap, ReadingDirection::Rtl),
            Some(ReaderAction::Session(ReaderEvent::FlipForward))
        );
    }

    #[test]
    fn test_keymap_bindings() {
        let mut keymap = KeymapConfig::default();
        let rtl = ReadingDirection::Rtl;
        assert_eq!(
            Reader::reader_action(&key(KeyCode::Char('L')), &keymap, rtl),
            Some(ReaderAction::Session(ReaderEvent::NextEpisode))
        );
        assert_eq!(
            Reader::reader_action(&key(KeyCode::Char('y')), &keymap, rtl),
            Some(ReaderAction::CopyAddress)
        );
        assert_eq!(
            Reader::reader_action(&key(KeyCode::Char('r')), &keymap, rtl),
            Some(ReaderAction::Reload)
        );
        assert_eq!(Reader::reader_action(&key(KeyCode::Char('z')), &keymap, rtl), None);

        keymap.quit = "x".to_string();
        assert_eq!(
            Reader::reader_action(&key(KeyCode::Char('x')), &keymap, rtl),
            Some(ReaderAction::Quit)
        );
        assert_eq!(Reader::reader_action(&key(KeyCode::Char('q')), &keymap, rtl), None);
        assert_eq!(
            Reader::reader_action(
                &KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
                &keymap,
                rtl
            ),
            Some(ReaderAction::Quit)
        );
    }

    #[test]
    fn test_apply_count() {
        assert_eq!(
            Reader::apply_count(ReaderEvent::NextEpisode, Some(12)),
            vec![ReaderEvent::GoToEpisode(12)]
        );
        assert_eq!(
            Reader::apply_count(ReaderEvent::FlipForward, Some(3)),
            vec![ReaderEvent::FlipForward; 3]
        );
        assert_eq!(
            Reader::apply_count(ReaderEvent::ToggleSpread, Some(3)),
            vec![ReaderEvent::ToggleSpread]
        );
        assert_eq!(
            Reader::apply_count(ReaderEvent::PrevEpisode, None),
            vec![ReaderEvent::PrevEpisode]
        );
    }

    #[test]
    fn test_mouse_halves() {
        let click = |column| MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row: 5,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(
            Reader::mouse_action(&click(10), 80, ReadingDirection::Rtl),
            Some(ReaderEvent::FlipForward)
        );
        assert_eq!(
            Reader::mouse_action(&click(70), 80, ReadingDirection::Rtl),
            Some(ReaderEvent::FlipBackward)
        );
        assert_eq!(
            Reader::mouse_action(&click(70), 80, ReadingDirection::Ltr),
            Some(ReaderEvent::FlipForward)
        );
    }

    #[test]
    fn test_viewport_size_uses_reported_pixels_or_fallback() {
        let (viewport, cell) = Reader::viewport_size(100, 40, 1000, 800);
        assert_eq!(cell, (10.0, 20.0));
        assert_eq!(viewport.width, 1000.0);
        assert_eq!(viewport.height, 800.0);

        let (viewport, cell) = Reader::viewport_size(100, 40, 0, 0);
        assert_eq!(cell, FALLBACK_CELL_SIZE);
        assert_eq!(viewport.width, 800.0);
        assert_eq!(viewport.height, 640.0);
    }

    #[test]
    fn test_poll_timeout() {
        let now = Instant::now();
        assert_eq!(Reader::poll_timeout(now, None, None, false), IDLE_POLL);
        assert_eq!(Reader::poll_timeout(now, None, None, true), BUSY_POLL);
        assert_eq!(
            Reader::poll_timeout(now, Some(now + Duration::from_secs(2)), None, false),
            Duration::from_secs(2)
        );
        assert_eq!(
            Reader::poll_timeout(now, None, Some(now), false),
            MESSAGE_LIFETIME
        );
        // Overdue deadlines poll without waiting.
        assert_eq!(
            Reader::poll_timeout(now + Duration::from_secs(5), Some(now), None, false),
            Duration::ZERO
        );
    }

    #[test]
    fn test_header_and_footer_layout() {
        assert_eq!(Reader::build_header_line("abc", Some("RTL"), 11), "  abc   RTL");
        assert_eq!(Reader::build_header_line("abc", None, 0), "");
        assert_eq!(Reader::layout_three("<", "mid", ">", 9), "<  mid  >");
    }

    #[test]
    fn test_message_expiry() {
        let mut ui_state = UiState::new();
        assert!(!ui_state.message_expired());
        ui_state.set_message("hello".to_string(), MessageType::Warning);
        assert!(!ui_state.message_expired());
        ui_state.message_time = Some(Instant::now() - MESSAGE_LIFETIME);
        assert!(ui_state.message_expired());
        ui_state.clear_message();
        assert!(ui_state.message.is_none());
    }

    #[test]
    fn test_spawn_effect_reports_back() {
        let (tx, rx) = mpsc::channel();

        spawn_effect(&CannedSource, &tx, Effect::FetchManga("nope".to_string()))
            .unwrap()
            .join()
            .unwrap();
        match rx.recv().unwrap() {
            ReaderEvent::MangaLoaded { id, result } => {
                assert_eq!(id, "nope");
                assert_eq!(result, Err(FetchError::MangaNotFound("nope".to_string())));
            }
            other => panic!("unexpected event {other:?}"),
        }

        let ticket = NavTicket {
            manga_id: "42".to_string(),
            episode: 3,
            start_page: 0,
            history: HistoryMode::Push,
            generation: 1,
        };
        let manga = CannedSource.fetch_manga("42").unwrap();
        spawn_effect(&CannedSource, &tx, Effect::FetchEpisode { manga, ticket: ticket.clone() })
            .unwrap()
            .join()
            .unwrap();
        match rx.recv().unwrap() {
            ReaderEvent::EpisodeLoaded { ticket: got, result } => {
                assert_eq!(got, ticket);
                assert_eq!(result.unwrap().number, 3);
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(spawn_effect(&CannedSource, &tx, Effect::Redraw).is_none());
    }

    #[test]
    fn test_format_library_item() {
        let item = LibraryItem {
            last_read: chrono::Utc::now(),
            manga_id: "42".to_string(),
            title: Some("Answer".to_string()),
            chapter: 3,
            page: 5,
        };
        let line = Reader::format_library_item(&item);
        assert!(line.ends_with("42: Answer (ch. 3, p. 5)"));
    }
}
