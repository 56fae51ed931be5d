use crate::error::Boundary;
use crate::models::Manga;

/// How the address history records a completed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Push,
    Replace,
    /// The transition came from the history itself (back/forward).
    Keep,
}

/// One requested episode transition. Responses are matched against the
/// ticket that is currently in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavTicket {
    pub manga_id: String,
    pub episode: u32,
    pub start_page: usize,
    pub history: HistoryMode,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavDecision {
    Fetch(NavTicket),
    AlreadyPending(u32),
    Boundary(Boundary),
}

#[derive(Debug, Clone)]
pub struct EpisodeNavigator {
    manga_id: String,
    known: Vec<u32>,
    current: Option<u32>,
    in_flight: Option<NavTicket>,
    generation: u64,
}

impl EpisodeNavigator {
    pub fn new(manga: &Manga) -> Self {
        Self {
            manga_id: manga.id.clone(),
            known: manga.episode_numbers(),
            current: None,
            in_flight: None,
            generation: 0,
        }
    }

    pub fn manga_id(&self) -> &str {
        &self.manga_id
    }

    pub fn current(&self) -> Option<u32> {
        self.current
    }

    pub fn in_flight(&self) -> Option<&NavTicket> {
        self.in_flight.as_ref()
    }

    pub fn first_episode(&self) -> Option<u32> {
        self.known.first().copied()
    }

    pub fn last_episode(&self) -> Option<u32> {
        self.known.last().copied()
    }

    pub fn check(&self, target: i64) -> Result<u32, Boundary> {
        let first = self.first_episode().map_or(1, i64::from);
        if target < 1 || target < first {
            return Err(Boundary::First);
        }
        match u32::try_from(target) {
            Ok(number) if self.known.binary_search(&number).is_ok() => Ok(number),
            _ => Err(Boundary::Last),
        }
    }

    pub fn go_to(&mut self, target: i64, start_page: usize, history: HistoryMode) -> NavDecision {
        let number = match self.check(target) {
            Ok(number) => number,
            Err(boundary) => {
                log::info!("episode {target} is out of range ({boundary:?})");
                return NavDecision::Boundary(boundary);
            }
        };

        if let Some(ticket) = &self.in_flight {
            if ticket.episode == number {
                return NavDecision::AlreadyPending(number);
            }
            log::debug!(
                "episode {} supersedes in-flight episode {}",
                number,
                ticket.episode
            );
        }

        self.generation += 1;
        let ticket = NavTicket {
            manga_id: self.manga_id.clone(),
            episode: number,
            start_page,
            history,
            generation: self.generation,
        };
        self.in_flight = Some(ticket.clone());
        NavDecision::Fetch(ticket)
    }

    /// Relative move from the displayed episode, so that a double tap on
    /// "next" asks for the same target twice.
    pub fn step(&mut self, delta: i64) -> NavDecision {
        let base = self
            .current
            .or(self.in_flight.as_ref().map(|t| t.episode))
            .map_or(1, i64::from);
        self.go_to(base + delta, 0, HistoryMode::Push)
    }

    fn is_current_ticket(&self, ticket: &NavTicket) -> bool {
        self.in_flight.as_ref() == Some(ticket)
    }

    /// Commit a successful response. Returns false when the ticket is no
    /// longer the one in flight; such responses must be dropped.
    pub fn accept(&mut self, ticket: &NavTicket) -> bool {
        if !self.is_current_ticket(ticket) {
            return false;
        }
        self.in_flight = None;
        self.current = Some(ticket.episode);
        true
    }

    /// Abandon the in-flight transition; its response will be dropped.
    pub fn cancel(&mut self) {
        self.in_flight = None;
    }

    pub fn fail(&mut self, ticket: &NavTicket) -> bool {
        if !self.is_current_ticket(ticket) {
            return false;
        }
        self.in_flight = None;
        true
    }
}
