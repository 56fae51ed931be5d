use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NetworkFailure,
}

/// Failure of a content request. Handled where the request was made;
/// never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    MangaNotFound(String),
    EpisodeNotFound { manga_id: String, number: u32 },
    Network(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::MangaNotFound(_) | FetchError::EpisodeNotFound { .. } => {
                ErrorKind::NotFound
            }
            FetchError::Network(_) => ErrorKind::NetworkFailure,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::MangaNotFound(id) => write!(f, "manga '{id}' not found"),
            FetchError::EpisodeNotFound { manga_id, number } => {
                write!(f, "episode {number} of manga '{manga_id}' not found")
            }
            FetchError::Network(reason) => write!(f, "network failure: {reason}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

/// Which end of the episode list a navigation request ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    First,
    Last,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kinds() {
        assert_eq!(FetchError::MangaNotFound("7".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            FetchError::EpisodeNotFound { manga_id: "7".into(), number: 2 }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(FetchError::Network("reset".into()).kind(), ErrorKind::NetworkFailure);
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::EpisodeNotFound { manga_id: "42".into(), number: 3 };
        assert_eq!(err.to_string(), "episode 3 of manga '42' not found");
    }
}
