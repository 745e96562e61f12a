use thiserror::Error;

/// Failures reported by an embedded player instance.
///
/// None of these are fatal to the deck: queries that fail are skipped for the
/// current tick and commands that fail are logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("player is not ready")]
    NotReady,

    #[error("player has been destroyed")]
    Destroyed,

    #[error("player rejected command: {0}")]
    Rejected(&'static str),

    #[error("player backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Player error: {0}")]
    Player(#[from] PlayerError),

    #[error("Invalid playlist: {0}")]
    InvalidPlaylist(String),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

pub type PlayerResult<T> = Result<T, PlayerError>;
pub type DeckResult<T> = Result<T, DeckError>;
