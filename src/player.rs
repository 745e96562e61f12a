//! Seam between the deck and an embeddable playlist player.
//!
//! The deck never drives a media engine itself. It talks to whatever player
//! the host embeds through [`PlayerCapability`], and the player reports back
//! asynchronously through [`PlayerEvents`].

use std::{fmt, sync::mpsc::Sender};

use crate::{error::PlayerResult, session::PlaybackSession};

/// Monotonic identifier of a playback session. Events carry it so that
/// notifications from a torn-down player can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Player state codes as reported by the embeddable player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerStatus {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(PlayerStatus::Unstarted),
            0 => Some(PlayerStatus::Ended),
            1 => Some(PlayerStatus::Playing),
            2 => Some(PlayerStatus::Paused),
            3 => Some(PlayerStatus::Buffering),
            5 => Some(PlayerStatus::Cued),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            PlayerStatus::Unstarted => -1,
            PlayerStatus::Ended => 0,
            PlayerStatus::Playing => 1,
            PlayerStatus::Paused => 2,
            PlayerStatus::Buffering => 3,
            PlayerStatus::Cued => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerErrorCode(pub i32);

impl PlayerErrorCode {
    pub fn description(self) -> &'static str {
        match self.0 {
            2 => "invalid parameter",
            5 => "content cannot be played in the HTML5 player",
            100 => "video not found or private",
            101 | 150 => "owner does not allow embedded playback",
            _ => "unknown player error",
        }
    }
}

impl fmt::Display for PlayerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Ready,
    StateChange(PlayerStatus),
    Error(PlayerErrorCode),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemMetadata {
    pub title: String,
}

/// Callback side handed to a player when it is constructed.
#[derive(Debug, Clone)]
pub struct PlayerEvents {
    session: SessionId,
    tx: Sender<(SessionId, PlayerEvent)>,
}

impl PlayerEvents {
    pub fn new(session: SessionId, tx: Sender<(SessionId, PlayerEvent)>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Returns `false` once the deck has gone away.
    pub fn emit(&self, event: PlayerEvent) -> bool {
        self.tx.send((self.session, event)).is_ok()
    }
}

/// Commands and queries the deck issues against a live player instance.
pub trait PlayerCapability {
    fn play(&mut self) -> PlayerResult<()>;
    fn pause(&mut self) -> PlayerResult<()>;
    fn next_item(&mut self) -> PlayerResult<()>;
    fn previous_item(&mut self) -> PlayerResult<()>;

    /// Position inside the current item, in seconds.
    fn current_time(&self) -> PlayerResult<f64>;
    /// Length of the current item in seconds; `0.0` while unknown.
    fn duration(&self) -> PlayerResult<f64>;
    fn playlist_index(&self) -> PlayerResult<usize>;
    fn playlist_length(&self) -> PlayerResult<usize>;
    fn current_item(&self) -> PlayerResult<ItemMetadata>;

    /// Must tolerate being called more than once.
    fn destroy(&mut self) -> PlayerResult<()>;
}

/// Builds a player for a session. Autoplay is never requested.
pub trait PlayerFactory {
    fn create(
        &mut self,
        session: &PlaybackSession,
        events: PlayerEvents,
    ) -> PlayerResult<Box<dyn PlayerCapability>>;
}

impl<F> PlayerFactory for F
where
    F: FnMut(&PlaybackSession, PlayerEvents) -> PlayerResult<Box<dyn PlayerCapability>>,
{
    fn create(
        &mut self,
        session: &PlaybackSession,
        events: PlayerEvents,
    ) -> PlayerResult<Box<dyn PlayerCapability>> {
        self(session, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn status_codes_round_trip_known_values() {
        for code in [-1, 0, 1, 2, 3, 5] {
            let status = PlayerStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(PlayerStatus::from_code(4), None);
    }

    #[test]
    fn error_codes_are_described() {
        assert_eq!(
            PlayerErrorCode(150).description(),
            PlayerErrorCode(101).description()
        );
        assert_eq!(PlayerErrorCode(42).description(), "unknown player error");
        assert!(PlayerErrorCode(100).to_string().ends_with("(100)"));
    }

    #[test]
    fn events_are_tagged_with_session() {
        let (tx, rx) = mpsc::channel();
        let events = PlayerEvents::new(SessionId(7), tx);
        assert!(events.emit(PlayerEvent::Ready));
        assert_eq!(rx.recv().unwrap(), (SessionId(7), PlayerEvent::Ready));
        drop(rx);
        assert!(!events.emit(PlayerEvent::Ready));
    }
}
