//! Cassette tape deck skinned around an embeddable playlist player.
//!
//! [`spool`] turns playback progress into reel geometry, [`sync`] keeps the
//! deck, the embedded player and the derived progress consistent.

pub mod config;
pub mod error;
pub mod meta;
pub mod player;
pub mod preview;
pub mod session;
pub mod share;
pub mod spool;
pub mod sync;
pub mod timer;

use tracing_subscriber::{fmt, EnvFilter};

pub use error::{DeckError, DeckResult, PlayerError, PlayerResult};
pub use player::{PlayerCapability, PlayerEvent, PlayerEvents, PlayerFactory, PlayerStatus};
pub use session::{PlaybackSession, PlaylistRef};
pub use spool::{generate_spool_scene, SpoolScene, SpoolSide};
pub use sync::{PlayState, PlaybackSynchronizer, ProgressMode, SyncNotification, SyncState};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` controls the filter, e.g. `RUST_LOG=cassette_deck=debug`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
