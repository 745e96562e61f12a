//! Clock-driven stand-in for the embedded video player.
//!
//! The desktop host has no web view to embed the real player in, so it runs
//! the deck against this: a playlist of synthetic items, derived from the
//! playlist id, that plays back in wall-clock time.

use std::{
    cell::RefCell,
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::Instant,
};

use tracing::debug;

use crate::{
    error::{PlayerError, PlayerResult},
    player::{
        ItemMetadata, PlayerCapability, PlayerEvent, PlayerEvents, PlayerFactory, PlayerStatus,
    },
    session::PlaybackSession,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewItem {
    pub title: String,
    pub duration: f64,
}

#[derive(Debug)]
struct Transport {
    index: usize,
    offset: f64,
    anchor: Option<Instant>,
    destroyed: bool,
}

impl Transport {
    fn position(&self, now: Instant) -> f64 {
        self.offset
            + self
                .anchor
                .map(|anchor| now.saturating_duration_since(anchor).as_secs_f64())
                .unwrap_or(0.0)
    }
}

pub struct PreviewPlayer {
    items: Vec<PreviewItem>,
    events: PlayerEvents,
    transport: RefCell<Transport>,
}

impl PreviewPlayer {
    pub fn new(items: Vec<PreviewItem>, events: PlayerEvents) -> Self {
        Self {
            items,
            events,
            transport: RefCell::new(Transport {
                index: 0,
                offset: 0.0,
                anchor: None,
                destroyed: false,
            }),
        }
    }

    /// Synthetic playlist for an id; the same id always yields the same items.
    pub fn items_for(playlist_id: &str) -> Vec<PreviewItem> {
        let mut hasher = DefaultHasher::new();
        playlist_id.hash(&mut hasher);
        let mut rng = fastrand::Rng::with_seed(hasher.finish());
        let count = rng.usize(4..=12);
        (1..=count)
            .map(|n| PreviewItem {
                title: format!("{playlist_id} · Track {n}"),
                duration: f64::from(rng.u32(150..=330)),
            })
            .collect()
    }

    pub fn items(&self) -> &[PreviewItem] {
        &self.items
    }

    /// Rolls the transport forward to `now`, moving through items that ended.
    fn settle_at(&self, now: Instant) {
        let mut transport = self.transport.borrow_mut();
        if transport.destroyed || transport.anchor.is_none() {
            return;
        }
        loop {
            let Some(item) = self.items.get(transport.index) else {
                break;
            };
            let position = transport.position(now);
            if position < item.duration {
                break;
            }
            if transport.index + 1 < self.items.len() {
                transport.index += 1;
                transport.offset = position - item.duration;
                transport.anchor = Some(now);
            } else {
                transport.offset = item.duration;
                transport.anchor = None;
                self.events
                    .emit(PlayerEvent::StateChange(PlayerStatus::Ended));
                break;
            }
        }
    }

    fn live(&self) -> PlayerResult<()> {
        if self.transport.borrow().destroyed {
            Err(PlayerError::Destroyed)
        } else {
            self.settle_at(Instant::now());
            Ok(())
        }
    }

    fn jump(&mut self, index: usize) {
        let transport = self.transport.get_mut();
        transport.index = index;
        transport.offset = 0.0;
        if transport.anchor.is_some() {
            transport.anchor = Some(Instant::now());
        }
    }
}

impl PlayerCapability for PreviewPlayer {
    fn play(&mut self) -> PlayerResult<()> {
        self.live()?;
        if self.items.is_empty() {
            return Err(PlayerError::Rejected("play"));
        }
        let transport = self.transport.get_mut();
        if transport.anchor.is_none() {
            if let Some(item) = self.items.get(transport.index) {
                if transport.offset >= item.duration {
                    transport.offset = 0.0;
                }
            }
            transport.anchor = Some(Instant::now());
            self.events
                .emit(PlayerEvent::StateChange(PlayerStatus::Playing));
        }
        Ok(())
    }

    fn pause(&mut self) -> PlayerResult<()> {
        self.live()?;
        let now = Instant::now();
        let transport = self.transport.get_mut();
        if transport.anchor.is_some() {
            transport.offset = transport.position(now);
            transport.anchor = None;
            self.events
                .emit(PlayerEvent::StateChange(PlayerStatus::Paused));
        }
        Ok(())
    }

    fn next_item(&mut self) -> PlayerResult<()> {
        self.live()?;
        let index = self.transport.get_mut().index;
        if index + 1 >= self.items.len() {
            return Err(PlayerError::Rejected("next item"));
        }
        self.jump(index + 1);
        Ok(())
    }

    fn previous_item(&mut self) -> PlayerResult<()> {
        self.live()?;
        let index = self.transport.get_mut().index;
        if index == 0 {
            return Err(PlayerError::Rejected("previous item"));
        }
        self.jump(index - 1);
        Ok(())
    }

    fn current_time(&self) -> PlayerResult<f64> {
        self.live()?;
        Ok(self.transport.borrow().position(Instant::now()))
    }

    fn duration(&self) -> PlayerResult<f64> {
        self.live()?;
        let index = self.transport.borrow().index;
        Ok(self.items.get(index).map(|item| item.duration).unwrap_or(0.0))
    }

    fn playlist_index(&self) -> PlayerResult<usize> {
        self.live()?;
        Ok(self.transport.borrow().index)
    }

    fn playlist_length(&self) -> PlayerResult<usize> {
        self.live()?;
        Ok(self.items.len())
    }

    fn current_item(&self) -> PlayerResult<ItemMetadata> {
        self.live()?;
        let index = self.transport.borrow().index;
        self.items
            .get(index)
            .map(|item| ItemMetadata {
                title: item.title.clone(),
            })
            .ok_or(PlayerError::NotReady)
    }

    fn destroy(&mut self) -> PlayerResult<()> {
        let transport = self.transport.get_mut();
        transport.destroyed = true;
        transport.anchor = None;
        Ok(())
    }
}

/// Factory for [`PreviewPlayer`]s; announces readiness as soon as a player exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreviewFactory;

impl PlayerFactory for PreviewFactory {
    fn create(
        &mut self,
        session: &PlaybackSession,
        events: PlayerEvents,
    ) -> PlayerResult<Box<dyn PlayerCapability>> {
        let items = PreviewPlayer::items_for(session.playlist_id());
        if let Some(item) = session.start_item() {
            debug!(item, "preview player ignores start item");
        }
        debug!(
            session = %session.id(),
            items = items.len(),
            "preview player created"
        );
        events.emit(PlayerEvent::Ready);
        Ok(Box::new(PreviewPlayer::new(items, events)))
    }
}
