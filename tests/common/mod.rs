#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use cassette_deck::{
    player::ItemMetadata, PlaybackSession, PlaybackSynchronizer, PlayerCapability, PlayerEvent,
    PlayerEvents, PlayerResult,
};

/// Shared, scriptable state behind every [`ScriptedPlayer`] a deck creates.
#[derive(Default)]
pub struct Script {
    pub index: usize,
    pub length: usize,
    pub time: f64,
    pub duration: f64,
    pub plays: usize,
    pub pauses: usize,
    pub destroyed: usize,
    pub sessions: Vec<String>,
    pub events: Vec<PlayerEvents>,
}

pub type Shared = Rc<RefCell<Script>>;

pub struct ScriptedPlayer(Shared);

impl PlayerCapability for ScriptedPlayer {
    fn play(&mut self) -> PlayerResult<()> {
        self.0.borrow_mut().plays += 1;
        Ok(())
    }

    fn pause(&mut self) -> PlayerResult<()> {
        self.0.borrow_mut().pauses += 1;
        Ok(())
    }

    fn next_item(&mut self) -> PlayerResult<()> {
        let mut s = self.0.borrow_mut();
        s.index += 1;
        s.time = 0.0;
        Ok(())
    }

    fn previous_item(&mut self) -> PlayerResult<()> {
        let mut s = self.0.borrow_mut();
        s.index -= 1;
        s.time = 0.0;
        Ok(())
    }

    fn current_time(&self) -> PlayerResult<f64> {
        Ok(self.0.borrow().time)
    }

    fn duration(&self) -> PlayerResult<f64> {
        Ok(self.0.borrow().duration)
    }

    fn playlist_index(&self) -> PlayerResult<usize> {
        Ok(self.0.borrow().index)
    }

    fn playlist_length(&self) -> PlayerResult<usize> {
        Ok(self.0.borrow().length)
    }

    fn current_item(&self) -> PlayerResult<ItemMetadata> {
        Ok(ItemMetadata {
            title: format!("Song {}", self.0.borrow().index + 1),
        })
    }

    fn destroy(&mut self) -> PlayerResult<()> {
        self.0.borrow_mut().destroyed += 1;
        Ok(())
    }
}

pub type ScriptedFactory =
    Box<dyn FnMut(&PlaybackSession, PlayerEvents) -> PlayerResult<Box<dyn PlayerCapability>>>;

pub fn script(length: usize, duration: f64) -> Shared {
    Rc::new(RefCell::new(Script {
        length,
        duration,
        ..Default::default()
    }))
}

pub fn deck(script: &Shared) -> PlaybackSynchronizer<ScriptedFactory> {
    let shared = Rc::clone(script);
    let factory: ScriptedFactory = Box::new(
        move |session: &PlaybackSession,
              events: PlayerEvents|
              -> PlayerResult<Box<dyn PlayerCapability>> {
            let mut s = shared.borrow_mut();
            s.index = 0;
            s.time = 0.0;
            s.sessions.push(session.playlist_id().to_string());
            s.events.push(events);
            drop(s);
            Ok(Box::new(ScriptedPlayer(Rc::clone(&shared))))
        },
    );
    PlaybackSynchronizer::new(factory)
}

/// Emits `event` from the most recently created player and lets the deck react.
pub fn emit(script: &Shared, deck: &mut PlaybackSynchronizer<ScriptedFactory>, event: PlayerEvent) {
    let events = script.borrow().events.last().cloned();
    if let Some(events) = events {
        events.emit(event);
    }
    deck.pump_events();
}
