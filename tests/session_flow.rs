mod common;

use std::time::{Duration, Instant};

use cassette_deck::{
    player::PlayerErrorCode, PlayState, PlayerEvent, PlayerStatus, ProgressMode,
    SyncNotification, SyncState,
};
use common::{deck, emit, script};

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn load_ready_play_and_skip() {
    let script = script(3, 120.0);
    let mut deck = deck(&script);

    deck.load_playlist("ABC", None).unwrap();
    assert_eq!(deck.state(), SyncState::Uninitialized);
    assert!(!deck.controls_enabled());

    emit(&script, &mut deck, PlayerEvent::Ready);
    assert_eq!(deck.state(), SyncState::Ready);
    assert_eq!(deck.play_state(), PlayState::Stopped);
    assert_eq!(deck.progress(), 0.0);
    assert_eq!(deck.playlist_length(), 3);
    assert_eq!(deck.current_index(), 0);
    assert_eq!(script.borrow().pauses, 1);

    deck.play();
    assert_eq!(deck.play_state(), PlayState::Playing);
    assert_eq!(deck.active_timers(), 1);

    script.borrow_mut().time = 30.0;
    deck.advance(Instant::now() + Duration::from_millis(1100));
    assert!(close(deck.progress(), 25.0));

    deck.next();
    assert_eq!(deck.current_index(), 1);
    assert_eq!(deck.now_playing(), Some("Song 2"));
    assert!(close(deck.progress(), 0.0));

    script.borrow_mut().time = 60.0;
    deck.advance(Instant::now() + Duration::from_millis(2200));
    assert!(close(deck.progress(), 50.0));
}

#[test]
fn player_reported_status_wins() {
    let script = script(3, 100.0);
    let mut deck = deck(&script);
    deck.load_playlist("ABC", None).unwrap();
    emit(&script, &mut deck, PlayerEvent::Ready);

    emit(&script, &mut deck, PlayerEvent::StateChange(PlayerStatus::Playing));
    assert_eq!(deck.state(), SyncState::Playing);
    assert_eq!(deck.active_timers(), 1);

    emit(&script, &mut deck, PlayerEvent::StateChange(PlayerStatus::Paused));
    assert_eq!(deck.state(), SyncState::Stopped);
    assert_eq!(deck.play_state(), PlayState::Stopped);
    assert_eq!(deck.active_timers(), 0);
}

#[test]
fn replacing_a_session_leaves_one_sampler() {
    let script = script(3, 100.0);
    let mut deck = deck(&script);

    deck.load_playlist("ABC", None).unwrap();
    emit(&script, &mut deck, PlayerEvent::Ready);
    deck.play();
    script.borrow_mut().time = 40.0;
    assert!(deck.sample());
    let stale = script.borrow().events[0].clone();

    deck.load_playlist("DEF", None).unwrap();
    assert_eq!(script.borrow().destroyed, 1);
    assert_eq!(deck.active_timers(), 0);
    assert_eq!(deck.progress(), 0.0);
    assert_eq!(deck.session().map(|s| s.playlist_id()), Some("DEF"));

    stale.emit(PlayerEvent::StateChange(PlayerStatus::Playing));
    deck.pump_events();
    assert_eq!(deck.state(), SyncState::Uninitialized);
    assert_eq!(deck.active_timers(), 0);

    emit(&script, &mut deck, PlayerEvent::Ready);
    assert_eq!(deck.progress(), 0.0);
    deck.play();
    deck.play();
    assert_eq!(deck.active_timers(), 1);
}

#[test]
fn skipping_past_either_end_is_ignored() {
    let script = script(2, 100.0);
    let mut deck = deck(&script);
    deck.load_playlist("ABC", None).unwrap();
    emit(&script, &mut deck, PlayerEvent::Ready);

    deck.previous();
    assert_eq!(deck.current_index(), 0);
    assert_eq!(script.borrow().index, 0);

    deck.next();
    assert_eq!(deck.current_index(), 1);
    assert!(!deck.has_next());
    deck.next();
    assert_eq!(deck.current_index(), 1);
    assert_eq!(script.borrow().index, 1);

    deck.previous();
    assert_eq!(deck.current_index(), 0);
}

#[test]
fn teardown_is_idempotent() {
    let script = script(3, 100.0);
    let mut deck = deck(&script);
    let rx = deck.subscribe();

    deck.teardown();
    deck.load_playlist("ABC", None).unwrap();
    emit(&script, &mut deck, PlayerEvent::Ready);
    deck.play();

    deck.teardown();
    deck.teardown();
    assert_eq!(script.borrow().destroyed, 1);
    assert!(deck.session().is_none());
    assert_eq!(deck.active_timers(), 0);
    assert_eq!(deck.state(), SyncState::Uninitialized);
    assert!(!deck.controls_enabled());

    let cleared = rx
        .try_iter()
        .filter(|n| *n == SyncNotification::SessionChanged(None))
        .count();
    assert_eq!(cleared, 1);
}

#[test]
fn empty_playlist_id_tears_down() {
    let script = script(3, 100.0);
    let mut deck = deck(&script);
    deck.load_playlist("ABC", None).unwrap();
    deck.load_playlist("   ", None).unwrap();
    assert!(deck.session().is_none());
    assert_eq!(script.borrow().destroyed, 1);
}

#[test]
fn ended_playlist_stops_sampling() {
    let script = script(1, 100.0);
    let mut deck = deck(&script);
    deck.set_progress_mode(ProgressMode::WholePlaylist);
    deck.load_playlist("ABC", None).unwrap();
    emit(&script, &mut deck, PlayerEvent::Ready);
    deck.play();

    script.borrow_mut().time = 100.0;
    assert!(deck.sample());
    assert!(close(deck.progress(), 100.0));

    emit(&script, &mut deck, PlayerEvent::StateChange(PlayerStatus::Ended));
    assert_eq!(deck.play_state(), PlayState::Stopped);
    assert_eq!(deck.active_timers(), 0);
    assert!(close(deck.progress(), 100.0));
}

#[test]
fn scene_follows_progress() {
    let script = script(3, 200.0);
    let mut deck = deck(&script);
    deck.load_playlist("ABC", None).unwrap();
    emit(&script, &mut deck, PlayerEvent::Ready);
    deck.play();
    let before = deck.spool_scene();

    script.borrow_mut().time = 150.0;
    deck.sample();
    let after = deck.spool_scene();
    assert!(after.left.tape_radius < before.left.tape_radius);
    assert!(after.right.tape_radius > before.right.tape_radius);
}

#[test]
fn failed_playlist_can_be_reloaded() {
    let script = script(3, 100.0);
    let mut deck = deck(&script);
    deck.load_playlist("ABC", None).unwrap();
    emit(&script, &mut deck, PlayerEvent::Ready);
    emit(&script, &mut deck, PlayerEvent::Error(PlayerErrorCode(5)));
    assert!(!deck.controls_enabled());

    deck.load_playlist("ABC", None).unwrap();
    assert_eq!(script.borrow().sessions, vec!["ABC", "ABC"]);
    assert_eq!(script.borrow().destroyed, 1);
    assert_eq!(deck.last_error(), None);

    emit(&script, &mut deck, PlayerEvent::Ready);
    assert!(deck.controls_enabled());
    deck.load_playlist("ABC", None).unwrap();
    assert_eq!(script.borrow().sessions.len(), 2);
}

#[test]
fn pause_echo_after_ready_keeps_deck_usable() {
    let script = script(3, 100.0);
    let mut deck = deck(&script);
    deck.load_playlist("ABC", None).unwrap();
    emit(&script, &mut deck, PlayerEvent::Ready);
    emit(&script, &mut deck, PlayerEvent::StateChange(PlayerStatus::Paused));

    assert_eq!(deck.state(), SyncState::Stopped);
    assert_eq!(deck.play_state(), PlayState::Stopped);
    assert_eq!(deck.progress(), 0.0);
    assert_eq!(deck.active_timers(), 0);
    assert!(deck.controls_enabled());
}
