//! Keeps transport intent, the embedded player and derived progress in step.

use std::{
    collections::BTreeMap,
    str::FromStr,
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    time::Instant,
};

use tracing::{debug, info, warn};

use crate::{
    error::{DeckError, DeckResult},
    player::{
        PlayerCapability, PlayerErrorCode, PlayerEvent, PlayerEvents, PlayerFactory,
        PlayerStatus, SessionId,
    },
    session::{PlaybackSession, PlaylistRef},
    spool::{clamp_progress, SpoolGeometry, SpoolScene},
    timer::{IntervalTimers, SamplingPolicy, TimerId},
};

/// What the progress fraction measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressMode {
    /// Position within the current item; restarts at every item.
    #[default]
    PerItem,
    /// Position across the playlist, over the item durations seen so far.
    WholePlaylist,
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "item" | "per_item" | "per-item" => Ok(ProgressMode::PerItem),
            "playlist" | "whole_playlist" | "whole-playlist" => Ok(ProgressMode::WholePlaylist),
            other => Err(format!("unknown progress mode: {other}")),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SyncState {
    #[default]
    Uninitialized,
    Ready,
    Playing,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncNotification {
    SessionChanged(Option<SessionId>),
    StateChanged(SyncState),
    ProgressChanged(f32),
    TrackChanged { index: usize, title: String },
    PlayerFailed(PlayerErrorCode),
}

pub struct PlaybackSynchronizer<F: PlayerFactory> {
    factory: F,
    policy: SamplingPolicy,
    mode: ProgressMode,
    geometry: SpoolGeometry,
    timers: IntervalTimers,
    sampling_timer: Option<TimerId>,
    session: Option<PlaybackSession>,
    player: Option<Box<dyn PlayerCapability>>,
    events_tx: Sender<(SessionId, PlayerEvent)>,
    events_rx: Receiver<(SessionId, PlayerEvent)>,
    state: SyncState,
    play_state: PlayState,
    progress: f32,
    current_index: usize,
    playlist_length: usize,
    title: String,
    item_durations: BTreeMap<usize, f64>,
    last_error: Option<PlayerErrorCode>,
    subscribers: Vec<Sender<SyncNotification>>,
}

impl<F: PlayerFactory> PlaybackSynchronizer<F> {
    pub fn new(factory: F) -> Self {
        Self::with_policy(factory, SamplingPolicy::default(), ProgressMode::default())
    }

    pub fn with_policy(factory: F, policy: SamplingPolicy, mode: ProgressMode) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            factory,
            policy,
            mode,
            geometry: SpoolGeometry::default(),
            timers: IntervalTimers::new(),
            sampling_timer: None,
            session: None,
            player: None,
            events_tx,
            events_rx,
            state: SyncState::Uninitialized,
            play_state: PlayState::Stopped,
            progress: 0.0,
            current_index: 0,
            playlist_length: 0,
            title: String::new(),
            item_durations: BTreeMap::new(),
            last_error: None,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<SyncNotification> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn set_geometry(&mut self, geometry: SpoolGeometry) {
        self.geometry = geometry;
    }

    pub fn geometry(&self) -> &SpoolGeometry {
        &self.geometry
    }

    pub fn set_progress_mode(&mut self, mode: ProgressMode) {
        if self.mode != mode {
            self.mode = mode;
            self.item_durations.clear();
        }
    }

    pub fn progress_mode(&self) -> ProgressMode {
        self.mode
    }

    /// Changing the policy re-arms a running sampling timer with the new period.
    pub fn set_sampling_policy(&mut self, policy: SamplingPolicy) {
        if self.policy == policy {
            return;
        }
        self.policy = policy;
        if self.sampling_timer.is_some() {
            self.clear_sampling();
            self.arm_sampling();
        }
    }

    pub fn sampling_policy(&self) -> &SamplingPolicy {
        &self.policy
    }

    pub fn load(&mut self, playlist: PlaylistRef) -> DeckResult<()> {
        self.load_playlist(&playlist.playlist_id, playlist.start_item.as_deref())
    }

    /// Replaces the active session when `playlist_id` differs from the loaded one.
    ///
    /// An empty id tears the deck down.
    pub fn load_playlist(&mut self, playlist_id: &str, start_item: Option<&str>) -> DeckResult<()> {
        let playlist_id = playlist_id.trim();
        if playlist_id.is_empty() {
            self.teardown();
            return Ok(());
        }

        // A player that reported an error is treated as unloaded.
        if self.last_error.is_none()
            && self
                .session
                .as_ref()
                .is_some_and(|session| session.playlist_id() == playlist_id)
        {
            return Ok(());
        }

        let playlist = PlaylistRef::new(playlist_id, start_item)
            .ok_or_else(|| DeckError::InvalidPlaylist(playlist_id.to_string()))?;

        self.release_player();
        self.reset_derived();
        self.last_error = None;

        let session = playlist.into_session();
        let events = PlayerEvents::new(session.id(), self.events_tx.clone());
        match self.factory.create(&session, events) {
            Ok(player) => {
                info!(session = %session.id(), playlist = playlist_id, "playlist session created");
                let id = session.id();
                self.player = Some(player);
                self.session = Some(session);
                self.set_state(SyncState::Uninitialized);
                self.notify(SyncNotification::SessionChanged(Some(id)));
                Ok(())
            }
            Err(err) => {
                warn!(%err, playlist = playlist_id, "failed to create player");
                self.session = None;
                self.set_state(SyncState::Uninitialized);
                self.notify(SyncNotification::SessionChanged(None));
                Err(DeckError::Player(err))
            }
        }
    }

    /// Destroys the player and forgets the session. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        let had_session = self.session.is_some();
        self.release_player();
        self.session = None;
        self.reset_derived();
        self.set_state(SyncState::Uninitialized);
        if had_session {
            info!("playlist session torn down");
            self.notify(SyncNotification::SessionChanged(None));
        }
    }

    /// Drains queued player notifications.
    pub fn pump_events(&mut self) {
        loop {
            match self.events_rx.try_recv() {
                Ok((session, event)) => self.handle_event(session, event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    pub fn handle_event(&mut self, session: SessionId, event: PlayerEvent) {
        if self.session.as_ref().map(PlaybackSession::id) != Some(session) {
            debug!(%session, ?event, "dropping event from stale session");
            return;
        }

        match event {
            PlayerEvent::Ready => self.on_ready(),
            PlayerEvent::StateChange(status) => self.on_status(status),
            PlayerEvent::Error(code) => {
                warn!(%session, error = %code, "player reported an error");
                self.clear_sampling();
                self.play_state = PlayState::Stopped;
                self.last_error = Some(code);
                self.set_state(SyncState::Uninitialized);
                self.notify(SyncNotification::PlayerFailed(code));
            }
        }
    }

    fn on_ready(&mut self) {
        let Some(player) = self.player.as_mut() else {
            return;
        };

        // Sessions always start paused, whatever the player decided to do.
        if let Err(err) = player.pause() {
            debug!(%err, "pause on ready failed");
        }
        let index = player.playlist_index().unwrap_or(0);
        let length = player.playlist_length().unwrap_or(0);

        self.clear_sampling();
        self.item_durations.clear();
        self.current_index = index;
        self.playlist_length = length;
        self.title.clear();
        self.play_state = PlayState::Stopped;
        self.last_error = None;
        self.set_progress(0.0);
        info!(index, length, "player ready");
        self.set_state(SyncState::Ready);
        self.notify(SyncNotification::TrackChanged {
            index,
            title: String::new(),
        });
    }

    fn on_status(&mut self, status: PlayerStatus) {
        if self.state == SyncState::Uninitialized {
            debug!(?status, "ignoring state change before ready");
            return;
        }

        match status {
            PlayerStatus::Playing => {
                self.play_state = PlayState::Playing;
                self.arm_sampling();
                self.refresh_track();
                self.set_state(SyncState::Playing);
            }
            other => {
                self.play_state = PlayState::Stopped;
                self.clear_sampling();
                if matches!(other, PlayerStatus::Ended | PlayerStatus::Cued) {
                    self.refresh_track();
                }
                self.set_state(SyncState::Stopped);
            }
        }
    }

    pub fn play(&mut self) {
        if !self.controls_enabled() {
            return;
        }
        let Some(player) = self.player.as_mut() else {
            return;
        };
        match player.play() {
            Ok(()) => {
                self.play_state = PlayState::Playing;
                self.arm_sampling();
                self.set_state(SyncState::Playing);
            }
            Err(err) => warn!(%err, "play failed"),
        }
    }

    pub fn pause(&mut self) {
        if !self.controls_enabled() {
            return;
        }
        let Some(player) = self.player.as_mut() else {
            return;
        };
        match player.pause() {
            Ok(()) => {
                self.play_state = PlayState::Stopped;
                self.clear_sampling();
                self.set_state(SyncState::Stopped);
            }
            Err(err) => warn!(%err, "pause failed"),
        }
    }

    pub fn toggle(&mut self) {
        match self.play_state {
            PlayState::Playing => self.pause(),
            PlayState::Stopped => self.play(),
        }
    }

    pub fn next(&mut self) {
        if !self.has_next() {
            return;
        }
        if let Some(player) = self.player.as_mut() {
            if let Err(err) = player.next_item() {
                warn!(%err, "next item failed");
                return;
            }
        }
        self.refresh_track();
    }

    pub fn previous(&mut self) {
        if !self.has_previous() {
            return;
        }
        if let Some(player) = self.player.as_mut() {
            if let Err(err) = player.previous_item() {
                warn!(%err, "previous item failed");
                return;
            }
        }
        self.refresh_track();
    }

    /// Fires due timers; each sampling tick re-reads the player position.
    pub fn advance(&mut self, now: Instant) {
        let fired = self.timers.due(now);
        for id in fired {
            if Some(id) == self.sampling_timer {
                self.sample();
            } else {
                // Only the sampling timer is ever armed; anything else is a leak.
                self.timers.clear_interval(id);
            }
        }
    }

    /// Recomputes progress from the player. Returns whether progress was updated.
    pub fn sample(&mut self) -> bool {
        let Some(player) = self.player.as_ref() else {
            return false;
        };

        let (time, duration) = match (player.current_time(), player.duration()) {
            (Ok(time), Ok(duration)) => (time, duration),
            (Err(err), _) | (_, Err(err)) => {
                debug!(%err, "skipping progress sample");
                return false;
            }
        };
        let index = player.playlist_index().ok();

        if let Some(index) = index {
            if index != self.current_index {
                self.refresh_track();
            }
        }

        if !duration.is_finite() || duration <= 0.0 || !time.is_finite() {
            return false;
        }

        let progress = match self.mode {
            ProgressMode::PerItem => time / duration * 100.0,
            ProgressMode::WholePlaylist => {
                self.item_durations.insert(self.current_index, duration);
                let completed: f64 = self
                    .item_durations
                    .range(..self.current_index)
                    .map(|(_, d)| *d)
                    .sum();
                let known: f64 = self.item_durations.values().sum();
                (completed + time.min(duration)) / known * 100.0
            }
        };
        self.set_progress(progress as f32);
        true
    }

    fn refresh_track(&mut self) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        let index = player.playlist_index().unwrap_or(self.current_index);
        let title = match player.current_item() {
            Ok(item) => item.title,
            Err(err) => {
                debug!(%err, "could not read item metadata");
                self.title.clone()
            }
        };
        if let Ok(length) = player.playlist_length() {
            self.playlist_length = length;
        }

        let changed = index != self.current_index || title != self.title;
        let index_changed = index != self.current_index;
        self.current_index = index;
        self.title = title;

        if index_changed && self.mode == ProgressMode::PerItem && !self.sample() {
            self.set_progress(0.0);
        }
        if changed {
            debug!(index, title = %self.title, "track changed");
            self.notify(SyncNotification::TrackChanged {
                index,
                title: self.title.clone(),
            });
        }
    }

    fn release_player(&mut self) {
        self.clear_sampling();
        if let Some(mut player) = self.player.take() {
            if let Err(err) = player.destroy() {
                debug!(%err, "player destroy failed");
            }
        }
    }

    fn reset_derived(&mut self) {
        self.play_state = PlayState::Stopped;
        self.current_index = 0;
        self.playlist_length = 0;
        self.title.clear();
        self.item_durations.clear();
        self.set_progress(0.0);
    }

    fn arm_sampling(&mut self) {
        if let Some(id) = self.sampling_timer {
            if self.timers.is_active(id) {
                return;
            }
        }
        let id = self.timers.set_interval(self.policy.period(), Instant::now());
        self.sampling_timer = Some(id);
    }

    fn clear_sampling(&mut self) {
        if let Some(id) = self.sampling_timer.take() {
            self.timers.clear_interval(id);
        }
    }

    fn set_progress(&mut self, progress: f32) {
        let progress = clamp_progress(progress);
        if (progress - self.progress).abs() > f32::EPSILON {
            self.progress = progress;
            self.notify(SyncNotification::ProgressChanged(progress));
        } else {
            self.progress = progress;
        }
    }

    fn set_state(&mut self, state: SyncState) {
        if self.state != state {
            self.state = state;
            self.notify(SyncNotification::StateChanged(state));
        }
    }

    fn notify(&mut self, notification: SyncNotification) {
        self.subscribers
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn playlist_length(&self) -> usize {
        self.playlist_length
    }

    pub fn now_playing(&self) -> Option<&str> {
        (!self.title.is_empty()).then_some(self.title.as_str())
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn last_error(&self) -> Option<PlayerErrorCode> {
        self.last_error
    }

    /// False while nothing is loaded, before ready, or after a player error.
    pub fn controls_enabled(&self) -> bool {
        self.session.is_some() && self.player.is_some() && self.state != SyncState::Uninitialized
    }

    pub fn has_previous(&self) -> bool {
        self.controls_enabled() && self.current_index > 0
    }

    pub fn has_next(&self) -> bool {
        self.controls_enabled() && self.current_index + 1 < self.playlist_length
    }

    pub fn active_timers(&self) -> usize {
        self.timers.active_count()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn spool_scene(&self) -> SpoolScene {
        self.geometry.scene(self.progress)
    }
}

impl<F: PlayerFactory> Drop for PlaybackSynchronizer<F> {
    fn drop(&mut self) {
        self.release_player();
    }
}
