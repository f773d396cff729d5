use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{ReplayError, ReplayResult};

/// Snapshot of the process-wide playback state.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackStatus {
    pub playing: bool,
    pub recording: bool,
    /// Seconds elapsed since the bound dataset's time origin, in
    /// `[0, duration)`.
    pub scrub_time: f64,
    pub duration: f64,
    pub dataset: Option<String>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            playing: false,
            recording: false,
            scrub_time: 0.0,
            duration: 0.0,
            dataset: None,
        }
    }
}

/// Shared handle to the single playback state instance.
///
/// Created once at startup and cloned into every component that reads or
/// writes it. All mutation goes through the setters here; readers either
/// poll [`get`](Self::get) or observe changes via
/// [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct PlaybackState {
    tx: Arc<watch::Sender<PlaybackStatus>>,
}

impl PlaybackState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PlaybackStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> PlaybackStatus {
        self.tx.borrow().clone()
    }

    /// Watch receiver that yields every state change, for UI bindings.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.tx.subscribe()
    }

    pub fn set_playing(&self, playing: bool) {
        self.tx.send_modify(|s| s.playing = playing);
    }

    pub fn set_recording(&self, recording: bool) {
        self.tx.send_modify(|s| s.recording = recording);
    }

    pub fn set_scrub_time(&self, scrub_time: f64) {
        self.tx.send_modify(|s| s.scrub_time = scrub_time);
    }

    pub fn set_duration(&self, duration: f64) {
        self.tx.send_modify(|s| s.duration = duration);
    }

    pub fn set_dataset(&self, dataset: Option<String>) {
        self.tx.send_modify(|s| s.dataset = dataset);
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock playback tuning.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackConfig {
    /// Multiplier from real elapsed seconds to simulated seconds. Must be
    /// finite and `> 0`. The default replays a capture at one-twelfth speed,
    /// which reads well for dense LiDAR sweeps.
    pub time_scale: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0 / 12.0,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> ReplayResult<()> {
        if !self.time_scale.is_finite() || self.time_scale <= 0.0 {
            return Err(ReplayError::validation(
                "playback time_scale must be finite and > 0",
            ));
        }
        Ok(())
    }

    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }
}

/// Coarse clock state, derived from the shared playback status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockState {
    /// No dataset bound.
    Idle,
    Paused,
    Playing,
}

/// Advances the scrub position under two regimes: wall-clock deltas scaled
/// by [`PlaybackConfig::time_scale`] during live playback, and fixed steps
/// when a capture session owns the clock.
pub struct PlaybackClock {
    state: PlaybackState,
    config: PlaybackConfig,
}

impl PlaybackClock {
    pub fn new(state: PlaybackState, config: PlaybackConfig) -> ReplayResult<Self> {
        config.validate()?;
        Ok(Self { state, config })
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn state(&self) -> ClockState {
        let status = self.state.get();
        if status.dataset.is_none() {
            ClockState::Idle
        } else if status.playing {
            ClockState::Playing
        } else {
            ClockState::Paused
        }
    }

    /// Start playback. Requires a bound dataset; a zero-duration dataset has
    /// nothing to play over, so the request is a logged no-op.
    pub fn play(&self) -> ReplayResult<()> {
        let status = self.state.get();
        if status.dataset.is_none() {
            return Err(ReplayError::no_active_scene("play requested"));
        }
        if status.recording {
            tracing::warn!("play ignored: capture session owns the clock");
            return Ok(());
        }
        if status.duration == 0.0 {
            tracing::warn!("play ignored: dataset has zero duration");
            return Ok(());
        }
        self.state.set_playing(true);
        Ok(())
    }

    /// Pause is always legal. During an active capture it only toggles the
    /// flag; the session advances by fixed steps regardless.
    pub fn pause(&self) {
        self.state.set_playing(false);
    }

    /// Per-scheduler-tick advancement under the wall clock. No-op unless
    /// playing. Returns `true` when the scrub wrapped past the end of the
    /// timeline (one loop completed).
    pub fn advance(&self, elapsed_real_secs: f64) -> bool {
        if self.state() != ClockState::Playing {
            return false;
        }
        self.advance_scrub(elapsed_real_secs * self.config.time_scale)
    }

    /// Fixed-step advancement for capture sessions. Ignores the playing
    /// flag; the session owns the clock while it runs.
    pub fn step_fixed(&self, step_secs: f64) -> ReplayResult<bool> {
        if self.state() == ClockState::Idle {
            return Err(ReplayError::no_active_scene("fixed step requested"));
        }
        Ok(self.advance_scrub(step_secs))
    }

    /// Advance the scrub by `delta` simulated seconds, wrapping modulo the
    /// duration. Reaching or crossing the end of the timeline is the sole
    /// loop-boundary signal; it must be detected before the modulo, because
    /// a step that is an exact multiple of the duration lands back on the
    /// previous scrub value and a post-hoc comparison would miss the loop.
    /// Zero-duration datasets never wrap by the arithmetic alone and are
    /// treated as already complete.
    fn advance_scrub(&self, delta: f64) -> bool {
        let status = self.state.get();
        if status.duration == 0.0 {
            return true;
        }
        let unwrapped = status.scrub_time + delta;
        let wrapped = unwrapped >= status.duration;
        self.state.set_scrub_time(unwrapped % status.duration);
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound_clock(duration: f64) -> (PlaybackState, PlaybackClock) {
        let state = PlaybackState::new();
        state.set_dataset(Some("001".into()));
        state.set_duration(duration);
        let clock = PlaybackClock::new(state.clone(), PlaybackConfig::default()).unwrap();
        (state, clock)
    }

    #[test]
    fn config_rejects_bad_time_scale() {
        assert!(PlaybackConfig::default().validate().is_ok());
        assert!(
            PlaybackConfig::default()
                .with_time_scale(0.0)
                .validate()
                .is_err()
        );
        assert!(
            PlaybackConfig::default()
                .with_time_scale(f64::NAN)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn play_requires_bound_dataset() {
        let state = PlaybackState::new();
        let clock = PlaybackClock::new(state, PlaybackConfig::default()).unwrap();
        assert_eq!(clock.state(), ClockState::Idle);
        assert!(matches!(
            clock.play(),
            Err(ReplayError::NoActiveScene(_))
        ));
    }

    #[test]
    fn play_on_zero_duration_is_a_noop() {
        let (state, clock) = bound_clock(0.0);
        clock.play().unwrap();
        assert!(!state.get().playing);
        assert_eq!(clock.state(), ClockState::Paused);
    }

    #[test]
    fn advance_is_a_noop_while_paused() {
        let (state, clock) = bound_clock(10.0);
        assert!(!clock.advance(1.0));
        assert_eq!(state.get().scrub_time, 0.0);
    }

    #[test]
    fn advance_zero_elapsed_is_idempotent() {
        let (state, clock) = bound_clock(10.0);
        clock.play().unwrap();
        clock.advance(12.0); // one simulated second at default scale
        let before = state.get().scrub_time;
        assert!(!clock.advance(0.0));
        assert_eq!(state.get().scrub_time, before);
    }

    #[test]
    fn advance_scales_real_time() {
        let (state, clock) = bound_clock(10.0);
        clock.play().unwrap();
        clock.advance(12.0);
        assert!((state.get().scrub_time - 1.0).abs() < 1e-9);
    }

    #[test]
    fn accumulated_advances_wrap_exactly_once_per_loop() {
        let (state, clock) = bound_clock(1.0);
        clock.play().unwrap();
        let mut wraps = 0;
        for _ in 0..30 {
            // 0.05 simulated seconds per tick.
            if clock.advance(0.6) {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 1);
        assert!(state.get().scrub_time < 1.0);
    }

    #[test]
    fn fixed_step_ignores_playing_flag_and_wraps() {
        let (state, clock) = bound_clock(0.25);
        assert!(!state.get().playing);
        assert!(!clock.step_fixed(0.1).unwrap());
        assert!(!clock.step_fixed(0.1).unwrap());
        assert!(clock.step_fixed(0.1).unwrap());
        assert!(state.get().scrub_time < 0.25);
    }

    #[test]
    fn fixed_step_equal_to_duration_wraps_on_first_step() {
        let (state, clock) = bound_clock(0.25);
        assert!(clock.step_fixed(0.25).unwrap());
        assert_eq!(state.get().scrub_time, 0.0);
    }

    #[test]
    fn fixed_step_dividing_duration_exactly_wraps_on_last_step() {
        let (state, clock) = bound_clock(0.5);
        assert!(!clock.step_fixed(0.25).unwrap());
        assert!(clock.step_fixed(0.25).unwrap());
        assert_eq!(state.get().scrub_time, 0.0);
    }

    #[test]
    fn fixed_step_on_zero_duration_reports_complete() {
        let (_state, clock) = bound_clock(0.0);
        assert!(clock.step_fixed(1.0 / 60.0).unwrap());
    }

    #[test]
    fn subscribers_observe_scrub_changes() {
        let (state, clock) = bound_clock(10.0);
        let rx = state.subscribe();
        clock.play().unwrap();
        clock.advance(1.0);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow().playing);
    }
}
