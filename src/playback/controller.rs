// PlaybackController - Drives the audio engine and the score cursor together
//
// State machine:
//   play():   Stopped | Paused -> Playing  (starts the frame loop)
//   pause():  Playing -> Paused            (keeps the position)
//   stop():   Playing | Paused -> Stopped  (position back to 0, cursor to bar 1)
//   end of media: Playing -> Playing from 0 when looping, Stopped otherwise
//
// Every frame while playing: read audio time, resolve, apply to the renderer.

use crate::engine::{AudioEngine, ScoreRenderer};
use crate::error::{SyncError, SyncResult};
use crate::playback::scheduler::{FrameHandle, FrameScheduler};
use crate::playback::transport::{PlayState, TransportState, validate_rate};
use crate::sync::marker::MarkerStore;
use crate::sync::resolver::{
    DEFAULT_JITTER_TICKS, EmissionFilter, PositionResolver, Resolution, SymbolicPosition,
};
use crate::sync::tick_map::{BarTickMap, Tick};

/// Default minimum distance to the active marker when stepping bars
pub const DEFAULT_STEP_DEBOUNCE: f64 = 0.1;

/// Read-only sync data the controller resolves against
#[derive(Debug, Clone, Copy)]
pub struct SyncData<'a> {
    pub markers: &'a MarkerStore,
    /// `None` until the renderer finished laying the score out
    pub ticks: Option<&'a BarTickMap>,
}

impl<'a> SyncData<'a> {
    pub fn new(markers: &'a MarkerStore, ticks: Option<&'a BarTickMap>) -> Self {
        Self { markers, ticks }
    }
}

/// Cursor change that was pushed to the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CursorUpdate {
    /// Parked at the start of the score (before the first marker, or stopped)
    Start(Tick),
    At(SymbolicPosition),
}

impl CursorUpdate {
    pub fn position(&self) -> Tick {
        match self {
            CursorUpdate::Start(tick) => *tick,
            CursorUpdate::At(pos) => pos.position,
        }
    }

    pub fn bar(&self) -> u32 {
        match self {
            CursorUpdate::Start(_) => 1,
            CursorUpdate::At(pos) => pos.bar,
        }
    }
}

/// What one frame did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Not playing, nothing scheduled
    Idle,
    /// Cursor tracked the audio (the update is `None` when damped)
    Tracked(Option<CursorUpdate>),
    /// End of media reached while looping; restarted from 0
    Looped,
    /// End of media reached; transport stopped
    Finished,
}

/// Tunables of one controller instance
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackOptions {
    pub lead_offset: f64,
    pub jitter_threshold: Tick,
    pub step_debounce: f64,
    pub rate: f64,
    pub volume: f32,
    pub looping: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            lead_offset: 0.0,
            jitter_threshold: DEFAULT_JITTER_TICKS,
            step_debounce: DEFAULT_STEP_DEBOUNCE,
            rate: 1.0,
            volume: 1.0,
            looping: false,
        }
    }
}

/// Transport owner and per-frame sync driver, bound to one audio engine and
/// one renderer
pub struct PlaybackController<A: AudioEngine, R: ScoreRenderer> {
    audio: A,
    renderer: R,
    transport: TransportState,
    resolver: PositionResolver,
    filter: EmissionFilter,
    scheduler: FrameScheduler,
    duration: Option<f64>,
    step_debounce: f64,
    last_resolution: Option<Resolution>,
}

impl<A: AudioEngine, R: ScoreRenderer> PlaybackController<A, R> {
    /// Create a controller
    ///
    /// # Errors
    /// `InvalidRate` if `options.rate` is not a positive number.
    pub fn new(audio: A, renderer: R, options: PlaybackOptions) -> SyncResult<Self> {
        let transport = TransportState::new(options.rate, options.volume, options.looping)?;
        Ok(Self {
            audio,
            renderer,
            transport,
            resolver: PositionResolver::new(options.lead_offset),
            filter: EmissionFilter::new(options.jitter_threshold),
            scheduler: FrameScheduler::new(),
            duration: None,
            step_debounce: options.step_debounce.max(0.0),
            last_resolution: None,
        })
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    pub fn state(&self) -> PlayState {
        self.transport.state
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.transport.looping
    }

    pub fn lead_offset(&self) -> f64 {
        self.resolver.lead_offset()
    }

    pub fn set_lead_offset(&mut self, lead_offset: f64) {
        self.resolver = PositionResolver::new(lead_offset);
    }

    /// Duration of the loaded audio, if any
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Handle of the running frame loop
    pub fn frame_handle(&self) -> Option<FrameHandle> {
        self.scheduler.active()
    }

    /// Resolution computed by the most recent frame/seek
    pub fn last_resolution(&self) -> Option<Resolution> {
        self.last_resolution
    }

    /// Current audio position in seconds
    pub fn current_time(&self) -> f64 {
        if self.transport.is_playing() {
            self.audio.current_time()
        } else {
            self.transport.position
        }
    }

    /// Forget the current audio ahead of a new load
    pub fn reset_media(&mut self) {
        if self.transport.is_playing() {
            self.audio.pause();
        }
        self.scheduler.cancel();
        self.transport.state = PlayState::Stopped;
        self.transport.position = 0.0;
        self.duration = None;
        self.filter.reset();
        self.last_resolution = None;
    }

    /// Record the duration reported by the audio engine
    pub fn set_duration(&mut self, duration: Option<f64>) {
        self.duration = duration.filter(|d| d.is_finite() && *d >= 0.0);
        if let Some(d) = self.duration
            && self.transport.position > d
        {
            self.transport.position = d;
        }
    }

    /// Start or resume playback from the stored position
    ///
    /// # Errors
    /// `NotReady` when no audio is loaded.
    pub fn play(&mut self) -> SyncResult<FrameHandle> {
        let duration = self.duration.ok_or(SyncError::NotReady("audio"))?;

        if self.transport.is_playing()
            && let Some(handle) = self.scheduler.active()
        {
            return Ok(handle);
        }

        if self.transport.position >= duration {
            self.transport.position = 0.0;
        }

        self.audio.set_rate(self.transport.rate);
        self.audio.set_volume(self.transport.volume);
        self.audio.play(self.transport.position);
        self.transport.state = PlayState::Playing;

        let handle = self.scheduler.start();
        log::info!(
            "Playback started at {:.3}s (rate {:.2})",
            self.transport.position,
            self.transport.rate
        );
        Ok(handle)
    }

    /// Pause, keeping the position as resume point; returns that position
    pub fn pause(&mut self) -> f64 {
        if !self.transport.is_playing() {
            return self.transport.position;
        }

        let position = self.audio.pause();
        self.transport.position = position;
        self.transport.state = PlayState::Paused;
        self.scheduler.cancel();
        log::info!("Playback paused at {:.3}s", position);
        position
    }

    /// Toggle play/pause
    pub fn toggle_play(&mut self) -> SyncResult<()> {
        if self.transport.is_playing() {
            self.pause();
        } else {
            self.play()?;
        }
        Ok(())
    }

    /// Stop playback, rewind to 0 and park the cursor at the score start
    pub fn stop(&mut self, data: SyncData<'_>) -> Option<CursorUpdate> {
        if self.transport.is_playing() {
            self.audio.pause();
        }
        self.scheduler.cancel();
        self.transport.state = PlayState::Stopped;
        self.transport.position = 0.0;
        self.filter.reset();
        self.last_resolution = None;
        log::info!("Playback stopped");

        let ticks = data.ticks?;
        let start = ticks.score_start();
        self.filter.admit_start();
        self.place_cursor(start);
        Some(CursorUpdate::Start(start))
    }

    /// Jump to `time` (clamped to the audio) and re-apply the cursor right away
    pub fn seek(&mut self, time: f64, data: SyncData<'_>) -> Option<CursorUpdate> {
        let time = if time.is_finite() { time } else { 0.0 };
        let target = match self.duration {
            Some(duration) => time.clamp(0.0, duration),
            None => time.max(0.0),
        };

        if self.transport.is_playing() {
            self.audio.pause();
            self.audio.play(target);
        }
        self.transport.position = target;
        log::debug!("Seek to {:.3}s", target);

        self.apply(target, data, true)
    }

    /// Change the playback rate live
    ///
    /// # Errors
    /// `InvalidRate` if `multiplier` is not a positive number.
    pub fn set_rate(&mut self, multiplier: f64) -> SyncResult<()> {
        validate_rate(multiplier)?;
        self.transport.rate = multiplier;
        self.audio.set_rate(multiplier);
        Ok(())
    }

    pub fn set_volume(&mut self, level: f32) {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        self.transport.volume = level;
        self.audio.set_volume(level);
    }

    /// Flip looping; returns the new state
    pub fn toggle_loop(&mut self) -> bool {
        self.transport.looping = !self.transport.looping;
        self.transport.looping
    }

    /// Seek to the closest marker before the current time, skipping the
    /// marker that was just passed; rewinds to 0 when there is none
    pub fn previous_bar(&mut self, data: SyncData<'_>) -> f64 {
        let now = self.current_time();
        let target = data
            .markers
            .time_before(now, self.step_debounce)
            .unwrap_or(0.0);
        self.seek(target, data);
        target
    }

    /// Seek to the closest marker after the current time; `None` when there
    /// is no later marker
    pub fn next_bar(&mut self, data: SyncData<'_>) -> Option<f64> {
        let now = self.current_time();
        let target = data.markers.time_after(now, self.step_debounce)?;
        self.seek(target, data);
        Some(target)
    }

    /// Per-frame update, only does work while playing
    pub fn frame(&mut self, data: SyncData<'_>) -> FrameOutcome {
        if !self.transport.is_playing() || !self.scheduler.begin_frame() {
            return FrameOutcome::Idle;
        }

        let now = self.audio.current_time();
        if let Some(duration) = self.duration
            && now >= duration
        {
            self.apply(duration, data, false);
            return self.finish_media(data);
        }

        FrameOutcome::Tracked(self.apply(now, data, false))
    }

    /// Frame driven by an explicit handle; stale handles do nothing
    pub fn frame_with(&mut self, handle: FrameHandle, data: SyncData<'_>) -> FrameOutcome {
        if !self.scheduler.is_active(handle) {
            return FrameOutcome::Idle;
        }
        self.frame(data)
    }

    /// The audio engine reported end of media
    pub fn handle_ended(&mut self, data: SyncData<'_>) -> FrameOutcome {
        if !self.transport.is_playing() {
            return FrameOutcome::Idle;
        }
        self.finish_media(data)
    }

    /// Re-resolve at the current time and re-apply unconditionally
    ///
    /// Used when markers or the tick map change under a paused transport.
    pub fn refresh(&mut self, data: SyncData<'_>) -> Option<CursorUpdate> {
        let now = self.current_time();
        self.apply(now, data, true)
    }

    fn finish_media(&mut self, data: SyncData<'_>) -> FrameOutcome {
        if self.transport.looping {
            log::debug!("End of media, looping");
            // Still playing here, so seek restarts the engine at 0
            self.seek(0.0, data);
            FrameOutcome::Looped
        } else {
            log::info!("End of media");
            self.stop(data);
            FrameOutcome::Finished
        }
    }

    fn apply(&mut self, time: f64, data: SyncData<'_>, force: bool) -> Option<CursorUpdate> {
        let resolution = self
            .resolver
            .resolve(time, data.markers, data.ticks, self.duration);
        self.last_resolution = Some(resolution);

        if force {
            self.filter.reset();
        }

        match resolution {
            Resolution::PreSync => {
                let ticks = data.ticks?;
                if !self.filter.admit_start() {
                    return None;
                }
                let start = ticks.score_start();
                self.place_cursor(start);
                Some(CursorUpdate::Start(start))
            }
            Resolution::Unmapped(progress) => {
                log::trace!("Bar {} has no tick range yet", progress.bar);
                None
            }
            Resolution::Located(position) => {
                if !self.filter.admit(&position) {
                    return None;
                }
                self.place_cursor(position.position);
                Some(CursorUpdate::At(position))
            }
        }
    }

    fn place_cursor(&mut self, position: Tick) {
        if let Err(e) = self.renderer.set_cursor_position(position) {
            log::debug!("Ignoring cursor error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::probe::tests::wav_bytes;
    use crate::engine::{ClockEngine, HeadlessRenderer, ManualClock};
    use crate::error::MediaKind;
    use crate::messaging::channels::{create_audio_event_channel, create_renderer_event_channel};
    use crate::messaging::event::LoadToken;
    use crate::score::layout::{MeteredLayout, TimeSignature};

    type TestController = PlaybackController<ClockEngine<ManualClock>, HeadlessRenderer>;

    struct Fixture {
        controller: TestController,
        clock: ManualClock,
        markers: MarkerStore,
        ticks: BarTickMap,
    }

    impl Fixture {
        fn frame(&mut self) -> FrameOutcome {
            let data = SyncData::new(&self.markers, Some(&self.ticks));
            self.controller.frame(data)
        }

        fn seek(&mut self, time: f64) -> Option<CursorUpdate> {
            let data = SyncData::new(&self.markers, Some(&self.ticks));
            self.controller.seek(time, data)
        }
    }

    /// 4 bars of 4/4, tapped at 0, 2, 4.1 and 6 seconds of 8s audio
    fn fixture(options: PlaybackOptions) -> Fixture {
        let clock = ManualClock::new();
        let (audio_tx, _audio_rx) = create_audio_event_channel(64);
        let (score_tx, _score_rx) = create_renderer_event_channel(64);
        let layout = MeteredLayout::uniform(4, TimeSignature::four_four());
        let ticks = BarTickMap::build(4, &layout.spans()).unwrap();

        let mut audio = ClockEngine::new(clock.clone(), audio_tx);
        audio.load(
            &wav_bytes(8.0, 8000, 1),
            LoadToken {
                kind: MediaKind::Audio,
                generation: 1,
            },
        );
        let renderer = HeadlessRenderer::new(layout, score_tx);

        let mut controller = PlaybackController::new(audio, renderer, options).unwrap();
        controller.set_duration(Some(8.0));

        let mut markers = MarkerStore::new();
        for (i, t) in [0.0, 2.0, 4.1, 6.0].into_iter().enumerate() {
            markers.append(i as u32 + 1, t, 8.0).unwrap();
        }

        Fixture {
            controller,
            clock,
            markers,
            ticks,
        }
    }

    #[test]
    fn test_play_pause_stop_transitions() {
        let mut f = fixture(PlaybackOptions::default());
        assert_eq!(f.controller.state(), PlayState::Stopped);

        f.controller.play().unwrap();
        assert_eq!(f.controller.state(), PlayState::Playing);
        assert!(f.controller.frame_handle().is_some());

        f.clock.advance(1.5);
        let at = f.controller.pause();
        assert!((at - 1.5).abs() < 1e-9);
        assert_eq!(f.controller.state(), PlayState::Paused);
        assert!(f.controller.frame_handle().is_none());

        // Paused position does not drift
        f.clock.advance(3.0);
        assert!((f.controller.current_time() - 1.5).abs() < 1e-9);

        f.controller.play().unwrap();
        f.clock.advance(0.5);
        assert!((f.controller.current_time() - 2.0).abs() < 1e-9);

        let data = SyncData::new(&f.markers, Some(&f.ticks));
        let update = f.controller.stop(data);
        assert_eq!(update, Some(CursorUpdate::Start(0)));
        assert_eq!(f.controller.state(), PlayState::Stopped);
        assert_eq!(f.controller.current_time(), 0.0);
        assert_eq!(f.controller.renderer().cursor(), Some(0));
    }

    #[test]
    fn test_play_without_audio() {
        let mut f = fixture(PlaybackOptions::default());
        f.controller.reset_media();
        assert!(matches!(
            f.controller.play(),
            Err(SyncError::NotReady("audio"))
        ));
    }

    #[test]
    fn test_frame_tracks_audio() {
        let mut f = fixture(PlaybackOptions::default());
        assert_eq!(f.frame(), FrameOutcome::Idle);

        f.controller.play().unwrap();
        f.clock.advance(3.0);

        match f.frame() {
            FrameOutcome::Tracked(Some(CursorUpdate::At(pos))) => {
                assert_eq!(pos.bar, 2);
                assert!((pos.progress - 1.0 / 2.1).abs() < 1e-9);
                assert_eq!(pos.position, 1920 + (1920.0 * pos.progress).round() as u64);
            }
            other => panic!("unexpected frame outcome {:?}", other),
        }
        assert_eq!(f.controller.last_resolution().and_then(|r| r.bar()), Some(2));
    }

    #[test]
    fn test_frames_are_damped() {
        let mut f = fixture(PlaybackOptions::default());
        f.controller.play().unwrap();

        f.clock.advance(2.5);
        assert!(matches!(f.frame(), FrameOutcome::Tracked(Some(_))));

        // 1ms later the cursor moves by ~1 tick: damped
        f.clock.advance(0.001);
        assert_eq!(f.frame(), FrameOutcome::Tracked(None));

        // 0.3s later it moved by ~270 ticks: applied
        f.clock.advance(0.3);
        assert!(matches!(f.frame(), FrameOutcome::Tracked(Some(_))));
    }

    #[test]
    fn test_seek_while_playing_applies_immediately() {
        let mut f = fixture(PlaybackOptions::default());
        f.controller.play().unwrap();
        f.clock.advance(1.0);

        let update = f.seek(3.0).expect("seek must apply the cursor");
        assert_eq!(update.bar(), 2);
        assert!((f.controller.audio().current_time() - 3.0).abs() < 1e-9);
        assert!(f.controller.is_playing());
        assert_eq!(f.controller.renderer().cursor(), Some(update.position()));

        // A second seek to the same spot is not damped
        assert!(f.seek(3.0).is_some());
    }

    #[test]
    fn test_seek_clamps_to_audio() {
        let mut f = fixture(PlaybackOptions::default());
        f.seek(100.0);
        assert_eq!(f.controller.current_time(), 8.0);
        f.seek(-5.0);
        assert_eq!(f.controller.current_time(), 0.0);
        f.seek(f64::NAN);
        assert_eq!(f.controller.current_time(), 0.0);
    }

    #[test]
    fn test_pre_sync_parks_cursor_at_start() {
        let mut f = fixture(PlaybackOptions {
            lead_offset: -0.5,
            ..PlaybackOptions::default()
        });
        let update = f.seek(0.2);
        assert_eq!(update, Some(CursorUpdate::Start(0)));
        assert_eq!(f.controller.last_resolution(), Some(Resolution::PreSync));
    }

    #[test]
    fn test_end_of_media_stops() {
        let mut f = fixture(PlaybackOptions::default());
        f.controller.play().unwrap();
        f.clock.advance(9.0);

        assert_eq!(f.frame(), FrameOutcome::Finished);
        assert_eq!(f.controller.state(), PlayState::Stopped);
        assert_eq!(f.controller.current_time(), 0.0);
        assert!(f.controller.frame_handle().is_none());
    }

    #[test]
    fn test_end_of_media_loops() {
        let mut f = fixture(PlaybackOptions::default());
        assert!(f.controller.toggle_loop());
        f.controller.play().unwrap();
        f.clock.advance(9.0);

        assert_eq!(f.frame(), FrameOutcome::Looped);
        assert!(f.controller.is_playing());
        assert!(f.controller.current_time().abs() < 1e-9);

        f.clock.advance(1.0);
        assert!(matches!(f.frame(), FrameOutcome::Tracked(_)));
        assert_eq!(f.controller.last_resolution().and_then(|r| r.bar()), Some(1));
    }

    #[test]
    fn test_ended_event_handling() {
        let mut f = fixture(PlaybackOptions::default());
        let data = SyncData::new(&f.markers, Some(&f.ticks));
        assert_eq!(f.controller.handle_ended(data), FrameOutcome::Idle);

        f.controller.play().unwrap();
        let data = SyncData::new(&f.markers, Some(&f.ticks));
        assert_eq!(f.controller.handle_ended(data), FrameOutcome::Finished);
    }

    #[test]
    fn test_set_rate() {
        let mut f = fixture(PlaybackOptions::default());
        assert!(matches!(
            f.controller.set_rate(0.0),
            Err(SyncError::InvalidRate(_))
        ));
        assert!(f.controller.set_rate(-2.0).is_err());

        f.controller.play().unwrap();
        f.controller.set_rate(0.5).unwrap();
        f.clock.advance(2.0);
        assert!((f.controller.current_time() - 1.0).abs() < 1e-9);
        assert_eq!(f.controller.transport().rate, 0.5);
    }

    #[test]
    fn test_volume_clamped() {
        let mut f = fixture(PlaybackOptions::default());
        f.controller.set_volume(1.7);
        assert_eq!(f.controller.transport().volume, 1.0);
        assert_eq!(f.controller.audio().volume(), 1.0);
    }

    #[test]
    fn test_bar_stepping() {
        let mut f = fixture(PlaybackOptions::default());

        f.seek(2.05);
        // Within the debounce of bar 2: step back to bar 1
        let data = SyncData::new(&f.markers, Some(&f.ticks));
        assert_eq!(f.controller.previous_bar(data), 0.0);

        f.seek(3.0);
        let data = SyncData::new(&f.markers, Some(&f.ticks));
        assert_eq!(f.controller.previous_bar(data), 2.0);

        let data = SyncData::new(&f.markers, Some(&f.ticks));
        assert_eq!(f.controller.next_bar(data), Some(4.1));

        f.seek(6.0);
        let data = SyncData::new(&f.markers, Some(&f.ticks));
        assert_eq!(f.controller.next_bar(data), None);
        assert_eq!(f.controller.current_time(), 6.0);
    }

    #[test]
    fn test_stale_frame_handle_is_ignored() {
        let mut f = fixture(PlaybackOptions::default());
        let first = f.controller.play().unwrap();
        f.controller.pause();
        let second = f.controller.play().unwrap();
        f.clock.advance(1.0);

        let data = SyncData::new(&f.markers, Some(&f.ticks));
        assert_eq!(f.controller.frame_with(first, data), FrameOutcome::Idle);
        let data = SyncData::new(&f.markers, Some(&f.ticks));
        assert!(matches!(
            f.controller.frame_with(second, data),
            FrameOutcome::Tracked(_)
        ));
    }

    #[test]
    fn test_frame_without_tick_map_is_ignored() {
        let mut f = fixture(PlaybackOptions::default());
        f.controller.play().unwrap();
        f.clock.advance(1.0);

        let markers = f.markers.clone();
        let outcome = f.controller.frame(SyncData::new(&markers, None));
        assert_eq!(outcome, FrameOutcome::Tracked(None));
        assert!(f.controller.renderer().cursor().is_none());
    }
}
