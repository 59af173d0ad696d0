// Workspace - Composition root of one sync session
//
// Owns the project draft, the recording session, the tick map and the
// playback controller. Inbound engine events are drained by pump_events();
// the host calls frame() once per display frame.

use crate::config::SyncConfig;
use crate::engine::{AudioEngine, ScoreRenderer};
use crate::error::{MediaKind, SyncError, SyncResult};
use crate::messaging::channels::{
    AudioEventConsumer, AudioEventProducer, NotificationConsumer, NotificationProducer,
    RendererEventConsumer, RendererEventProducer, create_audio_event_channel,
    create_notification_channel, create_renderer_event_channel,
};
use crate::messaging::event::{AudioEvent, LoadToken, LoadTracker, RendererEvent};
use crate::messaging::notification::{Notification, NotificationCategory, NotificationLevel};
use crate::playback::{CursorUpdate, FrameHandle, FrameOutcome, PlaybackController, SyncData};
use crate::project::{Embed, InterchangeDocument, MediaFile, Project, ProjectId, ProjectStore};
use crate::sync::marker::{Marker, MarkerStore};
use crate::sync::recording::{RecordingSession, TapOutcome};
use crate::sync::tick_map::{BarSpan, BarTickMap};
use chrono::{DateTime, Utc};
use ringbuf::traits::{Consumer, Producer};

/// Which lead offset the session resolves with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Marker capture; cursor tracks the audio exactly
    #[default]
    Editor,
    /// Playback only; cursor trails the audio slightly
    Preview,
}

/// Workspace side of the event and notification channels
pub struct WorkspaceChannels {
    pub audio_events: AudioEventConsumer,
    pub renderer_events: RendererEventConsumer,
    pub notifications: NotificationProducer,
}

/// Every channel endpoint a session needs, sized from the config
pub struct ChannelSet {
    /// Hand to the audio engine
    pub audio_events: AudioEventProducer,
    /// Hand to the score renderer
    pub renderer_events: RendererEventProducer,
    /// Hand to the workspace
    pub workspace: WorkspaceChannels,
    /// Read by the presentation layer
    pub notifications: NotificationConsumer,
}

impl ChannelSet {
    pub fn new(config: &SyncConfig) -> Self {
        let (audio_tx, audio_rx) = create_audio_event_channel(config.event_capacity);
        let (renderer_tx, renderer_rx) = create_renderer_event_channel(config.event_capacity);
        let (notify_tx, notify_rx) = create_notification_channel(config.notification_capacity);

        Self {
            audio_events: audio_tx,
            renderer_events: renderer_tx,
            workspace: WorkspaceChannels {
                audio_events: audio_rx,
                renderer_events: renderer_rx,
                notifications: notify_tx,
            },
            notifications: notify_rx,
        }
    }
}

/// Identity and metadata of the project being edited
#[derive(Debug, Clone, Default)]
struct Draft {
    id: Option<ProjectId>,
    title: String,
    artist: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

pub struct Workspace<A: AudioEngine, R: ScoreRenderer> {
    mode: Mode,
    config: SyncConfig,
    controller: PlaybackController<A, R>,
    session: RecordingSession,
    tick_map: Option<BarTickMap>,
    loads: LoadTracker,
    channels: WorkspaceChannels,
    draft: Draft,
    score: Option<MediaFile>,
    audio: Option<MediaFile>,
    pending_score: Option<MediaFile>,
    pending_audio: Option<MediaFile>,
    tracks: Vec<String>,
    /// Outcome of an engine-reported end of media, until the next frame
    media_end: Option<FrameOutcome>,
}

impl<A: AudioEngine, R: ScoreRenderer> Workspace<A, R> {
    /// Create a workspace bound to one audio engine and one renderer
    pub fn new(
        mode: Mode,
        config: SyncConfig,
        audio: A,
        renderer: R,
        channels: WorkspaceChannels,
    ) -> SyncResult<Self> {
        config.validate()?;
        let options = match mode {
            Mode::Editor => config.editor_options(),
            Mode::Preview => config.preview_options(),
        };
        let controller = PlaybackController::new(audio, renderer, options)?;

        Ok(Self {
            mode,
            config,
            controller,
            session: RecordingSession::new(),
            tick_map: None,
            loads: LoadTracker::new(),
            channels,
            draft: Draft::default(),
            score: None,
            audio: None,
            pending_score: None,
            pending_audio: None,
            tracks: Vec::new(),
            media_end: None,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch between editor and preview lead offsets
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        let lead = match mode {
            Mode::Editor => self.config.editor_lead_offset,
            Mode::Preview => self.config.preview_lead_offset,
        };
        self.controller.set_lead_offset(lead);
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn controller(&self) -> &PlaybackController<A, R> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<A, R> {
        &mut self.controller
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn markers(&self) -> &MarkerStore {
        self.session.markers()
    }

    pub fn tick_map(&self) -> Option<&BarTickMap> {
        self.tick_map.as_ref()
    }

    /// Score loaded and laid out
    pub fn is_score_ready(&self) -> bool {
        self.tick_map.is_some()
    }

    pub fn is_audio_ready(&self) -> bool {
        self.controller.duration().is_some()
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        self.draft.id
    }

    pub fn title(&self) -> &str {
        &self.draft.title
    }

    pub fn artist(&self) -> &str {
        &self.draft.artist
    }

    pub fn set_metadata(&mut self, title: impl Into<String>, artist: impl Into<String>) {
        self.draft.title = title.into();
        self.draft.artist = artist.into();
    }

    pub fn score_file(&self) -> Option<&MediaFile> {
        self.score.as_ref()
    }

    pub fn audio_file(&self) -> Option<&MediaFile> {
        self.audio.as_ref()
    }

    // ---- Media loading ----

    /// Hand score bytes to the renderer; supersedes any score load in flight
    pub fn load_score(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> LoadToken {
        let token = self.loads.begin(MediaKind::Score);
        log::info!("Loading score (load #{})", token.generation);
        self.controller.renderer_mut().load(&bytes, token);
        self.pending_score = Some(MediaFile::new(name, bytes));
        token
    }

    /// Hand audio bytes to the engine; supersedes any audio load in flight
    pub fn load_audio(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> LoadToken {
        let token = self.loads.begin(MediaKind::Audio);
        log::info!("Loading audio (load #{})", token.generation);
        self.controller.audio_mut().load(&bytes, token);
        self.pending_audio = Some(MediaFile::new(name, bytes));
        token
    }

    /// Choose which score tracks are displayed
    pub fn set_active_tracks(&mut self, indices: &[usize]) {
        self.controller.renderer_mut().set_active_tracks(indices);
    }

    /// Drain engine events; returns how many were processed
    pub fn pump_events(&mut self) -> usize {
        let mut processed = 0;

        while let Some(event) = self.channels.renderer_events.try_pop() {
            self.handle_renderer_event(event);
            processed += 1;
        }
        while let Some(event) = self.channels.audio_events.try_pop() {
            self.handle_audio_event(event);
            processed += 1;
        }

        processed
    }

    fn handle_renderer_event(&mut self, event: RendererEvent) {
        let token = event.token();
        if !self.loads.is_current(token) {
            log::debug!("Discarding stale renderer event for load #{}", token.generation);
            return;
        }

        match event {
            RendererEvent::ScoreLoaded {
                bar_count, tracks, ..
            } => {
                if let Some(score) = self.pending_score.take() {
                    self.score = Some(score);
                }
                self.tick_map = None;
                self.session.set_total_bars(Some(bar_count));
                self.tracks = tracks;
                self.notify(Notification::info(
                    NotificationCategory::Score,
                    format!("Score loaded: {} bars", bar_count),
                ));
            }
            RendererEvent::LayoutFinished { spans, .. } => self.install_layout(&spans),
            RendererEvent::Error { reason, .. } => {
                self.pending_score = None;
                let error = SyncError::load(MediaKind::Score, reason);
                self.notify(Notification::error(
                    NotificationCategory::Score,
                    error.to_string(),
                ));
            }
        }
    }

    fn install_layout(&mut self, spans: &[BarSpan]) {
        let bar_count = self
            .session
            .total_bars()
            .unwrap_or(spans.len() as u32);

        match BarTickMap::build(bar_count, spans) {
            Ok(map) => {
                log::info!("Tick map ready for {} bars", map.bar_count());
                self.tick_map = Some(map);
                if !self.controller.is_playing() {
                    let data = SyncData::new(self.session.markers(), self.tick_map.as_ref());
                    self.controller.refresh(data);
                }
            }
            Err(e) => {
                self.tick_map = None;
                self.notify(Notification::error(
                    NotificationCategory::Score,
                    e.to_string(),
                ));
            }
        }
    }

    fn handle_audio_event(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::Ready { token, duration } => {
                if !self.loads.is_current(token) {
                    log::debug!("Discarding stale audio load #{}", token.generation);
                    return;
                }
                if let Some(audio) = self.pending_audio.take() {
                    self.audio = Some(audio);
                }
                self.controller.reset_media();
                self.controller.set_duration(Some(duration));
                self.notify(Notification::info(
                    NotificationCategory::Audio,
                    format!("Audio loaded: {:.1}s", duration),
                ));
            }
            AudioEvent::Error { token, reason } => {
                if !self.loads.is_current(token) {
                    log::debug!("Discarding stale audio error #{}", token.generation);
                    return;
                }
                self.pending_audio = None;
                let error = SyncError::load(MediaKind::Audio, reason);
                self.notify(Notification::error(
                    NotificationCategory::Audio,
                    error.to_string(),
                ));
            }
            AudioEvent::TimeUpdate { seconds } => {
                log::trace!("Audio time {:.3}s", seconds);
            }
            AudioEvent::Ended => {
                let data = SyncData::new(self.session.markers(), self.tick_map.as_ref());
                let outcome = self.controller.handle_ended(data);
                if outcome != FrameOutcome::Idle {
                    self.media_end = Some(outcome);
                }
            }
        }
    }

    /// Per-frame update: drain events, then track the audio
    ///
    /// An end of media reported by the engine during this frame is returned
    /// as `Looped` or `Finished`.
    pub fn frame(&mut self) -> FrameOutcome {
        self.media_end = None;
        self.pump_events();
        if let Some(outcome) = self.media_end.take() {
            return outcome;
        }
        let data = SyncData::new(self.session.markers(), self.tick_map.as_ref());
        self.controller.frame(data)
    }

    // ---- Marker capture ----

    /// Mark the next bar at the current audio time
    pub fn tap(&mut self) -> SyncResult<TapOutcome> {
        let audio = self
            .controller
            .duration()
            .map(|duration| (self.controller.current_time(), duration));

        let outcome = self.session.tap(audio)?;
        if let TapOutcome::Ignored(reason) = outcome {
            self.notify(Notification::warning(
                NotificationCategory::Markers,
                format!("Tap ignored: {}", reason),
            ));
        }
        Ok(outcome)
    }

    /// Remove the last marker
    pub fn undo(&mut self) -> Option<Marker> {
        let removed = self.session.undo();
        if removed.is_none() {
            self.notify(Notification::info(
                NotificationCategory::Markers,
                "No marker to undo".to_string(),
            ));
        }
        self.refresh_if_idle();
        removed
    }

    /// Remove every marker; returns how many were removed
    pub fn clear(&mut self) -> usize {
        let removed = self.session.clear();
        self.refresh_if_idle();
        removed
    }

    fn refresh_if_idle(&mut self) {
        if !self.controller.is_playing() {
            let data = SyncData::new(self.session.markers(), self.tick_map.as_ref());
            self.controller.refresh(data);
        }
    }

    // ---- Transport ----

    pub fn play(&mut self) -> SyncResult<FrameHandle> {
        self.controller.play()
    }

    pub fn pause(&mut self) -> f64 {
        self.controller.pause()
    }

    pub fn stop(&mut self) -> Option<CursorUpdate> {
        let data = SyncData::new(self.session.markers(), self.tick_map.as_ref());
        self.controller.stop(data)
    }

    pub fn seek(&mut self, seconds: f64) -> Option<CursorUpdate> {
        let data = SyncData::new(self.session.markers(), self.tick_map.as_ref());
        self.controller.seek(seconds, data)
    }

    pub fn set_rate(&mut self, multiplier: f64) -> SyncResult<()> {
        self.controller.set_rate(multiplier)
    }

    pub fn set_volume(&mut self, level: f32) {
        self.controller.set_volume(level);
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.controller.toggle_loop()
    }

    pub fn previous_bar(&mut self) -> f64 {
        let data = SyncData::new(self.session.markers(), self.tick_map.as_ref());
        self.controller.previous_bar(data)
    }

    pub fn next_bar(&mut self) -> Option<f64> {
        let data = SyncData::new(self.session.markers(), self.tick_map.as_ref());
        self.controller.next_bar(data)
    }

    pub fn current_time(&self) -> f64 {
        self.controller.current_time()
    }

    // ---- Projects ----

    /// Snapshot of the session as a project
    ///
    /// # Errors
    /// `NotReady` until both score and audio finished loading.
    pub fn to_project(&self) -> SyncResult<Project> {
        let score = self.score.clone().ok_or(SyncError::NotReady("score"))?;
        let audio = self.audio.clone().ok_or(SyncError::NotReady("audio"))?;
        let total_bars = self
            .session
            .total_bars()
            .ok_or(SyncError::NotReady("score"))?;
        let audio_duration = self
            .controller
            .duration()
            .ok_or(SyncError::NotReady("audio"))?;

        Ok(Project {
            id: self.draft.id,
            title: self.draft.title.clone(),
            artist: self.draft.artist.clone(),
            score,
            audio,
            markers: self.session.markers().markers().to_vec(),
            total_bars,
            audio_duration,
            created_at: self.draft.created_at,
            updated_at: self.draft.updated_at,
        })
    }

    /// Save to `store`; failures are also raised as notifications
    pub fn save(&mut self, store: &ProjectStore) -> SyncResult<ProjectId> {
        let result = self
            .to_project()
            .and_then(|mut project| store.save(&mut project).map(|id| (id, project)));

        match result {
            Ok((id, project)) => {
                self.draft.id = Some(id);
                self.draft.created_at = project.created_at;
                self.draft.updated_at = project.updated_at;
                self.notify(Notification::info(
                    NotificationCategory::Storage,
                    format!("Saved '{}'", project.title),
                ));
                Ok(id)
            }
            Err(e) => {
                self.notify(Notification::error(
                    NotificationCategory::Storage,
                    format!("Save failed: {}", e),
                ));
                Err(e)
            }
        }
    }

    /// Load a stored project into the session
    pub fn open(&mut self, store: &ProjectStore, id: &str) -> SyncResult<()> {
        match store.load(id) {
            Ok(project) => self.open_project(project),
            Err(e) => {
                self.notify(Notification::error(
                    NotificationCategory::Storage,
                    format!("Could not open project: {}", e),
                ));
                Err(e)
            }
        }
    }

    /// Replace the session with `project`; media loads are started and
    /// complete through `pump_events`
    pub fn open_project(&mut self, project: Project) -> SyncResult<()> {
        let markers = MarkerStore::from_markers(project.markers)?;

        let data = SyncData::new(self.session.markers(), self.tick_map.as_ref());
        self.controller.stop(data);
        self.controller.reset_media();

        self.draft = Draft {
            id: project.id,
            title: project.title,
            artist: project.artist,
            created_at: project.created_at,
            updated_at: project.updated_at,
        };
        self.session =
            RecordingSession::with_markers(markers, Some(project.total_bars).filter(|&n| n > 0));
        self.tick_map = None;
        self.score = None;
        self.audio = None;
        self.tracks.clear();

        self.load_score(project.score.name, project.score.bytes);
        self.load_audio(project.audio.name, project.audio.bytes);
        Ok(())
    }

    /// Export the session as an interchange document
    pub fn export(&self, embed: Embed) -> SyncResult<InterchangeDocument> {
        Ok(InterchangeDocument::from_project(&self.to_project()?, embed))
    }

    /// Start a new unsaved session from an interchange document
    pub fn import(
        &mut self,
        document: InterchangeDocument,
        score_bytes: Option<Vec<u8>>,
        audio_bytes: Option<Vec<u8>>,
    ) -> SyncResult<()> {
        document.validate()?;
        let project = document.into_project(score_bytes, audio_bytes)?;
        self.open_project(project)
    }

    fn notify(&mut self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => log::info!("{}", notification.message),
            NotificationLevel::Warning => log::warn!("{}", notification.message),
            NotificationLevel::Error => log::error!("{}", notification.message),
        }
        if self.channels.notifications.try_push(notification).is_err() {
            log::warn!("Notification channel full, dropping notification");
        }
    }
}
