// HeadlessRenderer - Score renderer without a display
// Lays the score out from a metered layout and remembers where the cursor is

use crate::engine::{RenderError, ScoreRenderer};
use crate::messaging::channels::RendererEventProducer;
use crate::messaging::event::{LoadToken, RendererEvent};
use crate::score::layout::MeteredLayout;
use crate::sync::tick_map::Tick;
use ringbuf::traits::Producer;

pub struct HeadlessRenderer {
    layout: MeteredLayout,
    tracks: Vec<String>,
    events: RendererEventProducer,
    defer_layout: bool,
    pending_layout: Option<LoadToken>,
    active_tracks: Vec<usize>,
    cursor: Option<Tick>,
    cursor_moves: usize,
}

impl HeadlessRenderer {
    pub fn new(layout: MeteredLayout, events: RendererEventProducer) -> Self {
        Self {
            layout,
            tracks: vec!["Score".to_string()],
            events,
            defer_layout: false,
            pending_layout: None,
            active_tracks: vec![0],
            cursor: None,
            cursor_moves: 0,
        }
    }

    /// Hold `LayoutFinished` back until `finish_layout` is called
    pub fn with_deferred_layout(mut self) -> Self {
        self.defer_layout = true;
        self
    }

    pub fn with_tracks(mut self, tracks: Vec<String>) -> Self {
        self.tracks = tracks;
        self
    }

    /// Report the layout of the last loaded score
    pub fn finish_layout(&mut self) {
        if let Some(token) = self.pending_layout.take() {
            let spans = self.layout.spans();
            self.emit(RendererEvent::LayoutFinished { token, spans });
        }
    }

    /// Last cursor position that was accepted
    pub fn cursor(&self) -> Option<Tick> {
        self.cursor
    }

    /// How many cursor moves were accepted
    pub fn cursor_moves(&self) -> usize {
        self.cursor_moves
    }

    pub fn active_tracks(&self) -> &[usize] {
        &self.active_tracks
    }

    fn emit(&mut self, event: RendererEvent) {
        if self.events.try_push(event).is_err() {
            log::warn!("Renderer event channel full, dropping event");
        }
    }
}

impl ScoreRenderer for HeadlessRenderer {
    fn load(&mut self, bytes: &[u8], token: LoadToken) {
        self.cursor = None;
        self.pending_layout = None;

        if bytes.is_empty() {
            self.emit(RendererEvent::Error {
                token,
                reason: "score file is empty".to_string(),
            });
            return;
        }

        let bar_count = self.layout.bar_count();
        let tracks = self.tracks.clone();
        self.emit(RendererEvent::ScoreLoaded {
            token,
            bar_count,
            tracks,
        });

        self.pending_layout = Some(token);
        if !self.defer_layout {
            self.finish_layout();
        }
    }

    fn set_active_tracks(&mut self, indices: &[usize]) {
        self.active_tracks = indices
            .iter()
            .copied()
            .filter(|&i| i < self.tracks.len())
            .collect();
    }

    fn set_cursor_position(&mut self, position: Tick) -> Result<(), RenderError> {
        let end = self.layout.total_ticks();
        if position > end {
            return Err(RenderError {
                position,
                reason: format!("score ends at tick {}", end),
            });
        }
        self.cursor = Some(position);
        self.cursor_moves += 1;
        Ok(())
    }
}
