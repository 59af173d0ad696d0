// ClockEngine - Silent audio engine driven by a clock
// The playhead is media_anchor + (clock - clock_anchor) * rate, clamped to the duration

use crate::engine::AudioEngine;
use crate::engine::probe::probe_audio;
use crate::messaging::channels::AudioEventProducer;
use crate::messaging::event::{AudioEvent, LoadToken};
use ringbuf::traits::Producer;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic time source in seconds
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually advanced clock, shared between clones
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        self.seconds.set(self.seconds.get() + seconds);
    }

    pub fn set(&self, seconds: f64) {
        self.seconds.set(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.seconds.get()
    }
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    clock: f64,
    media: f64,
}

/// Audio engine that produces no sound, only a playhead
///
/// Loading probes the buffer for its duration and reports it through the
/// audio event channel, so it behaves like a real engine towards the
/// sync session.
pub struct ClockEngine<C: Clock> {
    clock: C,
    events: AudioEventProducer,
    duration: Option<f64>,
    rate: f64,
    volume: f32,
    position: f64,
    anchor: Option<Anchor>,
    ended_reported: bool,
}

impl<C: Clock> ClockEngine<C> {
    pub fn new(clock: C, events: AudioEventProducer) -> Self {
        Self {
            clock,
            events,
            duration: None,
            rate: 1.0,
            volume: 1.0,
            position: 0.0,
            anchor: None,
            ended_reported: false,
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    /// Emit time update / end-of-media events; call once per host frame
    pub fn poll(&mut self) {
        if self.anchor.is_none() {
            return;
        }
        let now = self.current_time();
        self.emit(AudioEvent::TimeUpdate { seconds: now });

        if let Some(duration) = self.duration
            && now >= duration
            && !self.ended_reported
        {
            self.ended_reported = true;
            self.position = duration;
            self.anchor = None;
            self.emit(AudioEvent::Ended);
        }
    }

    fn clamp(&self, seconds: f64) -> f64 {
        let upper = self.duration.unwrap_or(f64::MAX);
        seconds.clamp(0.0, upper)
    }

    fn emit(&mut self, event: AudioEvent) {
        if self.events.try_push(event).is_err() {
            log::warn!("Audio event channel full, dropping event");
        }
    }
}

impl<C: Clock> AudioEngine for ClockEngine<C> {
    /// A failed decode leaves the current media and playhead untouched
    fn load(&mut self, bytes: &[u8], token: LoadToken) {
        match probe_audio(bytes) {
            Ok(info) => {
                self.anchor = None;
                self.position = 0.0;
                self.ended_reported = false;
                self.duration = Some(info.duration);
                self.emit(AudioEvent::Ready {
                    token,
                    duration: info.duration,
                });
            }
            Err(e) => {
                self.emit(AudioEvent::Error {
                    token,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn play(&mut self, from_seconds: f64) {
        let media = self.clamp(from_seconds);
        self.position = media;
        self.ended_reported = false;
        self.anchor = Some(Anchor {
            clock: self.clock.now(),
            media,
        });
    }

    fn pause(&mut self) -> f64 {
        self.position = self.current_time();
        self.anchor = None;
        self.position
    }

    fn current_time(&self) -> f64 {
        match self.anchor {
            Some(anchor) => {
                let elapsed = (self.clock.now() - anchor.clock).max(0.0);
                self.clamp(anchor.media + elapsed * self.rate)
            }
            None => self.position,
        }
    }

    fn set_rate(&mut self, multiplier: f64) {
        if self.anchor.is_some() {
            // Re-anchor so the rate change only affects time from now on
            let media = self.current_time();
            self.anchor = Some(Anchor {
                clock: self.clock.now(),
                media,
            });
        }
        self.rate = multiplier;
    }

    fn set_volume(&mut self, level: f32) {
        self.volume = level.clamp(0.0, 1.0);
    }
}
