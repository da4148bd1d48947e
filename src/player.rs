//! Playback state for the floating music widget.
//!
//! A [`Player`] owns the one [`AudioSink`] it drives, so a sink can never be
//! shared by two widgets. All transitions are synchronous reactions to user
//! actions or media events:
//!
//! ```text
//! Idle --loaded--> Ready --toggle--> Playing <--toggle--> Paused
//! ```
//!
//! Display (expanded/collapsed) is independent of playback.

mod persist;

use std::time::Instant;

use thiserror::Error;

use crate::config::MusicInfo;

pub use self::persist::{Debounced, MemorySlot, PersistError, ResumeSlot, SavedPlayback};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("playback was blocked: {0}")]
    Blocked(String),
    #[error("audio source is unavailable: {0}")]
    Unavailable(String),
}

/// Platform audio output, e.g. a browser `<audio>` element.
pub trait AudioSink {
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn seek(&mut self, secs: f64);
    fn set_volume(&mut self, volume: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// No metadata yet.
    Idle,
    /// Duration known, never started.
    Ready,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Expanded,
    Collapsed,
}

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub volume: f64,
    pub looping: bool,
    pub save_interval: std::time::Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        PlayerOptions {
            volume: 0.7,
            looping: false,
            save_interval: std::time::Duration::from_secs(1),
        }
    }
}

impl PlayerOptions {
    pub fn save_interval_ms(&self) -> u128 {
        self.save_interval.as_millis()
    }
}

/// Settings for the configured track. An unusable volume falls back to the
/// default instead of muting the widget.
impl From<&MusicInfo> for PlayerOptions {
    fn from(info: &MusicInfo) -> Self {
        PlayerOptions {
            volume: if info.volume.is_finite() {
                clamp_unit(info.volume)
            } else {
                PlayerOptions::default().volume
            },
            looping: info.looping,
            save_interval: std::time::Duration::from_millis(info.save_interval_ms),
        }
    }
}

pub struct Player<S: AudioSink, P: ResumeSlot = MemorySlot> {
    sink: S,
    state: PlayState,
    display: DisplayMode,
    duration: Option<f64>,
    elapsed: f64,
    volume: f64,
    looping: bool,
    notice: Option<String>,
    saver: Option<Debounced<P>>,
    resume: Option<SavedPlayback>,
}

impl<S: AudioSink> Player<S> {
    pub fn new(sink: S, options: PlayerOptions) -> Self {
        Self::build(sink, options, None)
    }
}

impl<S: AudioSink, P: ResumeSlot> Player<S, P> {
    /// Player that saves its position to `slot` and resumes from it once
    /// metadata arrives. A slot that fails to load is ignored.
    pub fn with_resume(sink: S, options: PlayerOptions, mut slot: P) -> Self {
        let resume = match slot.load() {
            Ok(saved) => saved,
            Err(e) => {
                tracing::debug!("Ignoring unreadable playback slot: {e}");
                None
            }
        };
        let saver = Debounced::new(slot, options.save_interval);
        let mut player = Self::build(sink, options, Some(saver));
        player.resume = resume;
        player
    }

    fn build(mut sink: S, options: PlayerOptions, saver: Option<Debounced<P>>) -> Self {
        let volume = clamp_unit(options.volume);
        sink.set_volume(volume);
        Player {
            sink,
            state: PlayState::Idle,
            display: DisplayMode::default(),
            duration: None,
            elapsed: 0.0,
            volume,
            looping: options.looping,
            notice: None,
            saver,
            resume: None,
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn display(&self) -> DisplayMode {
        self.display
    }

    /// Last non-fatal playback problem, shown to the listener.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Elapsed over duration in `[0, 1]`, 0 while the duration is unknown.
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(duration) => clamp_unit(self.elapsed / duration),
            None => 0.0,
        }
    }

    pub fn loaded(&mut self, duration: f64) {
        if !duration.is_finite() || duration <= 0.0 {
            self.duration = None;
            return;
        }
        self.duration = Some(duration);
        if self.state == PlayState::Idle {
            self.state = PlayState::Ready;
        }
        if let Some(saved) = self.resume.take() {
            let at = saved.elapsed.clamp(0.0, duration);
            self.sink.seek(at);
            self.elapsed = at;
            if saved.playing {
                // Resuming is best-effort, a blocked autoplay just stays paused
                match self.sink.play() {
                    Ok(()) => self.state = PlayState::Playing,
                    Err(e) => {
                        tracing::debug!("Could not resume playback: {e}");
                        self.state = PlayState::Paused;
                    }
                }
            }
        }
    }

    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.sink.pause();
            self.state = PlayState::Paused;
            self.flush();
        } else {
            self.start();
        }
    }

    fn start(&mut self) {
        match self.sink.play() {
            Ok(()) => {
                self.notice = None;
                self.state = PlayState::Playing;
            }
            Err(e) => {
                self.notice = Some(e.to_string());
                self.state = PlayState::Paused;
            }
        }
    }

    pub fn time_update(&mut self, current: f64, now: Instant) {
        self.elapsed = if current.is_finite() && current >= 0.0 {
            current
        } else {
            0.0
        };
        let saved = self.snapshot();
        if let Some(saver) = self.saver.as_mut() {
            saver.record(saved, now);
        }
    }

    /// Jumps to `ratio` of the track. Play/pause state is untouched.
    /// Returns the new position, or `None` while the duration is unknown.
    pub fn seek_ratio(&mut self, ratio: f64) -> Option<f64> {
        let duration = self.duration?;
        if !ratio.is_finite() {
            return None;
        }
        let target = (ratio * duration).clamp(0.0, duration);
        self.sink.seek(target);
        self.elapsed = target;
        Some(target)
    }

    /// Seek from a pointer position over the progress track.
    pub fn seek_pointer(&mut self, pointer_x: f64, track_left: f64, track_width: f64) -> Option<f64> {
        if track_width <= 0.0 {
            return None;
        }
        self.seek_ratio((pointer_x - track_left) / track_width)
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = clamp_unit(volume);
        self.sink.set_volume(self.volume);
    }

    /// Volume on the 0..=100 scale.
    pub fn set_volume_percent(&mut self, percent: f64) {
        self.set_volume(percent / 100.0);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn ended(&mut self) {
        if self.looping {
            self.sink.seek(0.0);
            self.elapsed = 0.0;
            self.start();
        } else {
            self.state = PlayState::Paused;
        }
        self.flush();
    }

    pub fn toggle_display(&mut self) {
        self.display = match self.display {
            DisplayMode::Expanded => DisplayMode::Collapsed,
            DisplayMode::Collapsed => DisplayMode::Expanded,
        };
    }

    fn snapshot(&self) -> SavedPlayback {
        SavedPlayback {
            playing: self.is_playing(),
            elapsed: self.elapsed,
        }
    }

    fn flush(&mut self) {
        let saved = self.snapshot();
        if let Some(saver) = self.saver.as_mut() {
            saver.flush(saved);
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// `m:ss`; anything non-finite or negative renders as `0:00`.
pub fn format_time(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "0:00".to_owned();
    }
    let total = secs.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
