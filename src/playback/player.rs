use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::data::classify::GroupKey;
use crate::data::model::{Sample, Series, SubjectId};

// ---------------------------------------------------------------------------
// Tracks – what a player animates
// ---------------------------------------------------------------------------

/// Who a track's samples belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackLabel {
    Subject(SubjectId),
    Group(GroupKey),
}

impl fmt::Display for TrackLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackLabel::Subject(id) => write!(f, "Subject {id}"),
            TrackLabel::Group(g) => write!(f, "{g}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub label: TrackLabel,
    pub series: Arc<Series>,
}

impl Track {
    pub fn new(label: TrackLabel, series: Arc<Series>) -> Self {
        Track { label, series }
    }
}

// ---------------------------------------------------------------------------
// Frames – what one tick hands to renderers
// ---------------------------------------------------------------------------

/// The visible part of one track.
#[derive(Debug, Clone, Copy)]
pub struct TrackWindow<'a> {
    pub label: TrackLabel,
    pub visible: &'a [Sample],
}

impl<'a> TrackWindow<'a> {
    /// Newest visible sample.
    pub fn latest(&self) -> Option<&'a Sample> {
        self.visible.last()
    }
}

/// Output of one tick.
#[derive(Debug, Clone)]
pub struct WindowFrame<'a> {
    /// Left edge of the window (the playback time this frame shows).
    pub start: f64,
    pub window_size: f64,
    /// Whether playback wrapped back to zero during this tick.
    pub wrapped: bool,
    pub tracks: Vec<TrackWindow<'a>>,
}

impl<'a> WindowFrame<'a> {
    pub fn end(&self) -> f64 {
        self.start + self.window_size
    }

    /// Whether no track has anything to show.
    pub fn is_empty(&self) -> bool {
        self.tracks.iter().all(|t| t.visible.is_empty())
    }

    /// The first track, which drives readouts and breath detection.
    pub fn primary(&self) -> Option<&TrackWindow<'a>> {
        self.tracks.first()
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum PlaybackError {
    #[error("window size must be positive, got {0}")]
    InvalidWindow(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Running,
    Cancelled,
}

/// Playback position, mutated only by [`WindowedPlayer::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub current_time: f64,
    pub window_size: f64,
    pub speed: f64,
}

/// Slides a fixed-width time window over one or more series, one step per
/// frame, wrapping to zero once every track has run out of samples.
///
/// The player never schedules anything itself: the caller ticks it once per
/// frame and asks for another frame while [`is_running`](Self::is_running).
#[derive(Debug)]
pub struct WindowedPlayer {
    state: PlayerState,
    tracks: Vec<Track>,
    playback: PlaybackState,
    base_step: f64,
    run_id: u64,
    wraps: u64,
}

impl WindowedPlayer {
    /// `base_step` is how far playback advances per frame at speed 1.
    pub fn new(base_step: f64) -> Self {
        WindowedPlayer {
            state: PlayerState::Idle,
            tracks: Vec::new(),
            playback: PlaybackState {
                current_time: 0.0,
                window_size: 1.0,
                speed: 1.0,
            },
            base_step,
            run_id: 0,
            wraps: 0,
        }
    }

    /// Start a new run from time zero, cancelling any run in progress.
    /// Returns the id of the new run.
    pub fn start(
        &mut self,
        tracks: Vec<Track>,
        window_size: f64,
        speed: f64,
    ) -> Result<u64, PlaybackError> {
        if !(window_size > 0.0) {
            return Err(PlaybackError::InvalidWindow(window_size));
        }
        self.cancel();

        self.tracks = tracks;
        self.playback = PlaybackState {
            current_time: 0.0,
            window_size,
            speed: 1.0,
        };
        self.set_speed(speed);
        self.wraps = 0;
        self.run_id += 1;
        self.state = PlayerState::Running;
        log::debug!(
            "player run {} started with {} tracks, window {window_size}s",
            self.run_id,
            self.tracks.len()
        );
        Ok(self.run_id)
    }

    /// Stop the current run. Calling it again has no further effect.
    pub fn cancel(&mut self) {
        if self.state == PlayerState::Running {
            log::debug!("player run {} cancelled", self.run_id);
            self.state = PlayerState::Cancelled;
        }
    }

    /// Change the speed multiplier used from the next tick on.
    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_nan() {
            return;
        }
        self.playback.speed = speed.max(0.0);
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlayerState::Running
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// How often the current run has wrapped back to zero.
    pub fn wraps(&self) -> u64 {
        self.wraps
    }

    /// Advance one frame.
    ///
    /// Returns `None` unless running. When nothing is visible at the current
    /// time, playback restarts from zero within this same tick.
    pub fn tick(&mut self) -> Option<WindowFrame<'_>> {
        if self.state != PlayerState::Running {
            return None;
        }

        let window = self.playback.window_size;
        let mut start = self.playback.current_time;
        let mut wrapped = false;
        if !self.any_visible(start) {
            start = 0.0;
            wrapped = true;
            self.wraps += 1;
            log::debug!("player run {} wrapped to 0", self.run_id);
        }
        self.playback.current_time = start + self.base_step * self.playback.speed;

        let tracks = self
            .tracks
            .iter()
            .map(|t| TrackWindow {
                label: t.label,
                visible: t.series.window(start, window),
            })
            .collect();

        Some(WindowFrame {
            start,
            window_size: window,
            wrapped,
            tracks,
        })
    }

    fn any_visible(&self, start: f64) -> bool {
        self.tracks
            .iter()
            .any(|t| !t.series.window(start, self.playback.window_size).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(times: &[f64]) -> Arc<Series> {
        Arc::new(
            times
                .iter()
                .map(|&time| Sample {
                    time,
                    ..Default::default()
                })
                .collect(),
        )
    }

    fn subject(times: &[f64]) -> Vec<Track> {
        vec![Track::new(TrackLabel::Subject(SubjectId(1)), series(times))]
    }

    fn visible_times(frame: &WindowFrame<'_>) -> Vec<f64> {
        frame.tracks[0].visible.iter().map(|s| s.time).collect()
    }

    #[test]
    fn slides_window_by_step() {
        let mut player = WindowedPlayer::new(1.0);
        player.start(subject(&[0.0, 1.0, 2.0, 3.0, 4.0]), 2.0, 1.0).unwrap();

        let frame = player.tick().unwrap();
        assert_eq!(visible_times(&frame), vec![0.0, 1.0, 2.0]);
        assert!(!frame.wrapped);

        let frame = player.tick().unwrap();
        assert_eq!(frame.start, 1.0);
        assert_eq!(visible_times(&frame), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn wraps_to_zero_within_the_same_tick() {
        let mut player = WindowedPlayer::new(3.0);
        player.start(subject(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]), 10.0, 1.0).unwrap();

        player.tick().unwrap(); // t = 0
        player.tick().unwrap(); // t = 3
        assert_eq!(player.playback().current_time, 6.0);

        let frame = player.tick().unwrap();
        assert!(frame.wrapped);
        assert_eq!(frame.start, 0.0);
        assert!(!frame.is_empty());
        assert_eq!(player.wraps(), 1);
        assert_eq!(player.playback().current_time, 3.0);
    }

    #[test]
    fn empty_series_yields_empty_frames_without_looping() {
        let mut player = WindowedPlayer::new(0.02);
        player.start(subject(&[]), 10.0, 1.0).unwrap();
        let frame = player.tick().unwrap();
        assert!(frame.is_empty());
        assert!(frame.wrapped);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut player = WindowedPlayer::new(0.02);
        player.start(subject(&[0.0]), 10.0, 1.0).unwrap();

        player.cancel();
        let once = (player.state(), *player.playback(), player.run_id());
        player.cancel();
        let twice = (player.state(), *player.playback(), player.run_id());

        assert_eq!(once, twice);
        assert_eq!(player.state(), PlayerState::Cancelled);
        assert!(player.tick().is_none());
    }

    #[test]
    fn idle_player_does_not_tick() {
        let mut player = WindowedPlayer::new(0.02);
        assert_eq!(player.state(), PlayerState::Idle);
        player.cancel();
        assert_eq!(player.state(), PlayerState::Idle);
        assert!(player.tick().is_none());
    }

    #[test]
    fn restart_replaces_the_previous_run() {
        let mut player = WindowedPlayer::new(1.0);
        let first = player.start(subject(&[0.0, 1.0, 2.0, 3.0]), 1.0, 1.0).unwrap();
        player.tick();
        player.tick();

        let second = player.start(subject(&[10.0, 11.0]), 1.0, 1.0).unwrap();
        assert_ne!(first, second);
        assert_eq!(player.tracks().len(), 1);
        assert_eq!(player.playback().current_time, 0.0);

        let frame = player.tick().unwrap();
        // the new series has nothing at 0, so the frame wraps and shows nothing
        assert!(frame.is_empty());
    }

    #[test]
    fn speed_scales_the_step() {
        let mut player = WindowedPlayer::new(0.5);
        player.start(subject(&[0.0, 10.0]), 10.0, 2.0).unwrap();
        player.tick();
        assert_eq!(player.playback().current_time, 1.0);

        player.set_speed(f64::NAN);
        assert_eq!(player.playback().speed, 2.0);
        player.set_speed(-3.0);
        assert_eq!(player.playback().speed, 0.0);
        player.tick();
        assert_eq!(player.playback().current_time, 1.0);
    }

    #[test]
    fn rejects_non_positive_window() {
        let mut player = WindowedPlayer::new(0.02);
        assert_eq!(
            player.start(subject(&[0.0]), 0.0, 1.0),
            Err(PlaybackError::InvalidWindow(0.0))
        );
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn group_tracks_share_one_window() {
        let mut player = WindowedPlayer::new(1.0);
        let tracks = vec![
            Track::new(TrackLabel::Group(GroupKey::Normal), series(&[0.0, 1.0, 2.0])),
            Track::new(TrackLabel::Group(GroupKey::Asthma), series(&[0.0, 5.0])),
        ];
        player.start(tracks, 1.0, 1.0).unwrap();
        player.tick();
        player.tick();
        let frame = player.tick().unwrap(); // t = 2
        assert!(!frame.wrapped);
        assert_eq!(frame.tracks[0].visible.len(), 1);
        assert!(frame.tracks[1].visible.is_empty());
    }
}
