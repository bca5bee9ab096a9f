use crate::data::model::Sample;

use super::breath::{BreathCycleDetector, EdgePolicy};
use super::player::{PlaybackError, PlayerState, Track, WindowFrame, WindowedPlayer};

// ---------------------------------------------------------------------------
// Frame observers
// ---------------------------------------------------------------------------

/// Something that follows every frame a player produces.
pub trait FrameObserver {
    fn on_frame(&mut self, frame: &WindowFrame<'_>);
}

impl FrameObserver for BreathCycleDetector {
    fn on_frame(&mut self, frame: &WindowFrame<'_>) {
        if frame.wrapped {
            self.reset();
        }
        if let Some(latest) = frame.primary().and_then(|t| t.latest()) {
            self.observe(latest);
        }
    }
}

/// The on-screen numbers: newest sample of the primary track.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiveReadout {
    pub latest: Option<Sample>,
}

impl FrameObserver for LiveReadout {
    fn on_frame(&mut self, frame: &WindowFrame<'_>) {
        if let Some(latest) = frame.primary().and_then(|t| t.latest()) {
            self.latest = Some(*latest);
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything one visualization animates with: a player plus the observers
/// that follow it.
///
/// A panel owns exactly one session, so starting a new selection always
/// replaces the previous animation instead of running next to it.
pub struct Session {
    player: WindowedPlayer,
    detector: BreathCycleDetector,
    readout: LiveReadout,
    window_size: f64,
    speed: f64,
}

impl Session {
    pub fn new(base_step: f64, window_size: f64, speed: f64, detector: BreathCycleDetector) -> Self {
        let mut session = Session {
            player: WindowedPlayer::new(base_step),
            detector,
            readout: LiveReadout::default(),
            window_size,
            speed: 1.0,
        };
        session.set_speed(speed);
        session
    }

    /// Cancel whatever is playing and start `tracks` from time zero.
    pub fn restart(&mut self, tracks: Vec<Track>) -> Result<u64, PlaybackError> {
        self.detector.reset();
        self.readout = LiveReadout::default();
        self.player.start(tracks, self.window_size, self.speed)
    }

    pub fn cancel(&mut self) {
        self.player.cancel();
    }

    /// Keeps whatever the player accepted, so a rejected value never reaches
    /// the next `restart`.
    pub fn set_speed(&mut self, speed: f64) {
        self.player.set_speed(speed);
        self.speed = self.player.playback().speed;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_policy(&mut self, policy: Box<dyn EdgePolicy>) {
        self.detector.set_policy(policy);
    }

    pub fn is_running(&self) -> bool {
        self.player.is_running()
    }

    pub fn state(&self) -> PlayerState {
        self.player.state()
    }

    /// Left edge of the next window in recording time.
    pub fn position(&self) -> f64 {
        self.player.playback().current_time
    }

    pub fn tracks(&self) -> &[Track] {
        self.player.tracks()
    }

    pub fn breath_rate(&self) -> Option<f64> {
        self.detector.rate()
    }

    pub fn is_inhaling(&self) -> bool {
        self.detector.is_inhaling()
    }

    pub fn readout(&self) -> &LiveReadout {
        &self.readout
    }

    /// Tick the player and let every observer see the frame before the
    /// renderers get it.
    pub fn frame(&mut self) -> Option<WindowFrame<'_>> {
        let frame = self.player.tick()?;
        self.detector.on_frame(&frame);
        self.readout.on_frame(&frame);
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::model::{Series, SubjectId};
    use crate::playback::breath::VolumeEdge;
    use crate::playback::player::TrackLabel;

    fn session(step: f64, window: f64) -> Session {
        let detector = BreathCycleDetector::new(Box::new(VolumeEdge), 10, 3);
        Session::new(step, window, 1.0, detector)
    }

    fn sawtooth_track(cycles: usize) -> Vec<Track> {
        // 4 s breaths sampled every 0.125 s, so frame steps land exactly on samples
        let series: Series = (0..cycles * 32)
            .map(|i| Sample {
                time: i as f64 * 0.125,
                volume: (i % 32) as f64 / 32.0,
                flow: 0.3,
                ..Default::default()
            })
            .collect();
        vec![Track::new(TrackLabel::Subject(SubjectId(3)), Arc::new(series))]
    }

    #[test]
    fn observers_see_the_newest_visible_sample() {
        let mut session = session(0.125, 2.0);
        session.restart(sawtooth_track(2)).unwrap();

        let end = session
            .frame()
            .and_then(|f| f.primary().and_then(|t| t.latest()).map(|s| s.time))
            .unwrap();
        assert_eq!(session.readout().latest.map(|s| s.time), Some(end));
        assert_eq!(session.readout().latest.map(|s| s.flow), Some(0.3));
    }

    #[test]
    fn detector_follows_playback_and_resets_on_wrap() {
        let mut session = session(0.125, 0.05);
        session.restart(sawtooth_track(5)).unwrap();

        // one sample per frame
        for _ in 0..5 * 32 {
            session.frame();
        }
        let rate = session.breath_rate().expect("rate after five cycles");
        assert!((rate - 15.0).abs() < 0.5, "rate {rate}");

        // run past the end so playback wraps
        let mut wrapped = false;
        for _ in 0..5 {
            if session.frame().is_some_and(|f| f.wrapped) {
                wrapped = true;
                break;
            }
        }
        assert!(wrapped);
        assert_eq!(session.breath_rate(), None);
    }

    #[test]
    fn restart_cancels_and_clears_readout() {
        let mut session = session(0.125, 2.0);
        session.restart(sawtooth_track(1)).unwrap();
        session.frame();
        assert!(session.readout().latest.is_some());

        session.restart(sawtooth_track(1)).unwrap();
        assert!(session.readout().latest.is_none());
        assert!(session.is_running());

        session.cancel();
        assert!(session.frame().is_none());
        assert_eq!(session.state(), PlayerState::Cancelled);
    }

    #[test]
    fn speed_is_stored_as_clamped() {
        let mut session = session(0.125, 2.0);
        session.set_speed(2.0);
        session.set_speed(f64::NAN);
        assert_eq!(session.speed(), 2.0);

        session.set_speed(-3.0);
        assert_eq!(session.speed(), 0.0);

        // a restart must not bring back the rejected value
        session.restart(sawtooth_track(1)).unwrap();
        assert_eq!(session.speed(), 0.0);
        let first = session.frame().map(|f| f.start);
        let second = session.frame().map(|f| f.start);
        assert_eq!(first, second);
    }
}
