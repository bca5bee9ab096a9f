/// Animation layer: windowed playback and the observers that follow it.
///
/// ```text
///   Vec<Track> ──▶ WindowedPlayer::tick ──▶ WindowFrame
///                                              │
///                      ┌───────────────────────┼────────────────────┐
///                      ▼                       ▼                    ▼
///            BreathCycleDetector          LiveReadout        ChartRenderer(s)
/// ```

pub mod breath;
pub mod player;
pub mod session;
