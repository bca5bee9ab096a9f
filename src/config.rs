use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::data::aggregate::AggregateParams;
use crate::playback::breath::{BreathCycleDetector, DetectorPolicy};
use crate::playback::session::Session;

// ---------------------------------------------------------------------------
// Viewer configuration (`viewer.json` in the dataset folder)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Width of the visible time window in seconds.
    pub window_size: f64,
    /// Seconds of recording advanced per frame at speed 1.
    pub base_step: f64,
    pub default_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            window_size: 10.0,
            base_step: 0.02,
            default_speed: 1.0,
            min_speed: 0.5,
            max_speed: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Subjects averaged per group.
    pub sample_size: usize,
    /// Averaging bin width in seconds.
    pub bin_width: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            sample_size: 5,
            bin_width: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathConfig {
    pub policy: DetectorPolicy,
    /// Instantaneous rates kept for the moving average.
    pub history_len: usize,
    /// Breaths to count before a rate is shown.
    pub min_breaths: usize,
    /// Flow dead band in L/s for the flow policy.
    pub flow_threshold: f64,
}

impl Default for BreathConfig {
    fn default() -> Self {
        Self {
            policy: DetectorPolicy::Volume,
            history_len: 10,
            min_breaths: 3,
            flow_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    /// Seconds from the start of each recording that the cohort bands cover.
    pub window: f64,
    /// Width of a confidence-band bin in seconds.
    pub bin_width: f64,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            window: 5.0,
            bin_width: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub playback: PlaybackConfig,
    pub grouping: GroupingConfig,
    pub breath: BreathConfig,
    pub insights: InsightsConfig,
    /// Recording length shown in the breathing view.
    pub breathing_max_time: f64,
    /// Recording length shown in the chest/abdomen view.
    pub chest_abdomen_max_time: f64,
    /// Bin width of the age histogram in years.
    pub age_bin_width: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default(),
            grouping: GroupingConfig::default(),
            breath: BreathConfig::default(),
            insights: InsightsConfig::default(),
            breathing_max_time: 300.0,
            chest_abdomen_max_time: 1000.0,
            age_bin_width: 10.0,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: ViewerConfig = serde_json::from_str(text).context("parsing viewer config")?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, or return defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Like [`load`](Self::load) but falls back to defaults on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring viewer config: {e:#}");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.playback;
        if !(p.window_size > 0.0) {
            bail!("playback.window_size must be positive, got {}", p.window_size);
        }
        if !(p.base_step > 0.0) {
            bail!("playback.base_step must be positive, got {}", p.base_step);
        }
        if !(p.min_speed >= 0.0 && p.min_speed <= p.max_speed) {
            bail!(
                "playback speed range {}..{} is invalid",
                p.min_speed,
                p.max_speed
            );
        }
        if !(self.grouping.bin_width > 0.0) {
            bail!("grouping.bin_width must be positive, got {}", self.grouping.bin_width);
        }
        if self.breath.history_len == 0 {
            bail!("breath.history_len must be at least 1");
        }
        if !(self.breathing_max_time > 0.0 && self.chest_abdomen_max_time > 0.0) {
            bail!("max times must be positive");
        }
        if !(self.age_bin_width >= 1.0) {
            bail!("age_bin_width must be at least one year, got {}", self.age_bin_width);
        }
        let i = &self.insights;
        if !(i.window > 0.0 && i.bin_width > 0.0 && i.bin_width <= i.window) {
            bail!("insights window {} / bin width {} is invalid", i.window, i.bin_width);
        }
        Ok(())
    }

    pub fn aggregate_params(&self, max_time: f64) -> AggregateParams {
        AggregateParams {
            sample_size: self.grouping.sample_size,
            bin_width: self.grouping.bin_width,
            max_time,
        }
    }

    pub fn detector(&self) -> BreathCycleDetector {
        BreathCycleDetector::new(
            self.breath.policy.build(self.breath.flow_threshold),
            self.breath.history_len,
            self.breath.min_breaths,
        )
    }

    pub fn session(&self) -> Session {
        let p = &self.playback;
        Session::new(p.base_step, p.window_size, p.default_speed, self.detector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            ViewerConfig::from_json(r#"{ "playback": { "window_size": 5.0 }, "breath": { "policy": "flow" } }"#)
                .unwrap();
        assert_eq!(config.playback.window_size, 5.0);
        assert_eq!(config.playback.base_step, 0.02);
        assert_eq!(config.breath.policy, DetectorPolicy::Flow);
        assert_eq!(config.grouping, GroupingConfig::default());
        assert_eq!(config.breathing_max_time, 300.0);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(ViewerConfig::from_json(r#"{ "playback": { "window_size": 0 } }"#).is_err());
        assert!(ViewerConfig::from_json(r#"{ "grouping": { "bin_width": -0.1 } }"#).is_err());
        assert!(ViewerConfig::from_json(r#"{ "breath": { "history_len": 0 } }"#).is_err());
        assert!(ViewerConfig::from_json(r#"{ "age_bin_width": 0.0001 }"#).is_err());
        assert!(ViewerConfig::from_json(r#"{ "insights": { "bin_width": 0 } }"#).is_err());
        assert!(ViewerConfig::from_json("not json").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = ViewerConfig::load(Path::new("/nonexistent/viewer.json")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn defaults_are_valid() {
        ViewerConfig::default().validate().unwrap();
        assert_eq!(ViewerConfig::default().aggregate_params(300.0).bin_width, 0.1);
    }
}
