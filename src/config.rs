use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

const APP_DIR: &str = "hudwatch";

/// End-of-match tally presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Watching your own matches: scores are known, history is recorded.
    #[default]
    Player,
    /// Watching someone else's stream: only objectives and KOs are tallied.
    Broadcaster,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Team score banners [x, y, width, height]
    pub scores: [u32; 4],

    /// Held energy counter
    pub energy: [u32; 4],

    /// Match clock
    pub time: [u32; 4],

    /// Objective secured banners
    pub objectives: [u32; 4],

    /// Knock-out banners
    pub kos: [u32; 4],

    /// "Press to score" prompt
    pub score_option: [u32; 4],

    /// Match phase banners (start / end)
    pub phase: [u32; 4],

    /// Directory holding `templates.json` and the template images
    pub templates_dir: PathBuf,

    /// Minimum correlation for a template to count as matched
    pub acceptance: f32,

    pub disable_scoring: bool,
    pub disable_energy: bool,
    pub disable_time: bool,
    pub disable_objectives: bool,
    pub disable_defeated: bool,
    pub disable_kos: bool,
    pub disable_previews: bool,

    /// Global capture rate in percent; 200 polls twice as often
    pub capture_rate_percent: u32,

    /// Random jitter applied to every poll interval, in percent
    pub poll_jitter_percent: u32,

    /// Remaining match seconds at which deposits start counting double
    pub final_stretch_secs: u32,

    /// How far back a score prompt may be to confirm a deposit; 5s when unset
    pub confirm_score_delay_ms: Option<u64>,

    pub profile: Profile,

    /// Maximum retained events, 0 for unbounded
    pub event_log_capacity: usize,

    pub monitor_index: usize,

    /// Start with every loop suspended
    pub start_idle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scores: [640, 0, 640, 160],
            energy: [880, 840, 160, 140],
            time: [860, 0, 200, 80],
            objectives: [660, 120, 600, 140],
            kos: [660, 240, 600, 120],
            score_option: [1500, 760, 260, 200],
            phase: [0, 0, 1920, 1080],
            templates_dir: PathBuf::from("templates"),
            acceptance: 0.91,
            disable_scoring: false,
            disable_energy: false,
            disable_time: false,
            disable_objectives: false,
            disable_defeated: false,
            disable_kos: false,
            disable_previews: false,
            capture_rate_percent: 100,
            poll_jitter_percent: 5,
            final_stretch_secs: 120,
            confirm_score_delay_ms: None,
            profile: Profile::Player,
            event_log_capacity: 4096,
            monitor_index: 0,
            start_idle: false,
        }
    }
}

impl Config {
    /// Load configuration from the platform-specific config directory.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!("Created default config at: {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        config.validate()?;

        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            ConfigError::SaveFailed {
                path: path.display().to_string(),
                source,
            }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| save_failed(Box::new(e)))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| save_failed(Box::new(e)))?;
        fs::write(path, json).map_err(|e| save_failed(Box::new(e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_rate_percent == 0 {
            return Err(ConfigError::Invalid(
                "capture_rate_percent must be greater than zero".into(),
            ));
        }
        if self.poll_jitter_percent >= 100 {
            return Err(ConfigError::Invalid(
                "poll_jitter_percent must be below 100".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.acceptance) {
            return Err(ConfigError::Invalid(format!(
                "acceptance {} is outside [0, 1]",
                self.acceptance
            )));
        }

        let regions = [
            ("scores", self.scores),
            ("energy", self.energy),
            ("time", self.time),
            ("objectives", self.objectives),
            ("kos", self.kos),
            ("score_option", self.score_option),
            ("phase", self.phase),
        ];
        for (name, [_, _, w, h]) in regions {
            if w == 0 || h == 0 {
                return Err(ConfigError::Invalid(format!("{name} region is empty")));
            }
        }

        Ok(())
    }

    pub fn confirm_score_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_score_delay_ms.unwrap_or(5000))
    }

    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(ConfigError::NoConfigDirectory)
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn logs_dir() -> PathBuf {
        Self::config_dir()
            .map(|dir| dir.join("logs"))
            .unwrap_or_else(|_| PathBuf::from("logs"))
    }
}
