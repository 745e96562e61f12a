use anyhow::{anyhow, Context};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
    time::Duration,
};
use tracing::{debug, warn};

use crate::sync::ProgressMode;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub spool: SpoolConfig,
    pub playback: PlaybackConfig,
    pub share: ShareConfig,
    /// File the configuration was read from, if any.
    pub source: Option<PathBuf>,
}

impl Config {
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = env::current_dir() {
            candidates.push(current_dir.join("config.toml"));
            candidates.push(current_dir.join("config").join("config.toml"));
            candidates.push(current_dir.join("config").join("cassette.toml"));
        }

        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join("config.toml"));
                candidates.push(dir.join("config").join("config.toml"));
                candidates.push(dir.join("config").join("cassette.toml"));
            }
        }

        candidates
    }

    pub fn load() -> anyhow::Result<Self> {
        for path in Self::candidate_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        debug!("no config file found, using defaults");
        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_toml(&data)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(data: &str) -> anyhow::Result<Self> {
        let doc: ConfigDocument = toml::from_str(data)?;
        Ok(doc.into())
    }
}

const DEFAULT_MIN_RADIUS: f32 = 60.0;
const DEFAULT_MAX_RADIUS: f32 = 144.0;
const DEFAULT_RIM_RADIUS: f32 = 65.0;
const DEFAULT_HOLE_RADIUS: f32 = 42.0;

#[derive(Debug, Clone)]
pub struct SpoolConfig {
    pub min_radius: f32,
    pub max_radius: f32,
    pub rim_radius: f32,
    pub hole_radius: f32,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            min_radius: DEFAULT_MIN_RADIUS,
            max_radius: DEFAULT_MAX_RADIUS,
            rim_radius: DEFAULT_RIM_RADIUS,
            hole_radius: DEFAULT_HOLE_RADIUS,
        }
    }
}

impl SpoolConfig {
    pub fn min_radius(&self) -> f32 {
        finite_or(self.min_radius, DEFAULT_MIN_RADIUS).clamp(1.0, 400.0)
    }

    /// Never smaller than the minimum radius so the tape law stays monotonic.
    pub fn max_radius(&self) -> f32 {
        finite_or(self.max_radius, DEFAULT_MAX_RADIUS).clamp(self.min_radius(), 400.0)
    }

    pub fn rim_radius(&self) -> f32 {
        finite_or(self.rim_radius, DEFAULT_RIM_RADIUS).clamp(1.0, self.max_radius())
    }

    pub fn hole_radius(&self) -> f32 {
        finite_or(self.hole_radius, DEFAULT_HOLE_RADIUS).clamp(0.0, self.rim_radius())
    }
}

/// TOML accepts `nan` and `inf`; those fall back to the default.
fn finite_or(value: f32, default: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub sample_interval_ms: u64,
    pub low_power_interval_ms: u64,
    pub low_power: bool,
    pub progress_mode: ProgressMode,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1_000,
            low_power_interval_ms: 2_000,
            low_power: false,
            progress_mode: ProgressMode::PerItem,
        }
    }
}

impl PlaybackConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.clamp(100, 10_000))
    }

    pub fn low_power_interval(&self) -> Duration {
        Duration::from_millis(self.low_power_interval_ms.clamp(100, 30_000))
    }
}

#[derive(Debug, Clone)]
pub struct ShareConfig {
    pub base_url: String,
    pub site_name: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rockorpop.com/".to_string(),
            site_name: "rockorpop.com".to_string(),
        }
    }
}

/// Watches the loaded config file and re-parses it when it changes on disk.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    changes_rx: Receiver<notify::Result<notify::Event>>,
}

impl ConfigWatcher {
    pub fn watch(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Config file {} does not exist", path.display()));
        }

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
            changes_rx: rx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a freshly parsed config when the file changed since the last poll.
    pub fn poll(&self) -> Option<anyhow::Result<Config>> {
        let mut changed = false;
        while let Ok(event) = self.changes_rx.try_recv() {
            match event {
                Ok(evt) => {
                    if evt.kind.is_modify() || evt.kind.is_create() {
                        changed = true;
                    }
                }
                Err(err) => warn!(%err, "config watcher error"),
            }
        }

        changed.then(|| Config::load_from(&self.path))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    spool: SpoolSection,
    #[serde(default)]
    playback: PlaybackSection,
    #[serde(default)]
    share: ShareSection,
}

impl From<ConfigDocument> for Config {
    fn from(value: ConfigDocument) -> Self {
        let spool_defaults = SpoolConfig::default();
        let spool = SpoolConfig {
            min_radius: value.spool.min_radius.unwrap_or(spool_defaults.min_radius),
            max_radius: value.spool.max_radius.unwrap_or(spool_defaults.max_radius),
            rim_radius: value.spool.rim_radius.unwrap_or(spool_defaults.rim_radius),
            hole_radius: value.spool.hole_radius.unwrap_or(spool_defaults.hole_radius),
        };

        let playback_defaults = PlaybackConfig::default();
        let progress_mode = match value.playback.progress_mode.as_deref() {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = raw, "unknown progress_mode, using per-item progress");
                playback_defaults.progress_mode
            }),
            None => playback_defaults.progress_mode,
        };
        let playback = PlaybackConfig {
            sample_interval_ms: value
                .playback
                .sample_interval_ms
                .unwrap_or(playback_defaults.sample_interval_ms),
            low_power_interval_ms: value
                .playback
                .low_power_interval_ms
                .unwrap_or(playback_defaults.low_power_interval_ms),
            low_power: value.playback.low_power.unwrap_or(false),
            progress_mode,
        };

        let share_defaults = ShareConfig::default();
        let share = ShareConfig {
            base_url: value.share.base_url.unwrap_or(share_defaults.base_url),
            site_name: value.share.site_name.unwrap_or(share_defaults.site_name),
        };

        Config {
            spool,
            playback,
            share,
            source: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SpoolSection {
    min_radius: Option<f32>,
    max_radius: Option<f32>,
    rim_radius: Option<f32>,
    hole_radius: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaybackSection {
    sample_interval_ms: Option<u64>,
    low_power_interval_ms: Option<u64>,
    low_power: Option<bool>,
    progress_mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ShareSection {
    base_url: Option<String>,
    site_name: Option<String>,
}
