use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DedupMode {
    /// Only the per-task prefix replay filter.
    #[default]
    Local,
    /// Additionally skip path conditions any worker already emitted.
    Global,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ExplorerSettings {
    /// Non-positive values disable re-exploration entirely.
    #[serde(default = "default_max_depth")]
    pub max_depth: i64,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub dedup: DedupMode,
}

pub fn default_max_depth() -> i64 {
    50
}
pub fn default_threads() -> usize {
    1
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            threads: default_threads(),
            dedup: DedupMode::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    #[default]
    Minutes,
    Hours,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct BudgetSettings {
    #[serde(default = "default_budget_duration")]
    pub duration: u64,
    #[serde(default)]
    pub unit: TimeUnit,
}

fn default_budget_duration() -> u64 {
    10
}

impl BudgetSettings {
    pub fn as_duration(&self) -> Duration {
        match self.unit {
            TimeUnit::Milliseconds => Duration::from_millis(self.duration),
            TimeUnit::Seconds => Duration::from_secs(self.duration),
            TimeUnit::Minutes => Duration::from_secs(self.duration.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(self.duration.saturating_mul(3600)),
        }
    }
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            duration: default_budget_duration(),
            unit: TimeUnit::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct QueueSettings {
    #[serde(default = "default_queue_capacity")]
    pub task_capacity: usize,
    #[serde(default = "default_queue_capacity")]
    pub result_capacity: usize,
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            task_capacity: default_queue_capacity(),
            result_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct BrancherConfig {
    #[serde(default)]
    pub explorer: ExplorerSettings,
    #[serde(default)]
    pub budget: BudgetSettings,
    #[serde(default)]
    pub queues: QueueSettings,
    #[serde(default)]
    pub log_level: LogLevel,
}

impl BrancherConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        Self::from_toml_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
