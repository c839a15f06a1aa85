use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum Error {
    ReadFailed(()),
    WriteFailed(()),
    ParseFailed(()),
    ConfigPathUnavailable,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: Registry,
    pub capture: Capture,
    pub probe: Probe,
    pub classifier: Classifier,
    pub scheduler: Scheduler,
    pub sink: Sink,
    pub zeromq: ZeroMQ,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Registry {
    /// Path of the local registry database.
    pub db_path: String,
}

impl Default for Registry {
    fn default() -> Self {
        Self { db_path: "aircheck.db".into() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Capture {
    /// Hard cap on bytes read per sample. The default approximates 5
    /// seconds of 44.1 kHz 16-bit stereo PCM; it is a heuristic, not a
    /// duration guarantee.
    pub byte_budget: usize,
    pub read_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            byte_budget: 5 * 44_100 * 2,
            read_timeout_secs: 10,
            user_agent: "aircheck-agent/0.1".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    pub ffmpeg_path: String,
    /// Wall-clock bound on one analysis-tool invocation.
    pub timeout_secs: u64,
}

impl Default for Probe {
    fn default() -> Self {
        Self { ffmpeg_path: "ffmpeg".into(), timeout_secs: 30 }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Classifier {
    /// Peak volume below this reading classifies as down.
    pub silence_threshold_db: f64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self { silence_threshold_db: -30.0 }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub interval_secs: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    Database,
    Queue,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Sink {
    pub mode: SinkMode,
}

impl Default for Sink {
    fn default() -> Self {
        Self { mode: SinkMode::Database }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroMQ {
    /// PUSH endpoint for queue-mode delivery.
    pub endpoint: String,
}

impl Default for ZeroMQ {
    fn default() -> Self {
        Self { endpoint: "tcp://127.0.0.1:5555".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/aircheck/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("aircheck/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current Internal Configuration State:")?;
        writeln!(f, "  Registry")?;
        writeln!(f, "    Database Path: {}", self.registry.db_path)?;
        writeln!(f, "  Capture")?;
        writeln!(f, "    Byte Budget: {}", self.capture.byte_budget)?;
        writeln!(f, "    Read Timeout: {}s", self.capture.read_timeout_secs)?;
        writeln!(f, "    User Agent: {}", self.capture.user_agent)?;
        writeln!(f, "  Probe")?;
        writeln!(f, "    FFmpeg Path: {}", self.probe.ffmpeg_path)?;
        writeln!(f, "    Timeout: {}s", self.probe.timeout_secs)?;
        writeln!(f, "  Classifier")?;
        writeln!(f, "    Silence Threshold: {} dB", self.classifier.silence_threshold_db)?;
        writeln!(f, "  Scheduler")?;
        writeln!(f, "    Interval: {}s", self.scheduler.interval_secs)?;
        writeln!(f, "  Sink")?;
        writeln!(f, "    Mode: {:?}", self.sink.mode)?;
        writeln!(f, "  ZeroMQ")?;
        writeln!(f, "    Endpoint: {}", self.zeromq.endpoint)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/aircheck/config.toml or the
    /// specified path, with the name config.toml, if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string =
                fs::read_to_string(&config_path).map_err(|_err| Error::ReadFailed(()))?;
            toml::from_str(raw_string.as_str()).map_err(|_err| Error::ParseFailed(()))
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), Error> {
        let config_str: String =
            toml::to_string_pretty(self).map_err(|_err| Error::ParseFailed(()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_err| Error::WriteFailed(()))?;
        }

        std::fs::write(path, config_str).map_err(|_err| Error::WriteFailed(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.capture.byte_budget, 441_000);
        assert_eq!(config.classifier.silence_threshold_db, -30.0);
        assert_eq!(config.scheduler.interval_secs, 300);
        assert_eq!(config.sink.mode, SinkMode::Database);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [classifier]
            silence_threshold_db = -25.0

            [sink]
            mode = "queue"
            "#,
        )
        .unwrap();

        assert_eq!(config.classifier.silence_threshold_db, -25.0);
        assert_eq!(config.sink.mode, SinkMode::Queue);
        assert_eq!(config.scheduler.interval_secs, 300);
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::from_config(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.sink.mode, SinkMode::Database);

        // A second load reads the file it just wrote.
        let reloaded = Config::from_config(Some(&path)).unwrap();
        assert_eq!(reloaded.capture.byte_budget, config.capture.byte_budget);
    }
}
