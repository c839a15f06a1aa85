use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no audio track detected in sample")]
    NoAudioTrack,

    #[error("analysis tool failed: {0}")]
    ToolInvocation(String),

    #[error("analysis tool did not finish within {0:?}")]
    ToolTimeout(Duration),

    #[error("failed to stage audio sample: {0}")]
    Staging(#[from] std::io::Error),
}

static MAX_VOLUME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"max_volume:\s*(-?\d+(?:\.\d+)?)\s*dB").expect("max_volume pattern is valid")
});

/// Measures the peak volume of an audio sample by shelling out to ffmpeg's
/// `volumedetect` filter.
///
/// The tool only operates on files, so each probe stages the sample in a
/// temporary file that is removed on every exit path. Diagnostic output is
/// accumulated per invocation and never shared between concurrent probes.
pub struct LoudnessProbe {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl LoudnessProbe {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { ffmpeg_path: ffmpeg_path.into(), timeout }
    }

    /// Measure the peak volume of `audio` in dB.
    ///
    /// Returns `0.0` when the tool ran but its diagnostics carried no
    /// `max_volume` line; that is a permissive default for malformed tool
    /// output, not a measured silence.
    pub async fn probe(&self, audio: Vec<u8>) -> Result<f64, ProbeError> {
        // File staging is blocking IO, so it runs off the async runtime.
        let sample = tokio::task::spawn_blocking(move || -> Result<NamedTempFile, std::io::Error> {
            let mut sample = NamedTempFile::new()?;
            sample.write_all(&audio)?;
            sample.flush()?;
            Ok(sample)
        })
        .await
        .map_err(std::io::Error::other)??;

        // The temp file lives until `sample` drops, which also covers the
        // error paths below.
        let diagnostics = self.run_volumedetect(sample.path()).await?;
        Ok(parse_max_volume(&diagnostics))
    }

    /// Run `ffmpeg -af volumedetect` over the first audio track of `input`
    /// and return the tool's diagnostic output.
    async fn run_volumedetect(&self, input: &Path) -> Result<String, ProbeError> {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .arg("-hide_banner")
            .arg("-nostats")
            .arg("-i")
            .arg(input)
            .arg("-map")
            .arg("0:a:0")
            .arg("-af")
            .arg("volumedetect")
            .arg("-f")
            .arg("null")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            ProbeError::ToolInvocation(format!(
                "failed to spawn {}: {e}",
                self.ffmpeg_path.display()
            ))
        })?;

        // Dropping the wait future on timeout kills the child via
        // kill_on_drop, so a hung tool cannot leak.
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProbeError::ToolTimeout(self.timeout))?
            .map_err(|e| ProbeError::ToolInvocation(e.to_string()))?;

        let diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(tool = %self.ffmpeg_path.display(), "analysis tool diagnostics:\n{diagnostics}");

        if !output.status.success() {
            if diagnostics.contains("matches no streams")
                || diagnostics.contains("does not contain any stream")
            {
                return Err(ProbeError::NoAudioTrack);
            }
            return Err(ProbeError::ToolInvocation(format!(
                "ffmpeg exited with {}",
                output.status
            )));
        }

        Ok(diagnostics)
    }
}

/// Extract the first `max_volume: <value> dB` reading from the tool's
/// diagnostic text, falling back to `0.0` when the pattern is absent.
fn parse_max_volume(diagnostics: &str) -> f64 {
    MAX_VOLUME
        .captures(diagnostics)
        .and_then(|captures| captures.get(1))
        .and_then(|value| value.as_str().parse().ok())
        .unwrap_or(0.0)
}
