/// Monitoring engine module
///
/// One round samples a short window of audio from every registered
/// stream, measures its peak volume through the external analysis tool
/// and classifies the stream as online or down:
/// capture -> probe -> classify -> deliver, one independent pipeline per
/// stream.
pub mod capture;
pub mod executor;
pub mod probe;
pub mod scheduler;
pub mod types;

pub use capture::StreamCapture;
pub use executor::{MonitoringExecutor, StreamChecker};
pub use probe::LoudnessProbe;
pub use scheduler::MonitorWorker;
pub use types::{CheckResult, StreamStatus};
