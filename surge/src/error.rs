use surge_core::ConfigError;

/// Errors that stop a run before it starts. Iteration-level failures are
/// never surfaced here; they are recorded in the run's metrics instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid run configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
