use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Top-level application error: anything here exits non-zero after being
/// both logged and printed.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("cannot read log file {path}: {source}")]
    ReadLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Filter(#[from] monitor::FilterError),

    #[error(transparent)]
    Notify(#[from] notify::NotifyError),

    #[error(transparent)]
    Monitor(#[from] monitor::MonitorError),
}
