use std::path::PathBuf;

use thiserror::Error;

use crate::filter::FilterError;

/// Errors raised across one monitoring run. All are fatal for the run:
/// the watermark stays untouched and the process exits non-zero.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("decode error: {0}")]
    Decode(#[from] binlog::DecodeError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] notify::NotifyError),

    #[error("cannot acquire dispatch lock at {path}: {source}")]
    LockUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read cache file {path}: {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {path} is not valid JSON: {source}")]
    CacheParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot persist watermark to {path}: {source}")]
    CachePersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
