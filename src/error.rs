use std::path::PathBuf;

use thiserror::Error;

/// Raised while resolving settings or building the cluster payload.
///
/// All of these are detected before any network call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid tag `{0}`: expected key=value")]
    MalformedTag(String),
    #[error("num-nodes must be at least 1, got {0}")]
    InvalidNodeCount(i32),
    #[error("cannot read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {message}")]
    ParseFile { path: PathBuf, message: String },
}

/// Raised while staging artifacts in S3. The first one aborts the upload phase.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload path {0} does not exist")]
    MissingPath(PathBuf),
    #[error("application {0} is not a regular file")]
    NotAFile(PathBuf),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot list directory {path}: {message}")]
    Walk { path: PathBuf, message: String },
    #[error("failed to upload {path} to s3://{bucket}/{key}: {message}")]
    Put {
        path: PathBuf,
        bucket: String,
        key: String,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },
}

impl Error {
    pub fn api(operation: &'static str, message: impl ToString) -> Self {
        Error::Api {
            operation,
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
