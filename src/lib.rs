//! Launch (or reuse) a Spark cluster on AWS EMR and submit a job to it.
//!
//! A run builds the `RunJobFlow` payload from the command line and an
//! optional config file, creates the cluster when no `--cluster-id` is
//! given, stages the application and any extra files in S3, and submits
//! them as EMR steps: one copy step per staged file, then `spark-submit`.
//! Nothing is kept locally between runs and step completion is not tracked.

pub mod cluster;
pub mod cmd;
pub mod dispatch;
pub mod emr;
pub mod error;
pub mod s3;
pub mod steps;

pub use error::{ConfigError, Error, Result, UploadError};
