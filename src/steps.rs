//! Stages job artifacts in S3 and builds the EMR steps that run the job.
//!
//! Every file is stored under [`KEY_PREFIX`] followed by its relative path,
//! where the relative path starts at the basename of the path given on the
//! command line. A directory `lib` holding `a.jar` therefore ends up at
//! `s3://<bucket>/sparksteps/sources/lib/a.jar`, and a copy step places it at
//! `/home/hadoop/lib/a.jar` on the master node before spark-submit runs.

use std::path::{Component, Path, PathBuf};

use glob::glob;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::UploadError;
use crate::s3::ObjectStore;

pub const KEY_PREFIX: &str = "sparksteps/sources/";
pub const REMOTE_HOME: &str = "/home/hadoop/";
pub const COMMAND_RUNNER_JAR: &str = "command-runner.jar";

/////////////////////////////////////////////////////////////////////////////
// Step definitions
/////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionOnFailure {
    TerminateCluster,
    CancelAndWait,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Step {
    pub name: String,
    pub action_on_failure: ActionOnFailure,
    pub hadoop_jar_step: HadoopJarStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HadoopJarStep {
    pub jar: String,
    pub args: Vec<String>,
}

impl Step {
    /// A step that runs `args` through `command-runner.jar`.
    pub fn command(
        name: impl Into<String>,
        action_on_failure: ActionOnFailure,
        args: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            action_on_failure,
            hadoop_jar_step: HadoopJarStep {
                jar: COMMAND_RUNNER_JAR.to_string(),
                args,
            },
        }
    }

    #[inline]
    pub fn args(&self) -> &[String] {
        &self.hadoop_jar_step.args
    }
}

/// Copies an uploaded artifact from S3 onto the master node.
pub fn copy_step(bucket: &str, artifact: &Artifact) -> Step {
    Step::command(
        format!("Copy {}", artifact.relative),
        ActionOnFailure::Continue,
        vec![
            "aws".to_string(),
            "s3".to_string(),
            "cp".to_string(),
            artifact.uri(bucket),
            artifact.destination(),
        ],
    )
}

/// `spark-submit <submit_args> <app_uri> <app_args>`
pub fn spark_submit_step(
    name: &str,
    app_uri: &str,
    submit_args: &[String],
    app_args: &[String],
) -> Step {
    let mut args = Vec::with_capacity(submit_args.len() + app_args.len() + 2);
    args.push("spark-submit".to_string());
    args.extend_from_slice(submit_args);
    args.push(app_uri.to_string());
    args.extend_from_slice(app_args);
    Step::command(format!("Run {name}"), ActionOnFailure::Continue, args)
}

/////////////////////////////////////////////////////////////////////////////
// Artifacts
/////////////////////////////////////////////////////////////////////////////

/// A local file and where it lives once uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub local: PathBuf,
    /// Slash separated path, starting at the basename of the upload.
    pub relative: String,
}

impl Artifact {
    pub fn key(&self) -> String {
        format!("{KEY_PREFIX}{}", self.relative)
    }

    pub fn uri(&self, bucket: &str) -> String {
        format!("s3://{bucket}/{}", self.key())
    }

    /// Location on the master node.
    pub fn destination(&self) -> String {
        format!("{REMOTE_HOME}{}", self.relative)
    }
}

fn basename(path: &Path) -> Result<String, UploadError> {
    let name = match path.file_name() {
        Some(name) => name.to_os_string(),
        // `.` and `..` have no file name of their own
        None => path
            .canonicalize()
            .map_err(|source| UploadError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| UploadError::MissingPath(path.to_path_buf()))?,
    };
    Ok(name.to_string_lossy().into_owned())
}

/// `path` without leading `.` components or a trailing slash, matching the
/// form `glob` gives back for the files under it. `.` becomes the empty path.
fn walk_root(path: &Path) -> PathBuf {
    path.components()
        .skip_while(|c| matches!(c, Component::CurDir))
        .collect()
}

/// Lists the files behind an upload path. Directories are walked
/// recursively and their files returned in sorted order.
pub fn collect_artifacts(path: &Path) -> Result<Vec<Artifact>, UploadError> {
    let metadata = std::fs::metadata(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => UploadError::MissingPath(path.to_path_buf()),
        _ => UploadError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let base = basename(path)?;

    if !metadata.is_dir() {
        return Ok(vec![Artifact {
            local: path.to_path_buf(),
            relative: base,
        }]);
    }

    let walk_error = |message: String| UploadError::Walk {
        path: path.to_path_buf(),
        message,
    };
    let root = walk_root(path);
    let root_str = root
        .to_str()
        .ok_or_else(|| walk_error("path is not valid UTF-8".to_string()))?;
    let pattern = if root_str.is_empty() {
        "**/*".to_string()
    } else {
        format!("{}/**/*", glob::Pattern::escape(root_str))
    };

    let mut files = Vec::new();
    for entry in glob(&pattern).map_err(|e| walk_error(e.to_string()))? {
        let file = entry.map_err(|e| walk_error(e.to_string()))?;
        if file.is_file() {
            files.push(file);
        }
    }
    files.sort();

    files
        .into_iter()
        .map(|file| {
            let inner = file
                .strip_prefix(&root)
                .map_err(|e| walk_error(e.to_string()))?;
            let mut relative = base.clone();
            for part in inner.components() {
                relative.push('/');
                relative.push_str(&part.as_os_str().to_string_lossy());
            }
            Ok(Artifact {
                local: file,
                relative,
            })
        })
        .collect()
}

/// Uploads every upload path and the application, then returns the steps to
/// submit: one copy step per uploaded file followed by the spark-submit step.
///
/// The first failure aborts the whole upload phase.
pub async fn upload_and_build_steps<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    app: &Path,
    submit_args: &[String],
    app_args: &[String],
    uploads: &[PathBuf],
) -> Result<Vec<Step>, UploadError> {
    let mut steps = Vec::new();

    for path in uploads {
        let artifacts = collect_artifacts(path)?;
        debug!(path = %path.display(), files = artifacts.len(), "collected upload");
        for artifact in artifacts {
            info!(file = %artifact.local.display(), uri = %artifact.uri(bucket), "uploading");
            store.put_file(bucket, &artifact.key(), &artifact.local).await?;
            steps.push(copy_step(bucket, &artifact));
        }
    }

    let app_artifact = match collect_artifacts(app)?.as_slice() {
        [single] if single.local == app => single.clone(),
        _ => return Err(UploadError::NotAFile(app.to_path_buf())),
    };
    let app_uri = app_artifact.uri(bucket);
    info!(file = %app.display(), uri = %app_uri, "uploading application");
    store.put_file(bucket, &app_artifact.key(), app).await?;

    steps.push(spark_submit_step(
        &app_artifact.relative,
        &app_uri,
        submit_args,
        app_args,
    ));
    Ok(steps)
}
