use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_MASTER: &str = "m4.large";
pub const DEFAULT_SLAVE: &str = "m4.2xlarge";
pub const DEFAULT_NUM_NODES: i32 = 1;

const EXAMPLES: &str = "\
Examples:
  sparksteps examples/episodes.py \\
    --s3-bucket $AWS_S3_BUCKET \\
    --aws-region us-east-1 \\
    --release-label emr-4.7.0 \\
    --uploads examples/lib examples/episodes.avro \\
    --submit-args=\"--jars /home/hadoop/lib/spark-avro_2.10-2.0.2-custom.jar\" \\
    --app-args=\"--input /home/hadoop/episodes.avro\" \\
    --num-nodes 1 \\
    --debug";

/// Create Spark cluster on EMR.
///
/// Launches a new EMR cluster (or reuses the one given with --cluster-id),
/// uploads the spark application and any extra files to S3, and submits
/// a spark-submit step for the application.
#[derive(Parser, Debug, Clone)]
#[command(version, after_help = EXAMPLES)]
pub struct Args {
    /// Main spark script for spark-submit
    pub app: PathBuf,

    /// Arguments passed to the main spark script (shell quoting rules apply)
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true, value_parser = parse_shell_args)]
    pub app_args: Option<ShellArgs>,

    /// AWS region name
    #[arg(long)]
    pub aws_region: String,

    /// Job flow id of an existing cluster to submit to
    #[arg(long)]
    pub cluster_id: Option<String>,

    /// Cluster config file (JSON, or YAML for .yaml/.yml)
    #[arg(long, value_name = "FILE")]
    pub conf_file: Option<PathBuf>,

    /// Enable EMR debugging and write cluster logs to the bucket
    #[arg(long)]
    pub debug: bool,

    /// Name of the Amazon EC2 key pair to use when using SSH
    #[arg(long)]
    pub ec2_key: Option<String>,

    /// Amazon VPC subnet id
    #[arg(long)]
    pub ec2_subnet_id: Option<String>,

    /// Keep EMR cluster alive when no steps
    #[arg(long)]
    pub keep_alive: bool,

    /// Instance type of the master host [default: m4.large]
    #[arg(long, value_name = "TYPE")]
    pub master: Option<String>,

    /// Number of instances [default: 1]
    #[arg(long, allow_negative_numbers = true)]
    pub num_nodes: Option<i32>,

    /// EMR release label
    #[arg(long)]
    pub release_label: String,

    /// Name of the S3 bucket to upload spark files to
    #[arg(long)]
    pub s3_bucket: String,

    /// Instance type of the slave hosts [default: m4.2xlarge]
    #[arg(long, value_name = "TYPE")]
    pub slave: Option<String>,

    /// Use the sparksteps Spark configuration
    #[arg(long)]
    pub sparksteps_conf: bool,

    /// Arguments passed to spark-submit (shell quoting rules apply)
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true, value_parser = parse_shell_args)]
    pub submit_args: Option<ShellArgs>,

    /// EMR cluster tags of the form "key1=value1 key2=value2"
    #[arg(long, num_args = 0.., value_name = "KEY=VALUE")]
    pub tags: Vec<String>,

    /// Files and directories to upload to the master instance in /home/hadoop/
    #[arg(long, num_args = 0.., value_name = "PATH")]
    pub uploads: Vec<PathBuf>,
}

impl Args {
    pub fn app_args(&self) -> &[String] {
        self.app_args.as_ref().map(|a| a.0.as_slice()).unwrap_or_default()
    }

    pub fn submit_args(&self) -> &[String] {
        self.submit_args.as_ref().map(|a| a.0.as_slice()).unwrap_or_default()
    }
}

/// A string argument split into tokens with POSIX shell quoting rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellArgs(pub Vec<String>);

pub fn parse_shell_args(s: &str) -> Result<ShellArgs, String> {
    shlex::split(s)
        .map(ShellArgs)
        .ok_or_else(|| format!("unbalanced quotes or trailing escape in `{s}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    const REQUIRED: [&str; 8] = [
        "sparksteps",
        "job.py",
        "--aws-region",
        "us-east-1",
        "--release-label",
        "emr-6.0.0",
        "--s3-bucket",
        "mybucket",
    ];

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(REQUIRED.iter().chain(extra))
    }

    #[test]
    fn required_only() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.app, PathBuf::from("job.py"));
        assert_eq!(args.aws_region, "us-east-1");
        assert_eq!(args.release_label, "emr-6.0.0");
        assert_eq!(args.s3_bucket, "mybucket");
        assert!(args.cluster_id.is_none());
        assert!(args.master.is_none());
        assert!(args.num_nodes.is_none());
        assert!(!args.keep_alive);
        assert!(args.tags.is_empty());
        assert!(args.uploads.is_empty());
        assert!(args.app_args().is_empty());
        assert!(args.submit_args().is_empty());
    }

    #[test]
    fn missing_bucket_is_an_argument_error() {
        let err = Args::try_parse_from(&REQUIRED[..6]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn missing_app_is_an_argument_error() {
        let err = Args::try_parse_from([
            "sparksteps",
            "--aws-region",
            "us-east-1",
            "--release-label",
            "emr-6.0.0",
            "--s3-bucket",
            "mybucket",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn help_is_not_a_failure() {
        let err = Args::try_parse_from(["sparksteps", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
        assert!(err.to_string().contains("Examples:"));
    }

    #[test]
    fn submit_args_are_shell_split() {
        let args = parse(&["--submit-args", "--jars x.jar --verbose"]).unwrap();
        assert_eq!(args.submit_args(), ["--jars", "x.jar", "--verbose"]);
    }

    #[test]
    fn app_args_keep_quoted_tokens_together() {
        let args = parse(&["--app-args=--name 'two words' --n 3"]).unwrap();
        assert_eq!(args.app_args(), ["--name", "two words", "--n", "3"]);
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let err = parse(&["--app-args", "--name 'oops"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn tags_and_uploads_take_many_values() {
        let args = parse(&[
            "--tags",
            "team=data",
            "env=dev",
            "--uploads",
            "lib",
            "data.avro",
            "--num-nodes",
            "3",
        ])
        .unwrap();
        assert_eq!(args.tags, ["team=data", "env=dev"]);
        assert_eq!(
            args.uploads,
            [PathBuf::from("lib"), PathBuf::from("data.avro")]
        );
        assert_eq!(args.num_nodes, Some(3));
    }

    #[test]
    fn negative_node_count_reaches_validation() {
        let args = parse(&["--num-nodes", "-1"]).unwrap();
        assert_eq!(args.num_nodes, Some(-1));
    }

    #[test]
    fn parse_shell_args_splits_posix_style() {
        assert_eq!(
            parse_shell_args(r#"--conf "spark.x=a b" -v"#).unwrap().0,
            ["--conf", "spark.x=a b", "-v"]
        );
        assert!(parse_shell_args("").unwrap().0.is_empty());
    }
}
