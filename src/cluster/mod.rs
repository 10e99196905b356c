//! Builds the EMR `RunJobFlow` payload for a new Spark cluster.
//!
//! The payload is a plain serde structure shaped like the EMR API request, so
//! it can be logged or dumped as JSON. [`crate::emr`] turns it into SDK types.
//!
//! ```
//! # use clap::Parser;
//! use sparksteps::cluster::build_cluster_config;
//! use sparksteps::cmd::sparksteps::Args;
//!
//! let args = Args::parse_from([
//!     "sparksteps", "job.py",
//!     "--aws-region", "us-east-1",
//!     "--release-label", "emr-6.0.0",
//!     "--s3-bucket", "mybucket",
//!     "--num-nodes", "3",
//! ]);
//! let config = build_cluster_config(&args, None).unwrap();
//! assert_eq!(config.instances.instance_groups.len(), 2);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cmd::sparksteps::Args;
use crate::error::ConfigError;
use crate::steps::{ActionOnFailure, Step};

pub mod file;
pub mod settings;

pub use file::ConfigFile;
pub use settings::Settings;

pub const DEFAULT_CLUSTER_NAME: &str = "sparksteps";
pub const DEFAULT_APPLICATIONS: [&str; 2] = ["Hadoop", "Spark"];
pub const DEFAULT_JOB_FLOW_ROLE: &str = "EMR_EC2_DefaultRole";
pub const DEFAULT_SERVICE_ROLE: &str = "EMR_DefaultRole";

/////////////////////////////////////////////////////////////////////////////
// Payload types
/////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterConfig {
    pub name: String,
    pub release_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_uri: Option<String>,
    pub applications: Vec<Application>,
    pub instances: Instances,
    /// Steps run as part of cluster creation, before any submitted job.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bootstrap_actions: Vec<BootstrapAction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub configurations: Vec<Configuration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    pub visible_to_all_users: bool,
    pub job_flow_role: String,
    pub service_role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Application {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instances {
    pub instance_groups: Vec<InstanceGroup>,
    /// `false` lets the cluster terminate once every step has finished.
    pub keep_job_flow_alive_when_no_steps: bool,
    pub termination_protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ec2_key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ec2_subnet_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceGroup {
    pub name: String,
    pub market: Market,
    pub instance_role: InstanceRole,
    pub instance_type: String,
    pub instance_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid_price: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Market {
    #[default]
    OnDemand,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceRole {
    Master,
    Core,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BootstrapAction {
    pub name: String,
    pub script_bootstrap_action: ScriptBootstrapAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptBootstrapAction {
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// An EMR configuration classification, e.g. `spark` or `spark-defaults`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Configuration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub configurations: Vec<Configuration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/////////////////////////////////////////////////////////////////////////////
// Building
/////////////////////////////////////////////////////////////////////////////

/// Parses a `key=value` tag token. The value may itself contain `=`.
pub fn parse_tag(token: &str) -> Result<Tag, ConfigError> {
    match token.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok(Tag {
            key: key.to_string(),
            value: value.to_string(),
        }),
        _ => Err(ConfigError::MalformedTag(token.to_string())),
    }
}

pub fn parse_tags<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Tag>, ConfigError> {
    tokens.iter().map(|t| parse_tag(t.as_ref())).collect()
}

/// The `spark` classification added by `--sparksteps-conf`.
pub fn sparksteps_spark_conf() -> Configuration {
    Configuration {
        classification: Some("spark".to_string()),
        properties: BTreeMap::from([(
            "maximizeResourceAllocation".to_string(),
            "true".to_string(),
        )]),
        configurations: Vec::new(),
    }
}

/// Step that turns on the EMR debugging tool for the new cluster.
pub fn debug_step() -> Step {
    Step::command(
        "Setup - debug",
        ActionOnFailure::TerminateCluster,
        vec!["state-pusher-script".to_string()],
    )
}

/// Builds the create-cluster payload from the command line and an optional
/// config file. Command line values win over file values, which win over
/// built-in defaults.
pub fn build_cluster_config(
    args: &Args,
    file: Option<ConfigFile>,
) -> Result<ClusterConfig, ConfigError> {
    let settings = Settings::resolve(args, file)?;
    ClusterConfig::from_settings(&settings)
}

impl ClusterConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        if settings.num_nodes < 1 {
            return Err(ConfigError::InvalidNodeCount(settings.num_nodes));
        }

        let mut instance_groups = vec![InstanceGroup {
            name: "Master Node".to_string(),
            market: settings.market,
            instance_role: InstanceRole::Master,
            instance_type: settings.master.clone(),
            instance_count: 1,
            bid_price: settings.bid_price.clone(),
        }];
        if settings.num_nodes > 1 {
            instance_groups.push(InstanceGroup {
                name: "Slave Nodes".to_string(),
                market: settings.market,
                instance_role: InstanceRole::Core,
                instance_type: settings.slave.clone(),
                instance_count: settings.num_nodes - 1,
                bid_price: settings.bid_price.clone(),
            });
        }

        let mut configurations = settings.configurations.clone();
        if settings.sparksteps_conf {
            let spark = sparksteps_spark_conf();
            match configurations
                .iter_mut()
                .find(|c| c.classification == spark.classification)
            {
                Some(existing) => existing.properties.extend(spark.properties),
                None => configurations.push(spark),
            }
        }

        let (log_uri, steps) = if settings.debug {
            (
                Some(format!("s3://{}/logs/sparksteps/", settings.bucket)),
                vec![debug_step()],
            )
        } else {
            (settings.log_uri.clone(), Vec::new())
        };

        Ok(ClusterConfig {
            name: settings.name.clone(),
            release_label: settings.release_label.clone(),
            log_uri,
            applications: settings
                .applications
                .iter()
                .map(|name| Application { name: name.clone() })
                .collect(),
            instances: Instances {
                instance_groups,
                keep_job_flow_alive_when_no_steps: settings.keep_alive,
                termination_protected: false,
                ec2_key_name: settings.ec2_key.clone(),
                ec2_subnet_id: settings.ec2_subnet_id.clone(),
            },
            steps,
            bootstrap_actions: settings.bootstrap_actions.clone(),
            configurations,
            tags: settings.tags.clone(),
            visible_to_all_users: settings.visible_to_all_users,
            job_flow_role: settings.job_flow_role.clone(),
            service_role: settings.service_role.clone(),
        })
    }
}
