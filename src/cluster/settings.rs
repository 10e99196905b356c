use super::{
    parse_tags, BootstrapAction, ConfigFile, Configuration, Market, Tag, DEFAULT_APPLICATIONS,
    DEFAULT_CLUSTER_NAME, DEFAULT_JOB_FLOW_ROLE, DEFAULT_SERVICE_ROLE,
};
use crate::cmd::sparksteps::{Args, DEFAULT_MASTER, DEFAULT_NUM_NODES, DEFAULT_SLAVE};
use crate::error::ConfigError;

/// Cluster settings after layering the command line over the config file
/// over the built-in defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub name: String,
    pub release_label: String,
    pub bucket: String,
    pub master: String,
    pub slave: String,
    pub num_nodes: i32,
    pub market: Market,
    pub bid_price: Option<String>,
    pub ec2_key: Option<String>,
    pub ec2_subnet_id: Option<String>,
    pub keep_alive: bool,
    pub debug: bool,
    pub sparksteps_conf: bool,
    pub tags: Vec<Tag>,
    pub applications: Vec<String>,
    pub bootstrap_actions: Vec<BootstrapAction>,
    pub configurations: Vec<Configuration>,
    pub job_flow_role: String,
    pub service_role: String,
    pub log_uri: Option<String>,
    pub visible_to_all_users: bool,
}

impl Settings {
    pub fn resolve(args: &Args, file: Option<ConfigFile>) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();

        let mut tags: Vec<Tag> = file
            .tags
            .into_iter()
            .map(|(key, value)| Tag { key, value })
            .collect();
        for tag in parse_tags(args.tags.as_slice())? {
            match tags.iter_mut().find(|t| t.key == tag.key) {
                Some(existing) => existing.value = tag.value,
                None => tags.push(tag),
            }
        }

        Ok(Settings {
            name: file.name.unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string()),
            release_label: args.release_label.clone(),
            bucket: args.s3_bucket.clone(),
            master: args
                .master
                .clone()
                .or(file.master)
                .unwrap_or_else(|| DEFAULT_MASTER.to_string()),
            slave: args
                .slave
                .clone()
                .or(file.slave)
                .unwrap_or_else(|| DEFAULT_SLAVE.to_string()),
            num_nodes: args.num_nodes.or(file.num_nodes).unwrap_or(DEFAULT_NUM_NODES),
            market: file.market.unwrap_or_default(),
            bid_price: file.bid_price,
            ec2_key: args.ec2_key.clone().or(file.ec2_key),
            ec2_subnet_id: args.ec2_subnet_id.clone().or(file.ec2_subnet_id),
            keep_alive: args.keep_alive || file.keep_alive.unwrap_or(false),
            debug: args.debug,
            sparksteps_conf: args.sparksteps_conf,
            tags,
            applications: file.applications.unwrap_or_else(|| {
                DEFAULT_APPLICATIONS.iter().map(|a| a.to_string()).collect()
            }),
            bootstrap_actions: file.bootstrap_actions,
            configurations: file.configurations,
            job_flow_role: file
                .job_flow_role
                .unwrap_or_else(|| DEFAULT_JOB_FLOW_ROLE.to_string()),
            service_role: file
                .service_role
                .unwrap_or_else(|| DEFAULT_SERVICE_ROLE.to_string()),
            log_uri: file.log_uri,
            visible_to_all_users: file.visible_to_all_users.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let base = [
            "sparksteps",
            "job.py",
            "--aws-region",
            "us-east-1",
            "--release-label",
            "emr-6.0.0",
            "--s3-bucket",
            "mybucket",
        ];
        Args::parse_from(base.iter().chain(extra))
    }

    #[test]
    fn defaults_without_file() {
        let s = Settings::resolve(&args(&[]), None).unwrap();
        assert_eq!(s.master, DEFAULT_MASTER);
        assert_eq!(s.slave, DEFAULT_SLAVE);
        assert_eq!(s.num_nodes, 1);
        assert_eq!(s.market, Market::OnDemand);
        assert_eq!(s.applications, ["Hadoop", "Spark"]);
        assert!(!s.keep_alive);
    }

    #[test]
    fn file_fills_what_the_command_line_leaves_out() {
        let file = ConfigFile::from_json(
            r#"{"master": "m5.large", "slave": "r5.xlarge", "num-nodes": 5, "ec2-key": "ops",
                "keep-alive": true, "name": "etl", "applications": ["Spark"]}"#,
        )
        .unwrap();
        let s = Settings::resolve(&args(&[]), Some(file)).unwrap();
        assert_eq!(s.master, "m5.large");
        assert_eq!(s.slave, "r5.xlarge");
        assert_eq!(s.num_nodes, 5);
        assert_eq!(s.ec2_key.as_deref(), Some("ops"));
        assert!(s.keep_alive);
        assert_eq!(s.name, "etl");
        assert_eq!(s.applications, ["Spark"]);
    }

    #[test]
    fn command_line_wins_over_file() {
        let file = ConfigFile::from_json(
            r#"{"master": "m5.large", "num-nodes": 5, "ec2-key": "ops",
                "tags": {"env": "prod", "team": "data"}}"#,
        )
        .unwrap();
        let s = Settings::resolve(
            &args(&[
                "--master",
                "c5.large",
                "--num-nodes",
                "2",
                "--ec2-key",
                "mine",
                "--tags",
                "env=dev",
            ]),
            Some(file),
        )
        .unwrap();
        assert_eq!(s.master, "c5.large");
        assert_eq!(s.num_nodes, 2);
        assert_eq!(s.ec2_key.as_deref(), Some("mine"));
        assert_eq!(
            s.tags,
            [
                Tag { key: "env".into(), value: "dev".into() },
                Tag { key: "team".into(), value: "data".into() },
            ]
        );
    }

    #[test]
    fn malformed_cli_tag_fails() {
        let err = Settings::resolve(&args(&["--tags", "oops"]), None).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedTag(_)));
    }
}
