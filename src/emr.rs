//! EMR control plane calls.
//!
//! [`EmrApi`] is the seam the dispatcher talks to. [`AwsEmr`] implements it
//! with `aws-sdk-emr`, translating the payload types of [`crate::cluster`] and
//! [`crate::steps`] into SDK request types.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_emr::error::DisplayErrorContext;
use aws_sdk_emr::types as sdk;
use aws_sdk_emr::Client;
use tracing::debug;

use crate::cluster::{
    BootstrapAction, ClusterConfig, Configuration, InstanceGroup, InstanceRole, Market, Tag,
};
use crate::error::{Error, Result};
use crate::steps::{ActionOnFailure, Step};

#[async_trait]
pub trait EmrApi: Send + Sync {
    /// Creates a cluster and returns its job flow id.
    async fn run_job_flow(&self, config: &ClusterConfig) -> Result<String>;

    /// Appends `steps` to the cluster's step list and returns the new step ids.
    async fn add_job_flow_steps(&self, cluster_id: &str, steps: &[Step]) -> Result<Vec<String>>;
}

#[derive(Clone, Debug)]
pub struct AwsEmr {
    client: Client,
}

impl AwsEmr {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl EmrApi for AwsEmr {
    async fn run_job_flow(&self, config: &ClusterConfig) -> Result<String> {
        const OP: &str = "RunJobFlow";

        let instance_groups: Vec<_> = config
            .instances
            .instance_groups
            .iter()
            .map(instance_group)
            .collect();
        let instances = sdk::JobFlowInstancesConfig::builder()
            .set_instance_groups(Some(instance_groups))
            .keep_job_flow_alive_when_no_steps(
                config.instances.keep_job_flow_alive_when_no_steps,
            )
            .termination_protected(config.instances.termination_protected)
            .set_ec2_key_name(config.instances.ec2_key_name.clone())
            .set_ec2_subnet_id(config.instances.ec2_subnet_id.clone())
            .build();

        let steps: Vec<_> = config.steps.iter().map(step_config).collect();
        let bootstrap_actions: Vec<_> = config
            .bootstrap_actions
            .iter()
            .map(bootstrap_action)
            .collect();
        let applications: Vec<_> = config
            .applications
            .iter()
            .map(|app| sdk::Application::builder().name(&app.name).build())
            .collect();

        let output = self
            .client
            .run_job_flow()
            .name(&config.name)
            .release_label(&config.release_label)
            .set_log_uri(config.log_uri.clone())
            .set_applications(Some(applications))
            .instances(instances)
            .set_steps(non_empty(steps))
            .set_bootstrap_actions(non_empty(bootstrap_actions))
            .set_configurations(non_empty(
                config.configurations.iter().map(configuration).collect(),
            ))
            .set_tags(non_empty(config.tags.iter().map(tag).collect()))
            .visible_to_all_users(config.visible_to_all_users)
            .job_flow_role(&config.job_flow_role)
            .service_role(&config.service_role)
            .send()
            .await
            .map_err(|e| Error::api(OP, DisplayErrorContext(e)))?;

        debug!(?output, "run job flow response");
        output
            .job_flow_id()
            .map(str::to_string)
            .ok_or_else(|| Error::api(OP, "response carried no job flow id"))
    }

    async fn add_job_flow_steps(&self, cluster_id: &str, steps: &[Step]) -> Result<Vec<String>> {
        const OP: &str = "AddJobFlowSteps";
        let steps: Vec<_> = steps.iter().map(step_config).collect();

        let output = self
            .client
            .add_job_flow_steps()
            .job_flow_id(cluster_id)
            .set_steps(Some(steps))
            .send()
            .await
            .map_err(|e| Error::api(OP, DisplayErrorContext(e)))?;

        Ok(output.step_ids().to_vec())
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn instance_group(group: &InstanceGroup) -> sdk::InstanceGroupConfig {
    let market = match group.market {
        Market::OnDemand => sdk::MarketType::OnDemand,
        Market::Spot => sdk::MarketType::Spot,
    };
    let role = match group.instance_role {
        InstanceRole::Master => sdk::InstanceRoleType::Master,
        InstanceRole::Core => sdk::InstanceRoleType::Core,
    };
    sdk::InstanceGroupConfig::builder()
        .name(&group.name)
        .market(market)
        .instance_role(role)
        .instance_type(&group.instance_type)
        .instance_count(group.instance_count)
        .set_bid_price(group.bid_price.clone())
        .build()
}

fn step_config(step: &Step) -> sdk::StepConfig {
    let action = match step.action_on_failure {
        ActionOnFailure::TerminateCluster => sdk::ActionOnFailure::TerminateCluster,
        ActionOnFailure::CancelAndWait => sdk::ActionOnFailure::CancelAndWait,
        ActionOnFailure::Continue => sdk::ActionOnFailure::Continue,
    };
    let jar_step = sdk::HadoopJarStepConfig::builder()
        .jar(&step.hadoop_jar_step.jar)
        .set_args(Some(step.hadoop_jar_step.args.clone()))
        .build();
    sdk::StepConfig::builder()
        .name(&step.name)
        .action_on_failure(action)
        .hadoop_jar_step(jar_step)
        .build()
}

fn bootstrap_action(action: &BootstrapAction) -> sdk::BootstrapActionConfig {
    let script = sdk::ScriptBootstrapActionConfig::builder()
        .path(&action.script_bootstrap_action.path)
        .set_args(non_empty(action.script_bootstrap_action.args.clone()))
        .build();
    sdk::BootstrapActionConfig::builder()
        .name(&action.name)
        .script_bootstrap_action(script)
        .build()
}

fn configuration(conf: &Configuration) -> sdk::Configuration {
    let properties: HashMap<String, String> = conf
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    sdk::Configuration::builder()
        .set_classification(conf.classification.clone())
        .set_properties(if properties.is_empty() { None } else { Some(properties) })
        .set_configurations(non_empty(
            conf.configurations.iter().map(configuration).collect(),
        ))
        .build()
}

fn tag(tag: &Tag) -> sdk::Tag {
    sdk::Tag::builder().key(&tag.key).value(&tag.value).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn step_translation_keeps_argument_order() {
        let step = Step::command(
            "Run job.py",
            ActionOnFailure::Continue,
            vec!["spark-submit".into(), "s3://b/k".into(), "--n".into()],
        );
        let converted = step_config(&step);
        assert_eq!(converted.name(), Some("Run job.py"));
        assert_eq!(converted.action_on_failure(), Some(&sdk::ActionOnFailure::Continue));
        let jar = converted.hadoop_jar_step().unwrap();
        assert_eq!(jar.jar(), Some("command-runner.jar"));
        assert_eq!(jar.args(), ["spark-submit", "s3://b/k", "--n"]);
    }

    #[test]
    fn instance_group_translation() {
        let group = InstanceGroup {
            name: "Slave Nodes".into(),
            market: Market::Spot,
            instance_role: InstanceRole::Core,
            instance_type: "m4.2xlarge".into(),
            instance_count: 2,
            bid_price: Some("0.3".into()),
        };
        let converted = instance_group(&group);
        assert_eq!(converted.market(), Some(&sdk::MarketType::Spot));
        assert_eq!(converted.instance_count(), Some(2));
        assert_eq!(converted.bid_price(), Some("0.3"));
    }

    #[test]
    fn bootstrap_action_translation() {
        let action = BootstrapAction {
            name: "deps".into(),
            script_bootstrap_action: crate::cluster::ScriptBootstrapAction {
                path: "s3://b/boot.sh".into(),
                args: Vec::new(),
            },
        };
        let converted = bootstrap_action(&action);
        assert_eq!(converted.name(), Some("deps"));
        let script = converted.script_bootstrap_action().unwrap();
        assert_eq!(script.path(), Some("s3://b/boot.sh"));
        assert!(script.args().is_empty());
    }

    #[test]
    fn nested_configuration_translation() {
        let conf = Configuration {
            classification: Some("spark-env".into()),
            properties: BTreeMap::new(),
            configurations: vec![Configuration {
                classification: Some("export".into()),
                properties: BTreeMap::from([("PYSPARK_PYTHON".into(), "python3".into())]),
                configurations: Vec::new(),
            }],
        };
        let converted = configuration(&conf);
        assert_eq!(converted.classification(), Some("spark-env"));
        assert!(converted.properties().is_none());
        let inner = &converted.configurations()[0];
        assert_eq!(
            inner.properties().and_then(|p| p.get("PYSPARK_PYTHON")).map(String::as_str),
            Some("python3")
        );
    }
}
