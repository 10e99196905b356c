//! One sparksteps run: create or reuse a cluster, stage artifacts, submit steps.
//!
//! Steps are submitted right after `RunJobFlow` returns. Nothing here waits
//! for a new cluster to become ready or checks that the steps ran. Whether
//! steps added to a still-provisioning cluster are held until it is ready is
//! up to EMR.

use tracing::{debug, info};

use crate::cluster::{build_cluster_config, ConfigFile};
use crate::cmd::sparksteps::Args;
use crate::emr::EmrApi;
use crate::error::Result;
use crate::s3::ObjectStore;
use crate::steps::upload_and_build_steps;

/// What a run submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub cluster_id: String,
    /// `true` when the cluster was created by this run.
    pub created: bool,
    pub step_ids: Vec<String>,
}

pub async fn run<E, S>(args: &Args, emr: &E, store: &S) -> Result<Submission>
where
    E: EmrApi + ?Sized,
    S: ObjectStore + ?Sized,
{
    // Configuration is checked before any network call, also when an
    // existing cluster is reused and the payload goes unused.
    let file = args.conf_file.as_deref().map(ConfigFile::load).transpose()?;
    let config = build_cluster_config(args, file)?;

    let (cluster_id, created) = match &args.cluster_id {
        Some(id) => {
            info!(cluster_id = %id, "reusing existing cluster");
            (id.clone(), false)
        }
        None => {
            debug!(
                payload = %serde_json::to_string(&config).unwrap_or_default(),
                "cluster configuration"
            );

            println!("Launching cluster...");
            let id = emr.run_job_flow(&config).await?;
            info!(cluster_id = %id, "created cluster");
            (id, true)
        }
    };
    // Reported before anything else can fail, so a failed submission can be
    // retried against the same cluster with --cluster-id.
    println!("Cluster ID: {cluster_id}");

    let steps = upload_and_build_steps(
        store,
        &args.s3_bucket,
        &args.app,
        args.submit_args(),
        args.app_args(),
        &args.uploads,
    )
    .await?;

    info!(cluster_id = %cluster_id, steps = steps.len(), "submitting steps");
    let step_ids = emr.add_job_flow_steps(&cluster_id, &steps).await?;
    println!("Submitted {} step(s): {}", step_ids.len(), step_ids.join(" "));

    Ok(Submission {
        cluster_id,
        created,
        step_ids,
    })
}
