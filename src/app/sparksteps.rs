use anyhow::Context;
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use sparksteps::cmd::sparksteps::Args;
use sparksteps::dispatch;
use sparksteps::emr::AwsEmr;
use sparksteps::s3::S3Store;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,sparksteps=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    // Credentials come from the default provider chain; only the region is ours.
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(args.aws_region.clone()))
        .load()
        .await;
    let emr = AwsEmr::new(&sdk_config);
    let store = S3Store::new(&sdk_config);

    let submission = dispatch::run(&args, &emr, &store)
        .await
        .with_context(|| format!("failed to submit {}", args.app.display()))?;
    tracing::debug!(?submission, "done");
    Ok(())
}
