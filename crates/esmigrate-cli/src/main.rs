//! esmigrate binary.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use esmigrate_cli::{load_mappings, Args, RunConfig};
use esmigrate_client::Client;
use esmigrate_core::{TokioClock, Workflow};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("esmigrate=info".parse()?))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("migration failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = RunConfig::from(&args);
    let mappings = load_mappings(&args.mapping_source(), &args.alias)?;
    let plan = args.plan(mappings);

    info!(
        alias = %plan.alias,
        hosts = ?config.client.hosts,
        "starting migration"
    );

    let client = Client::connect(config.client)?;
    let workflow = Workflow::new(Arc::new(client), Arc::new(TokioClock), config.migration);
    let report = workflow.run(&plan).await?;

    info!(
        alias = %report.cutover.alias,
        source = ?report.source,
        dest = %report.dest,
        documents = report.documents,
        deleted_old = report.deleted_old,
        "index migration complete"
    );
    Ok(())
}
