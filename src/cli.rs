mod args;

pub use args::{Cli, Command, DetectArgs, ListArgs};

use std::sync::Arc;

use driftscan::batch::CancelFlag;
use driftscan::config::DetectorConfig;
use driftscan::error::DriftError;
use driftscan::output;
use driftscan::sources::{StateSource, open_source};
use driftscan::terraform::TerraformStateSource;

/// Runs `detect`. Returns whether any resource drifted.
pub async fn detect(args: DetectArgs) -> Result<bool, DriftError> {
    let mut config = DetectorConfig::load(args.config.as_deref())?;
    config.add_ignored(&args.ignore);
    config.add_identities(&args.identity);
    if let Some(max_in_flight) = args.max_in_flight {
        config.max_in_flight = max_in_flight;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.timeout_secs = Some(timeout_secs);
    }

    let adapter = config.adapter();
    let observed = open_source(&args.observed, adapter.clone(), args.token)?;
    let declared =
        TerraformStateSource::open(&args.declared, &adapter, args.resource_type.as_deref())?;

    // A type filter narrows the run to what terraform manages of that type.
    let resource_ids = if args.resources.is_empty() && args.resource_type.is_some() {
        declared.list_resources().await?
    } else {
        args.resources
    };

    let cancel = CancelFlag::new();
    let coordinator = config
        .coordinator()
        .with_cancel_flag(cancel.clone())
        .with_span(tracing::info_span!("detect", observed = %args.observed));

    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling remaining resources");
            cancel.cancel();
        }
    });

    let outcome = coordinator
        .detect_sources(observed, Arc::new(declared), &resource_ids)
        .await;
    watcher.abort();
    let outcome = outcome?;

    println!("{}", output::render(&outcome, args.format)?);

    Ok(outcome
        .values()
        .any(|r| matches!(r, Ok(report) if report.has_drift())))
}

pub fn list(args: ListArgs) -> Result<(), DriftError> {
    let config = DetectorConfig::load(args.config.as_deref())?;
    let state = TerraformStateSource::open(
        &args.declared,
        &config.adapter(),
        args.resource_type.as_deref(),
    )?;

    tracing::info!(count = state.list().len(), path = %state.path().display(), "listing resources");
    println!("{}", output::render_entries(state.list()));
    Ok(())
}
