use anomaly_chart_core::{cli, config, models, services, state, time};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

fn read_config_file(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|path| {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection config {}", path.display()))
    })
    .transpose()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config::log_filter_from_env())
            }),
        )
        .init();

    let config = config::ChartConfig::from_env()?;

    let analysis_range = match (args.start, args.end) {
        (Some(start), Some(end)) => Some(time::AnalysisRange::new(start, end)?),
        _ => None,
    };
    let options = state::ViewOptions {
        alert_id: args.alert_id,
        is_preview_mode: args.preview,
        is_edit_mode: args.edit,
        granularity: args.granularity.clone(),
        dimension_exploration: args.dimension_exploration,
        alert_yaml: read_config_file(args.yaml.as_deref())?,
        original_yaml: read_config_file(args.original_yaml.as_deref())?,
        time_window_ms: Some(config.time_window_ms),
        analysis_range,
    };

    let http = reqwest::Client::new();
    let api = Arc::new(services::client::HttpDetectionApi::new(
        &config.base_url,
        http,
        config.request_timeout,
    ));
    let controller = services::controller::DetailsController::new(
        api,
        Arc::new(services::notify::TracingNotifier),
        options,
        &config,
    )?;

    let mut outcome = if args.preview {
        controller.request_preview().await
    } else {
        controller.start().await
    };
    if let Some(preset) = args.preset.as_deref() {
        let preset: time::RangePreset = preset.parse()?;
        outcome = controller.select_preset(preset).await?;
    }
    if let Some(baseline) = args.baseline.as_deref() {
        let offset: models::MetricOffset = baseline.parse()?;
        if let Err(err) = controller.select_baseline(offset).await {
            tracing::warn!(error = %err, "baseline refresh failed");
        }
    }

    let view = controller.view().await;
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&view)?
    } else {
        serde_json::to_string(&view)?
    };
    println!("{rendered}");

    if outcome == services::controller::PipelineOutcome::Failed {
        anyhow::bail!("alert {} failed to load", args.alert_id);
    }
    Ok(())
}
