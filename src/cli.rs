use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "anomaly-chart",
    version,
    about = "Load an alert's anomalies and print the chart view as JSON"
)]
pub struct Args {
    #[arg(long)]
    pub alert_id: i64,
    /// Evaluate a detection configuration instead of reading persisted results.
    #[arg(long, default_value_t = false)]
    pub preview: bool,
    /// Preview changes to an existing alert.
    #[arg(long, requires = "preview")]
    pub edit: bool,
    /// Detection configuration to preview.
    #[arg(long)]
    pub yaml: Option<PathBuf>,
    /// Saved configuration used as the edit-preview reference.
    #[arg(long)]
    pub original_yaml: Option<PathBuf>,
    /// Metric bucket granularity, e.g. `1_DAYS` or `5_MINUTES`.
    #[arg(long)]
    pub granularity: Option<String>,
    #[arg(long, default_value_t = false)]
    pub dimension_exploration: bool,
    /// Window start in epoch milliseconds.
    #[arg(long, requires = "end")]
    pub start: Option<i64>,
    #[arg(long, requires = "start")]
    pub end: Option<i64>,
    /// Range preset applied after the initial load: 48h, 1w, 1m or 3m.
    #[arg(long, conflicts_with = "start")]
    pub preset: Option<String>,
    /// Baseline offset, e.g. `wo2w` or `median4w`.
    #[arg(long)]
    pub baseline: Option<String>,
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_edit_preview_arguments() {
        let args = Args::try_parse_from([
            "anomaly-chart",
            "--alert-id",
            "42",
            "--preview",
            "--edit",
            "--yaml",
            "live.yaml",
            "--start",
            "1000",
            "--end",
            "2000",
        ])
        .expect("args");
        assert_eq!(args.alert_id, 42);
        assert!(args.preview && args.edit);
        assert_eq!((args.start, args.end), (Some(1000), Some(2000)));
    }

    #[test]
    fn rejects_half_open_range() {
        assert!(Args::try_parse_from(["anomaly-chart", "--alert-id", "1", "--start", "5"]).is_err());
        assert!(Args::try_parse_from(["anomaly-chart", "--alert-id", "1", "--end", "5"]).is_err());
    }

    #[test]
    fn edit_requires_preview() {
        assert!(Args::try_parse_from(["anomaly-chart", "--alert-id", "1", "--edit"]).is_err());
        let args = Args::try_parse_from(["anomaly-chart", "--alert-id", "1"]).expect("args");
        assert!(!args.edit && !args.preview);
    }
}
