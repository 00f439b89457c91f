// Entry point and high-level CLI flow.
//
// - `show` loads a report (from the API or a saved JSON file), applies the
//   company/housing selection and prints a group summary plus a preview of
//   the export rows.
// - `export` does the same load and writes the filtered rows as CSV/JSON,
//   or the payload the PDF renderer expects.
mod logging;

use anyhow::{bail, Result};
use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fleet_report::config::{self, Config};
use fleet_report::output::{self, pdf_payload, preview_export, preview_table_rows};
use fleet_report::reports::group_summary;
use fleet_report::state::{LoadStatus, PageState};
use fleet_report::util::{format_int, format_percent, format_quantity};
use fleet_report::{
    export_rows, suggested_filename, ExportOptions, ExportRow, FileReportSource, FilterType,
    HttpReportSource, ReportKind, ReportPeriod, ReportQuery, ReportSession, Selection,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fleet-report")]
#[command(about = "Filter, total and export fleet operations reports", long_about = None)]
struct Cli {
    /// Path to a fleet_report.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the group summary and a preview of the export rows
    Show {
        #[command(flatten)]
        source: SourceArgs,
        /// Number of export rows to preview
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
    /// Write the filtered report to a file
    Export {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, value_enum, default_value = "csv")]
        format: Format,
        /// Output directory (defaults to export.output_dir from the config)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Report page: rejections, housing or performance
    #[arg(long, default_value = "rejections")]
    report: String,
    /// Read the report payload from a JSON file instead of the API
    #[arg(long)]
    input: Option<PathBuf>,
    /// First day, YYYY-MM-DD (defaults to the first of this month)
    #[arg(long)]
    start: Option<String>,
    /// Last day, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    end: Option<String>,
    /// Company variant passed to the endpoint
    #[arg(long)]
    company: Option<String>,
    /// all, hunger or keta
    #[arg(long, default_value = "all")]
    filter: String,
    /// Only this housing (group id)
    #[arg(long)]
    housing: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
    Pdf,
}

fn resolve_period(args: &SourceArgs) -> Result<ReportPeriod> {
    let today = Local::now().date_naive();
    let first = today.with_day(1).unwrap_or(today);
    let start = args.start.clone().unwrap_or_else(|| first.format("%Y-%m-%d").to_string());
    let end = args.end.clone().unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
    Ok(ReportPeriod::parse(&start, &end)?)
}

/// Load the requested report into a fresh page session with the selection
/// from the command line already applied.
async fn load_page(config: &Config, args: &SourceArgs) -> Result<(ReportKind, PageState)> {
    let kind: ReportKind = args.report.parse()?;
    let period = resolve_period(args)?;
    let mut query = ReportQuery::new(kind.endpoint(), period);
    if let Some(c) = &args.company {
        query = query.with_company(c.clone());
    }

    let filter: FilterType = args.filter.parse()?;
    let mut selection = Selection::company(filter);
    if let Some(h) = &args.housing {
        selection = selection.with_housing(h.clone());
    }

    let session = ReportSession::new();
    session.select(selection);
    let state = match &args.input {
        Some(path) => session.load(&FileReportSource::new(path), &query).await,
        None => session.load(&HttpReportSource::new(&config.api)?, &query).await,
    };
    Ok((kind, state))
}

fn check_loaded(state: &PageState) -> Result<bool> {
    match state.status {
        LoadStatus::Failed => {
            let msg = state.message.clone().unwrap_or_default();
            bail!("{}", msg)
        }
        LoadStatus::Empty => {
            println!("{}\n", state.message.as_deref().unwrap_or_default());
            Ok(false)
        }
        _ => Ok(true),
    }
}

fn handle_show(kind: ReportKind, state: &PageState, rows: usize) -> Result<()> {
    if !check_loaded(state)? {
        return Ok(());
    }
    let Some(view) = state.view() else {
        return Ok(());
    };
    let totals = view.totals();

    println!("{}", kind.title());
    println!(
        "({} to {}, filter: {})\n",
        view.period.start, view.period.end, state.selection.filter
    );
    if let Some(load) = &state.load_report {
        if load.malformed_members > 0 {
            println!(
                "Note: {} members had no metrics and were counted as zero.",
                format_int(load.malformed_members)
            );
        }
    }
    println!("{}\n", preview_table_rows(&group_summary(&view), usize::MAX));
    println!(
        "Totals: {} members, {} accepted, {} rejected, rejection rate {}\n",
        format_int(totals.count),
        format_quantity(totals.sums.accepted),
        format_quantity(totals.sums.rejected),
        format_percent(totals.rates.rejection_rate)
    );

    let columns = kind.default_columns();
    println!(
        "{}\n",
        preview_export(&columns, export_rows(&view, &columns, ExportOptions::default()), rows)
    );
    Ok(())
}

fn handle_export(
    config: &Config,
    kind: ReportKind,
    state: &PageState,
    format: Format,
    out: Option<PathBuf>,
) -> Result<()> {
    let dir = out.unwrap_or_else(|| PathBuf::from(&config.export.output_dir));
    write_export(config, kind, state, format, &dir)?;
    Ok(())
}

/// Write the current snapshot into `dir`. A report without members still
/// exports its groups as placeholder rows; only a failed load or one with
/// no groups at all writes nothing.
fn write_export(
    config: &Config,
    kind: ReportKind,
    state: &PageState,
    format: Format,
    dir: &Path,
) -> Result<Option<PathBuf>> {
    match state.status {
        LoadStatus::Failed => bail!("{}", state.message.clone().unwrap_or_default()),
        LoadStatus::Empty => println!("{}\n", state.message.as_deref().unwrap_or_default()),
        _ => {}
    }
    let Some(snapshot) = state.export_snapshot().filter(|s| !s.report.groups.is_empty()) else {
        println!("Nothing to export.");
        return Ok(None);
    };

    std::fs::create_dir_all(dir)?;
    let options = ExportOptions {
        placeholder_rows: config.export.placeholder_rows,
    };
    let columns = kind.default_columns();
    let report = &snapshot.report;

    let extension = match format {
        Format::Csv => "csv",
        Format::Json => "json",
        Format::Pdf => "pdf.json",
    };
    let path = dir.join(suggested_filename(kind.name(), &report.period, snapshot.filter, extension));

    match format {
        Format::Csv => {
            let n = output::write_csv(&path, &columns, export_rows(report, &columns, options))?;
            println!("{} rows exported to {}", format_int(n), path.display());
        }
        Format::Json => {
            let rows: Vec<ExportRow> = export_rows(report, &columns, options).collect();
            output::write_json(&path, &rows)?;
            println!("{} rows exported to {}", format_int(rows.len()), path.display());
        }
        Format::Pdf => {
            let payload = pdf_payload(report, kind.title(), &config.export.language);
            output::write_json(&path, &payload)?;
            println!("PDF render payload written to {}", path.display());
        }
    }
    Ok(Some(path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.verbose)?;
    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Show { source, rows } => {
            let (kind, state) = load_page(&config, &source).await?;
            handle_show(kind, &state, rows)
        }
        Commands::Export {
            source,
            format,
            out,
        } => {
            let (kind, state) = load_page(&config, &source).await?;
            handle_export(&config, kind, &state, format, out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_report::state::reduce;
    use fleet_report::{normalize, Action};
    use serde_json::json;
    use tempfile::TempDir;

    fn loaded(payload: serde_json::Value) -> PageState {
        let (report, load) = normalize(payload, None).unwrap();
        let state = reduce(PageState::default(), Action::FetchStarted { request_id: 1 });
        reduce(
            state,
            Action::FetchSucceeded {
                request_id: 1,
                report,
                load,
            },
        )
    }

    #[test]
    fn vacant_housings_still_export_placeholder_rows() {
        let state = loaded(json!({
            "periodStart": "2024-05-01",
            "periodEnd": "2024-05-31",
            "groups": [
                { "groupId": "h1", "groupName": "Housing North", "members": [] },
                { "groupId": "h2", "groupName": "Housing South", "members": [] }
            ]
        }));
        assert_eq!(state.status, LoadStatus::Empty);

        let dir = TempDir::new().unwrap();
        let path = write_export(&Config::default(), ReportKind::Housing, &state, Format::Csv, dir.path())
            .unwrap()
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Housing North"));
        assert!(lines[2].contains("Housing South"));
    }

    #[test]
    fn nothing_is_written_without_groups() {
        let state = loaded(json!({ "periodStart": "2024-05-01", "periodEnd": "2024-05-31", "groups": [] }));
        let dir = TempDir::new().unwrap();
        let written = write_export(&Config::default(), ReportKind::Housing, &state, Format::Json, dir.path()).unwrap();
        assert!(written.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_load_is_an_error() {
        let state = reduce(PageState::default(), Action::FetchStarted { request_id: 1 });
        let state = reduce(
            state,
            Action::FetchFailed {
                request_id: 1,
                message: "The report service is unavailable.".into(),
            },
        );
        let dir = TempDir::new().unwrap();
        assert!(write_export(&Config::default(), ReportKind::Housing, &state, Format::Csv, dir.path()).is_err());
    }
}
