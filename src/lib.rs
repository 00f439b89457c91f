//! Client-side re-filtering, aggregation and export of fleet operations
//! reports.
//!
//! A report arrives from the API as groups (housings, companies, months) of
//! members (riders) with raw metrics. Pages filter it by company or
//! housing, rebuild every total from the surviving members and flatten it
//! into rows for spreadsheet or PDF export.
pub mod classifier;
pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod output;
pub mod presets;
pub mod reports;
pub mod state;
pub mod types;
pub mod util;

pub use classifier::{company_of, Company, FilterType, Selection, KETA_ID_MIN_LEN};
pub use error::{ReportError, ReportResult};
pub use fetch::{fetch_report, FileReportSource, HttpReportSource, ReportQuery, ReportSource};
pub use loader::{normalize, parse_report, LoadReport};
pub use output::{export_rows, suggested_filename, Accessor, Cell, Column, ExportOptions, ExportRow};
pub use presets::ReportKind;
pub use reports::{apply_filter, apply_selection, filter_report, recompute_totals, split_by_company};
pub use state::{reduce, Action, LoadStatus, PageState, ReportSession};
pub use types::{Group, Member, Metric, Metrics, Rate, Rates, ReportPeriod, ReportRoot, Totals};
