//! Error taxonomy for loading, filtering and exporting reports.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Report endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Report API rejected the request: {0}")]
    Api(String),

    #[error("Invalid report JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed report payload: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Unknown filter type: {0}")]
    InvalidFilter(String),

    #[error("Unknown column accessor: {0}")]
    InvalidAccessor(String),

    #[error("Unknown report kind: {0}")]
    InvalidReportKind(String),

    #[error("Invalid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Report period is missing")]
    MissingPeriod,
}

impl ReportError {
    /// Transport failures and 5xx responses may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReportError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ReportError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Short text suitable for a dismissable banner. No internals.
    pub fn user_message(&self) -> String {
        match self {
            ReportError::Http(_) | ReportError::Status { .. } => {
                "Could not load the report. Please try again.".to_string()
            }
            ReportError::Api(msg) => msg.clone(),
            ReportError::Json(_) | ReportError::Malformed(_) | ReportError::MissingPeriod => {
                "The server returned a report in an unexpected format.".to_string()
            }
            ReportError::Io(_) | ReportError::Csv(_) => "Could not write the export file.".to_string(),
            ReportError::Config(_) => "The configuration file is invalid.".to_string(),
            ReportError::InvalidFilter(v) => format!("Unknown filter: {}", v),
            ReportError::InvalidAccessor(v) => format!("Unknown column: {}", v),
            ReportError::InvalidReportKind(v) => format!("Unknown report: {}", v),
            ReportError::InvalidDate(v) => format!("Invalid date: {}", v),
            ReportError::InvalidDateRange { .. } => {
                "The start date must not be after the end date.".to_string()
            }
        }
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_server_errors_are_retryable() {
        let server = ReportError::Status { status: 503, body: String::new() };
        let client = ReportError::Status { status: 404, body: String::new() };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!ReportError::Api("denied".into()).is_retryable());
    }

    #[test]
    fn user_message_hides_details() {
        let e = ReportError::Status { status: 500, body: "stack trace here".into() };
        assert!(!e.user_message().contains("stack trace"));
        assert_eq!(ReportError::Api("No access".into()).user_message(), "No access");
    }
}
