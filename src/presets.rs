use crate::error::{ReportError, ReportResult};
use crate::output::{Accessor, Column};
use crate::types::{Metric, Rate};
use std::fmt;
use std::str::FromStr;

/// The report pages that share the filter/aggregate/export flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Accepted/rejected orders per rider, grouped by housing.
    Rejections,
    /// Riders per housing with shifts and working hours.
    Housing,
    /// Orders and hours against targets, grouped by company.
    Performance,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [
        ReportKind::Rejections,
        ReportKind::Housing,
        ReportKind::Performance,
    ];

    /// Filename prefix for exports.
    pub fn name(self) -> &'static str {
        match self {
            ReportKind::Rejections => "rejections",
            ReportKind::Housing => "housing",
            ReportKind::Performance => "performance",
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            ReportKind::Rejections => "reports/rejections",
            ReportKind::Housing => "reports/housing",
            ReportKind::Performance => "reports/performance",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ReportKind::Rejections => "Rider Rejections Report",
            ReportKind::Housing => "Housing Report",
            ReportKind::Performance => "Rider Performance Report",
        }
    }

    pub fn default_columns(self) -> Vec<Column> {
        use Accessor::*;
        let mut cols = vec![
            Column::new("Group", GroupName),
            Column::new("Working ID", WorkingId),
            Column::new("Name (AR)", NameAr),
            Column::new("Name (EN)", NameEn),
        ];
        match self {
            ReportKind::Rejections => cols.extend([
                Column::new("Accepted", MemberMetric(Metric::Accepted)),
                Column::new("Rejected", MemberMetric(Metric::Rejected)),
                Column::new("Real Rejected", MemberMetric(Metric::RealRejected)),
                Column::new("Rejection Rate", MemberRate(Rate::RejectionRate)),
                Column::new("Real Rejection Rate", MemberRate(Rate::RealRejectionRate)),
            ]),
            ReportKind::Housing => cols.extend([
                Column::new("Company", Company),
                Column::new("Shifts", MemberMetric(Metric::Shifts)),
                Column::new("Working Hours", MemberMetric(Metric::WorkingHours)),
                Column::new("Housing Riders", GroupCount),
            ]),
            ReportKind::Performance => cols.extend([
                Column::new("Accepted", MemberMetric(Metric::Accepted)),
                Column::new("Target Orders", MemberMetric(Metric::TargetOrders)),
                Column::new("Orders Achievement", MemberRate(Rate::OrdersAchievement)),
                Column::new("Working Hours", MemberMetric(Metric::WorkingHours)),
                Column::new("Target Hours", MemberMetric(Metric::TargetHours)),
                Column::new("Hours Achievement", MemberRate(Rate::HoursAchievement)),
            ]),
        }
        cols
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> ReportResult<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        ReportKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| ReportError::InvalidReportKind(s.to_string()))
    }
}
