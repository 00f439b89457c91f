use crate::classifier::{company_of, FilterType};
use crate::error::{ReportError, ReportResult};
use crate::types::{Group, Member, Metric, Rate, ReportPeriod, ReportRoot, Totals};
use crate::util::{format_iso_date, format_percent, format_quantity};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

/// Text used for member columns on a group's placeholder row.
pub const PLACEHOLDER: &str = "-";

/// Where a column takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    PeriodStart,
    PeriodEnd,
    GroupId,
    GroupName,
    GroupCount,
    GroupMetric(Metric),
    GroupRate(Rate),
    GroupExtra(String),
    WorkingId,
    NameAr,
    NameEn,
    Company,
    MemberMetric(Metric),
    MemberRate(Rate),
    MemberExtra(String),
}

impl FromStr for Accessor {
    type Err = ReportError;

    /// Paths look like `group.name`, `member.accepted`, `member.rejectionRate`.
    /// Unknown member/group keys are read from the extra metrics.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReportError::InvalidAccessor(s.to_string());
        let (scope, field) = s.trim().split_once('.').ok_or_else(invalid)?;
        if field.is_empty() {
            return Err(invalid());
        }
        let accessor = match (scope, field) {
            ("period", "start") => Accessor::PeriodStart,
            ("period", "end") => Accessor::PeriodEnd,
            ("group", "id") => Accessor::GroupId,
            ("group", "name") => Accessor::GroupName,
            ("group", "count") => Accessor::GroupCount,
            ("group", f) => match (Metric::from_key(f), Rate::from_key(f)) {
                (Some(m), _) => Accessor::GroupMetric(m),
                (None, Some(r)) => Accessor::GroupRate(r),
                (None, None) => Accessor::GroupExtra(f.to_string()),
            },
            ("member", "workingId") => Accessor::WorkingId,
            ("member", "nameAR") => Accessor::NameAr,
            ("member", "nameEN") => Accessor::NameEn,
            ("member", "company") => Accessor::Company,
            ("member", f) => match (Metric::from_key(f), Rate::from_key(f)) {
                (Some(m), _) => Accessor::MemberMetric(m),
                (None, Some(r)) => Accessor::MemberRate(r),
                (None, None) => Accessor::MemberExtra(f.to_string()),
            },
            _ => return Err(invalid()),
        };
        Ok(accessor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub header: String,
    pub accessor: Accessor,
}

impl Column {
    pub fn new(header: impl Into<String>, accessor: Accessor) -> Self {
        Column {
            header: header.into(),
            accessor,
        }
    }

    pub fn parse(header: impl Into<String>, path: &str) -> ReportResult<Self> {
        Ok(Column::new(header, path.parse()?))
    }
}

/// One exported value. Percentages are already rendered text; other
/// numbers stay numeric so spreadsheets can sum them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A flat row keyed by column header, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    cells: Vec<(String, Cell)>,
}

impl ExportRow {
    pub fn get(&self, header: &str) -> Option<&Cell> {
        self.cells.iter().find(|(h, _)| h == header).map(|(_, c)| c)
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for ExportRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (header, cell) in &self.cells {
            map.serialize_entry(header, cell)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Emit one placeholder row for every group without members.
    pub placeholder_rows: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            placeholder_rows: true,
        }
    }
}

/// Flatten `root` into rows: one per member, plus one placeholder row per
/// member-less group. The iterator is lazy; call again to start over.
pub fn export_rows<'a>(
    root: &'a ReportRoot,
    columns: &'a [Column],
    options: ExportOptions,
) -> impl Iterator<Item = ExportRow> + 'a {
    root.groups.iter().flat_map(move |group| {
        let totals = group_totals(group);
        let placeholder = (group.members.is_empty() && options.placeholder_rows)
            .then(|| build_row(root, group, &totals, None, columns));
        let member_rows = group
            .members
            .iter()
            .map(move |m| build_row(root, group, &totals, Some(m), columns));
        member_rows.chain(placeholder)
    })
}

fn group_totals(group: &Group) -> Cow<'_, Totals> {
    match &group.group_totals {
        Some(t) => Cow::Borrowed(t),
        None => Cow::Owned(Totals::from_members(&group.members)),
    }
}

fn build_row(
    root: &ReportRoot,
    group: &Group,
    totals: &Totals,
    member: Option<&Member>,
    columns: &[Column],
) -> ExportRow {
    let cells = columns
        .iter()
        .map(|c| (c.header.clone(), cell_for(&c.accessor, root, group, totals, member)))
        .collect();
    ExportRow { cells }
}

fn cell_for(
    accessor: &Accessor,
    root: &ReportRoot,
    group: &Group,
    totals: &Totals,
    member: Option<&Member>,
) -> Cell {
    match (accessor, member) {
        (Accessor::PeriodStart, _) => Cell::Text(format_iso_date(root.period.start)),
        (Accessor::PeriodEnd, _) => Cell::Text(format_iso_date(root.period.end)),
        (Accessor::GroupId, _) => Cell::Text(group.group_id.clone()),
        (Accessor::GroupName, _) => Cell::Text(group.group_name.clone()),
        (Accessor::GroupCount, _) => Cell::Number(totals.count as f64),
        (Accessor::GroupMetric(metric), _) => Cell::Number(totals.sums.get(*metric)),
        (Accessor::GroupRate(rate), _) => Cell::Text(format_percent(totals.rates.get(*rate))),
        (Accessor::GroupExtra(key), _) => Cell::Number(totals.sums.extra(key)),
        (Accessor::WorkingId, Some(m)) => Cell::Text(m.working_id.clone()),
        (Accessor::NameAr, Some(m)) => Cell::Text(m.name_ar.clone()),
        (Accessor::NameEn, Some(m)) => Cell::Text(m.name_en.clone()),
        (Accessor::Company, Some(m)) => Cell::Text(company_of(&m.working_id).to_string()),
        (Accessor::MemberMetric(metric), Some(m)) => Cell::Number(m.metrics.get(*metric)),
        (Accessor::MemberRate(rate), Some(m)) => Cell::Text(format_percent(m.rate(*rate))),
        (Accessor::MemberExtra(key), Some(m)) => Cell::Number(m.metrics.extra(key)),
        // placeholder row of a member-less group
        (Accessor::WorkingId | Accessor::NameAr | Accessor::NameEn | Accessor::Company, None) => {
            Cell::Text(PLACEHOLDER.to_string())
        }
        (Accessor::MemberMetric(_) | Accessor::MemberExtra(_), None) => Cell::Number(0.0),
        (Accessor::MemberRate(_), None) => Cell::Text(format_percent(0.0)),
    }
}

/// `<reportName>_<startDate>_<endDate>[_<filterType>].<ext>`; the filter
/// suffix is left out for `all`.
pub fn suggested_filename(
    report_name: &str,
    period: &ReportPeriod,
    filter: FilterType,
    extension: &str,
) -> String {
    let mut name = format!(
        "{}_{}_{}",
        report_name,
        format_iso_date(period.start),
        format_iso_date(period.end)
    );
    if filter != FilterType::All {
        name.push('_');
        name.push_str(filter.as_str());
    }
    name.push('.');
    name.push_str(extension.trim_start_matches('.'));
    name
}

/// Render props handed to the PDF renderer alongside the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfProps {
    pub start_date: String,
    pub end_date: String,
    pub language: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct PdfPayload<'a> {
    pub report: &'a ReportRoot,
    pub props: PdfProps,
}

pub fn pdf_payload<'a>(report: &'a ReportRoot, title: &str, language: &str) -> PdfPayload<'a> {
    PdfPayload {
        report,
        props: PdfProps {
            start_date: format_iso_date(report.period.start),
            end_date: format_iso_date(report.period.end),
            language: language.to_string(),
            title: title.to_string(),
        },
    }
}

/// Write the header row and every export row. Returns the data row count.
pub fn write_csv<I>(path: &Path, columns: &[Column], rows: I) -> ReportResult<usize>
where
    I: IntoIterator<Item = ExportRow>,
{
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(columns.iter().map(|c| c.header.as_str()))?;
    let mut written = 0usize;
    for r in rows {
        wtr.write_record(r.cells().map(|c| c.to_string()))?;
        written += 1;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = written, "wrote csv export");
    Ok(written)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> ReportResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    info!(path = %path.display(), "wrote json export");
    Ok(())
}

/// Markdown preview of the first `max_rows` export rows.
pub fn preview_export<I>(columns: &[Column], rows: I, max_rows: usize) -> String
where
    I: IntoIterator<Item = ExportRow>,
{
    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(|c| c.header.clone()));
    let mut any = false;
    for r in rows.into_iter().take(max_rows) {
        any = true;
        builder.push_record(r.cells().map(|c| match c {
            Cell::Number(n) => format_quantity(*n),
            Cell::Text(s) => s.clone(),
        }));
    }
    if !any {
        return "(no rows)".to_string();
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}
