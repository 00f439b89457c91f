use crate::error::{ReportError, ReportResult};
use crate::types::{Group, Member, Metric, Metrics, ReportPeriod, ReportRoot, Totals};
use crate::util::{parse_date_safe, value_as_f64, value_as_text};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

// Report envelope fields, in lookup order. Endpoints disagree on casing and
// naming; the first non-null spelling wins.
const PERIOD_START_KEYS: &[&str] = &["periodStart", "startDate", "start_date", "from"];
const PERIOD_END_KEYS: &[&str] = &["periodEnd", "endDate", "end_date", "to"];
const GROUPS_KEYS: &[&str] = &["groups", "data", "housings", "companies", "months"];
const ERRORS_KEYS: &[&str] = &["errors", "Errors"];
const SUCCESS_KEYS: &[&str] = &["success", "Success", "isSuccess"];

const WORKING_ID_KEYS: &[&str] = &["workingId", "workingID", "working_id", "WorkingId"];
const NAME_AR_KEYS: &[&str] = &["nameAR", "nameAr", "name_ar", "NameAR"];
const NAME_EN_KEYS: &[&str] = &["nameEN", "nameEn", "name_en", "NameEN"];
const GROUP_ID_KEYS: &[&str] = &["groupId", "housingId", "companyId", "id", "month"];
const GROUP_NAME_KEYS: &[&str] = &["groupName", "housingName", "companyName", "name"];
const MEMBERS_KEYS: &[&str] = &["members", "riders", "employees", "details"];
const GROUP_TOTALS_KEYS: &[&str] = &["groupTotals", "totals"];
const COUNT_KEYS: &[&str] = &["count", "membersCount", "ridersCount", "total"];

/// Diagnostics collected while normalizing a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub groups: usize,
    pub members: usize,
    /// Members without a usable metrics object, loaded as all-zero.
    pub malformed_members: usize,
    /// Members whose working id was absent.
    pub missing_ids: usize,
    pub server_totals: bool,
}

/// Parse a JSON document into a typed report.
pub fn parse_report(json: &str, fallback: Option<ReportPeriod>) -> ReportResult<(ReportRoot, LoadReport)> {
    let value: Value = serde_json::from_str(json)?;
    normalize(value, fallback)
}

/// Read and normalize a report saved on disk.
pub fn load_from_path(path: &Path, fallback: Option<ReportPeriod>) -> ReportResult<(ReportRoot, LoadReport)> {
    let text = std::fs::read_to_string(path)?;
    parse_report(&text, fallback)
}

/// Convert a raw payload into a [`ReportRoot`].
///
/// Unknown shapes are defaulted here so nothing downstream needs optional
/// chaining: ids become strings, numbers may arrive as strings, a member
/// without metrics is kept with zero metrics. Totals the server sends are
/// kept; any total (or part of one) it leaves out is derived from the
/// members. `fallback` supplies the period when the payload has none (the
/// period that was requested).
pub fn normalize(value: Value, fallback: Option<ReportPeriod>) -> ReportResult<(ReportRoot, LoadReport)> {
    let value = unwrap_envelope(value);
    let Value::Object(map) = value else {
        return Err(ReportError::Malformed("expected a JSON object".to_string()));
    };

    if let Some(msg) = api_error(&map) {
        return Err(ReportError::Api(msg));
    }

    let period = match (date_of(pick(&map, PERIOD_START_KEYS)), date_of(pick(&map, PERIOD_END_KEYS))) {
        (Some(s), Some(e)) => ReportPeriod::new(s, e)?,
        _ => fallback.ok_or(ReportError::MissingPeriod)?,
    };

    let raw_groups = match pick(&map, GROUPS_KEYS) {
        None => &[][..],
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => return Err(ReportError::Malformed("report groups must be an array".to_string())),
    };

    let mut load = LoadReport::default();
    let mut groups = Vec::new();
    for g in raw_groups {
        let Some(group_map) = g.as_object() else {
            warn!("skipping report group that is not an object");
            continue;
        };
        let members: Vec<Member> = pick(group_map, MEMBERS_KEYS)
            .and_then(Value::as_array)
            .map(|items| items.iter().map(|m| normalize_member(m, &mut load)).collect())
            .unwrap_or_default();
        load.members += members.len();
        let derived = Totals::from_members(&members);
        let group_totals = pick(group_map, GROUP_TOTALS_KEYS)
            .and_then(|t| parse_totals(t, &derived))
            .unwrap_or(derived);
        groups.push(Group {
            group_id: value_as_text(pick(group_map, GROUP_ID_KEYS)),
            group_name: value_as_text(pick(group_map, GROUP_NAME_KEYS)),
            members,
            group_totals: Some(group_totals),
        });
    }
    load.groups = groups.len();

    let derived = Totals::from_members(groups.iter().flat_map(|g| &g.members));
    let server_totals = map.get("totals").and_then(|t| parse_totals(t, &derived));
    load.server_totals = server_totals.is_some();

    let root = ReportRoot {
        period,
        groups,
        totals: Some(server_totals.unwrap_or(derived)),
    };

    if load.malformed_members > 0 {
        warn!(
            malformed = load.malformed_members,
            "report contained members without metrics; loaded them as zero"
        );
    }
    debug!(groups = load.groups, members = load.members, "normalized report payload");
    Ok((root, load))
}

/// Some endpoints wrap the report in `{ "data": { ... } }` or `{ "result": ... }`.
fn unwrap_envelope(value: Value) -> Value {
    if let Value::Object(map) = &value {
        for key in ["result", "Result", "report"] {
            if let Some(inner @ Value::Object(_)) = map.get(key) {
                return inner.clone();
            }
        }
        if let Some(inner @ Value::Object(o)) = map.get("data") {
            if o.contains_key("groups") || o.contains_key("periodStart") {
                return inner.clone();
            }
        }
    }
    value
}

fn api_error(map: &Map<String, Value>) -> Option<String> {
    let text = match pick(map, ERRORS_KEYS) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Array(items)) if !items.is_empty() => Some(
            items
                .iter()
                .map(|v| value_as_text(Some(v)))
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => None,
    };
    let success = pick(map, SUCCESS_KEYS).and_then(Value::as_bool);
    match (success, text) {
        (_, Some(t)) if !t.is_empty() => Some(t),
        (Some(false), _) => Some("The report request was not successful.".to_string()),
        _ => None,
    }
}

fn date_of(v: Option<&Value>) -> Option<chrono::NaiveDate> {
    match v {
        Some(Value::String(s)) => parse_date_safe(Some(s)),
        _ => None,
    }
}

fn pick<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

fn normalize_member(value: &Value, load: &mut LoadReport) -> Member {
    let Some(map) = value.as_object() else {
        load.malformed_members += 1;
        load.missing_ids += 1;
        return Member::default();
    };

    let working_id = value_as_text(pick(map, WORKING_ID_KEYS));
    if working_id.is_empty() {
        load.missing_ids += 1;
    }

    // Prefer the nested metrics object; fall back to metric keys sitting
    // directly on the member.
    let metrics = match map.get("metrics").and_then(Value::as_object) {
        Some(m) => metrics_from_map(m, &[]).0,
        None => {
            let (flat, found) = metrics_from_map(map, &["metrics"]);
            if found == 0 {
                load.malformed_members += 1;
            }
            flat
        }
    };

    Member {
        working_id,
        name_ar: value_as_text(pick(map, NAME_AR_KEYS)),
        name_en: value_as_text(pick(map, NAME_EN_KEYS)),
        metrics,
    }
}

/// Numeric entries of `map` as metrics, plus how many entries were taken.
/// Named metrics fill their slots; other numeric entries go to `extra`
/// unless listed in `skip` or known to be identity fields.
fn metrics_from_map(map: &Map<String, Value>, skip: &[&str]) -> (Metrics, usize) {
    let mut metrics = Metrics::default();
    let taken = overlay_metrics(&mut metrics, map, skip);
    (metrics, taken)
}

fn overlay_metrics(metrics: &mut Metrics, map: &Map<String, Value>, skip: &[&str]) -> usize {
    let mut taken = 0;
    for (key, value) in map {
        if skip.contains(&key.as_str()) || is_identity_key(key) {
            continue;
        }
        let Some(n) = value_as_f64(value) else {
            continue;
        };
        match Metric::from_key(key) {
            Some(metric) => metrics.set(metric, n),
            None => {
                metrics.extra.insert(key.clone(), n);
            }
        }
        taken += 1;
    }
    taken
}

fn is_identity_key(key: &str) -> bool {
    WORKING_ID_KEYS
        .iter()
        .chain(NAME_AR_KEYS)
        .chain(NAME_EN_KEYS)
        .any(|k| *k == key)
        || key.ends_with("Id")
        || key.ends_with("ID")
        || key.eq_ignore_ascii_case("id")
        || key.to_ascii_lowercase().ends_with("rate")
        || key.eq_ignore_ascii_case("phone")
}

/// Server-sent totals laid over `derived`: the count and every sum the
/// server states win, anything it leaves out comes from the members. Rates
/// are always re-derived from the resulting sums.
fn parse_totals(value: &Value, derived: &Totals) -> Option<Totals> {
    let map = value.as_object()?;
    let count = pick(map, COUNT_KEYS)
        .and_then(value_as_f64)
        .map(|c| c.max(0.0) as usize)
        .unwrap_or(derived.count);
    let mut sums = derived.sums.clone();
    match map.get("sums").and_then(Value::as_object) {
        Some(s) => overlay_metrics(&mut sums, s, &[]),
        None => overlay_metrics(&mut sums, map, COUNT_KEYS),
    };
    Some(Totals::from_sums(count, sums))
}
