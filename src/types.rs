use crate::error::{ReportError, ReportResult};
use crate::util::{parse_date_safe, ratio_pct};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tabled::Tabled;

/// Per-member counters reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Accepted,
    Rejected,
    RealRejected,
    Shifts,
    TargetOrders,
    WorkingHours,
    TargetHours,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Accepted,
        Metric::Rejected,
        Metric::RealRejected,
        Metric::Shifts,
        Metric::TargetOrders,
        Metric::WorkingHours,
        Metric::TargetHours,
    ];

    /// The camelCase key used on the wire and in column accessors.
    pub fn key(self) -> &'static str {
        match self {
            Metric::Accepted => "accepted",
            Metric::Rejected => "rejected",
            Metric::RealRejected => "realRejected",
            Metric::Shifts => "shifts",
            Metric::TargetOrders => "targetOrders",
            Metric::WorkingHours => "workingHours",
            Metric::TargetHours => "targetHours",
        }
    }

    /// Lookup ignoring case and underscores, so `real_rejected`,
    /// `RealRejected` and `realRejected` all resolve.
    pub fn from_key(key: &str) -> Option<Metric> {
        let wanted = normalize_key(key);
        Metric::ALL
            .into_iter()
            .find(|m| normalize_key(m.key()) == wanted)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Ratios derived from two metric sums, expressed in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rate {
    RejectionRate,
    RealRejectionRate,
    OrdersAchievement,
    HoursAchievement,
}

impl Rate {
    pub const ALL: [Rate; 4] = [
        Rate::RejectionRate,
        Rate::RealRejectionRate,
        Rate::OrdersAchievement,
        Rate::HoursAchievement,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Rate::RejectionRate => "rejectionRate",
            Rate::RealRejectionRate => "realRejectionRate",
            Rate::OrdersAchievement => "ordersAchievement",
            Rate::HoursAchievement => "hoursAchievement",
        }
    }

    pub fn from_key(key: &str) -> Option<Rate> {
        let wanted = normalize_key(key);
        Rate::ALL
            .into_iter()
            .find(|r| normalize_key(r.key()) == wanted)
    }

    pub fn numerator(self) -> Metric {
        match self {
            Rate::RejectionRate => Metric::Rejected,
            Rate::RealRejectionRate => Metric::RealRejected,
            Rate::OrdersAchievement => Metric::Accepted,
            Rate::HoursAchievement => Metric::WorkingHours,
        }
    }

    pub fn denominator(self) -> Metric {
        match self {
            Rate::RejectionRate | Rate::RealRejectionRate => Metric::Accepted,
            Rate::OrdersAchievement => Metric::TargetOrders,
            Rate::HoursAchievement => Metric::TargetHours,
        }
    }

    /// Evaluate the rate over a set of sums. Zero denominators yield 0.
    pub fn of(self, sums: &Metrics) -> f64 {
        ratio_pct(sums.get(self.numerator()), sums.get(self.denominator()))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub accepted: f64,
    pub rejected: f64,
    pub real_rejected: f64,
    pub shifts: f64,
    pub target_orders: f64,
    pub working_hours: f64,
    pub target_hours: f64,
    /// Numeric fields the backend sent that have no named slot above.
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, f64>,
}

impl Metrics {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Accepted => self.accepted,
            Metric::Rejected => self.rejected,
            Metric::RealRejected => self.real_rejected,
            Metric::Shifts => self.shifts,
            Metric::TargetOrders => self.target_orders,
            Metric::WorkingHours => self.working_hours,
            Metric::TargetHours => self.target_hours,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        let slot = match metric {
            Metric::Accepted => &mut self.accepted,
            Metric::Rejected => &mut self.rejected,
            Metric::RealRejected => &mut self.real_rejected,
            Metric::Shifts => &mut self.shifts,
            Metric::TargetOrders => &mut self.target_orders,
            Metric::WorkingHours => &mut self.working_hours,
            Metric::TargetHours => &mut self.target_hours,
        };
        *slot = value;
    }

    /// Value of an extra (unnamed) metric, 0 when absent.
    pub fn extra(&self, key: &str) -> f64 {
        self.extra.get(key).copied().unwrap_or(0.0)
    }

    /// Add `other` into `self`, field by field, including extras.
    pub fn accumulate(&mut self, other: &Metrics) {
        for metric in Metric::ALL {
            self.set(metric, self.get(metric) + other.get(metric));
        }
        for (key, value) in &other.extra {
            *self.extra.entry(key.clone()).or_insert(0.0) += value;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rates {
    pub rejection_rate: f64,
    pub real_rejection_rate: f64,
    pub orders_achievement: f64,
    pub hours_achievement: f64,
}

impl Rates {
    pub fn from_sums(sums: &Metrics) -> Self {
        Rates {
            rejection_rate: Rate::RejectionRate.of(sums),
            real_rejection_rate: Rate::RealRejectionRate.of(sums),
            orders_achievement: Rate::OrdersAchievement.of(sums),
            hours_achievement: Rate::HoursAchievement.of(sums),
        }
    }

    pub fn get(&self, rate: Rate) -> f64 {
        match rate {
            Rate::RejectionRate => self.rejection_rate,
            Rate::RealRejectionRate => self.real_rejection_rate,
            Rate::OrdersAchievement => self.orders_achievement,
            Rate::HoursAchievement => self.hours_achievement,
        }
    }
}

/// Derived totals for a set of members. Always rebuilt from sums.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub count: usize,
    pub sums: Metrics,
    pub rates: Rates,
}

impl Totals {
    /// Build totals from sums, deriving every rate.
    pub fn from_sums(count: usize, sums: Metrics) -> Self {
        let rates = Rates::from_sums(&sums);
        Totals { count, sums, rates }
    }

    pub fn from_members<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = &'a Member>,
    {
        let mut count = 0usize;
        let mut sums = Metrics::default();
        for m in members {
            count += 1;
            sums.accumulate(&m.metrics);
        }
        Totals::from_sums(count, sums)
    }

    /// Sum of sums over several totals; rates are re-derived, never averaged.
    pub fn fold<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a Totals>,
    {
        let mut count = 0usize;
        let mut sums = Metrics::default();
        for t in parts {
            count += t.count;
            sums.accumulate(&t.sums);
        }
        Totals::from_sums(count, sums)
    }

    /// Field-wise comparison within `tolerance`, extras included.
    pub fn approx_eq(&self, other: &Totals, tolerance: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= tolerance;
        self.count == other.count
            && Metric::ALL
                .into_iter()
                .all(|m| close(self.sums.get(m), other.sums.get(m)))
            && Rate::ALL
                .into_iter()
                .all(|r| close(self.rates.get(r), other.rates.get(r)))
            && self
                .sums
                .extra
                .keys()
                .chain(other.sums.extra.keys())
                .all(|k| close(self.sums.extra(k), other.sums.extra(k)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Member {
    #[serde(rename = "workingId")]
    pub working_id: String,
    #[serde(rename = "nameAR")]
    pub name_ar: String,
    #[serde(rename = "nameEN")]
    pub name_en: String,
    pub metrics: Metrics,
}

impl Member {
    pub fn new(working_id: impl Into<String>, metrics: Metrics) -> Self {
        Member {
            working_id: working_id.into(),
            metrics,
            ..Default::default()
        }
    }

    pub fn rate(&self, rate: Rate) -> f64 {
        rate.of(&self.metrics)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_id: String,
    pub group_name: String,
    pub members: Vec<Member>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_totals: Option<Totals>,
}

impl Group {
    /// Stored totals if present, otherwise derived from the members.
    pub fn totals(&self) -> Totals {
        self.group_totals
            .clone()
            .unwrap_or_else(|| Totals::from_members(&self.members))
    }
}

/// Inclusive calendar date range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
    #[serde(rename = "periodStart")]
    pub start: NaiveDate,
    #[serde(rename = "periodEnd")]
    pub end: NaiveDate,
}

impl ReportPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> ReportResult<Self> {
        if start > end {
            return Err(ReportError::InvalidDateRange { start, end });
        }
        Ok(ReportPeriod { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> ReportResult<Self> {
        let s = parse_date_safe(Some(start))
            .ok_or_else(|| ReportError::InvalidDate(start.to_string()))?;
        let e = parse_date_safe(Some(end)).ok_or_else(|| ReportError::InvalidDate(end.to_string()))?;
        ReportPeriod::new(s, e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRoot {
    #[serde(flatten)]
    pub period: ReportPeriod,
    pub groups: Vec<Group>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<Totals>,
}

impl ReportRoot {
    pub fn member_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }

    /// True when there is nothing to show for the period.
    pub fn is_empty(&self) -> bool {
        self.member_count() == 0
    }

    pub fn totals(&self) -> Totals {
        if let Some(t) = &self.totals {
            return t.clone();
        }
        let per_group: Vec<Totals> = self.groups.iter().map(Group::totals).collect();
        Totals::fold(&per_group)
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupSummaryRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Members")]
    #[tabled(rename = "Members")]
    pub members: usize,
    #[serde(rename = "Accepted")]
    #[tabled(rename = "Accepted")]
    pub accepted: String,
    #[serde(rename = "Rejected")]
    #[tabled(rename = "Rejected")]
    pub rejected: String,
    #[serde(rename = "RejectionRate")]
    #[tabled(rename = "RejectionRate")]
    pub rejection_rate: String,
    #[serde(rename = "OrdersAchievement")]
    #[tabled(rename = "OrdersAchievement")]
    pub orders_achievement: String,
    #[serde(rename = "HoursAchievement")]
    #[tabled(rename = "HoursAchievement")]
    pub hours_achievement: String,
}
