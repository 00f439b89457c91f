use crate::classifier::{Company, FilterType, Selection};
use crate::types::{Group, GroupSummaryRow, Member, ReportRoot, Totals};
use crate::util::{format_percent, format_quantity};
use tracing::debug;

/// Restrict `root` to the members `keep` accepts and rebuild every total.
///
/// Groups left without members are dropped. Group totals are the sums over
/// the surviving members and the root totals fold the group sums, so rates
/// are always re-derived rather than averaged. `root` is left untouched.
pub fn filter_report<F>(root: &ReportRoot, mut keep: F) -> ReportRoot
where
    F: FnMut(&Group, &Member) -> bool,
{
    let groups: Vec<Group> = root
        .groups
        .iter()
        .filter_map(|g| {
            let members: Vec<Member> = g
                .members
                .iter()
                .filter(|m| keep(g, *m))
                .cloned()
                .collect();
            if members.is_empty() {
                None
            } else {
                Some(rebuild_group(g, members))
            }
        })
        .collect();
    with_root_totals(root, groups)
}

/// Apply a page selection. The `all` selection keeps the structure as is
/// (member-less groups included) and only rebuilds totals.
pub fn apply_selection(root: &ReportRoot, selection: &Selection) -> ReportRoot {
    if selection.is_all() {
        return recompute_totals(root);
    }
    let out = filter_report(root, |g, m| selection.includes(g, m));
    debug!(
        filter = %selection.filter,
        housing = ?selection.housing_id,
        groups = out.groups.len(),
        members = out.member_count(),
        "applied report selection"
    );
    out
}

pub fn apply_filter(root: &ReportRoot, filter: FilterType) -> ReportRoot {
    apply_selection(root, &Selection::company(filter))
}

/// Rebuild every total from the members without filtering anything.
pub fn recompute_totals(root: &ReportRoot) -> ReportRoot {
    let groups = root
        .groups
        .iter()
        .map(|g| rebuild_group(g, g.members.clone()))
        .collect();
    with_root_totals(root, groups)
}

/// Hunger and Keta views of the same report. Together they hold every
/// member exactly once.
pub fn split_by_company(root: &ReportRoot) -> (ReportRoot, ReportRoot) {
    (
        apply_filter(root, Company::Hunger.into()),
        apply_filter(root, Company::Keta.into()),
    )
}

fn rebuild_group(g: &Group, members: Vec<Member>) -> Group {
    let totals = Totals::from_members(&members);
    Group {
        group_id: g.group_id.clone(),
        group_name: g.group_name.clone(),
        members,
        group_totals: Some(totals),
    }
}

fn with_root_totals(root: &ReportRoot, groups: Vec<Group>) -> ReportRoot {
    let totals = Totals::fold(groups.iter().filter_map(|g| g.group_totals.as_ref()));
    ReportRoot {
        period: root.period,
        groups,
        totals: Some(totals),
    }
}

/// One console/export row per group with its headline figures.
pub fn group_summary(root: &ReportRoot) -> Vec<GroupSummaryRow> {
    root.groups
        .iter()
        .map(|g| {
            let t = g.totals();
            GroupSummaryRow {
                group: if g.group_name.is_empty() {
                    g.group_id.clone()
                } else {
                    g.group_name.clone()
                },
                members: t.count,
                accepted: format_quantity(t.sums.accepted),
                rejected: format_quantity(t.sums.rejected),
                rejection_rate: format_percent(t.rates.rejection_rate),
                orders_achievement: format_percent(t.rates.orders_achievement),
                hours_achievement: format_percent(t.rates.hours_achievement),
            }
        })
        .collect()
}
