use fleet_report::classifier::{company_of, Company};
use fleet_report::output::PLACEHOLDER;
use fleet_report::*;
use serde_json::json;
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn period() -> ReportPeriod {
    ReportPeriod::parse("2024-05-01", "2024-05-31").unwrap()
}

fn member(id: &str, accepted: f64, rejected: f64) -> Member {
    Member::new(
        id,
        Metrics {
            accepted,
            rejected,
            ..Default::default()
        },
    )
}

fn group(name: &str, members: Vec<Member>) -> Group {
    Group {
        group_id: name.to_lowercase(),
        group_name: name.into(),
        members,
        group_totals: None,
    }
}

fn root(groups: Vec<Group>) -> ReportRoot {
    recompute_totals(&ReportRoot {
        period: period(),
        groups,
        totals: None,
    })
}

/// Two housings with riders from both companies, as the API sends them.
fn sample_report() -> ReportRoot {
    let raw = json!({
        "periodStart": "2024-05-01",
        "periodEnd": "2024-05-31",
        "groups": [
            { "groupId": 1, "groupName": "Housing North", "members": [
                { "workingId": "4411", "nameEN": "Omar", "metrics": {
                    "accepted": 320, "rejected": 12, "realRejected": 9, "shifts": 26,
                    "targetOrders": 300, "workingHours": 208, "targetHours": 240 } },
                { "workingId": 2024000123u64, "nameEN": "Yusuf", "metrics": {
                    "accepted": 150, "rejected": 30, "realRejected": 21, "shifts": 20,
                    "targetOrders": 300, "workingHours": 160, "targetHours": 240 } },
                { "workingId": "77", "nameEN": "Sami", "metrics": {
                    "accepted": 0, "rejected": 0, "shifts": 0 } }
            ]},
            { "groupId": 2, "groupName": "Housing South", "members": [
                { "workingId": "3000111222", "nameEN": "Karim", "metrics": {
                    "accepted": "410", "rejected": "8", "realRejected": 5, "shifts": 27,
                    "targetOrders": 300, "workingHours": 230, "targetHours": 240 } },
                { "workingId": null, "nameEN": "Unknown rider" }
            ]}
        ],
        "totals": { "count": 5, "sums": {
            "accepted": 880, "rejected": 50, "realRejected": 35, "shifts": 73,
            "targetOrders": 900, "workingHours": 598, "targetHours": 720 } }
    });
    normalize(raw, None).unwrap().0
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn identity_filter_preserves_totals() {
    let r = sample_report();
    let original = r.totals.clone().unwrap();
    let all = apply_filter(&r, FilterType::All);
    assert!(all.totals.unwrap().approx_eq(&original, 1e-9));
    for (before, after) in r.groups.iter().zip(&all.groups) {
        assert!(after.totals().approx_eq(&before.totals(), 1e-9));
    }
}

#[test]
fn filtering_is_idempotent() {
    let r = sample_report();
    for f in [FilterType::All, FilterType::Hunger, FilterType::Keta] {
        let once = apply_filter(&r, f);
        let twice = apply_filter(&once, f);
        assert_eq!(once, twice, "filter {}", f);
    }
}

#[test]
fn companies_partition_the_members() {
    let r = sample_report();
    let (hunger, keta) = split_by_company(&r);

    let ids = |root: &ReportRoot| -> Vec<String> {
        root.groups
            .iter()
            .flat_map(|g| g.members.iter().map(|m| m.working_id.clone()))
            .collect()
    };
    let all_ids = ids(&r);
    let h = ids(&hunger);
    let k = ids(&keta);

    assert_eq!(h.len() + k.len(), all_ids.len());
    let h_set: BTreeSet<_> = h.iter().collect();
    let k_set: BTreeSet<_> = k.iter().collect();
    assert!(h_set.is_disjoint(&k_set));
    let union: BTreeSet<_> = h_set.union(&k_set).cloned().collect();
    let expected: BTreeSet<_> = all_ids.iter().collect();
    assert_eq!(union, expected);

    assert!(h.iter().all(|id| company_of(id) == Company::Hunger));
    assert!(k.iter().all(|id| company_of(id) == Company::Keta));
    // missing id coerced to "" and treated as hunger
    assert!(h.contains(&String::new()));

    let sum = Totals::fold([hunger.totals.as_ref().unwrap(), keta.totals.as_ref().unwrap()]);
    assert!(sum.approx_eq(r.totals.as_ref().unwrap(), 1e-9));
}

#[test]
fn merged_rate_is_not_the_mean_of_rates() {
    let r = root(vec![
        group("A", vec![member("1", 100.0, 10.0)]),
        group("B", vec![member("2", 10.0, 5.0)]),
    ]);
    let g_rates: Vec<f64> = r.groups.iter().map(|g| g.totals().rates.rejection_rate).collect();
    assert!((g_rates[0] - 10.0).abs() < 1e-9);
    assert!((g_rates[1] - 50.0).abs() < 1e-9);

    let total = apply_filter(&r, FilterType::All).totals.unwrap();
    let expected = 15.0 / 110.0 * 100.0;
    assert!((total.rates.rejection_rate - expected).abs() < 1e-9);
    assert!((total.rates.rejection_rate - 30.0).abs() > 1.0);
}

#[test]
fn zero_denominator_gives_zero_rate() {
    let r = root(vec![group("Idle", vec![member("5", 0.0, 3.0), member("6", 0.0, 0.0)])]);
    let t = apply_filter(&r, FilterType::Hunger).totals.unwrap();
    for rate in Rate::ALL {
        let v = t.rates.get(rate);
        assert!(v.is_finite());
        assert_eq!(v, 0.0, "{}", rate);
    }
}

#[test]
fn emptied_groups_are_removed() {
    let r = root(vec![
        group("Only Keta", vec![member("1234567890", 5.0, 1.0)]),
        group("Mixed", vec![member("12", 5.0, 1.0), member("1234567891", 5.0, 1.0)]),
    ]);
    let out = apply_filter(&r, FilterType::Hunger);
    assert_eq!(out.groups.len(), 1);
    assert_eq!(out.groups[0].group_name, "Mixed");
    assert!(out.groups.iter().all(|g| !g.members.is_empty()));
}

#[test]
fn export_emits_placeholder_for_member_less_group() {
    let r = root(vec![
        group("Full", vec![member("1", 1.0, 0.0), member("2", 2.0, 1.0)]),
        group("Vacant", vec![]),
    ]);
    let columns = ReportKind::Rejections.default_columns();
    let rows: Vec<ExportRow> = export_rows(&r, &columns, ExportOptions::default()).collect();
    assert_eq!(rows.len(), 3);

    let placeholder = &rows[2];
    assert_eq!(placeholder.get("Group"), Some(&Cell::Text("Vacant".into())));
    assert_eq!(placeholder.get("Working ID"), Some(&Cell::Text(PLACEHOLDER.into())));
    assert_eq!(placeholder.get("Accepted"), Some(&Cell::Number(0.0)));
    assert_eq!(placeholder.get("Rejection Rate"), Some(&Cell::Text("0.00%".into())));
    assert_eq!(rows[1].get("Rejection Rate"), Some(&Cell::Text("50.00%".into())));
}

#[test]
fn hunger_filter_end_to_end() {
    let raw = json!({
        "groups": [{ "groupName": "H1", "members": [
            { "workingId": "123", "metrics": { "accepted": 10, "rejected": 2 } },
            { "workingId": "1234567890", "metrics": { "accepted": 20, "rejected": 0 } }
        ]}]
    });
    let (r, _) = normalize(raw, Some(period())).unwrap();
    let filter: FilterType = "hunger".parse().unwrap();
    let out = apply_filter(&r, filter);

    assert_eq!(out.groups.len(), 1);
    let g = &out.groups[0];
    assert_eq!(g.group_name, "H1");
    assert_eq!(g.members.len(), 1);
    assert_eq!(g.members[0].working_id, "123");
    let t = g.group_totals.as_ref().unwrap();
    assert_eq!(t.sums.accepted, 10.0);
    assert_eq!(t.sums.rejected, 2.0);
    assert_eq!(util::format_percent(t.rates.rejection_rate), "20.00%");

    let columns = vec![
        Column::parse("Group", "group.name").unwrap(),
        Column::parse("Rejection Rate", "group.rejectionRate").unwrap(),
    ];
    let row = export_rows(&out, &columns, ExportOptions::default()).next().unwrap();
    assert_eq!(row.get("Rejection Rate"), Some(&Cell::Text("20.00%".into())));
}

#[test]
fn export_after_filter_uses_filtered_snapshot() {
    let session = ReportSession::new();
    let report = sample_report();
    session.dispatch(Action::FetchStarted { request_id: 1 });
    session.dispatch(Action::FetchSucceeded {
        request_id: 1,
        report,
        load: LoadReport::default(),
    });
    session.select(Selection::company(FilterType::Keta));

    let snap = session.state().export_snapshot().unwrap();
    assert_eq!(snap.report.member_count(), 2);
    assert_eq!(
        suggested_filename("rejections", &snap.report.period, snap.filter, "xlsx"),
        "rejections_2024-05-01_2024-05-31_keta.xlsx"
    );
    let columns = ReportKind::Rejections.default_columns();
    assert_eq!(
        export_rows(&snap.report, &columns, ExportOptions::default()).count(),
        2
    );
}
