//! Banner eligibility evaluation
//!
//! Pure functions over a banner record and a point in time. The tracking
//! handlers and the placement selection both go through `evaluate`; nothing in
//! here touches the store.

use serde::Serialize;

use crate::models::Banner;

/// Why a banner may or may not be served right now.
///
/// Checks are ordered: an inactive banner reports `Inactive` even if it is also
/// outside its window or over its cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    Inactive,
    OutsideWindow,
    CapReached,
    NotTargeted,
}

/// Attributes of the recipient a banner is being considered for.
#[derive(Debug, Clone, Default)]
pub struct RecipientContext {
    pub department: Option<String>,
    pub device: Option<String>,
    pub geo: Option<String>,
    pub audience: Option<String>,
}

/// Evaluate a banner against the clock and an optional recipient context.
///
/// Window bounds are inclusive and unset bounds are unbounded. A banner with no
/// targeting facets matches everyone; with facets set, at least one facet must
/// contain a matching recipient attribute (case-insensitive).
pub fn evaluate(banner: &Banner, now: i64, recipient: Option<&RecipientContext>) -> Eligibility {
    if !banner.is_active {
        return Eligibility::Inactive;
    }

    if let Some(start) = banner.start_date {
        if now < start {
            return Eligibility::OutsideWindow;
        }
    }
    if let Some(end) = banner.end_date {
        if now > end {
            return Eligibility::OutsideWindow;
        }
    }

    if let Some(cap) = banner.max_clicks {
        if banner.current_clicks >= cap {
            return Eligibility::CapReached;
        }
    }

    if !matches_targeting(banner, recipient) {
        return Eligibility::NotTargeted;
    }

    Eligibility::Eligible
}

/// Pick the banner to serve for a placement: among eligible banners, lowest
/// `priority` wins, most recent `created_at` breaks ties.
pub fn select_banner<'a>(
    banners: &'a [Banner],
    now: i64,
    recipient: Option<&RecipientContext>,
) -> Option<&'a Banner> {
    let mut eligible: Vec<&Banner> = banners
        .iter()
        .filter(|b| evaluate(b, now, recipient) == Eligibility::Eligible)
        .collect();

    eligible.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(b.created_at.cmp(&a.created_at))
    });

    eligible.first().copied()
}

fn matches_targeting(banner: &Banner, recipient: Option<&RecipientContext>) -> bool {
    let facets: [(&[String], Option<&str>); 4] = match recipient {
        Some(ctx) => [
            (banner.target_departments.as_slice(), ctx.department.as_deref()),
            (banner.device_targeting.as_slice(), ctx.device.as_deref()),
            (banner.geo_targeting.as_slice(), ctx.geo.as_deref()),
            (banner.target_audience.as_slice(), ctx.audience.as_deref()),
        ],
        None => [
            (banner.target_departments.as_slice(), None),
            (banner.device_targeting.as_slice(), None),
            (banner.geo_targeting.as_slice(), None),
            (banner.target_audience.as_slice(), None),
        ],
    };

    let mut any_facet_set = false;
    for (facet, attribute) in facets {
        if facet.is_empty() {
            continue;
        }
        any_facet_set = true;
        if let Some(value) = attribute {
            if facet.iter().any(|f| f.eq_ignore_ascii_case(value)) {
                return true;
            }
        }
    }

    // No facets at all means the banner targets everyone.
    !any_facet_set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banner(id: i64) -> Banner {
        Banner {
            id,
            campaign_id: None,
            name: format!("banner-{}", id),
            html: "<p>hello</p>".to_string(),
            click_url: Some("https://example.com/promo".to_string()),
            is_active: true,
            start_date: None,
            end_date: None,
            current_clicks: 0,
            max_clicks: None,
            priority: 0,
            target_departments: vec![],
            device_targeting: vec![],
            geo_targeting: vec![],
            target_audience: vec![],
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn active_unbounded_banner_is_eligible() {
        let b = banner(1);
        assert_eq!(evaluate(&b, 1_700_000_100, None), Eligibility::Eligible);
    }

    #[test]
    fn inactive_banner_is_never_eligible() {
        let mut b = banner(1);
        b.is_active = false;
        // Inactive wins even with counters and window wide open
        assert_eq!(evaluate(&b, 1_700_000_100, None), Eligibility::Inactive);
    }

    #[test]
    fn future_start_date_is_outside_window() {
        let mut b = banner(1);
        b.start_date = Some(2_000_000_000);
        assert_eq!(evaluate(&b, 1_700_000_100, None), Eligibility::OutsideWindow);
    }

    #[test]
    fn past_end_date_is_outside_window() {
        let mut b = banner(1);
        b.end_date = Some(1_600_000_000);
        assert_eq!(evaluate(&b, 1_700_000_100, None), Eligibility::OutsideWindow);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let mut b = banner(1);
        b.start_date = Some(100);
        b.end_date = Some(200);
        assert_eq!(evaluate(&b, 100, None), Eligibility::Eligible);
        assert_eq!(evaluate(&b, 200, None), Eligibility::Eligible);
        assert_eq!(evaluate(&b, 99, None), Eligibility::OutsideWindow);
        assert_eq!(evaluate(&b, 201, None), Eligibility::OutsideWindow);
    }

    #[test]
    fn cap_reached_when_counter_hits_max() {
        let mut b = banner(1);
        b.max_clicks = Some(10);
        b.current_clicks = 10;
        assert_eq!(evaluate(&b, 1_700_000_100, None), Eligibility::CapReached);

        b.current_clicks = 9;
        assert_eq!(evaluate(&b, 1_700_000_100, None), Eligibility::Eligible);
    }

    #[test]
    fn no_facets_matches_everyone() {
        let b = banner(1);
        assert_eq!(evaluate(&b, 1_700_000_100, None), Eligibility::Eligible);

        let ctx = RecipientContext {
            department: Some("sales".to_string()),
            ..Default::default()
        };
        assert_eq!(evaluate(&b, 1_700_000_100, Some(&ctx)), Eligibility::Eligible);
    }

    #[test]
    fn facet_match_is_case_insensitive() {
        let mut b = banner(1);
        b.target_departments = vec!["Sales".to_string(), "Marketing".to_string()];

        let ctx = RecipientContext {
            department: Some("sales".to_string()),
            ..Default::default()
        };
        assert_eq!(evaluate(&b, 1_700_000_100, Some(&ctx)), Eligibility::Eligible);
    }

    #[test]
    fn unmatched_facets_are_not_targeted() {
        let mut b = banner(1);
        b.target_departments = vec!["engineering".to_string()];

        let ctx = RecipientContext {
            department: Some("sales".to_string()),
            ..Default::default()
        };
        assert_eq!(
            evaluate(&b, 1_700_000_100, Some(&ctx)),
            Eligibility::NotTargeted
        );

        // Facets set but no recipient context at all
        assert_eq!(evaluate(&b, 1_700_000_100, None), Eligibility::NotTargeted);
    }

    #[test]
    fn any_single_facet_match_suffices() {
        let mut b = banner(1);
        b.target_departments = vec!["engineering".to_string()];
        b.device_targeting = vec!["mobile".to_string()];

        let ctx = RecipientContext {
            department: Some("sales".to_string()),
            device: Some("mobile".to_string()),
            ..Default::default()
        };
        assert_eq!(evaluate(&b, 1_700_000_100, Some(&ctx)), Eligibility::Eligible);
    }

    #[test]
    fn selection_skips_ineligible_and_orders_by_priority() {
        let mut a = banner(1);
        a.priority = 1;
        a.is_active = false;

        let mut b = banner(2);
        b.priority = 2;

        let banners = vec![a, b];
        let selected = select_banner(&banners, 1_700_000_100, None).unwrap();
        assert_eq!(selected.id, 2);
    }

    #[test]
    fn selection_breaks_priority_ties_by_recency() {
        let mut a = banner(1);
        a.created_at = 1_600_000_000;
        let mut b = banner(2);
        b.created_at = 1_650_000_000;

        let banners = vec![a, b];
        let selected = select_banner(&banners, 1_700_000_100, None).unwrap();
        assert_eq!(selected.id, 2, "newer banner wins the priority tie");
    }

    #[test]
    fn selection_returns_none_when_nothing_is_eligible() {
        let mut a = banner(1);
        a.is_active = false;
        assert!(select_banner(&[a], 1_700_000_100, None).is_none());
    }
}
