use std::fmt::Write;

use crate::dashboard::{DashboardSnapshot, ReportSnapshot};
use crate::markup::TextSegment;
use crate::models::{Customer, PredictionResult, RiskTier, TierSummary};
use crate::query::{FilterSet, Pagination};
use crate::recommendation::Recommendation;
use crate::risk;

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

pub fn format_currency(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{:02}", cents % 100)
}

pub fn pagination_label(pagination: &Pagination) -> String {
    match pagination.displayed_range() {
        Some((start, end)) => format!("Showing {} to {} of {}", start, end, pagination.total),
        None => format!("Showing 0 of {}", pagination.total),
    }
}

pub fn summarize_by_tier(customers: &[Customer]) -> Vec<TierSummary> {
    let mut map: std::collections::BTreeMap<RiskTier, (usize, f64)> =
        std::collections::BTreeMap::new();

    for customer in customers {
        let entry = map
            .entry(risk::classify(customer.churn_probability))
            .or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += customer.churn_probability;
    }

    let mut summaries: Vec<TierSummary> = map
        .into_iter()
        .map(|(tier, (count, total_probability))| TierSummary {
            tier,
            count,
            avg_probability: if count == 0 {
                0.0
            } else {
                total_probability / count as f64
            },
        })
        .collect();

    summaries.sort_by(|a, b| b.tier.cmp(&a.tier));
    summaries
}

pub fn build_dashboard_report(snapshot: &DashboardSnapshot) -> String {
    let stats = &snapshot.stats;
    let mut output = String::new();

    let _ = writeln!(output, "# Churn Dashboard");
    let _ = writeln!(
        output,
        "{} customers, {} churned ({} churn rate, {} retention)",
        stats.total_customers,
        stats.churned_customers,
        format_percent(stats.churn_rate),
        format_percent(stats.retention_rate)
    );
    let _ = writeln!(
        output,
        "Monthly recurring revenue {} (avg {}), avg lifetime value {}",
        format_currency(stats.total_mrr),
        format_currency(stats.avg_mrr),
        format_currency(stats.avg_clv)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Distribution");
    for (tier, count) in stats.risk_distribution() {
        let _ = writeln!(output, "- {} Risk: {}", tier, count);
    }

    if !stats.model_metrics.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Model Quality");
        for (name, value) in &stats.model_metrics {
            let _ = writeln!(output, "- {}: {}", name, format_percent(value * 100.0));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Churn by Tenure");
    if snapshot.tenure_churn.is_empty() {
        let _ = writeln!(output, "No tenure data available.");
    } else {
        for bucket in &snapshot.tenure_churn {
            let _ = writeln!(
                output,
                "- {} months: {} customers, predicted {}, actual {}",
                bucket.tenure_bucket,
                bucket.customers,
                format_percent(bucket.avg_churn_prob),
                format_percent(bucket.actual_churn_rate)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Charges");
    if snapshot.charges_distribution.is_empty() {
        let _ = writeln!(output, "No charge data available.");
    } else {
        for bucket in &snapshot.charges_distribution {
            let _ = writeln!(
                output,
                "- {}: {} retained, {} churned",
                bucket.charges_bucket, bucket.retained, bucket.churned
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Segments by {}", snapshot.segment_type.as_str());
    write_segments(&mut output, &snapshot.segments);

    output
}

pub fn build_segment_report(snapshot: &ReportSnapshot) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Churn Report");
    let _ = writeln!(
        output,
        "Generated for {} customers ({} high risk)",
        snapshot.stats.total_customers, snapshot.stats.high_risk_customers
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Model Metrics");
    if snapshot.model.metrics.is_empty() {
        let _ = writeln!(output, "No metrics reported.");
    } else {
        for (name, value) in &snapshot.model.metrics {
            let _ = writeln!(output, "- {}: {}", name, format_percent(value * 100.0));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Churn Drivers");
    let ranked = snapshot.model.ranked_features();
    if ranked.is_empty() {
        let _ = writeln!(output, "No feature importance reported.");
    } else {
        for (name, weight) in ranked.iter().take(10) {
            let _ = writeln!(output, "- {}: {:.4}", name, weight);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Segments by {}", snapshot.segment_type.as_str());
    write_segments(&mut output, &snapshot.segments);

    output
}

fn write_segments(output: &mut String, segments: &[crate::models::SegmentSummary]) {
    if segments.is_empty() {
        let _ = writeln!(output, "No segments reported.");
        return;
    }
    for segment in segments {
        let _ = writeln!(
            output,
            "- {}: {} customers, churn {}, avg CLV {}",
            segment.segment_name,
            segment.total_customers,
            format_percent(segment.churn_rate),
            format_currency(segment.avg_clv)
        );
    }
}

pub fn render_listing(
    customers: &[Customer],
    pagination: &Pagination,
    filters: &FilterSet,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "{} Customers Found", pagination.total);
    if !filters.is_empty() {
        let applied: Vec<String> = filters
            .iter()
            .map(|(key, value)| format!("{}={}", key.param_name(), value))
            .collect();
        let _ = writeln!(output, "Filters: {}", applied.join(", "));
    }
    if customers.is_empty() {
        let _ = writeln!(output, "No customers match the current filters.");
    } else {
        for customer in customers {
            let _ = writeln!(
                output,
                "- {} | {} | tenure {} | {}/mo | {} | {} risk",
                customer.customer_id,
                customer.contract.as_str(),
                customer.tenure,
                format_currency(customer.monthly_charges),
                format_percent(risk::as_percent(customer.churn_probability)),
                customer.risk_level
            );
        }
        for summary in summarize_by_tier(customers) {
            let _ = writeln!(
                output,
                "  {} on this page: {} (avg {})",
                summary.tier,
                summary.count,
                format_percent(risk::as_percent(summary.avg_probability))
            );
        }
    }
    let _ = writeln!(
        output,
        "{} | Page {} of {}",
        pagination_label(pagination),
        pagination.page,
        pagination.total_pages()
    );
    match (pagination.has_previous(), pagination.has_next()) {
        (true, true) => {
            let _ = writeln!(output, "More results on previous and next pages.");
        }
        (true, false) => {
            let _ = writeln!(output, "More results on previous pages.");
        }
        (false, true) => {
            let _ = writeln!(output, "More results on next pages.");
        }
        (false, false) => {}
    }

    output
}

pub fn render_customer(customer: &Customer) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Customer {}", customer.customer_id);
    let _ = writeln!(
        output,
        "Churn probability {} ({} risk)",
        format_percent(risk::as_percent(customer.churn_probability)),
        customer.risk_level
    );
    let _ = writeln!(
        output,
        "{}, {}",
        customer.gender,
        if customer.senior_citizen == 1 {
            "Senior"
        } else {
            "Non-senior"
        }
    );
    let _ = writeln!(output, "- Tenure: {} months", customer.tenure);
    let _ = writeln!(output, "- Contract: {}", customer.contract.as_str());
    let _ = writeln!(output, "- Internet: {}", customer.internet_service.as_str());
    let _ = writeln!(
        output,
        "- Monthly charges: {}",
        format_currency(customer.monthly_charges)
    );
    let _ = writeln!(
        output,
        "- Total charges: {}",
        format_currency(customer.total_charges)
    );
    let _ = writeln!(output, "- Lifetime value: {}", format_currency(customer.clv));
    let services = customer.active_services();
    let _ = writeln!(
        output,
        "- Services: {}",
        if services.is_empty() {
            "None".to_string()
        } else {
            services.join(", ")
        }
    );
    if let Some(churn) = customer.churn {
        let _ = writeln!(output, "- Churned: {:?}", churn);
    }

    output
}

pub fn render_prediction(result: &PredictionResult, gauge: RiskTier) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Churn probability {} ({} risk)",
        format_percent(risk::as_percent(result.churn_probability)),
        gauge
    );
    let _ = writeln!(
        output,
        "Prediction: {}",
        if result.churn_prediction {
            "likely to churn"
        } else {
            "likely to stay"
        }
    );
    output
}

pub fn render_recommendation(recommendation: &Recommendation) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "# Retention Strategy for {}",
        recommendation.context.label()
    );
    let _ = writeln!(
        output,
        "Generated {}",
        recommendation.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    for segment in &recommendation.segments {
        match segment {
            TextSegment::Header(text) => {
                let _ = writeln!(output);
                let _ = writeln!(output, "## {}", text);
            }
            TextSegment::NumberedLine(text) => {
                let _ = writeln!(output, "  {}", text);
            }
            TextSegment::BulletLine(text) => {
                let _ = writeln!(output, "  {}", text);
            }
            TextSegment::Paragraph(text) => {
                let _ = writeln!(output, "{}", text);
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fixtures::{customer, stats};
    use crate::models::{SegmentSummary, SegmentType, TenureBucket};
    use crate::query::FilterKey;
    use crate::recommendation::{RequestContext, ScenarioInput};
    use chrono::{TimeZone, Utc};

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(15402.5), "$15,402.50");
        assert_eq!(format_currency(85.0), "$85.00");
        assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_currency(-12.345), "-$12.35");
    }

    #[test]
    fn pagination_label_uses_displayed_range() {
        let pagination = Pagination {
            page: 2,
            page_size: 15,
            total: 237,
        };
        assert_eq!(pagination_label(&pagination), "Showing 16 to 30 of 237");
        assert_eq!(pagination_label(&Pagination::new(15)), "Showing 0 of 0");
    }

    #[test]
    fn tier_summary_orders_high_first() {
        let customers = vec![
            customer("A", 0.9),
            customer("B", 0.1),
            customer("C", 0.8),
        ];
        let summaries = summarize_by_tier(&customers);
        assert_eq!(summaries[0].tier, RiskTier::High);
        assert_eq!(summaries[0].count, 2);
        assert!((summaries[0].avg_probability - 0.85).abs() < 1e-9);
        assert_eq!(summaries[1].tier, RiskTier::Low);
    }

    #[test]
    fn dashboard_report_lists_every_section() {
        let snapshot = DashboardSnapshot {
            stats: stats(),
            tenure_churn: vec![TenureBucket {
                tenure_bucket: "0-12".into(),
                customers: 80,
                avg_churn_prob: 48.2,
                actual_churn_rate: 47.7,
            }],
            charges_distribution: Vec::new(),
            segment_type: SegmentType::Contract,
            segments: vec![SegmentSummary {
                segment_name: "Two year".into(),
                total_customers: 55,
                churn_rate: 3.1,
                avg_clv: 4012.0,
                avg_monthly_charges: None,
                avg_tenure: None,
            }],
        };
        let report = build_dashboard_report(&snapshot);
        assert!(report.contains("237 customers, 61 churned (25.7% churn rate"));
        assert!(report.contains("- High Risk: 40"));
        assert!(report.contains("- accuracy: 81.0%"));
        assert!(report.contains("- 0-12 months: 80 customers"));
        assert!(report.contains("No charge data available."));
        assert!(report.contains("- Two year: 55 customers, churn 3.1%, avg CLV $4,012.00"));
    }

    #[test]
    fn listing_shows_range_and_pages() {
        let pagination = Pagination {
            page: 1,
            page_size: 15,
            total: 2,
        };
        let listing = render_listing(
            &[customer("CUST-00001", 0.81)],
            &pagination,
            &FilterSet::default(),
        );
        assert!(listing.contains("CUST-00001 | Month-to-month"));
        assert!(!listing.contains("Filters:"));
        assert!(listing.contains("81.0% | High risk"));
        assert!(listing.contains("Showing 1 to 2 of 2 | Page 1 of 1"));
        assert!(!listing.contains("More results"));
    }

    #[test]
    fn listing_names_active_filters() {
        let mut filters = FilterSet::default();
        filters.set(FilterKey::RiskLevel, "High");
        filters.set(FilterKey::Search, "all");
        let listing = render_listing(&[], &Pagination::new(15), &filters);
        assert!(listing.contains("Filters: risk_level=High\n"));
        assert!(listing.contains("No customers match the current filters."));
    }

    #[test]
    fn prediction_shows_gauge_tier() {
        let result = PredictionResult {
            churn_probability: 0.82,
            churn_prediction: true,
            risk_level: RiskTier::High,
        };
        let text = render_prediction(&result, RiskTier::High);
        assert!(text.contains("Churn probability 82.0% (High risk)"));
        assert!(text.contains("likely to churn"));
    }

    #[test]
    fn recommendation_renders_segments_in_order() {
        let recommendation = Recommendation {
            context: RequestContext::Scenario(ScenarioInput::default()),
            generated_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap(),
            segments: vec![
                TextSegment::Header("Risk Assessment".into()),
                TextSegment::Paragraph("Short tenure.".into()),
                TextSegment::NumberedLine("1. Offer a discount".into()),
            ],
        };
        let text = render_recommendation(&recommendation);
        assert!(text.starts_with("# Retention Strategy for Custom scenario\n"));
        assert!(text.contains("Generated 2026-10-19 09:30 UTC"));
        assert!(text.contains("## Risk Assessment\nShort tenure.\n  1. Offer a discount\n"));
    }
}
