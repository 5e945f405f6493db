use crate::models::RiskTier;

pub const HIGH_RISK_THRESHOLD: f64 = 0.70;
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.40;

/// Maps a churn probability onto its risk tier. Total over all inputs:
/// anything that is not at least the medium threshold (NaN included) is Low.
pub fn classify(probability: f64) -> RiskTier {
    if probability >= HIGH_RISK_THRESHOLD {
        RiskTier::High
    } else if probability >= MEDIUM_RISK_THRESHOLD {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

/// Slider positions are whole percentages; the tier is derived from the
/// resulting probability, never the reverse.
pub fn probability_from_percent(percent: u8) -> f64 {
    f64::from(percent.min(100)) / 100.0
}

pub fn as_percent(probability: f64) -> f64 {
    probability * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_follow_expected_tiers() {
        assert_eq!(classify(0.0), RiskTier::Low);
        assert_eq!(classify(0.399), RiskTier::Low);
        assert_eq!(classify(0.40), RiskTier::Medium);
        assert_eq!(classify(0.55), RiskTier::Medium);
        assert_eq!(classify(0.6999), RiskTier::Medium);
        assert_eq!(classify(0.70), RiskTier::High);
        assert_eq!(classify(1.0), RiskTier::High);
    }

    #[test]
    fn classify_is_monotonic_in_probability() {
        let mut previous = classify(0.0);
        for step in 0..=1000 {
            let tier = classify(step as f64 / 1000.0);
            assert!(tier >= previous, "tier dropped at step {step}");
            previous = tier;
        }
    }

    #[test]
    fn out_of_range_inputs_still_classify() {
        assert_eq!(classify(-0.5), RiskTier::Low);
        assert_eq!(classify(1.7), RiskTier::High);
        assert_eq!(classify(f64::NAN), RiskTier::Low);
    }

    #[test]
    fn slider_percent_maps_to_probability() {
        assert!((probability_from_percent(55) - 0.55).abs() < 1e-9);
        assert_eq!(probability_from_percent(250), 1.0);
        assert_eq!(classify(probability_from_percent(70)), RiskTier::High);
    }
}
