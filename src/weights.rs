use serde::{Deserialize, Serialize};

use crate::models::WeeklyPerformanceRecord;

pub const CONFIG_TYPE: &str = "weekly_metric_weights";

/// Points awarded per unit of each weekly counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricWeights {
    pub education_points: f64,
    pub proposals_presented: f64,
    pub contracts_signed: f64,
    pub mql: f64,
    pub visits_scheduled: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            education_points: 1.0,
            proposals_presented: 3.0,
            contracts_signed: 10.0,
            mql: 2.0,
            visits_scheduled: 2.0,
        }
    }
}

impl MetricWeights {
    pub fn total_points(&self, record: &WeeklyPerformanceRecord) -> f64 {
        record.education_points as f64 * self.education_points
            + record.proposals_presented as f64 * self.proposals_presented
            + record.contracts_signed as f64 * self.contracts_signed
            + record.mql as f64 * self.mql
            + record.visits_scheduled as f64 * self.visits_scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn default_weights_score_every_counter() {
        let record = WeeklyPerformanceRecord {
            employee_id: Uuid::new_v4(),
            week_ending: NaiveDate::from_ymd_opt(2026, 4, 5).unwrap(),
            education_points: 2,
            proposals_presented: 1,
            contracts_signed: 1,
            mql: 3,
            visits_scheduled: 2,
            total_points: 0.0,
        };
        assert_eq!(MetricWeights::default().total_points(&record), 2.0 + 3.0 + 10.0 + 6.0 + 4.0);
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let weights: MetricWeights = serde_json::from_str(r#"{"mql": 5.0}"#).unwrap();
        assert_eq!(weights.mql, 5.0);
        assert_eq!(weights.contracts_signed, 10.0);
    }
}
