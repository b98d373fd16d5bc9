use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeadTimeSample {
    pub service_name: String,
    pub day_utc: String,
    pub lead_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct LeadTimeSummary {
    pub samples: usize,
    pub avg_seconds: i64,
    pub p50_seconds: i64,
    pub p95_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeadTimeByService {
    pub service: String,
    pub stats: LeadTimeSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeadTimeByDay {
    pub day: String,
    pub stats: LeadTimeSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct LeadTimeReport {
    pub days: u32,
    pub overall: LeadTimeSummary,
    pub by_service: Vec<LeadTimeByService>,
    pub by_day: Vec<LeadTimeByDay>,
}

/// Failed or rolled back deliveries over all deliveries in the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChangeFailureRate {
    pub service: String,
    pub days: u32,
    pub total: i64,
    pub failure_count: i64,
    pub rollback_count: i64,
    pub rate_percent: f64,
}

impl LeadTimeReport {
    pub fn from_samples(days: u32, samples: &[LeadTimeSample]) -> Self {
        let mut overall = Vec::with_capacity(samples.len());
        let mut by_service: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
        let mut by_day: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
        for sample in samples {
            overall.push(sample.lead_seconds);
            if !sample.service_name.is_empty() {
                by_service
                    .entry(&sample.service_name)
                    .or_default()
                    .push(sample.lead_seconds);
            }
            if !sample.day_utc.is_empty() {
                by_day
                    .entry(&sample.day_utc)
                    .or_default()
                    .push(sample.lead_seconds);
            }
        }

        Self {
            days,
            overall: summarize(overall),
            by_service: by_service
                .into_iter()
                .map(|(service, values)| LeadTimeByService {
                    service: service.to_string(),
                    stats: summarize(values),
                })
                .collect(),
            by_day: by_day
                .into_iter()
                .map(|(day, values)| LeadTimeByDay {
                    day: day.to_string(),
                    stats: summarize(values),
                })
                .collect(),
        }
    }
}

pub fn summarize(mut values: Vec<i64>) -> LeadTimeSummary {
    if values.is_empty() {
        return LeadTimeSummary::default();
    }
    values.sort_unstable();
    let sum: i64 = values.iter().sum();
    let count = i64::try_from(values.len()).unwrap_or(i64::MAX);
    LeadTimeSummary {
        samples: values.len(),
        avg_seconds: sum / count,
        p50_seconds: percentile(&values, 0.50),
        p95_seconds: percentile(&values, 0.95),
    }
}

/// Nearest-rank percentile over an ascending slice.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn percentile(sorted: &[i64], p: f64) -> i64 {
    let Some(last) = sorted.last() else {
        return 0;
    };
    if p <= 0.0 {
        return sorted[0];
    }
    if p >= 1.0 {
        return *last;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}
