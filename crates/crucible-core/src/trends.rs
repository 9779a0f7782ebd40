//! Longitudinal statistics over a feedback history.
//!
//! Trends are recomputed from the full history on every call. For each
//! metric: arithmetic mean, population standard deviation, and the OLS slope
//! of value against record index.
//!
//! Small histories:
//! - empty history: no metric entries at all
//! - one record: std_dev is 0.0 and slope is `None`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{FeedbackData, MetricKind};

/// Aggregate statistics for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,

    /// Change per record; `None` with fewer than two records
    pub slope: Option<f64>,
}

/// Trends across a whole feedback history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackTrends {
    pub records_analyzed: usize,

    /// How often each dimension was flagged for improvement
    pub common_improvement_areas: BTreeMap<MetricKind, usize>,

    pub metric_trends: BTreeMap<MetricKind, MetricTrend>,
}

impl FeedbackTrends {
    /// Most frequently flagged dimensions, highest count first. Ties keep
    /// evaluation order.
    pub fn top_improvement_areas(&self, limit: usize) -> Vec<(MetricKind, usize)> {
        let mut areas: Vec<(MetricKind, usize)> = self
            .common_improvement_areas
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect();
        areas.sort_by(|a, b| b.1.cmp(&a.1));
        areas.truncate(limit);
        areas
    }
}

/// Computes [`FeedbackTrends`] from a history.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, history: &[FeedbackData]) -> FeedbackTrends {
        let mut common_improvement_areas = BTreeMap::new();
        for record in history {
            for area in &record.improvement_areas {
                *common_improvement_areas.entry(*area).or_insert(0) += 1;
            }
        }

        let metric_trends = if history.is_empty() {
            BTreeMap::new()
        } else {
            MetricKind::ALL
                .iter()
                .map(|kind| {
                    let values: Vec<f64> = history.iter().map(|r| r.metrics.get(*kind)).collect();
                    (*kind, metric_trend(&values))
                })
                .collect()
        };

        FeedbackTrends {
            records_analyzed: history.len(),
            common_improvement_areas,
            metric_trends,
        }
    }
}

fn metric_trend(values: &[f64]) -> MetricTrend {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    MetricTrend {
        count: values.len(),
        mean,
        std_dev: variance.sqrt(),
        slope: linear_slope(values),
    }
}

/// Ordinary least-squares slope of `values` against their indices 0..n-1.
///
/// Returns `None` for fewer than two values.
pub fn linear_slope(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let (numerator, denominator) = values.iter().enumerate().fold(
        (0.0, 0.0),
        |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        },
    );

    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}
