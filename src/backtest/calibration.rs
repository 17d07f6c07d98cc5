//! Calibration of outcome probabilities against realized results.
//!
//! Points are grouped by event, so scores treat each event as one
//! multi-outcome forecast: the Brier score sums squared error across all
//! outcomes of an event, and outcomes are ranked within their event
//! (favourite first) to expose favourite/long-shot bias.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum resolved events before a diagnosis is attempted.
const MIN_EVENTS_FOR_DIAGNOSIS: usize = 10;
/// Gap between predicted and actual rate that counts as bias.
const BIAS_TOLERANCE: f64 = 0.05;
const NUM_BINS: usize = 10;

// ---------------------------------------------------------------------------
// Calibration data
// ---------------------------------------------------------------------------

/// A single probability–result pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub event_id: String,
    pub outcome: String,
    pub probability: f64,
    /// Whether the outcome actually happened.
    pub hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub total_predictions: usize,
    pub events: usize,
    /// Mean over events of Σ(p − hit)² across the event's outcomes.
    /// 0 is perfect, 2 is certain and wrong.
    pub brier_score: Option<f64>,
    /// Mean −ln(p) of the outcome that won, over events with a winner.
    pub log_loss: Option<f64>,
    /// Reliability curve over ten equal-width probability bins.
    pub calibration_curve: Vec<CalibrationBucket>,
    /// Predicted vs actual rate by rank within the event (1 = favourite).
    pub rank_curve: Vec<RankBucket>,
    pub diagnosis: CalibrationDiagnosis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub bin_start: f64,
    pub bin_end: f64,
    /// `None` for an empty bin.
    pub mean_predicted: Option<f64>,
    pub actual_rate: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankBucket {
    pub rank: usize,
    pub mean_predicted: f64,
    pub actual_rate: f64,
    pub count: usize,
}

impl RankBucket {
    /// Positive when this rank wins more often than predicted.
    pub fn surplus(&self) -> f64 {
        self.actual_rate - self.mean_predicted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationDiagnosis {
    WellCalibrated,
    /// Favourites win less and long shots more than predicted.
    OverConfident,
    /// Favourites win more and long shots less than predicted.
    UnderConfident,
    InsufficientData,
}

// ---------------------------------------------------------------------------
// Calibrator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Calibrator {
    /// Keyed by event id; outcomes keep insertion order.
    events: BTreeMap<String, Vec<CalibrationPoint>>,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, point: CalibrationPoint) {
        self.events
            .entry(point.event_id.clone())
            .or_default()
            .push(point);
    }

    pub fn add_points(&mut self, points: impl IntoIterator<Item = CalibrationPoint>) {
        for point in points {
            self.add_point(point);
        }
    }

    pub fn count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    pub fn report(&self) -> CalibrationReport {
        let total_predictions = self.count();
        if total_predictions == 0 {
            return CalibrationReport {
                total_predictions: 0,
                events: 0,
                brier_score: None,
                log_loss: None,
                calibration_curve: Vec::new(),
                rank_curve: Vec::new(),
                diagnosis: CalibrationDiagnosis::InsufficientData,
            };
        }

        let rank_curve = self.rank_curve();
        CalibrationReport {
            total_predictions,
            events: self.events.len(),
            brier_score: Some(self.brier()),
            log_loss: self.log_loss(),
            calibration_curve: self.reliability_curve(),
            diagnosis: self.diagnose(&rank_curve),
            rank_curve,
        }
    }

    fn brier(&self) -> f64 {
        let per_event = self.events.values().map(|points| {
            points
                .iter()
                .map(|p| (p.probability - f64::from(u8::from(p.hit))).powi(2))
                .sum::<f64>()
        });
        per_event.sum::<f64>() / self.events.len() as f64
    }

    fn log_loss(&self) -> Option<f64> {
        let winners: Vec<f64> = self
            .events
            .values()
            .filter_map(|points| points.iter().find(|p| p.hit))
            .map(|p| -p.probability.max(f64::EPSILON).ln())
            .collect();
        (!winners.is_empty()).then(|| winners.iter().sum::<f64>() / winners.len() as f64)
    }

    fn reliability_curve(&self) -> Vec<CalibrationBucket> {
        let mut sums = [0.0f64; NUM_BINS];
        let mut hits = [0usize; NUM_BINS];
        let mut counts = [0usize; NUM_BINS];

        for p in self.events.values().flatten() {
            let bin = ((p.probability * NUM_BINS as f64) as usize).min(NUM_BINS - 1);
            sums[bin] += p.probability;
            hits[bin] += usize::from(p.hit);
            counts[bin] += 1;
        }

        (0..NUM_BINS)
            .map(|i| {
                let n = counts[i] as f64;
                CalibrationBucket {
                    bin_start: i as f64 / NUM_BINS as f64,
                    bin_end: (i + 1) as f64 / NUM_BINS as f64,
                    mean_predicted: (counts[i] > 0).then(|| sums[i] / n),
                    actual_rate: (counts[i] > 0).then(|| hits[i] as f64 / n),
                    count: counts[i],
                }
            })
            .collect()
    }

    /// Rank outcomes within each event by probability, favourite first.
    /// Ties keep insertion order.
    fn rank_curve(&self) -> Vec<RankBucket> {
        let mut by_rank: Vec<(f64, usize, usize)> = Vec::new();
        for points in self.events.values() {
            let mut ranked: Vec<&CalibrationPoint> = points.iter().collect();
            ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
            for (i, p) in ranked.into_iter().enumerate() {
                if by_rank.len() <= i {
                    by_rank.push((0.0, 0, 0));
                }
                let slot = &mut by_rank[i];
                slot.0 += p.probability;
                slot.1 += usize::from(p.hit);
                slot.2 += 1;
            }
        }

        by_rank
            .into_iter()
            .enumerate()
            .map(|(i, (sum, hits, count))| RankBucket {
                rank: i + 1,
                mean_predicted: sum / count as f64,
                actual_rate: hits as f64 / count as f64,
                count,
            })
            .collect()
    }

    /// Favourite/long-shot bias: compare the favourite bucket with the
    /// least-favoured bucket that every event contributes to.
    fn diagnose(&self, rank_curve: &[RankBucket]) -> CalibrationDiagnosis {
        let events = self.events.len();
        let resolved = self
            .events
            .values()
            .filter(|points| points.iter().any(|p| p.hit))
            .count();
        if resolved < MIN_EVENTS_FOR_DIAGNOSIS {
            return CalibrationDiagnosis::InsufficientData;
        }

        let shared: Vec<&RankBucket> = rank_curve.iter().filter(|b| b.count == events).collect();
        let (Some(favourite), Some(long_shot)) = (shared.first(), shared.last()) else {
            return CalibrationDiagnosis::InsufficientData;
        };
        if favourite.rank == long_shot.rank {
            return CalibrationDiagnosis::InsufficientData;
        }

        let fav = favourite.surplus();
        let long = long_shot.surplus();
        if fav < -BIAS_TOLERANCE && long > BIAS_TOLERANCE {
            CalibrationDiagnosis::OverConfident
        } else if fav > BIAS_TOLERANCE && long < -BIAS_TOLERANCE {
            CalibrationDiagnosis::UnderConfident
        } else {
            CalibrationDiagnosis::WellCalibrated
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
