//! Summary statistics over the loaded events.
//!
//! A [`Snapshot`] is a pure function of the event list and is recomputed
//! after every store mutation. Nothing here is persisted.

use std::collections::HashMap;

use serde::Serialize;

use crate::classify::region_of;
use crate::models::Feature;

/// Number of regions reported in the top-regions list.
pub const TOP_REGION_COUNT: usize = 5;

/// Smallest bar drawn for an empty histogram bucket (percent).
const MIN_BAR_HEIGHT_PCT: f64 = 5.0;

/// Histogram ranges as `(min inclusive, max exclusive, chart color)`.
const HISTOGRAM_RANGES: [(f64, f64, &str); 4] = [
    (2.5, 4.0, "#10b981"),
    (4.0, 5.0, "#eab308"),
    (5.0, 6.0, "#f97316"),
    (6.0, 10.0, "#ef4444"),
];

/// One bar of the magnitude histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBucket {
    pub min: f64,
    pub max: f64,
    pub color: &'static str,
    pub count: usize,
    /// Bar height relative to the tallest bucket, floored at 5%.
    pub height_pct: f64,
}

impl HistogramBucket {
    fn contains(&self, mag: f64) -> bool {
        mag >= self.min && mag < self.max
    }
}

/// Occurrences of one region label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionCount {
    pub region: String,
    pub count: usize,
}

/// Aggregate view of the current event store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub count: usize,
    /// Largest magnitude, 0.0 when no event reports one.
    pub max_magnitude: f64,
    /// Mean depth in km, `None` when the store is empty.
    pub mean_depth_km: Option<f64>,
    pub histogram: Vec<HistogramBucket>,
    pub top_regions: Vec<RegionCount>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::compute(&[])
    }
}

impl Snapshot {
    /// Compute the snapshot for a list of events.
    #[must_use]
    pub fn compute(events: &[Feature]) -> Self {
        let max_magnitude = events
            .iter()
            .filter_map(Feature::magnitude)
            .filter(|m| m.is_finite())
            .fold(None, |acc: Option<f64>, m| Some(acc.map_or(m, |a| a.max(m))))
            .unwrap_or(0.0);

        #[allow(clippy::cast_precision_loss)]
        let mean_depth_km = if events.is_empty() {
            None
        } else {
            let total: f64 = events.iter().map(Feature::depth_km).sum();
            Some(total / events.len() as f64)
        };

        Self {
            count: events.len(),
            max_magnitude,
            mean_depth_km,
            histogram: histogram(events),
            top_regions: top_regions(events, TOP_REGION_COUNT),
        }
    }

    /// Mean depth formatted for display, `"--"` when unavailable.
    #[must_use]
    pub fn mean_depth_label(&self) -> String {
        self.mean_depth_km
            .map_or_else(|| "--".to_string(), |d| format!("{d:.1} km"))
    }
}

/// Count events into the fixed magnitude ranges. Events outside every range
/// (or without a magnitude) are left out.
#[must_use]
pub fn histogram(events: &[Feature]) -> Vec<HistogramBucket> {
    let mut buckets: Vec<HistogramBucket> = HISTOGRAM_RANGES
        .iter()
        .map(|&(min, max, color)| HistogramBucket {
            min,
            max,
            color,
            count: 0,
            height_pct: 0.0,
        })
        .collect();

    for mag in events.iter().filter_map(Feature::magnitude) {
        if let Some(bucket) = buckets.iter_mut().find(|b| b.contains(mag)) {
            bucket.count += 1;
        }
    }

    let tallest = buckets.iter().map(|b| b.count).max().unwrap_or(0).max(1);
    for bucket in &mut buckets {
        #[allow(clippy::cast_precision_loss)]
        let pct = bucket.count as f64 / tallest as f64 * 100.0;
        bucket.height_pct = pct.max(MIN_BAR_HEIGHT_PCT);
    }

    buckets
}

/// Most frequent region labels, at most `limit` of them. Ties keep the
/// order in which regions were first seen.
#[must_use]
pub fn top_regions(events: &[Feature], limit: usize) -> Vec<RegionCount> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<RegionCount> = Vec::new();

    for event in events {
        let region = region_of(event.properties.place.as_deref());
        match index.get(&region) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(region.clone(), counts.len());
                counts.push(RegionCount { region, count: 1 });
            }
        }
    }

    // sort_by is stable
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}
