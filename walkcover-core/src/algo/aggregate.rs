//! Summary statistics over classified walks and covered streets

use std::cmp::Reverse;

use chrono::{Datelike, Timelike, Weekday};
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::algo::projection::reproject_line;
use crate::analysis::WalkClassification;
use crate::model::{Crs, StreetCoverage};
use crate::Meters;

/// Default side of a common-area grid cell, in degrees
pub const COMMON_AREA_GRID: f64 = 0.001;
/// Busiest cells reported by an analysis
pub const COMMON_AREA_LIMIT: usize = 10;

/// Network-wide coverage figures
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CoverageResult {
    pub total_walks: usize,
    pub valid_walks: usize,
    pub total_streets: usize,
    pub covered_streets: usize,
    /// Sum of all street lengths
    pub total_length: Meters,
    /// Sum of the full lengths of streets flagged as covered
    pub covered_length: Meters,
    /// `covered_length / total_length * 100`, 0 for an empty network
    pub coverage_percent: f64,
    /// Sum of the lengths actually inside walk buffers
    pub walked_length: Meters,
    /// `walked_length / total_length * 100`
    pub walked_percent: f64,
}

/// Averages over the walks that were kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WalkSummary {
    pub valid_walks: usize,
    pub total_distance: Meters,
    pub mean_distance: Meters,
    /// m/s
    pub mean_speed: f64,
    pub mean_sinuosity: f64,
    pub total_segments: usize,
    pub kept_segments: usize,
}

/// When valid walks happen, by their UTC start time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TemporalSummary {
    /// Valid walks with a known start time
    pub timed_walks: usize,
    /// Walks starting in each hour of the day
    pub walks_by_hour: [usize; 24],
    /// Walks starting on each day of the week, Monday first
    pub walks_by_weekday: [usize; 7],
    pub weekday_walks: usize,
    pub weekend_walks: usize,
    /// Hours spent walking on weekdays
    pub weekday_hours: f64,
    pub weekend_hours: f64,
    /// `weekend_hours / weekday_hours`, absent without weekday walking
    pub weekend_ratio: Option<f64>,
    /// Busiest hour, the earliest one on ties
    pub most_active_hour: Option<u32>,
    /// Busiest day, the earliest in the week on ties
    pub most_active_day: Option<Weekday>,
}

/// A lon/lat grid cell that valid walks pass through
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommonArea {
    /// Cell centre
    pub lon: f64,
    pub lat: f64,
    /// Walk points inside the cell
    pub visits: usize,
    /// Distinct walks with a point inside the cell
    pub walks: usize,
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        (part / whole * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Combines walk verdicts and per-street coverage into network totals
pub fn aggregate(walks: &[WalkClassification], coverage: &[StreetCoverage]) -> CoverageResult {
    let total_length: Meters = coverage.iter().map(|c| c.length).sum();
    let covered_length: Meters = coverage.iter().filter(|c| c.covered).map(|c| c.length).sum();
    let walked_length: Meters = coverage.iter().map(|c| c.covered_length).sum();

    CoverageResult {
        total_walks: walks.len(),
        valid_walks: walks.iter().filter(|w| w.is_valid()).count(),
        total_streets: coverage.len(),
        covered_streets: coverage.iter().filter(|c| c.covered).count(),
        total_length,
        covered_length,
        coverage_percent: percent(covered_length, total_length),
        walked_length,
        walked_percent: percent(walked_length, total_length),
    }
}

/// Distance, speed and shape averages over valid walks
#[allow(clippy::cast_precision_loss)]
pub fn summarize_walks(walks: &[WalkClassification]) -> WalkSummary {
    let valid: Vec<_> = walks
        .iter()
        .filter(|w| w.is_valid())
        .filter_map(|w| w.metrics.as_ref())
        .collect();

    let total_segments = walks.iter().map(|w| w.total_segments).sum();
    let kept_segments = walks.iter().map(|w| w.kept_segments).sum();

    if valid.is_empty() {
        return WalkSummary {
            total_segments,
            kept_segments,
            ..WalkSummary::default()
        };
    }

    let count = valid.len() as f64;
    let total_distance: Meters = valid.iter().map(|m| m.path_distance).sum();

    WalkSummary {
        valid_walks: valid.len(),
        total_distance,
        mean_distance: total_distance / count,
        mean_speed: valid.iter().map(|m| m.avg_speed).sum::<f64>() / count,
        mean_sinuosity: valid.iter().map(|m| m.sinuosity).sum::<f64>() / count,
        total_segments,
        kept_segments,
    }
}

/// Index of the largest non-zero count, the first one on ties
fn busiest(counts: &[usize]) -> Option<usize> {
    counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .min_by_key(|(_, count)| Reverse(**count))
        .map(|(index, _)| index)
}

/// Hour-of-day and day-of-week activity of valid walks
#[allow(clippy::cast_possible_truncation)]
pub fn summarize_temporal(walks: &[WalkClassification]) -> TemporalSummary {
    let mut summary = TemporalSummary::default();

    for walk in walks.iter().filter(|w| w.is_valid()) {
        let Some(start) = walk.start_time else {
            continue;
        };
        let hours = walk.metrics.map_or(0.0, |m| m.duration / 3600.0);

        summary.timed_walks += 1;
        summary.walks_by_hour[start.hour() as usize] += 1;
        summary.walks_by_weekday[start.weekday().num_days_from_monday() as usize] += 1;
        if matches!(start.weekday(), Weekday::Sat | Weekday::Sun) {
            summary.weekend_walks += 1;
            summary.weekend_hours += hours;
        } else {
            summary.weekday_walks += 1;
            summary.weekday_hours += hours;
        }
    }

    summary.weekend_ratio =
        (summary.weekday_hours > 0.0).then(|| summary.weekend_hours / summary.weekday_hours);
    summary.most_active_hour = busiest(&summary.walks_by_hour).map(|hour| hour as u32);
    summary.most_active_day =
        busiest(&summary.walks_by_weekday).and_then(|day| Weekday::try_from(day as u8).ok());
    summary
}

/// The `limit` grid cells holding the most points of valid walks.
///
/// Cells are `grid_size` degrees square and aligned on multiples of
/// `grid_size`, so the same place lands in the same cell across runs.
/// Ties are broken by cell position.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn identify_common_areas(walks: &[WalkClassification], grid_size: f64, limit: usize) -> Vec<CommonArea> {
    let mut cells: HashMap<(i64, i64), (usize, usize)> = HashMap::new();

    for walk in walks.iter().filter(|w| w.is_valid()) {
        let mut seen: HashSet<(i64, i64)> = HashSet::new();
        for line in &walk.kept {
            let line = match reproject_line(line, walk.crs, Crs::Wgs84) {
                Ok(line) => line,
                Err(e) => {
                    debug!("No common areas from {}: {e}", walk.source_id);
                    continue;
                }
            };
            for coord in line.coords() {
                let cell = (
                    (coord.x / grid_size).floor() as i64,
                    (coord.y / grid_size).floor() as i64,
                );
                let (visits, walk_count) = cells.entry(cell).or_default();
                *visits += 1;
                if seen.insert(cell) {
                    *walk_count += 1;
                }
            }
        }
    }

    cells
        .into_iter()
        .sorted_by(|(a_cell, a), (b_cell, b)| b.0.cmp(&a.0).then_with(|| a_cell.cmp(b_cell)))
        .take(limit)
        .map(|((x, y), (visits, walk_count))| CommonArea {
            lon: (x as f64 + 0.5) * grid_size,
            lat: (y as f64 + 0.5) * grid_size,
            visits,
            walks: walk_count,
        })
        .collect()
}
