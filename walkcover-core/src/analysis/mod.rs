//! End-to-end walk analysis for one region
//!
//! Classifies every trajectory, keeps the walking parts, measures street
//! coverage against them and aggregates the results.

mod to_geojson;

pub use to_geojson::{streets_to_geojson, walks_to_geojson};

use chrono::{DateTime, Utc};
use geo::{BoundingRect, LineString, Rect};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::algo::aggregate::{
    COMMON_AREA_LIMIT, CommonArea, CoverageResult, TemporalSummary, WalkSummary, aggregate,
    identify_common_areas, summarize_temporal, summarize_walks,
};
use crate::algo::classifier::{Granularity, TransitClassifier, TransitReason, Verdict};
use crate::algo::coverage::{CoverageEngine, NetworkCoverage};
use crate::algo::metrics::Metrics;
use crate::algo::projection::reproject_line;
use crate::algo::segments::SegmentSplitter;
use crate::loading::{AnalysisOptions, ClassificationMode, RegionProfile, RegionRegistry};
use crate::model::{Crs, Street, StreetCoverage, StreetNetwork, Trajectory};
use crate::Error;

/// Classification outcome for one trajectory
#[derive(Debug, Clone, Serialize)]
pub struct WalkClassification {
    pub source_id: String,
    /// Whole-trajectory metrics, absent for malformed input
    pub metrics: Option<Metrics>,
    pub verdict: Verdict,
    /// Segments examined; 0 when classified as a whole
    pub total_segments: usize,
    pub kept_segments: usize,
    /// Walking geometry that feeds coverage. Contiguous walking segments
    /// are joined into one line.
    #[serde(skip)]
    pub kept: Vec<LineString<f64>>,
    pub start_time: Option<DateTime<Utc>>,
    pub crs: Crs,
}

impl WalkClassification {
    fn rejected(trajectory: &Trajectory, metrics: Option<Metrics>, verdict: Verdict) -> Self {
        Self {
            source_id: trajectory.source_id.clone(),
            metrics,
            verdict,
            total_segments: 0,
            kept_segments: 0,
            kept: Vec::new(),
            start_time: trajectory.start_time(),
            crs: trajectory.crs,
        }
    }

    /// Drops a walk whose geometry could not take part in coverage
    fn mark_unprojectable(&mut self) {
        self.verdict = Verdict::Unprojectable;
        self.kept.clear();
    }

    /// Whether any part of the trajectory counts as a walk
    pub fn is_valid(&self) -> bool {
        self.verdict.is_walking() && !self.kept.is_empty()
    }
}

/// Everything produced by one analysis run
#[derive(Debug, Clone)]
pub struct Analysis {
    pub region: String,
    /// Frame of the street geometries
    pub crs: Crs,
    /// Copies of the input streets with coverage filled in
    pub streets: Vec<Street>,
    pub street_coverage: Vec<StreetCoverage>,
    pub walks: Vec<WalkClassification>,
    pub result: CoverageResult,
    pub summary: WalkSummary,
    pub temporal: TemporalSummary,
    /// Busiest lon/lat grid cells, busiest first
    pub common_areas: Vec<CommonArea>,
}

impl Analysis {
    pub fn valid_walks(&self) -> impl Iterator<Item = &WalkClassification> {
        self.walks.iter().filter(|w| w.is_valid())
    }
}

/// Lon/lat bounds of a trajectory, whatever its frame
fn lon_lat_bounds(trajectory: &Trajectory) -> Option<Rect<f64>> {
    match trajectory.crs {
        Crs::Wgs84 => trajectory.bounding_rect(),
        Crs::Utm { .. } => match reproject_line(&trajectory.geometry, trajectory.crs, Crs::Wgs84) {
            Ok(line) => line.bounding_rect(),
            Err(e) => {
                warn!("Skipping region check for {}: {e}", trajectory.source_id);
                None
            }
        },
    }
}

fn in_region(profile: &RegionProfile, trajectory: &Trajectory) -> bool {
    lon_lat_bounds(trajectory).is_none_or(|bounds| profile.overlaps(&bounds))
}

/// Trajectories whose extent touches the region extent
pub fn select_region_walks<'t>(
    profile: &RegionProfile,
    trajectories: &'t [Trajectory],
) -> Vec<&'t Trajectory> {
    trajectories
        .iter()
        .filter(|trajectory| in_region(profile, trajectory))
        .collect()
}

/// Analysis configured for one region
#[derive(Debug, Clone)]
pub struct WalkAnalyzer<'a> {
    region: String,
    profile: &'a RegionProfile,
    options: AnalysisOptions,
}

impl<'a> WalkAnalyzer<'a> {
    /// # Errors
    ///
    /// Returns an error for an unknown region or invalid options
    pub fn new(registry: &'a RegionRegistry, region: &str, options: AnalysisOptions) -> Result<Self, Error> {
        options.validate()?;
        let profile = registry.get(region)?;
        Ok(Self {
            region: region.trim().to_lowercase(),
            profile,
            options,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn profile(&self) -> &RegionProfile {
        self.profile
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Classifies one trajectory. Malformed input is never an error, it
    /// comes back as transit with no metrics.
    pub fn classify(&self, trajectory: &Trajectory) -> WalkClassification {
        if self.options.restrict_to_region && !in_region(self.profile, trajectory) {
            return WalkClassification::rejected(trajectory, None, Verdict::OutsideRegion);
        }

        let Some(metrics) = trajectory.metrics() else {
            debug!("No metrics for {}", trajectory.source_id);
            return WalkClassification::rejected(
                trajectory,
                None,
                Verdict::Transit(TransitReason::NoMetrics),
            );
        };

        if metrics.duration < self.options.min_walk_duration
            || metrics.path_distance < self.options.min_walk_distance
        {
            return WalkClassification::rejected(trajectory, Some(metrics), Verdict::TooShort);
        }

        let classification = match self.options.classification {
            ClassificationMode::Segmented { segment_size } if trajectory.has_point_timestamps() => {
                self.classify_segments(trajectory, metrics, segment_size)
            }
            _ => self.classify_whole(trajectory, metrics),
        };

        debug!(
            "{}: {:?} ({}/{} segments kept)",
            classification.source_id,
            classification.verdict,
            classification.kept_segments,
            classification.total_segments
        );
        classification
    }

    fn classify_whole(&self, trajectory: &Trajectory, metrics: Metrics) -> WalkClassification {
        let verdict = TransitClassifier::new(self.profile).classify(Some(&metrics), Granularity::Trajectory);
        let kept = if verdict.is_walking() {
            vec![trajectory.geometry.clone()]
        } else {
            Vec::new()
        };

        WalkClassification {
            kept,
            ..WalkClassification::rejected(trajectory, Some(metrics), verdict)
        }
    }

    fn classify_segments(&self, trajectory: &Trajectory, metrics: Metrics, size: usize) -> WalkClassification {
        let splitter = match SegmentSplitter::new(trajectory.coords(), &trajectory.timestamps, size) {
            Ok(splitter) => splitter,
            Err(e) => {
                warn!("Cannot segment {}: {e}", trajectory.source_id);
                return self.classify_whole(trajectory, metrics);
            }
        };
        let classifier = TransitClassifier::new(self.profile);

        let mut kept: Vec<LineString<f64>> = Vec::new();
        let mut total_segments = 0;
        let mut kept_segments = 0;
        let mut first_rejection = None;
        let mut joining = false;

        for segment in splitter {
            total_segments += 1;
            let verdict = classifier.classify(segment.metrics(trajectory.crs).as_ref(), Granularity::Segment);

            if verdict.is_walking() {
                kept_segments += 1;
                match kept.last_mut() {
                    // Segments share their boundary point
                    Some(line) if joining => line.0.extend_from_slice(&segment.coords[1..]),
                    _ => kept.push(segment.to_line_string()),
                }
                joining = true;
            } else {
                first_rejection.get_or_insert(verdict);
                joining = false;
            }
        }

        let verdict = if kept.is_empty() {
            first_rejection.unwrap_or(Verdict::Transit(TransitReason::NoMetrics))
        } else {
            Verdict::Walking
        };

        WalkClassification {
            source_id: trajectory.source_id.clone(),
            metrics: Some(metrics),
            verdict,
            total_segments,
            kept_segments,
            kept,
            start_time: trajectory.start_time(),
            crs: trajectory.crs,
        }
    }

    /// Classifies trajectories in parallel, preserving input order
    pub fn classify_all(&self, trajectories: &[Trajectory]) -> Vec<WalkClassification> {
        trajectories
            .par_iter()
            .map(|trajectory| self.classify(trajectory))
            .collect()
    }

    /// Runs classification, coverage and aggregation.
    ///
    /// A walk whose geometry cannot be moved into the street frame is
    /// marked [`Verdict::Unprojectable`] and left out; the rest of the batch
    /// is still analyzed.
    ///
    /// # Errors
    ///
    /// Returns an error if the street network cannot be reprojected into a
    /// metric frame
    pub fn analyze(&self, trajectories: &[Trajectory], network: &StreetNetwork) -> Result<Analysis, Error> {
        let mut walks = self.classify_all(trajectories);
        let valid = walks.iter().filter(|w| w.is_valid()).count();
        info!("Found {valid} valid walks out of {}", trajectories.len());

        let NetworkCoverage {
            streets,
            coverage,
            skipped_walks,
        } = if network.is_empty() {
            warn!("Street network for {} is empty, skipping coverage", self.region);
            NetworkCoverage::default()
        } else {
            let kept = walks.iter().enumerate().flat_map(|(index, walk)| {
                walk.kept.iter().map(move |line| (index, line, walk.crs))
            });
            CoverageEngine::for_network(self.profile, network)?
                .with_accumulation(self.options.accumulation)
                .compute(network, kept)?
        };

        for &index in &skipped_walks {
            warn!("{}: walk could not be reprojected, not counted", walks[index].source_id);
            walks[index].mark_unprojectable();
        }

        let result = aggregate(&walks, &coverage);
        let summary = summarize_walks(&walks);
        let temporal = summarize_temporal(&walks);
        let common_areas = identify_common_areas(&walks, self.options.common_area_grid, COMMON_AREA_LIMIT);
        info!(
            "{}: {}/{} streets covered, {:.1}% of {:.0} m",
            self.region,
            result.covered_streets,
            result.total_streets,
            result.coverage_percent,
            result.total_length
        );

        Ok(Analysis {
            region: self.region.clone(),
            crs: network.crs,
            streets,
            street_coverage: coverage,
            walks,
            result,
            summary,
            temporal,
            common_areas,
        })
    }
}
