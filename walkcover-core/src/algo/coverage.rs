//! Street coverage by buffered walks
//!
//! Every valid walk is cut into short chunks in a metric frame and each
//! chunk is buffered by the region's tolerance. The chunk buffers go into
//! an R-tree keyed by bounding box, so a street only meets the buffers of
//! the walk stretches that pass near it. Per street, those candidates are
//! unioned and the street is clipped against the result. Streets are
//! processed in parallel and each produces a new coverage record.

use geo::{
    Buffer, BooleanOps, BoundingRect, Euclidean, Intersects, Length, LineString, MultiLineString,
    Polygon, unary_union,
};
use hashbrown::HashSet;
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

use crate::algo::projection::MetricFrame;
use crate::algo::segments::SegmentSplitter;
use crate::loading::RegionProfile;
use crate::model::{Crs, Street, StreetCoverage, StreetNetwork};
use crate::{Error, Meters};

/// Points per buffered walk chunk; neighbouring chunks share one point
pub const WALK_CHUNK_POINTS: usize = 16;

/// How overlapping walk buffers are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accumulation {
    /// Union all buffers first, so overlapping walks count once
    #[default]
    Union,
    /// Sum each walk's intersection independently; overlaps between
    /// walks count more than once until the 100% cap
    PerWalk,
}

/// Buffer of one walk chunk, stored in the R-tree
#[derive(Debug)]
struct BufferEntry {
    walk: usize,
    envelope: AABB<[f64; 2]>,
    polygon: Polygon<f64>,
}

impl BufferEntry {
    fn new(walk: usize, polygon: Polygon<f64>) -> Option<Self> {
        let rect = polygon.bounding_rect()?;
        Some(Self {
            walk,
            envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            polygon,
        })
    }
}

impl RTreeObject for BufferEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Consecutive runs of at most `WALK_CHUNK_POINTS` points
fn walk_chunks(walk: &LineString<f64>) -> Vec<LineString<f64>> {
    if walk.0.len() < 2 {
        return vec![walk.clone()];
    }
    SegmentSplitter::new(&walk.0, &[], WALK_CHUNK_POINTS)
        .map(|splitter| splitter.map(|chunk| chunk.to_line_string()).collect())
        .unwrap_or_default()
}

/// Length of `street` inside the union of `polygons`
fn clipped_length(polygons: &[&Polygon<f64>], street: &MultiLineString<f64>) -> Meters {
    match polygons {
        [] => 0.0,
        [polygon] => Euclidean.length(&polygon.clip(street, false)),
        _ => Euclidean.length(&unary_union(polygons.iter().copied()).clip(street, false)),
    }
}

/// Spatial index over chunked walk buffers, all in one metric frame
#[derive(Debug)]
pub struct BufferIndex {
    tree: RTree<BufferEntry>,
    accumulation: Accumulation,
    walk_count: usize,
}

impl BufferIndex {
    /// Buffers walks that are already in the metric frame. Each walk is
    /// tagged with an id; parts sharing an id count as one walk under
    /// [`Accumulation::PerWalk`].
    pub fn build(walks: &[(usize, LineString<f64>)], buffer_distance: Meters, accumulation: Accumulation) -> Self {
        let entries: Vec<BufferEntry> = walks
            .par_iter()
            .filter(|(_, walk)| !walk.0.is_empty())
            .flat_map_iter(|(walk, line)| {
                let walk = *walk;
                walk_chunks(line)
                    .into_iter()
                    .flat_map(move |chunk| chunk.buffer(buffer_distance))
                    .filter_map(move |polygon| BufferEntry::new(walk, polygon))
            })
            .collect();

        let walk_count = walks.iter().map(|(walk, _)| walk).unique().count();
        debug!(
            "Indexed {} buffer polygons from {walk_count} walks ({accumulation:?})",
            entries.len()
        );

        Self {
            tree: RTree::bulk_load(entries),
            accumulation,
            walk_count,
        }
    }

    pub fn accumulation(&self) -> Accumulation {
        self.accumulation
    }

    pub fn walk_count(&self) -> usize {
        self.walk_count
    }

    pub fn polygon_count(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Length of `street` lying inside the buffers, before any capping.
    ///
    /// Only buffers whose boxes touch the street are combined. Under
    /// `Union` they are unioned together; under `PerWalk` each walk's
    /// chunks are unioned separately and the lengths summed.
    pub fn covered_length(&self, street: &LineString<f64>) -> Meters {
        let Some(rect) = street.bounding_rect() else {
            return 0.0;
        };
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        let mut candidates: Vec<&BufferEntry> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| entry.polygon.intersects(street))
            .collect();
        if candidates.is_empty() {
            return 0.0;
        }
        // Stable order keeps repeated runs bit-identical
        candidates.sort_by(|a, b| {
            a.walk.cmp(&b.walk).then_with(|| {
                a.envelope
                    .lower()
                    .partial_cmp(&b.envelope.lower())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        let street_lines = MultiLineString::new(vec![street.clone()]);
        match self.accumulation {
            Accumulation::Union => {
                let polygons: Vec<&Polygon<f64>> = candidates.iter().map(|e| &e.polygon).collect();
                clipped_length(&polygons, &street_lines)
            }
            Accumulation::PerWalk => candidates
                .chunk_by(|a, b| a.walk == b.walk)
                .map(|group| {
                    let polygons: Vec<&Polygon<f64>> = group.iter().map(|e| &e.polygon).collect();
                    let length = clipped_length(&polygons, &street_lines);
                    log::trace!("Walk {} covers {length:.1} m", group[0].walk);
                    length
                })
                .sum(),
        }
    }

    /// Coverage of a street already in the metric frame
    pub fn street_coverage(&self, street_id: &str, street: &LineString<f64>) -> StreetCoverage {
        let length = Euclidean.length(street);
        if length <= 0.0 {
            return StreetCoverage::from_lengths(street_id, 0.0, 0.0);
        }
        StreetCoverage::from_lengths(street_id, length, self.covered_length(street))
    }
}

/// Coverage output for a whole network
#[derive(Debug, Clone, Default)]
pub struct NetworkCoverage {
    /// Input streets with `covered` / `coverage_percent` filled in
    pub streets: Vec<Street>,
    /// Per-street measurements, in the same order as `streets`
    pub coverage: Vec<StreetCoverage>,
    /// Ids of walks left out because they could not be reprojected,
    /// ascending
    pub skipped_walks: Vec<usize>,
}

/// Computes street coverage for one region
#[derive(Debug)]
pub struct CoverageEngine<'a> {
    profile: &'a RegionProfile,
    frame: MetricFrame,
    accumulation: Accumulation,
}

impl<'a> CoverageEngine<'a> {
    pub fn new(profile: &'a RegionProfile, frame: MetricFrame) -> Self {
        Self {
            profile,
            frame,
            accumulation: Accumulation::default(),
        }
    }

    /// Engine working in the metric frame chosen for `network`
    ///
    /// # Errors
    ///
    /// Returns an error if no frame can be chosen for the network
    pub fn for_network(profile: &'a RegionProfile, network: &StreetNetwork) -> Result<Self, Error> {
        Ok(Self::new(profile, MetricFrame::for_network(network)?))
    }

    #[must_use]
    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }

    pub fn frame(&self) -> &MetricFrame {
        &self.frame
    }

    /// Projects and buffers walks given in their own frames.
    ///
    /// Items are `(walk id, geometry, frame)`; a walk may have several
    /// parts. A walk with any part that cannot be reprojected is left out
    /// entirely and its id returned in the second element.
    pub fn build_index<'w>(
        &self,
        walks: impl IntoIterator<Item = (usize, &'w LineString<f64>, Crs)>,
    ) -> (BufferIndex, Vec<usize>) {
        let mut skipped: HashSet<usize> = HashSet::new();
        let mut projected: Vec<(usize, LineString<f64>)> = Vec::new();
        for (walk, line, crs) in walks {
            match self.frame.project_line(line, crs) {
                Ok(line) => projected.push((walk, line)),
                Err(e) => {
                    warn!("Leaving walk {walk} out of coverage: {e}");
                    skipped.insert(walk);
                }
            }
        }
        // A later part may have failed after earlier ones were projected
        projected.retain(|(walk, _)| !skipped.contains(walk));

        let index = BufferIndex::build(&projected, self.profile.buffer_distance, self.accumulation);
        (index, skipped.into_iter().sorted().collect())
    }

    /// Computes coverage of every street by the given valid walks.
    ///
    /// The input network is left untouched; updated streets are returned
    /// in input order. Walks that cannot be reprojected are skipped and
    /// reported in [`NetworkCoverage::skipped_walks`].
    ///
    /// # Errors
    ///
    /// Returns an error if the street network cannot be reprojected
    pub fn compute<'w>(
        &self,
        network: &StreetNetwork,
        walks: impl IntoIterator<Item = (usize, &'w LineString<f64>, Crs)>,
    ) -> Result<NetworkCoverage, Error> {
        let (index, skipped_walks) = self.build_index(walks);
        let projected_streets = self.frame.project_network(network)?;

        info!(
            "Matching {} streets against {} walks ({} buffer polygons)",
            network.len(),
            index.walk_count(),
            index.polygon_count()
        );

        let coverage: Vec<StreetCoverage> = network
            .streets
            .par_iter()
            .zip(projected_streets.par_iter())
            .map(|(street, geometry)| index.street_coverage(&street.street_id, geometry))
            .collect();

        let streets: Vec<Street> = network
            .streets
            .iter()
            .zip(&coverage)
            .map(|(street, result)| street.with_coverage(result))
            .collect();

        let covered = coverage.iter().filter(|c| c.covered).count();
        info!("{covered} of {} streets covered", streets.len());

        Ok(NetworkCoverage {
            streets,
            coverage,
            skipped_walks,
        })
    }
}

#[cfg(test)]
mod tests {
    use geo::line_string;

    use super::*;
    use crate::loading::RegionRegistry;

    const UTM: Crs = Crs::Utm {
        zone: 30,
        south: false,
    };

    fn profile() -> RegionProfile {
        // 8 m buffer
        RegionRegistry::builtin().get("london").unwrap().clone()
    }

    fn network() -> StreetNetwork {
        StreetNetwork::new(
            vec![
                Street::new(
                    "main",
                    Some("Main Street".to_string()),
                    line_string![(x: 500_000.0, y: 5_700_000.0), (x: 500_100.0, y: 5_700_000.0)],
                ),
                Street::new(
                    "far",
                    None,
                    line_string![(x: 501_000.0, y: 5_701_000.0), (x: 501_100.0, y: 5_701_000.0)],
                ),
                Street::new(
                    "stub",
                    None,
                    line_string![(x: 500_050.0, y: 5_700_000.0), (x: 500_050.0, y: 5_700_000.0)],
                ),
            ],
            UTM,
        )
    }

    fn along_main(from: f64, to: f64) -> LineString<f64> {
        line_string![(x: 500_000.0 + from, y: 5_700_001.0), (x: 500_000.0 + to, y: 5_700_001.0)]
    }

    fn engine(profile: &RegionProfile, accumulation: Accumulation) -> CoverageEngine<'_> {
        CoverageEngine::new(profile, MetricFrame::new(UTM).unwrap()).with_accumulation(accumulation)
    }

    #[test]
    fn fully_walked_street_is_fully_covered() {
        let profile = profile();
        let walk = along_main(-20.0, 120.0);
        let result = engine(&profile, Accumulation::Union)
            .compute(&network(), [(0, &walk, UTM)])
            .unwrap();

        let main = &result.coverage[0];
        assert!((main.length - 100.0).abs() < 1e-9);
        assert!((main.coverage_percent - 100.0).abs() < 1e-6);
        assert!(main.covered);
        assert!(result.streets[0].covered);
        assert!((result.streets[0].coverage_percent - main.coverage_percent).abs() < f64::EPSILON);
    }

    #[test]
    fn untouched_street_has_no_coverage() {
        let profile = profile();
        let walk = along_main(-20.0, 120.0);
        let result = engine(&profile, Accumulation::Union)
            .compute(&network(), [(0, &walk, UTM)])
            .unwrap();

        let far = &result.coverage[1];
        assert!(far.coverage_percent.abs() < f64::EPSILON);
        assert!(!far.covered);
        assert!(!result.streets[1].covered);
    }

    #[test]
    fn zero_length_street_is_guarded() {
        let profile = profile();
        let walk = along_main(-20.0, 120.0);
        let result = engine(&profile, Accumulation::PerWalk)
            .compute(&network(), [(0, &walk, UTM)])
            .unwrap();

        let stub = &result.coverage[2];
        assert!(stub.coverage_percent.abs() < f64::EPSILON);
        assert!(!stub.covered);
    }

    #[test]
    fn no_walks_means_no_coverage() {
        let profile = profile();
        let result = engine(&profile, Accumulation::Union)
            .compute(&network(), std::iter::empty())
            .unwrap();

        assert!(result.coverage.iter().all(|c| !c.covered && c.coverage_percent == 0.0));
    }

    #[test]
    fn partial_coverage_includes_buffer_cap() {
        let profile = profile();
        // Walk ends at x = 50, the round cap reaches 8 m further
        let walk = along_main(-20.0, 50.0);
        let result = engine(&profile, Accumulation::Union)
            .compute(&network(), [(0, &walk, UTM)])
            .unwrap();

        let main = &result.coverage[0];
        assert!(main.coverage_percent > 55.0 && main.coverage_percent < 59.0, "{main:?}");
    }

    #[test]
    fn overlapping_walks_union_versus_per_walk() {
        let profile = profile();
        let first = along_main(-20.0, 50.0);
        let second = along_main(-10.0, 50.0);
        let walks = [(0, &first, UTM), (1, &second, UTM)];

        let union = engine(&profile, Accumulation::Union)
            .compute(&network(), walks)
            .unwrap();
        let summed = engine(&profile, Accumulation::PerWalk)
            .compute(&network(), walks)
            .unwrap();

        let union_percent = union.coverage[0].coverage_percent;
        let summed_percent = summed.coverage[0].coverage_percent;
        assert!(union_percent < 60.0);
        // Per-walk summation counts the shared stretch twice, then caps
        assert!((summed_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn coverage_is_bounded_and_idempotent() {
        let profile = profile();
        let walks: Vec<LineString<f64>> = (0..6)
            .map(|i| along_main(-30.0 + f64::from(i) * 5.0, 130.0))
            .collect();
        let input: Vec<_> = walks.iter().enumerate().map(|(i, w)| (i, w, UTM)).collect();

        for accumulation in [Accumulation::Union, Accumulation::PerWalk] {
            let engine = engine(&profile, accumulation);
            let first = engine.compute(&network(), input.clone()).unwrap();
            let second = engine.compute(&network(), input.clone()).unwrap();

            assert_eq!(first.coverage, second.coverage);
            for coverage in &first.coverage {
                assert!((0.0..=100.0).contains(&coverage.coverage_percent));
            }
        }
    }

    #[test]
    fn geographic_walks_meet_metric_streets() {
        let profile = profile();
        let frame = MetricFrame::new(UTM).unwrap();
        let engine = CoverageEngine::new(&profile, frame);

        // Walk along the street, expressed in lon/lat
        let metric_walk = along_main(-20.0, 120.0);
        let geographic_walk =
            crate::algo::projection::reproject_line(&metric_walk, UTM, Crs::Wgs84).unwrap();

        let result = engine
            .compute(&network(), [(0, &geographic_walk, Crs::Wgs84)])
            .unwrap();
        assert!(result.coverage[0].coverage_percent > 99.0);
    }

    #[test]
    fn unprojectable_walk_is_skipped() {
        let profile = profile();
        let good = along_main(-20.0, 120.0);
        let beyond_the_pole = line_string![(x: 10.0, y: 95.0), (x: 10.001, y: 95.0)];

        let result = engine(&profile, Accumulation::Union)
            .compute(&network(), [(0, &good, UTM), (1, &beyond_the_pole, Crs::Wgs84)])
            .unwrap();

        assert_eq!(result.skipped_walks, vec![1]);
        assert!((result.coverage[0].coverage_percent - 100.0).abs() < 1e-6);
    }

    #[test]
    fn failed_part_drops_the_whole_walk() {
        let profile = profile();
        let first_part = along_main(-20.0, 120.0);
        let broken_part = line_string![(x: 10.0, y: 95.0), (x: 10.001, y: 95.0)];

        let (index, skipped) = engine(&profile, Accumulation::PerWalk)
            .build_index([(7, &first_part, UTM), (7, &broken_part, Crs::Wgs84)]);

        assert_eq!(skipped, vec![7]);
        assert!(index.is_empty());
    }

    #[test]
    fn long_walks_are_indexed_in_chunks() {
        let profile = profile();
        // 2 km east along y = 5_700_001 in 10 m steps, then north
        let mut coords: Vec<(f64, f64)> = (0..=200)
            .map(|i| (499_000.0 + f64::from(i) * 10.0, 5_700_001.0))
            .collect();
        coords.extend((1..=100).map(|i| (501_000.0, 5_700_001.0 + f64::from(i) * 10.0)));
        let walk: LineString<f64> = coords.into();

        for accumulation in [Accumulation::Union, Accumulation::PerWalk] {
            let engine = engine(&profile, accumulation);
            let (index, skipped) = engine.build_index([(0, &walk, UTM)]);
            assert!(skipped.is_empty());
            assert_eq!(index.walk_count(), 1);
            // 301 points in runs of 16 sharing one point
            assert!(index.polygon_count() >= 20, "{}", index.polygon_count());

            // Chunk buffers overlap at their joints (one sits at x = 500_050)
            // but the walk still counts once
            let streets = network();
            assert!((index.covered_length(&streets.streets[0].geometry) - 100.0).abs() < 1e-6);

            let result = engine.compute(&streets, [(0, &walk, UTM)]).unwrap();
            assert!((result.coverage[0].coverage_percent - 100.0).abs() < 1e-6);
            // The northern leg passes x = 501_000, the far street starts there
            assert!(result.coverage[1].coverage_percent < 10.0);
        }
    }
}
