use chrono::{Duration, TimeZone, Utc};
use geo::{Coord, LineString};
use walkcover_core::algo::classifier::STRAIGHT_SINUOSITY;
use walkcover_core::prelude::*;

/// Trafalgar Square
const ORIGIN: Coord<f64> = Coord {
    x: -0.1281,
    y: 51.5080,
};
const DEG_PER_M_LAT: f64 = 1.0 / 111_320.0;
/// At 51.5 degrees north
const DEG_PER_M_LON: f64 = 1.0 / 69_300.0;

/// Point `east` / `north` metres away from the origin
fn offset(east: f64, north: f64) -> Coord<f64> {
    Coord {
        x: ORIGIN.x + east * DEG_PER_M_LON,
        y: ORIGIN.y + north * DEG_PER_M_LAT,
    }
}

fn raw_times(count: usize, step_secs: i64) -> Vec<String> {
    let start = Utc.with_ymd_and_hms(2024, 9, 14, 7, 30, 0).unwrap();
    (0..count)
        .map(|i| (start + Duration::seconds(step_secs * i as i64)).to_rfc3339())
        .collect()
}

/// Roughly 3 km east with sideways wiggles, sinuosity about 1.08
fn meandering(legs: usize, total_east: f64) -> LineString<f64> {
    let step = total_east / legs as f64;
    (0..=legs)
        .map(|i| {
            let north = if i % 2 == 0 { 0.0 } else { step * 0.41 };
            offset(step * i as f64, north)
        })
        .collect()
}

fn network() -> StreetNetwork {
    StreetNetwork::new(
        vec![
            Street::new(
                "strand",
                Some("Strand".to_string()),
                LineString::new(vec![offset(500.0, 0.0), offset(600.0, 0.0)]),
            ),
            Street::new(
                "mall",
                Some("The Mall".to_string()),
                LineString::new(vec![offset(0.0, -900.0), offset(150.0, -900.0)]),
            ),
        ],
        Crs::Wgs84,
    )
}

fn whole_trajectory_options() -> AnalysisOptions {
    AnalysisOptions {
        classification: ClassificationMode::WholeTrajectory,
        ..AnalysisOptions::default()
    }
}

#[test]
fn meandering_half_hour_walk_is_kept() {
    let registry = RegionRegistry::builtin();
    let analyzer = WalkAnalyzer::new(&registry, "london", whole_trajectory_options()).unwrap();

    let geometry = meandering(60, 3000.0);
    let walk = Trajectory::from_raw_timestamps("walk.tcx", geometry, &raw_times(61, 30), Crs::Wgs84);

    let metrics = walk.metrics().unwrap();
    assert!((metrics.direct_distance - 3000.0).abs() < 30.0);
    assert!((metrics.duration - 1800.0).abs() < 1e-9);
    assert!(metrics.sinuosity > STRAIGHT_SINUOSITY);

    assert_eq!(analyzer.classify(&walk).verdict, Verdict::Walking);
}

#[test]
fn five_minute_three_kilometres_is_transit() {
    let registry = RegionRegistry::builtin();
    let analyzer = WalkAnalyzer::new(&registry, "london", whole_trajectory_options()).unwrap();

    let geometry = meandering(60, 3000.0);
    let ride = Trajectory::from_raw_timestamps("bus.tcx", geometry, &raw_times(61, 5), Crs::Wgs84);

    assert_eq!(
        analyzer.classify(&ride).verdict,
        Verdict::Transit(TransitReason::TooFast)
    );
}

#[test]
fn walked_street_is_fully_covered_and_far_street_is_not() {
    let registry = RegionRegistry::builtin();
    let analyzer = WalkAnalyzer::new(&registry, "london", AnalysisOptions::default()).unwrap();

    // Straight along the Strand, 2 m north of it, well past both ends
    let geometry: LineString<f64> = (0..=12).map(|i| offset(400.0 + 25.0 * f64::from(i), 2.0)).collect();
    let walk = Trajectory::from_raw_timestamps("strand.tcx", geometry, &raw_times(13, 20), Crs::Wgs84);

    let analysis = analyzer.analyze(&[walk], &network()).unwrap();

    let strand = &analysis.street_coverage[0];
    assert!((strand.length - 100.0).abs() < 1.0, "{strand:?}");
    assert!((strand.coverage_percent - 100.0).abs() < 1e-6, "{strand:?}");
    assert!(strand.covered);

    let mall = &analysis.street_coverage[1];
    assert!(mall.coverage_percent.abs() < f64::EPSILON);
    assert!(!mall.covered);

    assert_eq!(analysis.result.valid_walks, 1);
    assert_eq!(analysis.result.covered_streets, 1);
    assert!(analysis.result.coverage_percent > 0.0 && analysis.result.coverage_percent < 100.0);
    assert!(analysis.result.walked_length <= analysis.result.covered_length + 1e-9);
}

#[test]
fn malformed_input_is_counted_but_never_covers() {
    let registry = RegionRegistry::builtin();
    let analyzer = WalkAnalyzer::new(&registry, "london", AnalysisOptions::default()).unwrap();

    let geometry: LineString<f64> = (0..=12).map(|i| offset(400.0 + 25.0 * f64::from(i), 2.0)).collect();
    let mut times = raw_times(13, 20);
    times[4] = "half past seven".to_string();
    let broken = Trajectory::from_raw_timestamps("broken.tcx", geometry, &times, Crs::Wgs84);

    let analysis = analyzer.analyze(&[broken], &network()).unwrap();

    assert_eq!(analysis.result.total_walks, 1);
    assert_eq!(analysis.result.valid_walks, 0);
    assert_eq!(analysis.walks[0].verdict, Verdict::Transit(TransitReason::NoMetrics));
    assert!(analysis.street_coverage.iter().all(|c| !c.covered));
}

#[test]
fn repeated_runs_agree() {
    let registry = RegionRegistry::builtin();
    let analyzer = WalkAnalyzer::new(&registry, "london", AnalysisOptions::default()).unwrap();

    let walks: Vec<Trajectory> = (0..4)
        .map(|k| {
            let geometry: LineString<f64> = (0..=12)
                .map(|i| offset(380.0 + 25.0 * f64::from(i) + f64::from(k) * 10.0, f64::from(k)))
                .collect();
            Trajectory::from_raw_timestamps(format!("w{k}"), geometry, &raw_times(13, 20), Crs::Wgs84)
        })
        .collect();

    let first = analyzer.analyze(&walks, &network()).unwrap();
    let second = analyzer.analyze(&walks, &network()).unwrap();

    assert_eq!(first.street_coverage, second.street_coverage);
    assert_eq!(first.result, second.result);
    assert!(first.street_coverage.iter().all(|c| (0.0..=100.0).contains(&c.coverage_percent)));
}

#[test]
fn geojson_export_lists_streets_then_walks() {
    let registry = RegionRegistry::builtin();
    let analyzer = WalkAnalyzer::new(&registry, "london", AnalysisOptions::default()).unwrap();

    let geometry: LineString<f64> = (0..=12).map(|i| offset(400.0 + 25.0 * f64::from(i), 2.0)).collect();
    let walk = Trajectory::from_raw_timestamps("strand.tcx", geometry, &raw_times(13, 20), Crs::Wgs84);
    let analysis = analyzer.analyze(&[walk], &network()).unwrap();

    let text = analysis.to_geojson_string().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    let features = parsed["features"].as_array().unwrap();

    let kinds: Vec<&str> = features
        .iter()
        .map(|f| f["properties"]["data_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["covered_street", "uncovered_street", "walk"]);
}

#[test]
fn registry_from_toml_drives_analysis() {
    let registry = RegionRegistry::from_toml_str(
        r#"
        [regions.test_town]
        buffer_distance = 3.0
        max_walking_speed = 2.0
        min_walking_speed = 0.2
        max_sinuosity = 3.0
        max_direct_distance = 4000.0
        "#,
    )
    .unwrap();
    let analyzer = WalkAnalyzer::new(&registry, "Test_Town", AnalysisOptions::default()).unwrap();

    // 2 m off the street with a 3 m buffer still covers it
    let geometry: LineString<f64> = (0..=12).map(|i| offset(400.0 + 25.0 * f64::from(i), 2.0)).collect();
    let walk = Trajectory::from_raw_timestamps("strand.tcx", geometry, &raw_times(13, 20), Crs::Wgs84);

    let analysis = analyzer.analyze(&[walk], &network()).unwrap();
    assert!(analysis.streets[0].covered);
}

#[test]
fn impossible_positions_do_not_sink_the_batch() {
    let registry = RegionRegistry::builtin();
    let analyzer = WalkAnalyzer::new(&registry, "london", AnalysisOptions::default()).unwrap();

    let geometry: LineString<f64> = (0..=12).map(|i| offset(400.0 + 25.0 * f64::from(i), 2.0)).collect();
    let good = Trajectory::from_raw_timestamps("strand.tcx", geometry, &raw_times(13, 20), Crs::Wgs84);
    // Latitude 95 is past the pole
    let beyond: LineString<f64> = (0..=12)
        .map(|i| Coord {
            x: 10.0 + f64::from(i) * 0.0003,
            y: 95.0,
        })
        .collect();
    let bad = Trajectory::from_raw_timestamps("corrupt.tcx", beyond, &raw_times(13, 20), Crs::Wgs84);

    let analysis = analyzer.analyze(&[good, bad], &network()).unwrap();

    assert_eq!(analysis.result.total_walks, 2);
    assert_eq!(analysis.result.valid_walks, 1);
    assert_eq!(analysis.walks[1].verdict, Verdict::Transit(TransitReason::NoMetrics));
    assert!(analysis.streets[0].covered);
    assert!(!analysis.walks[1].is_valid());
}

#[test]
fn temporal_and_area_patterns_of_a_saturday_walk() {
    let registry = RegionRegistry::builtin();
    let analyzer = WalkAnalyzer::new(&registry, "london", AnalysisOptions::default()).unwrap();

    // 2024-09-14 07:30 UTC, a Saturday morning
    let geometry: LineString<f64> = (0..=12).map(|i| offset(400.0 + 25.0 * f64::from(i), 2.0)).collect();
    let walk = Trajectory::from_raw_timestamps("strand.tcx", geometry, &raw_times(13, 20), Crs::Wgs84);
    let analysis = analyzer.analyze(&[walk], &network()).unwrap();

    let temporal = analysis.temporal;
    assert_eq!(temporal.timed_walks, 1);
    assert_eq!(temporal.most_active_hour, Some(7));
    assert_eq!(temporal.most_active_day, Some(chrono::Weekday::Sat));
    assert_eq!(temporal.weekend_walks, 1);
    assert_eq!(temporal.weekday_walks, 0);
    assert_eq!(temporal.weekend_ratio, None);

    // 300 m at 0.001 degree cells spans a handful of cells, none revisited
    assert!(!analysis.common_areas.is_empty());
    assert!(analysis.common_areas.len() <= COMMON_AREA_LIMIT);
    assert!(analysis.common_areas.iter().all(|area| area.walks == 1));
    let visits: usize = analysis.common_areas.iter().map(|area| area.visits).sum();
    assert!(visits <= 13);
    assert!(
        analysis
            .common_areas
            .windows(2)
            .all(|pair| pair[0].visits >= pair[1].visits)
    );
}
