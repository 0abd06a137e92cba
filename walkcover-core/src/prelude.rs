pub use crate::algo::{COMMON_AREA_GRID, COMMON_AREA_LIMIT};
pub use crate::DEFAULT_SEGMENT_SIZE;

// Analysis entry points
pub use crate::analysis::{
    Analysis, WalkAnalyzer, WalkClassification, select_region_walks, streets_to_geojson,
    walks_to_geojson,
};
pub use crate::loading::{AnalysisOptions, ClassificationMode, RegionProfile, RegionRegistry};

// Building blocks
pub use crate::algo::{
    Accumulation, CommonArea, CoverageEngine, CoverageResult, Granularity, MetricFrame, Metrics,
    SegmentSplitter, TemporalSummary, TransitClassifier, TransitReason, Verdict, WalkSummary,
    aggregate, calculate_metrics, identify_common_areas, summarize_temporal, summarize_walks,
};

// Data model
pub use crate::model::{Crs, Street, StreetCoverage, StreetNetwork, Trajectory};

pub use crate::Meters;
pub use crate::Seconds;
