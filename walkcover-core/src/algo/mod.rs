pub mod aggregate;
pub mod classifier;
pub mod coverage;
pub mod metrics;
pub mod projection;
pub mod segments;

pub use aggregate::{
    COMMON_AREA_GRID, COMMON_AREA_LIMIT, CommonArea, CoverageResult, TemporalSummary, WalkSummary,
    aggregate, identify_common_areas, summarize_temporal, summarize_walks,
};
pub use classifier::{Granularity, TransitClassifier, TransitReason, Verdict};
pub use coverage::{Accumulation, BufferIndex, CoverageEngine, NetworkCoverage, WALK_CHUNK_POINTS};
pub use metrics::{Metrics, calculate_metrics};
pub use projection::{MetricFrame, reproject_line};
pub use segments::{Segment, SegmentSplitter};
