//! 结构类指标

pub mod pullback_detection_indicator;
pub mod structure_marker;

pub use pullback_detection_indicator::{
    detect_pullbacks, BreakGuard, PullbackAnnotation, PullbackConfig, PullbackDetectionIndicator,
    PullbackDetectionValue, PullbackError, StructureRange, Trend, DEFAULT_THRESHOLD, MIN_CANDLES,
};
pub use structure_marker::{merge_markers, StructureMarker};
