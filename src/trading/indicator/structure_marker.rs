use serde::{Deserialize, Serialize};

use super::pullback_detection_indicator::PullbackAnnotation;

/// 合并后的图表标记：突破点（swing）与回调位（poc）各占一列
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureMarker {
    pub swing: Option<f64>,
    pub poc: Option<f64>,
}

/// 把高/低两侧的标注合并成单列标记，同一根K线上低点一侧优先
pub fn merge_markers(annotations: &[PullbackAnnotation]) -> Vec<StructureMarker> {
    annotations
        .iter()
        .map(|a| StructureMarker {
            swing: a.swing_low.or(a.swing_high),
            poc: a.poc_low.or(a.poc_high),
        })
        .collect()
}
