use std::path::Path;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::time_util;
use crate::trading::analysis::MarketStatistics;
use crate::trading::indicator::{
    merge_markers, PullbackAnnotation, PullbackConfig, PullbackDetectionIndicator, StructureRange,
};
use crate::trading::model::market::candles::{parse_candles, CandleFilter};
use crate::CandleItem;

/// 看板中的一行：K线原始字段 + 结构标注 + 合并标记
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub time: Option<String>,
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub upper_body: f64,
    pub lower_body: f64,
    #[serde(flatten)]
    pub annotation: PullbackAnnotation,
    pub swing_marker: Option<f64>,
    pub poc_marker: Option<f64>,
}

/// 看板数据；失败时 success=false 并携带错误信息，不向调用方抛出
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    pub success: bool,
    pub asset: String,
    pub interval: String,
    pub total_candles: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub statistics: Option<MarketStatistics>,
    pub range: Option<StructureRange>,
    pub data: Option<Vec<DashboardRow>>,
}

impl DashboardData {
    pub fn failure(asset: &str, interval: &str, error: impl ToString) -> Self {
        Self {
            success: false,
            asset: asset.to_string(),
            interval: interval.to_string(),
            total_candles: 0,
            error: Some(error.to_string()),
            statistics: None,
            range: None,
            data: None,
        }
    }
}

/// 结构回调看板服务
#[derive(Debug, Clone, Default)]
pub struct PullbackService {
    indicator: PullbackDetectionIndicator,
}

impl PullbackService {
    pub fn new(config: PullbackConfig) -> Self {
        Self {
            indicator: PullbackDetectionIndicator::new(config),
        }
    }

    pub fn config(&self) -> &PullbackConfig {
        self.indicator.config()
    }

    /// 读取K线文件并按条件筛选
    pub async fn load_candles(
        path: impl AsRef<Path>,
        filter: &CandleFilter,
    ) -> Result<Vec<CandleItem>, AppError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let candles = filter.apply(parse_candles(&content)?);
        match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => info!(
                "加载K线: {} -> {} 根, {} ~ {}",
                path.display(),
                candles.len(),
                time_util::mill_time_to_datetime(first.ts).unwrap_or_default(),
                time_util::mill_time_to_datetime(last.ts).unwrap_or_default()
            ),
            _ => warn!("加载K线: {} -> 0 根", path.display()),
        }
        Ok(candles)
    }

    /// 检测结构并组装看板数据
    pub fn get_dashboard_data(
        &self,
        asset: &str,
        interval: &str,
        candles: &[CandleItem],
    ) -> DashboardData {
        if candles.is_empty() {
            warn!("{} {} 没有可用的K线数据", asset, interval);
            return DashboardData::failure(asset, interval, "no market data available");
        }

        let value = match self.indicator.detect(candles) {
            Ok(value) => value,
            Err(e) => {
                error!("{} {} 结构检测失败: {}", asset, interval, e);
                return DashboardData::failure(asset, interval, e);
            }
        };

        let markers = merge_markers(&value.annotations);
        let rows: Vec<DashboardRow> = candles
            .iter()
            .zip(value.annotations.iter())
            .zip(markers.iter())
            .map(|((candle, annotation), marker)| DashboardRow {
                time: time_util::mill_time_to_rfc3339(candle.ts).ok(),
                ts: candle.ts,
                open: candle.o,
                high: candle.h,
                low: candle.l,
                close: candle.c,
                volume: candle.v,
                upper_body: candle.upper_body(),
                lower_body: candle.lower_body(),
                annotation: *annotation,
                swing_marker: marker.swing,
                poc_marker: marker.poc,
            })
            .collect();

        info!(
            "{} {} 检测完成: candles={}, swing_highs={}, swing_lows={}, range={:?}",
            asset,
            interval,
            candles.len(),
            value.swing_highs().len(),
            value.swing_lows().len(),
            value.range
        );

        DashboardData {
            success: true,
            asset: asset.to_string(),
            interval: interval.to_string(),
            total_candles: candles.len(),
            error: None,
            statistics: MarketStatistics::calculate(candles),
            range: Some(value.range),
            data: Some(rows),
        }
    }
}
