use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::CandleItem;

/// K线文件中的一行
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CandleRecord {
    #[serde(alias = "ts")]
    pub time: i64, // 开始时间，Unix时间戳的毫秒数格式
    #[serde(alias = "o")]
    pub open: f64, // 开盘价格
    #[serde(alias = "h")]
    pub high: f64, // 最高价格
    #[serde(alias = "l")]
    pub low: f64, // 最低价格
    #[serde(alias = "c")]
    pub close: f64, // 收盘价格
    #[serde(alias = "v", alias = "vol", default)]
    pub volume: f64, // 交易量
}

impl TryFrom<&CandleRecord> for CandleItem {
    type Error = AppError;

    fn try_from(record: &CandleRecord) -> Result<Self, Self::Error> {
        CandleItem::builder()
            .ts(record.time)
            .o(record.open)
            .h(record.high)
            .l(record.low)
            .c(record.close)
            .v(record.volume)
            .build()
    }
}

/// 解析 JSON 数组格式的K线
pub fn parse_candles(json: &str) -> Result<Vec<CandleItem>, AppError> {
    let records: Vec<CandleRecord> = serde_json::from_str(json)?;
    records.iter().map(CandleItem::try_from).collect()
}

/// K线筛选条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandleFilter {
    pub start_time: Option<i64>, // 起始时间（毫秒，含）
    pub limit: usize,            // 保留最近的K线数量
}

impl CandleFilter {
    pub const MAX_LIMIT: usize = 1000;

    /// 按时间排序后截取，保证检测器拿到的序列时间不递减
    pub fn apply(&self, mut candles: Vec<CandleItem>) -> Vec<CandleItem> {
        if let Some(start_time) = self.start_time {
            candles.retain(|c| c.ts >= start_time);
        }
        candles.sort_by_key(|c| c.ts);

        let limit = self.limit.min(Self::MAX_LIMIT);
        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }
        candles
    }
}

impl Default for CandleFilter {
    fn default() -> Self {
        Self {
            start_time: None,
            limit: Self::MAX_LIMIT,
        }
    }
}
