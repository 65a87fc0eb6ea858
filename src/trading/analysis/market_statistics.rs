use serde::{Deserialize, Serialize};

use crate::time_util;
use crate::CandleItem;

/// 行情区间统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStatistics {
    pub current_price: f64,                   // 最新收盘价
    pub highest_price: f64,                   // 区间最高价
    pub lowest_price: f64,                    // 区间最低价
    pub average_price: f64,                   // 收盘价均值
    pub price_change: f64,                    // 最新收盘价 - 首根开盘价
    pub price_change_percentage: Option<f64>, // 首根开盘价为0时无意义
    pub total_volume: f64,
    pub average_volume: f64,
    pub first_time: Option<String>,
    pub last_time: Option<String>,
}

impl MarketStatistics {
    /// 空序列返回 None
    pub fn calculate(candles: &[CandleItem]) -> Option<Self> {
        let first = candles.first()?;
        let last = candles.last()?;
        let count = candles.len() as f64;

        let highest_price = candles.iter().map(|c| c.h).fold(f64::MIN, f64::max);
        let lowest_price = candles.iter().map(|c| c.l).fold(f64::MAX, f64::min);
        let total_close: f64 = candles.iter().map(|c| c.c).sum();
        let total_volume: f64 = candles.iter().map(|c| c.v).sum();

        let price_change = last.c - first.o;
        let price_change_percentage = if first.o != 0.0 {
            Some(price_change / first.o * 100.0)
        } else {
            None
        };

        Some(Self {
            current_price: last.c,
            highest_price,
            lowest_price,
            average_price: total_close / count,
            price_change,
            price_change_percentage,
            total_volume,
            average_volume: total_volume / count,
            first_time: time_util::mill_time_to_rfc3339(first.ts).ok(),
            last_time: time_util::mill_time_to_rfc3339(last.ts).ok(),
        })
    }
}
