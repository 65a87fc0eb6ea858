pub mod app_config;
pub mod error;
pub mod time_util;
pub mod trading;

use serde::Serialize;

use crate::error::AppError;

/// 单根K线（OHLCV），检测器只读不写
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleItem {
    pub(crate) o: f64,
    pub(crate) h: f64,
    pub(crate) l: f64,
    pub(crate) c: f64,
    pub(crate) v: f64,
    pub(crate) ts: i64,
}

impl CandleItem {
    pub fn builder() -> CandleItemBuilder {
        CandleItemBuilder::new()
    }
    pub fn ts(&self) -> i64 {
        self.ts
    }

    pub fn o(&self) -> f64 {
        self.o
    }

    pub fn h(&self) -> f64 {
        self.h
    }

    pub fn l(&self) -> f64 {
        self.l
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn v(&self) -> f64 {
        self.v
    }

    /// 实体上沿 max(open, close)
    pub fn upper_body(&self) -> f64 {
        self.o.max(self.c)
    }

    /// 实体下沿 min(open, close)
    pub fn lower_body(&self) -> f64 {
        self.o.min(self.c)
    }
}

#[derive(Debug, Default)]
pub struct CandleItemBuilder {
    o: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    c: Option<f64>,
    v: Option<f64>,
    ts: Option<i64>,
}

impl CandleItemBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn ts(mut self, val: i64) -> Self {
        self.ts = Some(val);
        self
    }
    pub fn o(mut self, val: f64) -> Self {
        self.o = Some(val);
        self
    }

    pub fn h(mut self, val: f64) -> Self {
        self.h = Some(val);
        self
    }

    pub fn l(mut self, val: f64) -> Self {
        self.l = Some(val);
        self
    }

    pub fn c(mut self, val: f64) -> Self {
        self.c = Some(val);
        self
    }

    pub fn v(mut self, val: f64) -> Self {
        self.v = Some(val);
        self
    }

    /// 校验并构建K线；NaN/Inf 与不合法的 OHLC 在这里被拒绝，检测器默认输入干净
    pub fn build(self) -> Result<CandleItem, AppError> {
        let (Some(o), Some(h), Some(l), Some(c), Some(v), Some(ts)) =
            (self.o, self.h, self.l, self.c, self.v, self.ts)
        else {
            return Err(AppError::Parse("CandleItemIncomplete".to_string()));
        };

        let finite = [o, h, l, c, v].iter().all(|x| x.is_finite());
        if finite && l <= o && l <= c && l <= h && h >= o && h >= c && v >= 0.0 {
            Ok(CandleItem { o, h, l, c, v, ts })
        } else {
            Err(AppError::Parse(format!(
                "CandleItemInvalid: ts={} o={} h={} l={} c={} v={}",
                ts, o, h, l, c, v
            )))
        }
    }
}
