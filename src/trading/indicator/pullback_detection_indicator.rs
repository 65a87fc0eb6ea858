use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::CandleItem;

/// 检测需要的最少K线数（每根被评估的K线都需要前后各一根）
pub const MIN_CANDLES: usize = 3;

/// 默认阈值，仅透传到结果中
pub const DEFAULT_THRESHOLD: f64 = 0.21;

/// 结构检测错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PullbackError {
    #[error("K线数量不足: 至少需要 {required} 根, 实际 {len} 根")]
    InsufficientData { len: usize, required: usize },

    /// 窗口重置与累积不同步，属于程序缺陷
    #[error("内部状态不一致: {0}")]
    InvariantViolation(String),
}

/// 趋势方向（分类值，不参与算术）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Trend {
    Down,
    #[default]
    Neutral,
    Up,
}

impl From<Trend> for i8 {
    fn from(trend: Trend) -> Self {
        match trend {
            Trend::Down => -1,
            Trend::Neutral => 0,
            Trend::Up => 1,
        }
    }
}

impl TryFrom<i8> for Trend {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Trend::Down),
            0 => Ok(Trend::Neutral),
            1 => Ok(Trend::Up),
            other => Err(format!("invalid trend value: {}", other)),
        }
    }
}

/// 突破确认规则
///
/// - `Strict`: 突破价必须严格超出当前结构区间，平顶/平底不会重复触发
/// - `Unguarded`: 只要求局部高低点形态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakGuard {
    #[default]
    Strict,
    Unguarded,
}

impl BreakGuard {
    fn allows(self, exceeds_range: bool) -> bool {
        match self {
            BreakGuard::Strict => exceeds_range,
            BreakGuard::Unguarded => true,
        }
    }
}

impl fmt::Display for BreakGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakGuard::Strict => write!(f, "strict"),
            BreakGuard::Unguarded => write!(f, "unguarded"),
        }
    }
}

impl FromStr for BreakGuard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(BreakGuard::Strict),
            "unguarded" | "none" => Ok(BreakGuard::Unguarded),
            other => Err(format!("unknown break guard '{}', expected strict|unguarded", other)),
        }
    }
}

/// 检测参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PullbackConfig {
    pub threshold: f64,          // 阈值（保留参数，不影响检测）
    pub break_guard: BreakGuard, // 突破确认规则
    pub mark_pivots: bool,       // 是否标记局部高低点
}

impl Default for PullbackConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            break_guard: BreakGuard::Strict,
            mark_pivots: true,
        }
    }
}

/// 单根K线上的结构标注，未触发的字段为 None
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PullbackAnnotation {
    pub swing_high: Option<f64>, // 向上突破确认价
    pub swing_low: Option<f64>,  // 向下突破确认价
    pub poc_high: Option<f64>,   // 向上突破对应的回调位（写在更早的K线上）
    pub poc_low: Option<f64>,    // 向下突破对应的回调位
    pub pivot_high: Option<f64>, // 局部高点
    pub pivot_low: Option<f64>,  // 局部低点
    pub trend: Option<Trend>,    // 该K线时的趋势
}

impl PullbackAnnotation {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// 检测结束时的结构区间
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureRange {
    pub structural_low: f64,
    pub structural_high: f64,
    pub trend: Trend,
    pub threshold: f64,
}

/// 检测结果：逐K线标注 + 终态区间
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullbackDetectionValue {
    pub annotations: Vec<PullbackAnnotation>,
    pub range: StructureRange,
}

impl PullbackDetectionValue {
    /// 所有向上突破 (index, price)
    pub fn swing_highs(&self) -> Vec<(usize, f64)> {
        self.collect(|a| a.swing_high)
    }

    /// 所有向下突破 (index, price)
    pub fn swing_lows(&self) -> Vec<(usize, f64)> {
        self.collect(|a| a.swing_low)
    }

    pub fn poc_highs(&self) -> Vec<(usize, f64)> {
        self.collect(|a| a.poc_high)
    }

    pub fn poc_lows(&self) -> Vec<(usize, f64)> {
        self.collect(|a| a.poc_low)
    }

    fn collect(&self, field: impl Fn(&PullbackAnnotation) -> Option<f64>) -> Vec<(usize, f64)> {
        self.annotations
            .iter()
            .enumerate()
            .filter_map(|(i, a)| field(a).map(|price| (i, price)))
            .collect()
    }
}

/// 两次突破之间累积的高低点窗口，三个队列始终同步重置、同步追加
#[derive(Debug, Default)]
struct PocWindow {
    lows: VecDeque<f64>,
    highs: VecDeque<f64>,
    indices: VecDeque<usize>,
}

impl PocWindow {
    fn push(&mut self, low: f64, high: f64, index: usize) {
        self.lows.push_back(low);
        self.highs.push_back(high);
        self.indices.push_back(index);
    }

    fn clear(&mut self) {
        self.lows.clear();
        self.highs.clear();
        self.indices.clear();
    }

    fn drop_oldest(&mut self) {
        self.lows.pop_front();
        self.highs.pop_front();
        self.indices.pop_front();
    }

    fn len(&self) -> usize {
        self.indices.len()
    }

    fn check_aligned(&self) -> Result<(), PullbackError> {
        if self.lows.len() != self.indices.len() || self.highs.len() != self.indices.len() {
            return Err(PullbackError::InvariantViolation(format!(
                "window length mismatch: lows={} highs={} indices={}",
                self.lows.len(),
                self.highs.len(),
                self.indices.len()
            )));
        }
        Ok(())
    }

    /// 窗口最低值及其原始索引，相等时取最早的一个
    fn lowest(&self) -> Result<(usize, f64), PullbackError> {
        self.check_aligned()?;
        let (pos, value) = first_extreme(&self.lows, |candidate, best| candidate < best)
            .ok_or_else(|| PullbackError::InvariantViolation("argmin over empty window".into()))?;
        Ok((self.indices[pos], value))
    }

    /// 窗口最高值及其原始索引，相等时取最早的一个
    fn highest(&self) -> Result<(usize, f64), PullbackError> {
        self.check_aligned()?;
        let (pos, value) = first_extreme(&self.highs, |candidate, best| candidate > best)
            .ok_or_else(|| PullbackError::InvariantViolation("argmax over empty window".into()))?;
        Ok((self.indices[pos], value))
    }
}

fn first_extreme(
    values: &VecDeque<f64>,
    better: impl Fn(f64, f64) -> bool,
) -> Option<(usize, f64)> {
    let mut iter = values.iter().copied().enumerate();
    let first = iter.next()?;
    Some(iter.fold(first, |best, (pos, value)| {
        if better(value, best.1) {
            (pos, value)
        } else {
            best
        }
    }))
}

/// 单次检测的滚动状态
#[derive(Debug)]
struct RunState {
    structural_high: f64,
    structural_low: f64,
    trend: Trend,
    window: PocWindow,
}

impl RunState {
    fn new(first: &CandleItem) -> Self {
        let structural_high = first.h;
        let structural_low = first.l;
        // 两个窗口都以首根K线同侧的价格作为种子
        let mut window = PocWindow::default();
        window.push(structural_low, structural_high, 0);
        Self {
            structural_high,
            structural_low,
            trend: Trend::Neutral,
            window,
        }
    }

    fn update_trend(&mut self, candle: &CandleItem) {
        if self.structural_high <= candle.upper_body() {
            self.trend = Trend::Up;
        } else if self.structural_low >= candle.lower_body() {
            self.trend = Trend::Down;
        }
    }
}

/// 结构突破与回调检测指标
///
/// 单次顺序扫描K线：维护结构区间和趋势，在确认新的高/低点突破时，
/// 回溯上一段窗口的极值位置作为回调位（POC）写到更早的K线上。
#[derive(Debug, Clone, Default)]
pub struct PullbackDetectionIndicator {
    config: PullbackConfig,
}

impl PullbackDetectionIndicator {
    pub fn new(config: PullbackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PullbackConfig {
        &self.config
    }

    pub fn detect(&self, candles: &[CandleItem]) -> Result<PullbackDetectionValue, PullbackError> {
        let len = candles.len();
        if len < MIN_CANDLES {
            return Err(PullbackError::InsufficientData {
                len,
                required: MIN_CANDLES,
            });
        }

        let mut state = RunState::new(&candles[0]);
        let mut annotations = vec![PullbackAnnotation::default(); len];

        for i in 1..len - 1 {
            let previous = &candles[i - 1];
            let current = &candles[i];
            let next = &candles[i + 1];

            if self.config.mark_pivots {
                if current.h > previous.h && current.h > next.h {
                    annotations[i].pivot_high = Some(current.h);
                }
                if current.l < previous.l && current.l < next.l {
                    annotations[i].pivot_low = Some(current.l);
                }
            }

            state.update_trend(current);

            if state.trend == Trend::Up
                && current.h >= previous.h
                && current.h > next.h
                && self.config.break_guard.allows(current.h > state.structural_high)
            {
                Self::confirm_up_break(&mut state, &mut annotations, i, current.h)?;
            }

            if state.trend == Trend::Down
                && current.l <= previous.l
                && current.l < next.l
                && self.config.break_guard.allows(current.l < state.structural_low)
            {
                Self::confirm_down_break(&mut state, &mut annotations, i, current.l)?;
            }

            state.window.push(current.l, current.h, i);
            annotations[i].trend = Some(state.trend);
        }

        let range = StructureRange {
            structural_low: state.structural_low,
            structural_high: state.structural_high,
            trend: state.trend,
            threshold: self.config.threshold,
        };
        debug!(
            "pullback detection done: candles={}, range=[{}, {}], trend={:?}, guard={}",
            len, range.structural_low, range.structural_high, range.trend, self.config.break_guard
        );

        Ok(PullbackDetectionValue { annotations, range })
    }

    fn confirm_up_break(
        state: &mut RunState,
        annotations: &mut [PullbackAnnotation],
        index: usize,
        high: f64,
    ) -> Result<(), PullbackError> {
        annotations[index].swing_high = Some(high);
        state.structural_high = high;

        let (mut poc_index, mut poc_price) = state.window.lowest()?;
        annotations[poc_index].poc_high = Some(poc_price);
        for annotation in annotations[poc_index + 1..].iter_mut() {
            annotation.poc_high = None;
        }

        // 回调位落在上一次突破K线上时无效：丢弃窗口首元素后重新取一次，只修正一次
        if let Some(previous_swing) = annotations[poc_index].swing_high {
            if previous_swing != poc_price {
                annotations[poc_index].poc_high = None;
                state.window.drop_oldest();
                (poc_index, poc_price) = state.window.lowest()?;
                annotations[poc_index].poc_high = Some(poc_price);
            }
        }

        state.structural_low = poc_price;
        debug!(
            "up break at {}: high={}, poc_index={}, poc={}, window={}",
            index,
            high,
            poc_index,
            poc_price,
            state.window.len()
        );
        state.window.clear();
        Ok(())
    }

    fn confirm_down_break(
        state: &mut RunState,
        annotations: &mut [PullbackAnnotation],
        index: usize,
        low: f64,
    ) -> Result<(), PullbackError> {
        annotations[index].swing_low = Some(low);
        state.structural_low = low;

        let (mut poc_index, mut poc_price) = state.window.highest()?;
        annotations[poc_index].poc_low = Some(poc_price);
        for annotation in annotations[poc_index + 1..].iter_mut() {
            annotation.poc_low = None;
        }

        if let Some(previous_swing) = annotations[poc_index].swing_low {
            if previous_swing != poc_price {
                annotations[poc_index].poc_low = None;
                state.window.drop_oldest();
                (poc_index, poc_price) = state.window.highest()?;
                annotations[poc_index].poc_low = Some(poc_price);
            }
        }

        state.structural_high = poc_price;
        debug!(
            "down break at {}: low={}, poc_index={}, poc={}, window={}",
            index,
            low,
            poc_index,
            poc_price,
            state.window.len()
        );
        state.window.clear();
        Ok(())
    }
}

/// 使用默认规则（严格突破 + 局部高低点）检测
pub fn detect_pullbacks(
    candles: &[CandleItem],
    threshold: f64,
) -> Result<PullbackDetectionValue, PullbackError> {
    PullbackDetectionIndicator::new(PullbackConfig {
        threshold,
        ..PullbackConfig::default()
    })
    .detect(candles)
}
