use anyhow::Result;

use rust_pullback::trading::indicator::{
    detect_pullbacks, merge_markers, BreakGuard, PullbackConfig, PullbackDetectionIndicator,
    PullbackDetectionValue, Trend, DEFAULT_THRESHOLD,
};
use rust_pullback::CandleItem;

fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> CandleItem {
    CandleItem::builder()
        .ts(ts)
        .o(o)
        .h(h)
        .l(l)
        .c(c)
        .v(100.0)
        .build()
        .unwrap()
}

// 固定种子的线性同余随机数，保证每次生成同一段行情
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// 从 500 开始的随机游走，每根K线开盘价等于上一根收盘价
fn random_walk(seed: u64, len: usize) -> Vec<CandleItem> {
    let mut rng = Lcg(seed);
    let mut close = 500.0;
    (0..len)
        .map(|i| {
            let open = close;
            let step = if rng.next_f64() < 0.5 { -0.5 } else { 0.5 };
            close = open + step * (1.0 + (rng.next_f64() * 4.0).floor());
            let high = open.max(close) + (rng.next_f64() * 4.0).floor() * 0.25;
            let low = open.min(close) - (rng.next_f64() * 4.0).floor() * 0.25;
            candle(1_704_067_200_000 + i as i64 * 3_600_000, open, high, low, close)
        })
        .collect()
}

fn detect(candles: &[CandleItem], break_guard: BreakGuard) -> PullbackDetectionValue {
    PullbackDetectionIndicator::new(PullbackConfig {
        break_guard,
        ..PullbackConfig::default()
    })
    .detect(candles)
    .unwrap()
}

// 首次出现的极值位置
fn first_extreme(values: &[(usize, f64)], better: impl Fn(f64, f64) -> bool) -> (usize, f64) {
    let mut best = values[0];
    for &candidate in &values[1..] {
        if better(candidate.1, best.1) {
            best = candidate;
        }
    }
    best
}

/// 按突破位置重放回调位：窗口为上一次突破（没有则为首根K线）到本次突破之前，
/// 取最低低点/最高高点；落在上一次同向突破K线上时去掉窗口首元素重取一次。
/// 之后的同向突破会清掉更晚位置上的旧回调位。
fn replay_pocs(candles: &[CandleItem], value: &PullbackDetectionValue, up: bool) -> Vec<Option<f64>> {
    let mut pocs = vec![None; candles.len()];
    let mut window_start = 0;
    for (index, a) in value.annotations.iter().enumerate() {
        let is_break = a.swing_high.is_some() || a.swing_low.is_some();
        if !is_break {
            continue;
        }

        let same_side = if up { a.swing_high.is_some() } else { a.swing_low.is_some() };
        if same_side {
            let price_of = |j: usize| if up { candles[j].l() } else { candles[j].h() };
            let better = |candidate: f64, best: f64| if up { candidate < best } else { candidate > best };
            let window = |from: usize| (from..index).map(|j| (j, price_of(j))).collect::<Vec<_>>();

            let (first, price) = first_extreme(&window(window_start), better);
            let previous_swing = if up {
                value.annotations[first].swing_high
            } else {
                value.annotations[first].swing_low
            };
            let (poc_index, poc_price) = match previous_swing {
                Some(swing) if swing != price => first_extreme(&window(window_start + 1), better),
                _ => (first, price),
            };

            for slot in pocs[first..].iter_mut() {
                *slot = None;
            }
            pocs[poc_index] = Some(poc_price);
        }
        window_start = index;
    }
    pocs
}

fn assert_structure_properties(candles: &[CandleItem], value: &PullbackDetectionValue) {
    let last = candles.len() - 1;
    assert_eq!(value.annotations.len(), candles.len());
    assert_eq!(value.annotations[0].trend, None);
    assert_eq!(value.annotations[last].trend, None);

    let mut seen_direction = false;
    for (i, (candle, a)) in candles.iter().zip(value.annotations.iter()).enumerate() {
        if (1..last).contains(&i) {
            let trend = a.trend.expect("interior candle must carry a trend");
            // 趋势一旦确定不会回到中性
            if seen_direction {
                assert_ne!(trend, Trend::Neutral, "trend reverted to neutral at {}", i);
            }
            seen_direction |= trend != Trend::Neutral;
        }

        assert!(
            !(a.swing_high.is_some() && a.swing_low.is_some()),
            "both breaks on candle {}",
            i
        );
        if let Some(price) = a.swing_high {
            assert_eq!(price, candle.h());
        }
        if let Some(price) = a.swing_low {
            assert_eq!(price, candle.l());
        }
        if let Some(price) = a.poc_high {
            assert_eq!(price, candle.l(), "poc_high at {}", i);
        }
        if let Some(price) = a.poc_low {
            assert_eq!(price, candle.h(), "poc_low at {}", i);
        }
    }

    let poc_highs: Vec<Option<f64>> = value.annotations.iter().map(|a| a.poc_high).collect();
    let poc_lows: Vec<Option<f64>> = value.annotations.iter().map(|a| a.poc_low).collect();
    assert_eq!(poc_highs, replay_pocs(candles, value, true));
    assert_eq!(poc_lows, replay_pocs(candles, value, false));

    // 每个回调位之后都有对应方向的突破
    for (poc_index, _) in value.poc_highs() {
        assert!(value.swing_highs().iter().any(|&(i, _)| i > poc_index));
    }
    for (poc_index, _) in value.poc_lows() {
        assert!(value.swing_lows().iter().any(|&(i, _)| i > poc_index));
    }
}

#[test]
fn test_random_walk_properties() -> Result<()> {
    for seed in [7u64, 42, 2024, 99_991] {
        let candles = random_walk(seed, 400);
        for guard in [BreakGuard::Strict, BreakGuard::Unguarded] {
            let value = detect(&candles, guard);
            assert_structure_properties(&candles, &value);

            let again = detect(&candles, guard);
            assert_eq!(value, again, "seed {} guard {} not idempotent", seed, guard);
        }
    }
    Ok(())
}

#[test]
fn test_strict_breaks_extend_the_range() -> Result<()> {
    let mut total_breaks = 0;
    for seed in [7u64, 42, 2024, 99_991] {
        let candles = random_walk(seed, 400);
        let value = detect(&candles, BreakGuard::Strict);

        // 同方向连续突破（中间没有反向突破）必须创出新高/新低
        let mut last_high: Option<f64> = None;
        let mut last_low: Option<f64> = None;
        for a in &value.annotations {
            if let Some(high) = a.swing_high {
                if let Some(previous) = last_high {
                    assert!(high > previous, "seed {}: {} <= {}", seed, high, previous);
                }
                last_high = Some(high);
                last_low = None;
                total_breaks += 1;
            }
            if let Some(low) = a.swing_low {
                if let Some(previous) = last_low {
                    assert!(low < previous, "seed {}: {} >= {}", seed, low, previous);
                }
                last_low = Some(low);
                last_high = None;
                total_breaks += 1;
            }
        }
    }
    assert!(total_breaks > 0);
    Ok(())
}

#[test]
fn test_monotonic_five_candles() -> Result<()> {
    let candles: Vec<CandleItem> = (0..5)
        .map(|k| {
            let base = 100.0 + 5.0 * k as f64;
            candle(k as i64, base, base + 6.0, base - 1.0, base + 4.0)
        })
        .collect();

    let value = detect_pullbacks(&candles, DEFAULT_THRESHOLD)?;
    let trends: Vec<Option<Trend>> = value.annotations.iter().map(|a| a.trend).collect();
    assert_eq!(
        trends,
        vec![None, Some(Trend::Up), Some(Trend::Up), Some(Trend::Up), None]
    );
    assert!(value.swing_lows().is_empty());
    assert_eq!(value.range.trend, Trend::Up);
    assert_eq!(value.range.threshold, DEFAULT_THRESHOLD);
    Ok(())
}

#[test]
fn test_v_shape_five_candles() -> Result<()> {
    let candles = vec![
        candle(0, 20.0, 21.0, 18.0, 19.0),
        candle(1, 19.0, 19.5, 16.0, 17.0),
        candle(2, 17.0, 17.5, 13.0, 14.0),
        candle(3, 14.6, 17.0, 14.5, 16.0),
        candle(4, 16.0, 19.0, 15.5, 18.0),
    ];

    let value = detect_pullbacks(&candles, DEFAULT_THRESHOLD)?;
    assert_eq!(value.swing_lows(), vec![(2, 13.0)]);
    assert_eq!(value.poc_lows(), vec![(0, 21.0)]);
    assert_eq!(value.range.structural_high, 21.0);
    assert!(value.swing_highs().is_empty());

    let markers = merge_markers(&value.annotations);
    assert_eq!(markers[2].swing, Some(13.0));
    assert_eq!(markers[0].poc, Some(21.0));
    assert_eq!(markers[0].swing, None);
    assert_eq!(markers[1].poc, None);
    Ok(())
}

#[test]
fn test_annotations_serialize_as_null() -> Result<()> {
    let candles = random_walk(7, 10);
    let value = detect_pullbacks(&candles, DEFAULT_THRESHOLD)?;
    let json = serde_json::to_value(&value)?;

    let first = &json["annotations"][0];
    assert!(first["trend"].is_null());
    assert!(first["swing_high"].is_null());
    assert!(json["annotations"][1]["trend"].is_i64());
    assert!(json["range"]["structural_high"].is_f64());
    Ok(())
}
