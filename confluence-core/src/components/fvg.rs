//! Fair-value-gap detector.
//!
//! A gap forms over three bars (i-2, i-1, i) when the wicks of the outer
//! bars fail to overlap: bullish when `low[i] > high[i-2]`, bearish when
//! `high[i] < low[i-2]`. Each gap is then tracked forward from bar i+1;
//! its fill percentage only ever grows and `filled` never reverts.

use serde::Serialize;

use crate::config::GapConfig;
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GapKind {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FairValueGap {
    pub kind: GapKind,
    pub top: f64,
    pub bottom: f64,
    /// (top - bottom) / bottom * 100.
    pub gap_pct: f64,
    /// Index of the middle bar of the pattern.
    pub formed_at_index: usize,
    filled: bool,
    fill_pct: f64,
}

impl FairValueGap {
    fn new(kind: GapKind, top: f64, bottom: f64, formed_at_index: usize) -> Self {
        Self {
            kind,
            top,
            bottom,
            gap_pct: (top - bottom) / bottom * 100.0,
            formed_at_index,
            filled: false,
            fill_pct: 0.0,
        }
    }

    pub fn filled(&self) -> bool {
        self.filled
    }

    /// 0-100.
    pub fn fill_pct(&self) -> f64 {
        self.fill_pct
    }

    pub fn range(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn center(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    pub fn contains(&self, price: f64) -> bool {
        self.bottom <= price && price <= self.top
    }

    /// Fold a later bar into the fill state.
    fn absorb(&mut self, bar: &Bar) {
        if self.filled {
            return;
        }
        let range = self.range();
        // how far into the band price reached from the side it left
        let depth = match self.kind {
            GapKind::Bullish => self.top - bar.low,
            GapKind::Bearish => bar.high - self.bottom,
        };
        if depth <= 0.0 {
            return;
        }
        if depth >= range {
            self.filled = true;
            self.fill_pct = 100.0;
        } else {
            self.fill_pct = self.fill_pct.max(depth / range * 100.0);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GapBias {
    BullishSupport,
    BearishResistance,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GapSignal {
    /// 0-100.
    pub strength: f64,
    pub primary: GapBias,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapReport {
    /// Every recorded gap, in formation order.
    pub gaps: Vec<FairValueGap>,
    pub bullish_count: usize,
    pub bearish_count: usize,
    /// Unfilled bullish gaps entirely below price.
    pub above_bullish: usize,
    /// Unfilled bearish gaps entirely above price.
    pub below_bearish: usize,
    /// Most recently formed unfilled gap whose band contains price.
    pub inside: Option<FairValueGap>,
    pub nearest_support: Option<FairValueGap>,
    pub nearest_resistance: Option<FairValueGap>,
    /// Unfilled gap whose center is closest to price.
    pub nearest: Option<FairValueGap>,
    /// Latest gaps, newest first.
    pub recent: Vec<FairValueGap>,
    pub signal: GapSignal,
}

impl GapReport {
    pub fn unfilled(&self) -> impl Iterator<Item = &FairValueGap> {
        self.gaps.iter().filter(|g| !g.filled)
    }
}

/// Scan `bars` once, recording gaps and advancing every open gap's fill
/// state bar by bar.
pub fn detect_gaps(bars: &[Bar], config: &GapConfig) -> GapReport {
    let mut gaps: Vec<FairValueGap> = Vec::new();

    for i in 2..bars.len() {
        for gap in gaps.iter_mut() {
            gap.absorb(&bars[i]);
        }

        let (first, third) = (&bars[i - 2], &bars[i]);
        let candidate = if third.low > first.high {
            Some(FairValueGap::new(GapKind::Bullish, third.low, first.high, i - 1))
        } else if third.high < first.low {
            Some(FairValueGap::new(GapKind::Bearish, first.low, third.high, i - 1))
        } else {
            None
        };
        if let Some(gap) = candidate {
            if gap.bottom > 0.0 && gap.gap_pct >= config.min_gap_pct {
                gaps.push(gap);
            }
        }
    }

    let price = bars.last().map(|b| b.close);
    report(gaps, price, bars.len(), config)
}

fn report(gaps: Vec<FairValueGap>, price: Option<f64>, bar_count: usize, config: &GapConfig) -> GapReport {
    let bullish_count = gaps.iter().filter(|g| g.kind == GapKind::Bullish).count();
    let bearish_count = gaps.len() - bullish_count;
    let recent: Vec<FairValueGap> = gaps.iter().rev().take(config.recent_count).copied().collect();

    let mut above_bullish = 0;
    let mut below_bearish = 0;
    let mut inside = None;
    let mut nearest_support: Option<FairValueGap> = None;
    let mut nearest_resistance: Option<FairValueGap> = None;
    let mut nearest: Option<(f64, FairValueGap)> = None;

    if let Some(price) = price {
        for gap in gaps.iter().filter(|g| !g.filled) {
            match gap.kind {
                GapKind::Bullish if gap.top < price => {
                    above_bullish += 1;
                    if nearest_support.map_or(true, |s| gap.top > s.top) {
                        nearest_support = Some(*gap);
                    }
                }
                GapKind::Bearish if gap.bottom > price => {
                    below_bearish += 1;
                    if nearest_resistance.map_or(true, |r| gap.bottom < r.bottom) {
                        nearest_resistance = Some(*gap);
                    }
                }
                _ => {}
            }
            if gap.contains(price) {
                inside = Some(*gap);
            }
            let distance = (price - gap.center()).abs();
            if nearest.map_or(true, |(d, _)| distance < d) {
                nearest = Some((distance, *gap));
            }
        }
    }

    let mut strength = 0.0;
    let primary = match inside.map(|g| g.kind) {
        Some(GapKind::Bullish) => {
            strength += 70.0;
            GapBias::BullishSupport
        }
        Some(GapKind::Bearish) => {
            strength += 70.0;
            GapBias::BearishResistance
        }
        None => GapBias::Neutral,
    };
    // a gap whose pattern completed within the last `recent_count` bars
    let fresh = gaps
        .last()
        .is_some_and(|g| g.formed_at_index + 1 + config.recent_count >= bar_count);
    if fresh {
        strength += 20.0;
    }

    GapReport {
        bullish_count,
        bearish_count,
        above_bullish,
        below_bearish,
        inside,
        nearest_support,
        nearest_resistance,
        nearest: nearest.map(|(_, g)| g),
        recent,
        signal: GapSignal {
            strength: f64::min(strength, 100.0),
            primary,
        },
        gaps,
    }
}
