use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::Resolution;

/// One OHLCV bar as reported by the exchange
///
/// Values are trusted as-is: `low <= close <= high` is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time in epoch milliseconds
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordering of the bars inside a [`CandleSeries`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarOrder {
    OldestFirst,
    NewestFirst,
}

impl BarOrder {
    pub fn reversed(self) -> Self {
        match self {
            BarOrder::OldestFirst => BarOrder::NewestFirst,
            BarOrder::NewestFirst => BarOrder::OldestFirst,
        }
    }
}

/// Tabular projection of a candle series
///
/// Rows are bars in chronological order regardless of the series' own ordering,
/// so the last row is always the most recent bar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandleFrame {
    pub timestamp: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl CandleFrame {
    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }
}

/// OHLCV history of one symbol at a fixed resolution
///
/// Column-oriented and immutable after construction. Every column always has
/// the same length as the timestamp column, including when the series is empty.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    symbol: String,
    resolution: Resolution,
    order: BarOrder,
    timestamps: Vec<i64>,
    opens: Vec<f64>,
    highs: Vec<f64>,
    lows: Vec<f64>,
    closes: Vec<f64>,
    volumes: Vec<f64>,
    frame: OnceLock<CandleFrame>,
}

impl CandleSeries {
    /// Build a series from bars already laid out in `order`
    pub fn new(
        symbol: impl Into<String>,
        resolution: Resolution,
        bars: Vec<Bar>,
        order: BarOrder,
    ) -> Self {
        let mut series = Self {
            symbol: symbol.into(),
            resolution,
            order,
            timestamps: Vec::with_capacity(bars.len()),
            opens: Vec::with_capacity(bars.len()),
            highs: Vec::with_capacity(bars.len()),
            lows: Vec::with_capacity(bars.len()),
            closes: Vec::with_capacity(bars.len()),
            volumes: Vec::with_capacity(bars.len()),
            frame: OnceLock::new(),
        };

        for bar in bars {
            series.timestamps.push(bar.open_time);
            series.opens.push(bar.open);
            series.highs.push(bar.high);
            series.lows.push(bar.low);
            series.closes.push(bar.close);
            series.volumes.push(bar.volume);
        }

        series
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn order(&self) -> BarOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn opens(&self) -> &[f64] {
        &self.opens
    }

    pub fn highs(&self) -> &[f64] {
        &self.highs
    }

    pub fn lows(&self) -> &[f64] {
        &self.lows
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    /// Bar at position `index` in the series' own ordering
    pub fn bar(&self, index: usize) -> Option<Bar> {
        Some(Bar {
            open_time: *self.timestamps.get(index)?,
            open: self.opens[index],
            high: self.highs[index],
            low: self.lows[index],
            close: self.closes[index],
            volume: self.volumes[index],
        })
    }

    /// Most recent bar, whatever the ordering
    pub fn latest(&self) -> Option<Bar> {
        match self.order {
            BarOrder::OldestFirst => self.bar(self.len().checked_sub(1)?),
            BarOrder::NewestFirst => self.bar(0),
        }
    }

    /// Human readable open time of every bar, in series order
    pub fn time_labels(&self) -> Vec<DateTime<Utc>> {
        self.timestamps
            .iter()
            .map(|&ms| DateTime::from_timestamp_millis(ms).unwrap_or_default())
            .collect()
    }

    /// Seconds covered from the earliest bar's open to the latest bar's close
    pub fn timespan(&self) -> f64 {
        let (Some(min), Some(max)) = (self.timestamps.iter().min(), self.timestamps.iter().max())
        else {
            return 0.0;
        };
        (max - min) as f64 / 1000.0 + self.resolution.seconds() as f64
    }

    pub fn timespan_in_seconds(&self) -> f64 {
        self.timespan().round()
    }

    pub fn timespan_in_minutes(&self) -> f64 {
        round2(self.timespan() / 60.0)
    }

    pub fn timespan_in_hours(&self) -> f64 {
        round2(self.timespan() / 3600.0)
    }

    pub fn timespan_in_days(&self) -> f64 {
        round2(self.timespan() / 86_400.0)
    }

    /// Copy of this series with every column laid out in `order`
    pub fn to_order(&self, order: BarOrder) -> CandleSeries {
        let mut series = Self {
            symbol: self.symbol.clone(),
            resolution: self.resolution,
            order,
            timestamps: self.timestamps.clone(),
            opens: self.opens.clone(),
            highs: self.highs.clone(),
            lows: self.lows.clone(),
            closes: self.closes.clone(),
            volumes: self.volumes.clone(),
            frame: self.frame.clone(),
        };

        if order != self.order {
            series.timestamps.reverse();
            series.opens.reverse();
            series.highs.reverse();
            series.lows.reverse();
            series.closes.reverse();
            series.volumes.reverse();
        }

        series
    }

    /// Chronological tabular projection, built on first use and cached
    pub fn frame(&self) -> &CandleFrame {
        self.frame.get_or_init(|| {
            let mut frame = CandleFrame {
                timestamp: self.timestamps.clone(),
                open: self.opens.clone(),
                high: self.highs.clone(),
                low: self.lows.clone(),
                close: self.closes.clone(),
                volume: self.volumes.clone(),
            };
            if self.order == BarOrder::NewestFirst {
                frame.timestamp.reverse();
                frame.open.reverse();
                frame.high.reverse();
                frame.low.reverse();
                frame.close.reverse();
                frame.volume.reverse();
            }
            frame
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
