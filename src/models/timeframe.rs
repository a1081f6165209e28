use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::gateway::GatewayError;

/// Width of a single bar, as accepted by the exchange's candle endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resolution {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    EightHours,
    TwelveHours,
    OneDay,
}

impl Resolution {
    pub const ALL: [Resolution; 11] = [
        Resolution::OneMinute,
        Resolution::FiveMinutes,
        Resolution::FifteenMinutes,
        Resolution::ThirtyMinutes,
        Resolution::OneHour,
        Resolution::TwoHours,
        Resolution::FourHours,
        Resolution::SixHours,
        Resolution::EightHours,
        Resolution::TwelveHours,
        Resolution::OneDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneMinute => "1m",
            Resolution::FiveMinutes => "5m",
            Resolution::FifteenMinutes => "15m",
            Resolution::ThirtyMinutes => "30m",
            Resolution::OneHour => "1h",
            Resolution::TwoHours => "2h",
            Resolution::FourHours => "4h",
            Resolution::SixHours => "6h",
            Resolution::EightHours => "8h",
            Resolution::TwelveHours => "12h",
            Resolution::OneDay => "1d",
        }
    }

    pub fn seconds(&self) -> u64 {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;
        match self {
            Resolution::OneMinute => MINUTE,
            Resolution::FiveMinutes => 5 * MINUTE,
            Resolution::FifteenMinutes => 15 * MINUTE,
            Resolution::ThirtyMinutes => 30 * MINUTE,
            Resolution::OneHour => HOUR,
            Resolution::TwoHours => 2 * HOUR,
            Resolution::FourHours => 4 * HOUR,
            Resolution::SixHours => 6 * HOUR,
            Resolution::EightHours => 8 * HOUR,
            Resolution::TwelveHours => 12 * HOUR,
            Resolution::OneDay => 24 * HOUR,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                GatewayError::InvalidParameter(format!(
                    "time resolution should be one of {}, got '{}'",
                    Resolution::ALL.map(|r| r.as_str()).join(", "),
                    s
                ))
            })
    }
}

impl TryFrom<String> for Resolution {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.as_str().to_string()
    }
}

/// Total historical lookback requested from the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Span {
    OneHour,
    TwoHours,
    FourHours,
    EightHours,
    TwelveHours,
    OneDay,
    OneWeek,
    TwoWeeks,
    OneMonth,
    TwoMonths,
    FourMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
}

impl Span {
    pub const ALL: [Span; 15] = [
        Span::OneHour,
        Span::TwoHours,
        Span::FourHours,
        Span::EightHours,
        Span::TwelveHours,
        Span::OneDay,
        Span::OneWeek,
        Span::TwoWeeks,
        Span::OneMonth,
        Span::TwoMonths,
        Span::FourMonths,
        Span::SixMonths,
        Span::OneYear,
        Span::TwoYears,
        Span::FiveYears,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Span::OneHour => "1h",
            Span::TwoHours => "2h",
            Span::FourHours => "4h",
            Span::EightHours => "8h",
            Span::TwelveHours => "12h",
            Span::OneDay => "1d",
            Span::OneWeek => "1w",
            Span::TwoWeeks => "2w",
            Span::OneMonth => "1m",
            Span::TwoMonths => "2m",
            Span::FourMonths => "4m",
            Span::SixMonths => "6m",
            Span::OneYear => "1y",
            Span::TwoYears => "2y",
            Span::FiveYears => "5y",
        }
    }

    /// Months are fixed day counts (1m = 30 days, 2m = 61 days, ...)
    pub fn seconds(&self) -> u64 {
        const HOUR: u64 = 60 * 60;
        const DAY: u64 = 24 * HOUR;
        match self {
            Span::OneHour => HOUR,
            Span::TwoHours => 2 * HOUR,
            Span::FourHours => 4 * HOUR,
            Span::EightHours => 8 * HOUR,
            Span::TwelveHours => 12 * HOUR,
            Span::OneDay => DAY,
            Span::OneWeek => 7 * DAY,
            Span::TwoWeeks => 14 * DAY,
            Span::OneMonth => 30 * DAY,
            Span::TwoMonths => 61 * DAY,
            Span::FourMonths => 122 * DAY,
            Span::SixMonths => 183 * DAY,
            Span::OneYear => 365 * DAY,
            Span::TwoYears => 2 * 365 * DAY,
            Span::FiveYears => 5 * 365 * DAY,
        }
    }

    /// Number of bars needed to cover this span at the given resolution
    ///
    /// # Example
    /// ```
    /// use coinbot::models::{Resolution, Span};
    ///
    /// // 30 days of 8 hour bars
    /// assert_eq!(Span::OneMonth.bars_at(Resolution::EightHours), 90);
    /// ```
    pub fn bars_at(&self, resolution: Resolution) -> usize {
        self.seconds().div_ceil(resolution.seconds()) as usize
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Span {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Span::ALL
            .into_iter()
            .find(|span| span.as_str() == s)
            .ok_or_else(|| {
                GatewayError::InvalidParameter(format!(
                    "time span should be one of {}, got '{}'",
                    Span::ALL.map(|span| span.as_str()).join(", "),
                    s
                ))
            })
    }
}

impl TryFrom<String> for Span {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Span> for String {
    fn from(value: Span) -> Self {
        value.as_str().to_string()
    }
}
