use std::cmp::Ordering;

use crate::models::Signal;

/// Scan result for a symbol that passed every promising-symbol filter
#[derive(Debug, Clone, PartialEq)]
pub struct PromisingSymbol {
    pub symbol: String,
    /// 24h price change in percent
    pub growth_24h_pct: f64,
    /// 24h volume in the quote currency
    pub volume_24h: f64,
    pub signal: Signal,
    /// Latest MACD histogram value, when the strategy reports one
    pub strength: Option<f64>,
}

impl PromisingSymbol {
    /// Order of magnitude of the 24h volume, `floor(log10(volume))`
    pub fn volume_magnitude(&self) -> i32 {
        if self.volume_24h > 0.0 {
            self.volume_24h.log10().floor() as i32
        } else {
            i32::MIN
        }
    }

    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.volume_magnitude()
            .cmp(&other.volume_magnitude())
            .then_with(|| self.growth_24h_pct.total_cmp(&other.growth_24h_pct))
    }
}

/// Best `count` candidates by (volume magnitude, growth), both descending
///
/// Magnitude dominates; growth only breaks ties within the same magnitude.
pub fn select_best_symbols(
    mut candidates: Vec<PromisingSymbol>,
    count: usize,
) -> Vec<PromisingSymbol> {
    candidates.sort_by(|a, b| b.rank_cmp(a));
    candidates.truncate(count);
    candidates
}

/// Sizing parameters for opening new positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingRules {
    pub target_positions: usize,
    /// Smallest order the exchange accepts, in quote currency
    pub min_stake: f64,
    /// Share of free funds kept aside for price movement while orders fill
    pub reserve_fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpeningPlan {
    /// Already holding the target number of positions or more
    AtTarget { open: usize },
    /// Not enough tradeable funds to give every slot the minimum stake
    InsufficientFunds { tradeable: f64, required: f64 },
    Open {
        slots: usize,
        tradeable: f64,
        /// Per-symbol stake, floored to whole quote units
        stake: f64,
    },
}

/// Decide whether and how much to invest this cycle
///
/// The stake is fixed from the slot count; selecting fewer symbols than slots
/// leaves the remainder uninvested.
pub fn plan_opening(open: usize, available_funds: f64, rules: &FundingRules) -> OpeningPlan {
    if open >= rules.target_positions {
        return OpeningPlan::AtTarget { open };
    }

    let slots = rules.target_positions - open;
    let tradeable = available_funds * (1.0 - rules.reserve_fraction);
    let required = rules.min_stake * slots as f64;

    if tradeable < required {
        return OpeningPlan::InsufficientFunds {
            tradeable,
            required,
        };
    }

    OpeningPlan::Open {
        slots,
        tradeable,
        stake: (tradeable / slots as f64).floor(),
    }
}
