// Trading loop and position sizing
pub mod selection;
pub mod trader;

pub use selection::{
    plan_opening, select_best_symbols, FundingRules, OpeningPlan, PromisingSymbol,
};
pub use trader::{cooldown, IterationReport, TradingBot, TradingSettings};
