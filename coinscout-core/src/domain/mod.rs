//! Domain types for CoinScout

pub mod bar;
pub mod market;
pub mod signal;
pub mod timeframe;

pub use bar::Bar;
pub use market::{is_stablecoin, Market, MarketCap, MarketType, STABLECOINS};
pub use signal::{AnalysisResult, SignalClass};
pub use timeframe::Timeframe;

/// Symbol type alias
pub type Symbol = String;
