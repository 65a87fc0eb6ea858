pub mod market_statistics;

pub use market_statistics::MarketStatistics;
