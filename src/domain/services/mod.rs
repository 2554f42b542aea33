pub mod aggregator;
pub mod paginator;
