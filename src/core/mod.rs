//! Core business logic abstractions

pub mod aggregator;
pub mod cache;
pub mod clock;
pub mod config;
pub mod converter;
pub mod currency;
pub mod error;
pub mod format;
pub mod log;
pub mod price;

// Re-export main types for cleaner imports
pub use currency::{Currency, CurrencyRateProvider, ExchangeRate};
pub use error::BotError;
pub use price::{PricePoint, PriceProvider, PriceSeries, Quote, Source, VenueReading};
