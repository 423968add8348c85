//! # Forecast Property
//!
//! A Rust library for real-estate price forecasting.
//!
//! ## Features
//!
//! - Transaction data handling (size, bedrooms, city, property type, price)
//! - A one-hot + tree-ensemble regression pipeline
//! - A nearest-neighbor similarity estimator over the same features
//! - A 70/30 blend of the two estimates as the current price
//! - Per-city growth rates from a housing price index, with a national
//!   fallback and a fixed default
//! - Four-quarter compounded projections with growth/ROI metrics
//! - An atomic persisted model bundle with train-or-load recovery
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forecast_property::data::PropertyRecord;
//! use forecast_property::engine::ForecastEngine;
//!
//! # fn main() -> forecast_property::error::Result<()> {
//! let engine = ForecastEngine::new(
//!     "transactions.csv",
//!     "EC-20240829-IN-01.csv",
//!     "models",
//! );
//!
//! let record = PropertyRecord::new("Apartment", 1200.0, "Mumbai", 2)?;
//! let forecast = engine.forecast(record)?;
//!
//! println!("{}", serde_json::to_string(&forecast)?);
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod engine;
pub mod error;
pub mod features;
pub mod growth;
pub mod models;
pub mod store;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use crate::data::{DataLoader, PropertyRecord, TransactionData};
pub use crate::engine::{ForecastEngine, ForecastRequest, PropertyForecast};
pub use crate::error::ForecastError;
pub use crate::growth::{GrowthRateTable, RateSource};
pub use crate::store::{ModelBundle, ModelStore};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
