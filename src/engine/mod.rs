//! # engine
//!
//! Data generation and background tasks.
//!
//! * [`simulator`] — synthetic prices, quotes and equity curves
//! * [`refresh`]   — periodic quote push to dashboard subscribers

pub mod refresh;
pub mod simulator;
