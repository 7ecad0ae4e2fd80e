//! Tender and bid marketplace core.
//!
//! Organizations publish tenders and submit bids; every change to either is
//! kept as a numbered version, and rolling back produces a new version rather
//! than rewinding the counter.

pub mod bid;
pub mod config;
pub mod content;
pub mod directory;
pub mod error;
pub mod guard;
pub mod projection;
pub mod record;
pub mod repository;
pub mod review;
pub mod service;
pub mod status;
pub mod tender;
pub mod utils;

pub use config::MarketConfig;
pub use error::{ErrorCode, MarketError, MarketResult};
pub use service::{Marketplace, Page};
