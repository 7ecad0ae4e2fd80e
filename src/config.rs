//! Marketplace configuration
use std::path::PathBuf;

use crate::content::EditMode;
use crate::error::{MarketResult, StorageResultExt};

#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Directory of the sled database
    pub path: PathBuf,

    /// Discard the database when it is dropped
    pub temporary: bool,

    /// Page cache size in bytes
    pub cache_capacity: u64,

    /// Background flush interval, `None` flushes only on demand
    pub flush_every_ms: Option<u64>,

    /// How empty strings in edit requests are read
    pub edit_mode: EditMode,

    /// Default page size for tender listings
    pub tender_page_limit: usize,

    /// Default page size for bid listings
    pub bid_page_limit: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tender-market.db"),
            temporary: false,
            cache_capacity: 64 * 1024 * 1024,
            flush_every_ms: Some(500),
            edit_mode: EditMode::default(),
            tender_page_limit: 5,
            bid_page_limit: 10,
        }
    }
}

impl MarketConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// A throwaway database, for tests and demos
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            flush_every_ms: None,
            ..Self::default()
        }
    }

    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    pub fn flush_every_ms(mut self, every: Option<u64>) -> Self {
        self.flush_every_ms = every;
        self
    }

    pub fn edit_mode(mut self, mode: EditMode) -> Self {
        self.edit_mode = mode;
        self
    }

    pub fn tender_page_limit(mut self, limit: usize) -> Self {
        self.tender_page_limit = limit;
        self
    }

    pub fn bid_page_limit(mut self, limit: usize) -> Self {
        self.bid_page_limit = limit;
        self
    }

    pub fn open_db(&self) -> MarketResult<sled::Db> {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .flush_every_ms(self.flush_every_ms);
        config = if self.temporary {
            config.temporary(true)
        } else {
            config.path(&self.path)
        };
        let db = config.open().storage("open database")?;
        tracing::info!(path = %self.path.display(), temporary = self.temporary, "opened database");
        Ok(db)
    }
}
