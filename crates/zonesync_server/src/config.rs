//! Store configuration.

/// Configuration for the in-memory store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum database-level change entries per page.
    pub database_page_size: usize,
    /// Maximum record-level change entries per zone page.
    pub zone_page_size: usize,
    /// Maximum records per modify request (saves plus deletes).
    pub max_batch_size: usize,
}

impl StoreConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            database_page_size: 100,
            zone_page_size: 200,
            max_batch_size: 400,
        }
    }

    /// Sets the database page size.
    pub fn with_database_page_size(mut self, size: usize) -> Self {
        self.database_page_size = size.max(1);
        self
    }

    /// Sets the zone page size.
    pub fn with_zone_page_size(mut self, size: usize) -> Self {
        self.zone_page_size = size.max(1);
        self
    }

    /// Sets the maximum batch size.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
