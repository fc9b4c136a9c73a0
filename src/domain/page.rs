//! Offset pagination for list queries.

use serde::{Deserialize, Serialize};

/// One-based page request. Zero values fall back to the configured defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// Fill in defaults and clamp the size to `max_size`.
    pub fn normalized(self, default_size: u32, max_size: u32) -> Self {
        let page = self.page.max(1);
        let size = match self.size {
            0 => default_size,
            n => n.min(max_size),
        };
        Self { page, size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
}
