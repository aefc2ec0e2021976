//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::PageRequest;

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u32,
    /// Total number of pages.
    pub total_pages: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl PaginationParams {
    /// Clamps `per_page` to the allowed maximum of 100.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }

    /// The rows this page covers.
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        let Self { page, per_page } = self.clamped();
        PageRequest {
            offset: u64::from(page.saturating_sub(1)) * u64::from(per_page),
            limit: u64::from(per_page),
        }
    }

    /// Describes this page of a listing with `total` items.
    #[must_use]
    pub fn meta(&self, total: u64) -> PaginationMeta {
        let Self { page, per_page } = self.clamped();
        let total = u32::try_from(total).unwrap_or(u32::MAX);
        PaginationMeta {
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_counts_pages() {
        let params = PaginationParams {
            page: 2,
            per_page: 2,
        };
        let meta = params.meta(5);
        assert_eq!((meta.page, meta.total, meta.total_pages), (2, 5, 3));
        assert_eq!(params.meta(0).total_pages, 0);
    }

    #[test]
    fn page_request_skips_earlier_pages() {
        let params = PaginationParams {
            page: 3,
            per_page: 4,
        };
        assert_eq!(
            params.page_request(),
            PageRequest {
                offset: 8,
                limit: 4
            }
        );
        assert_eq!(params.meta(9).total_pages, 3);
    }

    #[test]
    fn zero_values_are_clamped() {
        let params = PaginationParams {
            page: 0,
            per_page: 0,
        }
        .clamped();
        assert_eq!((params.page, params.per_page), (1, 1));
    }
}
