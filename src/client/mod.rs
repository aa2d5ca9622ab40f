//! Time-series client seam.
//!
//! The writer only knows [`TimeSeriesClient`]. [`HttpClient`] talks to the
//! InfluxDB v2 write API; [`InMemoryClient`] keeps points in memory.

pub mod http;
pub mod memory;
pub mod point;

use async_trait::async_trait;

use crate::config::WritePrecision;
use crate::error::Result;

pub use http::HttpClient;
pub use memory::InMemoryClient;
pub use point::Point;

/// Transport for points (object-safe).
#[async_trait]
pub trait TimeSeriesClient: Send + Sync {
    /// Deliver `points`, whose timestamps are expressed in `precision`.
    async fn write(&self, points: &[Point], precision: WritePrecision) -> Result<()>;
}
