//! # Sync Engine
//!
//! Multi-rate resampling of sparse chunks onto a uniform nanosecond grid.
//!
//! Responsibilities:
//! - Drift-free tick grid carried across chunks (`GridScheduler`)
//! - Hold / AsOf / Drop policies mapping sparse samples onto ticks
//! - Per-column last-known values so continuity survives chunk boundaries
//!
//! ## Usage Example
//!
//! ```ignore
//! use contracts::{SyncConfig, SyncPolicyConfig};
//! use sync_engine::SyncTransformer;
//!
//! let config = SyncConfig::new(30.0)
//!     .with_policy(SyncPolicyConfig::AsOf { tolerance_ns: 50_000_000 });
//! let mut sync = SyncTransformer::new(config)?;
//!
//! for chunk in chunks {
//!     let dense = sync.fit_transform(&chunk?)?;
//!     // one row per tick
//! }
//! ```

mod grid;
mod policy;
mod transformer;

// Re-exports
pub use grid::{next_grid, step_from_fps, GridScheduler};
pub use policy::SyncPolicy;
pub use transformer::SyncTransformer;

pub use contracts::{SyncConfig, SyncPolicyConfig};
