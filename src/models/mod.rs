//! Data models for the rollover core.
//!
//! These models are plain values handed between the services and the host;
//! all of them derive Serialize so a host can inspect or persist them.

pub mod recap;
pub mod section;
pub mod settings;

// Re-exports for convenient access
pub use recap::{GitHubRecapStats, PrInfo};
pub use section::{BlockKind, BlockSpan, Position, Section, SectionType};
pub use settings::RolloverSettings;
