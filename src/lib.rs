//! Daily Note Rollover - carries unfinished work into today's note.
//!
//! The library moves unchecked tasks from the most recent daily note into
//! today's note, adds GitHub pull-request items under configurable headings,
//! archives the previous note, and builds monthly or yearly contribution
//! recaps. Note storage and markdown indexing are supplied by the host
//! through the traits in [`services::notes`].

pub mod error;
pub mod models;
pub mod services;

pub use error::AppError;
pub use models::{GitHubRecapStats, RolloverSettings, Section};
pub use services::{rollover_unchecked_items, RolloverMode, RolloverOutcome};
