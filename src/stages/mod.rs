//! Cleaning stages.
//!
//! Each stage is a pure function over the batch: it takes the prior table
//! (plus the reference where needed) and returns a new table with a
//! [`StageReport`](crate::report::StageReport). Order matters; the pipeline
//! in [`crate::pipeline`] runs them in the documented sequence.

pub mod coordinates;
pub mod derive;
pub mod filters;
pub mod recode;

pub use coordinates::resolve_coordinates;
pub use derive::{add_derived_fields, repair_dst_fallback};
pub use filters::{
    drop_missing_end_coords, drop_unlisted_stations, enforce_duration_bounds, enforce_window,
};
pub use recode::recode_categories;
