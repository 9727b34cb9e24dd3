pub mod error;
pub mod runner;
pub mod schedule;
pub mod select;

pub use {
    error::{Error, Result},
    runner::JobRunner,
    schedule::next_run_at,
    select::{Selected, display_title, select_images},
};
