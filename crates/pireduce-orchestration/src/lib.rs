//! # pireduce-orchestration
//!
//! Backend selection, the run driver, and repeated-run statistics.

pub mod backend_selection;
pub mod driver;
pub mod interfaces;
pub mod statistics;

pub use backend_selection::{select_backend, BackendSelection, SelectionContext};
pub use driver::Driver;
pub use interfaces::{ResultPresenter, RunReport};
pub use statistics::{RunStatistics, SeriesSummary};
