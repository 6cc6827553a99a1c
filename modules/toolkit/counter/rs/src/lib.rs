pub use bin_index::BinIndex;
pub use config::Config;
pub use counter::Counter;
pub use coverage::CoverageStore;
pub use edit_log::EditLog;
pub use error::CounterError;

mod bin_index;
mod config;
mod counter;
mod coverage;
mod edit_log;
mod error;
pub mod escape;
pub mod record;
mod render;
