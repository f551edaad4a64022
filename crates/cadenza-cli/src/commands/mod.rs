pub mod config;
pub mod run;

pub use config::{init_config, show_config};
pub use run::run_batch;
