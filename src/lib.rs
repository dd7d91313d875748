pub mod batch_processor;
pub mod checkpoint_manager;
pub mod codec;
pub mod config;
pub mod driver;
pub mod duplicates;
pub mod error;
pub mod fingerprint;
pub mod fingerprint_store;
pub mod interrupt;
pub mod logging;
pub mod pairs;
pub mod progress;
pub mod worker_pool;

pub use error::*;
