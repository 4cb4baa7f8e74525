pub mod context;
pub mod error;
pub mod result_store;
pub mod stage;
pub mod stage_result;
pub mod stages;
pub mod utils;
