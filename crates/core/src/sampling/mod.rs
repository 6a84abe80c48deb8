pub mod domain;
pub mod infrastructure;
pub mod sampling_logger;
