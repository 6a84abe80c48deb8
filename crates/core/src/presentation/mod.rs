pub mod dashboard;
pub mod export;
