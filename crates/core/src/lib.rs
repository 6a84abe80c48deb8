pub mod emotion;
pub mod presentation;
pub mod sampling;
pub mod shared;
pub mod video;
