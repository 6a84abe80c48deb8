pub mod snapshot_feed;
pub mod threaded_sampler;
