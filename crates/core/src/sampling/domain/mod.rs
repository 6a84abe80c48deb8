pub mod dashboard_snapshot;
pub mod sampling_loop;
pub mod sampling_state;
