pub mod snapshot_capturer;
pub mod snapshot_worker;
