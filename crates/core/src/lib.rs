pub mod detection;
pub mod monitor;
pub mod shared;
pub mod snapshot;
pub mod video;
