pub mod adaptive_skip;
pub mod admission_gate;
pub mod detection_pipeline;
pub mod detection_state;
pub mod mouth_monitor;
pub mod pipeline_logger;
pub mod sampling_controller;
pub mod state_store;
