pub mod face_observation;
pub mod hand_observation;
pub mod landmark_detector;
pub mod proximity;
