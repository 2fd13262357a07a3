pub mod execution_provider;
pub mod onnx_face_landmarker;
pub mod onnx_hand_pose_detector;
pub mod yolo;
