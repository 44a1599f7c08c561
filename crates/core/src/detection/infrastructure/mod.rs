mod math;
pub mod onnx_blazeface_detector;
