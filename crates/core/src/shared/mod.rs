pub mod constants;
pub mod detection;
pub mod frame;
pub mod labels;
pub mod model_resolver;
pub mod onnx_session;
