pub mod onnx_tone_model;
