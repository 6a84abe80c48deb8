pub mod onnx_expression_model;
pub mod placeholder_model;
