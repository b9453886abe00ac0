//! Model backends

mod python_bridge;

pub use python_bridge::{decode_samples, BridgeRequest, BridgeResponse, PythonBridge};
