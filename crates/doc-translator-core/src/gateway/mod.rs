mod openai;
mod traits;

pub use openai::OpenAiGateway;
pub use traits::{GatewayInfo, Instruction, InstructionKind, TextTransform};

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::error::Result;

/// Create the default gateway from configuration
pub fn create_gateway(config: &GatewayConfig) -> Result<Arc<dyn TextTransform>> {
    Ok(Arc::new(OpenAiGateway::new(config)?))
}
