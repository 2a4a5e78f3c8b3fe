//! Generation client interface for the external text-completion service.
//!
//! ```text
//! WorkflowController
//!     |
//!     v
//! Arc<dyn Generator>
//!     |   complete(&request) --> String
//!     |   stream(request)    --> Stream<Result<String>>
//!     v
//! AnthropicClient --HTTPS/SSE--> Messages API
//! ```

pub mod anthropic;
pub mod trait_def;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use trait_def::{ChunkStream, GenerationError, GenerationRequest, Generator};
