pub mod logging;
pub mod message;

pub use message::{Message, MessageError};
pub use tracing;
