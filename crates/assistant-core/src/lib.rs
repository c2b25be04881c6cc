pub mod attachment;
pub mod backend;
pub mod config;
pub mod error;
pub mod gate;
pub mod render;
pub mod session;
pub mod state;
pub mod transcript;

// Re-export main types for convenience
pub use attachment::{AttachmentTicket, FileSelection};
pub use backend::{BackendClient, ChatRequest, ChatService, HealthStatus};
pub use config::Config;
pub use error::{AttachmentError, ChatError, TransportError};
pub use render::RenderSignal;
pub use session::Session;
pub use state::{Composition, DispatchState, EncodedImage, Message, Role};
pub use transcript::Transcript;
