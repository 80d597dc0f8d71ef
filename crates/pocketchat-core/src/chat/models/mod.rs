pub mod message;
pub mod session;

pub use message::{Attachment, Message, Role, ATTACHMENT_MIME};
pub use session::ChatSession;
