pub mod builder;
pub mod messages;
pub mod preview;

pub use builder::{apply_suggestion, build_messages, check_inputs, validate_inputs};
pub use messages::{ChatMessage, ContentPart};
pub use preview::{format_preview, render_preview_html, style_preview};
