pub mod render;
pub mod state;

pub use render::render_gallery;
pub use state::{Session, SessionHandle, SessionPhase, SessionSettings, SubmitRequest};
