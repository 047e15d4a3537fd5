//! Import pipeline: per-pass build context and the session orchestrator.

mod object;
mod session;

pub use object::{create_object, tag_object, BuildContext};
pub use session::*;
