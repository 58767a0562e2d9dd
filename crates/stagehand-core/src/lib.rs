//! stagehand-core: shared protocol library for the live-show controller.
//!
//! Provides JSON message types, the text codec, the error type, template
//! helpers and the presentation state machine. No I/O lives here.

pub mod codec;
pub mod error;
pub mod messages;
pub mod presentation;
pub mod template;

// Re-export commonly used items at crate root.
pub use codec::{decode_inbound, encode, parse_request};
pub use error::{ResultExt, StageError, StageResult};
pub use messages::{ClientRole, Envelope, Inbound, PresentationSnapshot, ServerMessage};
pub use presentation::{PresentationState, RoastItem, RoastStep, ScriptEvent};
