//! Best-effort fan-out and the timed sequence sender built on it.

pub mod fanout;
pub mod sequence;

pub use fanout::{Broadcaster, FanoutReport, Target};
pub use sequence::{SequenceSender, SequenceSlots, StreamKey};
