//! Action routing: the handler table, the per-message dispatcher and the
//! registration handshake gate.

pub mod dispatcher;
pub mod handshake;
pub mod table;

pub use dispatcher::Dispatcher;
pub use table::{Access, HandlerTable};
