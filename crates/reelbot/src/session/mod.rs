//! Chat-agnostic request handling: one session per accepted link.

pub mod messages;
pub mod orchestrator;
pub mod policy;
pub mod sink;
pub mod status;

pub use orchestrator::{handle_text, Admission, Request, SessionContext, SessionState};
pub use policy::{ChatGate, GateTicket};
pub use sink::{ChatActivity, ChatSink, MediaKind, SinkError};
pub use status::DownloadStatus;
