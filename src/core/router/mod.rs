//! Request Router (component E) and its Dead-Letter Queue (component F).

mod dlq;
mod request_router;
mod types;

pub use dlq::{DeadLetterQueue, DlqEntry};
pub use request_router::{PluginCodeTable, RequestRouter};
pub use types::{Request, RequestType, ResponseEnvelope, RouteStatus, RoutingDecision, RouterStats};
