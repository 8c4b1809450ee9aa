//! Message bus services.

mod bus;
mod handler;
mod reply;

pub use bus::{BusError, BusResult, MessageBus, PublishRequest, SendRequest};
pub use handler::{FnHandler, HandlerError, HandlerResult, MessageHandler, handler_fn};
