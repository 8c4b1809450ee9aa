//! Domain model for envelopes, queues, and delivery state.

mod envelope;
mod error;
mod ids;
mod message;
mod queue;
mod routing;
mod status;

pub use envelope::{Delivery, Envelope, headers};
pub use error::{BusDomainError, ParseMessageTypeError};
pub use ids::{CorrelationId, MessageId};
pub use message::{MessageState, MessageType, Priority, Recipient};
pub use queue::{DeadLetter, DeadLetterReason, QueueSpec};
pub use routing::{broadcast_key, topic_matches};
pub use status::{BusHealth, BusStatus};
