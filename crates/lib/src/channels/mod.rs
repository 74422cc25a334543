//! LINE Messaging API channel.
//!
//! Client for the reply/profile/leave endpoints, the webhook event model,
//! and the outbound message wire types. Inbound text events are queued to
//! the gateway for dispatch.

mod inbound;
mod line;
mod messages;

pub use inbound::{Event, MessageContent, MessageEvent, Source, WebhookEnvelope};
pub use line::{LineClient, LineError, MessagingClient, Profile};
pub use messages::{
    Action, CarouselColumn, ImagemapAction, ImagemapArea, ImagemapBaseSize, Message, Template,
};
