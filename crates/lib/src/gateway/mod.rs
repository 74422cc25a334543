//! Gateway: HTTP entry point for the messaging platform's webhook.
//!
//! One port serves the health endpoint and the webhook route. Events are
//! signature-checked, decoded, and queued to a processor task that runs the
//! command dispatcher.

mod server;

pub use server::run_gateway;
