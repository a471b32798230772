//! Delivery of live quote updates to stream consumers.

pub mod stream;

pub use stream::{deliver_quotes, DeliveryEnd, StreamEvent};
