//! Ride pricing, the ride state machine, and the operations that drive rides through it.

pub mod fare;
pub mod lifecycle;
pub mod service;
