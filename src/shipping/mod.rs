//! Shipping pipeline: naming, provisioning, batching and the background pump

pub mod provision;
pub mod pump;
pub mod shipper;
pub mod stream_namer;

pub use provision::{GroupEnsurer, StreamEnsurer};
pub use pump::{BackgroundPump, PumpState};
pub use shipper::{BatchBound, Shipper};
pub use stream_namer::{stream_name_for, StreamNamer};
