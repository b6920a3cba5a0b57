//! Tracking HTTP surface
//!
//! The endpoints recipients' mail clients hit directly: the click redirector
//! and the view pixel. Both have a hard failure contract: nothing that goes
//! wrong inside may surface as an error status, because there is no page to
//! show an error on. Clicks always end in a redirect, views always end in a
//! 200 with valid pixel bytes.

pub mod client_meta;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::create_track_router;
