//! HTTP front for a mailflow email worker.
//!
//! - `GET  /health`: liveness plus worker activity
//! - `GET  /metrics`: worker metrics snapshot
//! - `POST /api/emails`: enqueue an email-send request

pub mod routes;
pub mod state;
