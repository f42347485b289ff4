//! Email notification worker.
//!
//! A single [`EmailWorker`](worker::EmailWorker) owns a bounded request queue
//! and two cooperative loops sharing one stop signal:
//!
//! - the dispatcher, which drains the queue one request at a time, hands each
//!   request to the delivery subsystem, classifies failures and routes
//!   permanent ones to the dead-letter sink, and reports queue utilization
//!   whenever it has been idle for a while;
//! - the retry scanner, which periodically asks the status store for failed
//!   messages and re-submits those that are due and not yet exhausted.
//!
//! The delivery subsystem, status store and dead-letter sink are traits in
//! [`service`]; [`http_delivery`], [`store`] and [`dead_letter`] provide the
//! production adapters.

pub mod classifier;
pub mod config;
pub mod dead_letter;
pub mod dispatcher;
pub mod error;
pub mod http_delivery;
pub mod maintenance;
pub mod queue;
pub mod retry;
pub mod service;
pub mod store;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{DeliveryError, WorkerError};
pub use service::{DeadLetterSink, DeliveryService, DeliveryStore};
pub use worker::EmailWorker;
