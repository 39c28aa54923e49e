//! Docker Swarm one-shot service runner.
//!
//! Accepts jobs — a container image plus a list of named tasks — over HTTP,
//! runs every task as a one-shot swarm service, collects each task's exit
//! status and output through a result callback, and POSTs the aggregated
//! job record to the submitter's callback URL once everything has reported.
//!
//! The moving parts:
//!
//! - [`scheduler::Scheduler`] — bounded task queue, running set, and the
//!   two background sweeps (dead tasks, completed jobs).
//! - [`store::JobStore`] — durable job/task state, one Redis hash per job.
//! - [`swarm::SwarmClient`] — creates and removes the one-shot services.
//! - [`auth::AuthBroker`] — lazy registry logins for private images.
//! - [`runner::JobRunner`] — glues the API to the scheduler and backend.
//! - [`callback::CallbackPoster`] — fire-and-forget result delivery.

pub mod api;
pub mod auth;
pub mod callback;
pub mod config;
pub mod error;
pub mod models;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod swarm;

pub use config::Config;
pub use runner::JobRunner;
pub use scheduler::Scheduler;
