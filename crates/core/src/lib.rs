//! Domain model for the microsimulation job orchestrator.
//!
//! Everything in this crate is pure: job identities, statuses, the
//! forward-only state machine, request inputs and the household impact diff.
//! Persistence lives in `microsim-db`, orchestration in `microsim-pipeline`.

pub mod error;
pub mod identity;
pub mod impact;
pub mod job;
pub mod job_events;
pub mod types;
