//! Boundary to the external compute collaborator.
//!
//! The collaborator runs tax-benefit calculations out of process and reports
//! completion back through the job store. This crate only knows how to hand
//! it work:
//!
//! - [`ComputeBackend`]: the seam the dispatcher invokes.
//! - [`api::ComputeApi`]: HTTP client for the serverless compute surface.

pub mod api;
pub mod backend;

pub use backend::{function_name, ComputeBackend, ComputeError, ComputeRequest};
