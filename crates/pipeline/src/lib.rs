//! Job orchestration: dispatching compute, resolving status and sequencing
//! composite jobs over the job store.

pub mod dispatcher;
pub mod inline;
pub mod lifecycle;
pub mod resolver;
pub mod router;
pub mod sequencer;
pub mod service;

pub use dispatcher::ComputeDispatcher;
pub use lifecycle::JobLifecycle;
pub use resolver::StatusResolver;
pub use sequencer::DependencySequencer;
pub use service::JobService;
