//! Build pipeline
//!
//! A build runs through a fixed sequence of [`Stage`]s driven by the
//! [`Orchestrator`]. External commands are delegated to a
//! [`StepRunner`](crate::runner::StepRunner).

mod orchestrator;
mod stage;

pub use orchestrator::{BuildContext, BuildFailure, BuildReport, CachePlan, Orchestrator};
pub use stage::Stage;
