pub mod quiz_task;
pub mod render;
pub mod study_task;
pub mod viewer;

#[cfg(test)]
pub(crate) mod testing;

pub use viewer::{CompletedRequest, Outcome, PanelKind, PendingRequest, Viewer, ViewerOptions};
