// Résumé scoring: prompt → rater → score parser → threshold → placement.
// `QualificationCoordinator` is the entry point; the rater and placement are injected seams.

pub mod coordinator;
pub mod placement;
pub mod prompts;
pub mod rating;
pub mod score_parser;

pub use coordinator::{JobContext, QualificationCoordinator, QualificationReport, Threshold};
