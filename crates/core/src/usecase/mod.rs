pub mod interviewer;
pub mod name_resolver;
pub mod retry;

pub use interviewer::{refresh_dashboard, InterviewOutcome, Interviewer};
pub use name_resolver::{NameResolution, NameResolver, NameSource};
pub use retry::{AcceptReason, RetryController, RetryPolicy, ScoredAnswer};
