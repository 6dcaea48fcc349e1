mod dashboard;
mod summary;
mod transcript;

pub use dashboard::{render_dashboard, write_dashboard};
pub use summary::{render_markdown, write_summary_files, SummaryPaths};
pub use transcript::TranscriptWriter;
