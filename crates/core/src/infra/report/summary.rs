use std::path::{Path, PathBuf};

use crate::domain::error::AppError;
use crate::domain::interview::InterviewRecord;

/// 書き出した要約ファイル
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryPaths {
    pub markdown: PathBuf,
    pub json: PathBuf,
}

/// 要約 Markdown を組み立てる
pub fn render_markdown(record: &InterviewRecord, generated_at: &str) -> String {
    let info = &record.extracted_info;
    let mut md = format!("# Interview Summary - {generated_at}\n\n");
    md.push_str(&record.summary);
    md.push_str("\n\n## Extracted Information\n\n");
    md.push_str(&format!("- **Name**: {}\n", info.name));
    md.push_str(&format!("- **Interest Level**: {}\n", info.interest_level.as_str()));
    md.push_str(&format!("- **Readiness**: {}\n", info.readiness.as_str()));
    md.push_str(&format!("- **Background**: {}\n", info.background));

    let noted: Vec<&str> = record
        .faq_log
        .iter()
        .filter(|f| f.matched.is_none())
        .map(|f| f.question.as_str())
        .collect();
    if !noted.is_empty() {
        md.push_str("\n## Questions for the Team\n\n");
        for q in noted {
            md.push_str(&format!("- {q}\n"));
        }
    }
    md
}

/// `summary_<id>.md` と `summary_<id>.json` を書き出す
pub fn write_summary_files(
    dir: &Path,
    record: &InterviewRecord,
    generated_at: &str,
) -> Result<SummaryPaths, AppError> {
    let markdown = dir.join(format!("summary_{}.md", record.interview_id));
    std::fs::write(&markdown, render_markdown(record, generated_at)).map_err(|e| {
        AppError::io(format!("Failed to write {}: {e}", markdown.display()))
    })?;

    let json = dir.join(format!("summary_{}.json", record.interview_id));
    let body = serde_json::to_string_pretty(record)
        .map_err(|e| AppError::internal(format!("Failed to serialize interview: {e}")))?;
    std::fs::write(&json, body)
        .map_err(|e| AppError::io(format!("Failed to write {}: {e}", json.display())))?;

    log::info!("Summary written: {}", markdown.display());
    Ok(SummaryPaths { markdown, json })
}
