use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::error::AppError;

/// 面接の書き起こしファイル（追記のみ）。
///
/// 1行ごとに書き出すので、途中で中断してもそこまでの内容は残る。
pub struct TranscriptWriter {
    path: PathBuf,
    file: File,
}

impl TranscriptWriter {
    /// ファイルを作成してヘッダ行を書く
    pub fn create(path: &Path, organization: &str, started_at: &str) -> Result<Self, AppError> {
        let file = File::create(path).map_err(|e| {
            AppError::io(format!("Failed to create transcript {}: {e}", path.display()))
        })?;
        let mut writer = Self {
            path: path.to_path_buf(),
            file,
        };
        writer.write(&format!("{organization} Interview - {started_at}\n\n"))?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, text: &str) -> Result<(), AppError> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| AppError::io(format!("Failed to write transcript: {e}")))
    }

    pub fn question(&mut self, number: u32, question: &str) -> Result<(), AppError> {
        self.write(&format!("Q{number}: {question}\n"))
    }

    pub fn answer(&mut self, number: u32, time: &str, answer: &str) -> Result<(), AppError> {
        self.write(&format!("A{number} [{time}]: {answer}\n\n"))
    }

    pub fn clarification(&mut self, prompt: &str) -> Result<(), AppError> {
        self.write(&format!("Clarification: {prompt}\n"))
    }

    pub fn clarified_answer(
        &mut self,
        number: u32,
        time: &str,
        answer: &str,
    ) -> Result<(), AppError> {
        self.write(&format!("Clarified A{number} [{time}]: {answer}\n\n"))
    }

    /// エージェントの発話。`paragraph` なら空行で区切る。
    pub fn agent(&mut self, text: &str, paragraph: bool) -> Result<(), AppError> {
        let end = if paragraph { "\n\n" } else { "\n" };
        self.write(&format!("Agent: {text}{end}"))
    }

    pub fn candidate(&mut self, time: &str, text: &str) -> Result<(), AppError> {
        self.write(&format!("Candidate [{time}]: {text}\n"))
    }
}
