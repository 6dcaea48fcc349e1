use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::AppError;

// ─── Answers ─────────────────────────────────────────────────────

/// 質問と回答の1組
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    /// 質問番号 (1始まり)
    pub number: u32,
    pub question: String,
    pub answer: String,
    pub confidence: f32,
    /// 回答時刻 (ローカル時刻, RFC 3339)
    pub answered_at: String,
}

/// 関心度・準備度の3段階評価
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    High,
    Medium,
    Low,
    Unknown,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// 統計用の数値 (high=3, medium=2, low=1)
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::High => Some(3.0),
            Self::Medium => Some(2.0),
            Self::Low => Some(1.0),
            Self::Unknown => None,
        }
    }
}

/// 回答から抽出した候補者情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInfo {
    pub name: String,
    pub interest_level: Level,
    pub readiness: Level,
    pub background: String,
}

impl ExtractedInfo {
    /// 解析に失敗したときの値
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interest_level: Level::Unknown,
            readiness: Level::Unknown,
            background: "Could not extract information".to_string(),
        }
    }
}

/// 面接サマリー（文章 + 構造化情報）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSummary {
    pub narrative: String,
    pub extracted: ExtractedInfo,
}

/// 回答の十分さの判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerAssessment {
    Acceptable,
    Unclear,
}

// ─── FAQ ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
    /// 照合用キーワード（空ならキーワード群の既定の割り当てを使う）
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// FAQ 照合結果。Matched はエントリの位置 (0始まり)。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaqMatch {
    Matched(usize),
    NoMatch,
}

/// FAQ ファイル `{"faqs": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaqBook {
    #[serde(default)]
    pub faqs: Vec<FaqEntry>,
}

impl FaqBook {
    /// ファイルがなければ空の FAQ を返す
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::warn!("FAQ file not found: {}", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::io(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw).map_err(|e| AppError::config(format!("Invalid FAQ file: {e}")))
    }

    pub fn get(&self, index: usize) -> Option<&FaqEntry> {
        self.faqs.get(index)
    }

    pub fn len(&self) -> usize {
        self.faqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faqs.is_empty()
    }
}

/// FAQ ループでの1往復
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqExchange {
    pub question: String,
    /// 回答した FAQ の位置。None はチームへの申し送り。
    pub matched: Option<usize>,
    pub reply: String,
}

// ─── Interview record ────────────────────────────────────────────

/// 1回の面接の全記録（summary JSON の形式でもある）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewRecord {
    /// 面接ID（開始時刻 "%Y%m%d_%H%M%S"）
    pub interview_id: String,
    pub started_at: String,
    pub candidate_name: String,
    pub answers: Vec<QaPair>,
    pub faq_log: Vec<FaqExchange>,
    pub summary: String,
    pub extracted_info: ExtractedInfo,
}

impl InterviewRecord {
    pub fn questions(&self) -> Vec<&str> {
        self.answers.iter().map(|qa| qa.question.as_str()).collect()
    }
}

// ─── Queries ─────────────────────────────────────────────────────

/// 一覧表示用
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewListItem {
    pub interview_id: String,
    pub started_at: String,
    pub name: Option<String>,
    pub interest_level: Option<Level>,
}

/// 詳細表示・エクスポート用
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewDetail {
    pub interview_id: String,
    pub started_at: String,
    pub summary: String,
    pub answers: Vec<QaPair>,
    pub faq_log: Vec<FaqExchange>,
    pub extracted_info: Option<ExtractedInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InterestDistribution {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

/// ダッシュボード用の集計
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewStats {
    pub total_interviews: u32,
    pub today_interviews: u32,
    /// "High" / "Medium" / "Low" / "N/A"
    pub avg_interest: String,
    pub interest_distribution: InterestDistribution,
}

impl InterviewStats {
    /// 関心度の分布から平均ラベルを決める（3/2/1 の平均、2.5以上 High、1.5以上 Medium）
    pub fn average_label(dist: &InterestDistribution) -> String {
        let count = dist.high + dist.medium + dist.low;
        if count == 0 {
            return "N/A".to_string();
        }
        let avg = (dist.high as f64 * 3.0 + dist.medium as f64 * 2.0 + dist.low as f64)
            / count as f64;
        if avg >= 2.5 {
            "High".to_string()
        } else if avg >= 1.5 {
            "Medium".to_string()
        } else {
            "Low".to_string()
        }
    }
}
