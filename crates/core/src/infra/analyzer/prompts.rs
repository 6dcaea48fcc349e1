//! 解析リクエスト用のプロンプトと応答の解釈

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::domain::interview::{
    AnswerAssessment, ExtractedInfo, FaqBook, FaqMatch, InterviewSummary, Level, QaPair,
};
use crate::domain::name::UNKNOWN_NAME;

/// 要約応答で本文と JSON を分ける区切り
pub const JSON_MARKER: &str = "JSON_DATA:";

/// 回答評価: YES / NO のみ
pub const SYSTEM_ASSESS: &str = "\
You review answers given in a spoken job-program interview.
Decide whether the answer is clear and relevant to the question.
Reply with YES or NO only.";

/// FAQ 照合: 番号か NONE のみ
pub const SYSTEM_FAQ: &str = "\
You match a candidate's spoken question against a numbered FAQ list.
Reply with just the number of the matching FAQ, or NONE if nothing matches.";

/// 要約: 本文のあと JSON_DATA: 行に JSON
pub const SYSTEM_SUMMARY: &str = "\
You summarize spoken interviews for an admissions team.
First write a concise summary of the interview (3-4 paragraphs).
Then, on a new line starting with \"JSON_DATA:\", output only a JSON object with the fields
name, interest_level (high/medium/low), readiness (high/medium/low) and background
(a brief description of the candidate's background and experience).";

pub fn build_assess_prompt(question: &str, answer: &str) -> String {
    format!("Question: \"{question}\"\nAnswer: \"{answer}\"\nIs this answer clear and relevant?")
}

pub fn build_faq_prompt(query: &str, faqs: &FaqBook) -> String {
    let mut msg = format!("Query: \"{query}\"\n\nFAQs:\n");
    for (i, faq) in faqs.faqs.iter().enumerate() {
        msg.push_str(&format!("{}. {}\n", i + 1, faq.question));
    }
    msg.push_str("\nWhich FAQ number matches this query?");
    msg
}

pub fn build_summary_prompt(organization: &str, candidate_name: &str, answers: &[QaPair]) -> String {
    let mut msg = format!(
        "Below is an interview with a candidate named '{candidate_name}' for {organization}'s program. \
         The candidate's full name is '{candidate_name}'.\n\nInterview transcript:\n"
    );
    for qa in answers {
        msg.push_str(&format!(
            "Question {n}: {q}\nAnswer {n}: {a}\n\n",
            n = qa.number,
            q = qa.question,
            a = qa.answer
        ));
    }
    msg
}

pub fn parse_assessment(reply: &str) -> AnswerAssessment {
    if reply.to_uppercase().contains("YES") {
        AnswerAssessment::Acceptable
    } else {
        AnswerAssessment::Unclear
    }
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(\d+)\b").expect("number pattern is valid"))
}

/// 応答中の最初の番号 (1始まり) を FAQ の位置に変換する。NONE や範囲外は NoMatch。
pub fn parse_faq_reply(reply: &str, faq_count: usize) -> FaqMatch {
    if reply.to_uppercase().contains("NONE") {
        return FaqMatch::NoMatch;
    }
    number_pattern()
        .captures(reply)
        .and_then(|c| c[1].parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= faq_count)
        .map(|n| FaqMatch::Matched(n - 1))
        .unwrap_or(FaqMatch::NoMatch)
}

#[derive(Deserialize)]
struct RawExtracted {
    name: Option<String>,
    interest_level: Option<String>,
    readiness: Option<String>,
    background: Option<String>,
}

/// 要約応答を本文と抽出情報に分ける。JSON が壊れていても本文は残す。
pub fn parse_summary_reply(reply: &str, candidate_name: &str) -> InterviewSummary {
    let Some((narrative, json_part)) = reply.split_once(JSON_MARKER) else {
        return InterviewSummary {
            narrative: reply.trim().to_string(),
            extracted: ExtractedInfo::unknown(candidate_name),
        };
    };

    let json_text = strip_code_fence(json_part);
    let extracted = match serde_json::from_str::<RawExtracted>(json_text) {
        Ok(raw) => {
            let name = raw
                .name
                .filter(|n| {
                    let n = n.trim();
                    !n.is_empty() && n != "Candidate" && n != UNKNOWN_NAME
                })
                .unwrap_or_else(|| candidate_name.to_string());
            ExtractedInfo {
                name,
                interest_level: raw.interest_level.as_deref().map(Level::parse).unwrap_or(Level::Unknown),
                readiness: raw.readiness.as_deref().map(Level::parse).unwrap_or(Level::Unknown),
                background: raw.background.unwrap_or_default(),
            }
        }
        Err(e) => {
            log::error!("Failed to parse extracted info JSON: {e}");
            ExtractedInfo::unknown(candidate_name)
        }
    };

    InterviewSummary {
        narrative: narrative.trim().to_string(),
        extracted,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interview::FaqEntry;

    #[test]
    fn faq_prompt_numbers_entries() {
        let faqs = FaqBook {
            faqs: vec![
                FaqEntry { question: "Cost?".into(), answer: "Free".into(), keywords: vec![] },
                FaqEntry { question: "Online?".into(), answer: "Yes".into(), keywords: vec![] },
            ],
        };
        let p = build_faq_prompt("is it online", &faqs);
        assert!(p.contains("1. Cost?"));
        assert!(p.contains("2. Online?"));
        assert!(p.contains("is it online"));
    }

    #[test]
    fn assessment_reply() {
        assert_eq!(parse_assessment("YES"), AnswerAssessment::Acceptable);
        assert_eq!(parse_assessment("yes."), AnswerAssessment::Acceptable);
        assert_eq!(parse_assessment("NO"), AnswerAssessment::Unclear);
        assert_eq!(parse_assessment(""), AnswerAssessment::Unclear);
    }

    #[test]
    fn faq_reply() {
        assert_eq!(parse_faq_reply("2", 3), FaqMatch::Matched(1));
        assert_eq!(parse_faq_reply("FAQ 3 matches", 3), FaqMatch::Matched(2));
        assert_eq!(parse_faq_reply("NONE", 3), FaqMatch::NoMatch);
        assert_eq!(parse_faq_reply("4", 3), FaqMatch::NoMatch);
        assert_eq!(parse_faq_reply("0", 3), FaqMatch::NoMatch);
        assert_eq!(parse_faq_reply("no idea", 3), FaqMatch::NoMatch);
    }

    #[test]
    fn summary_reply_with_fenced_json() {
        let reply = "A strong candidate.\n\nJSON_DATA:\n```json\n{\"name\": \"Candidate\", \"interest_level\": \"High\", \"readiness\": \"low\", \"background\": \"Engineer\"}\n```";
        let s = parse_summary_reply(reply, "John Smith");
        assert_eq!(s.narrative, "A strong candidate.");
        assert_eq!(s.extracted.name, "John Smith");
        assert_eq!(s.extracted.interest_level, Level::High);
        assert_eq!(s.extracted.readiness, Level::Low);
        assert_eq!(s.extracted.background, "Engineer");
    }

    #[test]
    fn summary_reply_without_marker_keeps_text() {
        let s = parse_summary_reply("Just prose.", "John");
        assert_eq!(s.narrative, "Just prose.");
        assert_eq!(s.extracted, ExtractedInfo::unknown("John"));
    }

    #[test]
    fn summary_reply_with_broken_json() {
        let s = parse_summary_reply("Prose\nJSON_DATA: {not json", "John");
        assert_eq!(s.narrative, "Prose");
        assert_eq!(s.extracted.interest_level, Level::Unknown);
        assert_eq!(s.extracted.name, "John");
    }
}
