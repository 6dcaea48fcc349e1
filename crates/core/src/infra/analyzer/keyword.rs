use async_trait::async_trait;

use super::{AnalyzeError, TextAnalyzer};
use crate::domain::interview::{
    AnswerAssessment, ExtractedInfo, FaqBook, FaqMatch, InterviewSummary, Level, QaPair,
};

/// 内容のある回答とみなす語
const MEANINGFUL_WORDS: &[&str] = &[
    "experience", "work", "study", "learn", "develop", "skills", "project", "interested",
    "passionate", "goal", "ready", "prepared",
];

/// FAQ のキーワード群。位置 n の群は n 番目の FAQ に対応する。
const FAQ_KEYWORD_GROUPS: &[&[&str]] = &[
    &["cost", "price", "money", "fee", "pay"],
    &["requirement", "apply", "need", "prerequisite"],
    &["schedule", "time", "duration", "when", "hours"],
    &["computer", "laptop", "equipment", "device"],
    &["certificate", "certification", "diploma"],
    &["online", "person", "remote", "location"],
    &["job", "placement", "career", "employment"],
];

const HIGH_INTEREST: &[&str] = &["very interested", "excited", "passionate", "love", "really want"];
const LOW_INTEREST: &[&str] = &["not sure", "maybe", "considering"];
const HIGH_READINESS: &[&str] = &["ready", "prepared", "committed", "dedicated", "definitely"];
const LOW_READINESS: &[&str] = &["not ready", "need time", "maybe later"];
const WORK_WORDS: &[&str] = &["experience", "years", "work", "job", "project"];
const SENIOR_WORDS: &[&str] = &["senior", "lead", "manager", "5 years", "experienced"];
const STUDENT_WORDS: &[&str] = &["student", "graduate", "university", "college", "degree"];

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// キーワード規則による解析器。ネットワーク不要で常に成功する。
pub struct KeywordAnalyzer {
    organization: String,
}

impl KeywordAnalyzer {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
        }
    }

    /// 5語以上かつ内容語を含めば Acceptable
    pub fn assess(&self, answer: &str) -> AnswerAssessment {
        let words = answer.split_whitespace().count();
        let lower = answer.to_lowercase();
        if words >= 5 && contains_any(&lower, MEANINGFUL_WORDS) {
            AnswerAssessment::Acceptable
        } else {
            AnswerAssessment::Unclear
        }
    }

    /// エントリ自身のキーワードを優先し、なければキーワード群の位置で照合する
    pub fn match_faq(&self, query: &str, faqs: &FaqBook) -> FaqMatch {
        let lower = query.to_lowercase();
        if lower.trim().is_empty() || faqs.is_empty() {
            return FaqMatch::NoMatch;
        }

        let own = faqs.faqs.iter().position(|faq| {
            faq.keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .any(|k| !k.is_empty() && lower.contains(&k))
        });
        if let Some(index) = own {
            return FaqMatch::Matched(index);
        }

        FAQ_KEYWORD_GROUPS
            .iter()
            .position(|group| contains_any(&lower, group))
            .filter(|&index| {
                faqs.get(index)
                    .is_some_and(|faq| faq.keywords.is_empty())
            })
            .map(FaqMatch::Matched)
            .unwrap_or(FaqMatch::NoMatch)
    }

    pub fn summarize_answers(&self, candidate_name: &str, answers: &[QaPair]) -> InterviewSummary {
        let all_text = answers
            .iter()
            .map(|qa| qa.answer.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        InterviewSummary {
            narrative: self.narrative(&all_text),
            extracted: Self::extract(candidate_name, &all_text),
        }
    }

    fn narrative(&self, all_text: &str) -> String {
        let mut summary = format!(
            "The candidate participated in a comprehensive interview covering their background, \
             motivations, experience, and readiness for the {} program.",
            self.organization
        );
        if contains_any(all_text, &["experience", "work", "job", "project"]) {
            summary.push_str(" They demonstrated relevant professional experience.");
        }
        if contains_any(all_text, &["interested", "passionate", "excited", "want"]) {
            summary.push_str(" The candidate expressed strong interest in the program.");
        }
        if contains_any(all_text, &["ready", "prepared", "committed", "dedicated"]) {
            summary.push_str(" They appear ready and committed to undertaking the intensive program.");
        }
        summary
    }

    fn extract(candidate_name: &str, all_text: &str) -> ExtractedInfo {
        let interest_level = if contains_any(all_text, HIGH_INTEREST) {
            Level::High
        } else if contains_any(all_text, LOW_INTEREST) {
            Level::Low
        } else {
            Level::Medium
        };

        // "not ready" も "ready" を含むので先に判定する
        let readiness = if contains_any(all_text, LOW_READINESS) {
            Level::Low
        } else if contains_any(all_text, HIGH_READINESS) {
            Level::High
        } else {
            Level::Medium
        };

        let background = if contains_any(all_text, STUDENT_WORDS) {
            "Recent graduate or current student"
        } else if contains_any(all_text, WORK_WORDS) {
            if contains_any(all_text, SENIOR_WORDS) {
                "Experienced professional with significant background"
            } else {
                "Professional with some relevant experience"
            }
        } else {
            "Entry-level candidate"
        };

        ExtractedInfo {
            name: candidate_name.to_string(),
            interest_level,
            readiness,
            background: background.to_string(),
        }
    }
}

impl Default for KeywordAnalyzer {
    fn default() -> Self {
        Self::new("LunarTech")
    }
}

#[async_trait]
impl TextAnalyzer for KeywordAnalyzer {
    async fn assess_answer(
        &self,
        _question: &str,
        answer: &str,
    ) -> Result<AnswerAssessment, AnalyzeError> {
        Ok(self.assess(answer))
    }

    async fn classify_faq(&self, query: &str, faqs: &FaqBook) -> Result<FaqMatch, AnalyzeError> {
        Ok(self.match_faq(query, faqs))
    }

    async fn summarize(
        &self,
        candidate_name: &str,
        answers: &[QaPair],
    ) -> Result<InterviewSummary, AnalyzeError> {
        Ok(self.summarize_answers(candidate_name, answers))
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interview::FaqEntry;

    fn faq(question: &str, keywords: &[&str]) -> FaqEntry {
        FaqEntry {
            question: question.into(),
            answer: format!("answer to {question}"),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn book() -> FaqBook {
        FaqBook {
            faqs: vec![
                faq("How much does it cost?", &[]),
                faq("What are the requirements?", &[]),
                faq("What is the schedule?", &[]),
            ],
        }
    }

    fn qa(answer: &str) -> QaPair {
        QaPair {
            number: 1,
            question: "q".into(),
            answer: answer.into(),
            confidence: 0.8,
            answered_at: "10:00:00".into(),
        }
    }

    #[test]
    fn assess_requires_length_and_content() {
        let a = KeywordAnalyzer::default();
        assert_eq!(a.assess("yes"), AnswerAssessment::Unclear);
        assert_eq!(a.assess("I like it a lot"), AnswerAssessment::Unclear);
        assert_eq!(
            a.assess("I have three years of work experience"),
            AnswerAssessment::Acceptable
        );
        assert_eq!(a.assess(""), AnswerAssessment::Unclear);
    }

    #[test]
    fn faq_groups_map_to_positions() {
        let a = KeywordAnalyzer::default();
        let faqs = book();
        assert_eq!(a.match_faq("How much is the fee?", &faqs), FaqMatch::Matched(0));
        assert_eq!(a.match_faq("What do I need to apply", &faqs), FaqMatch::Matched(1));
        assert_eq!(a.match_faq("How many hours per week", &faqs), FaqMatch::Matched(2));
        // 群はあるが FAQ が3件しかない
        assert_eq!(a.match_faq("Do I get a certificate?", &faqs), FaqMatch::NoMatch);
        assert_eq!(a.match_faq("What's the weather", &faqs), FaqMatch::NoMatch);
    }

    #[test]
    fn own_keywords_take_precedence() {
        let a = KeywordAnalyzer::default();
        let faqs = FaqBook {
            faqs: vec![
                faq("Is there a scholarship?", &["scholarship", "discount"]),
                faq("How much does it cost?", &[]),
            ],
        };
        assert_eq!(
            a.match_faq("Do you offer a discount on the price?", &faqs),
            FaqMatch::Matched(0)
        );
        // 群0 (cost) の位置にあるエントリは独自キーワードを持つので群では当てない
        assert_eq!(a.match_faq("What is the price?", &faqs), FaqMatch::NoMatch);
    }

    #[test]
    fn empty_inputs_never_match() {
        let a = KeywordAnalyzer::default();
        assert_eq!(a.match_faq("", &book()), FaqMatch::NoMatch);
        assert_eq!(a.match_faq("cost", &FaqBook::default()), FaqMatch::NoMatch);
    }

    #[test]
    fn extraction_levels() {
        let a = KeywordAnalyzer::default();
        let s = a.summarize_answers(
            "John",
            &[
                qa("I am a university student and very interested"),
                qa("I am ready to start"),
            ],
        );
        assert_eq!(s.extracted.name, "John");
        assert_eq!(s.extracted.interest_level, Level::High);
        assert_eq!(s.extracted.readiness, Level::High);
        assert_eq!(s.extracted.background, "Recent graduate or current student");
        assert!(s.narrative.contains("LunarTech"));
        assert!(s.narrative.contains("ready and committed"));

        let s = a.summarize_answers(
            "Jane",
            &[qa("maybe, I'm not ready yet"), qa("I was a senior engineer at my job")],
        );
        assert_eq!(s.extracted.interest_level, Level::Low);
        assert_eq!(s.extracted.readiness, Level::Low);
        assert_eq!(
            s.extracted.background,
            "Experienced professional with significant background"
        );
    }

    #[test]
    fn extraction_defaults_without_answers() {
        let a = KeywordAnalyzer::default();
        let s = a.summarize_answers("Unknown", &[]);
        assert_eq!(s.extracted.interest_level, Level::Medium);
        assert_eq!(s.extracted.readiness, Level::Medium);
        assert_eq!(s.extracted.background, "Entry-level candidate");
    }

    #[tokio::test]
    async fn trait_delegates() {
        let a = KeywordAnalyzer::default();
        assert_eq!(a.name(), "keyword");
        let m = a.classify_faq("what does it cost", &book()).await.unwrap();
        assert_eq!(m, FaqMatch::Matched(0));
        let r = a.assess_answer("q", "ok").await.unwrap();
        assert_eq!(r, AnswerAssessment::Unclear);
    }
}
