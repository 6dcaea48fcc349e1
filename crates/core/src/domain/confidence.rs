use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 信頼度スコアの重み
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub base: f32,
    /// 5語以上で満額、3〜4語で半額
    pub length_bonus: f32,
    pub filler_penalty_per_word: f32,
    pub max_filler_penalty: f32,
    /// 文末が . ! ? のとき加算
    pub sentence_bonus: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            base: 0.5,
            length_bonus: 0.2,
            filler_penalty_per_word: 0.1,
            max_filler_penalty: 0.3,
            sentence_bonus: 0.1,
        }
    }
}

pub fn default_filler_words() -> Vec<String> {
    ["um", "uh", "er", "like", "you know", "well", "so"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// 書き起こしテキストから信頼度 (0.0〜1.0) を推定する。
///
/// テキストだけの純関数。同じ入力には常に同じ値を返す。
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
    single_fillers: HashSet<String>,
    phrase_fillers: Vec<Vec<String>>,
}

impl ConfidenceScorer {
    pub fn new(weights: ConfidenceWeights, fillers: &[String]) -> Self {
        let mut single_fillers = HashSet::new();
        let mut phrase_fillers = Vec::new();
        for filler in fillers {
            let words: Vec<String> = filler
                .split_whitespace()
                .map(|w| w.to_lowercase())
                .collect();
            match words.len() {
                0 => {}
                1 => {
                    single_fillers.insert(words[0].clone());
                }
                _ => phrase_fillers.push(words),
            }
        }
        Self {
            weights,
            single_fillers,
            phrase_fillers,
        }
    }

    pub fn score(&self, text: &str) -> f32 {
        let text = text.trim();
        if text.is_empty() {
            return 0.0;
        }

        let w = &self.weights;
        let mut score = w.base;

        let words = word_count(text);
        if words >= 5 {
            score += w.length_bonus;
        } else if words >= 3 {
            score += w.length_bonus / 2.0;
        }

        let fillers = self.filler_count(text) as f32;
        score -= (fillers * w.filler_penalty_per_word).min(w.max_filler_penalty);

        if text.ends_with(['.', '!', '?']) {
            score += w.sentence_bonus;
        }

        score.clamp(0.0, 1.0)
    }

    /// フィラー語の出現数（大文字小文字・前後の句読点は無視、"you know" は句として数える）
    pub fn filler_count(&self, text: &str) -> usize {
        let tokens = normalized_tokens(text);
        let singles = tokens
            .iter()
            .filter(|t| self.single_fillers.contains(t.as_str()))
            .count();
        let phrases: usize = self
            .phrase_fillers
            .iter()
            .map(|phrase| {
                tokens
                    .windows(phrase.len())
                    .filter(|window| window == phrase)
                    .count()
            })
            .sum();
        singles + phrases
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ConfidenceWeights::default(), &default_filler_words())
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn normalized_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}
