use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::domain::name::{
    extract_name_tokens, is_negative_confirmation, resolve_spelled_name, PhoneticTable,
    UNKNOWN_NAME,
};
use crate::domain::settings::{NameSettings, TurnTimeouts};
use crate::domain::speech::Listener;
use crate::infra::metrics::Metrics;
use crate::infra::speaker::Speaker;

pub const SPELL_REQUEST: &str =
    "I want to make sure I get your name right. Could you please spell your first name letter by letter?";
pub const SPELL_AFTER_DENIAL: &str =
    "I apologize. Could you please spell your name letter by letter, with a pause between each letter?";

fn confirm_prompt(name: &str) -> String {
    format!("I heard your name as {name}. Is that correct? Please say yes or no.")
}

fn acknowledge(name: &str) -> String {
    format!("Thank you. I have your name as {name}.")
}

/// 名前の決まり方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    /// 聞き取った名前をそのまま確認できた
    Confirmed,
    /// 1文字ずつのスペルから組み立てた
    Spelled,
    /// 決まらなかった
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameResolution {
    pub name: String,
    pub source: NameSource,
}

impl NameResolution {
    pub fn is_known(&self) -> bool {
        self.source != NameSource::Unknown
    }
}

/// 自己紹介から名前を取り出し、確認・スペル聞き取りで確定させる。失敗しても "Unknown" を返す。
pub struct NameResolver {
    table: PhoneticTable,
    confirmation_timeout: Duration,
    spelling_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl NameResolver {
    pub fn new(table: PhoneticTable, confirmation_timeout: Duration, spelling_timeout: Duration) -> Self {
        Self {
            table,
            confirmation_timeout,
            spelling_timeout,
            metrics: None,
        }
    }

    pub fn from_settings(names: &NameSettings, timeouts: &TurnTimeouts) -> Self {
        Self::new(
            PhoneticTable::with_extra(&names.extra_letter_mappings),
            timeouts.confirmation(),
            timeouts.spelling(),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn resolve(
        &self,
        answer: &str,
        listener: &mut dyn Listener,
        speaker: &mut dyn Speaker,
    ) -> NameResolution {
        let tokens = extract_name_tokens(answer);
        if tokens.is_empty() {
            return self.spell(SPELL_REQUEST, listener, speaker);
        }

        let candidate = tokens
            .iter()
            .take(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        say(speaker, &confirm_prompt(&candidate));
        let reply = listener.listen(self.confirmation_timeout);
        log::debug!("Name confirmation reply: {:?}", reply);

        if is_negative_confirmation(&reply) {
            return self.spell(SPELL_AFTER_DENIAL, listener, speaker);
        }

        NameResolution {
            name: candidate,
            source: NameSource::Confirmed,
        }
    }

    fn spell(
        &self,
        prompt: &str,
        listener: &mut dyn Listener,
        speaker: &mut dyn Speaker,
    ) -> NameResolution {
        if let Some(m) = &self.metrics {
            m.inc_spelling_fallbacks();
        }
        say(speaker, prompt);
        let spelled = listener.listen(self.spelling_timeout);

        match resolve_spelled_name(&self.table, &spelled) {
            Some(name) => {
                say(speaker, &acknowledge(&name));
                log::info!("Name resolved from spelling: {}", name);
                NameResolution {
                    name,
                    source: NameSource::Spelled,
                }
            }
            None => {
                log::warn!("Could not resolve spelled name from {:?}", spelled);
                NameResolution {
                    name: UNKNOWN_NAME.to_string(),
                    source: NameSource::Unknown,
                }
            }
        }
    }
}

fn say(speaker: &mut dyn Speaker, text: &str) {
    if let Err(e) = speaker.speak(text) {
        log::warn!("Failed to speak: {e}");
    }
}
