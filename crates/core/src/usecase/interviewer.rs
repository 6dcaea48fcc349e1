use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::confidence::word_count;
use crate::domain::error::AppError;
use crate::domain::interview::{
    AnswerAssessment, FaqBook, FaqExchange, FaqMatch, InterviewRecord, InterviewSummary, QaPair,
};
use crate::domain::name::UNKNOWN_NAME;
use crate::domain::settings::{DataPaths, InterviewSettings};
use crate::domain::speech::Listener;
use crate::infra::analyzer::{AnalyzeError, KeywordAnalyzer, TextAnalyzer};
use crate::infra::metrics::Metrics;
use crate::infra::report::{self, SummaryPaths, TranscriptWriter};
use crate::infra::speaker::Speaker;
use crate::infra::storage::Storage;

use super::name_resolver::NameResolver;
use super::retry::{RetryController, ScoredAnswer};

pub const CLARIFY: &str =
    "I want to make sure I capture your response accurately. Could you tell me a bit more about that?";
pub const FAQ_OPEN_TEMPLATE: &str = "Thank you for your responses. Do you have any questions for me about {org} or the program?";
pub const FAQ_CONTINUE: &str = "Do you have any other questions?";
pub const FAQ_NOTED: &str =
    "I've made a note of your question for the team because I don't have any specific information on that.";
pub const FAQ_END: &str = "Great! That concludes our interview. Thank you for your time.";

/// 明確化後の回答を採用する最小語数
const CLARIFIED_MIN_WORDS: usize = 3;

fn intro(organization: &str) -> String {
    format!(
        "Hello, I'm the {organization} Interview Agent. I'll be conducting a short interview with you today. Let's get started."
    )
}

fn faq_open(organization: &str) -> String {
    FAQ_OPEN_TEMPLATE.replace("{org}", organization)
}

/// FAQ ループを終える返答か（空、"no"、お礼）
pub fn is_faq_exit(reply: &str) -> bool {
    let lower = reply.trim().to_lowercase();
    if lower.is_empty() || lower.contains("thank you") {
        return true;
    }
    lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .any(|w| matches!(w, "no" | "nope" | "thanks"))
}

fn clock_time() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// 面接1回分の成果物
#[derive(Debug, Clone)]
pub struct InterviewOutcome {
    pub record: InterviewRecord,
    pub transcript: PathBuf,
    pub summary: SummaryPaths,
}

/// 固定の質問で面接を進め、書き起こし・要約・DB に保存する。
///
/// 解析器は async なので専用の current-thread ランタイムで同期的に呼ぶ。
/// 解析器が失敗した場合はキーワード解析にフォールバックする。
pub struct Interviewer {
    settings: InterviewSettings,
    listener: Box<dyn Listener>,
    speaker: Box<dyn Speaker>,
    analyzer: Box<dyn TextAnalyzer>,
    fallback: KeywordAnalyzer,
    faqs: FaqBook,
    storage: Storage,
    retry: RetryController,
    names: NameResolver,
    metrics: Arc<Metrics>,
    cancel: Arc<AtomicBool>,
    runtime: tokio::runtime::Runtime,
}

impl Interviewer {
    pub fn new(
        settings: InterviewSettings,
        listener: Box<dyn Listener>,
        speaker: Box<dyn Speaker>,
        analyzer: Box<dyn TextAnalyzer>,
        faqs: FaqBook,
        storage: Storage,
    ) -> Result<Self, AppError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build async runtime: {e}")))?;
        let metrics = Arc::new(Metrics::new());

        Ok(Self {
            retry: RetryController::from_settings(&settings.confidence).with_metrics(metrics.clone()),
            names: NameResolver::from_settings(&settings.names, &settings.listening.timeouts)
                .with_metrics(metrics.clone()),
            fallback: KeywordAnalyzer::new(settings.script.organization.clone()),
            settings,
            listener,
            speaker,
            analyzer,
            faqs,
            storage,
            metrics,
            cancel: Arc::new(AtomicBool::new(false)),
            runtime,
        })
    }

    /// メトリクスを共有する（SpeechListener と同じものを渡す）
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.retry = RetryController::from_settings(&self.settings.confidence)
            .with_metrics(metrics.clone());
        self.names = NameResolver::from_settings(
            &self.settings.names,
            &self.settings.listening.timeouts,
        )
        .with_metrics(metrics.clone());
        self.metrics = metrics;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn check_cancel(&self) -> Result<(), AppError> {
        if self.cancel.load(Ordering::Relaxed) {
            log::warn!("Interview interrupted");
            Err(AppError::interrupted())
        } else {
            Ok(())
        }
    }

    fn say(&mut self, text: &str) {
        if let Err(e) = self.speaker.speak(text) {
            log::warn!("Failed to speak ({}): {}", self.speaker.name(), e);
        }
    }

    fn listen_scored(&mut self, timeout: Duration) -> ScoredAnswer {
        self.retry
            .listen(self.listener.as_mut(), self.speaker.as_mut(), timeout)
    }

    /// 面接を最初から最後まで行う
    pub fn conduct(&mut self) -> Result<InterviewOutcome, AppError> {
        self.check_cancel()?;
        self.settings.paths.ensure_dirs()?;
        self.metrics.inc_interviews_started();
        let organization = self.settings.script.organization.clone();
        if let Err(e) = refresh_dashboard(&self.storage, &self.settings.paths, &organization) {
            log::warn!("Failed to refresh dashboard: {e}");
        }

        let started = chrono::Local::now();
        let interview_id = started.format("%Y%m%d_%H%M%S").to_string();
        let started_at = started.format("%Y-%m-%d %H:%M:%S").to_string();
        log::info!("Interview {} started", interview_id);

        let transcript_path = self
            .settings
            .paths
            .transcripts_dir()
            .join(format!("transcript_{interview_id}.txt"));
        let mut transcript = TranscriptWriter::create(&transcript_path, &organization, &started_at)?;

        self.say(&intro(&organization));

        let (candidate_name, answers) = self.ask_questions(&mut transcript)?;
        let faq_log = self.faq_loop(&mut transcript, &organization)?;
        self.check_cancel()?;

        let summary = self.summarize(&candidate_name, &answers);
        let record = InterviewRecord {
            interview_id,
            started_at,
            candidate_name,
            answers,
            faq_log,
            summary: summary.narrative,
            extracted_info: summary.extracted,
        };

        let persist_start = Instant::now();
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let summary_paths =
            report::write_summary_files(&self.settings.paths.summaries_dir(), &record, &generated_at)?;
        if let Err(e) = self.storage.save_interview(&record) {
            self.metrics.inc_error(e.code.as_str());
            return Err(e);
        }
        self.metrics
            .record_latency("persist", persist_start.elapsed().as_millis() as u64);

        if let Err(e) = refresh_dashboard(&self.storage, &self.settings.paths, &organization) {
            log::warn!("Failed to refresh dashboard: {e}");
        }

        match serde_json::to_string(&self.metrics.summary()) {
            Ok(json) => log::info!("Interview metrics: {json}"),
            Err(e) => log::debug!("Failed to serialize metrics: {e}"),
        }
        log::info!("Interview completed and saved with ID {}", record.interview_id);

        Ok(InterviewOutcome {
            record,
            transcript: transcript_path,
            summary: summary_paths,
        })
    }

    fn ask_questions(
        &mut self,
        transcript: &mut TranscriptWriter,
    ) -> Result<(String, Vec<QaPair>), AppError> {
        let questions = self.settings.script.questions.clone();
        let timeouts = self.settings.listening.timeouts;
        let name_index = self.settings.names.name_question_index;

        let mut candidate_name = UNKNOWN_NAME.to_string();
        let mut answers = Vec::with_capacity(questions.len());

        for (i, question) in questions.iter().enumerate() {
            self.check_cancel()?;
            let number = i as u32 + 1;
            self.say(question);
            transcript.question(number, question)?;

            let mut scored;
            if name_index == Some(i) {
                scored = self.listen_scored(timeouts.name());
                self.check_cancel()?;
                if !scored.text.is_empty() {
                    let resolution = self.names.resolve(
                        &scored.text,
                        self.listener.as_mut(),
                        self.speaker.as_mut(),
                    );
                    let known = resolution.is_known();
                    candidate_name = resolution.name;
                    if known
                        && !scored.text.to_lowercase().contains(&candidate_name.to_lowercase())
                    {
                        scored.text = format!("{candidate_name}. {}", scored.text);
                    }
                }
            } else {
                scored = self.listen_scored(timeouts.general());
            }
            self.check_cancel()?;
            transcript.answer(number, &clock_time(), &scored.text)?;

            let mut answer = scored.text;
            let mut confidence = scored.confidence;
            let mut answered_at = clock_time();

            if word_count(&answer) < CLARIFIED_MIN_WORDS
                && self.assess(question, &answer) == AnswerAssessment::Unclear
            {
                self.say(CLARIFY);
                transcript.clarification(CLARIFY)?;
                let clarified = self.listen_scored(timeouts.clarification());
                self.check_cancel()?;
                let at = clock_time();
                transcript.clarified_answer(number, &at, &clarified.text)?;
                if word_count(&clarified.text) >= CLARIFIED_MIN_WORDS {
                    answer = clarified.text;
                    confidence = clarified.confidence;
                    answered_at = at;
                }
            }

            answers.push(QaPair {
                number,
                question: question.clone(),
                answer,
                confidence,
                answered_at,
            });
        }

        Ok((candidate_name, answers))
    }

    fn faq_loop(
        &mut self,
        transcript: &mut TranscriptWriter,
        organization: &str,
    ) -> Result<Vec<FaqExchange>, AppError> {
        self.check_cancel()?;
        let open = faq_open(organization);
        self.say(&open);
        transcript.agent(&open, false)?;

        let timeout = self.settings.listening.timeouts.faq();
        let mut log = Vec::new();
        for _ in 0..self.settings.script.max_faq_rounds {
            let question = self.listener.listen(timeout);
            self.check_cancel()?;
            if is_faq_exit(&question) {
                break;
            }
            transcript.candidate(&clock_time(), &question)?;

            let matched = match self.classify(&question) {
                FaqMatch::Matched(index) => Some(index),
                FaqMatch::NoMatch => None,
            };
            let reply = matched
                .and_then(|i| self.faqs.get(i))
                .map(|faq| faq.answer.clone())
                .unwrap_or_else(|| FAQ_NOTED.to_string());
            self.metrics.inc_faq(matched.is_some());

            self.say(&reply);
            transcript.agent(&reply, true)?;
            log.push(FaqExchange {
                question,
                matched,
                reply,
            });

            self.say(FAQ_CONTINUE);
            transcript.agent(FAQ_CONTINUE, false)?;
        }

        self.say(FAQ_END);
        transcript.agent(FAQ_END, false)?;
        Ok(log)
    }

    // ─── Analyzer with fallback ───────────────────────────────────

    fn analyze<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, AnalyzeError>>,
        fallback: impl FnOnce() -> T,
    ) -> T {
        let started = Instant::now();
        let timeout = Duration::from_secs(self.settings.analyzer.timeout_secs.max(1));
        let result = self.runtime.block_on(async {
            tokio::time::timeout(timeout, fut)
                .await
                .unwrap_or(Err(AnalyzeError::Timeout))
        });
        self.metrics
            .record_latency("analyze", started.elapsed().as_millis() as u64);

        match result {
            Ok(value) => value,
            Err(e) => {
                log::warn!(
                    "{} failed with {} analyzer, using keyword rules: {}",
                    what,
                    self.analyzer.name(),
                    e
                );
                self.metrics.inc_error("E_ANALYZER");
                self.metrics.inc_analyzer_fallbacks();
                fallback()
            }
        }
    }

    fn assess(&self, question: &str, answer: &str) -> AnswerAssessment {
        self.analyze(
            "Answer assessment",
            self.analyzer.assess_answer(question, answer),
            || self.fallback.assess(answer),
        )
    }

    fn classify(&self, query: &str) -> FaqMatch {
        if self.faqs.is_empty() {
            return FaqMatch::NoMatch;
        }
        self.analyze(
            "FAQ classification",
            self.analyzer.classify_faq(query, &self.faqs),
            || self.fallback.match_faq(query, &self.faqs),
        )
    }

    fn summarize(&self, candidate_name: &str, answers: &[QaPair]) -> InterviewSummary {
        self.analyze(
            "Summary",
            self.analyzer.summarize(candidate_name, answers),
            || self.fallback.summarize_answers(candidate_name, answers),
        )
    }
}

/// 統計からダッシュボード HTML を書き直す
pub fn refresh_dashboard(
    storage: &Storage,
    paths: &DataPaths,
    organization: &str,
) -> Result<PathBuf, AppError> {
    let now = chrono::Local::now();
    let stats = storage.statistics(&now.format("%Y-%m-%d").to_string())?;
    let html = report::render_dashboard(&stats, organization, &now.format("%Y-%m-%d %H:%M:%S").to_string());
    let path = paths.dashboard();
    report::write_dashboard(&path, &html)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faq_exit_replies() {
        assert!(is_faq_exit(""));
        assert!(is_faq_exit("   "));
        assert!(is_faq_exit("No."));
        assert!(is_faq_exit("no, I'm good"));
        assert!(is_faq_exit("Thank you so much"));
        assert!(is_faq_exit("nope thanks"));
        assert!(!is_faq_exit("Do you know how much it costs?"));
        assert!(!is_faq_exit("Is there a note about the schedule?"));
    }

    #[test]
    fn scripted_lines_use_organization() {
        assert!(intro("Acme").starts_with("Hello, I'm the Acme Interview Agent."));
        assert_eq!(
            faq_open("LunarTech"),
            "Thank you for your responses. Do you have any questions for me about LunarTech or the program?"
        );
    }
}
