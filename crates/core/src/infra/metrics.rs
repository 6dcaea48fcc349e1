use parking_lot::Mutex;
use serde::Serialize;

/// 直近のレイテンシ記録の保持上限
const MAX_LATENCY_RECORDS: usize = 1000;

/// ローカルメトリクス収集器
pub struct Metrics {
    counters: Mutex<MetricsCounters>,
    latencies: Mutex<Vec<LatencyRecord>>,
}

#[derive(Debug, Default)]
struct MetricsCounters {
    interviews_started: u64,
    turns: u64,
    empty_turns: u64,
    retries: u64,
    low_confidence_accepts: u64,
    spelling_fallbacks: u64,
    faq_hits: u64,
    faq_misses: u64,
    analyzer_fallbacks: u64,
    errors_device: u64,
    errors_recognizer: u64,
    errors_storage: u64,
    errors_analyzer: u64,
    errors_other: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyRecord {
    pub phase: String,
    pub duration_ms: u64,
    pub timestamp: String,
}

/// メトリクスサマリー（面接終了時にログへ出す）
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub interviews_started: u64,
    pub turns: u64,
    pub empty_turns: u64,
    pub retries: u64,
    pub low_confidence_accepts: u64,
    pub spelling_fallbacks: u64,
    pub faq_hits: u64,
    pub faq_misses: u64,
    pub analyzer_fallbacks: u64,
    pub error_counts: ErrorCounts,
    pub avg_latency_ms: AvgLatency,
    pub recent_latencies: Vec<LatencyRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorCounts {
    pub device: u64,
    pub recognizer: u64,
    pub storage: u64,
    pub analyzer: u64,
    pub other: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvgLatency {
    pub listen: Option<f64>,
    pub analyze: Option<f64>,
    pub persist: Option<f64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(MetricsCounters::default()),
            latencies: Mutex::new(Vec::new()),
        }
    }

    pub fn inc_interviews_started(&self) {
        self.counters.lock().interviews_started += 1;
    }

    pub fn inc_turns(&self) {
        self.counters.lock().turns += 1;
    }

    pub fn inc_empty_turns(&self) {
        self.counters.lock().empty_turns += 1;
    }

    pub fn inc_retries(&self) {
        self.counters.lock().retries += 1;
    }

    pub fn inc_low_confidence_accepts(&self) {
        self.counters.lock().low_confidence_accepts += 1;
    }

    pub fn inc_spelling_fallbacks(&self) {
        self.counters.lock().spelling_fallbacks += 1;
    }

    pub fn inc_faq(&self, matched: bool) {
        let mut c = self.counters.lock();
        if matched {
            c.faq_hits += 1;
        } else {
            c.faq_misses += 1;
        }
    }

    pub fn inc_analyzer_fallbacks(&self) {
        self.counters.lock().analyzer_fallbacks += 1;
    }

    pub fn inc_error(&self, code: &str) {
        let mut c = self.counters.lock();
        match code {
            "E_DEVICE" => c.errors_device += 1,
            "E_RECOGNIZER" => c.errors_recognizer += 1,
            "E_STORAGE" => c.errors_storage += 1,
            "E_ANALYZER" => c.errors_analyzer += 1,
            _ => c.errors_other += 1,
        }
    }

    pub fn record_latency(&self, phase: &str, duration_ms: u64) {
        let record = LatencyRecord {
            phase: phase.to_string(),
            duration_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let mut latencies = self.latencies.lock();
        latencies.push(record);
        if latencies.len() > MAX_LATENCY_RECORDS {
            let excess = latencies.len() - MAX_LATENCY_RECORDS;
            latencies.drain(0..excess);
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let c = self.counters.lock();
        let latencies = self.latencies.lock();

        let avg = |phase: &str| -> Option<f64> {
            let vals: Vec<f64> = latencies
                .iter()
                .filter(|r| r.phase == phase)
                .map(|r| r.duration_ms as f64)
                .collect();
            if vals.is_empty() {
                None
            } else {
                Some(vals.iter().sum::<f64>() / vals.len() as f64)
            }
        };

        let recent: Vec<LatencyRecord> = latencies.iter().rev().take(20).cloned().collect();

        MetricsSummary {
            interviews_started: c.interviews_started,
            turns: c.turns,
            empty_turns: c.empty_turns,
            retries: c.retries,
            low_confidence_accepts: c.low_confidence_accepts,
            spelling_fallbacks: c.spelling_fallbacks,
            faq_hits: c.faq_hits,
            faq_misses: c.faq_misses,
            analyzer_fallbacks: c.analyzer_fallbacks,
            error_counts: ErrorCounts {
                device: c.errors_device,
                recognizer: c.errors_recognizer,
                storage: c.errors_storage,
                analyzer: c.errors_analyzer,
                other: c.errors_other,
            },
            avg_latency_ms: AvgLatency {
                listen: avg("listen"),
                analyze: avg("analyze"),
                persist: avg("persist"),
            },
            recent_latencies: recent,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
