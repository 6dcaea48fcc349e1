#[cfg(test)]
mod tests {
    use crate::domain::endpoint::{EndReason, EndpointState};
    use crate::domain::error::{AppError, ErrorCode};
    use crate::domain::interview::{ExtractedInfo, FaqMatch, InterviewRecord, Level, QaPair};
    use crate::domain::settings::{AnalyzerChoice, RecognizerChoice, SpeakerChoice};
    use crate::domain::speech::RecognitionEvent;

    #[test]
    fn test_level_serialization() {
        assert_eq!(serde_json::to_string(&Level::High).unwrap(), "\"high\"");
        assert_eq!(serde_json::to_string(&Level::Unknown).unwrap(), "\"unknown\"");
        assert_eq!(
            serde_json::from_str::<Level>("\"medium\"").unwrap(),
            Level::Medium
        );
    }

    #[test]
    fn test_recognition_event_serialization() {
        let json = serde_json::to_string(&RecognitionEvent::Partial("hi".into())).unwrap();
        assert_eq!(json, r#"{"kind":"partial","text":"hi"}"#);
        let back: RecognitionEvent =
            serde_json::from_str(r#"{"kind":"final","text":"done"}"#).unwrap();
        assert_eq!(back, RecognitionEvent::Final("done".into()));
    }

    #[test]
    fn test_endpoint_serialization() {
        assert_eq!(
            serde_json::to_string(&EndpointState::WaitingForSpeech).unwrap(),
            "\"waiting_for_speech\""
        );
        assert_eq!(
            serde_json::to_string(&EndReason::MaxDuration).unwrap(),
            "\"max_duration\""
        );
    }

    #[test]
    fn test_choice_serialization() {
        assert_eq!(
            serde_json::from_str::<RecognizerChoice>("\"noop\"").unwrap(),
            RecognizerChoice::Noop
        );
        assert_eq!(
            serde_json::from_str::<AnalyzerChoice>("\"claude\"").unwrap(),
            AnalyzerChoice::Claude
        );
        assert_eq!(
            serde_json::to_string(&SpeakerChoice::Command).unwrap(),
            "\"command\""
        );
    }

    #[test]
    fn test_error_code_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::Recognizer).unwrap(),
            "\"E_RECOGNIZER\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::Interrupted).unwrap(),
            "\"E_INTERRUPTED\""
        );
    }

    #[test]
    fn test_app_error_serialization() {
        let err = AppError::config("bad value");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("E_CONFIG"));
        assert!(json.contains("recoverable"));
    }

    #[test]
    fn test_faq_match_serialization() {
        assert_eq!(
            serde_json::to_string(&FaqMatch::Matched(2)).unwrap(),
            r#"{"matched":2}"#
        );
        assert_eq!(
            serde_json::to_string(&FaqMatch::NoMatch).unwrap(),
            "\"no_match\""
        );
    }

    #[test]
    fn test_interview_record_roundtrip() {
        let record = InterviewRecord {
            interview_id: "20250115_103000".to_string(),
            started_at: "2025-01-15T10:30:00+00:00".to_string(),
            candidate_name: "John".to_string(),
            answers: vec![QaPair {
                number: 1,
                question: "Name?".to_string(),
                answer: "John. I am a student".to_string(),
                confidence: 0.7,
                answered_at: "2025-01-15T10:30:20+00:00".to_string(),
            }],
            faq_log: vec![],
            summary: "Candidate summary".to_string(),
            extracted_info: ExtractedInfo::unknown("John"),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: InterviewRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.questions(), vec!["Name?"]);
    }
}
