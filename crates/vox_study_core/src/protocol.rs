//! crates/vox_study_core/src/protocol.rs
//!
//! Defines the JSON payloads exchanged with the study backend.
//! Field names match the wire format exactly.

use crate::domain::Page;
use serde::{Deserialize, Serialize};

//=========================================================================================
// Documents and Pages
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub doc_id: String,
    pub name: String,
    pub page_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagesResponse {
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationResponse {
    pub page_id: u32,
    pub explanation: String,
}

//=========================================================================================
// Question Answering
//=========================================================================================

/// Body of `POST /qa/{doc_id}/qa`. Unset optional fields are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl QaRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            k: None,
            page_id: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub page_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaResponse {
    pub answer: String,
    #[serde(default)]
    pub citations: Option<Vec<Citation>>,
    #[serde(default)]
    pub used_contexts: Option<Vec<String>>,
}

impl QaResponse {
    /// Cited page ids, empty when the backend sent none.
    pub fn citation_pages(&self) -> Vec<u32> {
        self.citations
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|c| c.page_id)
            .collect()
    }
}

//=========================================================================================
// Study Aids
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardItem {
    pub q: String,
    pub a: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardsResponse {
    pub items: Vec<FlashcardItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub items: Vec<QuizItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheatsheetResponse {
    /// Markdown.
    pub content: String,
}

//=========================================================================================
// Media
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub text: String,
}

//=========================================================================================
// Errors
//=========================================================================================

/// Body of a non-2xx response. `detail` is a string for application errors and
/// a list of objects for request validation failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::String(_) | serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn qa_request_omits_unset_fields() {
        let mut request = QaRequest::new("What is entropy?");
        request.k = Some(3);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({ "question": "What is entropy?", "k": 3 }));
    }

    #[test]
    fn qa_response_tolerates_missing_citations() {
        let response: QaResponse = serde_json::from_str(r#"{"answer":"42"}"#).unwrap();
        assert!(response.citation_pages().is_empty());

        let response: QaResponse =
            serde_json::from_str(r#"{"answer":"42","citations":[{"page_id":2},{"page_id":5}]}"#).unwrap();
        assert_eq!(response.citation_pages(), vec![2, 5]);
    }

    #[test]
    fn quiz_without_options_is_rejected() {
        let result = serde_json::from_str::<QuizResponse>(r#"{"items":[{"question":"q","answer":"a"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn error_body_prefers_string_detail() {
        let body: ErrorBody = serde_json::from_str(r#"{"detail":"server error"}"#).unwrap();
        assert_eq!(body.message().as_deref(), Some("server error"));

        let body: ErrorBody = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert_eq!(body.message(), None);
    }
}
