//! services/client/src/adapters/http.rs
//!
//! This module contains the HTTP adapter for the study backend.
//! It implements the `StudyApi` port from the `core` crate on top of `reqwest`.

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use tracing::{debug, warn};
use vox_study_core::domain::{AudioClip, FileUpload};
use vox_study_core::ports::{PortError, PortResult, StudyApi};
use vox_study_core::protocol::{
    CheatsheetResponse, ErrorBody, ExplanationResponse, FlashcardsResponse, PagesResponse, QaRequest, QaResponse,
    QuizResponse, TranscriptResponse, TtsRequest, UploadResponse,
};

/// Content type assumed for TTS audio when the backend does not send one.
const DEFAULT_AUDIO_TYPE: &str = "audio/mpeg";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `StudyApi` port against the backend's REST API.
#[derive(Clone, Debug)]
pub struct HttpStudyApi {
    client: Client,
    base_url: String,
}

impl HttpStudyApi {
    /// Creates a new `HttpStudyApi` for `base_url` (no trailing slash).
    ///
    /// No request timeout is configured; each call waits for the backend.
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Direct link to a rendered page image.
    pub fn page_image_url(&self, doc_id: &str, page_id: u32) -> String {
        self.url(&format!("/pages/{doc_id}/pages/{page_id}/image"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Adds `?model=` when a model is given.
    fn with_model(request: RequestBuilder, model: Option<&str>) -> RequestBuilder {
        match model {
            Some(model) => request.query(&[("model", model)]),
            None => request,
        }
    }

    /// Sends a request once and turns non-2xx responses into a `PortError`.
    async fn send(&self, operation: &'static str, request: RequestBuilder) -> PortResult<Response> {
        let response = request.send().await.map_err(|e| {
            warn!(operation, error = %e, "Request to study backend failed.");
            PortError::transport(format!("{operation} failed: could not reach the study backend ({e})"))
        })?;

        let status = response.status();
        debug!(operation, status = status.as_u16(), "Study backend responded.");
        if status.is_success() {
            Ok(response)
        } else {
            Err(error_from_response(operation, response).await)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &'static str, request: RequestBuilder) -> PortResult<T> {
        let response = self.send(operation, request).await?;
        read_json(operation, response).await
    }
}

//=========================================================================================
// Response Helpers
//=========================================================================================

fn document_not_found_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bdocument\b.*\bnot\s+found\b").expect("valid regex"))
}

/// Builds the normalized error for a non-2xx response.
///
/// A JSON `detail` becomes the message. 404s and details reporting a missing
/// document are classified as `DocumentNotFound`.
async fn error_from_response(operation: &'static str, response: Response) -> PortError {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    let detail = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message());

    let not_found = status == StatusCode::NOT_FOUND
        || detail
            .as_deref()
            .is_some_and(|d| document_not_found_pattern().is_match(d));
    let message = detail.unwrap_or_else(|| format!("{operation} failed (HTTP {})", status.as_u16()));

    warn!(operation, status = status.as_u16(), message = %message, "Study backend returned an error.");
    if not_found {
        PortError::document_not_found(message).with_status(status.as_u16())
    } else {
        PortError::http(status.as_u16(), message)
    }
}

async fn read_json<T: DeserializeOwned>(operation: &'static str, response: Response) -> PortResult<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| PortError::transport(format!("{operation} failed while reading the response ({e})")))?;
    serde_json::from_slice(&body)
        .map_err(|e| PortError::decode(format!("{operation} returned an unexpected response: {e}")))
}

fn file_part(file: FileUpload) -> PortResult<multipart::Part> {
    multipart::Part::bytes(file.bytes.to_vec())
        .file_name(file.file_name)
        .mime_str(&file.content_type)
        .map_err(|e| PortError::invalid_input(format!("Invalid content type '{}': {e}", file.content_type)))
}

//=========================================================================================
// `StudyApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyApi for HttpStudyApi {
    async fn upload(&self, file: FileUpload, name: Option<&str>) -> PortResult<UploadResponse> {
        debug!(file = %file.file_name, bytes = file.bytes.len(), "Uploading document.");
        let mut form = multipart::Form::new().part("file", file_part(file)?);
        if let Some(name) = name {
            form = form.text("name", name.to_string());
        }
        let request = self.client.post(self.url("/ingest/upload")).multipart(form);
        self.get_json("Upload", request).await
    }

    async fn list_pages(&self, doc_id: &str) -> PortResult<PagesResponse> {
        let request = self.client.get(self.url(&format!("/pages/{doc_id}/pages")));
        self.get_json("Listing pages", request).await
    }

    async fn page_image(&self, doc_id: &str, page_id: u32) -> PortResult<Bytes> {
        let request = self.client.get(self.page_image_url(doc_id, page_id));
        let response = self.send("Page image", request).await?;
        response
            .bytes()
            .await
            .map_err(|e| PortError::transport(format!("Page image failed while reading the response ({e})")))
    }

    async fn explain_page(
        &self,
        doc_id: &str,
        page_id: u32,
        model: Option<&str>,
    ) -> PortResult<ExplanationResponse> {
        let request = self
            .client
            .get(self.url(&format!("/pages/{doc_id}/pages/{page_id}/explain")));
        self.get_json("Explanation", Self::with_model(request, model)).await
    }

    async fn ask(&self, doc_id: &str, request: &QaRequest) -> PortResult<QaResponse> {
        let request = self.client.post(self.url(&format!("/qa/{doc_id}/qa"))).json(request);
        self.get_json("Question", request).await
    }

    async fn flashcards(&self, doc_id: &str, page_id: u32, model: Option<&str>) -> PortResult<FlashcardsResponse> {
        let request = self
            .client
            .get(self.url(&format!("/study/{doc_id}/pages/{page_id}/flashcards")));
        self.get_json("Flashcards", Self::with_model(request, model)).await
    }

    async fn quiz(&self, doc_id: &str, page_id: u32, model: Option<&str>) -> PortResult<QuizResponse> {
        let request = self
            .client
            .get(self.url(&format!("/study/{doc_id}/pages/{page_id}/quiz")));
        self.get_json("Quiz", Self::with_model(request, model)).await
    }

    async fn cheatsheet(&self, doc_id: &str, page_id: u32, model: Option<&str>) -> PortResult<CheatsheetResponse> {
        let request = self
            .client
            .get(self.url(&format!("/study/{doc_id}/pages/{page_id}/cheatsheet")));
        self.get_json("Cheatsheet", Self::with_model(request, model)).await
    }

    async fn text_to_speech(&self, text: &str) -> PortResult<AudioClip> {
        let request = self.client.post(self.url("/media/tts")).json(&TtsRequest {
            text: text.to_string(),
        });
        let response = self.send("Text-to-speech", request).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("audio/"))
            .unwrap_or_else(|| DEFAULT_AUDIO_TYPE.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PortError::transport(format!("Text-to-speech failed while reading the response ({e})")))?;
        Ok(AudioClip::new(bytes, content_type))
    }

    async fn speech_to_text(&self, audio: FileUpload) -> PortResult<TranscriptResponse> {
        let form = multipart::Form::new().part("audio", file_part(audio)?);
        let request = self.client.post(self.url("/media/stt")).multipart(form);
        self.get_json("Speech-to-text", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_urls_without_double_slashes() {
        let api = HttpStudyApi::new("http://localhost:8000/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(
            api.page_image_url("abc", 0),
            "http://localhost:8000/pages/abc/pages/0/image"
        );
    }

    #[test]
    fn recognizes_missing_document_details() {
        let pattern = document_not_found_pattern();
        assert!(pattern.is_match("Document not found"));
        assert!(pattern.is_match("document abc123 not found"));
        assert!(!pattern.is_match("Page not found"));
    }
}
