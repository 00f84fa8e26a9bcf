//! Spreadsheet sync through a Google Apps Script web app
//!
//! The teacher deploys a script that appends a row per posted diary; this
//! client only forwards `{name, date, title, content}` to its URL. One
//! attempt per call, no retry.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::models::DiaryRecord;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No Apps Script URL is configured")]
    MissingScriptUrl,

    #[error("Apps Script returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Apps Script request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl SyncError {
    /// HTTP status for the forwarding endpoint; upstream rejections keep
    /// the upstream status
    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::MissingScriptUrl => 400,
            SyncError::Rejected { status, .. } => *status,
            SyncError::Http(_) => 500,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            SyncError::MissingScriptUrl => "Apps Script URLが設定されていません".to_string(),
            SyncError::Rejected { body, .. } => format!("送信に失敗しました: {}", body),
            SyncError::Http(_) => "スプレッドシートへの送信に失敗しました".to_string(),
        }
    }
}

/// One diary row to append to the spreadsheet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetSyncRequest {
    #[serde(default)]
    pub script_url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl SpreadsheetSyncRequest {
    /// Row for `diary`, dated in local time
    pub fn for_diary(script_url: impl Into<String>, diary: &DiaryRecord) -> Self {
        Self {
            script_url: script_url.into(),
            name: diary.user_name.clone(),
            date: diary
                .created_at
                .with_timezone(&chrono::Local)
                .format("%Y/%m/%d %H:%M:%S")
                .to_string(),
            title: diary.title.clone(),
            content: diary.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ScriptPayload<'a> {
    name: &'a str,
    date: &'a str,
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct SpreadsheetClient {
    client: Client,
}

impl SpreadsheetClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// POST the row to the script URL
    pub async fn sync(&self, request: &SpreadsheetSyncRequest) -> Result<(), SyncError> {
        let url = request.script_url.trim();
        if url.is_empty() {
            return Err(SyncError::MissingScriptUrl);
        }

        let payload = ScriptPayload {
            name: &request.name,
            date: &request.date,
            title: &request.title,
            content: &request.content,
        };

        let response = self.client.post(url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(name = %request.name, title = %request.title, "synced diary to spreadsheet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(script_url: String) -> SpreadsheetSyncRequest {
        SpreadsheetSyncRequest {
            script_url,
            name: "Aoi".to_string(),
            date: "2024-06-01T12:00:00+00:00".to_string(),
            title: "遠足".to_string(),
            content: "楽しかった".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sync_posts_row_without_script_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exec"))
            .and(body_json(json!({
                "name": "Aoi",
                "date": "2024-06-01T12:00:00+00:00",
                "title": "遠足",
                "content": "楽しかった",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = SpreadsheetClient::new();
        client
            .sync(&request(format!("{}/exec", server.uri())))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejection_carries_upstream_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = SpreadsheetClient::new()
            .sync(&request(format!("{}/exec", server.uri())))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 403);
        assert_eq!(err.user_message(), "送信に失敗しました: forbidden");
    }

    #[tokio::test]
    async fn test_missing_url() {
        let err = SpreadsheetClient::new()
            .sync(&request("  ".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingScriptUrl));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_for_diary() {
        use crate::models::DiaryDraft;

        let diary = DiaryRecord::from_draft(DiaryDraft::new(
            uuid::Uuid::new_v4(),
            "Aoi",
            "遠足",
            "楽しかった",
        ));
        let request = SpreadsheetSyncRequest::for_diary("https://x", &diary);
        assert_eq!(request.name, "Aoi");
        assert_eq!(request.title, "遠足");
        assert_eq!(request.content, "楽しかった");
        assert_eq!(request.date.len(), "2024/06/01 12:00:00".len());
    }

    #[test]
    fn test_request_json_is_camel_case() {
        let value = serde_json::to_value(request("https://x".to_string())).unwrap();
        assert_eq!(value["scriptUrl"], "https://x");
    }
}
