//! AI feedback gateway
//!
//! Wraps a diary (or a follow-up addition) in a fixed instruction template,
//! sends it to the Gemini `generateContent` REST endpoint, and pulls an
//! encouragement/question pair out of the reply text.
//!
//! The model is asked to answer with a bare JSON object, but replies often
//! carry prose or code fences around it, so the first `{...}` span in the
//! text is what gets parsed. Blank fields fall back to fixed phrases. Any
//! failure is returned whole; there is no partial reply.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;

const DIARY_FEEDBACK_PROMPT: &str = "あなたは小学生の日記に優しくコメントするAIアシスタントです。
児童が書いた日記に対して、以下の2つを日本語で返してください。

重要なルール:
- 「先生」「私」などの1人称は絶対に使わないでください
- 主語を省略するか、「〇〇さん」のように児童の呼びかけを使ってください
- 温かく励ます口調で書いてください

1. 肯定的なフィードバック（80文字以内）
   - 具体的に褒める（例：「すごい発見だね！」「よく気づいたね！」）
   - 努力を認める
   - 子どもが嬉しくなる言葉
   - 日記の内容に触れて共感を示す

2. 深堀りの問い（50文字以内）
   - 感情をより深く聞く
   - 詳細を聞いて思考を促す
   - 次の行動や気づきを促す

必ず以下のJSON形式のみで返答してください（説明文は不要）:
{\"feedback\": \"肯定的なフィードバック\", \"question\": \"深堀りの問い\"}

日記内容:
";

const ADDITION_FEEDBACK_PROMPT: &str = "あなたは小学生の日記に優しくコメントするAIアシスタントです。
児童が日記の追記（質問への回答）を書きました。
この追記に対して、以下の2つを日本語で返してください。

重要なルール:
- 「先生」「私」などの1人称は絶対に使わないでください
- 主語を省略するか、「〇〇さん」のように児童の呼びかけを使ってください
- 温かく励ます口調で書いてください

1. 追記へのフィードバック（80文字以内）
   - 回答してくれたことを褒める（例：「教えてくれてありがとう！」）
   - 内容を具体的に認める
   - さらに考えを深めた点を評価する

2. 次の深堀りの問い（50文字以内）
   - さらに思考を深める質問
   - 別の視点からの問いかけ
   - 成長や学びにつながる問い

必ず以下のJSON形式のみで返答してください（説明文は不要）:
{\"feedback\": \"追記へのフィードバック\", \"question\": \"次の深堀りの問い\"}

";

/// Fallback phrases for a first reply
const DIARY_DEFAULTS: (&str, &str) = ("素敵な日記ですね！", "その時どんな気持ちでしたか？");

/// Fallback phrases for a reply to an addition
const ADDITION_DEFAULTS: (&str, &str) = ("追記してくれてありがとう！", "他に気づいたことはありますか？");

/// Feedback gateway failures
#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("Diary content is required")]
    MissingContent,

    #[error("Original content and addition content are required")]
    MissingAdditionData,

    #[error("No Gemini API key is configured")]
    MissingApiKey,

    #[error("Gemini reply did not contain a usable JSON object: {0}")]
    MalformedReply(String),

    #[error("Gemini returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Gemini request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl FeedbackError {
    /// HTTP status for the forwarding endpoints
    pub fn status_code(&self) -> u16 {
        match self {
            FeedbackError::MissingContent
            | FeedbackError::MissingAdditionData
            | FeedbackError::MissingApiKey => 400,
            _ => 500,
        }
    }

    /// Message shown to the student or teacher
    pub fn user_message(&self) -> &'static str {
        match self {
            FeedbackError::MissingContent => "日記の内容が必要です",
            FeedbackError::MissingAdditionData => "必要なデータが不足しています",
            FeedbackError::MissingApiKey => "Gemini APIキーが設定されていません",
            _ => "フィードバックの生成に失敗しました",
        }
    }
}

/// Request for feedback on a new diary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub api_key: String,
}

impl FeedbackRequest {
    pub fn new(content: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            api_key: api_key.into(),
        }
    }

    fn validate(&self) -> Result<(), FeedbackError> {
        if self.content.trim().is_empty() {
            return Err(FeedbackError::MissingContent);
        }
        if self.api_key.trim().is_empty() {
            return Err(FeedbackError::MissingApiKey);
        }
        Ok(())
    }
}

/// Request for feedback on an addition answering the previous question
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionFeedbackRequest {
    #[serde(default)]
    pub original_content: String,
    #[serde(default)]
    pub previous_question: String,
    #[serde(default)]
    pub addition_content: String,
    #[serde(default)]
    pub api_key: String,
}

impl AdditionFeedbackRequest {
    fn validate(&self) -> Result<(), FeedbackError> {
        if self.original_content.trim().is_empty() || self.addition_content.trim().is_empty() {
            return Err(FeedbackError::MissingAdditionData);
        }
        if self.api_key.trim().is_empty() {
            return Err(FeedbackError::MissingApiKey);
        }
        Ok(())
    }
}

/// Encouragement plus the next question to think about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackReply {
    pub feedback: String,
    pub question: String,
}

/// Prompt for a first reply to a diary
pub fn diary_prompt(content: &str) -> String {
    format!("{}{}", DIARY_FEEDBACK_PROMPT, content)
}

/// Prompt for a reply to an addition
pub fn addition_prompt(original: &str, previous_question: &str, addition: &str) -> String {
    format!(
        "{}元の日記:\n{}\n\n前回の質問:\n{}\n\n児童の追記（回答）:\n{}\n",
        ADDITION_FEEDBACK_PROMPT, original, previous_question, addition
    )
}

static JSON_OBJECT: OnceLock<Option<Regex>> = OnceLock::new();

/// First `{` through last `}`, across lines
fn json_object_pattern() -> Option<&'static Regex> {
    JSON_OBJECT
        .get_or_init(|| Regex::new(r"\{[\s\S]*\}").ok())
        .as_ref()
}

/// Parse the first JSON object in `text`, filling blank fields from `defaults`
fn parse_reply(text: &str, defaults: (&str, &str)) -> Result<FeedbackReply, FeedbackError> {
    let pattern = json_object_pattern()
        .ok_or_else(|| FeedbackError::MalformedReply("invalid JSON pattern".to_string()))?;
    let span = pattern
        .find(text)
        .ok_or_else(|| FeedbackError::MalformedReply("no JSON object found".to_string()))?;

    let value: serde_json::Value = serde_json::from_str(span.as_str())
        .map_err(|e| FeedbackError::MalformedReply(e.to_string()))?;

    let field = |name: &str, default: &str| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    Ok(FeedbackReply {
        feedback: field("feedback", defaults.0),
        question: field("question", defaults.1),
    })
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Client for the Gemini REST API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.gemini_base_url, &config.gemini_model)
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Encouragement and a question for a new diary
    pub async fn diary_feedback(
        &self,
        request: &FeedbackRequest,
    ) -> Result<FeedbackReply, FeedbackError> {
        request.validate()?;
        let text = self
            .generate(&request.api_key, &diary_prompt(&request.content))
            .await?;
        parse_reply(&text, DIARY_DEFAULTS)
    }

    /// Encouragement and a next question for an addition
    pub async fn addition_feedback(
        &self,
        request: &AdditionFeedbackRequest,
    ) -> Result<FeedbackReply, FeedbackError> {
        request.validate()?;
        let prompt = addition_prompt(
            &request.original_content,
            &request.previous_question,
            &request.addition_content,
        );
        let text = self.generate(&request.api_key, &prompt).await?;
        parse_reply(&text, ADDITION_DEFAULTS)
    }

    /// Send one prompt and return the reply text of the first candidate
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, FeedbackError> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "requesting Gemini feedback");
        let response = self
            .client
            .post(self.generate_url())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedbackError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| FeedbackError::MalformedReply(e.to_string()))?;

        let text: String = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(FeedbackError::MalformedReply("empty reply".to_string()));
        }

        info!(model = %self.model, "received Gemini feedback");
        Ok(text)
    }
}
