//! Diary command handlers
//!
//! Students write, edit, and extend their own diaries; teachers read every
//! diary and leave comments. AI feedback and spreadsheet sync run after the
//! local save and never undo it.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::warn;

use diary_core::{
    view, AdditionFeedbackRequest, DiaryDraft, DiaryImage, DiaryPatch, DiaryRecord,
    FeedbackRequest, GeminiClient, NewAddition, NewTeacherComment, SortOrder,
    SpreadsheetClient, SpreadsheetSyncRequest, SyncStatus,
};

use crate::commands::App;
use crate::editor::{confirm, edit_text, value_or_prompt};
use crate::output::Output;

const NEW_DIARY_TEMPLATE: &str = "\n# Write today's diary above.\n# Lines starting with # are ignored.\n";

/// Write a new diary, then request AI feedback and sync it to the spreadsheet
///
/// Both follow-ups are best-effort; the saved diary is kept either way.
pub async fn create(
    app: &App,
    title: Option<String>,
    content: Option<String>,
    images: Vec<PathBuf>,
    output: &Output,
) -> Result<()> {
    let user = app.session.require_student()?;

    let title = value_or_prompt(title, "Title")?;
    let content = match content {
        Some(c) => c,
        None => edit_text(NEW_DIARY_TEMPLATE).context("Failed to edit diary")?,
    };

    let images = images
        .iter()
        .map(|path| DiaryImage::from_path(path))
        .collect::<Result<Vec<_>, _>>()?;

    let draft = DiaryDraft::new(user.id, &user.name, title, content).with_images(images);
    let diary = app.diaries.create(draft).context("Failed to save diary")?;

    output.success(&format!(
        "Saved diary {} - {}",
        &diary.id.to_string()[..8],
        diary.title
    ));

    let diary = request_initial_feedback(app, diary, output).await;
    sync_to_spreadsheet(app, &diary, output).await;
    Ok(())
}

/// Attach first feedback to a saved diary when a Gemini key is configured
async fn request_initial_feedback(app: &App, diary: DiaryRecord, output: &Output) -> DiaryRecord {
    let api_key = match app.settings.get() {
        Ok(settings) => match settings.gemini_api_key {
            Some(key) => key,
            None => return diary,
        },
        Err(e) => {
            warn!(error = %e, "could not read settings for diary feedback");
            return diary;
        }
    };

    let request = FeedbackRequest::new(&diary.content, api_key);
    let reply = match GeminiClient::from_config(&app.config)
        .diary_feedback(&request)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(id = %diary.id, error = %e, "diary feedback failed");
            output.warn(e.user_message());
            return diary;
        }
    };

    match app
        .diaries
        .attach_feedback(diary.id, reply.feedback, reply.question)
    {
        Ok(Some(updated)) => {
            output.print_diary(&updated);
            updated
        }
        Ok(None) => diary,
        Err(e) => {
            warn!(id = %diary.id, error = %e, "could not store diary feedback");
            diary
        }
    }
}

/// Best-effort push of a saved diary to the Apps Script endpoint
///
/// Records the outcome in `sync_status`; failures are only reported.
async fn sync_to_spreadsheet(app: &App, diary: &DiaryRecord, output: &Output) {
    let script_url = match app.settings.get() {
        Ok(settings) => match settings.apps_script_url {
            Some(url) => url,
            None => return,
        },
        Err(e) => {
            warn!(error = %e, "could not read settings for spreadsheet sync");
            return;
        }
    };

    let request = SpreadsheetSyncRequest::for_diary(script_url, diary);
    let status = match SpreadsheetClient::new().sync(&request).await {
        Ok(()) => SyncStatus::Synced,
        Err(e) => {
            warn!(id = %diary.id, error = %e, "spreadsheet sync failed");
            output.warn(&format!("Spreadsheet sync failed: {}", e.user_message()));
            SyncStatus::Error
        }
    };

    if let Err(e) = app.diaries.set_sync_status(diary.id, status) {
        warn!(id = %diary.id, error = %e, "could not record sync status");
    }
}

/// List diaries: a student's own, or everyone's for a teacher
pub fn list(
    app: &App,
    query: Option<String>,
    order: SortOrder,
    all: bool,
    output: &Output,
) -> Result<()> {
    let user = app.logged_in()?;

    let diaries = if user.is_teacher() {
        app.diaries.list_all()?
    } else if all {
        bail!("Listing every student's diaries requires a teacher login");
    } else {
        app.diaries.list_by_user(user.id)?
    };

    let shown = view(&diaries, query.as_deref().unwrap_or(""), order);
    output.print_diaries(&shown);
    Ok(())
}

pub fn show(app: &App, id: String, output: &Output) -> Result<()> {
    let (_, diary) = app.visible_diary(&id)?;
    output.print_diary(&diary);
    Ok(())
}

/// Edit title and content of one's own diary
pub fn edit(
    app: &App,
    id: String,
    title: Option<String>,
    content: Option<String>,
    output: &Output,
) -> Result<()> {
    let (_, diary) = app.own_diary(&id)?;

    let patch = if title.is_none() && content.is_none() {
        let initial = format!(
            "{}\n# Editing: {}\n# Lines starting with # are ignored.\n",
            diary.content, diary.title
        );
        DiaryPatch::content(edit_text(&initial).context("Failed to edit diary")?)
    } else {
        DiaryPatch {
            title,
            content,
            ..DiaryPatch::default()
        }
    };

    if app.diaries.update(diary.id, patch)?.is_none() {
        bail!("Diary not found: {}", id);
    }

    output.success(&format!("Updated diary {}", &diary.id.to_string()[..8]));
    Ok(())
}

/// Delete a diary (its author or a teacher)
pub fn delete(app: &App, id: String, output: &Output) -> Result<()> {
    let (_, diary) = app.visible_diary(&id)?;

    if output.should_prompt() {
        println!(
            "Delete diary: {} - {} ({})",
            &diary.id.to_string()[..8],
            diary.title,
            diary.user_name
        );
        if !confirm("Are you sure?")? {
            output.message("Cancelled.");
            return Ok(());
        }
    }

    if !app.diaries.delete(diary.id)? {
        bail!("Diary not found: {}", id);
    }

    output.success(&format!("Deleted diary: {}", &diary.id.to_string()[..8]));
    Ok(())
}

/// Append an addition answering the current AI question, then ask for
/// follow-up feedback when a Gemini key is configured
pub async fn add(app: &App, id: String, content: Option<String>, output: &Output) -> Result<()> {
    let (_, diary) = app.own_diary(&id)?;
    let question = diary.current_question().unwrap_or_default().to_string();

    let content = match content {
        Some(c) => c,
        None => {
            let initial = if question.is_empty() {
                "\n# Add to your diary above.\n".to_string()
            } else {
                format!("\n# Question: {}\n# Write your answer above.\n", question)
            };
            edit_text(&initial).context("Failed to edit addition")?
        }
    };

    let updated = app
        .diaries
        .append_addition(diary.id, NewAddition::new(&content, &question))?
        .ok_or_else(|| anyhow::anyhow!("Diary not found: {}", id))?;

    output.success(&format!(
        "Added to diary {} ({} addition(s))",
        &diary.id.to_string()[..8],
        updated.additions.len()
    ));

    let settings = app.settings.get()?;
    let Some(api_key) = settings.gemini_api_key else {
        return Ok(());
    };

    let request = AdditionFeedbackRequest {
        original_content: updated.content.clone(),
        previous_question: question,
        addition_content: content.trim().to_string(),
        api_key,
    };

    match GeminiClient::from_config(&app.config)
        .addition_feedback(&request)
        .await
    {
        Ok(reply) => {
            if let Some(diary) =
                app.diaries
                    .attach_feedback(updated.id, reply.feedback, reply.question)?
            {
                output.print_diary(&diary);
            }
        }
        Err(e) => {
            warn!(id = %updated.id, error = %e, "addition feedback failed");
            output.warn(e.user_message());
        }
    }

    Ok(())
}

/// Leave a teacher comment on a diary
pub fn comment(app: &App, id: String, content: Option<String>, output: &Output) -> Result<()> {
    let teacher = app.session.require_teacher()?;
    let diary = app.find_diary(&id)?;

    let content = match content {
        Some(c) => c,
        None => {
            let initial = format!(
                "\n# Comment on: {} ({})\n# Lines starting with # are ignored.\n",
                diary.title, diary.user_name
            );
            edit_text(&initial).context("Failed to edit comment")?
        }
    };

    app.diaries
        .append_teacher_comment(
            diary.id,
            NewTeacherComment::new(teacher.id, &teacher.name, content),
        )?
        .ok_or_else(|| anyhow::anyhow!("Diary not found: {}", id))?;

    output.success(&format!("Commented on diary {}", &diary.id.to_string()[..8]));
    Ok(())
}

/// Generate AI feedback for a diary and attach it
pub async fn feedback(app: &App, id: String, output: &Output) -> Result<()> {
    let (_, diary) = app.visible_diary(&id)?;

    let settings = app.settings.get()?;
    let request = FeedbackRequest::new(&diary.content, settings.gemini_api_key.unwrap_or_default());

    let reply = GeminiClient::from_config(&app.config)
        .diary_feedback(&request)
        .await
        .map_err(|e| {
            warn!(id = %diary.id, error = %e, "diary feedback failed");
            anyhow::anyhow!("{}", e.user_message())
        })?;

    let updated = app
        .diaries
        .attach_feedback(diary.id, reply.feedback, reply.question)?
        .ok_or_else(|| anyhow::anyhow!("Diary not found: {}", id))?;

    output.print_diary(&updated);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_app;
    use crate::output::OutputFormat;
    use diary_core::AppSettings;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[tokio::test]
    async fn test_create_requires_student() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);

        let result = create(&app, Some("T".into()), Some("C".into()), vec![], &quiet()).await;
        assert!(result.is_err());
        assert_eq!(app.diaries.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_without_script_url_stays_pending() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        app.session.register_and_login("Aoi", "1234").unwrap();

        create(&app, Some("遠足".into()), Some("楽しかった".into()), vec![], &quiet())
            .await
            .unwrap();

        let diaries = app.diaries.list_all().unwrap();
        assert_eq!(diaries.len(), 1);
        assert_eq!(diaries[0].sync_status, SyncStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_syncs_to_spreadsheet() {
        let script = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exec"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&script)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        app.session.register_and_login("Aoi", "1234").unwrap();
        app.settings
            .update(AppSettings {
                apps_script_url: Some(format!("{}/exec", script.uri())),
                ..AppSettings::default()
            })
            .unwrap();

        create(&app, Some("遠足".into()), Some("楽しかった".into()), vec![], &quiet())
            .await
            .unwrap();

        let diaries = app.diaries.list_all().unwrap();
        assert_eq!(diaries[0].sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_diary() {
        let script = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&script)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        app.session.register_and_login("Aoi", "1234").unwrap();
        app.settings
            .set_field("apps_script_url", &script.uri())
            .unwrap();

        create(&app, Some("遠足".into()), Some("楽しかった".into()), vec![], &quiet())
            .await
            .unwrap();

        let diaries = app.diaries.list_all().unwrap();
        assert_eq!(diaries.len(), 1);
        assert_eq!(diaries[0].sync_status, SyncStatus::Error);
    }

    #[tokio::test]
    async fn test_create_requests_feedback_when_key_is_set() {
        let gemini = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{
                    "text": "{\"feedback\": \"よく気づいたね！\", \"question\": \"次はどこへ行きたい？\"}"
                }]}}]
            })))
            .expect(1)
            .mount(&gemini)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let mut config = diary_core::Config::with_data_dir(temp_dir.path());
        config.gemini_base_url = gemini.uri();
        let app = App::new(config);
        app.session.register_and_login("Aoi", "1234").unwrap();
        app.settings.set_field("gemini_api_key", "test-key").unwrap();

        create(&app, Some("遠足".into()), Some("楽しかった".into()), vec![], &quiet())
            .await
            .unwrap();

        let diaries = app.diaries.list_all().unwrap();
        let ai = diaries[0].ai_feedback.as_ref().unwrap();
        assert_eq!(ai.feedback, "よく気づいたね！");
        assert_eq!(diaries[0].current_question(), Some("次はどこへ行きたい？"));
    }

    #[tokio::test]
    async fn test_create_keeps_diary_when_feedback_fails() {
        let gemini = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&gemini)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let mut config = diary_core::Config::with_data_dir(temp_dir.path());
        config.gemini_base_url = gemini.uri();
        let app = App::new(config);
        app.session.register_and_login("Aoi", "1234").unwrap();
        app.settings.set_field("gemini_api_key", "test-key").unwrap();

        create(&app, Some("遠足".into()), Some("楽しかった".into()), vec![], &quiet())
            .await
            .unwrap();

        let diaries = app.diaries.list_all().unwrap();
        assert_eq!(diaries.len(), 1);
        assert!(diaries[0].ai_feedback.is_none());
    }

    #[test]
    fn test_list_all_requires_teacher() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        app.session.register_and_login("Aoi", "1234").unwrap();

        assert!(list(&app, None, SortOrder::Newest, false, &quiet()).is_ok());
        assert!(list(&app, None, SortOrder::Newest, true, &quiet()).is_err());

        app.session.teacher_login("Sato", "teacher2024").unwrap();
        assert!(list(&app, None, SortOrder::Newest, true, &quiet()).is_ok());
    }

    #[test]
    fn test_edit_and_comment() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        let user = app.session.register_and_login("Aoi", "1234").unwrap();
        let diary = app
            .diaries
            .create(DiaryDraft::new(user.id, &user.name, "遠足", "楽しかった"))
            .unwrap();
        let id = diary.id.to_string();

        edit(&app, id.clone(), Some("山登り".into()), None, &quiet()).unwrap();
        assert_eq!(app.diaries.get_by_id(diary.id).unwrap().unwrap().title, "山登り");

        // Students cannot comment
        assert!(comment(&app, id.clone(), Some("いいね".into()), &quiet()).is_err());

        app.session.teacher_login("Sato", "teacher2024").unwrap();
        comment(&app, id, Some("よく書けました".into()), &quiet()).unwrap();

        let stored = app.diaries.get_by_id(diary.id).unwrap().unwrap();
        assert_eq!(stored.teacher_comments.len(), 1);
        assert_eq!(stored.teacher_comments[0].teacher_name, "Sato");
    }

    #[tokio::test]
    async fn test_add_without_key_only_appends() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        let user = app.session.register_and_login("Aoi", "1234").unwrap();
        let diary = app
            .diaries
            .create(DiaryDraft::new(user.id, &user.name, "遠足", "楽しかった"))
            .unwrap();
        app.diaries
            .attach_feedback(diary.id, "いいね！", "何が一番楽しかった？")
            .unwrap();

        add(&app, diary.id.to_string(), Some("お弁当".into()), &quiet())
            .await
            .unwrap();

        let stored = app.diaries.get_by_id(diary.id).unwrap().unwrap();
        assert_eq!(stored.additions.len(), 1);
        assert_eq!(stored.additions[0].content, "お弁当");
        assert_eq!(stored.additions[0].question_context, "何が一番楽しかった？");
    }

    #[tokio::test]
    async fn test_feedback_attaches_reply() {
        let gemini = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{
                    "text": "{\"feedback\": \"すてき！\", \"question\": \"誰と行ったの？\"}"
                }]}}]
            })))
            .mount(&gemini)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let mut config = diary_core::Config::with_data_dir(temp_dir.path());
        config.gemini_base_url = gemini.uri();
        let app = App::new(config);

        let user = app.session.register_and_login("Aoi", "1234").unwrap();
        app.settings.set_field("gemini_api_key", "test-key").unwrap();
        let diary = app
            .diaries
            .create(DiaryDraft::new(user.id, &user.name, "遠足", "楽しかった"))
            .unwrap();

        feedback(&app, diary.id.to_string(), &quiet()).await.unwrap();

        let stored = app.diaries.get_by_id(diary.id).unwrap().unwrap();
        let ai = stored.ai_feedback.unwrap();
        assert_eq!(ai.feedback, "すてき！");
        assert_eq!(ai.question, "誰と行ったの？");
    }

    #[tokio::test]
    async fn test_feedback_without_key_fails() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        let user = app.session.register_and_login("Aoi", "1234").unwrap();
        let diary = app
            .diaries
            .create(DiaryDraft::new(user.id, &user.name, "遠足", "楽しかった"))
            .unwrap();

        let err = feedback(&app, diary.id.to_string(), &quiet()).await.unwrap_err();
        assert_eq!(err.to_string(), "Gemini APIキーが設定されていません");
        assert!(app
            .diaries
            .get_by_id(diary.id)
            .unwrap()
            .unwrap()
            .ai_feedback
            .is_none());
    }
}
