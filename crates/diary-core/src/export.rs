//! CSV export of diaries
//!
//! One row per diary in the order given; callers filter and sort first.
//! Fields are quoted only when they contain a comma, quote, or newline,
//! so output round-trips through any conformant CSV reader. Files written
//! to disk start with a UTF-8 byte-order mark so spreadsheet importers
//! detect the encoding.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use thiserror::Error;
use tracing::info;

use crate::models::DiaryRecord;

/// Column headers: date, student, title, content, additions, AI feedback,
/// AI question, teacher comments
pub const CSV_HEADER: [&str; 8] = [
    "日付",
    "児童名",
    "タイトル",
    "内容",
    "追記",
    "AIフィードバック",
    "AI質問",
    "先生コメント",
];

/// Filename scope used when exporting every student
pub const ALL_SCOPE: &str = "日記一覧";

/// Separator between entries of a multi-valued column
const JOIN_SEPARATOR: &str = " / ";

const BOM: &str = "\u{FEFF}";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output was not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render diaries as CSV text (no byte-order mark)
pub fn to_csv(diaries: &[DiaryRecord]) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for diary in diaries {
        writer.write_record(row(diary))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8(bytes)?)
}

fn row(diary: &DiaryRecord) -> [String; 8] {
    let additions = diary
        .additions
        .iter()
        .map(|a| a.content.as_str())
        .collect::<Vec<_>>()
        .join(JOIN_SEPARATOR);

    let comments = diary
        .teacher_comments
        .iter()
        .map(|c| format!("{}先生: {}", c.teacher_name, c.content))
        .collect::<Vec<_>>()
        .join(JOIN_SEPARATOR);

    let (feedback, question) = match diary.ai_feedback {
        Some(ref f) => (f.feedback.clone(), f.question.clone()),
        None => (String::new(), String::new()),
    };

    [
        diary
            .created_at
            .with_timezone(&Local)
            .format("%Y/%m/%d")
            .to_string(),
        diary.user_name.clone(),
        diary.title.clone(),
        diary.content.clone(),
        additions,
        feedback,
        question,
        comments,
    ]
}

/// `{scope}_{yyyyMMdd}.csv`, with path separators in the scope replaced
pub fn export_filename(scope: &str, date: NaiveDate) -> String {
    let scope: String = scope
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{}_{}.csv", scope, date.format("%Y%m%d"))
}

/// Write BOM-prefixed CSV to `path`
pub fn write_csv_file(path: &Path, diaries: &[DiaryRecord]) -> Result<(), ExportError> {
    let mut text = String::from(BOM);
    text.push_str(&to_csv(diaries)?);

    fs::write(path, text).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), rows = diaries.len(), "exported CSV");
    Ok(())
}
