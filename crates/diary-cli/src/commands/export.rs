//! Export command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;

use diary_core::export::ALL_SCOPE;
use diary_core::{export_filename, group_by_student, view, write_csv_file, DiaryRecord, SortOrder};

use crate::commands::App;
use crate::output::{Output, OutputFormat};

/// Options for `diary export csv`
#[derive(Debug, Clone, Default)]
pub struct CsvExportOptions {
    pub student: Option<String>,
    pub query: Option<String>,
    pub order: SortOrder,
    pub out: Option<PathBuf>,
    pub per_student: bool,
}

/// Export diaries to CSV files
///
/// Teachers export everyone (or one student with `--student`); students
/// export only their own diaries. Returns the written paths.
pub fn csv(app: &App, options: CsvExportOptions, output: &Output) -> Result<Vec<PathBuf>> {
    let user = app.logged_in()?;

    let (scope, diaries) = if user.is_teacher() {
        match options.student {
            Some(ref name) => {
                let name = name.trim().to_string();
                let diaries: Vec<_> = app
                    .diaries
                    .list_all()?
                    .into_iter()
                    .filter(|d| d.user_name == name)
                    .collect();
                (name, diaries)
            }
            None => (ALL_SCOPE.to_string(), app.diaries.list_all()?),
        }
    } else {
        if options.student.as_deref().is_some_and(|s| s.trim() != user.name) {
            bail!("Students can only export their own diaries");
        }
        (user.name.clone(), app.diaries.list_by_user(user.id)?)
    };

    let diaries = view(&diaries, options.query.as_deref().unwrap_or(""), options.order);
    if diaries.is_empty() {
        bail!("No diaries to export");
    }

    let out_dir = options.out.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

    let written = if options.per_student {
        group_by_student(&diaries)
            .into_iter()
            .map(|(name, group)| write_scope(&out_dir, &name, &group))
            .collect::<Result<Vec<_>>>()?
    } else {
        vec![write_scope(&out_dir, &scope, &diaries)?]
    };

    match output.format {
        OutputFormat::Json => output.print_json(&written),
        OutputFormat::Quiet => {
            for path in &written {
                println!("{}", path.display());
            }
        }
        OutputFormat::Human => {
            for path in &written {
                output.success(&format!("Exported {}", path.display()));
            }
        }
    }

    Ok(written)
}

fn write_scope(out_dir: &Path, scope: &str, diaries: &[DiaryRecord]) -> Result<PathBuf> {
    let path = out_dir.join(export_filename(scope, Local::now().date_naive()));
    write_csv_file(&path, diaries)?;
    Ok(path)
}
