//! Status command handler

use anyhow::Result;

use crate::commands::App;
use crate::output::{Output, OutputFormat};

/// Show login, storage, and service status
pub fn show(app: &App, output: &Output) -> Result<()> {
    let stats = app.store.stats();
    let session = app.session.current()?;
    let settings = app.settings.get()?;
    let diary_count = app.diaries.count()?;
    let student_count = app.session.registered_users()?.len();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "session": session,
                    "storage": {
                        "data_dir": app.config.data_dir,
                        "keys_present": stats.keys_present,
                        "total_size": stats.total_size
                    },
                    "counts": {
                        "diaries": diary_count,
                        "students": student_count
                    },
                    "services": {
                        "gemini": settings.has_gemini_key(),
                        "spreadsheet": settings.has_spreadsheet_id(),
                        "apps_script": settings.has_apps_script_url()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            if let Some(ref user) = session {
                println!("{}", user.name);
            }
        }
        OutputFormat::Human => {
            let enabled = |on: bool| if on { "configured" } else { "not configured" };

            println!("Classroom Diary Status");
            println!("======================");
            println!();
            println!("Session:");
            match session {
                Some(ref user) => println!("  {} ({})", user.name, user.role),
                None => println!("  Not logged in"),
            }
            println!();
            println!("Storage:");
            println!("  Location: {}", app.config.data_dir.display());
            println!("  Size:     {}", stats.total_size_human());
            println!();
            println!("Contents:");
            println!("  Diaries:  {}", diary_count);
            println!("  Students: {}", student_count);
            println!();
            println!("Services:");
            println!("  Gemini:      {}", enabled(settings.has_gemini_key()));
            println!("  Spreadsheet: {}", enabled(settings.has_spreadsheet_id()));
            println!("  Apps Script: {}", enabled(settings.has_apps_script_url()));
        }
    }

    Ok(())
}
