//! Settings command handlers
//!
//! External-service settings shared by the classroom. Anyone logged in can
//! view them (with the API key masked); only a teacher can change them.

use anyhow::{bail, Result};

use diary_core::settings::{mask_secret, SETTING_KEYS};

use crate::commands::App;
use crate::output::{Output, OutputFormat};

pub fn show(app: &App, output: &Output) -> Result<()> {
    app.logged_in()?;
    let settings = app.settings.get()?;
    let masked_key = settings.gemini_api_key.as_deref().map(mask_secret);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "gemini_api_key": masked_key,
                    "spreadsheet_id": settings.spreadsheet_id,
                    "spreadsheet_url": settings.spreadsheet_url,
                    "apps_script_url": settings.apps_script_url,
                })
            );
        }
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            let or_unset = |v: Option<&str>| v.unwrap_or("(not set)").to_string();
            println!("Settings:");
            println!("  gemini_api_key:  {}", or_unset(masked_key.as_deref()));
            println!("  spreadsheet_id:  {}", or_unset(settings.spreadsheet_id.as_deref()));
            println!("  spreadsheet_url: {}", or_unset(settings.spreadsheet_url.as_deref()));
            println!("  apps_script_url: {}", or_unset(settings.apps_script_url.as_deref()));
        }
    }

    Ok(())
}

/// Set one settings field; an empty value clears it
pub fn set(app: &App, key: String, value: String, output: &Output) -> Result<()> {
    app.session.require_teacher()?;

    if app.settings.set_field(&key, &value)?.is_none() {
        bail!(
            "Unknown settings key: '{}'\nValid keys: {}",
            key,
            SETTING_KEYS.join(", ")
        );
    }

    if value.trim().is_empty() {
        output.success(&format!("Cleared {}", key));
    } else {
        output.success(&format!("Set {}", key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_app;
    use tempfile::TempDir;

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[test]
    fn test_set_requires_teacher() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        app.session.register_and_login("Aoi", "1234").unwrap();

        assert!(set(&app, "gemini_api_key".into(), "k".into(), &quiet()).is_err());
        assert!(!app.settings.get().unwrap().has_gemini_key());
    }

    #[test]
    fn test_teacher_sets_and_clears() {
        let temp_dir = TempDir::new().unwrap();
        let app = test_app(&temp_dir);
        app.session.teacher_login("Sato", "teacher2024").unwrap();

        set(&app, "apps_script_url".into(), "https://script.example".into(), &quiet()).unwrap();
        assert!(app.settings.get().unwrap().has_apps_script_url());

        set(&app, "apps_script_url".into(), "".into(), &quiet()).unwrap();
        assert!(!app.settings.get().unwrap().has_apps_script_url());

        assert!(set(&app, "bogus".into(), "x".into(), &quiet()).is_err());
    }
}
