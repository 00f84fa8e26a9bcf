//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use diary_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, bind_address, gemini_model, gemini_base_url, \
                          teacher_password, classroom_password, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "bind_address": config.bind_address,
                    "gemini_model": config.gemini_model,
                    "gemini_base_url": config.gemini_base_url,
                    "classroom_password_set": config.classroom_password.is_some(),
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:           {}", config.data_dir.display());
            println!("  bind_address:       {}", config.bind_address);
            println!("  gemini_model:       {}", config.gemini_model);
            println!("  gemini_base_url:    {}", config.gemini_base_url);
            println!("  teacher_password:   (hidden)");
            println!(
                "  classroom_password: {}",
                if config.classroom_password.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!(
                "  log_file:           {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    let shown = if key.ends_with("password") { "****" } else { value.as_str() };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let optional = |v: &str| {
        if v.is_empty() || v == "none" {
            None
        } else {
            Some(v.to_string())
        }
    };

    match key {
        "data_dir" => config.data_dir = value.into(),
        "bind_address" => {
            value
                .parse::<std::net::SocketAddr>()
                .with_context(|| format!("Invalid bind address: {}", value))?;
            config.bind_address = value.to_string();
        }
        "gemini_model" => config.gemini_model = value.to_string(),
        "gemini_base_url" => config.gemini_base_url = value.to_string(),
        "teacher_password" => {
            if value.is_empty() {
                bail!("teacher_password cannot be empty");
            }
            config.teacher_password = value.to_string();
        }
        "classroom_password" => config.classroom_password = optional(value),
        "log_file" => config.log_file = optional(value).map(PathBuf::from),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}
