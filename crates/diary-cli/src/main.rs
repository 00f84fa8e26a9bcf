//! Classroom Diary CLI
//!
//! Command-line interface for the classroom diary: student accounts,
//! diaries with AI feedback, teacher comments, and CSV export.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use diary_core::{Config, SortOrder};

mod commands;
mod editor;
mod output;
mod server;

use commands::export::CsvExportOptions;
use commands::App;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "diary")]
#[command(about = "Classroom Diary - journaling with AI encouragement")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use a specific config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new student and log in
    Register {
        name: String,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
        /// Classroom password, when the classroom requires one
        #[arg(long)]
        classroom_password: Option<String>,
    },
    /// Log in as a registered student
    Login {
        name: String,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Log out
    Logout,
    /// Show who is logged in
    Whoami,
    /// List recently used names
    Names,
    /// Teacher commands
    Teacher {
        #[command(subcommand)]
        command: TeacherCommands,
    },
    /// Write a new diary
    New {
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// Diary text (opens editor if not provided)
        #[arg(short, long)]
        content: Option<String>,
        /// Attach an image (up to 3)
        #[arg(short, long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
    },
    /// List diaries
    #[command(alias = "ls")]
    List {
        /// Only diaries whose title or content contains this text
        #[arg(long)]
        query: Option<String>,
        /// newest or oldest
        #[arg(long, default_value = "newest")]
        order: SortOrder,
        /// Every student's diaries (teacher only)
        #[arg(long)]
        all: bool,
    },
    /// Show a diary with feedback, additions, and comments
    Show {
        /// Diary ID (full UUID or prefix)
        id: String,
    },
    /// Edit a diary
    Edit {
        /// Diary ID (full UUID or prefix)
        id: String,
        #[arg(short = 'T', long)]
        title: Option<String>,
        #[arg(short, long)]
        content: Option<String>,
    },
    /// Delete a diary
    #[command(alias = "rm")]
    Delete {
        /// Diary ID (full UUID or prefix)
        id: String,
    },
    /// Add to a diary, answering the AI question
    Add {
        /// Diary ID (full UUID or prefix)
        id: String,
        #[arg(short, long)]
        content: Option<String>,
    },
    /// Comment on a diary (teacher only)
    Comment {
        /// Diary ID (full UUID or prefix)
        id: String,
        #[arg(short, long)]
        content: Option<String>,
    },
    /// Generate AI feedback for a diary
    Feedback {
        /// Diary ID (full UUID or prefix)
        id: String,
    },
    /// Export diaries
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Show or change external-service settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show status
    Status,
    /// Serve the feedback and spreadsheet forwarding endpoints
    Serve,
}

#[derive(Subcommand)]
enum TeacherCommands {
    /// Log in with the shared teacher password
    Login {
        name: String,
        /// Teacher password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// Write diaries to a CSV file
    Csv {
        /// Only this student's diaries (teacher only)
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value = "newest")]
        order: SortOrder,
        /// Output directory (defaults to the current directory)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// One file per student
        #[arg(long)]
        per_student: bool,
    },
}

#[derive(Subcommand, Clone)]
enum SettingsCommands {
    /// Show current settings
    Show,
    /// Set a settings value (empty value clears it)
    Set {
        /// Settings key (gemini_api_key, spreadsheet_id, spreadsheet_url, apps_script_url)
        key: String,
        value: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            if let Some(hint) = commands::recovery_hint(&e) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work even when the config file is broken
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, &output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    if let Commands::Serve = cli.command {
        return server::serve(&config).await;
    }

    let app = App::new(config);

    match cli.command {
        Commands::Register {
            name,
            password,
            classroom_password,
        } => commands::auth::register(&app, name, password, classroom_password, &output),
        Commands::Login { name, password } => commands::auth::login(&app, name, password, &output),
        Commands::Logout => commands::auth::logout(&app, &output),
        Commands::Whoami => commands::auth::whoami(&app, &output),
        Commands::Names => commands::auth::names(&app, &output),
        Commands::Teacher {
            command: TeacherCommands::Login { name, password },
        } => commands::auth::teacher_login(&app, name, password, &output),
        Commands::New {
            title,
            content,
            images,
        } => commands::diary::create(&app, title, content, images, &output).await,
        Commands::List { query, order, all } => {
            commands::diary::list(&app, query, order, all, &output)
        }
        Commands::Show { id } => commands::diary::show(&app, id, &output),
        Commands::Edit { id, title, content } => {
            commands::diary::edit(&app, id, title, content, &output)
        }
        Commands::Delete { id } => commands::diary::delete(&app, id, &output),
        Commands::Add { id, content } => commands::diary::add(&app, id, content, &output).await,
        Commands::Comment { id, content } => commands::diary::comment(&app, id, content, &output),
        Commands::Feedback { id } => commands::diary::feedback(&app, id, &output).await,
        Commands::Export {
            command:
                ExportCommands::Csv {
                    student,
                    query,
                    order,
                    out,
                    per_student,
                },
        } => {
            let options = CsvExportOptions {
                student,
                query,
                order,
                out,
                per_student,
            };
            commands::export::csv(&app, options, &output).map(|_| ())
        }
        Commands::Settings { command } => match command {
            Some(SettingsCommands::Show) | None => commands::settings::show(&app, &output),
            Some(SettingsCommands::Set { key, value }) => {
                commands::settings::set(&app, key, value, &output)
            }
        },
        Commands::Status => commands::status::show(&app, &output),
        Commands::Config { .. } | Commands::Serve => Ok(()), // Handled above
    }
}

/// Initialize tracing
///
/// `RUST_LOG` wins when set; otherwise `-v` picks the level for our crates.
/// Logs go to `config.log_file` when configured, stderr otherwise.
fn init_logging(config: &Config, verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        };
        EnvFilter::new(format!("diary_core={},diary_cli={}", level, level))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    // Ignore error if already initialized
    match config.log_file {
        Some(ref path) => match File::create(path) {
            Ok(file) => {
                let _ = builder.with_ansi(false).with_writer(Mutex::new(file)).try_init();
            }
            Err(e) => {
                eprintln!("Warning: Could not create log file {:?}: {}", path, e);
                let _ = builder.with_writer(std::io::stderr).try_init();
            }
        },
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}
