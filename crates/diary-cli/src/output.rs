//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use diary_core::{DiaryRecord, SessionUser};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print any serializable value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to encode JSON output: {}", e),
        }
    }

    /// Print a single diary with its feedback, additions, and comments
    pub fn print_diary(&self, diary: &DiaryRecord) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", diary.id);
                println!("Title:    {}", diary.title);
                println!("Author:   {}", diary.user_name);
                println!("Created:  {}", local_time(diary.created_at));
                println!("Updated:  {}", local_time(diary.updated_at));
                println!("Sync:     {}", diary.sync_status);
                if !diary.images.is_empty() {
                    let names: Vec<_> = diary.images.iter().map(|i| i.name.as_str()).collect();
                    println!("Images:   {}", names.join(", "));
                }
                println!();
                println!("{}", diary.content);

                if let Some(ref feedback) = diary.ai_feedback {
                    println!();
                    println!("── AI Feedback ──");
                    println!("{}", feedback.feedback);
                    println!("Q: {}", feedback.question);
                }

                if !diary.additions.is_empty() {
                    println!();
                    println!("── Additions ({}) ──", diary.additions.len());
                    for addition in &diary.additions {
                        println!("[{}]", local_time(addition.created_at));
                        if !addition.question_context.is_empty() {
                            println!("Q: {}", addition.question_context);
                        }
                        println!("{}", addition.content);
                    }
                }

                if !diary.teacher_comments.is_empty() {
                    println!();
                    println!("── Teacher Comments ({}) ──", diary.teacher_comments.len());
                    for comment in &diary.teacher_comments {
                        println!(
                            "[{}] {}先生: {}",
                            local_time(comment.created_at),
                            comment.teacher_name,
                            comment.content
                        );
                    }
                }
            }
            OutputFormat::Json => self.print_json(diary),
            OutputFormat::Quiet => println!("{}", diary.id),
        }
    }

    /// Print a list of diaries
    pub fn print_diaries(&self, diaries: &[DiaryRecord]) {
        match self.format {
            OutputFormat::Human => {
                if diaries.is_empty() {
                    println!("No diaries found.");
                    return;
                }
                for diary in diaries {
                    let mut markers = String::new();
                    if diary.ai_feedback.is_some() {
                        markers.push_str(" [AI]");
                    }
                    if !diary.teacher_comments.is_empty() {
                        markers.push_str(&format!(" [{}c]", diary.teacher_comments.len()));
                    }
                    println!(
                        "{} | {} | {} | {}{}",
                        &diary.id.to_string()[..8],
                        diary.created_at.with_timezone(&chrono::Local).format("%Y/%m/%d"),
                        truncate(&diary.user_name, 12),
                        truncate(&diary.title, 30),
                        markers
                    );
                }
                println!("\n{} diary(ies)", diaries.len());
            }
            OutputFormat::Json => self.print_json(diaries),
            OutputFormat::Quiet => {
                for diary in diaries {
                    println!("{}", diary.id);
                }
            }
        }
    }

    /// Print the logged-in identity
    pub fn print_session(&self, user: Option<&SessionUser>) {
        match (self.format, user) {
            (OutputFormat::Human, Some(user)) => {
                println!("{} ({})", user.name, user.role);
                println!("ID: {}", user.id);
            }
            (OutputFormat::Human, None) => println!("Not logged in."),
            (OutputFormat::Json, user) => self.print_json(&user),
            (OutputFormat::Quiet, Some(user)) => println!("{}", user.name),
            (OutputFormat::Quiet, None) => {}
        }
    }

    /// Print a list of plain names
    pub fn print_names(&self, names: &[String]) {
        match self.format {
            OutputFormat::Human => {
                if names.is_empty() {
                    println!("No remembered names.");
                    return;
                }
                for (i, name) in names.iter().enumerate() {
                    println!("{:>2}. {}", i + 1, name);
                }
            }
            OutputFormat::Json => self.print_json(names),
            OutputFormat::Quiet => {
                for name in names {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a non-fatal problem to stderr
    pub fn warn(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn local_time(time: chrono::DateTime<chrono::Utc>) -> String {
    time.with_timezone(&chrono::Local)
        .format("%Y/%m/%d %H:%M")
        .to_string()
}

/// Truncate to at most `max_chars` characters, adding "..." if truncated
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("きょうはとてもたのしかった", 8), "きょうはと...");
        assert_eq!(truncate("えんそく", 8), "えんそく");
    }
}
