//! Account and session command handlers

use anyhow::{Context, Result};

use diary_core::AuthError;

use crate::commands::App;
use crate::editor::value_or_prompt;
use crate::output::Output;

/// Register a new student and log them in
pub fn register(
    app: &App,
    name: String,
    password: Option<String>,
    classroom_password: Option<String>,
    output: &Output,
) -> Result<()> {
    if app.session.requires_classroom_password() {
        let code = value_or_prompt(classroom_password, "Classroom password")?;
        app.session
            .verify_classroom_password(&code)
            .context("Wrong classroom password")?;
    }

    if app.session.find_by_name(&name)?.is_some() {
        anyhow::bail!(
            "'{}' is already registered. Log in with `diary login {}`.",
            name.trim(),
            name.trim()
        );
    }

    let password = value_or_prompt(password, "Password")?;
    let user = app.session.register_and_login(&name, &password)?;

    output.success(&format!("Registered and logged in as {}", user.name));
    Ok(())
}

/// Log in a registered student
pub fn login(app: &App, name: String, password: Option<String>, output: &Output) -> Result<()> {
    if app.session.find_by_name(&name)?.is_none() {
        anyhow::bail!(
            "No student named '{}'. Register first with `diary register {}`.",
            name.trim(),
            name.trim()
        );
    }

    let password = value_or_prompt(password, "Password")?;
    match app.session.login(&name, &password) {
        Ok(user) => {
            output.success(&format!("Logged in as {}", user.name));
            Ok(())
        }
        Err(AuthError::IncorrectPassword) => anyhow::bail!("Incorrect password"),
        Err(e) => Err(e.into()),
    }
}

/// Log in through the shared teacher password
pub fn teacher_login(
    app: &App,
    name: String,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let password = value_or_prompt(password, "Teacher password")?;
    let user = app
        .session
        .teacher_login(&name, &password)
        .context("Teacher login failed")?;

    output.success(&format!("Logged in as {}先生", user.name));
    Ok(())
}

pub fn logout(app: &App, output: &Output) -> Result<()> {
    app.session.logout()?;
    output.success("Logged out");
    Ok(())
}

pub fn whoami(app: &App, output: &Output) -> Result<()> {
    let user = app.session.current()?;
    output.print_session(user.as_ref());
    Ok(())
}

/// List recently used names for quick login
pub fn names(app: &App, output: &Output) -> Result<()> {
    let names = app.session.remembered_names()?;
    output.print_names(&names);
    Ok(())
}
