use std::path::{Path, PathBuf};

use crate::app::{App, PathPrompt, TranscriptKind};
use crate::clipboard::ClipboardSink;
use crate::config::{ToolConfig, api_key_warning, home_dir};
use crate::context::display_file_name;
use crate::engine::{ExecutionEngine, ExecutionOutcome, SHUTDOWN_GRACE};
use crate::error::SubmitError;
use crate::session::Session;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum SlashCommand {
    Text(String),
    Image(String),
    Model(String),
    Models,
    Clear,
    Copy,
    Help,
    Quit,
    Unknown(String),
}

/// Connects UI actions to the session, the execution engine and the
/// clipboard. All state changes happen on the caller's (UI) thread.
pub struct Controller {
    tool: ToolConfig,
    session: Session,
    engine: ExecutionEngine,
    clipboard: Box<dyn ClipboardSink>,
}

impl Controller {
    pub fn new(tool: ToolConfig, clipboard: Box<dyn ClipboardSink>) -> Self {
        let engine = ExecutionEngine::new(tool.timeout());
        Self {
            tool,
            session: Session::default(),
            engine,
            clipboard,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    /// Surfaces a missing API key as a non-fatal warning.
    pub fn startup(&mut self, app: &mut App) {
        if let Some(warning) = api_key_warning(&self.tool.api_key_env) {
            tracing::warn!(env = %self.tool.api_key_env, "API key variable not set");
            app.push_transcript(TranscriptKind::Log, format!("Warning: {warning}"));
            app.set_status(format!("API key not found: {warning}"));
        }
    }

    /// Handles Enter in the prompt box: a pending path entry, a slash
    /// command or a prompt for the tool.
    pub fn submit_input(&mut self, app: &mut App) {
        if let Some(prompt) = app.path_prompt() {
            let path = app.input().trim().to_string();
            app.close_path_prompt();
            match prompt {
                PathPrompt::Text => self.attach_text(app, &path),
                PathPrompt::Image => self.attach_image(app, &path),
            }
            return;
        }

        if app.input().trim_start().starts_with('/') {
            if let Some(line) = app.take_input_trimmed() {
                self.run_slash_command(app, &line);
            }
            return;
        }

        if self.is_busy() {
            app.set_status("Still processing the previous request.");
            return;
        }
        let Some(prompt) = app.take_input_trimmed() else {
            return;
        };
        if let Err(err) = self.submit_prompt(app, &prompt) {
            app.set_status(format!("Not sent: {err}."));
        }
    }

    pub fn submit_prompt(&mut self, app: &mut App, prompt: &str) -> Result<(), SubmitError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SubmitError::EmptyPrompt);
        }
        if self.is_busy() {
            return Err(SubmitError::Busy);
        }

        app.set_busy(true);
        let built = self.session.build(&self.tool.program, app.model(), prompt);
        for warning in &built.warnings {
            app.push_log(warning);
        }
        app.push_transcript(TranscriptKind::User, prompt);

        if let Err(err) = self.engine.execute(&built.spec) {
            app.set_busy(false);
            return Err(err);
        }
        self.session.set_pending_prompt(prompt);
        tracing::info!(model = app.model(), "prompt submitted");
        Ok(())
    }

    /// Applies a finished run, if any. Returns whether the UI changed.
    pub fn poll(&mut self, app: &mut App) -> bool {
        match self.engine.poll_outcome() {
            Some(outcome) => {
                self.apply_outcome(app, outcome);
                true
            }
            None => false,
        }
    }

    /// Kills an in-flight request before the UI exits.
    pub fn shutdown(&mut self) {
        if !self.engine.is_busy() {
            return;
        }
        tracing::info!("cancelling in-flight request on exit");
        if let Some(outcome) = self.engine.shutdown(SHUTDOWN_GRACE) {
            tracing::debug!(?outcome, "request stopped");
        }
    }

    fn apply_outcome(&mut self, app: &mut App, outcome: ExecutionOutcome) {
        let prompt = self.session.take_pending_prompt();
        match &outcome {
            ExecutionOutcome::Success { stdout, stderr } => {
                app.push_transcript(TranscriptKind::Reply, stdout.as_str());
                if let Some(prompt) = prompt {
                    self.session.record_turn(prompt, stdout.as_str());
                }
                app.set_busy(false);
                if !stderr.is_empty() {
                    app.set_logs(stderr);
                }
            }
            failed => {
                let report = failed.error_report().unwrap_or_default();
                tracing::warn!(%report, "request failed");
                app.push_transcript(TranscriptKind::Error, report.as_str());
                app.set_busy(false);
                app.set_logs(&report);
            }
        }
    }

    pub fn attach_text(&mut self, app: &mut App, raw_path: &str) {
        let Some(path) = expand_path(raw_path) else {
            app.set_status("No file selected.");
            return;
        };
        app.set_status(format!("Text file loaded: {}", display_file_name(&path)));
        self.session.context.add_text(path);
        self.refresh_context(app);
    }

    pub fn attach_image(&mut self, app: &mut App, raw_path: &str) {
        let Some(path) = expand_path(raw_path) else {
            app.set_status("No file selected.");
            return;
        };
        if !has_image_extension(&path) {
            app.push_log(&format!(
                "{} does not look like a .jpg, .jpeg or .png image; attaching anyway.",
                path.display()
            ));
        }
        app.set_status(format!("Image loaded: {}", display_file_name(&path)));
        self.session.context.add_image(path);
        self.refresh_context(app);
    }

    pub fn clear_session(&mut self, app: &mut App) {
        self.session.reset();
        app.clear_transcript();
        app.clear_logs();
        self.refresh_context(app);
        app.set_status("Session cleared.");
    }

    pub fn copy_last_command(&mut self, app: &mut App) {
        let Some(command) = self.session.last_command() else {
            app.set_status("No command to copy yet.");
            return;
        };
        match self.clipboard.set_text(&command.to_shell_string()) {
            Ok(()) => app.set_status("Last command copied."),
            Err(err) => {
                tracing::warn!(%err, "clipboard unavailable");
                app.push_log(&format!("Clipboard unavailable: {err}"));
                app.set_status("Copy failed.");
            }
        }
    }

    fn run_slash_command(&mut self, app: &mut App, line: &str) {
        match parse_slash_command(line) {
            SlashCommand::Text(path) => self.attach_text(app, &path),
            SlashCommand::Image(path) => self.attach_image(app, &path),
            SlashCommand::Model(name) if name.is_empty() => {
                app.set_status(format!("Current model: {}", app.model()));
            }
            SlashCommand::Model(name) => {
                app.select_model(&name);
                app.set_status(format!("Model: {}", app.model()));
            }
            SlashCommand::Models => {
                let listing = app.models().join(", ");
                app.push_transcript(TranscriptKind::Log, format!("Models: {listing}"));
            }
            SlashCommand::Clear => self.clear_session(app),
            SlashCommand::Copy => self.copy_last_command(app),
            SlashCommand::Help => {
                app.push_transcript(TranscriptKind::Log, App::command_help_lines().join("\n"));
            }
            SlashCommand::Quit => app.quit(),
            SlashCommand::Unknown(command) => {
                app.push_log(&format!("Unknown command: {command}"));
                app.set_status(format!("Unknown command: {command}"));
            }
        }
    }

    fn refresh_context(&self, app: &mut App) {
        app.set_context_labels(
            self.session
                .context
                .items()
                .iter()
                .map(|item| item.display_label())
                .collect(),
        );
    }
}

fn parse_slash_command(line: &str) -> SlashCommand {
    let line = line.trim();
    let (command, rest) = line
        .split_once(char::is_whitespace)
        .map(|(command, rest)| (command, rest.trim()))
        .unwrap_or((line, ""));
    match command {
        "/text" => SlashCommand::Text(rest.to_string()),
        "/image" => SlashCommand::Image(rest.to_string()),
        "/model" => SlashCommand::Model(rest.to_string()),
        "/models" => SlashCommand::Models,
        "/clear" => SlashCommand::Clear,
        "/copy" => SlashCommand::Copy,
        "/help" => SlashCommand::Help,
        "/quit" | "/exit" => SlashCommand::Quit,
        other => SlashCommand::Unknown(other.to_string()),
    }
}

/// Trims the path and expands a leading `~/`. Blank input means the picker
/// was cancelled.
fn expand_path(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    if raw.is_empty() {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("~/")
        && let Ok(home) = home_dir()
    {
        return Some(home.join(rest));
    }
    Some(PathBuf::from(raw))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
#[path = "../tests/unit/controller_tests.rs"]
mod tests;
