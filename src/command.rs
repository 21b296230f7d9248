use std::fs;

use serde::Serialize;

use crate::context::{ContextItem, ContextKind};

const TEXT_CONTEXT_HEADER: &str = "--- TEXT FILE CONTEXT ---";
const HISTORY_HEADER: &str = "--- CONVERSATION HISTORY ---";
const CURRENT_PROMPT_HEADER: &str = "--- CURRENT PROMPT ---";

/// Argument vector for one invocation of the external tool. The first entry
/// is the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    pub fn program_args(&self) -> &[String] {
        self.args.get(1..).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Value following `flag`, if the flag is present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .windows(2)
            .find(|pair| pair[0] == flag)
            .map(|pair| pair[1].as_str())
    }

    /// Space-joined command line; arguments containing whitespace are wrapped
    /// in double quotes.
    pub fn to_shell_string(&self) -> String {
        self.args
            .iter()
            .map(|arg| {
                if arg.contains(char::is_whitespace) {
                    format!("\"{arg}\"")
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltCommand {
    pub spec: CommandSpec,
    /// One line per text file that could not be read.
    pub warnings: Vec<String>,
}

pub fn build_command(
    tool: &str,
    model: &str,
    prompt: &str,
    items: &[ContextItem],
    history: &str,
) -> BuiltCommand {
    let prompt = prompt.trim();
    let mut warnings = Vec::new();
    let mut text_contents = Vec::new();
    let mut image_path = None;

    for item in items {
        match item.kind {
            ContextKind::Image => {
                if image_path.is_none() {
                    image_path = Some(item.path.display().to_string());
                }
            }
            ContextKind::Text => match fs::read_to_string(&item.path) {
                Ok(text) => text_contents.push(text),
                Err(err) => {
                    tracing::warn!(path = %item.path.display(), %err, "skipping unreadable context file");
                    warnings.push(format!("Failed to read {}: {err}", item.path.display()));
                }
            },
        }
    }

    let mut sections = Vec::new();
    if !text_contents.is_empty() {
        sections.push(format!(
            "{TEXT_CONTEXT_HEADER}\n{}",
            text_contents.join("\n\n")
        ));
    }
    if !history.is_empty() {
        sections.push(format!("{HISTORY_HEADER}\n{history}"));
    }

    let final_prompt = if sections.is_empty() {
        prompt.to_string()
    } else {
        format!(
            "{}\n\n{CURRENT_PROMPT_HEADER}\n{prompt}",
            sections.join("\n\n")
        )
    };

    let mut args = vec![
        tool.to_string(),
        "--model".to_string(),
        model.to_string(),
        "--prompt".to_string(),
        final_prompt,
    ];
    if let Some(path) = image_path {
        args.push("--image".to_string());
        args.push(path);
    }

    tracing::debug!(
        model,
        text_files = text_contents.len(),
        has_history = !history.is_empty(),
        "built tool command"
    );
    BuiltCommand {
        spec: CommandSpec::new(args),
        warnings,
    }
}

#[cfg(test)]
#[path = "../tests/unit/command_tests.rs"]
mod tests;
