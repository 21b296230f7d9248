use crate::text_layout::{char_positions, wrap_lines};

const COMMAND_INDEX: [(&str, &str); 9] = [
    ("/text", "Attach a text file: /text <path>"),
    ("/image", "Attach an image: /image <path>"),
    ("/model", "Select a model: /model <name>"),
    ("/models", "List available models"),
    ("/clear", "Clear the session"),
    ("/copy", "Copy the last command"),
    ("/help", "Show commands"),
    ("/quit", "Quit app"),
    ("/exit", "Quit app"),
];
const MAX_LOG_LINES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSuggestion {
    pub command: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Conversation,
    Logs,
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptKind {
    User,
    Reply,
    Error,
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub kind: TranscriptKind,
    pub text: String,
}

/// Pending path entry standing in for a file picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPrompt {
    Text,
    Image,
}

#[derive(Debug)]
pub struct App {
    pub running: bool,
    pub ticks: u64,
    pub active_pane: Pane,
    reply_label: String,
    models: Vec<String>,
    model_index: usize,
    transcript: Vec<TranscriptEntry>,
    log_lines: Vec<String>,
    context_labels: Vec<String>,
    conversation_scroll: u16,
    follow_conversation: bool,
    logs_scroll: u16,
    context_scroll: u16,
    input: String,
    cursor: usize,
    cursor_goal_col: Option<u16>,
    path_prompt: Option<PathPrompt>,
    status: String,
    busy: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new(
            vec!["gemini-2.5-pro".to_string(), "gemini-2.5-flash".to_string()],
            "gemini",
        )
    }
}

impl App {
    pub fn new(models: Vec<String>, tool: &str) -> Self {
        let models = models
            .into_iter()
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty())
            .collect();
        Self {
            running: true,
            ticks: 0,
            active_pane: Pane::Conversation,
            reply_label: reply_label_for_tool(tool),
            models,
            model_index: 0,
            transcript: Vec::new(),
            log_lines: Vec::new(),
            context_labels: Vec::new(),
            conversation_scroll: 0,
            follow_conversation: true,
            logs_scroll: 0,
            context_scroll: 0,
            input: String::new(),
            cursor: 0,
            cursor_goal_col: None,
            path_prompt: None,
            status: "Ready.".to_string(),
            busy: false,
        }
    }

    pub fn on_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn next_pane(&mut self) {
        self.active_pane = match self.active_pane {
            Pane::Conversation => Pane::Logs,
            Pane::Logs => Pane::Context,
            Pane::Context => Pane::Conversation,
        };
    }

    pub fn prev_pane(&mut self) {
        self.active_pane = match self.active_pane {
            Pane::Conversation => Pane::Context,
            Pane::Logs => Pane::Conversation,
            Pane::Context => Pane::Logs,
        };
    }

    // Models

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn model_index(&self) -> usize {
        self.model_index
    }

    pub fn model(&self) -> &str {
        self.models
            .get(self.model_index)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn next_model(&mut self) {
        if !self.models.is_empty() {
            self.model_index = (self.model_index + 1) % self.models.len();
        }
    }

    /// Selects `name`, adding it to the list when it is not a known model.
    pub fn select_model(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        match self.models.iter().position(|model| model == name) {
            Some(idx) => self.model_index = idx,
            None => {
                self.models.push(name.to_string());
                self.model_index = self.models.len() - 1;
            }
        }
    }

    // Transcript and logs

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn push_transcript(&mut self, kind: TranscriptKind, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            kind,
            text: text.into(),
        });
        self.follow_conversation = true;
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.conversation_scroll = 0;
        self.follow_conversation = true;
    }

    /// Wrapped transcript lines tagged with the entry kind they belong to.
    pub fn conversation_lines(&self, width: u16) -> Vec<(TranscriptKind, String)> {
        let mut lines = Vec::new();
        for entry in &self.transcript {
            let text = match entry.kind {
                TranscriptKind::User => format!("You:\n{}", entry.text),
                TranscriptKind::Reply => format!("{}:\n{}", self.reply_label, entry.text),
                TranscriptKind::Error => format!("Error:\n{}", entry.text),
                TranscriptKind::Log => entry.text.clone(),
            };
            lines.extend(
                wrap_lines(&text, width)
                    .into_iter()
                    .map(|line| (entry.kind, line)),
            );
            lines.push((entry.kind, String::new()));
        }
        lines
    }

    pub fn log_lines(&self) -> &[String] {
        &self.log_lines
    }

    pub fn push_log(&mut self, text: &str) {
        self.log_lines.extend(text.lines().map(ToString::to_string));
        if self.log_lines.len() > MAX_LOG_LINES {
            let overflow = self.log_lines.len() - MAX_LOG_LINES;
            self.log_lines.drain(..overflow);
        }
    }

    /// Replaces the log view with `text`.
    pub fn set_logs(&mut self, text: &str) {
        self.clear_logs();
        self.push_log(text);
    }

    pub fn clear_logs(&mut self) {
        self.log_lines.clear();
        self.logs_scroll = 0;
    }

    pub fn context_labels(&self) -> &[String] {
        &self.context_labels
    }

    pub fn set_context_labels(&mut self, labels: Vec<String>) {
        self.context_labels = labels;
        self.context_scroll = 0;
    }

    // Status

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Entering the busy state clears the log view; leaving it reports
    /// completion.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
        if busy {
            self.set_status("Processing...");
            self.clear_logs();
        } else {
            self.set_status("Done.");
        }
    }

    // Scrolling

    pub fn conversation_scroll(&self, max_scroll: u16) -> u16 {
        if self.follow_conversation {
            max_scroll
        } else {
            self.conversation_scroll.min(max_scroll)
        }
    }

    pub fn logs_scroll(&self) -> u16 {
        self.logs_scroll
    }

    pub fn context_scroll(&self) -> u16 {
        self.context_scroll
    }

    pub fn scroll_up(&mut self, lines: u16, max_scroll: u16) {
        match self.active_pane {
            Pane::Conversation => {
                let current = self.conversation_scroll(max_scroll);
                self.conversation_scroll = current.saturating_sub(lines);
                self.follow_conversation = false;
            }
            Pane::Logs => self.logs_scroll = self.logs_scroll.saturating_sub(lines),
            Pane::Context => self.context_scroll = self.context_scroll.saturating_sub(lines),
        }
    }

    pub fn scroll_down(&mut self, lines: u16, max_scroll: u16) {
        match self.active_pane {
            Pane::Conversation => {
                let current = self.conversation_scroll(max_scroll);
                self.conversation_scroll = current.saturating_add(lines).min(max_scroll);
                self.follow_conversation = self.conversation_scroll >= max_scroll;
            }
            Pane::Logs => {
                self.logs_scroll = self.logs_scroll.saturating_add(lines).min(max_scroll);
            }
            Pane::Context => {
                self.context_scroll = self.context_scroll.saturating_add(lines).min(max_scroll);
            }
        }
    }

    // Prompt input

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_char(&mut self, c: char) {
        let byte_idx = char_to_byte_idx(&self.input, self.cursor);
        self.input.insert(byte_idx, c);
        self.cursor = self.cursor.saturating_add(1);
        self.cursor_goal_col = None;
    }

    pub fn insert_text(&mut self, text: &str) {
        for c in text.chars().filter(|c| *c != '\r') {
            self.input_char(c);
        }
    }

    pub fn backspace_input(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = char_to_byte_idx(&self.input, self.cursor - 1);
        let end = char_to_byte_idx(&self.input, self.cursor);
        self.input.drain(start..end);
        self.cursor -= 1;
        self.cursor_goal_col = None;
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor_goal_col = None;
    }

    pub fn move_cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
        self.cursor_goal_col = None;
    }

    pub fn move_cursor_up(&mut self, width: u16) {
        let positions = char_positions(&self.input, width);
        let (line, col) = positions[self.cursor];
        if line == 0 {
            return;
        }
        let goal_col = self.cursor_goal_col.unwrap_or(col);
        self.cursor = nearest_index_for_line_col(&positions, line - 1, goal_col);
        self.cursor_goal_col = Some(goal_col);
    }

    pub fn move_cursor_down(&mut self, width: u16) {
        let positions = char_positions(&self.input, width);
        let (line, col) = positions[self.cursor];
        let last_line = positions.last().map(|(l, _)| *l).unwrap_or(0);
        if line >= last_line {
            return;
        }
        let goal_col = self.cursor_goal_col.unwrap_or(col);
        self.cursor = nearest_index_for_line_col(&positions, line + 1, goal_col);
        self.cursor_goal_col = Some(goal_col);
    }

    pub fn cursor_line_col(&self, width: u16) -> (u16, u16) {
        char_positions(&self.input, width)[self.cursor]
    }

    /// Takes the trimmed input, leaving the editor empty. Blank input is
    /// left untouched and yields `None`.
    pub fn take_input_trimmed(&mut self) -> Option<String> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.clear_input();
        Some(text)
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
        self.cursor_goal_col = None;
    }

    pub fn command_suggestions(&self) -> Vec<CommandSuggestion> {
        if self.path_prompt.is_some() {
            return Vec::new();
        }
        let Some(query) = command_query(&self.input) else {
            return Vec::new();
        };
        COMMAND_INDEX
            .iter()
            .filter(|(command, _)| command.starts_with(query))
            .map(|(command, description)| CommandSuggestion {
                command,
                description,
            })
            .collect()
    }

    pub fn command_help_lines() -> Vec<String> {
        COMMAND_INDEX
            .iter()
            .map(|(command, description)| format!("{command:<8} {description}"))
            .collect()
    }

    // Path prompt

    pub fn path_prompt(&self) -> Option<PathPrompt> {
        self.path_prompt
    }

    pub fn open_path_prompt(&mut self, prompt: PathPrompt) {
        self.path_prompt = Some(prompt);
        self.clear_input();
        self.set_status(match prompt {
            PathPrompt::Text => "Enter a text file path (Esc to cancel).",
            PathPrompt::Image => "Enter an image path: .jpg, .jpeg or .png (Esc to cancel).",
        });
    }

    pub fn close_path_prompt(&mut self) -> Option<PathPrompt> {
        let prompt = self.path_prompt.take();
        if prompt.is_some() {
            self.clear_input();
        }
        prompt
    }
}

fn reply_label_for_tool(tool: &str) -> String {
    let name = std::path::Path::new(tool)
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or(tool);
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Assistant".to_string(),
    }
}

fn char_to_byte_idx(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(s.len())
}

fn nearest_index_for_line_col(positions: &[(u16, u16)], target_line: u16, goal_col: u16) -> usize {
    let mut best: Option<(usize, u16)> = None;
    let mut fallback: Option<usize> = None;
    for (idx, (line, col)) in positions.iter().copied().enumerate() {
        if line != target_line {
            continue;
        }
        fallback.get_or_insert(idx);
        if col <= goal_col && best.is_none_or(|(_, best_col)| col > best_col) {
            best = Some((idx, col));
        }
    }
    best.map(|(idx, _)| idx)
        .or(fallback)
        .unwrap_or(positions.len().saturating_sub(1))
}

fn command_query(input: &str) -> Option<&str> {
    let trimmed = input.trim_start();
    if !trimmed.starts_with('/') {
        return None;
    }
    Some(trimmed.split_whitespace().next().unwrap_or(trimmed))
}

#[cfg(test)]
#[path = "../tests/unit/app_tests.rs"]
mod tests;
