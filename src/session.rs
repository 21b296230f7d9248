use crate::command::{BuiltCommand, CommandSpec, build_command};
use crate::context::ContextStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub user: String,
    pub assistant: String,
}

/// Conversation history, attached context and the last built command.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub context: ContextStore,
    turns: Vec<ConversationTurn>,
    last_command: Option<CommandSpec>,
    pending_prompt: Option<String>,
}

impl Session {
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn record_turn(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(ConversationTurn {
            user: user.into(),
            assistant: assistant.into(),
        });
    }

    pub fn history_text(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("User: {}\nAI: {}\n", turn.user, turn.assistant))
            .collect()
    }

    /// Builds the next command from the session's context and history and
    /// remembers it as the last command.
    pub fn build(&mut self, tool: &str, model: &str, prompt: &str) -> BuiltCommand {
        let built = build_command(
            tool,
            model,
            prompt,
            self.context.items(),
            &self.history_text(),
        );
        self.last_command = Some(built.spec.clone());
        built
    }

    pub fn last_command(&self) -> Option<&CommandSpec> {
        self.last_command.as_ref()
    }

    pub fn set_pending_prompt(&mut self, prompt: impl Into<String>) {
        self.pending_prompt = Some(prompt.into());
    }

    pub fn take_pending_prompt(&mut self) -> Option<String> {
        self.pending_prompt.take()
    }

    /// Clears history and context. The last command survives so it can still
    /// be copied after a reset, and a pending prompt survives so a reply still
    /// in flight is recorded as the first turn of the cleared session.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.context.clear();
    }
}
