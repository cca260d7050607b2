//! Yes/no confirmation prompts.

use anyhow::{Context, Result};
use std::collections::VecDeque;

/// Source of answers for interactive confirmations.
pub trait Prompter {
    /// Ask a yes/no question. Returns `true` when the user accepts.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let result = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact_opt()
            .context("Failed to read user input for confirmation")?;

        // None means the user pressed Esc or input was interrupted
        Ok(result.unwrap_or(false))
    }
}

/// Replays a fixed list of answers and records every prompt shown.
///
/// Once the queued answers run out every further prompt is declined.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    answers: VecDeque<bool>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Prompts shown so far, in order.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        self.asked.push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}
