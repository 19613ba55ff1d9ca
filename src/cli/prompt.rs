//! Terminal questions and answers.

use anyhow::Result;
use dialoguer::{Confirm, Input, Password};

/// Source of interactive answers.
pub trait Prompter {
    /// Ask for a non-empty line of text.
    fn text(&mut self, question: &str) -> Result<String>;

    /// Ask for a value without echoing it.
    fn secret(&mut self, question: &str) -> Result<String>;

    /// Ask a yes/no question.
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Print an informational line.
    fn say(&mut self, line: &str);
}

/// [`Prompter`] backed by the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn text(&mut self, question: &str) -> Result<String> {
        let answer: String = Input::new()
            .with_prompt(question)
            .validate_with(|input: &String| -> Result<(), &str> {
                if input.trim().is_empty() {
                    Err("an answer is required")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;
        Ok(answer.trim().to_string())
    }

    fn secret(&mut self, question: &str) -> Result<String> {
        Ok(Password::new().with_prompt(question).interact()?)
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        Ok(Confirm::new().with_prompt(question).interact()?)
    }

    fn say(&mut self, line: &str) {
        println!("{line}");
    }
}
