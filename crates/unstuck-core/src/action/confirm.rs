//! Operator confirmation for force actions.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use unstuck_common::{Action, Error, Result};

/// Asks whether a high-risk action may proceed.
pub trait Confirmer {
    /// `Ok(true)` to proceed. Errors are treated as a decline by the applier.
    fn confirm(&mut self, action: &Action) -> Result<bool>;
}

/// Accepts `y`, `Y`, `yes`, `YES`.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim(), "y" | "Y" | "yes" | "YES")
}

/// Prompts on a writer and reads one line per action.
pub struct StdinConfirmer<R, W> {
    input: R,
    prompt: W,
}

impl StdinConfirmer<io::StdinLock<'static>, io::Stderr> {
    /// Read from stdin, prompt on stderr so stdout stays clean for payloads.
    pub fn stdio() -> Self {
        StdinConfirmer::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> StdinConfirmer<R, W> {
    pub fn new(input: R, prompt: W) -> Self {
        StdinConfirmer { input, prompt }
    }

    fn banner(&mut self, action: &Action) -> io::Result<()> {
        let w = &mut self.prompt;
        writeln!(w)?;
        writeln!(w, "⚠️  HIGH-RISK ACTION ({})", action.escalation_level.label())?;
        writeln!(w, "   Target:  {}", action.target)?;
        writeln!(w, "   Action:  {}", action.description)?;
        if !action.command.is_empty() {
            writeln!(w, "   Command: {}", action.command)?;
        }
        writeln!(w, "   Risk:    {}", action.risk.as_str().to_uppercase())?;
        if !action.expected_result.is_empty() {
            writeln!(w, "   Effect:  {}", action.expected_result)?;
        }
        writeln!(w)?;
        write!(w, "Proceed with this action? [y/N]: ")?;
        w.flush()
    }
}

impl<R: BufRead, W: Write> Confirmer for StdinConfirmer<R, W> {
    fn confirm(&mut self, action: &Action) -> Result<bool> {
        self.banner(action)?;
        let mut line = String::new();
        // EOF reads zero bytes and declines.
        self.input.read_line(&mut line)?;
        Ok(is_affirmative(&line))
    }
}

/// Approves everything (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm(&mut self, _action: &Action) -> Result<bool> {
        Ok(true)
    }
}

/// Replays canned answers; running out is an error.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: VecDeque<bool>,
    asked: Vec<String>,
}

impl ScriptedConfirmer {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        ScriptedConfirmer {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Ids of the actions that were put to the confirmer, in order.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&mut self, action: &Action) -> Result<bool> {
        self.asked.push(action.id.clone());
        self.answers
            .pop_front()
            .ok_or_else(|| Error::InvalidInput("no scripted answer left".to_string()))
    }
}
