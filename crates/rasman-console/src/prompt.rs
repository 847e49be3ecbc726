//! How controllers ask the operator things.
//!
//! Destructive actions confirm first, create flows ask for their fields.
//! The terminal implementation reads stdin, [`AutoConfirm`] wraps it for
//! `--yes`, and the scripted one answers from a queue for the tests.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

#[async_trait]
pub trait Prompter: Send + Sync {
    /// Yes/no question.  Anything but an explicit yes is no.
    async fn confirm(&self, title: &str, question: &str) -> bool;

    /// Free-text field.  `None` when the operator cancels.
    async fn ask(&self, label: &str) -> Option<String>;

    /// Pick one of `options`.  Returns its index, `None` on cancel.
    async fn choose(&self, label: &str, options: &[String]) -> Option<usize>;
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

pub struct TerminalPrompter {
    lines: tokio::sync::Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            lines: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn read_line(&self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();

        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(Some(line)) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "Failed to read from stdin");
                None
            }
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn confirm(&self, title: &str, question: &str) -> bool {
        println!("{title}");
        let answer = self.read_line(&format!("{question} [y/N] ")).await;
        matches!(
            answer.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref(),
            Some("y" | "yes")
        )
    }

    async fn ask(&self, label: &str) -> Option<String> {
        self.read_line(&format!("{label}: ")).await
    }

    async fn choose(&self, label: &str, options: &[String]) -> Option<usize> {
        println!("{label}");
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {option}", i + 1);
        }
        let answer = self.read_line("> ").await?;
        let picked: usize = answer.trim().parse().ok()?;
        (1..=options.len()).contains(&picked).then(|| picked - 1)
    }
}

/// Says yes to every confirmation and hands the other questions to `inner`.
pub struct AutoConfirm<P> {
    inner: P,
}

impl<P: Prompter> AutoConfirm<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: Prompter> Prompter for AutoConfirm<P> {
    async fn confirm(&self, title: &str, question: &str) -> bool {
        debug!(title, question, "Confirmed by --yes");
        true
    }

    async fn ask(&self, label: &str) -> Option<String> {
        self.inner.ask(label).await
    }

    async fn choose(&self, label: &str, options: &[String]) -> Option<usize> {
        self.inner.choose(label, options).await
    }
}

// ---------------------------------------------------------------------------
// Scripted
// ---------------------------------------------------------------------------

/// One queued answer for [`ScriptedPrompter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Text(String),
    Choice(usize),
    Cancel,
}

/// Answers from a queue.  When the queue runs dry, confirmations fall back
/// to `assume_yes` and everything else cancels.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    assume_yes: bool,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            assume_yes: false,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Confirms everything, answers nothing else.
    pub fn assume_yes() -> Self {
        Self {
            assume_yes: true,
            ..Self::new([])
        }
    }

    /// Every question or label asked so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn next(&self, question: &str) -> Option<Answer> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(question.to_string());
        }
        self.answers.lock().ok()?.pop_front()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&self, _title: &str, question: &str) -> bool {
        match self.next(question) {
            Some(Answer::Yes) => true,
            Some(_) => false,
            None => self.assume_yes,
        }
    }

    async fn ask(&self, label: &str) -> Option<String> {
        match self.next(label) {
            Some(Answer::Text(text)) => Some(text),
            _ => None,
        }
    }

    async fn choose(&self, label: &str, options: &[String]) -> Option<usize> {
        match self.next(label) {
            Some(Answer::Choice(i)) if i < options.len() => Some(i),
            _ => None,
        }
    }
}
