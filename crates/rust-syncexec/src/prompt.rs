//! Scripted replies to the sync tool's interactive prompts.
//!
//! A [`PromptRule`] names a trigger substring and where its reply comes from.
//! [`PromptResponder`] resolves every rule against a [`CommandInvocation`]
//! once, at construction, and then answers matching lines by writing to the
//! child's stdin.
//!
//! The built-in table:
//!
//! | Trigger | Reply source | Default | Closes stdin |
//! |---|---|---|---|
//! | `continue sync setup` | input | `yes` | no |
//! | `choose error reporting mode` | sync mode | `full` | no |
//! | `continue sync reset` | input | `y` | no |
//! | `existing sync folder` | input | `n` | yes |

use serde::Deserialize;
use tokio::io::AsyncWrite;

use crate::error::Result;
use crate::invocation::CommandInvocation;
use crate::stdin::StdinChannel;

/// Where a prompt's reply comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// The invocation's `input`, falling back to the rule default.
    Input,
    /// The invocation's `sync_mode`, falling back to the rule default.
    SyncMode,
    /// Always the rule default.
    Fixed,
}

/// One entry of the prompt table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptRule {
    /// Substring that identifies the prompt.
    pub trigger: String,
    /// Where the reply comes from.
    pub source: ReplySource,
    /// Reply used when the source is unset.
    #[serde(rename = "default")]
    pub default_reply: String,
    /// Close stdin after replying.
    #[serde(default)]
    pub close_stdin: bool,
}

impl PromptRule {
    /// Create a rule that does not close stdin.
    #[must_use]
    pub fn new(
        trigger: impl Into<String>,
        source: ReplySource,
        default_reply: impl Into<String>,
    ) -> Self {
        Self {
            trigger: trigger.into(),
            source,
            default_reply: default_reply.into(),
            close_stdin: false,
        }
    }

    /// Close stdin after this rule's reply.
    #[must_use]
    pub const fn closing_stdin(mut self) -> Self {
        self.close_stdin = true;
        self
    }

    /// Resolve the reply against an invocation.
    #[must_use]
    pub fn resolve(&self, invocation: &CommandInvocation) -> ResolvedPrompt {
        let override_reply = match self.source {
            ReplySource::Input => invocation.input.as_deref(),
            ReplySource::SyncMode => invocation.sync_mode.as_deref(),
            ReplySource::Fixed => None,
        };

        ResolvedPrompt {
            trigger: self.trigger.clone(),
            reply: override_reply.unwrap_or(self.default_reply.as_str()).to_string(),
            close_stdin: self.close_stdin,
        }
    }
}

/// The built-in prompt table of the sync tool.
#[must_use]
pub fn default_rules() -> Vec<PromptRule> {
    vec![
        PromptRule::new("continue sync setup", ReplySource::Input, "yes"),
        PromptRule::new("choose error reporting mode", ReplySource::SyncMode, "full"),
        PromptRule::new("continue sync reset", ReplySource::Input, "y"),
        // Last prompt of the interactive sequence.
        PromptRule::new("existing sync folder", ReplySource::Input, "n").closing_stdin(),
    ]
}

/// A rule with its reply already decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    /// Substring that identifies the prompt.
    pub trigger: String,
    /// Text written to stdin, without line ending.
    pub reply: String,
    /// Close stdin after replying.
    pub close_stdin: bool,
}

impl ResolvedPrompt {
    /// Check whether `line` contains this prompt's trigger.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        line.contains(&self.trigger)
    }
}

/// Answers prompts found in output lines.
#[derive(Debug, Clone, Default)]
pub struct PromptResponder {
    prompts: Vec<ResolvedPrompt>,
}

impl PromptResponder {
    /// Resolve `rules` against `invocation`.
    #[must_use]
    pub fn new(rules: &[PromptRule], invocation: &CommandInvocation) -> Self {
        Self {
            prompts: rules.iter().map(|r| r.resolve(invocation)).collect(),
        }
    }

    /// The resolved table, in rule order.
    #[must_use]
    pub fn prompts(&self) -> &[ResolvedPrompt] {
        &self.prompts
    }

    /// Prompts whose trigger appears in `line`.
    pub fn matches<'a>(&'a self, line: &'a str) -> impl Iterator<Item = &'a ResolvedPrompt> + 'a {
        self.prompts.iter().filter(move |p| p.matches(line))
    }

    /// Reply to every prompt found in `line`.
    ///
    /// Every trigger is tested independently. Returns the number of replies
    /// actually written.
    ///
    /// # Errors
    ///
    /// Returns the first write failure; later matches are not attempted.
    pub async fn respond<W>(&self, line: &str, stdin: &mut StdinChannel<W>) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        self.respond_once(line, &mut Vec::new(), stdin).await
    }

    /// Like [`respond`](Self::respond), but skips the prompts listed in
    /// `answered` and adds every prompt it handles to it.
    ///
    /// Used for a line that is still growing, so a prompt seen in an earlier
    /// fragment is not answered again.
    ///
    /// # Errors
    ///
    /// Returns the first write failure; later matches are not attempted.
    pub async fn respond_once<W>(
        &self,
        line: &str,
        answered: &mut Vec<usize>,
        stdin: &mut StdinChannel<W>,
    ) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0;
        for (index, prompt) in self.prompts.iter().enumerate() {
            if answered.contains(&index) || !prompt.matches(line) {
                continue;
            }
            answered.push(index);
            if stdin.send_line(&prompt.reply).await? {
                tracing::debug!(trigger = %prompt.trigger, reply = %prompt.reply, "answered prompt");
                written += 1;
            }
            if prompt.close_stdin {
                stdin.close().await;
            }
        }
        Ok(written)
    }
}
