//! Summaries for internal tree nodes.
//!
//! The tree builder condenses the descriptions of a cluster's members into
//! one prompt and hands it to a [`Summarizer`]. Each call is stateless: a
//! summarizer must not carry context from one prompt to the next.
//!
//! The chat-completion adapter lives in the `treerag` app crate;
//! [`ExtractiveSummarizer`] works offline.

use anyhow::Result;
use async_trait::async_trait;

/// Label prefixed to each fragment in a summary prompt.
const FRAGMENT_LABEL: &str = "Fragment";

/// Turns a prompt into a short summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Identifier for logs (e.g. the chat model name).
    fn name(&self) -> &str;
    /// Summarize `prompt`. Every call starts from a fresh conversation.
    async fn summarize(&self, prompt: &str) -> Result<String>;
}

/// Build the summary prompt for a cluster.
///
/// Fragments are numbered from 1 in member order. Members without a
/// description contribute an empty fragment so numbering stays aligned
/// with the children.
pub fn build_summary_prompt(descriptions: &[Option<&str>], max_words: usize) -> String {
    let mut prompt = format!(
        "Summarize the text fragments below. Fragments that are related should be \
         summarized together; unrelated fragments should be summarized separately \
         as a numbered list. Keep the whole summary under {} words.\n\n",
        max_words
    );
    for (i, description) in descriptions.iter().enumerate() {
        prompt.push_str(&format!(
            "{} {}:\n{}\n\n",
            FRAGMENT_LABEL,
            i + 1,
            description.unwrap_or("")
        ));
    }
    prompt
}

/// Offline summarizer that keeps the leading words of the fragments.
///
/// Strips the instruction header and fragment labels from a prompt built
/// by [`build_summary_prompt`] and returns at most `max_words` words.
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    max_words: usize,
}

impl ExtractiveSummarizer {
    pub fn new(max_words: usize) -> Self {
        Self {
            max_words: max_words.max(1),
        }
    }

    pub fn summarize_sync(&self, prompt: &str) -> String {
        let label = format!("{} ", FRAGMENT_LABEL);
        let body = match prompt.find(&label) {
            Some(pos) => &prompt[pos..],
            None => prompt,
        };
        body.lines()
            .filter(|line| !is_fragment_label(line, &label))
            .flat_map(str::split_whitespace)
            .take(self.max_words)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn is_fragment_label(line: &str, label: &str) -> bool {
    line.strip_prefix(label)
        .and_then(|rest| rest.strip_suffix(':'))
        .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn summarize(&self, prompt: &str) -> Result<String> {
        Ok(self.summarize_sync(prompt))
    }
}
