//! Answer prompt assembly.
//!
//! The default template asks the model to answer from a numbered context
//! block. A custom template file may replace it; it sees the same
//! `{{context}}` and `{{question}}` variables.
//!
//! Substitution is a single left-to-right pass over the template, so text
//! inside a variable value (a question containing `{{context}}`, say) is
//! never expanded again.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::RagError;

pub const DEFAULT_TEMPLATE: &str = "Based on the following context, answer the question.\n\n\
Context:\n{{context}}\n\n\
Question: {{question}}\n\n\
Answer:";

const CONTEXT_SEPARATOR: &str = "\n\n";
const ANSWER_MARKER: &str = "Answer:";

/// Template plus `{{key}}` → value pairs, rendered by [`build`](Self::build).
///
/// ```rust
/// use hybrid_rag::llm::prompt::PromptBuilder;
/// let prompt = PromptBuilder::new("Q: {{question}}")
///     .var("question", "Who is Bob?")
///     .build();
/// assert_eq!(prompt, "Q: Who is Bob?");
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into(), vars: HashMap::new() }
    }

    /// Load the template from `path`, or use [`DEFAULT_TEMPLATE`] when `None`.
    /// A configured file that cannot be read is a `Config` error.
    pub fn from_file(path: Option<&Path>) -> Result<Self, RagError> {
        match path {
            None => Ok(Self::new(DEFAULT_TEMPLATE)),
            Some(p) => {
                let text = fs::read_to_string(p).map_err(|e| {
                    RagError::Config(format!("cannot read prompt template {}: {e}", p.display()))
                })?;
                tracing::debug!(path = %p.display(), "loaded prompt template");
                Ok(Self::new(text.trim()))
            }
        }
    }

    /// Register a single variable.
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Register `{{key}}` → `value` substitution pairs applied at build time.
    pub fn with_vars<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (k, v) in vars {
            self.vars.insert(k.to_string(), v.to_string());
        }
        self
    }

    /// Render the template. Unknown placeholders are left as-is.
    pub fn build(self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            match after.find("}}") {
                Some(close) => {
                    let key = &after[..close];
                    match self.vars.get(key.trim()) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push_str("{{");
                            out.push_str(key);
                            out.push_str("}}");
                        }
                    }
                    rest = &after[close + 2..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// `Document 1: …`, `Document 2: …`, separated by blank lines.
pub fn format_context<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| format!("Document {}: {text}", i + 1))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Render the answer prompt for `question` over `contexts`.
pub fn render(template: &PromptBuilder, question: &str, contexts: &[&str]) -> String {
    template
        .clone()
        .var("context", format_context(contexts.iter().copied()))
        .var("question", question)
        .build()
}

/// Keep only what follows the last `Answer:` marker, trimmed. Replies
/// without the marker, or with nothing after it, are returned trimmed whole.
pub fn extract_answer(generated: &str) -> String {
    match generated.rfind(ANSWER_MARKER) {
        Some(pos) => {
            let tail = generated[pos + ANSWER_MARKER.len()..].trim();
            if tail.is_empty() {
                generated.trim().to_string()
            } else {
                tail.to_string()
            }
        }
        None => generated.trim().to_string(),
    }
}
