//! Prompt construction for question answering over retrieved documents.

use super::document::Document;
use crate::core::config::RetrievalSettings;
use crate::llm::ChatMessage;

const SYSTEM_TEMPLATE: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\nContext:\n{context}";

/// Formats authorized documents into the messages sent to the model.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    /// Upper bound on the context block, in characters.
    pub max_context_length: usize,
    /// Prefix each document with `[n] (Source: id)`.
    pub include_citations: bool,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            max_context_length: crate::core::config::defaults::RETRIEVAL_MAX_CONTEXT_LENGTH,
            include_citations: false,
        }
    }
}

impl PromptBuilder {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            max_context_length: settings.max_context_length,
            include_citations: settings.include_citations,
        }
    }

    /// Joins documents with blank lines, in rank order, stopping before the
    /// first document that would overflow `max_context_length`. A leading
    /// document that alone exceeds the budget is cut to fit, so the context
    /// is never empty while there are documents and budget.
    pub fn format_context<'a>(&self, documents: &'a [Document]) -> PromptContext<'a> {
        let mut text = String::new();
        let mut included = Vec::new();
        let mut current_length = 0;

        for (i, doc) in documents.iter().enumerate() {
            let header = if self.include_citations {
                format!("[{}] (Source: {})\n", i + 1, doc.id)
            } else {
                String::new()
            };
            let content = doc.content.trim();

            // two chars for the blank-line separator
            let overhead = header.chars().count() + 2;
            let remaining = self
                .max_context_length
                .saturating_sub(current_length + overhead);
            let content_length = content.chars().count();

            if content_length <= remaining {
                text.push_str(&header);
                text.push_str(content);
                text.push_str("\n\n");
                included.push(doc);
                current_length += overhead + content_length;
                continue;
            }

            if included.is_empty() && remaining > 0 {
                tracing::debug!(
                    document = %doc.id,
                    kept = remaining,
                    length = content_length,
                    "Document cut to fit the context budget"
                );
                text.push_str(&header);
                text.extend(content.chars().take(remaining));
                included.push(doc);
            }

            tracing::debug!(
                "Context truncated after {} of {} documents",
                included.len(),
                documents.len()
            );
            break;
        }

        PromptContext {
            text: text.trim_end().to_string(),
            included,
        }
    }

    /// System and user messages plus the documents that made it into the
    /// context.
    pub fn build_messages<'a>(
        &self,
        question: &str,
        documents: &'a [Document],
    ) -> (Vec<ChatMessage>, Vec<&'a Document>) {
        let context = self.format_context(documents);
        let messages = vec![
            ChatMessage::system(SYSTEM_TEMPLATE.replace("{context}", &context.text)),
            ChatMessage::user(format!("Question: {}", question)),
        ];
        (messages, context.included)
    }
}

/// Formatted context and the documents it contains, in order.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub text: String,
    pub included: Vec<&'a Document>,
}
