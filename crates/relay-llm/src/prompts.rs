//! Prompt templates.

use relay_core::Exchange;

use crate::retriever::Document;

/// Rewrites a follow-up question into a self-contained search query.
pub const STANDALONE_QUESTION_TEMPLATE: &str = "\
Given a user question and its conversation context, rewrite it as a single, fully \
self-contained standalone question. Preserve the original meaning, resolve all \
references, and keep it as short as possible. Output only the rewritten question.
<chat_history>{chatHistory}</chat_history>
<question>{question}</question>";

/// Final answer prompt.
pub const ANSWER_TEMPLATE: &str = "\
You are a helpful, friendly assistant.

For greetings and small talk (\"Hello\", \"Hi\", ...): respond warmly, greet back, and ask how you can help.

For other questions: use ONLY the context below. If it is not enough, check the chat history. \
If the answer is in neither, say \"I don't have that info.\" and recommend contacting the support team. \
Never make up an answer. Keep it concise.

<context>
{context}
</context>

<chat_history>
{chatHistory}
</chat_history>

<question>
{question}
</question>

Answer: ";

/// Render history as `User: …\nAI: …` blocks separated by blank lines.
pub fn format_chat_history(history: &[Exchange]) -> String {
    history
        .iter()
        .map(|e| format!("User: {}\nAI: {}", e.user, e.ai))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Join document contents with blank lines.
pub fn format_documents(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill `{question}`, `{context}` and `{chatHistory}` placeholders.
///
/// Substitution is single-pass, so placeholder text inside the values is
/// left alone.
pub fn render(template: &str, question: &str, context: &str, chat_history: &str) -> String {
    let mut out = String::with_capacity(template.len() + question.len() + context.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let (value, len) = if tail.starts_with("{question}") {
            (question, "{question}".len())
        } else if tail.starts_with("{context}") {
            (context, "{context}".len())
        } else if tail.starts_with("{chatHistory}") {
            (chat_history, "{chatHistory}".len())
        } else {
            ("{", 1)
        };
        out.push_str(value);
        rest = &tail[len..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_format() {
        let history = vec![Exchange::new("Hi", "Hello!"), Exchange::new("Hours?", "9-5")];
        assert_eq!(
            format_chat_history(&history),
            "User: Hi\nAI: Hello!\n\nUser: Hours?\nAI: 9-5"
        );
        assert_eq!(format_chat_history(&[]), "");
    }

    #[test]
    fn documents_format() {
        let docs = vec![Document::new("a"), Document::new("b")];
        assert_eq!(format_documents(&docs), "a\n\nb");
    }

    #[test]
    fn render_fills_every_placeholder() {
        let out = render("{question}|{context}|{chatHistory}", "q", "c", "h");
        assert_eq!(out, "q|c|h");
    }

    #[test]
    fn render_leaves_other_braces() {
        assert_eq!(render("{x} {question}", "q", "", ""), "{x} q");
    }

    #[test]
    fn render_does_not_expand_inside_values() {
        let out = render("{question} {context}", "{context}", "ctx", "");
        assert_eq!(out, "{context} ctx");
    }

    #[test]
    fn answer_template_has_all_slots() {
        for slot in ["{question}", "{context}", "{chatHistory}"] {
            assert!(ANSWER_TEMPLATE.contains(slot), "missing {slot}");
        }
    }
}
