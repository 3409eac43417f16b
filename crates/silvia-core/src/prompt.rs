//! Prompt composition: knowledge text plus the user's question.

use std::borrow::Cow;

/// Separator between the knowledge text and the user's question.
pub const KNOWLEDGE_SEPARATOR: &str = "\n\n";

/// Extract the user's question from a raw message body.
///
/// With a non-empty `prefix`, the body must contain it: the first occurrence
/// is removed and the rest trimmed. Bodies without the prefix yield `None`.
/// With no prefix the whole body is the question, untouched.
pub fn extract_query<'a>(body: &'a str, prefix: Option<&str>) -> Option<Cow<'a, str>> {
    match prefix.filter(|p| !p.is_empty()) {
        None => Some(Cow::Borrowed(body)),
        Some(p) => {
            let start = body.find(p)?;
            let mut stripped = String::with_capacity(body.len() - p.len());
            stripped.push_str(&body[..start]);
            stripped.push_str(&body[start + p.len()..]);
            Some(Cow::Owned(stripped.trim().to_string()))
        }
    }
}

/// Join knowledge text and question into the prompt sent to the model.
pub fn compose(knowledge: &str, query: &str) -> String {
    let mut prompt = String::with_capacity(knowledge.len() + KNOWLEDGE_SEPARATOR.len() + query.len());
    prompt.push_str(knowledge);
    prompt.push_str(KNOWLEDGE_SEPARATOR);
    prompt.push_str(query);
    prompt
}
