use crate::models::ChatMessage;

/// Chat mode: the caller's history in original order with the new user turn
/// appended. The full history is always forwarded; no truncation or token
/// budgeting happens here.
pub fn chat_messages(history: &[ChatMessage], message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(message));
    messages
}

/// RAG mode: one instructional block folding the retrieved context and the
/// verbatim query into a single user turn, ending on an "Answer:" cue for the
/// provider to complete.
pub fn rag_prompt(context: &[&str], query: &str) -> String {
    let context_block = context
        .iter()
        .map(|doc| format!("- {doc}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a helpful assistant. Use the following context to answer the question.\n\n\
         Context:\n{context_block}\n\n\
         Question: {query}\n\n\
         Answer:"
    )
}
