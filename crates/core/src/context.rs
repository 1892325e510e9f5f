use crate::models::{RetrievedContext, Turn};

pub const ANSWER_TEMPLATE: &str = "Answer the question based ONLY on the following context:\n\
{context}\n\n\
Conversation History:\n\
{history}\n\n\
Question: {question}\n\n\
Answer the question using the provided context. If the answer is not in the context, politely state that you don't have that information about the Road Users Code.";

/// One `role: content` line per turn, oldest first.
pub fn format_history(turns: &[Turn]) -> String {
    turns.iter().map(|turn| format!("{turn}\n")).collect()
}

pub fn format_context(context: &RetrievedContext) -> String {
    context
        .chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fills the answer template. `history` should already be the trailing
/// window of the conversation.
pub fn assemble_prompt(context: &RetrievedContext, history: &[Turn], question: &str) -> String {
    // Single pass so placeholder-like text inside chunks is left alone.
    let mut prompt = String::with_capacity(ANSWER_TEMPLATE.len() + question.len());
    let mut rest = ANSWER_TEMPLATE;

    while let Some(start) = rest.find('{') {
        prompt.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            prompt.push_str(tail);
            rest = "";
            break;
        };

        match &tail[1..end] {
            "context" => prompt.push_str(&format_context(context)),
            "history" => prompt.push_str(&format_history(history)),
            "question" => prompt.push_str(question),
            _ => prompt.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }

    prompt.push_str(rest);
    prompt
}
