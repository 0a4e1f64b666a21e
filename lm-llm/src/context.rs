//! Turns a canonical request into an ordered list of conversation turns.
//!
//! `context.history` (array of `{role, content}`) becomes the leading turns and the prompt
//! closes the list as a user turn, unless history already ends with that exact user turn.

use crate::types::{LlmRequest, Role};
use serde_json::Value;

pub const HISTORY_CONTEXT_KEY: &str = "history";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Turn {
    pub role: Role,
    pub content: String,
}

pub(crate) fn conversation_turns(req: &LlmRequest) -> Vec<Turn> {
    let mut turns: Vec<Turn> = req
        .context()
        .and_then(|ctx| ctx.get(HISTORY_CONTEXT_KEY))
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(history_turn).collect())
        .unwrap_or_default();

    let prompt_already_last = turns
        .last()
        .is_some_and(|t| t.role == Role::User && t.content == req.prompt());
    if !prompt_already_last {
        turns.push(Turn {
            role: Role::User,
            content: req.prompt().to_string(),
        });
    }
    turns
}

fn history_turn(entry: &Value) -> Option<Turn> {
    let role = match entry.get("role")?.as_str()? {
        "system" => Role::System,
        "user" => Role::User,
        "assistant" => Role::Assistant,
        _ => return None,
    };
    let content = entry.get("content")?.as_str()?;
    if content.trim().is_empty() {
        return None;
    }
    Some(Turn {
        role,
        content: content.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_with_history(prompt: &str, history: Value) -> LlmRequest {
        let mut ctx = serde_json::Map::new();
        ctx.insert(HISTORY_CONTEXT_KEY.to_string(), history);
        LlmRequest::builder(prompt)
            .context(ctx)
            .build()
            .expect("valid request")
    }

    #[test]
    fn prompt_only_when_no_context() {
        let req = LlmRequest::builder("hello").build().expect("valid request");
        assert_eq!(
            conversation_turns(&req),
            vec![Turn {
                role: Role::User,
                content: "hello".to_string()
            }]
        );
    }

    #[test]
    fn history_already_ending_with_prompt_is_not_duplicated() {
        let req = request_with_history(
            "how are you?",
            json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello!"},
                {"role": "user", "content": "how are you?"}
            ]),
        );
        let turns = conversation_turns(&req);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].content, "how are you?");
    }

    #[test]
    fn malformed_history_entries_are_skipped() {
        let req = request_with_history(
            "next",
            json!([
                {"role": "tool", "content": "x"},
                {"role": "user"},
                {"role": "assistant", "content": 3},
                {"role": "assistant", "content": "ok"}
            ]),
        );
        let turns = conversation_turns(&req);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::Assistant);
        assert_eq!(turns[1].role, Role::User);
    }
}
