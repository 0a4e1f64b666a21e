//! Interactive chat input classification: slash commands and exit words.

use lm_tools::ChatSession;

const EXIT_WORDS: [&str; 3] = ["quit", "exit", "bye"];

#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Empty,
    Quit,
    /// A slash command was handled; print this and read the next line.
    Reply(String),
    Message(&'a str),
}

pub fn classify<'a>(session: &mut ChatSession, input: &'a str) -> ChatInput<'a> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return ChatInput::Empty;
    }
    if EXIT_WORDS.iter().any(|w| trimmed.eq_ignore_ascii_case(w)) {
        return ChatInput::Quit;
    }
    if !trimmed.starts_with('/') {
        return ChatInput::Message(trimmed);
    }

    match trimmed {
        "/clear" => {
            session.clear_history();
            ChatInput::Reply("History cleared.".to_string())
        }
        "/history" => ChatInput::Reply(render_history(session)),
        _ => ChatInput::Reply("Unknown command. Supported: /clear /history".to_string()),
    }
}

fn render_history(session: &ChatSession) -> String {
    let history = session.history();
    if history.is_empty() {
        return "(no messages yet)".to_string();
    }
    history
        .messages()
        .map(|m| {
            format!(
                "[{}] {}: {}",
                m.timestamp.format("%H:%M:%S"),
                m.role.as_str(),
                m.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CannedClient;
    use lm_tools::{ChatBot, ChatSettings};
    use std::sync::Arc;

    fn session() -> ChatSession {
        ChatBot::new(Arc::new(CannedClient::new("hello back")), ChatSettings::default())
            .session()
            .expect("session")
    }

    #[test]
    fn exit_words_and_plain_messages() {
        let mut session = session();
        assert_eq!(classify(&mut session, "  BYE "), ChatInput::Quit);
        assert_eq!(classify(&mut session, "exit"), ChatInput::Quit);
        assert_eq!(classify(&mut session, "   "), ChatInput::Empty);
        assert_eq!(
            classify(&mut session, " tell me a joke "),
            ChatInput::Message("tell me a joke")
        );
    }

    #[tokio::test]
    async fn history_and_clear_commands() {
        let mut session = session();
        assert_eq!(
            classify(&mut session, "/history"),
            ChatInput::Reply("(no messages yet)".to_string())
        );

        session.send_message("hi").await.expect("turn");
        let ChatInput::Reply(listing) = classify(&mut session, "/history") else {
            panic!("expected history listing");
        };
        assert!(listing.contains("user: hi"));
        assert!(listing.contains("assistant: hello back"));

        assert_eq!(
            classify(&mut session, "/clear"),
            ChatInput::Reply("History cleared.".to_string())
        );
        assert!(session.history().is_empty());
    }

    #[test]
    fn unknown_slash_command() {
        let mut session = session();
        assert!(matches!(
            classify(&mut session, "/model gpt-4"),
            ChatInput::Reply(text) if text.starts_with("Unknown command")
        ));
    }
}
