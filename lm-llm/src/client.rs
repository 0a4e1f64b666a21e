use crate::anthropic::AnthropicClient;
use crate::error::{ApiErrorKind, LlmError, Result};
use crate::openai::OpenAiClient;
use crate::types::{LlmRequest, LlmResponse, Provider};
use async_trait::async_trait;
use futures_util::Stream;
use futures_util::StreamExt;
use std::pin::Pin;

/// Incremental text fragments of one upstream response.
///
/// Single pass and not restartable: it owns the HTTP response body, so dropping it (or
/// draining it) releases the connection. It ends after the first error.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Exactly one upstream call.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse>;

    async fn stream_generate(&self, request: &LlmRequest) -> Result<TextStream>;
}

/// The closed set of upstream protocols.
#[derive(Clone)]
pub enum LlmClient {
    OpenAi(OpenAiClient),
    Anthropic(AnthropicClient),
}

impl LlmClient {
    pub fn base_url(&self) -> &str {
        match self {
            LlmClient::OpenAi(c) => c.base_url(),
            LlmClient::Anthropic(c) => c.base_url(),
        }
    }
}

#[async_trait]
impl ProviderClient for LlmClient {
    fn provider(&self) -> Provider {
        match self {
            LlmClient::OpenAi(_) => Provider::OpenAi,
            LlmClient::Anthropic(_) => Provider::Anthropic,
        }
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        match self {
            LlmClient::OpenAi(c) => c.generate(request).await,
            LlmClient::Anthropic(c) => c.generate(request).await,
        }
    }

    async fn stream_generate(&self, request: &LlmRequest) -> Result<TextStream> {
        match self {
            LlmClient::OpenAi(c) => c.stream_generate(request).await,
            LlmClient::Anthropic(c) => c.stream_generate(request).await,
        }
    }
}

/// Ends the stream after the first error, and turns a stream that produced no visible text
/// into a trailing validation error. Whitespace-only fragments pass through but do not count.
pub(crate) fn guard_fragments<S>(provider: Provider, inner: S) -> TextStream
where
    S: Stream<Item = Result<String>> + Send + 'static,
{
    let inner = Box::pin(inner);
    Box::pin(futures_util::stream::unfold(
        (inner, false, false),
        move |(mut inner, mut emitted, done)| async move {
            if done {
                return None;
            }
            loop {
                match inner.next().await {
                    Some(Ok(fragment)) => {
                        if fragment.is_empty() {
                            continue;
                        }
                        emitted |= !fragment.trim().is_empty();
                        return Some((Ok(fragment), (inner, emitted, false)));
                    }
                    Some(Err(e)) => return Some((Err(e), (inner, emitted, true))),
                    None if emitted => return None,
                    None => {
                        return Some((
                            Err(LlmError::validation(
                                provider,
                                "stream finished without any text",
                                "",
                            )),
                            (inner, emitted, true),
                        ));
                    }
                }
            }
        },
    ))
}

/// Reads a non-2xx body into an upstream error, preferring the structured `error.message`.
pub(crate) async fn upstream_failure(provider: Provider, response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return LlmError::transport(provider, e),
    };
    let message = error_message_from_body(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("http status {status}")
        } else {
            body.clone()
        }
    });
    tracing::warn!(%provider, status, %message, "upstream returned an error");
    LlmError::upstream(provider, status, message)
}

/// Error event delivered inside a 200 stream; the kind comes from `error.type` when the
/// provider names one.
pub(crate) fn stream_failure(provider: Provider, status: u16, data: &str) -> LlmError {
    let message = error_message_from_body(data).unwrap_or_else(|| {
        if data.trim().is_empty() {
            "stream reported an error".to_string()
        } else {
            data.to_string()
        }
    });
    let kind = error_type_from_body(data)
        .and_then(|t| ApiErrorKind::from_error_type(&t))
        .unwrap_or_else(|| ApiErrorKind::from_status(status));
    tracing::warn!(%provider, ?kind, %message, "stream reported an error");
    LlmError::Upstream {
        provider,
        status,
        kind,
        message,
    }
}

fn error_type_from_body(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    v.get("error")?
        .get("type")
        .and_then(|t| t.as_str())
        .map(str::to_string)
}

/// Both providers nest the human-readable message at `error.message`.
pub(crate) fn error_message_from_body(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    let err = v.get("error")?;
    match err {
        serde_json::Value::String(s) => Some(s.clone()),
        other => other
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_stream_becomes_validation_error() {
        let mut s = guard_fragments(
            Provider::OpenAi,
            futures_util::stream::iter(vec![Ok(String::new())]),
        );
        let first = s.next().await.expect("one item");
        assert!(matches!(first, Err(LlmError::Validation { .. })));
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn whitespace_only_stream_ends_in_validation_error() {
        let items = vec![Ok("\n\n".to_string()), Ok("  ".to_string())];
        let s = guard_fragments(Provider::OpenAi, futures_util::stream::iter(items));
        let got: Vec<Result<String>> = s.collect().await;
        assert_eq!(got.len(), 3);
        assert!(matches!(
            got.last(),
            Some(Err(LlmError::Validation {
                provider: Provider::OpenAi,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn leading_whitespace_then_text_is_accepted() {
        let items = vec![Ok("\n".to_string()), Ok("hi".to_string())];
        let s = guard_fragments(Provider::Anthropic, futures_util::stream::iter(items));
        let got: Vec<String> = s.map(|f| f.expect("fragment")).collect().await;
        assert_eq!(got, vec!["\n".to_string(), "hi".to_string()]);
    }

    #[test]
    fn stream_error_kind_follows_error_type() {
        let overloaded = stream_failure(
            Provider::Anthropic,
            200,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        assert!(matches!(
            overloaded,
            LlmError::Upstream {
                kind: ApiErrorKind::Server,
                status: 200,
                ..
            }
        ));

        let limited = stream_failure(
            Provider::OpenAi,
            200,
            r#"{"error":{"type":"rate_limit_error","message":"slow down"}}"#,
        );
        assert!(matches!(
            limited,
            LlmError::Upstream {
                kind: ApiErrorKind::RateLimited,
                ..
            }
        ));

        let unnamed = stream_failure(Provider::OpenAi, 200, r#"{"error":"boom"}"#);
        assert!(matches!(
            unnamed,
            LlmError::Upstream {
                kind: ApiErrorKind::Other,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stream_stops_after_first_error() {
        let items = vec![
            Ok("a".to_string()),
            Err(LlmError::InvalidInput("boom".to_string())),
            Ok("b".to_string()),
        ];
        let mut s = guard_fragments(Provider::Anthropic, futures_util::stream::iter(items));
        assert_eq!(s.next().await.expect("a").expect("ok"), "a");
        assert!(s.next().await.expect("err").is_err());
        assert!(s.next().await.is_none());
    }

    #[test]
    fn error_message_is_read_from_both_shapes() {
        assert_eq!(
            error_message_from_body(r#"{"error":{"message":"bad key","type":"invalid_request_error"}}"#),
            Some("bad key".to_string())
        );
        assert_eq!(
            error_message_from_body(
                r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#
            ),
            Some("Overloaded".to_string())
        );
        assert_eq!(error_message_from_body("<html>502</html>"), None);
    }
}
