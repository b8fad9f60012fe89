//! Error and debug reporting surface.
//!
//! The core never prints by itself: passes hand [`ErrorMessage`] values to an
//! [`ErrorLogger`] supplied by the caller. Locations are resolved from the
//! stream when the message is built, so a message stays valid after further
//! stream mutation.

use strum_macros::{Display, EnumString, IntoStaticStr};

use crate::stream::TokenStream;
use crate::token::TokenId;

/// Message classification, most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Style,
    Performance,
    Portability,
    Information,
    Debug,
}

/// One resolved source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub file_index: u32,
    pub line: u32,
}

/// A report with its resolved call stack.
#[derive(Debug, Clone)]
pub struct ErrorMessage {
    pub callstack: Vec<SourceLocation>,
    pub severity: Severity,
    pub id: String,
    pub message: String,
}

impl ErrorMessage {
    /// Build a message, resolving each callstack token to its location.
    /// Stale ids (already erased tokens) are skipped.
    pub fn new(
        stream: &TokenStream,
        callstack: &[TokenId],
        severity: Severity,
        id: &str,
        message: impl Into<String>,
    ) -> Self {
        let callstack = callstack
            .iter()
            .filter_map(|&t| stream.opt_token(t))
            .map(|t| SourceLocation { file_index: t.file_index, line: t.line })
            .collect();
        ErrorMessage {
            callstack,
            severity,
            id: id.to_string(),
            message: message.into(),
        }
    }
}

/// Sink for messages produced by the passes.
pub trait ErrorLogger {
    fn report_err(&mut self, msg: ErrorMessage);
}

/// Logger that forwards everything to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl ErrorLogger for TracingLogger {
    fn report_err(&mut self, msg: ErrorMessage) {
        let line = msg.callstack.first().map(|l| l.line).unwrap_or(0);
        match msg.severity {
            Severity::Error => {
                tracing::error!(id = %msg.id, line, "{}", msg.message)
            }
            Severity::Debug => {
                tracing::debug!(id = %msg.id, line, "{}", msg.message)
            }
            _ => tracing::warn!(id = %msg.id, line, "{}", msg.message),
        }
    }
}

/// Logger that keeps every message; used by tests.
#[derive(Debug, Default)]
pub struct CollectingLogger {
    pub messages: Vec<ErrorMessage>,
}

impl CollectingLogger {
    pub fn contains(&self, text: &str) -> bool {
        self.messages.iter().any(|m| m.message.contains(text))
    }
}

impl ErrorLogger for CollectingLogger {
    fn report_err(&mut self, msg: ErrorMessage) {
        self.messages.push(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Debug.to_string(), "debug");
        assert_eq!(Severity::Performance.to_string(), "performance");
        assert_eq!("style".parse::<Severity>().unwrap(), Severity::Style);
    }

    #[test]
    fn test_message_resolves_locations() {
        let mut stream = TokenStream::new();
        let t = stream.push_back(Token::new("x", 2, 14));
        let msg = ErrorMessage::new(&stream, &[t], Severity::Debug, "debug", "note");
        assert_eq!(msg.callstack, vec![SourceLocation { file_index: 2, line: 14 }]);
    }

    #[test]
    fn test_collecting_logger() {
        let stream = TokenStream::new();
        let mut logger = CollectingLogger::default();
        logger.report_err(ErrorMessage::new(&stream, &[], Severity::Debug, "debug", "bailing out"));
        assert!(logger.contains("bailing"));
    }
}
