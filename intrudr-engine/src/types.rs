//! Core data types for the fuzzing engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Ordered HTTP header list.
///
/// Keys keep the case they were captured with and insertion order is
/// preserved, so a replayed request looks like the one that was pasted in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeaders {
    entries: Vec<(String, String)>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, replacing the value of an existing entry with the
    /// exact same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Set a header matching `name` case-insensitively, keeping its position
    /// and captured spelling. Appends when absent.
    pub fn set_ignore_case(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive lookup, used for the well-known headers that drive
    /// URL resolution.
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for HttpHeaders {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut headers = HttpHeaders::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// How a token is located in the template text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// `name=value` pair found in the query string, body or referer
    Parameter,
    /// `^^literal^^` span; `literal` is the text between the markers
    Placeholder { literal: String },
}

/// A substitutable position in a request template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Parameter name, or `PH1..PHn` for placeholders
    pub id: String,
    pub kind: TokenKind,
    /// Value captured when the template was parsed
    pub default: String,
}

impl Token {
    pub fn parameter(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            id: name.into(),
            kind: TokenKind::Parameter,
            default: default.into(),
        }
    }

    pub fn placeholder(sequence: usize, literal: impl Into<String>) -> Self {
        let literal = literal.into();
        Self {
            id: format!("PH{}", sequence),
            default: literal.clone(),
            kind: TokenKind::Placeholder { literal },
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, TokenKind::Placeholder { .. })
    }

    /// The wrapped text this placeholder replaces, markers included
    pub fn wrapped_literal(&self) -> Option<String> {
        match &self.kind {
            TokenKind::Placeholder { literal } => Some(format!(
                "{}{}{}",
                crate::parser::PLACEHOLDER_MARKER,
                literal,
                crate::parser::PLACEHOLDER_MARKER
            )),
            TokenKind::Parameter => None,
        }
    }
}

/// Parsed request template. Never mutated after parsing; every job works on
/// its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTemplate {
    pub method: String,
    pub path: String,
    pub headers: HttpHeaders,
    pub body: String,
    /// Discovery order: named parameters first, then placeholders
    pub tokens: Vec<Token>,
}

impl RequestTemplate {
    pub fn token_ids(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.id.clone()).collect()
    }

    pub fn token(&self, id: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == id)
    }
}

/// One combination of token values, aligned to the template's token order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// 1-based position in generation order
    pub index: usize,
    pub values: Vec<String>,
}

impl Job {
    pub fn new(index: usize, values: Vec<String>) -> Self {
        Self { index, values }
    }

    /// `name-value` pairs joined with `_`, in token order
    pub fn summary(&self, token_order: &[String]) -> String {
        token_order
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| format!("{}-{}", name, value))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Fully substituted request, ready for the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteRequest {
    pub method: String,
    pub url: url::Url,
    pub headers: HttpHeaders,
    pub body: String,
}

impl ConcreteRequest {
    /// Path plus query as it appears on the request line
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    /// Human-readable rendering stored with each result
    pub fn request_text(&self) -> String {
        let headers = if self.headers.is_empty() {
            "(no headers)".to_string()
        } else {
            self.headers
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let body = if self.body.is_empty() {
            "(empty)"
        } else {
            self.body.as_str()
        };
        format!(
            "{} {} HTTP/1.1\n{}\n\n{}",
            self.method,
            self.path_and_query(),
            headers,
            body
        )
    }

    /// HTTP/1.1 wire form: request line, CRLF-terminated headers, blank
    /// line, body.
    pub fn raw_bytes(&self) -> Vec<u8> {
        let mut head = format!("{} {} HTTP/1.1\r\n", self.method, self.path_and_query());
        for (k, v) in self.headers.iter() {
            head.push_str(k);
            head.push_str(": ");
            head.push_str(v);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut raw = head.into_bytes();
        raw.extend_from_slice(self.body.as_bytes());
        raw
    }
}

/// Outcome of one job, produced by the dispatcher and consumed once by the
/// sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub index: usize,
    /// See [`Job::summary`]
    pub params: String,
    pub status: Option<u16>,
    /// Decoded response length in characters
    pub length: usize,
    /// Measured from the first send attempt; the pre-send jitter is excluded
    pub elapsed: Duration,
    pub error: Option<String>,
    pub request_text: String,
    pub response_body: String,
    pub raw_path: Option<PathBuf>,
}

impl ResultRecord {
    /// Create an empty record for a job
    pub fn new(index: usize, params: String) -> Self {
        Self {
            index,
            params,
            status: None,
            length: 0,
            elapsed: Duration::ZERO,
            error: None,
            request_text: String::new(),
            response_body: String::new(),
            raw_path: None,
        }
    }

    /// Failure record with no response data
    pub fn failed(index: usize, params: String, error: impl Into<String>) -> Self {
        Self::new(index, params).with_error(error)
    }

    /// Stand-in for a job whose result never arrived
    pub fn missing(index: usize) -> Self {
        Self::failed(index, "(missing)".to_string(), "missing result")
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_response(mut self, status: u16, body: String, elapsed: Duration) -> Self {
        self.status = Some(status);
        self.length = body.chars().count();
        self.response_body = body;
        self.elapsed = elapsed;
        self
    }

    /// A response came back and nothing went wrong
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ConcreteRequest {
        let mut headers = HttpHeaders::new();
        headers.insert("Host", "example.com");
        headers.insert("Content-Type", "application/x-www-form-urlencoded");
        ConcreteRequest {
            method: "POST".to_string(),
            url: url::Url::parse("http://example.com/login?next=/home").unwrap(),
            headers,
            body: "user=alice".to_string(),
        }
    }

    #[test]
    fn test_headers_keep_insertion_order_and_case() {
        let mut headers = HttpHeaders::new();
        headers.insert("X-B", "1");
        headers.insert("x-a", "2");
        headers.insert("X-B", "3");

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("X-B", "3"), ("x-a", "2")]);
        assert_eq!(headers.get("X-A"), None);
        assert_eq!(headers.get_ignore_case("X-A"), Some("2"));
    }

    #[test]
    fn test_set_ignore_case_replaces_in_place() {
        let mut headers = HttpHeaders::new();
        headers.insert("Host", "a");
        headers.insert("user-agent", "curl");
        headers.insert("Accept", "*/*");

        headers.set_ignore_case("User-Agent", "Mozilla");
        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(
            collected,
            vec![("Host", "a"), ("user-agent", "Mozilla"), ("Accept", "*/*")]
        );

        headers.set_ignore_case("X-New", "1");
        assert_eq!(headers.len(), 4);
    }

    #[test]
    fn test_request_text_rendering() {
        let text = sample_request().request_text();
        assert_eq!(
            text,
            "POST /login?next=/home HTTP/1.1\nHost: example.com\nContent-Type: application/x-www-form-urlencoded\n\nuser=alice"
        );
    }

    #[test]
    fn test_request_text_placeholders_for_empty_parts() {
        let request = ConcreteRequest {
            method: "GET".to_string(),
            url: url::Url::parse("http://example.com/").unwrap(),
            headers: HttpHeaders::new(),
            body: String::new(),
        };
        assert_eq!(request.request_text(), "GET / HTTP/1.1\n(no headers)\n\n(empty)");
    }

    #[test]
    fn test_raw_bytes_wire_format() {
        let raw = sample_request().raw_bytes();
        let expected = b"POST /login?next=/home HTTP/1.1\r\nHost: example.com\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nuser=alice";
        assert_eq!(raw, expected.to_vec());
    }

    #[test]
    fn test_job_summary() {
        let job = Job::new(1, vec!["alice".to_string(), "x".to_string()]);
        let order = vec!["user".to_string(), "pass".to_string()];
        assert_eq!(job.summary(&order), "user-alice_pass-x");
    }

    #[test]
    fn test_record_length_counts_characters() {
        let record = ResultRecord::new(1, String::new()).with_response(
            200,
            "héllo".to_string(),
            Duration::from_millis(5),
        );
        assert_eq!(record.length, 5);
        assert!(record.is_success());
    }

    #[test]
    fn test_missing_record() {
        let record = ResultRecord::missing(7);
        assert_eq!(record.index, 7);
        assert_eq!(record.error.as_deref(), Some("missing result"));
        assert!(record.status.is_none());
        assert!(!record.is_success());
    }
}
