//! Raw request parsing and token detection
//!
//! Turns a pasted HTTP request into a [`RequestTemplate`]: request line,
//! ordered headers, body, and the tokens that can be fuzzed. Tokens are
//! either `name=value` parameters discovered in the query string or body,
//! or spans wrapped in `^^...^^` markers.

use crate::error::{AttackError, AttackResult};
use crate::types::{HttpHeaders, RequestTemplate, Token};
use regex::Regex;
use std::collections::HashSet;

/// Wrapper marking a placeholder span in the raw request
pub const PLACEHOLDER_MARKER: &str = "^^";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

lazy_static::lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"(?s)\^\^(.*?)\^\^").unwrap();
    // key=value pairs in bodies that are not form encoded
    static ref LOOSE_PAIR_RE: Regex = Regex::new(r"([^\s&=]+)=([^&\r\n]*)").unwrap();
}

/// Parser for raw HTTP requests
pub struct RequestParser;

impl RequestParser {
    /// Parse a raw request and detect its tokens
    pub fn parse(raw: &str) -> AttackResult<RequestTemplate> {
        let (method, path, headers, body) = Self::split_request(raw)?;
        let tokens = Self::detect_tokens(&path, &body, &headers);

        Ok(RequestTemplate {
            method,
            path,
            headers,
            body,
            tokens,
        })
    }

    /// Split a raw request into method, target, headers and body
    pub fn split_request(raw: &str) -> AttackResult<(String, String, HttpHeaders, String)> {
        let trimmed = raw.trim();
        let mut lines = trimmed.lines();

        let first = lines
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| AttackError::template("Empty request"))?;

        let mut parts = first.splitn(3, ' ');
        let method = parts.next().unwrap_or_default().to_uppercase();
        let path = match parts.next() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => return Err(AttackError::template("Malformed request line")),
        };

        let mut headers = HttpHeaders::new();
        let mut body_lines = Vec::new();
        let mut in_body = false;

        for line in lines {
            if !in_body && line.trim().is_empty() {
                in_body = true;
                continue;
            }
            if in_body {
                body_lines.push(line.trim_end_matches(['\r', '\n']));
            } else if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim(), value.trim());
            }
        }

        let body = body_lines.join("\n").trim().to_string();
        Ok((method, path, headers, body))
    }

    /// Detect named parameters and placeholders, in discovery order
    pub fn detect_tokens(path: &str, body: &str, headers: &HttpHeaders) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut seen = HashSet::new();

        let mut add_param = |tokens: &mut Vec<Token>, name: String, value: String| {
            // A wrapped placeholder owns this site
            if value.contains(PLACEHOLDER_MARKER) || name.contains(PLACEHOLDER_MARKER) {
                return;
            }
            if seen.insert(name.clone()) {
                tokens.push(Token::parameter(name, value));
            }
        };

        for (k, v) in query_pairs(path) {
            add_param(&mut tokens, k, v);
        }

        let is_form = headers
            .get_ignore_case("Content-Type")
            .map(|ct| ct.to_lowercase().contains(FORM_CONTENT_TYPE))
            .unwrap_or(false);

        if is_form {
            for (k, v) in form_pairs(body) {
                add_param(&mut tokens, k, v);
            }
        } else {
            for caps in LOOSE_PAIR_RE.captures_iter(body) {
                add_param(&mut tokens, caps[1].to_string(), caps[2].to_string());
            }
        }

        if tokens.is_empty() {
            let fallback = headers
                .get_ignore_case("Referer")
                .or_else(|| headers.get_ignore_case("Origin"))
                .unwrap_or_default();
            for (k, v) in query_pairs(fallback) {
                add_param(&mut tokens, k, v);
            }
        }

        let mut literals: Vec<String> = Vec::new();
        let fields = std::iter::once(path)
            .chain(std::iter::once(body))
            .chain(headers.iter().map(|(_, v)| v));
        for field in fields {
            for caps in PLACEHOLDER_RE.captures_iter(field) {
                let literal = caps[1].to_string();
                if !literals.contains(&literal) {
                    literals.push(literal);
                }
            }
        }
        for (i, literal) in literals.into_iter().enumerate() {
            tokens.push(Token::placeholder(i + 1, literal));
        }

        tokens
    }
}

/// Decoded query pairs of a path or URL; blank values are kept
fn query_pairs(target: &str) -> Vec<(String, String)> {
    let Some((_, query)) = target.split_once('?') else {
        return Vec::new();
    };
    let query = query.split('#').next().unwrap_or_default();
    form_pairs(query)
}

fn form_pairs(input: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}
