//! Substitution of job values into a request template
//!
//! Substitution sites are located on the original template text and then
//! applied in a single pass, so an injected value is never scanned again.
//! A named parameter site is `name=value` where `name` starts at a key
//! boundary (start of text, `?`, `&`, `;`, `,` or whitespace); the value runs
//! up to the next `&` or whitespace, or up to another substituted `name=`
//! nested inside it. A placeholder site is the full `^^literal^^` span.

use crate::error::{AttackError, AttackResult};
use crate::types::{ConcreteRequest, HttpHeaders, RequestTemplate, TokenKind};
use std::sync::Arc;
use url::Url;

/// One replacement inside a text field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Site<'a> {
    start: usize,
    end: usize,
    value: &'a str,
}

impl Site<'_> {
    fn overlaps(&self, other: &Site<'_>) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A token paired with the value it takes in one job
enum Rule<'a> {
    Parameter { name: &'a str, value: &'a str },
    Placeholder { wrapped: String, value: &'a str },
}

fn is_key_boundary(c: char) -> bool {
    matches!(c, '?' | '&' | ';' | ',') || c.is_whitespace()
}

/// Named parameter site; `key` is where `name=` starts
struct ParameterSite<'a> {
    key: usize,
    site: Site<'a>,
}

fn parameter_sites<'a>(text: &str, name: &str, value: &'a str) -> Vec<ParameterSite<'a>> {
    let needle = format!("{}=", name);
    let mut sites = Vec::new();

    for (pos, _) in text.match_indices(&needle) {
        let at_boundary = text[..pos]
            .chars()
            .next_back()
            .map_or(true, is_key_boundary);
        if !at_boundary {
            continue;
        }

        let start = pos + needle.len();
        let end = text[start..]
            .find(|c: char| c == '&' || c.is_whitespace())
            .map_or(text.len(), |offset| start + offset);
        sites.push(ParameterSite {
            key: pos,
            site: Site { start, end, value },
        });
    }

    sites
}

fn apply_rules(text: &str, rules: &[Rule<'_>]) -> String {
    let mut accepted: Vec<Site<'_>> = Vec::new();

    // Placeholders are explicit and win over any parameter site they overlap
    for rule in rules {
        if let Rule::Placeholder { wrapped, value } = rule {
            for (start, matched) in text.match_indices(wrapped.as_str()) {
                let site = Site {
                    start,
                    end: start + matched.len(),
                    value: *value,
                };
                if !accepted.iter().any(|s| s.overlaps(&site)) {
                    accepted.push(site);
                }
            }
        }
    }

    let mut parameters: Vec<ParameterSite<'_>> = rules
        .iter()
        .flat_map(|rule| match rule {
            Rule::Parameter { name, value } => parameter_sites(text, name, *value),
            Rule::Placeholder { .. } => Vec::new(),
        })
        .collect();

    // A value stops before the boundary of another token's `name=` inside it
    let keys: Vec<usize> = parameters.iter().map(|p| p.key).collect();
    for parameter in &mut parameters {
        let site = &mut parameter.site;
        if let Some(inner) = keys
            .iter()
            .copied()
            .filter(|&key| key > site.start && key < site.end)
            .min()
        {
            site.end = inner - 1;
        }
    }

    for parameter in parameters {
        if !accepted.iter().any(|s| s.overlaps(&parameter.site)) {
            accepted.push(parameter.site);
        }
    }

    if accepted.is_empty() {
        return text.to_string();
    }

    accepted.sort_by_key(|s| s.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for site in accepted {
        out.push_str(&text[cursor..site.start]);
        out.push_str(site.value);
        cursor = site.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn is_absolute(path: &str) -> bool {
    let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Scheme for a relative target: https when Origin or Referer is https or
/// the Host names port 443, http otherwise.
pub fn determine_scheme(path: &str, headers: &HttpHeaders) -> String {
    if is_absolute(path) {
        if let Ok(url) = Url::parse(path) {
            return url.scheme().to_string();
        }
    }

    let secure_origin = ["Origin", "Referer"].iter().any(|name| {
        headers
            .get_ignore_case(name)
            .map(|v| v.to_ascii_lowercase().starts_with("https://"))
            .unwrap_or(false)
    });
    if secure_origin {
        return "https".to_string();
    }

    if let Some((_, port)) = headers.get_ignore_case("Host").and_then(|h| h.rsplit_once(':')) {
        if port.trim() == "443" {
            return "https".to_string();
        }
    }

    "http".to_string()
}

/// Absolute URL for a substituted path
pub fn resolve_url(path: &str, headers: &HttpHeaders) -> AttackResult<Url> {
    let url = if is_absolute(path) {
        path.to_string()
    } else {
        let host = headers
            .get_ignore_case("Host")
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(AttackError::MissingHost)?;
        let scheme = determine_scheme(path, headers);
        if path.starts_with('/') {
            format!("{}://{}{}", scheme, host, path)
        } else {
            format!("{}://{}/{}", scheme, host, path)
        }
    };

    Url::parse(&url).map_err(|e| AttackError::InvalidRequest {
        reason: format!("{}: {}", url, e),
    })
}

/// Apply one job's values to a template.
///
/// `values` is aligned with `token_order`; ids missing from the template are
/// rejected.
pub fn substitute(
    template: &RequestTemplate,
    token_order: &[String],
    values: &[String],
) -> AttackResult<ConcreteRequest> {
    if token_order.len() != values.len() {
        return Err(AttackError::InvalidAttackConfig {
            reason: format!(
                "job has {} values for {} tokens",
                values.len(),
                token_order.len()
            ),
        });
    }

    let mut rules = Vec::with_capacity(token_order.len());
    for (id, value) in token_order.iter().zip(values.iter()) {
        let token = template
            .token(id)
            .ok_or_else(|| AttackError::UnknownToken { token: id.clone() })?;
        let rule = match &token.kind {
            TokenKind::Parameter => Rule::Parameter {
                name: token.id.as_str(),
                value: value.as_str(),
            },
            TokenKind::Placeholder { .. } => Rule::Placeholder {
                wrapped: token.wrapped_literal().unwrap_or_default(),
                value: value.as_str(),
            },
        };
        rules.push(rule);
    }

    let path = apply_rules(&template.path, &rules);
    let body = apply_rules(&template.body, &rules);
    let mut headers = template.headers.clone();
    for value in headers.values_mut() {
        *value = apply_rules(value, &rules);
    }

    if headers.get_ignore_case("Content-Length").is_some() {
        headers.set_ignore_case("Content-Length", body.len().to_string());
    }

    let url = resolve_url(&path, &headers)?;

    Ok(ConcreteRequest {
        method: template.method.clone(),
        url,
        headers,
        body,
    })
}

/// Builds concrete requests for the dispatcher from a shared template
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    template: Arc<RequestTemplate>,
    token_order: Arc<Vec<String>>,
}

impl RequestBuilder {
    pub fn new(template: RequestTemplate, token_order: Vec<String>) -> Self {
        Self {
            template: Arc::new(template),
            token_order: Arc::new(token_order),
        }
    }

    pub fn token_order(&self) -> &[String] {
        &self.token_order
    }

    pub fn build(&self, values: &[String]) -> AttackResult<ConcreteRequest> {
        substitute(&self.template, &self.token_order, values)
    }
}
