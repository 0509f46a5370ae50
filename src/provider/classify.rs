//! Attempt Outcome Classification
//!
//! Pure heuristics that turn a raw provider response or error message into a
//! closed set of outcome tags. Free backends misbehave in recognizable ways:
//! blocked requests come back as HTML error pages with status 200, and rate
//! limiters announce themselves in error text rather than structured fields.

/// Classified outcome of one provider attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Non-empty plain-text completion
    Text(String),

    /// Body is an HTML document, not a completion
    Html,

    /// Body was empty or whitespace
    Empty,

    /// Error message indicates the provider's rate limiter fired
    RateLimited(String),

    /// Any other failure
    Failed(String),
}

const HTML_SIGNATURES: &[&str] = &["<!doctype html", "<html", "<head", "<body", "<script"];

/// Whether a response body is an HTML document rather than a completion
pub fn looks_like_html(body: &str) -> bool {
    let lowered = body.trim().to_lowercase();
    HTML_SIGNATURES.iter().any(|sig| lowered.contains(sig))
}

/// Whether an error message indicates rate limiting.
///
/// Matches an HTTP 429-style code, provider-specific limiter codes, or a
/// rate-limit keyword pair.
pub fn is_rate_limit_message(message: &str) -> bool {
    if message.contains("429") {
        return true;
    }

    let lowered = message.to_lowercase();
    lowered.contains("err_input_limit")
        || (lowered.contains("rate") && lowered.contains("limit"))
        || lowered.contains("too many requests")
        || lowered.contains("quota exceeded")
}

/// Classify a successful transport response body
pub fn classify_response(body: &str) -> Outcome {
    if looks_like_html(body) {
        return Outcome::Html;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Outcome::Empty;
    }
    Outcome::Text(trimmed.to_string())
}

/// Classify a provider error by its message
pub fn classify_error(message: &str) -> Outcome {
    if is_rate_limit_message(message) {
        Outcome::RateLimited(message.to_string())
    } else {
        Outcome::Failed(message.to_string())
    }
}
