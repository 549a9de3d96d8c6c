use once_cell::sync::Lazy;
use regex::Regex;

use crate::entities::contact::ContactForm;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("email pattern is valid")
});

/// Entities produced by [`sanitize`]. An `&` already starting one of them
/// is kept as is.
const ESCAPES: [&str; 4] = ["&amp;", "&quot;", "&#x27;", "&#x2F;"];

/// True iff name, email, subject and message are all present and non-blank.
pub fn validate_required(form: &ContactForm) -> bool {
    [&form.name, &form.email, &form.subject, &form.message]
        .into_iter()
        .all(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
}

/// Checks the `local@domain.tld` shape of the value as submitted.
pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Strips `<` and `>`, trims, then escapes `&`, `"`, `'` and `/`.
///
/// Idempotent: `sanitize(&sanitize(s)) == sanitize(s)`.
pub fn sanitize(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !matches!(c, '<' | '>')).collect();
    let trimmed = stripped.trim();

    let mut out = String::with_capacity(trimmed.len() + trimmed.len() / 4);
    for (i, c) in trimmed.char_indices() {
        match c {
            '&' if ESCAPES.iter().any(|e| trimmed[i..].starts_with(e)) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}
