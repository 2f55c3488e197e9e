use thiserror::Error;

/// Why a single declaration was dropped.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid regular expression `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
    #[error("Malformed wildcard pattern: {0}")]
    MalformedWildcard(String),
    #[error("Negation requires a regular expression: {0}")]
    NegatedLiteral(String),
    #[error("Negated matcher: {0}")]
    NegatedMatcher(String),
    #[error("Empty declaration")]
    EmptyDeclaration,
}
