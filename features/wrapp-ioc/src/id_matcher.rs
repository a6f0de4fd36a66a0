use std::fmt::Display;

/// Predicate over service ids, used by decorators and advisors to select the services they apply to.
///
/// Patterns are matched case-insensitively, `*` matches any run of characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdMatcher {
    Pattern(String),
    Or(Vec<IdMatcher>),
}
impl IdMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        IdMatcher::Pattern(pattern.into())
    }

    /// Matches every service
    pub fn any() -> Self {
        IdMatcher::Pattern("*".into())
    }

    pub fn or(self, other: impl Into<IdMatcher>) -> Self {
        match self {
            IdMatcher::Or(mut matchers) => {
                matchers.push(other.into());
                IdMatcher::Or(matchers)
            }
            single => IdMatcher::Or(vec![single, other.into()]),
        }
    }

    pub fn matches(&self, service_id: &str) -> bool {
        match self {
            IdMatcher::Pattern(pattern) => glob_matches(pattern, service_id),
            IdMatcher::Or(matchers) => matchers.iter().any(|m| m.matches(service_id)),
        }
    }
}
impl From<&str> for IdMatcher {
    fn from(pattern: &str) -> Self {
        IdMatcher::new(pattern)
    }
}
impl From<String> for IdMatcher {
    fn from(pattern: String) -> Self {
        IdMatcher::new(pattern)
    }
}
impl Display for IdMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdMatcher::Pattern(pattern) => f.write_str(pattern),
            IdMatcher::Or(matchers) => {
                let all: Vec<String> = matchers.iter().map(ToString::to_string).collect();
                write!(f, "({})", all.join(" or "))
            }
        }
    }
}

/// Case-insensitive glob match, only `*` is special
pub(crate) fn glob_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last '*' and the text position it currently absorbs up to
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, absorbed)) = backtrack {
            p = star + 1;
            t = absorbed + 1;
            backtrack = Some((star, absorbed + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
