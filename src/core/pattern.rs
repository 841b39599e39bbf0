//! Glob matching for file names
//!
//! The dialect is deliberately small: `*` matches any run of characters
//! (including none), `?` matches exactly one character, and every other
//! character, brackets and braces included, matches itself. Matching is
//! case-insensitive and anchored to the whole name.
//!
//! Matching runs in `O(name * pattern)` time with a single star restart
//! point, so no pattern can trigger exponential backtracking.

use crate::error::PatternError;

/// Longest pattern accepted by [`Pattern::compile`]
pub const MAX_PATTERN_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    AnyRun,
    AnyOne,
    Literal(char),
}

/// A compiled glob pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    tokens: Vec<Token>,
}

impl Pattern {
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern.chars().count() > MAX_PATTERN_LEN {
            return Err(PatternError::TooLong {
                pattern: pattern.chars().take(32).collect(),
                max: MAX_PATTERN_LEN,
            });
        }
        if pattern.contains('\0') {
            return Err(PatternError::Nul {
                pattern: pattern.to_string(),
            });
        }
        if pattern.chars().any(std::path::is_separator) {
            return Err(PatternError::PathSeparator {
                pattern: pattern.to_string(),
            });
        }

        let mut tokens = Vec::with_capacity(pattern.len());
        for c in pattern.chars() {
            match c {
                // Consecutive stars are equivalent to one
                '*' if tokens.last() == Some(&Token::AnyRun) => {}
                '*' => tokens.push(Token::AnyRun),
                '?' => tokens.push(Token::AnyOne),
                c => tokens.push(Token::Literal(fold(c))),
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            tokens,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `name` matches this pattern
    pub fn is_match(&self, name: &str) -> bool {
        let text: Vec<char> = name.chars().map(fold).collect();
        let tokens = &self.tokens;

        let mut t = 0;
        let mut p = 0;
        let mut restart: Option<(usize, usize)> = None;

        while t < text.len() {
            match tokens.get(p) {
                Some(Token::AnyOne) => {
                    t += 1;
                    p += 1;
                }
                Some(Token::Literal(c)) if *c == text[t] => {
                    t += 1;
                    p += 1;
                }
                Some(Token::AnyRun) => {
                    restart = Some((p, t));
                    p += 1;
                }
                _ => match restart {
                    // Let the last star absorb one more character and retry
                    Some((star, consumed)) => {
                        p = star + 1;
                        t = consumed + 1;
                        restart = Some((star, consumed + 1));
                    }
                    None => return false,
                },
            }
        }

        tokens[p..].iter().all(|token| *token == Token::AnyRun)
    }
}

/// Case-fold one character without changing the character count, so `?`
/// always consumes exactly one character of the name. Characters whose
/// lowercase form is longer than one character compare as themselves.
fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(folded), None) => folded,
        _ => c,
    }
}

/// Match `name` against a glob `pattern`.
///
/// Fails closed: a pattern that does not compile never matches, and the
/// compile error is logged.
pub fn matches(name: &str, pattern: &str) -> bool {
    match Pattern::compile(pattern) {
        Ok(compiled) => compiled.is_match(name),
        Err(err) => {
            tracing::warn!("Rejecting pattern {:?}: {}", pattern, err);
            false
        }
    }
}

/// The include pattern and exclusions of one target, compiled together so
/// that a bad exclusion disables the target instead of widening it.
#[derive(Debug, Clone)]
pub struct PatternSet {
    include: Pattern,
    exclude: Vec<Pattern>,
}

impl PatternSet {
    pub fn compile(include: &str, exclude: &[String]) -> Result<Self, PatternError> {
        let include = Pattern::compile(include)?;
        let exclude = exclude
            .iter()
            .map(|p| Pattern::compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { include, exclude })
    }

    /// True when `name` matches the include pattern and no exclusion
    pub fn accepts(&self, name: &str) -> bool {
        self.include.is_match(name) && !self.is_excluded(name)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|p| p.is_match(name))
    }
}
