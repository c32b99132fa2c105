//! Glob matching for a single path component.
//!
//! Supported syntax:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from the set or range
//! - `[!abc]` or `[^abc]` match one character NOT in the set
//! - `{a,b,c}` brace alternatives, nestable
//! - `\x` matches `x` literally
//!
//! Patterns are compiled once into tokens and matched with a single
//! backtrack point, so matching is O(pattern × input) with no recursion.

/// Check if a string contains glob metacharacters (`*`, `?`, `[`, `{`).
///
/// ```
/// use repoglob_glob::contains_glob;
/// assert!(contains_glob("*.rs"));
/// assert!(contains_glob("src/[ab]*.txt"));
/// assert!(contains_glob("*.{md,txt}"));
/// assert!(!contains_glob("src/main.rs"));
/// ```
pub fn contains_glob(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Match a string against a glob pattern.
///
/// Compiles the pattern on every call; use [`Pattern`] when matching the
/// same pattern against many names.
///
/// ```
/// use repoglob_glob::glob_match;
///
/// assert!(glob_match("*.rs", "main.rs"));
/// assert!(glob_match("test?", "test1"));
/// assert!(glob_match("*.{rs,go}", "main.go"));
/// assert!(!glob_match("*.txt", "main.rs"));
/// ```
pub fn glob_match(pattern: &str, input: &str) -> bool {
    Pattern::new(pattern).matches(input)
}

/// A compiled single-component pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    alternatives: Vec<Vec<Token>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Char(char),
    One,
    Many,
    Class(CharClass),
}

#[derive(Debug, Clone, PartialEq)]
struct CharClass {
    negated: bool,
    ranges: Vec<(char, char)>,
}

impl CharClass {
    fn contains(&self, c: char) -> bool {
        let hit = self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
        hit != self.negated
    }
}

impl Pattern {
    /// Compile a pattern, expanding braces into alternatives.
    pub fn new(pattern: &str) -> Self {
        let alternatives = expand_braces(pattern)
            .iter()
            .map(|alt| compile(alt))
            .collect();
        Self {
            source: pattern.to_string(),
            alternatives,
        }
    }

    /// The pattern text this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if any alternative matches the whole input.
    pub fn matches(&self, input: &str) -> bool {
        let input: Vec<char> = input.chars().collect();
        self.alternatives
            .iter()
            .any(|tokens| match_tokens(tokens, &input))
    }

    /// Returns true if every alternative starts with a literal `.`.
    ///
    /// Used to decide whether the pattern is allowed to match dotfiles.
    pub fn starts_with_dot(&self) -> bool {
        self.alternatives
            .iter()
            .all(|tokens| matches!(tokens.first(), Some(Token::Char('.'))))
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

fn compile(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut idx = 0;

    while idx < chars.len() {
        match chars[idx] {
            '*' => {
                if tokens.last() != Some(&Token::Many) {
                    tokens.push(Token::Many);
                }
                idx += 1;
            }
            '?' => {
                tokens.push(Token::One);
                idx += 1;
            }
            '[' => match parse_class(&chars[idx..]) {
                Some((class, used)) => {
                    tokens.push(Token::Class(class));
                    idx += used;
                }
                // Unclosed bracket is a literal
                None => {
                    tokens.push(Token::Char('['));
                    idx += 1;
                }
            },
            '\\' if idx + 1 < chars.len() => {
                tokens.push(Token::Char(chars[idx + 1]));
                idx += 2;
            }
            c => {
                tokens.push(Token::Char(c));
                idx += 1;
            }
        }
    }

    tokens
}

/// Parse `[...]` at the start of `chars`. Returns the class and the number of
/// chars consumed, or `None` if the bracket never closes.
fn parse_class(chars: &[char]) -> Option<(CharClass, usize)> {
    let mut idx = 1;
    let negated = matches!(chars.get(idx), Some('!' | '^'));
    if negated {
        idx += 1;
    }

    let first = idx;
    let mut ranges = Vec::new();

    while idx < chars.len() {
        let c = chars[idx];
        // `]` right after the opening bracket is a member, not the end
        if c == ']' && idx > first {
            return Some((CharClass { negated, ranges }, idx + 1));
        }
        if chars.get(idx + 1) == Some(&'-') && chars.get(idx + 2).is_some_and(|&end| end != ']') {
            ranges.push((c, chars[idx + 2]));
            idx += 3;
        } else {
            ranges.push((c, c));
            idx += 1;
        }
    }

    None
}

fn match_tokens(tokens: &[Token], input: &[char]) -> bool {
    let (mut t, mut i) = (0, 0);
    // Resume point after the most recent `*`: (token index, input index)
    let mut resume: Option<(usize, usize)> = None;

    while i < input.len() {
        let step = match tokens.get(t) {
            Some(Token::Many) => {
                resume = Some((t + 1, i));
                t += 1;
                continue;
            }
            Some(Token::One) => true,
            Some(Token::Char(c)) => *c == input[i],
            Some(Token::Class(class)) => class.contains(input[i]),
            None => false,
        };

        if step {
            t += 1;
            i += 1;
        } else if let Some((rt, ri)) = resume {
            // Let the last `*` swallow one more character and retry
            t = rt;
            i = ri + 1;
            resume = Some((rt, ri + 1));
        } else {
            return false;
        }
    }

    tokens[t..].iter().all(|tok| *tok == Token::Many)
}

/// Expand brace expressions in a pattern.
///
/// `{a,b,c}` expands to one pattern per alternative; nested and repeated
/// groups expand left to right. An unclosed `{` is kept literally.
///
/// ```
/// use repoglob_glob::expand_braces;
///
/// assert_eq!(expand_braces("plain"), vec!["plain"]);
/// assert_eq!(expand_braces("*.{md,txt}"), vec!["*.md", "*.txt"]);
/// assert_eq!(expand_braces("{a,b}{1,2}"), vec!["a1", "a2", "b1", "b2"]);
/// ```
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = first_brace_group(pattern) else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];

    split_alternatives(&pattern[open + 1..close])
        .into_iter()
        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
        .collect()
}

/// Byte offsets of the first top-level `{` and its matching `}`.
fn first_brace_group(pattern: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut open = None;
    let mut escaped = false;

    for (idx, c) in pattern.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => {
                if depth == 0 {
                    open = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return open.map(|o| (o, idx));
                }
            }
            _ => {}
        }
    }

    None
}

fn split_alternatives(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals() {
        assert!(glob_match("a.txt", "a.txt"));
        assert!(glob_match("", ""));
        assert!(!glob_match("a.txt", "a.txtx"));
        assert!(!glob_match("a.txt", "a.tx"));
    }

    #[test]
    fn star_and_question() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*.txt", "a.txt"));
        assert!(glob_match("*.txt", ".txt"));
        assert!(!glob_match("*.txt", "b.md"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("a*b*c", "aXXbYY"));
        assert!(glob_match("??.md", "ab.md"));
        assert!(!glob_match("??.md", "a.md"));
    }

    #[test]
    fn backtracking_after_partial_match() {
        assert!(glob_match("*ab", "aab"));
        assert!(glob_match("*abc*abc", "abcabcxabc"));
        assert!(!glob_match("*a*a*a*a*a*a*a*b", &"a".repeat(200)));
    }

    #[test]
    fn char_classes() {
        assert!(glob_match("[abc].rs", "b.rs"));
        assert!(!glob_match("[abc].rs", "d.rs"));
        assert!(glob_match("v[0-9]", "v7"));
        assert!(glob_match("[!a-c]x", "dx"));
        assert!(!glob_match("[^a-c]x", "bx"));
        assert!(glob_match("[]]", "]"));
        assert!(glob_match("[a-]", "-"));
    }

    #[test]
    fn unclosed_bracket_is_literal() {
        assert!(glob_match("[abc", "[abc"));
        assert!(!glob_match("[abc", "a"));
    }

    #[test]
    fn escapes() {
        assert!(glob_match(r"\*.txt", "*.txt"));
        assert!(!glob_match(r"\*.txt", "a.txt"));
        assert!(glob_match(r"a\?", "a?"));
    }

    #[test]
    fn braces() {
        assert_eq!(expand_braces("{a,{b,c}}d"), vec!["ad", "bd", "cd"]);
        assert_eq!(expand_braces("x{,y}"), vec!["x", "xy"]);
        assert_eq!(expand_braces("open{a,b"), vec!["open{a,b"]);
        assert!(glob_match("*.{md,txt}", "notes.txt"));
        assert!(!glob_match("*.{md,txt}", "notes.rs"));
    }

    #[test]
    fn unicode_names() {
        assert!(glob_match("caf?", "café"));
        assert!(glob_match("*ü*", "grün"));
    }

    #[test]
    fn dot_prefix_detection() {
        assert!(Pattern::new(".*").starts_with_dot());
        assert!(Pattern::new(".{a,b}").starts_with_dot());
        assert!(!Pattern::new("*").starts_with_dot());
        assert!(!Pattern::new("{.a,b}").starts_with_dot());
    }
}
