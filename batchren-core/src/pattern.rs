use crate::error::{Error, Result};
use crate::options::Options;
use crate::scanner::Target;
use regex::{Regex, RegexBuilder};

/// How a source pattern is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMode {
    /// Shell glob, matched against the whole name
    Glob,
    /// Regular expression, searched anywhere in the name
    Regex,
}

/// A compiled source pattern
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: String,
    mode: PatternMode,
    keepext: bool,
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str, mode: PatternMode, ignorecase: bool, keepext: bool) -> Result<Self> {
        // An empty pattern selects everything
        let pattern = if pattern.is_empty() { "*" } else { pattern };

        let source = match mode {
            PatternMode::Glob => glob_to_regex(pattern),
            PatternMode::Regex => pattern.to_string(),
        };

        let regex = RegexBuilder::new(&source)
            .case_insensitive(ignorecase)
            .build()
            .map_err(|source| Error::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            mode,
            keepext,
            regex,
        })
    }

    /// Build a matcher using the `regex`, `ignorecase` and `keepext` options
    pub fn from_options(pattern: &str, options: &Options) -> Result<Self> {
        let mode = if options.regex {
            PatternMode::Regex
        } else {
            PatternMode::Glob
        };
        Self::new(pattern, mode, options.ignorecase, options.keepext)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn mode(&self) -> PatternMode {
        self.mode
    }

    /// Test a bare name
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Test a target's effective name: the stem alone under `keepext`, stem plus extension otherwise
    pub fn matches(&self, name: &str, extension: &str) -> bool {
        if self.keepext || extension.is_empty() {
            self.is_match(name)
        } else {
            self.is_match(&format!("{}{}", name, extension))
        }
    }

    pub fn matches_target(&self, target: &Target) -> bool {
        self.matches(&target.name, &target.extension)
    }
}

/// Translate a shell glob into an anchored regular expression.
///
/// `*` matches any run, `?` a single character, `[...]` a character class
/// (`[!...]` negated). An unterminated `[` is a literal.
pub fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("(?s)^");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                // Collapse runs of stars
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            },
            '?' => out.push('.'),
            '[' => match parse_class(&chars, i) {
                Some((class, next)) => {
                    out.push_str(&class);
                    i = next;
                },
                None => out.push_str(r"\["),
            },
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    out
}

/// Parse a bracket expression starting just after `[`.
///
/// Returns the regex class and the index after the closing `]`.
fn parse_class(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut j = start;
    let negated = j < chars.len() && chars[j] == '!';
    if negated {
        j += 1;
    }
    // A leading ']' is part of the set
    if j < chars.len() && chars[j] == ']' {
        j += 1;
    }
    while j < chars.len() && chars[j] != ']' {
        j += 1;
    }
    if j >= chars.len() {
        return None;
    }

    let body_start = if negated { start + 1 } else { start };
    let body = &chars[body_start..j];

    let mut class = String::from("[");
    if negated {
        class.push('^');
    }
    for (k, &c) in body.iter().enumerate() {
        let is_range = c == '-' && k > 0 && k + 1 < body.len();
        if is_range {
            class.push('-');
        } else {
            class.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    class.push(']');

    Some((class, j + 1))
}
