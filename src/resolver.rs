use indexmap::IndexSet;
use log::debug;
use regex::Regex;

use crate::error::{ArtifactPullError, Result};
use crate::stages::Stage;

/// Separator between stage and workflow name in a qualified name.
pub const DELIMITER: &str = ".";

/// A glob pattern matched against `stage.workflow` qualified names.
///
/// Matching is anchored to the whole name:
/// - `*` matches any run of characters except `/`
/// - `?` matches exactly one character except `/`
/// - `[abc]`, `[a-z]`, `[!a-z]` / `[^a-z]` are character classes
/// - `\` makes the next character literal
///
/// Everything else is literal, including `.`, so `stage1.*` only selects
/// workflows of `stage1`.
#[derive(Debug, Clone)]
pub struct TargetPattern {
    raw: String,
    regex: Regex,
}

impl TargetPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(pattern)?).map_err(|e| pattern_error(pattern, e))?;

        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, qualified_name: &str) -> bool {
        self.regex.is_match(qualified_name)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn pattern_error(pattern: &str, reason: impl ToString) -> ArtifactPullError {
    ArtifactPullError::Pattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

fn escaped(c: char) -> String {
    regex::escape(c.encode_utf8(&mut [0; 4]))
}

fn glob_to_regex(pattern: &str) -> Result<String> {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '\\' => {
                let next = chars
                    .next()
                    .ok_or_else(|| pattern_error(pattern, "trailing escape character"))?;
                out.push_str(&escaped(next));
            }
            '[' => {
                out.push('[');
                if matches!(chars.peek(), Some('!' | '^')) {
                    chars.next();
                    out.push('^');
                }

                let mut members = 0;
                loop {
                    match chars.next() {
                        None => return Err(pattern_error(pattern, "unclosed character class")),
                        Some(']') if members == 0 => {
                            return Err(pattern_error(pattern, "empty character class"));
                        }
                        Some(']') => break,
                        Some('\\') => {
                            let next = chars.next().ok_or_else(|| {
                                pattern_error(pattern, "trailing escape character")
                            })?;
                            out.push_str(&escaped(next));
                            members += 1;
                        }
                        Some('-') if members > 0 && chars.peek() != Some(&']') => out.push('-'),
                        Some(member) => {
                            out.push_str(&escaped(member));
                            members += 1;
                        }
                    }
                }
                out.push(']');
            }
            literal => out.push_str(&escaped(literal)),
        }
    }

    out.push('$');
    Ok(out)
}

/// Resolves the upstream build IDs selected by `patterns`.
///
/// With no patterns every workflow of every stage is selected. A build ID
/// reachable through several qualified names is returned once.
pub fn resolve_build_ids(stages: &[Stage], patterns: &[String]) -> Result<IndexSet<String>> {
    let qualified: Vec<(String, &str)> = stages
        .iter()
        .flat_map(|stage| {
            stage.workflows.iter().map(move |wf| {
                (
                    format!("{}{DELIMITER}{}", stage.name, wf.name),
                    wf.external_id.as_str(),
                )
            })
        })
        .collect();

    if patterns.is_empty() {
        return Ok(qualified
            .into_iter()
            .map(|(_, build_id)| build_id.to_string())
            .collect());
    }

    let patterns = patterns
        .iter()
        .map(|p| TargetPattern::parse(p))
        .collect::<Result<Vec<_>>>()?;

    let mut build_ids = IndexSet::new();
    for pattern in &patterns {
        for (name, build_id) in &qualified {
            if pattern.matches(name) {
                debug!("Target '{}' matched {name} ({build_id})", pattern.as_str());
                build_ids.insert((*build_id).to_string());
            }
        }
    }

    Ok(build_ids)
}
