use crate::error::{BootError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static OPTIONAL_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*)\)").expect("optional group regex"));
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([A-Za-z][A-Za-z0-9_-]*)\]").expect("token regex"));

/// Values substituted into `[token]` placeholders of an artifact pattern.
#[derive(Debug, Clone, Default)]
pub struct PatternTokens {
    values: HashMap<String, String>,
}

impl PatternTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens describing one artifact of a module.
    pub fn for_artifact(
        organisation: &str,
        module: &str,
        revision: &str,
        artifact: &str,
        kind: &str,
        ext: &str,
    ) -> Self {
        Self::new()
            .with("organisation", organisation)
            .with("organization", organisation)
            .with("module", module)
            .with("revision", revision)
            .with("artifact", artifact)
            .with("type", kind)
            .with("ext", ext)
    }

    pub fn with(mut self, token: &str, value: impl Into<String>) -> Self {
        self.values.insert(token.to_string(), value.into());
        self
    }

    fn get(&self, token: &str) -> Option<&str> {
        self.values
            .get(token)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Expands `pattern`. A parenthesised group is kept (without its parentheses)
/// only if every token inside it has a value; a token outside any group must
/// have one.
pub fn substitute(pattern: &str, tokens: &PatternTokens) -> Result<String> {
    let without_groups = OPTIONAL_GROUP.replace_all(pattern, |caps: &regex::Captures<'_>| {
        let group = &caps[1];
        let complete = TOKEN
            .captures_iter(group)
            .all(|token| tokens.get(&token[1]).is_some());
        if complete {
            group.to_string()
        } else {
            String::new()
        }
    });

    if without_groups.contains('(') || without_groups.contains(')') {
        return Err(BootError::Pattern(format!(
            "unbalanced optional group in '{pattern}'"
        )));
    }

    let mut missing = None;
    let expanded = TOKEN.replace_all(&without_groups, |caps: &regex::Captures<'_>| {
        match tokens.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => {
                missing.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(token) => Err(BootError::Pattern(format!(
            "no value for [{token}] in '{pattern}'"
        ))),
        None => Ok(expanded.into_owned()),
    }
}
