use log::{debug, warn};
use regex::Regex;

use crate::config::{compile_pattern, ConfigError};

/// Ordered, cascading rewrite rules that turn a referent into the identifier
/// used as cache key. Every rule is compiled when the parser is built.
#[derive(Debug, Clone, Default)]
pub struct ReferentParser {
    rules: Vec<Regex>,
}

impl ReferentParser {
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }

            compile_pattern(pattern)?;

            // Rules must match the whole referent, not a substring of it
            let rule = compile_pattern(&format!("^(?:{})$", pattern))?;

            // captures_len counts the implicit whole-match group
            if rule.captures_len() != 2 {
                warn!(
                    "Ingest source '{}' has {} capture groups, it will never rewrite a referent",
                    pattern,
                    rule.captures_len() - 1
                );
            }

            rules.push(rule);
        }

        Ok(Self { rules })
    }

    pub fn canonicalize(&self, raw: &str) -> String {
        let mut referent = raw.to_string();

        for rule in &self.rules {
            if rule.captures_len() != 2 {
                continue;
            }

            let captured = rule
                .captures(&referent)
                .and_then(|caps| caps.get(1))
                .map(|group| group.as_str().to_string());

            match captured {
                Some(id) => {
                    debug!("Matched ID: {}", id);
                    referent = id;
                }
                None => debug!("No match in {} for {}", referent, rule.as_str()),
            }
        }

        referent
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
