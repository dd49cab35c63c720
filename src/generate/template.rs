//! Placeholder substitution for the output templates.
//!
//! A placeholder is a word in braces, `{name}`. When a placeholder stands
//! alone on a line, its value may span several lines and every one of them
//! receives the indentation of the placeholder; an empty value removes the
//! line altogether.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use regex::{Captures, Regex};

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{(\w+)\}").unwrap())
}

fn standalone() -> &'static Regex {
    static STANDALONE: OnceLock<Regex> = OnceLock::new();
    STANDALONE.get_or_init(|| Regex::new(r"^(\s*)\{(\w+)\}\s*$").unwrap())
}

pub type Values = BTreeMap<&'static str, String>;

/// Fills `template` from `values`. Every placeholder must have a value.
pub fn render(name: &str, template: &str, values: &Values) -> Result<String> {
    let lookup = |key: &str| {
        values
            .get(key)
            .ok_or_else(|| anyhow!("template {} uses unknown value `{}`", name, key))
    };
    let mut out = String::with_capacity(template.len() * 2);
    for line in template.lines() {
        if let Some(caps) = standalone().captures(line) {
            let value = lookup(&caps[2])?;
            for value_line in value.lines() {
                if !value_line.is_empty() {
                    out.push_str(&caps[1]);
                    out.push_str(value_line);
                }
                out.push('\n');
            }
            continue;
        }
        let mut missing = None;
        let filled = placeholder().replace_all(line, |caps: &Captures| match lookup(&caps[1]) {
            Ok(value) => value.clone(),
            Err(e) => {
                missing.get_or_insert(e);
                String::new()
            }
        });
        if let Some(e) = missing {
            return Err(e);
        }
        out.push_str(&filled);
        out.push('\n');
    }
    Ok(out)
}
