//! Rust identifiers for schema names

use heck::{ToSnakeCase, ToUpperCamelCase};
use std::collections::BTreeSet;

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv",
    "try", "typeof", "unsized", "virtual", "yield",
];

/// Keywords that cannot be written as raw identifiers
const NOT_RAW: &[&str] = &["self", "Self", "super", "crate", "_"];

/// Make a converted name usable as a Rust identifier
pub fn escape(name: String) -> String {
    if NOT_RAW.contains(&name.as_str()) {
        format!("{}_", name)
    } else if KEYWORDS.contains(&name.as_str()) {
        format!("r#{}", name)
    } else if name.starts_with(|c: char| c.is_ascii_digit()) || name.is_empty() {
        format!("_{}", name)
    } else {
        name
    }
}

pub fn field_name(name: &str) -> String {
    escape(name.to_snake_case())
}

pub fn struct_name(name: &str) -> String {
    escape(name.to_upper_camel_case())
}

/// Hands out identifiers unique within one scope
///
/// A clash after case conversion gets a numeric suffix, in first-come order.
#[derive(Debug, Default)]
pub struct Scope {
    used: BTreeSet<String>,
}

impl Scope {
    pub fn reserving(names: &[&str]) -> Self {
        Self {
            used: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn claim(&mut self, ident: String) -> String {
        if self.used.insert(ident.clone()) {
            return ident;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}{}", ident.trim_start_matches("r#"), n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversion() {
        assert_eq!(field_name("eventType"), "event_type");
        assert_eq!(field_name("max-count"), "max_count");
        assert_eq!(struct_name("eventType"), "EventType");
    }

    #[test]
    fn test_keywords_are_escaped() {
        assert_eq!(field_name("type"), "r#type");
        assert_eq!(field_name("self"), "self_");
        assert_eq!(struct_name("Self"), "Self_");
        assert_eq!(field_name("3d"), "_3d");
    }

    #[test]
    fn test_scope_suffixes_clashes() {
        let mut scope = Scope::reserving(&["node_type"]);
        assert_eq!(scope.claim("node_type".to_string()), "node_type2");
        assert_eq!(scope.claim("foo_bar".to_string()), "foo_bar");
        assert_eq!(scope.claim("foo_bar".to_string()), "foo_bar2");
        assert_eq!(scope.claim("foo_bar".to_string()), "foo_bar3");
    }
}
