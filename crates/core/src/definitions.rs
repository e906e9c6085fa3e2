//! The per-session definition set — the namespace a long-running interpreter
//! would have accumulated, captured as exact source text.
//!
//! The set only ever grows within a session: function redefinition
//! overwrites by name, imports deduplicate by exact text, and nothing is
//! deleted. On rehydration the stored source is replayed verbatim — never
//! re-derived — into a fresh sandbox.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level definitions extracted from one submitted code block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definitions {
    /// Function name → exact source span.
    pub functions: BTreeMap<String, String>,
    /// Import statements, verbatim, in source order.
    pub imports: Vec<String>,
}

impl Definitions {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.imports.is_empty()
    }
}

/// The session-scoped, monotonically growing definition namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionSet {
    /// Function name → exact source text. BTreeMap keeps replay order
    /// deterministic across invocations.
    pub functions: BTreeMap<String, String>,

    /// Import statements, deduplicated by exact text, insertion-ordered.
    pub imports: Vec<String>,
}

impl DefinitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.imports.is_empty()
    }

    /// Merge newly extracted definitions in. Redefinitions overwrite by
    /// name; imports already present (by exact text) are dropped.
    pub fn merge(&mut self, new: Definitions) {
        for import in new.imports {
            if !self.imports.contains(&import) {
                self.imports.push(import);
            }
        }
        for (name, source) in new.functions {
            self.functions.insert(name, source);
        }
    }

    /// Render the replay preamble: all imports first, then all function
    /// sources, blank-line separated to avoid syntactic collision.
    pub fn preamble(&self) -> String {
        let mut out = String::new();
        if !self.imports.is_empty() {
            out.push_str(&self.imports.join("\n"));
            out.push_str("\n\n");
        }
        for source in self.functions.values() {
            out.push_str(source.trim_end());
            out.push_str("\n\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(functions: &[(&str, &str)], imports: &[&str]) -> Definitions {
        Definitions {
            functions: functions
                .iter()
                .map(|(n, s)| (n.to_string(), s.to_string()))
                .collect(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn merge_is_monotonic() {
        let mut set = DefinitionSet::new();
        set.merge(defs(&[("f", "def f(x):\n    return x + 999\n")], &["import math"]));
        set.merge(defs(&[("g", "def g():\n    pass\n")], &["import math"]));

        assert_eq!(set.functions.len(), 2);
        assert_eq!(set.imports, vec!["import math".to_string()]);
    }

    #[test]
    fn redefinition_overwrites_by_name() {
        let mut set = DefinitionSet::new();
        set.merge(defs(&[("f", "def f():\n    return 1\n")], &[]));
        set.merge(defs(&[("f", "def f():\n    return 2\n")], &[]));

        assert_eq!(set.functions.len(), 1);
        assert!(set.functions["f"].contains("return 2"));
    }

    #[test]
    fn preamble_orders_imports_before_functions() {
        let mut set = DefinitionSet::new();
        set.merge(defs(
            &[("f", "def f(x):\n    return x + 999")],
            &["import math", "from datetime import date"],
        ));

        let preamble = set.preamble();
        let import_pos = preamble.find("import math").unwrap();
        let func_pos = preamble.find("def f(x):").unwrap();
        assert!(import_pos < func_pos);
        assert!(preamble.contains("\n\n"));
    }

    #[test]
    fn empty_set_renders_empty_preamble() {
        assert_eq!(DefinitionSet::new().preamble(), "");
    }

    #[test]
    fn serde_roundtrip() {
        let mut set = DefinitionSet::new();
        set.merge(defs(&[("f", "def f():\n    pass\n")], &["import re"]));
        let json = serde_json::to_string(&set).unwrap();
        let back: DefinitionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
