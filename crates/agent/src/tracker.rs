//! Definition tracking — a static pass over submitted code text.
//!
//! Extracts top-level function definitions and import statements, verbatim
//! by source span, without executing anything. Only column-0 statements
//! count: a function defined inside another function or under an `if` is
//! deliberately not tracked. Input that doesn't parse as anything useful
//! yields empty results — this pass never fails.
//!
//! Runs once per executed code block; results merge into the session's
//! [`DefinitionSet`](sandloop_core::DefinitionSet).

use sandloop_core::definitions::Definitions;
use std::collections::BTreeMap;

/// Extract top-level `def`s and imports from one code block.
pub fn extract(source: &str) -> Definitions {
    let lines: Vec<&str> = source.lines().collect();
    let mut functions = BTreeMap::new();
    let mut imports = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if let Some(name) = def_name(line) {
            let end = block_end(&lines, i);
            let mut last = end;
            // ast spans exclude trailing blank lines
            while last > i + 1 && lines[last - 1].trim().is_empty() {
                last -= 1;
            }
            let mut body = lines[i..last].join("\n");
            body.push('\n');
            functions.insert(name, body);
            i = end;
            continue;
        }

        if is_import_start(line) {
            let end = statement_end(&lines, i);
            let statement = lines[i..=end].join("\n").trim().to_string();
            imports.push(statement);
            i = end + 1;
            continue;
        }

        i += 1;
    }

    Definitions { functions, imports }
}

/// The function name, if this line opens a top-level def.
fn def_name(line: &str) -> Option<String> {
    let rest = line
        .strip_prefix("async def ")
        .or_else(|| line.strip_prefix("def "))?;
    let name = rest.split('(').next()?.trim();
    if !name.is_empty() && is_identifier(name) && rest.contains('(') {
        Some(name.to_string())
    } else {
        None
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Does this column-0 line open an import statement?
fn is_import_start(line: &str) -> bool {
    line.starts_with("import ") || (line.starts_with("from ") && line.contains("import"))
}

/// The index one past the last line of a block opened at `start`.
///
/// The signature may span lines (its closing `):` can sit at column 0), so
/// the header is consumed until its parentheses balance; after that,
/// interior lines are indented or blank and the block ends at the next
/// column-0 line.
fn block_end(lines: &[&str], start: usize) -> usize {
    let mut end = start;
    let mut open: i64 = 0;
    loop {
        let line = lines[end];
        open += line.matches('(').count() as i64;
        open -= line.matches(')').count() as i64;
        end += 1;
        if open <= 0 || end >= lines.len() {
            break;
        }
    }
    while end < lines.len() {
        let line = lines[end];
        if line.trim().is_empty() || line.starts_with(' ') || line.starts_with('\t') {
            end += 1;
        } else {
            break;
        }
    }
    end
}

/// The index of the last line of a simple statement opened at `start`,
/// following parenthesized and backslash continuations.
fn statement_end(lines: &[&str], start: usize) -> usize {
    let mut end = start;
    let mut open_parens: i64 = 0;
    loop {
        let line = lines[end];
        open_parens += line.matches('(').count() as i64;
        open_parens -= line.matches(')').count() as i64;
        let continues = open_parens > 0 || line.trim_end().ends_with('\\');
        if !continues || end + 1 >= lines.len() {
            return end;
        }
        end += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_top_level_function_verbatim() {
        let source = "def f(x):\n    return x + 999\n\nprint(f(1))\n";
        let defs = extract(source);
        assert_eq!(defs.functions.len(), 1);
        assert_eq!(defs.functions["f"], "def f(x):\n    return x + 999\n");
        assert!(defs.imports.is_empty());
    }

    #[test]
    fn captures_imports_verbatim() {
        let source = "import math\nfrom datetime import date, timedelta\nx = 1\n";
        let defs = extract(source);
        assert_eq!(
            defs.imports,
            vec![
                "import math".to_string(),
                "from datetime import date, timedelta".to_string(),
            ]
        );
    }

    #[test]
    fn nested_functions_are_not_tracked() {
        let source = "def outer():\n    def inner():\n        pass\n    return inner\n";
        let defs = extract(source);
        assert_eq!(defs.functions.len(), 1);
        assert!(defs.functions.contains_key("outer"));
        assert!(defs.functions["outer"].contains("def inner"));
    }

    #[test]
    fn conditional_definitions_are_not_tracked() {
        let source = "if True:\n    def f():\n        pass\n";
        let defs = extract(source);
        assert!(defs.functions.is_empty());
    }

    #[test]
    fn async_def_is_tracked() {
        let source = "async def fetch(url):\n    return url\n";
        let defs = extract(source);
        assert!(defs.functions.contains_key("fetch"));
    }

    #[test]
    fn parenthesized_import_continuation() {
        let source = "from collections import (\n    OrderedDict,\n    defaultdict,\n)\nprint(1)\n";
        let defs = extract(source);
        assert_eq!(defs.imports.len(), 1);
        assert!(defs.imports[0].contains("OrderedDict"));
        assert!(defs.imports[0].contains("defaultdict"));
    }

    #[test]
    fn interior_blank_lines_stay_trailing_blanks_go() {
        let source = "def f():\n    a = 1\n\n    return a\n\n\nx = 2\n";
        let defs = extract(source);
        let body = &defs.functions["f"];
        assert!(body.contains("a = 1\n\n    return a"));
        assert!(!body.ends_with("\n\n\n"));
    }

    #[test]
    fn garbage_input_yields_empty_results() {
        let defs = extract(")))) this is not python ((((");
        assert!(defs.functions.is_empty());
        assert!(defs.imports.is_empty());
    }

    #[test]
    fn def_without_parens_is_ignored() {
        let defs = extract("def broken\n    pass\n");
        assert!(defs.functions.is_empty());
    }

    #[test]
    fn multiline_signature_is_captured() {
        let source = "def f(\n    x,\n    y,\n):\n    return x + y\n";
        let defs = extract(source);
        assert!(defs.functions["f"].contains("return x + y"));
    }

    #[test]
    fn extraction_round_trip_through_set() {
        use sandloop_core::DefinitionSet;

        let mut set = DefinitionSet::new();
        set.merge(extract("import math\ndef f(x):\n    return x + 999\n"));
        set.merge(extract("import math\ndef g(x):\n    return f(x) * 2\n"));

        assert_eq!(set.imports, vec!["import math".to_string()]);
        assert_eq!(set.functions.len(), 2);
        let preamble = set.preamble();
        assert!(preamble.contains("def f(x)"));
        assert!(preamble.contains("def g(x)"));
    }
}
