//! Line-based detection of function and method definitions.
//!
//! A definition spans from its header line to the line before the next
//! definition (or the end of the file). Good enough for counting, not for
//! parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

use crate::utils::file_type;

static PYTHON_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(async\s+)?def\s+\w+\s*\(").expect("valid python regex"));
static RUST_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(pub(\([^)]*\))?\s+)?(const\s+)?(async\s+)?(unsafe\s+)?(extern\s+"[^"]*"\s+)?fn\s+\w+"#)
        .expect("valid rust regex")
});
static GO_FUNC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^func\s").expect("valid go regex"));
static JS_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(export\s+)?(default\s+)?(async\s+)?function\s*\*?\s*\w*\s*\(|^\s*(export\s+)?(const|let|var)\s+\w+\s*=\s*(async\s+)?(\([^)]*\)|\w+)\s*=>",
    )
    .expect("valid js regex")
});
static C_FAMILY_METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([\w:<>\[\],.?*&]+\s+)+\*?&?~?\w+\s*\([^;]*$").expect("valid c-family regex")
});
static KOTLIN_FUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+\s+)*fun\s").expect("valid kotlin regex"));
static SWIFT_FUNC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+\s+)*func\s").expect("valid swift regex"));
static RUBY_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*def\s").expect("valid ruby regex"));
static PHP_FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\w+\s+)*function\s+\w+").expect("valid php regex"));

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "foreach", "while", "switch", "return", "new", "catch", "throw", "case", "do",
    "try", "using", "lock", "delete", "sizeof",
];

enum Language {
    Python,
    Rust,
    Go,
    JavaScript,
    CFamily,
    Kotlin,
    Swift,
    Ruby,
    Php,
}

fn language_of(path: &str) -> Option<Language> {
    let lang = match file_type(path).as_str() {
        "py" => Language::Python,
        "rs" => Language::Rust,
        "go" => Language::Go,
        "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" => Language::JavaScript,
        "java" | "cs" | "c" | "h" | "cc" | "cpp" | "cxx" | "hpp" | "m" | "scala" | "groovy" => {
            Language::CFamily
        }
        "kt" | "kts" => Language::Kotlin,
        "swift" => Language::Swift,
        "rb" => Language::Ruby,
        "php" => Language::Php,
        _ => return None,
    };
    Some(lang)
}

fn is_definition(lang: &Language, line: &str) -> bool {
    match lang {
        Language::Python => PYTHON_DEF.is_match(line),
        Language::Rust => RUST_FN.is_match(line),
        Language::Go => GO_FUNC.is_match(line),
        Language::JavaScript => JS_FUNCTION.is_match(line),
        Language::Kotlin => KOTLIN_FUN.is_match(line),
        Language::Swift => SWIFT_FUNC.is_match(line),
        Language::Ruby => RUBY_DEF.is_match(line),
        Language::Php => PHP_FUNCTION.is_match(line),
        Language::CFamily => {
            let first_word = line.split(|c: char| !c.is_alphanumeric() && c != '_').find(|w| !w.is_empty());
            C_FAMILY_METHOD.is_match(line)
                && !first_word.is_some_and(|w| CONTROL_KEYWORDS.contains(&w))
                && !line.trim_start().starts_with("//")
                && !line.trim_start().starts_with('*')
        }
    }
}

/// 1-based line ranges (end exclusive) of the definitions found in `source`.
///
/// Empty for file types without a known definition syntax.
pub fn definition_ranges(path: &str, source: &str) -> Vec<Range<usize>> {
    let Some(lang) = language_of(path) else {
        return Vec::new();
    };

    let starts: Vec<usize> = source
        .lines()
        .enumerate()
        .filter(|(_, line)| is_definition(&lang, line))
        .map(|(idx, _)| idx + 1)
        .collect();
    let end_of_file = source.lines().count() + 1;

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| start..starts.get(i + 1).copied().unwrap_or(end_of_file))
        .collect()
}

/// Definitions overlapping at least one of the changed line ranges.
pub fn count_changed(definitions: &[Range<usize>], changed: &[Range<usize>]) -> usize {
    definitions
        .iter()
        .filter(|def| changed.iter().any(|c| c.start < def.end && def.start < c.end))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_definitions() {
        let source = "import os\n\ndef a():\n    pass\n\nclass B:\n    async def c(self):\n        return 1\n";
        assert_eq!(definition_ranges("x/app.py", source), vec![3..7, 7..9]);
    }

    #[test]
    fn test_java_skips_control_flow() {
        let source = "public class A {\n  public int size() {\n    if (x) {\n      return 1;\n    }\n  }\n  private static void run(String s)\n  {\n  }\n}\n";
        let defs = definition_ranges("A.java", source);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].start, 2);
        assert_eq!(defs[1].start, 7);
    }

    #[test]
    fn test_unknown_language_has_no_definitions() {
        assert!(definition_ranges("README.md", "def not_code():\n").is_empty());
    }

    #[test]
    fn test_count_changed() {
        let defs = vec![1..5, 5..9, 9..12];
        assert_eq!(count_changed(&defs, &[6..7]), 1);
        assert_eq!(count_changed(&defs, &[4..6]), 2);
        assert_eq!(count_changed(&defs, &[]), 0);
    }
}
