//! Static validation of machine-generated server code.
//!
//! The validator is a pure, synchronous scan of the source text. It never
//! executes the code and spawns no process, so it can run before anything
//! else in the testing pipeline and its verdict is always reproducible:
//! the same input yields the same output.
//!
//! Fatal errors block further testing; warnings are advisory and do not.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Disallowed patterns, each paired with its own error string.
///
/// These are matched literally against the source text. Generated code is
/// executed in a sandbox either way; the scan exists so obviously hostile or
/// broken code is rejected before a process is ever spawned for it.
static DISALLOWED_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r#"require\s*\(\s*["']child_process["']\s*\)"#).unwrap(),
            "code must not require(\"child_process\")",
        ),
        (
            Regex::new(r#"require\s*\(\s*["']fs["']\s*\)"#).unwrap(),
            "code must not require(\"fs\")",
        ),
        (
            Regex::new(r"\beval\s*\(").unwrap(),
            "code must not call eval()",
        ),
        (
            Regex::new(r"\bFunction\s*\(").unwrap(),
            "code must not use the Function() constructor",
        ),
        (
            Regex::new(r"(^|[^\w.])process\.env").unwrap(),
            "code must not read process.env directly",
        ),
    ]
});

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Outcome of a static validation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
    /// True when no fatal error was found
    pub valid: bool,

    /// Fatal findings; any entry blocks further testing
    pub errors: Vec<String>,

    /// Advisory findings; these do not block testing
    pub warnings: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Statically validates candidate server code.
///
/// Errors (fatal): a syntax error when the text is scanned as a function
/// body, any disallowed pattern (`require("child_process")`, `require("fs")`,
/// `eval(`, a `Function(` constructor call, an unqualified `process.env`
/// read). Warnings (non-fatal): no apparent GET/POST method branch, no
/// response-header call.
pub fn validate(code: &str) -> Validation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Err(message) = scan_function_body(code) {
        errors.push(message);
    }

    for (pattern, message) in DISALLOWED_PATTERNS.iter() {
        if pattern.is_match(code) {
            errors.push((*message).to_string());
        }
    }

    if !code.contains("GET") && !code.contains("POST") {
        warnings.push("no GET or POST method branch detected".to_string());
    }

    if !code.contains("setHeader") && !code.contains("writeHead") {
        warnings.push("no response header call (setHeader/writeHead) detected".to_string());
    }

    Validation {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Scans the code as a function body, checking bracket balance and string
/// termination. This approximates the parse a loader would perform without
/// ever evaluating anything.
fn scan_function_body(code: &str) -> Result<(), String> {
    #[derive(PartialEq)]
    enum Mode {
        Code,
        Single,
        Double,
        Template,
        LineComment,
        BlockComment,
    }

    let mut mode = Mode::Code;
    let mut stack: Vec<char> = Vec::new();
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        match mode {
            Mode::Code => match c {
                '\'' => mode = Mode::Single,
                '"' => mode = Mode::Double,
                '`' => mode = Mode::Template,
                '/' => match chars.peek() {
                    Some('/') => mode = Mode::LineComment,
                    Some('*') => {
                        chars.next();
                        mode = Mode::BlockComment;
                    }
                    _ => {}
                },
                '(' | '[' | '{' => stack.push(c),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    if stack.pop() != Some(expected) {
                        return Err(format!("syntax error: unexpected '{}'", c));
                    }
                }
                _ => {}
            },
            Mode::Single | Mode::Double => {
                let quote = if mode == Mode::Single { '\'' } else { '"' };
                if c == '\\' {
                    chars.next();
                } else if c == quote {
                    mode = Mode::Code;
                } else if c == '\n' {
                    return Err("syntax error: unterminated string literal".to_string());
                }
            }
            Mode::Template => {
                if c == '\\' {
                    chars.next();
                } else if c == '`' {
                    mode = Mode::Code;
                }
            }
            Mode::LineComment => {
                if c == '\n' {
                    mode = Mode::Code;
                }
            }
            Mode::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    mode = Mode::Code;
                }
            }
        }
    }

    match mode {
        Mode::Single | Mode::Double => {
            return Err("syntax error: unterminated string literal".to_string());
        }
        Mode::Template => {
            return Err("syntax error: unterminated template literal".to_string());
        }
        _ => {}
    }

    if let Some(open) = stack.pop() {
        return Err(format!("syntax error: unclosed '{}'", open));
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN_HANDLER: &str = r#"
        module.exports = async function handler(req, res) {
            if (req.method === 'GET') {
                res.setHeader('Content-Type', 'application/json');
                res.end(JSON.stringify({ name: 'avatar-server' }));
            } else if (req.method === 'POST') {
                res.setHeader('Content-Type', 'image/png');
                res.end(renderAvatar(req.body));
            }
        };
    "#;

    #[test]
    fn test_clean_code_is_valid() {
        let result = validate(CLEAN_HANDLER);
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_is_deterministic() {
        let first = validate(CLEAN_HANDLER);
        let second = validate(CLEAN_HANDLER);
        assert_eq!(first.valid, second.valid);
        assert_eq!(first.errors, second.errors);
        assert_eq!(first.warnings, second.warnings);
    }

    #[test]
    fn test_rejects_child_process_require() {
        let result = validate(r#"const cp = require("child_process");"#);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("child_process")));

        // Single quotes are rejected too
        let result = validate("const cp = require('child_process');");
        assert!(!result.valid);
    }

    #[test]
    fn test_rejects_fs_require() {
        let result = validate(r#"const fs = require("fs");"#);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("require(\"fs\")")));
    }

    #[test]
    fn test_rejects_eval() {
        let result = validate("eval(payload)");
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("eval()")));
    }

    #[test]
    fn test_rejects_function_constructor() {
        let result = validate("const f = new Function('return 1')");
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("Function()")));

        // A user-defined name ending in Function is fine
        let result = validate("renderFunction(input)");
        assert!(result.errors.iter().all(|e| !e.contains("Function()")));
    }

    #[test]
    fn test_rejects_unqualified_process_env() {
        let result = validate("const key = process.env.SECRET;");
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("process.env")));

        // A qualified read does not match the direct pattern
        let result = validate("const key = shim.process.env.SECRET;");
        assert!(result.errors.iter().all(|e| !e.contains("process.env")));
    }

    #[test]
    fn test_each_pattern_has_distinct_error() {
        let result = validate(
            r#"require("child_process"); require("fs"); eval(x); new Function(y); process.env.A"#,
        );
        assert_eq!(result.errors.len(), 5);
        let unique: std::collections::HashSet<_> = result.errors.iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_syntax_unbalanced_brace() {
        let result = validate("function handler(req, res) { res.end('x');");
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("syntax error")));
    }

    #[test]
    fn test_syntax_unterminated_string() {
        let result = validate("const s = 'oops\nmore code");
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("unterminated")));
    }

    #[test]
    fn test_brackets_inside_strings_and_comments_ignored() {
        let result = validate("const s = '}}}'; // also ) here\n/* ( */ const t = `)`;");
        assert!(result.errors.iter().all(|e| !e.contains("syntax error")));
    }

    #[test]
    fn test_warnings_for_missing_method_branch_and_headers() {
        let result = validate("respond(42)");
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);
    }
}
