//! Structured diagnostic extraction.
//!
//! Reduces raw tool output to `{file, line, column, severity, message}`
//! records and normalizes error text into stable signatures for the
//! learning profile's error-pattern histogram.

use pf_domain::session::{Diagnostic, DiagnosticSeverity, TestRecord};
use regex::Regex;
use std::sync::OnceLock;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Build diagnostics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `file:line[:col][: severity]: message` - the gcc/go/tsc/clang shape.
fn line_diag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^(?P<file>[^\s:][^:\n]*\.\w{1,4}):(?P<line>\d+)(?::(?P<col>\d+))?:\s*(?:(?P<sev>error|warning)[^:]*:\s*)?(?P<msg>.+)$",
        )
        .expect("diagnostic regex")
    })
}

/// rustc shape: `error[E0xxx]: message` followed by ` --> file:line:col`.
fn rustc_diag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^(?P<sev>error|warning)(?:\[\w+\])?:\s*(?P<msg>.+)\n\s*-->\s*(?P<file>[^:\n]+):(?P<line>\d+):(?P<col>\d+)",
        )
        .expect("rustc diagnostic regex")
    })
}

/// Reduce build output to a list of structured diagnostics.
///
/// Lines that do not match any known compiler shape are simply skipped;
/// the raw output is always preserved alongside.
pub fn parse_build_diagnostics(output: &str) -> Vec<Diagnostic> {
    let mut diags = Vec::new();

    for caps in rustc_diag_re().captures_iter(output) {
        diags.push(Diagnostic {
            file: caps["file"].trim().to_string(),
            line: caps["line"].parse().unwrap_or(0),
            column: caps["col"].parse().unwrap_or(0),
            severity: severity_from(caps.name("sev").map(|m| m.as_str())),
            message: caps["msg"].trim().to_string(),
        });
    }

    for caps in line_diag_re().captures_iter(output) {
        let msg = caps["msg"].trim();
        // rustc context lines (`--> src/x.rs:1:1`) already captured above.
        if msg.is_empty() || caps["file"].starts_with("-->") {
            continue;
        }
        diags.push(Diagnostic {
            file: caps["file"].trim().to_string(),
            line: caps["line"].parse().unwrap_or(0),
            column: caps
                .name("col")
                .map(|c| c.as_str().parse().unwrap_or(0))
                .unwrap_or(0),
            severity: severity_from(caps.name("sev").map(|m| m.as_str())),
            message: msg.to_string(),
        });
    }

    diags
}

fn severity_from(tag: Option<&str>) -> DiagnosticSeverity {
    match tag {
        Some("warning") => DiagnosticSeverity::Warning,
        // Go and clang omit the tag for hard errors.
        _ => DiagnosticSeverity::Error,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error-signature normalization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One normalization rule: pattern → stable signature.
struct SignatureRule {
    pattern: Regex,
    signature: &'static str,
}

fn signature_rules() -> &'static Vec<SignatureRule> {
    static RULES: OnceLock<Vec<SignatureRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let rule = |pat: &str, signature: &'static str| SignatureRule {
            pattern: Regex::new(pat).expect("signature regex"),
            signature,
        };
        vec![
            rule(r"undefined:\s*\S+|is not defined|name '\w+' is not defined", "undefined: _"),
            rule(r"(?i)type mismatch|cannot use .+ as .+ value|mismatched types|incompatible types?", "type mismatch"),
            rule(r"(?i)nil pointer|null pointer|NoneType.*has no attribute|undefined is not", "nil pointer"),
            rule(r"(?i)\bpanic\b|\bsegmentation fault\b", "panic"),
            rule(r"(?i)timed? ?out|deadline exceeded", "timeout"),
            rule(r"(?i)syntax error|unexpected token|expected .+, found|invalid syntax|unexpected \w+ in", "syntax error"),
            rule(r"(?i)index out of (range|bounds)|list index out of range", "index out of range"),
            rule(r"(?i)unused (variable|import)|imported and not used", "unused symbol"),
            rule(r"(?i)missing return|not all code paths return", "missing return"),
            rule(r"(?i)cannot find (package|module)|no module named|module not found", "missing dependency"),
        ]
    })
}

/// Normalize raw failure output into a deduplicated list of stable
/// signatures (identifiers stripped, common patterns collapsed).
pub fn normalize_error_signatures(output: &str) -> Vec<String> {
    let mut signatures = Vec::new();
    for rule in signature_rules() {
        if rule.pattern.is_match(output) && !signatures.iter().any(|s| s == rule.signature) {
            signatures.push(rule.signature.to_string());
        }
    }
    signatures
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// go test -json parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse `go test -json` event lines into per-test records.
///
/// Output lines for a test accumulate until its terminal pass/fail
/// event; non-JSON lines are ignored.
pub fn parse_go_test_json(output: &str) -> Vec<TestRecord> {
    use std::collections::HashMap;

    let mut buffered: HashMap<String, String> = HashMap::new();
    let mut records = Vec::new();

    for line in output.lines() {
        let event: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let test = match event.get("Test").and_then(|t| t.as_str()) {
            Some(t) => t.to_string(),
            None => continue, // package-level event
        };
        let package = event
            .get("Package")
            .and_then(|p| p.as_str())
            .unwrap_or_default()
            .to_string();

        match event.get("Action").and_then(|a| a.as_str()) {
            Some("output") => {
                if let Some(text) = event.get("Output").and_then(|o| o.as_str()) {
                    buffered.entry(test).or_default().push_str(text);
                }
            }
            Some(action @ ("pass" | "fail")) => {
                let elapsed = event
                    .get("Elapsed")
                    .and_then(|e| e.as_f64())
                    .unwrap_or(0.0);
                records.push(TestRecord {
                    name: test.clone(),
                    package,
                    passed: action == "pass",
                    duration_ms: (elapsed * 1000.0) as u64,
                    output: buffered.remove(&test).unwrap_or_default(),
                });
            }
            _ => {}
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_style_diagnostic() {
        let out = "./main.go:5:2: undefined: fmt.Printl\n";
        let diags = parse_build_diagnostics(out);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].file, "./main.go");
        assert_eq!(diags[0].line, 5);
        assert_eq!(diags[0].column, 2);
        assert_eq!(diags[0].severity, DiagnosticSeverity::Error);
        assert_eq!(diags[0].message, "undefined: fmt.Printl");
    }

    #[test]
    fn tsc_style_diagnostic_with_severity() {
        let out = "src/index.ts:12:7: error TS2304: Cannot find name 'foo'.\n";
        let diags = parse_build_diagnostics(out);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, DiagnosticSeverity::Error);
    }

    #[test]
    fn rustc_style_diagnostic() {
        let out = "error[E0425]: cannot find value `foo` in this scope\n --> src/main.rs:3:13\n";
        let diags = parse_build_diagnostics(out);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].file, "src/main.rs");
        assert_eq!(diags[0].line, 3);
        assert_eq!(diags[0].column, 13);
        assert!(diags[0].message.contains("cannot find value"));
    }

    #[test]
    fn warning_severity_detected() {
        let out = "main.c:9:5: warning: unused variable 'x'\n";
        let diags = parse_build_diagnostics(out);
        assert_eq!(diags[0].severity, DiagnosticSeverity::Warning);
    }

    #[test]
    fn non_diagnostic_lines_skipped() {
        let out = "compiling project\ndone in 2.3s\n";
        assert!(parse_build_diagnostics(out).is_empty());
    }

    #[test]
    fn signatures_strip_identifiers() {
        let sigs = normalize_error_signatures("./main.go:5:2: undefined: myHelper");
        assert_eq!(sigs, vec!["undefined: _"]);
        // Different identifier, same signature.
        let sigs2 = normalize_error_signatures("undefined: otherFunc");
        assert_eq!(sigs, sigs2);
    }

    #[test]
    fn signatures_cover_spec_patterns() {
        assert_eq!(
            normalize_error_signatures("cannot use x (type int) as string value"),
            vec!["type mismatch"]
        );
        assert_eq!(
            normalize_error_signatures("runtime error: invalid memory address or nil pointer dereference"),
            vec!["nil pointer"]
        );
        assert_eq!(
            normalize_error_signatures("panic: runtime error"),
            vec!["panic"]
        );
        assert_eq!(
            normalize_error_signatures("test timed out after 30s"),
            vec!["timeout"]
        );
        assert_eq!(
            normalize_error_signatures("main.go:3:1: syntax error: unexpected }"),
            vec!["syntax error"]
        );
    }

    #[test]
    fn signatures_deduplicate() {
        let sigs =
            normalize_error_signatures("undefined: a\nundefined: b\nundefined: c");
        assert_eq!(sigs.len(), 1);
    }

    #[test]
    fn multiple_distinct_signatures() {
        let sigs = normalize_error_signatures("undefined: x\npanic: oh no");
        assert_eq!(sigs, vec!["undefined: _", "panic"]);
    }

    #[test]
    fn go_test_json_pass_and_fail() {
        let out = concat!(
            r#"{"Action":"run","Package":"example/hello","Test":"TestHello"}"#, "\n",
            r#"{"Action":"output","Package":"example/hello","Test":"TestHello","Output":"=== RUN TestHello\n"}"#, "\n",
            r#"{"Action":"pass","Package":"example/hello","Test":"TestHello","Elapsed":0.01}"#, "\n",
            r#"{"Action":"output","Package":"example/hello","Test":"TestWorld","Output":"want world, got w0rld\n"}"#, "\n",
            r#"{"Action":"fail","Package":"example/hello","Test":"TestWorld","Elapsed":0.02}"#, "\n",
            r#"{"Action":"fail","Package":"example/hello","Elapsed":0.05}"#, "\n",
        );
        let records = parse_go_test_json(out);
        assert_eq!(records.len(), 2);
        assert!(records[0].passed);
        assert_eq!(records[0].duration_ms, 10);
        assert!(!records[1].passed);
        assert!(records[1].output.contains("want world"));
        assert_eq!(records[1].package, "example/hello");
    }

    #[test]
    fn go_test_json_ignores_garbage_lines() {
        let out = "not json\n{\"Action\":\"pass\",\"Test\":\"TestA\",\"Package\":\"p\"}\n";
        let records = parse_go_test_json(out);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "TestA");
    }
}
