//! TypeScript executor: prettier / tsc / vitest.

use pf_domain::session::TestRecord;
use regex::Regex;
use std::sync::OnceLock;

use crate::executor::{Language, LanguageExecutor};

pub struct TypescriptExecutor;

impl LanguageExecutor for TypescriptExecutor {
    fn language(&self) -> Language {
        Language::Typescript
    }

    fn image(&self) -> &str {
        "node:20-slim"
    }

    fn format_check_cmd(&self) -> Vec<String> {
        argv(&["prettier", "--check", "."])
    }

    fn format_fix_cmd(&self) -> Vec<String> {
        argv(&["prettier", "--write", "."])
    }

    fn build_cmd(&self) -> Vec<String> {
        argv(&["tsc", "--noEmit", "--pretty", "false"])
    }

    fn test_cmd(&self, flags: &[String]) -> Vec<String> {
        let mut cmd = argv(&["vitest", "run", "--reporter=verbose"]);
        cmd.extend(flags.iter().cloned());
        cmd
    }

    fn parse_tests(&self, output: &str) -> Vec<TestRecord> {
        // vitest verbose lines: `✓ src/sum.test.ts > adds numbers 2ms`
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"(?m)^\s*(?P<mark>[✓×])\s+(?P<file>\S+)\s+>\s+(?P<name>.+?)(?:\s+(?P<ms>\d+)ms)?\s*$")
                .expect("vitest line regex")
        });

        re.captures_iter(output)
            .map(|caps| TestRecord {
                name: caps["name"].trim().to_string(),
                package: caps["file"].to_string(),
                passed: &caps["mark"] == "✓",
                duration_ms: caps
                    .name("ms")
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0),
                output: String::new(),
            })
            .collect()
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vitest_verbose_lines_parse() {
        let out = "\
 ✓ src/sum.test.ts > adds numbers 2ms
 × src/sum.test.ts > handles overflow 5ms
";
        let records = TypescriptExecutor.parse_tests(out);
        assert_eq!(records.len(), 2);
        assert!(records[0].passed);
        assert_eq!(records[0].duration_ms, 2);
        assert!(!records[1].passed);
        assert_eq!(records[1].name, "handles overflow");
    }
}
