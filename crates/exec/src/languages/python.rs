//! Python executor: black / compileall / pytest.

use pf_domain::session::TestRecord;
use regex::Regex;
use std::sync::OnceLock;

use crate::executor::{Language, LanguageExecutor};

pub struct PythonExecutor;

impl LanguageExecutor for PythonExecutor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn image(&self) -> &str {
        "python:3.12-slim"
    }

    fn format_check_cmd(&self) -> Vec<String> {
        argv(&["black", "--check", "--quiet", "."])
    }

    fn format_fix_cmd(&self) -> Vec<String> {
        argv(&["black", "--quiet", "."])
    }

    fn build_cmd(&self) -> Vec<String> {
        argv(&["python", "-m", "compileall", "-q", "."])
    }

    fn test_cmd(&self, flags: &[String]) -> Vec<String> {
        let mut cmd = argv(&["pytest", "-v", "--tb=short"]);
        cmd.extend(flags.iter().cloned());
        cmd
    }

    fn parse_tests(&self, output: &str) -> Vec<TestRecord> {
        // pytest -v lines: `path/test_x.py::test_name PASSED [ 50%]`
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"(?m)^(?P<file>\S+\.py)::(?P<name>\S+)\s+(?P<outcome>PASSED|FAILED|ERROR)")
                .expect("pytest line regex")
        });

        re.captures_iter(output)
            .map(|caps| TestRecord {
                name: caps["name"].to_string(),
                package: caps["file"].to_string(),
                passed: &caps["outcome"] == "PASSED",
                duration_ms: 0,
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
    fn pytest_verbose_lines_parse() {
        let out = "\
test_math.py::test_add PASSED   [ 50%]
test_math.py::test_div FAILED   [100%]
";
        let records = PythonExecutor.parse_tests(out);
        assert_eq!(records.len(), 2);
        assert!(records[0].passed);
        assert_eq!(records[1].name, "test_div");
        assert!(!records[1].passed);
    }

    #[test]
    fn non_test_lines_ignored() {
        let out = "===== 2 passed in 0.03s =====\n";
        assert!(PythonExecutor.parse_tests(out).is_empty());
    }
}
