//! Rust executor: cargo fmt / cargo build / cargo test.

use pf_domain::session::TestRecord;
use regex::Regex;
use std::sync::OnceLock;

use crate::executor::{Language, LanguageExecutor};

pub struct RustExecutor;

impl LanguageExecutor for RustExecutor {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn image(&self) -> &str {
        "rust:1.79-slim"
    }

    fn format_check_cmd(&self) -> Vec<String> {
        argv(&["cargo", "fmt", "--check"])
    }

    fn format_fix_cmd(&self) -> Vec<String> {
        argv(&["cargo", "fmt"])
    }

    fn build_cmd(&self) -> Vec<String> {
        argv(&["cargo", "build", "--quiet"])
    }

    fn test_cmd(&self, flags: &[String]) -> Vec<String> {
        let mut cmd = argv(&["cargo", "test", "--quiet"]);
        if !flags.is_empty() {
            cmd.push("--".into());
            cmd.extend(flags.iter().cloned());
        }
        cmd
    }

    fn parse_tests(&self, output: &str) -> Vec<TestRecord> {
        // libtest lines: `test module::name ... ok` / `... FAILED`
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"(?m)^test\s+(?P<name>\S+)\s+\.\.\.\s+(?P<outcome>ok|FAILED|ignored)")
                .expect("libtest line regex")
        });

        re.captures_iter(output)
            .filter(|caps| &caps["outcome"] != "ignored")
            .map(|caps| TestRecord {
                name: caps["name"].to_string(),
                package: String::new(),
                passed: &caps["outcome"] == "ok",
                duration_ms: 0,
                output: String::new(),
            })
            .collect()
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
