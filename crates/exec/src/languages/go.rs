//! Go executor: gofmt / go build / go test -json.

use pf_domain::session::TestRecord;

use crate::diagnostics::parse_go_test_json;
use crate::executor::{Language, LanguageExecutor};

pub struct GoExecutor;

impl LanguageExecutor for GoExecutor {
    fn language(&self) -> Language {
        Language::Go
    }

    fn image(&self) -> &str {
        "golang:1.22-alpine"
    }

    fn format_check_cmd(&self) -> Vec<String> {
        // gofmt -l prints file names needing formatting; wrap so an
        // unformatted tree exits non-zero.
        sh("out=$(gofmt -l .) && test -z \"$out\" || { echo \"$out\"; exit 1; }")
    }

    fn format_fix_cmd(&self) -> Vec<String> {
        argv(&["gofmt", "-w", "."])
    }

    fn build_cmd(&self) -> Vec<String> {
        argv(&["go", "build", "./..."])
    }

    fn test_cmd(&self, flags: &[String]) -> Vec<String> {
        let mut cmd = argv(&["go", "test", "-json"]);
        cmd.extend(flags.iter().cloned());
        cmd.push("./...".into());
        cmd
    }

    fn parse_tests(&self, output: &str) -> Vec<TestRecord> {
        parse_go_test_json(output)
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn sh(script: &str) -> Vec<String> {
    vec!["sh".into(), "-c".into(), script.into()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_inserts_flags_before_packages() {
        let cmd = GoExecutor.test_cmd(&["-race".into()]);
        assert_eq!(cmd, vec!["go", "test", "-json", "-race", "./..."]);
    }

    #[test]
    fn format_check_fails_on_unformatted_output() {
        // The wrapped script must carry the gofmt listing.
        let cmd = GoExecutor.format_check_cmd();
        assert_eq!(cmd[0], "sh");
        assert!(cmd[2].contains("gofmt -l"));
    }
}
