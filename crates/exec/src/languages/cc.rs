//! C and C++ executors: clang-format / cc syntax check / compiled test
//! binary.
//!
//! Neither toolchain has a structured test reporter, so the test phase
//! compiles everything and runs the resulting binary; exit 0 means the
//! suite passed. Per-test records stay empty.

use crate::executor::{Language, LanguageExecutor};

pub struct CExecutor;

impl LanguageExecutor for CExecutor {
    fn language(&self) -> Language {
        Language::C
    }

    fn image(&self) -> &str {
        "gcc:13"
    }

    fn format_check_cmd(&self) -> Vec<String> {
        sh("clang-format --dry-run -Werror *.c *.h 2>/dev/null || clang-format --dry-run -Werror *.c")
    }

    fn format_fix_cmd(&self) -> Vec<String> {
        sh("clang-format -i *.c *.h 2>/dev/null || clang-format -i *.c")
    }

    fn build_cmd(&self) -> Vec<String> {
        sh("cc -Wall -o /tmp/pairflow-bin *.c")
    }

    fn test_cmd(&self, _flags: &[String]) -> Vec<String> {
        sh("cc -Wall -o /tmp/pairflow-bin *.c && /tmp/pairflow-bin")
    }
}

pub struct CppExecutor;

impl LanguageExecutor for CppExecutor {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn image(&self) -> &str {
        "gcc:13"
    }

    fn format_check_cmd(&self) -> Vec<String> {
        sh("clang-format --dry-run -Werror *.cpp *.cc *.h 2>/dev/null || clang-format --dry-run -Werror *.cpp")
    }

    fn format_fix_cmd(&self) -> Vec<String> {
        sh("clang-format -i *.cpp *.cc *.h 2>/dev/null || clang-format -i *.cpp")
    }

    fn build_cmd(&self) -> Vec<String> {
        sh("c++ -Wall -std=c++17 -o /tmp/pairflow-bin *.cpp")
    }

    fn test_cmd(&self, _flags: &[String]) -> Vec<String> {
        sh("c++ -Wall -std=c++17 -o /tmp/pairflow-bin *.cpp && /tmp/pairflow-bin")
    }
}

fn sh(script: &str) -> Vec<String> {
    vec!["sh".into(), "-c".into(), script.into()]
}
