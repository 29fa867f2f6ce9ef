//! Prompt assembly and response relabeling.
//!
//! The prompt names the chosen level and type explicitly; the policy
//! itself never rides along. The clamp is enforced on the way back:
//! a response claiming a higher level than requested is relabeled to
//! the requested level and its claim stripped.

use std::sync::OnceLock;

use regex::Regex;

use pf_domain::exercise::{Exercise, SpecDoc};
use pf_domain::session::{CodeSnapshot, InterventionIntent, InterventionKind, Level, Run};

/// Cap on total snapshot characters included in a prompt.
const SNAPSHOT_CHAR_BUDGET: usize = 12_000;
/// Cap per file before truncation.
const FILE_CHAR_BUDGET: usize = 4_000;
/// Tail of run output included as diagnostics.
const DIAGNOSTIC_TAIL_CHARS: usize = 1_500;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// System prompt
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn system_prompt() -> String {
    "You are a pairing mentor. You never write the learner's code for them \
     unless the requested level explicitly allows it. Respect the requested \
     intervention level exactly:\n\
     L0: ask one clarifying question, nothing else.\n\
     L1: name the category of the problem (e.g. \"think about null cases\").\n\
     L2: point at the location and the concept involved.\n\
     L3: give a constrained snippet or outline, not a full solution.\n\
     L4: give a partial solution with an explanation.\n\
     L5: give the full solution.\n\
     Never exceed the requested level."
        .to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// User prompt
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PromptInputs<'a> {
    pub intent: InterventionIntent,
    pub level: Level,
    pub kind: InterventionKind,
    pub exercise: Option<&'a Exercise>,
    pub spec: Option<&'a SpecDoc>,
    pub code: &'a CodeSnapshot,
    pub last_run: Option<&'a Run>,
}

pub fn user_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(exercise) = inputs.exercise {
        let mut s = format!(
            "## Exercise: {}\n{}\n",
            exercise.title, exercise.description
        );
        if !exercise.rubric.is_empty() {
            s.push_str("\nWhat done looks like:\n");
            for item in &exercise.rubric {
                s.push_str(&format!("- {item}\n"));
            }
        }
        sections.push(s);
    }

    if let Some(spec) = inputs.spec {
        match spec.next_criterion() {
            Some((feature, criterion)) => sections.push(format!(
                "## Current feature: {}\n{}\n\nNext unsatisfied acceptance criterion:\n- {}\n",
                feature.name, feature.summary, criterion.text
            )),
            None => sections.push(format!(
                "## Spec: {}\nAll acceptance criteria are satisfied; help the \
                 learner verify and polish.\n",
                spec.name
            )),
        }
    }

    sections.push(render_snapshot(inputs.code));

    if let Some(run) = inputs.last_run {
        sections.push(render_diagnostics(run));
    }

    sections.push(format!(
        "## Your task\nThe learner asked for: {intent}. Respond with a {kind} at \
         level {level} (see the level ladder). Stay at level {level} — do not \
         give away more.",
        intent = inputs.intent.as_str(),
        kind = inputs.kind.as_str(),
        level = inputs.level,
    ));

    sections.join("\n")
}

fn render_snapshot(code: &CodeSnapshot) -> String {
    let mut s = String::from("## Current code\n");
    let mut budget = SNAPSHOT_CHAR_BUDGET;

    for (path, content) in code {
        if budget == 0 {
            s.push_str("(remaining files omitted for size)\n");
            break;
        }
        let mut body = content.as_str();
        let mut truncated = false;
        if body.len() > FILE_CHAR_BUDGET {
            body = truncate_at_boundary(body, FILE_CHAR_BUDGET);
            truncated = true;
        }
        if body.len() > budget {
            body = truncate_at_boundary(body, budget);
            truncated = true;
        }
        budget = budget.saturating_sub(body.len());
        s.push_str(&format!("### {path}\n```\n{body}\n```\n"));
        if truncated {
            s.push_str("(truncated)\n");
        }
    }
    s
}

fn render_diagnostics(run: &Run) -> String {
    let mut s = String::from("## Last run\n");
    s.push_str(&format!(
        "format_ok={} build_ok={} test_ok={}\n",
        run.result.format_ok, run.result.build_ok, run.result.test_ok
    ));

    if !run.result.build_ok && !run.result.build_output.is_empty() {
        s.push_str("Build output:\n```\n");
        s.push_str(tail(&run.result.build_output, DIAGNOSTIC_TAIL_CHARS));
        s.push_str("\n```\n");
    }

    let failed: Vec<_> = run
        .result
        .test_results
        .iter()
        .filter(|t| !t.passed)
        .collect();
    if !failed.is_empty() {
        s.push_str("Failing tests:\n");
        for test in failed.iter().take(10) {
            s.push_str(&format!("- {}: {}\n", test.name, tail(&test.output, 200)));
        }
    } else if !run.result.test_ok && !run.result.test_output.is_empty() {
        s.push_str("Test output:\n```\n");
        s.push_str(tail(&run.result.test_output, DIAGNOSTIC_TAIL_CHARS));
        s.push_str("\n```\n");
    }
    s
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response relabeling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn level_claim_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\[?(?:Level[ :]*)?L(?P<n>[0-5])\]?\s*[:\-—]?\s*")
            .expect("level claim regex")
    })
}

/// Strip any leading level claim from a response.
///
/// The claim is never trusted: the persisted level is always the one
/// that was requested, so a response pretending to be L5 is simply
/// relabeled down.
pub fn strip_level_claim(content: &str) -> (String, Option<Level>) {
    match level_claim_re().captures(content) {
        Some(caps) => {
            let claimed = caps
                .name("n")
                .and_then(|n| n.as_str().parse::<u8>().ok())
                .and_then(Level::from_u8);
            let stripped = level_claim_re().replace(content, "").into_owned();
            (stripped, claimed)
        }
        None => (content.to_string(), None),
    }
}
