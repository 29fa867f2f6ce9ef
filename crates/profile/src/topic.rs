//! Topic-key derivation from exercise references.
//!
//! `<pack>/<category>/<slug>` → `<language>/<category>` where language
//! is the pack prefix before the first hyphen; `<pack>/<slug>` →
//! `<language>`; anything else → `general`.

pub const GENERAL_TOPIC: &str = "general";

pub fn topic_key(exercise_id: Option<&str>) -> String {
    let Some(exercise_id) = exercise_id else {
        return GENERAL_TOPIC.to_string();
    };

    let parts: Vec<&str> = exercise_id.split('/').filter(|p| !p.is_empty()).collect();
    let language = match parts.first() {
        Some(pack) => pack.split('-').next().unwrap_or(pack),
        None => return GENERAL_TOPIC.to_string(),
    };
    if language.is_empty() {
        return GENERAL_TOPIC.to_string();
    }

    match parts.len() {
        3 => format!("{language}/{}", parts[1]),
        2 => language.to_string(),
        _ => GENERAL_TOPIC.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_reference_yields_language_and_category() {
        assert_eq!(
            topic_key(Some("go-v1/basics/hello-world")),
            "go/basics"
        );
        assert_eq!(topic_key(Some("python-core/strings/reverse")), "python/strings");
    }

    #[test]
    fn two_part_reference_yields_language_only() {
        assert_eq!(topic_key(Some("rust-v2/ownership")), "rust");
    }

    #[test]
    fn missing_or_odd_references_are_general() {
        assert_eq!(topic_key(None), "general");
        assert_eq!(topic_key(Some("")), "general");
        assert_eq!(topic_key(Some("just-a-slug")), "general");
        assert_eq!(topic_key(Some("a/b/c/d")), "general");
    }

    #[test]
    fn pack_without_hyphen_is_its_own_language() {
        assert_eq!(topic_key(Some("go/basics/hello")), "go/basics");
    }
}
