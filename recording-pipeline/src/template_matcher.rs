//! Template matcher (§4.4) — first-match selection of a user template.

use regex::RegexBuilder;
use tracing::warn;

use crate::domain::{MatchReason, RecordingTemplate};

pub struct TemplateMatch<'a> {
    pub template: &'a RecordingTemplate,
    pub reason: MatchReason,
}

fn build_regex(pattern: &str, case_sensitive: bool) -> Option<regex::Regex> {
    match RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
    {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "malformed template pattern, ignoring");
            None
        }
    }
}

fn normalize(s: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

fn contains(haystack: &str, needle: &str, case_sensitive: bool) -> bool {
    normalize(haystack, case_sensitive).contains(&normalize(needle, case_sensitive))
}

fn equals(a: &str, b: &str, case_sensitive: bool) -> bool {
    normalize(a, case_sensitive) == normalize(b, case_sensitive)
}

/// Does `template` match `(display_name, source_id)`? First-match-wins
/// algorithm from §4.4, evaluated against a single candidate template.
fn matches_one(
    template: &RecordingTemplate,
    display_name: &str,
    source_id: Option<&str>,
) -> Option<MatchReason> {
    let rules = &template.matching_rules;
    let case_sensitive = rules.case_sensitive;

    // 1. Source filter.
    if !rules.source_ids.is_empty() {
        match source_id {
            Some(sid) if rules.source_ids.iter().any(|s| s == sid) => {}
            _ => return None,
        }
    }

    // 2. Exclude keywords.
    if rules
        .exclude_keywords
        .iter()
        .any(|kw| contains(display_name, kw, case_sensitive))
    {
        return None;
    }

    // 3. Exclude patterns.
    if rules.exclude_patterns.iter().any(|pat| {
        build_regex(pat, case_sensitive)
            .map(|re| re.is_match(display_name))
            .unwrap_or(false)
    }) {
        return None;
    }

    // 4. Exact matches.
    if rules
        .exact_matches
        .iter()
        .any(|m| equals(m, display_name, case_sensitive))
    {
        return Some(MatchReason::Exact);
    }

    // 5. Include keywords.
    if rules
        .include_keywords
        .iter()
        .any(|kw| contains(display_name, kw, case_sensitive))
    {
        return Some(MatchReason::Keyword);
    }

    // 6. Include patterns.
    if rules.include_patterns.iter().any(|pat| {
        build_regex(pat, case_sensitive)
            .map(|re| re.is_match(display_name))
            .unwrap_or(false)
    }) {
        return Some(MatchReason::Pattern);
    }

    None
}

/// Find the first matching, active, non-draft template. `templates` must
/// already be ordered by `created_at ASC` (determinism property in §8).
pub fn find_match<'a>(
    display_name: &str,
    source_id: Option<&str>,
    templates: &'a [RecordingTemplate],
) -> Option<TemplateMatch<'a>> {
    templates
        .iter()
        .filter(|t| t.is_active && !t.is_draft)
        .find_map(|t| {
            matches_one(t, display_name, source_id).map(|reason| TemplateMatch {
                template: t,
                reason,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchingRules;
    use chrono::Utc;

    fn template(id: i64, rules: MatchingRules, created_offset_secs: i64) -> RecordingTemplate {
        RecordingTemplate {
            id,
            user_id: 1,
            name: format!("t{id}"),
            matching_rules: rules,
            processing_config: serde_json::json!({}),
            metadata_config: serde_json::json!({}),
            output_config: serde_json::json!({}),
            is_draft: false,
            is_active: true,
            used_count: 0,
            last_used_at: None,
            created_at: Utc::now() + chrono::Duration::seconds(created_offset_secs),
        }
    }

    #[test]
    fn earliest_created_match_wins_regardless_of_reason() {
        let earlier = template(
            1,
            MatchingRules {
                include_keywords: vec!["Lecture".into()],
                ..Default::default()
            },
            0,
        );
        let later = template(
            2,
            MatchingRules {
                exact_matches: vec!["ML Lecture 01".into()],
                ..Default::default()
            },
            10,
        );
        let templates = vec![earlier, later];
        let m = find_match("ML Lecture 01", None, &templates).unwrap();
        // first-match-wins over creation order: the earlier template (keyword) wins
        // even though a later template would match "exact".
        assert_eq!(m.template.id, 1);
        assert_eq!(m.reason, MatchReason::Keyword);
    }

    #[test]
    fn exclude_keyword_skips_template() {
        let t = template(
            1,
            MatchingRules {
                include_keywords: vec!["Lecture".into()],
                exclude_keywords: vec!["Draft".into()],
                ..Default::default()
            },
            0,
        );
        let templates = vec![t];
        assert!(find_match("Draft Lecture", None, &templates).is_none());
    }

    #[test]
    fn source_filter_rejects_other_sources() {
        let t = template(
            1,
            MatchingRules {
                source_ids: vec!["7".into()],
                include_keywords: vec!["Lecture".into()],
                ..Default::default()
            },
            0,
        );
        let templates = vec![t];
        assert!(find_match("Lecture", Some("8"), &templates).is_none());
        assert!(find_match("Lecture", Some("7"), &templates).is_some());
    }

    #[test]
    fn malformed_regex_is_ignored_not_fatal() {
        let t = template(
            1,
            MatchingRules {
                include_patterns: vec!["(unclosed".into()],
                ..Default::default()
            },
            0,
        );
        let templates = vec![t];
        assert!(find_match("anything", None, &templates).is_none());
    }

    #[test]
    fn draft_and_inactive_templates_are_skipped() {
        let mut draft = template(
            1,
            MatchingRules {
                include_keywords: vec!["Lecture".into()],
                ..Default::default()
            },
            0,
        );
        draft.is_draft = true;
        let templates = vec![draft];
        assert!(find_match("Lecture", None, &templates).is_none());
    }
}
