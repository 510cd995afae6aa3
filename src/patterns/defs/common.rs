//! Patterns shared by every language: markers, urls, contact points.

use super::Pattern;
use super::{PatternCategory::Documentation, regex, without_name};

pub fn patterns(language_id: &str) -> Vec<Pattern> {
    vec![
        regex(
            language_id,
            &format!("{language_id}.todo"),
            Documentation,
            r"(?m)\b(?:TODO|FIXME|XXX|HACK)\b[:\s]*(?P<name>[^\n]*)",
            "todo",
        ),
        without_name(regex(
            language_id,
            &format!("{language_id}.url"),
            Documentation,
            r#"https?://[^\s<>)"']+"#,
            "url",
        )),
        without_name(regex(
            language_id,
            &format!("{language_id}.email"),
            Documentation,
            r"\b[\w.+-]+@[\w.-]+\.[A-Za-z]{2,}\b",
            "email",
        )),
    ]
}
