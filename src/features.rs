//! Feature extraction: categorize matches and derive aggregate items.
//!
//! The pattern's category is authoritative; the eight pattern categories
//! project onto the four feature categories. Derived items (casing
//! statistics, documentation density, complexity counters) are pure
//! functions over the primary spans; nothing is re-parsed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::patterns::{PatternCategory, PatternMatch};
use crate::tree::Span;

/// The four feature buckets hosts consume.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    Syntax,
    Structure,
    Documentation,
    Semantics,
}

impl From<PatternCategory> for FeatureCategory {
    fn from(category: PatternCategory) -> Self {
        match category {
            PatternCategory::Syntax => Self::Syntax,
            PatternCategory::Structure | PatternCategory::Architecture => Self::Structure,
            PatternCategory::Documentation => Self::Documentation,
            PatternCategory::Semantics
            | PatternCategory::Naming
            | PatternCategory::CodePattern
            | PatternCategory::ErrorHandling => Self::Semantics,
        }
    }
}

/// One named item in a feature bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureItem {
    pub name: String,
    pub span: Span,
    pub attrs: BTreeMap<String, String>,
}

/// Categorized features of one parsed unit. An item belongs to exactly
/// one category per extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    items: BTreeMap<FeatureCategory, Vec<FeatureItem>>,
}

impl FeatureSet {
    pub fn add(&mut self, category: FeatureCategory, item: FeatureItem) {
        self.items.entry(category).or_default().push(item);
    }

    pub fn get(&self, category: FeatureCategory) -> &[FeatureItem] {
        self.items.get(&category).map_or(&[], Vec::as_slice)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&FeatureCategory, &Vec<FeatureItem>)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.values().all(Vec::is_empty)
    }
}

/// Build the feature set for a match list.
pub fn extract(matches: &[PatternMatch], language_id: &str) -> FeatureSet {
    let mut set = FeatureSet::default();

    for m in matches {
        let category = FeatureCategory::from(m.metadata.category);
        let mut attrs = BTreeMap::new();
        attrs.insert("kind".to_string(), m.metadata.item_kind.clone());
        attrs.insert("node_kind".to_string(), m.metadata.node_kind.clone());
        attrs.insert(
            "confidence".to_string(),
            format!("{:.2}", m.metadata.confidence),
        );
        if let Some(via) = &m.metadata.recovered {
            attrs.insert("recovered".to_string(), via.clone());
        }

        set.add(
            category,
            FeatureItem {
                name: m
                    .name
                    .clone()
                    .unwrap_or_else(|| m.metadata.item_kind.clone()),
                span: m.primary_span,
                attrs,
            },
        );
    }

    derive_naming_profile(matches, &mut set);
    derive_doc_density(matches, &mut set);
    derive_complexity(matches, language_id, &mut set);

    set
}

/// Identifier-casing statistics over every named match.
fn derive_naming_profile(matches: &[PatternMatch], set: &mut FeatureSet) {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for name in matches.iter().filter_map(|m| m.name.as_deref()) {
        if name.chars().all(|c| !c.is_alphanumeric()) {
            continue;
        }
        *counts.entry(classify_casing(name)).or_insert(0) += 1;
    }
    if counts.is_empty() {
        return;
    }

    let dominant = counts
        .iter()
        .max_by_key(|&(_, n)| n)
        .map(|(&style, _)| style)
        .unwrap_or("mixed");

    let mut attrs: BTreeMap<String, String> = counts
        .into_iter()
        .map(|(style, n)| (style.to_string(), n.to_string()))
        .collect();
    attrs.insert("dominant".to_string(), dominant.to_string());

    set.add(
        FeatureCategory::Semantics,
        FeatureItem {
            name: "casing_profile".to_string(),
            span: Span::default(),
            attrs,
        },
    );
}

/// Documentation density: how many doc items were seen.
fn derive_doc_density(matches: &[PatternMatch], set: &mut FeatureSet) {
    let docs = matches
        .iter()
        .filter(|m| m.metadata.category == PatternCategory::Documentation)
        .count();
    if docs == 0 {
        return;
    }
    let mut attrs = BTreeMap::new();
    attrs.insert("count".to_string(), docs.to_string());

    set.add(
        FeatureCategory::Documentation,
        FeatureItem {
            name: "doc_density".to_string(),
            span: Span::default(),
            attrs,
        },
    );
}

/// Branch/function counters, a coarse complexity signal.
fn derive_complexity(matches: &[PatternMatch], language_id: &str, set: &mut FeatureSet) {
    let branches = matches
        .iter()
        .filter(|m| m.metadata.item_kind == "branch")
        .count();
    let functions = matches
        .iter()
        .filter(|m| {
            matches!(
                m.metadata.item_kind.as_str(),
                "function" | "arrow_function" | "method"
            )
        })
        .count();
    if branches == 0 && functions == 0 {
        return;
    }

    let mut attrs = BTreeMap::new();
    attrs.insert("language".to_string(), language_id.to_string());
    attrs.insert("branches".to_string(), branches.to_string());
    attrs.insert("functions".to_string(), functions.to_string());

    set.add(
        FeatureCategory::Structure,
        FeatureItem {
            name: "complexity".to_string(),
            span: Span::default(),
            attrs,
        },
    );
}

fn classify_casing(name: &str) -> &'static str {
    let has_underscore = name.contains('_');
    let has_upper = name.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = name.chars().any(|c| c.is_ascii_lowercase());
    let first_upper = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());

    match (has_underscore, has_upper, has_lower, first_upper) {
        (true, true, false, _) => "screaming_snake",
        (true, _, _, _) => "snake",
        (false, true, true, true) => "pascal",
        (false, true, true, false) => "camel",
        (false, false, true, _) => "flat",
        _ => "mixed",
    }
}
