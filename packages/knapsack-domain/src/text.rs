use std::collections::HashSet;

use serde_json::Value;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::item::{Attributes, Item};

pub const MAX_QUERY_TERMS: usize = 16;

/// Lowercased, NFKC-folded word tokens in first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
	let folded = text.nfkc().collect::<String>().to_lowercase();
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for word in folded.unicode_words() {
		for part in word.split(|ch: char| !ch.is_alphanumeric()) {
			if part.is_empty() {
				continue;
			}
			if seen.insert(part.to_string()) {
				out.push(part.to_string());
			}
		}
	}

	out
}

pub fn tokenize_query(query: &str) -> Vec<String> {
	let mut terms = tokenize(query);

	terms.truncate(MAX_QUERY_TERMS);

	terms
}

/// Name, description, and serialized attributes joined the way the search index sees them.
pub fn searchable_text(item: &Item) -> String {
	let mut out = item.name.clone();

	if let Some(description) = item.description.as_deref() {
		out.push(' ');
		out.push_str(description);
	}
	if !item.attributes.is_empty() {
		out.push(' ');
		out.push_str(&Value::Object(item.attributes.clone()).to_string());
	}

	out
}

/// Every term must be a prefix of at least one token.
pub fn matches_terms(terms: &[String], tokens: &[String]) -> bool {
	terms.iter().all(|term| tokens.iter().any(|token| token.starts_with(term.as_str())))
}

pub fn item_matches_query(item: &Item, terms: &[String]) -> bool {
	if terms.is_empty() {
		return true;
	}

	matches_terms(terms, &tokenize(&searchable_text(item)))
}

/// Renders terms as a literal Postgres prefix tsquery, e.g. `'warm':* & 'coat':*`.
///
/// Meant for a `::tsquery` cast so the server does not re-parse the terms.
pub fn prefix_tsquery(terms: &[String]) -> Option<String> {
	if terms.is_empty() {
		return None;
	}

	Some(
		terms
			.iter()
			.map(|term| format!("'{}':*", term.replace('\\', "\\\\").replace('\'', "''")))
			.collect::<Vec<_>>()
			.join(" & "),
	)
}

pub fn attribute_text(value: &Value) -> String {
	match value {
		Value::String(raw) => raw.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

/// Case-insensitive substring match on one attribute; absent keys never match.
pub fn attribute_contains(attributes: &Attributes, key: &str, needle: &str) -> bool {
	let Some(value) = attributes.get(key) else { return false };

	attribute_text(value).to_lowercase().contains(&needle.to_lowercase())
}
