//! Lenient parsing of LLM JSON responses.
//!
//! Models wrap JSON in markdown fences, vary key casing, and emit numbers as
//! strings. Parsing strips the wrapper, accepts key aliases, and drops
//! individual malformed entries instead of failing the whole response. A
//! response that cannot be parsed at all degrades to an empty result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::types::{
    AttributeMap, AttributeValue, EntityType, RelationshipType,
};

/// One entity mention extracted from content. Names refer to entities by
/// display name; the caller resolves them against the graph.
#[derive(Debug, Clone)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: EntityType,
    pub description: String,
    pub aliases: Vec<String>,
    pub attributes: AttributeMap,
    /// 1-10, clamped.
    pub importance: u8,
    /// Model's claim that the entity is not in the known list. Advisory:
    /// resolution always re-checks.
    pub is_new: bool,
}

/// One relationship mention, referring to entities by name.
#[derive(Debug, Clone)]
pub struct ExtractedRelationship {
    pub from: String,
    pub to: String,
    pub rel_type: RelationshipType,
    pub description: String,
    /// 1-10, clamped.
    pub strength: u8,
}

/// Parsed output of one extraction call.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub entities: Vec<ExtractedEntity>,
    pub relationships: Vec<ExtractedRelationship>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

/// One duplicate group from the curation pass.
#[derive(Debug, Clone)]
pub struct DedupGroup {
    pub canonical: String,
    pub duplicates: Vec<String>,
}

/// Raw wire shapes, before validation. Kept separate so serde leniency
/// (aliases, loose numbers) stays out of the domain types.
mod raw {
    use super::*;

    #[derive(Deserialize)]
    pub struct Response {
        #[serde(default)]
        pub entities: Vec<serde_json::Value>,
        #[serde(default)]
        pub relationships: Vec<serde_json::Value>,
    }

    #[derive(Deserialize)]
    pub struct Entity {
        pub name: String,
        #[serde(alias = "entity_type", alias = "entityType")]
        pub r#type: String,
        #[serde(default)]
        pub description: String,
        #[serde(default)]
        pub aliases: Vec<String>,
        #[serde(default)]
        pub attributes: serde_json::Map<String, serde_json::Value>,
        #[serde(default)]
        pub importance: Option<serde_json::Value>,
        #[serde(default, alias = "isNew", alias = "is_new")]
        pub is_new: Option<bool>,
    }

    #[derive(Deserialize)]
    pub struct Relationship {
        #[serde(alias = "source", alias = "from_entity")]
        pub from: String,
        #[serde(alias = "target", alias = "to_entity")]
        pub to: String,
        #[serde(alias = "relationship_type", alias = "relationshipType")]
        pub r#type: String,
        #[serde(default)]
        pub description: String,
        #[serde(default)]
        pub strength: Option<serde_json::Value>,
    }

    #[derive(Deserialize)]
    pub struct DedupResponse {
        #[serde(default)]
        pub groups: Vec<DedupGroup>,
    }

    #[derive(Deserialize)]
    pub struct DedupGroup {
        pub canonical: String,
        #[serde(default)]
        pub duplicates: Vec<String>,
    }

    #[derive(Deserialize)]
    pub struct IrrelevanceResponse {
        #[serde(default)]
        pub irrelevant: Vec<String>,
    }
}

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid fence regex"));

/// Strip a markdown code fence and any prose around the JSON body.
pub fn strip_json_wrapper(content: &str) -> &str {
    if let Some(captures) = FENCE_RE.captures(content) {
        if let Some(inner) = captures.get(1) {
            return inner.as_str();
        }
    }
    // No fence: cut to the outermost braces, tolerating leading prose.
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => content.trim(),
    }
}

/// Parse an extraction response, dropping malformed entries. Returns an
/// empty result when the response is not JSON at all.
pub fn parse_extraction(content: &str) -> ExtractionResult {
    let body = strip_json_wrapper(content);
    let response: raw::Response = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable extraction response, returning empty");
            return ExtractionResult::default();
        }
    };

    let mut result = ExtractionResult::default();

    for value in response.entities {
        let entity: raw::Entity = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed entity entry");
                continue;
            }
        };
        if entity.name.trim().is_empty() {
            continue;
        }
        let Some(entity_type) = EntityType::from_str_flexible(&entity.r#type) else {
            tracing::warn!(name = %entity.name, raw_type = %entity.r#type, "skipping entity with unknown type");
            continue;
        };
        let mut attributes = AttributeMap::new();
        for (key, value) in &entity.attributes {
            if let Some(attr) = AttributeValue::from_json(value) {
                attributes.insert(key.clone(), attr);
            }
        }
        result.entities.push(ExtractedEntity {
            name: entity.name.trim().to_string(),
            entity_type,
            description: entity.description.trim().to_string(),
            aliases: entity.aliases,
            attributes,
            importance: lenient_score(entity.importance.as_ref(), 5),
            is_new: entity.is_new.unwrap_or(true),
        });
    }

    for value in response.relationships {
        let rel: raw::Relationship = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed relationship entry");
                continue;
            }
        };
        if rel.from.trim().is_empty() || rel.to.trim().is_empty() {
            continue;
        }
        let Some(rel_type) = RelationshipType::from_str_flexible(&rel.r#type) else {
            tracing::warn!(raw_type = %rel.r#type, "skipping relationship with unknown type");
            continue;
        };
        result.relationships.push(ExtractedRelationship {
            from: rel.from.trim().to_string(),
            to: rel.to.trim().to_string(),
            rel_type,
            description: rel.description.trim().to_string(),
            strength: lenient_score(rel.strength.as_ref(), 5),
        });
    }

    result
}

/// Parse a duplicate-detection response. Unparseable responses yield no
/// groups.
pub fn parse_dedup(content: &str) -> Vec<DedupGroup> {
    let body = strip_json_wrapper(content);
    let response: raw::DedupResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable dedup response");
            return Vec::new();
        }
    };
    response
        .groups
        .into_iter()
        .filter(|g| !g.canonical.trim().is_empty() && !g.duplicates.is_empty())
        .map(|g| DedupGroup {
            canonical: g.canonical,
            duplicates: g.duplicates,
        })
        .collect()
}

/// Parse an irrelevance-detection response into flagged entity names.
pub fn parse_irrelevance(content: &str) -> Vec<String> {
    let body = strip_json_wrapper(content);
    let response: raw::IrrelevanceResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable irrelevance response");
            return Vec::new();
        }
    };
    response
        .irrelevant
        .into_iter()
        .filter(|n| !n.trim().is_empty())
        .collect()
}

/// Accept a 1-10 score as a JSON number or a numeric string; clamp into
/// range, fall back to `default` otherwise.
fn lenient_score(value: Option<&serde_json::Value>, default: u8) -> u8 {
    let parsed = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => (v.round() as i64).clamp(1, 10) as u8,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_json() {
        let content = r#"{
            "entities": [
                {"name": "Klaus", "type": "character", "description": "A general", "importance": 8, "isNew": true}
            ],
            "relationships": [
                {"from": "Klaus", "to": "Anna", "type": "enemy", "description": "hates her", "strength": 7}
            ]
        }"#;
        let result = parse_extraction(content);
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].name, "Klaus");
        assert_eq!(result.entities[0].entity_type, EntityType::Character);
        assert_eq!(result.entities[0].importance, 8);
        assert!(result.entities[0].is_new);
        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.relationships[0].rel_type, RelationshipType::Enemy);
        assert_eq!(result.relationships[0].strength, 7);
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "Here is the result:\n```json\n{\"entities\": [{\"name\": \"Anna\", \"type\": \"person\"}], \"relationships\": []}\n```\nDone.";
        let result = parse_extraction(content);
        assert_eq!(result.entities.len(), 1);
        // "person" maps into the closed enum
        assert_eq!(result.entities[0].entity_type, EntityType::Character);
        // Missing importance defaults to the midpoint
        assert_eq!(result.entities[0].importance, 5);
    }

    #[test]
    fn test_parse_prose_wrapped_json() {
        let content = "Sure! {\"entities\": [], \"relationships\": []} hope that helps";
        assert!(parse_extraction(content).is_empty());
    }

    #[test]
    fn test_garbage_degrades_to_empty() {
        assert!(parse_extraction("I could not find any entities.").is_empty());
        assert!(parse_extraction("").is_empty());
        assert!(parse_dedup("not json").is_empty());
        assert!(parse_irrelevance("not json").is_empty());
    }

    #[test]
    fn test_malformed_entries_skipped_not_fatal() {
        let content = r#"{
            "entities": [
                {"name": "Klaus", "type": "character"},
                {"name": "Ghost", "type": "spirit_animal"},
                {"type": "character"},
                {"name": "", "type": "character"}
            ],
            "relationships": [
                {"from": "Klaus", "to": "Anna", "type": "despises_utterly"}
            ]
        }"#;
        let result = parse_extraction(content);
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].name, "Klaus");
        assert!(result.relationships.is_empty());
    }

    #[test]
    fn test_lenient_scores() {
        let content = r#"{
            "entities": [
                {"name": "A", "type": "character", "importance": "9"},
                {"name": "B", "type": "character", "importance": 99},
                {"name": "C", "type": "character", "importance": "lots"}
            ],
            "relationships": []
        }"#;
        let result = parse_extraction(content);
        assert_eq!(result.entities[0].importance, 9);
        assert_eq!(result.entities[1].importance, 10);
        assert_eq!(result.entities[2].importance, 5);
    }

    #[test]
    fn test_key_aliases() {
        let content = r#"{
            "entities": [{"name": "Klaus", "entity_type": "character", "is_new": false}],
            "relationships": [{"source": "Klaus", "target": "Anna", "relationship_type": "rivalry"}]
        }"#;
        let result = parse_extraction(content);
        assert!(!result.entities[0].is_new);
        assert_eq!(result.relationships[0].from, "Klaus");
        assert_eq!(result.relationships[0].rel_type, RelationshipType::Rivalry);
    }

    #[test]
    fn test_attributes_scalars_only() {
        let content = r#"{
            "entities": [{
                "name": "Klaus", "type": "character",
                "attributes": {"rank": "general", "age": 52, "loyal": true, "gone": null}
            }],
            "relationships": []
        }"#;
        let result = parse_extraction(content);
        let attrs = &result.entities[0].attributes;
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get("rank"), Some(&AttributeValue::String("general".into())));
        assert!(attrs.get("gone").is_none());
    }

    #[test]
    fn test_parse_dedup_groups() {
        let content = r#"```json
        {"groups": [
            {"canonical": "Klaus", "duplicates": ["The General", "Klaus von Hardt"]},
            {"canonical": "Anna", "duplicates": []}
        ]}
        ```"#;
        let groups = parse_dedup(content);
        // Empty duplicate lists are dropped
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].canonical, "Klaus");
        assert_eq!(groups[0].duplicates.len(), 2);
    }

    #[test]
    fn test_parse_irrelevance() {
        let names = parse_irrelevance(r#"{"irrelevant": ["the innkeeper", ""]}"#);
        assert_eq!(names, vec!["the innkeeper"]);
    }
}
