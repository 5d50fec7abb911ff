//! Prompt builders for extraction, summarization, and curation calls.
//!
//! Prompts demand strict JSON with importance scores 1-10 and an explicit
//! `isNew` flag per entity so the caller can route results through the
//! resolver without re-deriving novelty.

use crate::types::{Entity, EntityType, RelationshipType};

/// System prompt for entity/relationship extraction.
pub fn extraction_system_prompt() -> String {
    let entity_types: Vec<&str> = EntityType::all().iter().map(|t| t.as_str()).collect();
    let relationship_types: Vec<&str> =
        RelationshipType::all().iter().map(|t| t.as_str()).collect();

    format!(
        r#"You are an entity extraction system for an ongoing story. Extract entities and relationships from the content.

ENTITY TYPES: {}

RELATIONSHIP TYPES: {}

Output JSON in this exact format:
{{
  "entities": [
    {{"name": "entity name", "type": "type", "description": "current truth about the entity", "aliases": ["alternate name"], "attributes": {{"key": "value"}}, "importance": 5, "isNew": true}}
  ],
  "relationships": [
    {{"from": "source entity", "to": "target entity", "type": "type", "description": "relationship context", "strength": 5}}
  ]
}}

Rules:
1. Only extract explicitly mentioned entities
2. importance and strength are integers from 1 to 10
3. Set isNew to false when the entity appears in the KNOWN ENTITIES list
4. Reuse the known entity's exact name when referring to it
5. Keep descriptions brief (under 60 words)
6. If nothing is found, return empty arrays

Return ONLY valid JSON, no other text."#,
        entity_types.join(", "),
        relationship_types.join(", ")
    )
}

/// User prompt for turn-level extraction, embedding the known-entity summary
/// and optional story context.
pub fn extraction_user_prompt(content: &str, known_entities: &str, story_context: &str) -> String {
    let mut prompt = String::new();
    if !story_context.is_empty() {
        prompt.push_str("STORY CONTEXT:\n");
        prompt.push_str(story_context);
        prompt.push_str("\n\n");
    }
    if !known_entities.is_empty() {
        prompt.push_str("KNOWN ENTITIES:\n");
        prompt.push_str(known_entities);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Extract entities and relationships from this content:\n\n");
    prompt.push_str(content);
    prompt
}

/// User prompt for bulk dossier extraction (cold-start population). No
/// known-entity context is supplied.
pub fn dossier_user_prompt(content: &str) -> String {
    format!(
        "Extract every entity and relationship from this document:\n\n{}",
        content
    )
}

/// Compact "Name (type)" listing of known entities for the extraction prompt.
pub fn known_entities_summary(entities: &[Entity]) -> String {
    entities
        .iter()
        .map(|e| format!("- {} ({})", e.name, e.entity_type))
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt for history summarization calls.
pub fn summarization_system_prompt() -> &'static str {
    "You summarize role-play conversation history. Preserve named characters, \
     places, decisions, and unresolved threads. Write a single compact \
     paragraph in the third person. Return only the summary text."
}

/// User prompt for summarizing a span of conversation messages.
pub fn summarization_user_prompt(span: &str) -> String {
    format!("Summarize this conversation span:\n\n{}", span)
}

/// System prompt for the duplicate-detection curation phase.
pub fn dedup_system_prompt() -> &'static str {
    r#"You detect duplicate entities in a story knowledge graph. Entities are duplicates when they clearly refer to the same thing under different names.

Output JSON in this exact format:
{
  "groups": [
    {"canonical": "best entity name", "duplicates": ["other name for the same thing"]}
  ]
}

Only group entities you are confident refer to the same thing. If there are no duplicates, return an empty array. Return ONLY valid JSON."#
}

/// User prompt listing one type group for duplicate detection.
pub fn dedup_user_prompt(entity_type: EntityType, entities: &[Entity]) -> String {
    let listing = entities
        .iter()
        .map(|e| {
            let aliases = if e.aliases.is_empty() {
                String::new()
            } else {
                format!(" (aliases: {})", e.aliases.join(", "))
            };
            format!("- {}{}: {}", e.name, aliases, e.description)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Find duplicates among these {} entities:\n\n{}",
        entity_type, listing
    )
}

/// System prompt for the irrelevance-detection curation phase.
pub fn irrelevance_system_prompt() -> &'static str {
    r#"You curate a story knowledge graph. Identify entities that are narratively stale: one-off mentions with no lasting relevance to the story.

Output JSON in this exact format:
{
  "irrelevant": ["entity name"]
}

Be conservative: when in doubt, keep the entity. Return ONLY valid JSON."#
}

/// User prompt listing one type group for irrelevance detection.
pub fn irrelevance_user_prompt(entity_type: EntityType, entities: &[Entity]) -> String {
    let listing = entities
        .iter()
        .map(|e| format!("- {} (importance {}): {}", e.name, e.importance, e.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Identify narratively irrelevant {} entities:\n\n{}",
        entity_type, listing
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_lists_closed_enums() {
        let prompt = extraction_system_prompt();
        assert!(prompt.contains("character"));
        assert!(prompt.contains("faction"));
        assert!(prompt.contains("enemy"));
        assert!(prompt.contains("mentorship"));
        assert!(prompt.contains("isNew"));
    }

    #[test]
    fn test_user_prompt_sections() {
        let prompt = extraction_user_prompt("Klaus odeia Anna.", "- Klaus (character)", "");
        assert!(prompt.contains("KNOWN ENTITIES"));
        assert!(!prompt.contains("STORY CONTEXT"));
        assert!(prompt.contains("Klaus odeia Anna."));

        let bare = extraction_user_prompt("text", "", "");
        assert!(!bare.contains("KNOWN ENTITIES"));
    }

    #[test]
    fn test_known_entities_summary() {
        use crate::types::Entity;
        let entities = vec![
            Entity::new("s", EntityType::Character, "Klaus", ""),
            Entity::new("s", EntityType::Location, "Ravenport", ""),
        ];
        let summary = known_entities_summary(&entities);
        assert_eq!(summary, "- Klaus (character)\n- Ravenport (location)");
    }
}
