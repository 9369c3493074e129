// src/consolidate/prompts.rs
// Prompt text and output schemas for the consolidation stages

use serde_json::{Value, json};

use crate::graph::{Entity, ScoredMemory};

/// Entity types the extraction stage accepts; anything else is dropped.
pub const ENTITY_TYPES: &[&str] = &[
    "person",
    "organization",
    "project",
    "technology",
    "concept",
    "place",
    "event",
];

pub fn extraction_prompt(note: &str) -> String {
    format!(
        r#"Extract entities and memories from this note.

Note: "{note}"

Rules:
1. entities: recurring subjects worth tracking. Allowed types: {types}.
   - name: the subject as written (casing preserved for brands like "iPhone")
   - description: one short sentence, only if the note says something about it
   - isWellKnown: true for widely-known subjects (languages, companies, products)
2. memories: self-contained facts from the note, one per distinct fact.
   - content: a standalone sentence a future reader understands without the note
   - aboutEntities: names of the entities the fact concerns
   - validAt: ISO-8601 date/time only when the note states when the fact became true
3. userBiographicalFacts: facts about the user themself (role, location,
   preferences about who they are), omitted when none.

Do not invent facts that are not in the note."#,
        note = note,
        types = ENTITY_TYPES.join(", "),
    )
}

pub fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "required": ["entities", "memories"],
        "properties": {
            "entities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "type"],
                    "properties": {
                        "name": {"type": "string"},
                        "type": {"type": "string"},
                        "description": {"type": "string"},
                        "isWellKnown": {"type": "boolean"},
                    },
                },
            },
            "memories": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["content", "aboutEntities"],
                    "properties": {
                        "content": {"type": "string"},
                        "aboutEntities": {"type": "array", "items": {"type": "string"}},
                        "validAt": {"type": "string"},
                    },
                },
            },
            "userBiographicalFacts": {"type": "array", "items": {"type": "string"}},
        },
    })
}

pub fn entity_resolution_prompt(name: &str, entity_type: &str, candidates: &[Entity]) -> String {
    let listing = candidates
        .iter()
        .map(|c| {
            format!(
                "- id: {}, name: {}, type: {}, linked memories: {}",
                c.id, c.name, c.entity_type, c.degree
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Decide whether an extracted entity refers to one already in the graph.

Extracted entity: name "{name}", type "{entity_type}"

Existing candidates:
{listing}

Return MATCH with the candidate's id only when they are the same real-world
subject (renames and alternate spellings count). Otherwise return CREATE.
Give a one-sentence reason."#,
    )
}

pub fn entity_resolution_schema() -> Value {
    json!({
        "type": "object",
        "required": ["action", "reason"],
        "properties": {
            "action": {"type": "string", "enum": ["CREATE", "MATCH"]},
            "matchedEntityId": {"type": "string"},
            "reason": {"type": "string"},
        },
    })
}

pub fn memory_resolution_prompt(content: &str, context: &[ScoredMemory]) -> String {
    let listing = context
        .iter()
        .map(|sm| format!("- id: {}, content: {}", sm.memory.id, sm.memory.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Decide how a new fact relates to what the graph already knows.

New fact: "{content}"

Existing memories:
{listing}

Actions:
- ADD: the fact is new information
- UPDATE with targetId: the fact supersedes or corrects an existing memory
- SKIP: the fact is already recorded with the same meaning

Give a one-sentence reason."#,
    )
}

pub fn memory_resolution_schema() -> Value {
    json!({
        "type": "object",
        "required": ["action", "reason"],
        "properties": {
            "action": {"type": "string", "enum": ["ADD", "UPDATE", "SKIP"]},
            "targetId": {"type": "string"},
            "reason": {"type": "string"},
        },
    })
}

pub fn user_description_prompt(facts: &[String], current: Option<&str>) -> String {
    let current = current.unwrap_or("(none)");
    let listing = facts
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"The user shared biographical facts. Decide whether the stored
description of the user should change.

Current description: {current}

New facts:
{listing}

If the facts add or change anything, return shouldUpdate=true with a full
replacement description (2-3 sentences, third person). Otherwise return
shouldUpdate=false."#,
    )
}

pub fn user_description_schema() -> Value {
    json!({
        "type": "object",
        "required": ["shouldUpdate"],
        "properties": {
            "shouldUpdate": {"type": "boolean"},
            "description": {"type": "string"},
        },
    })
}
