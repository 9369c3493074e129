// src/inject.rs
// Memento block rendering and request-body injection. Pure functions - the
// input body is never mutated.

use serde_json::{Value, json};

use crate::graph::RetrievalResult;

/// Render retrieved memories as a memento block:
///
/// ```text
/// <memento>
///   <memory id="..." created_at="...">content</memory>
/// </memento>
/// ```
///
/// followed by two trailing newlines. An empty result renders as an empty
/// string.
pub fn render_memento(result: &RetrievalResult) -> String {
    if result.memories.is_empty() {
        return String::new();
    }

    let mut out = String::from("<memento>\n");
    for sm in &result.memories {
        let created = sm.memory.created_at.format("%Y-%m-%dT%H:%M:%S%.3fZ");
        out.push_str(&format!(
            "  <memory id=\"{}\" created_at=\"{}\">{}</memory>\n",
            sm.memory.id,
            created,
            escape_xml(&sm.memory.content)
        ));
    }
    out.push_str("</memento>\n\n");
    out
}

/// Prepend a memento block to the last `user` message of a chat request
/// body. String content is prefixed in place; block-array content gains a
/// text block at index 0. With no user message or no memento content the
/// body comes back structurally unchanged. Always returns a new body.
pub fn inject(body: &Value, memento: &str) -> Value {
    let mut new_body = body.clone();
    if memento.is_empty() {
        return new_body;
    }

    let Some(messages) = new_body.get_mut("messages").and_then(|m| m.as_array_mut()) else {
        return new_body;
    };
    let Some(idx) = messages
        .iter()
        .rposition(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))
    else {
        return new_body;
    };

    match messages[idx].get_mut("content") {
        Some(Value::String(content)) => {
            *content = format!("{memento}{content}");
        }
        Some(Value::Array(blocks)) => {
            blocks.insert(0, json!({"type": "text", "text": memento}));
        }
        _ => {}
    }
    new_body
}

/// Generate-style variant for bodies carrying a single `prompt` string
/// instead of a messages array.
pub fn inject_prompt(body: &Value, memento: &str) -> Value {
    let mut new_body = body.clone();
    if memento.is_empty() {
        return new_body;
    }
    if let Some(Value::String(prompt)) = new_body.get_mut("prompt") {
        *prompt = format!("{memento}{prompt}");
    }
    new_body
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Memory, ScoreSource, ScoredMemory};
    use crate::utils::generate_id;
    use chrono::Utc;
    use std::collections::HashSet;

    fn result_with(contents: &[&str]) -> RetrievalResult {
        RetrievalResult {
            memories: contents
                .iter()
                .map(|c| ScoredMemory {
                    memory: Memory {
                        id: generate_id(),
                        content: c.to_string(),
                        embedding: vec![1.0],
                        created_at: Utc::now(),
                        valid_at: None,
                        invalid_at: None,
                        about: HashSet::new(),
                    },
                    score: 1.0,
                    source: ScoreSource::Fused,
                    about_names: vec![],
                })
                .collect(),
            sources_used: vec![ScoreSource::Vector],
        }
    }

    #[test]
    fn test_render_empty_result() {
        assert_eq!(render_memento(&RetrievalResult::default()), "");
    }

    #[test]
    fn test_render_shape() {
        let rendered = render_memento(&result_with(&["likes Rust"]));
        assert!(rendered.starts_with("<memento>\n"));
        assert!(rendered.ends_with("</memento>\n\n"));
        assert!(rendered.contains("likes Rust"));
        assert!(rendered.contains("created_at="));
    }

    #[test]
    fn test_render_escapes_content() {
        let rendered = render_memento(&result_with(&["a < b && c > d"]));
        assert!(rendered.contains("a &lt; b &amp;&amp; c &gt; d"));
    }

    #[test]
    fn test_inject_prepends_to_string_content() {
        let body = json!({"messages": [{"role": "user", "content": "Hello"}]});
        let injected = inject(&body, "<memento>X</memento>\n\n");
        assert_eq!(
            injected["messages"][0]["content"],
            "<memento>X</memento>\n\nHello"
        );
    }

    #[test]
    fn test_inject_targets_last_user_message() {
        let body = json!({"messages": [
            {"role": "user", "content": "first"},
            {"role": "assistant", "content": "reply"},
            {"role": "user", "content": "second"},
        ]});
        let injected = inject(&body, "M\n\n");
        assert_eq!(injected["messages"][0]["content"], "first");
        assert_eq!(injected["messages"][2]["content"], "M\n\nsecond");
    }

    #[test]
    fn test_inject_block_array_content() {
        let body = json!({"messages": [{
            "role": "user",
            "content": [{"type": "text", "text": "Hello"}],
        }]});
        let injected = inject(&body, "M\n\n");
        let blocks = injected["messages"][0]["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["type"], "text");
        assert_eq!(blocks[0]["text"], "M\n\n");
        assert_eq!(blocks[1]["text"], "Hello");
    }

    #[test]
    fn test_inject_no_user_message_is_noop() {
        let body = json!({"messages": [{"role": "system", "content": "rules"}]});
        assert_eq!(inject(&body, "M\n\n"), body);
    }

    #[test]
    fn test_inject_empty_memento_is_noop() {
        let body = json!({"messages": [{"role": "user", "content": "Hello"}]});
        assert_eq!(inject(&body, ""), body);
    }

    #[test]
    fn test_inject_preserves_other_fields_and_input() {
        let body = json!({
            "model": "gpt-4o",
            "stream": true,
            "messages": [{"role": "user", "content": "Hello"}],
        });
        let injected = inject(&body, "M\n\n");
        assert_eq!(injected["model"], "gpt-4o");
        assert_eq!(injected["stream"], true);
        // Original body untouched
        assert_eq!(body["messages"][0]["content"], "Hello");
    }

    #[test]
    fn test_inject_prompt_body() {
        let body = json!({"model": "llama3", "prompt": "Hello"});
        let injected = inject_prompt(&body, "M\n\n");
        assert_eq!(injected["prompt"], "M\n\nHello");
        assert_eq!(inject_prompt(&body, ""), body);
    }
}
