//! Context assembly.
//!
//! A context block is the ordered concatenation of per-source retrieval
//! results. Section order is registry order, never completion order, so the
//! same retrievals always render the same text.

use serde::Serialize;

/// Placeholder rendered for an included source that returned nothing.
pub const NO_RESULTS: &str = "(no results)";

/// One retrieved snippet tagged with the source it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub source_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// All chunks one included source contributed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSection {
    pub source_id: String,
    pub chunks: Vec<RetrievedChunk>,
}

impl ContextSection {
    pub fn new(source_id: impl Into<String>, chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            source_id: source_id.into(),
            chunks,
        }
    }
}

/// Ordered context for one question. An empty block is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextBlock {
    sections: Vec<ContextSection>,
}

impl ContextBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next section. Callers push in registry order.
    pub fn push(&mut self, section: ContextSection) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[ContextSection] {
        &self.sections
    }

    /// Ids of the sources that contributed a section.
    pub fn source_ids(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.source_id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.sections.iter().map(|s| s.chunks.len()).sum()
    }

    /// Render the block as prompt text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str("### Source: ");
            out.push_str(&section.source_id);
            out.push('\n');

            if section.chunks.is_empty() {
                out.push_str(NO_RESULTS);
                out.push('\n');
                continue;
            }

            for chunk in &section.chunks {
                out.push_str("- ");
                out.push_str(chunk.text.trim());
                out.push('\n');
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            source_id: source.to_string(),
            text: text.to_string(),
            score: None,
        }
    }

    fn sample() -> ContextBlock {
        let mut block = ContextBlock::new();
        block.push(ContextSection::new("docs", vec![chunk("docs", "Roof spec v2")]));
        block.push(ContextSection::new("tasks", Vec::new()));
        block.push(ContextSection::new(
            "messages",
            vec![chunk("messages", "Call the roofer"), chunk("messages", "Quote received")],
        ));
        block
    }

    #[test]
    fn test_render_sections_in_push_order() {
        let rendered = sample().render();
        let docs = rendered.find("### Source: docs").unwrap();
        let tasks = rendered.find("### Source: tasks").unwrap();
        let messages = rendered.find("### Source: messages").unwrap();
        assert!(docs < tasks && tasks < messages);
        assert!(rendered.contains("- Roof spec v2\n"));
    }

    #[test]
    fn test_render_marks_empty_section() {
        let rendered = sample().render();
        assert!(rendered.contains("### Source: tasks\n(no results)\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(sample().render(), sample().render());
    }

    #[test]
    fn test_empty_block() {
        let block = ContextBlock::new();
        assert!(block.is_empty());
        assert_eq!(block.render(), "");
        assert_eq!(block.chunk_count(), 0);
    }

    #[test]
    fn test_source_ids_and_counts() {
        let block = sample();
        assert_eq!(block.source_ids(), vec!["docs", "tasks", "messages"]);
        assert_eq!(block.chunk_count(), 3);
    }
}
