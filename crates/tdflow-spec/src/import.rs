use crate::{MergeOutcome, PipelineSpec, merge_specs, spec_from_json};
use regex::Regex;
use serde_json::Value;

const FENCE_PATTERN: &str = r"(?i)```(?:yaml|yml)?\s*([\s\S]*?)```";
const DASH_PATTERN: &str = r"---\s*\n([\s\S]*?)\n(?:---|\z)";

/// Finds the first block of `text` that reads as a pipeline document.
///
/// Candidates are tried in order: fenced ```` ```yaml ```` blocks, `---`
/// delimited blocks, then the whole text. A candidate qualifies when it parses
/// to a mapping with a `nodes` key.
pub fn extract_spec_block(text: &str) -> Option<PipelineSpec> {
    let mut candidates: Vec<&str> = Vec::new();
    for pattern in [FENCE_PATTERN, DASH_PATTERN] {
        let Ok(regex) = Regex::new(pattern) else {
            continue;
        };
        candidates.extend(
            regex
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|block| block.as_str()),
        );
    }
    candidates.push(text);

    candidates.into_iter().find_map(spec_from_candidate)
}

fn spec_from_candidate(block: &str) -> Option<PipelineSpec> {
    let document: Value = serde_yaml::from_str(block).ok()?;
    if !document.as_object()?.contains_key("nodes") {
        return None;
    }
    spec_from_json(&document).ok()
}

/// Extracts a pipeline from pasted or generated text and merges it into
/// `current`. `None` when the text holds no pipeline document.
pub fn import_text(current: &PipelineSpec, text: &str) -> Option<MergeOutcome> {
    let incoming = extract_spec_block(text)?;
    Some(merge_specs(current, &incoming))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeEntry;

    #[test]
    fn extract_spec_block_fenced_expected_spec() {
        let text = "Here you go:\n```yaml\nnodes:\n  a:\n    function: read_csv\n```\nEnjoy.";
        let spec = extract_spec_block(text).expect("fenced block should be found");
        assert!(spec.contains("a"));
    }

    #[test]
    fn extract_spec_block_skips_fences_without_nodes() {
        let text = "```yaml\nfoo: 1\n```\n```YML\nnodes:\n  b: {function: concat}\n```";
        let spec = extract_spec_block(text).expect("second fence qualifies");
        assert_eq!(spec.node_ids().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn extract_spec_block_dash_delimited_expected_spec() {
        let text = "intro text\n---\nnodes:\n  c:\n    function: DataFrame.head\n---\ntrailer";
        let spec = extract_spec_block(text).expect("dash block should be found");
        assert!(spec.contains("c"));
    }

    #[test]
    fn extract_spec_block_raw_body_expected_spec() {
        let spec = extract_spec_block("nodes:\n  d: {function: merge}\n").expect("raw body");
        assert!(spec.contains("d"));
    }

    #[test]
    fn extract_spec_block_no_document_expected_none() {
        assert!(extract_spec_block("just some prose about data frames").is_none());
        assert!(extract_spec_block("other: {}").is_none());
    }

    #[test]
    fn import_text_collision_expected_renamed() {
        let current = PipelineSpec::new().with_node("a", NodeEntry::new("read_csv"));
        let outcome = import_text(&current, "nodes:\n  a: {function: read_json}\n")
            .expect("import should succeed");
        assert_eq!(outcome.added, vec!["a_1"]);
        assert_eq!(outcome.spec.len(), 2);
    }
}
