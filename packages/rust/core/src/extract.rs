//! Locate a JSON object candidate inside free-form model output.
//!
//! Models are inconsistent about fencing, so the search is a cascade that
//! prefers explicit signals and falls back to weaker ones:
//! 1. a fenced block labelled `json`
//! 2. an unlabelled fenced block
//! 3. the outermost `{ ... }` span anywhere in the text
//!
//! Fences are matched as opening/closing line pairs. A closing fence is a
//! line holding only the backticks, so backticks inside a JSON string do not
//! end the block, and a labelled block such as ```` ```python ```` is skipped
//! whole. An unclosed fence is not a block.
//!
//! No match yields an empty string, meaning "no structured payload".

use std::sync::LazyLock;

use regex::Regex;

/// A line that is only a fence, with an optional language label.
static FENCE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*```[ \t]*([^`\s]*)[ \t]*\r?\n?$").expect("fence line regex")
});

/// First `{` through last `}`.
static BRACE_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("brace span regex"));

/// A closed fenced block. `body` is trimmed and borrows from the source text.
#[derive(Debug, Clone, Copy)]
struct FencedBlock<'a> {
    label: &'a str,
    body: &'a str,
}

/// Pair fence lines into blocks, in order of appearance.
fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    // (label, byte offset where the body starts)
    let mut open: Option<(&str, usize)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let Some(caps) = FENCE_LINE_RE.captures(line) else {
            continue;
        };
        let label = caps.get(1).map_or("", |m| m.as_str());

        match open {
            None => open = Some((label, offset)),
            Some((open_label, body_start)) if label.is_empty() => {
                blocks.push(FencedBlock {
                    label: open_label,
                    body: text[body_start..line_start].trim(),
                });
                open = None;
            }
            // A labelled fence line inside an open block is body text.
            Some(_) => {}
        }
    }

    blocks
}

/// Return the substring of `text` most likely to be a JSON object, or `""`.
///
/// The result borrows from `text` and is trimmed of surrounding whitespace.
/// A fence with an empty interior does not count as a match.
pub fn extract_json_candidate(text: &str) -> &str {
    let blocks = fenced_blocks(text);

    let labelled_json = blocks
        .iter()
        .find(|b| b.label.eq_ignore_ascii_case("json") && !b.body.is_empty());
    let unlabelled = || {
        blocks
            .iter()
            .find(|b| b.label.is_empty() && !b.body.is_empty())
    };

    if let Some(block) = labelled_json.or_else(unlabelled) {
        return block.body;
    }

    BRACE_SPAN_RE
        .find(text)
        .map(|m| m.as_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fence_returns_interior() {
        let text = "Here you go:\n```json\n{\"answer\": \"Notion\", \"sources\": []}\n```\nThanks!";
        assert_eq!(
            extract_json_candidate(text),
            r#"{"answer": "Notion", "sources": []}"#
        );
    }

    #[test]
    fn json_fence_label_is_case_insensitive() {
        let text = "```JSON\n{\"a\": 1}\n```";
        assert_eq!(extract_json_candidate(text), r#"{"a": 1}"#);
    }

    #[test]
    fn json_fence_wins_over_earlier_bare_fence() {
        let text = "```\nnot it\n```\n\n```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_candidate(text), r#"{"a": 1}"#);
    }

    #[test]
    fn bare_fence_returns_interior() {
        let text = "Result:\n```\n{\n  \"answer\": \"Evernote\"\n}\n```";
        assert_eq!(extract_json_candidate(text), "{\n  \"answer\": \"Evernote\"\n}");
    }

    #[test]
    fn other_language_fence_falls_through_to_braces() {
        let text = "```python\nprint('hi')\n```\nand {\"answer\": \"x\"}";
        assert_eq!(extract_json_candidate(text), r#"{"answer": "x"}"#);
    }

    #[test]
    fn brace_span_is_greedy_across_lines() {
        let text = "prefix {\"a\": {\"b\": 1}\n} middle } suffix";
        assert_eq!(extract_json_candidate(text), "{\"a\": {\"b\": 1}\n} middle }");
    }

    #[test]
    fn empty_fence_falls_through() {
        let text = "```json\n```\n{\"a\": 2}";
        assert_eq!(extract_json_candidate(text), r#"{"a": 2}"#);
    }

    #[test]
    fn no_fence_no_braces_is_empty() {
        assert_eq!(extract_json_candidate("Just try Notion or Glasp."), "");
        assert_eq!(extract_json_candidate(""), "");
    }

    #[test]
    fn backticks_inside_json_string_do_not_close_fence() {
        let text = "```json\n{\"answer\": \"Notion: wrap code in ```rust``` blocks\", \"sources\": [\"https://notion.so\"]}\n```";
        assert_eq!(
            extract_json_candidate(text),
            r#"{"answer": "Notion: wrap code in ```rust``` blocks", "sources": ["https://notion.so"]}"#
        );
    }

    #[test]
    fn labelled_blocks_are_skipped_whole() {
        let text = "```python\nprint()\n```\nthen\n```bash\nls\n```\n{\"answer\": \"Notion\"}";
        assert_eq!(extract_json_candidate(text), r#"{"answer": "Notion"}"#);
    }

    #[test]
    fn unlabelled_block_after_labelled_block_is_used() {
        let text = "```bash\nls\n```\n```\n{\"a\": 3}\n```";
        assert_eq!(extract_json_candidate(text), r#"{"a": 3}"#);
    }

    #[test]
    fn unclosed_fence_falls_through_to_braces() {
        let text = "```json\n{\"a\": 4}";
        assert_eq!(extract_json_candidate(text), r#"{"a": 4}"#);
    }

    #[test]
    fn crlf_fences_are_recognised() {
        let text = "```json\r\n{\"a\": 5}\r\n```\r\n";
        assert_eq!(extract_json_candidate(text), r#"{"a": 5}"#);
    }
}
