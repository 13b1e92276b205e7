//! Streaming tool-call extractor.
//!
//! A stateful incremental parser that turns arbitrary-sized text fragments
//! into (plain text, tool call) output. Two states: `Outside` a tool block,
//! accumulating into the outer buffer, and `Inside` one, accumulating into
//! the block buffer. Both delimiters may be split across fragment
//! boundaries, so while `Outside` the trailing `OPEN_TAG.len() - 1` bytes
//! are withheld until the next fragment resolves them.
//!
//! The extractor has no opinion on display policy; suppressing visible text
//! after a tool call has been detected is the orchestrator's job.

use riptide_core::tool::ToolCall;
use serde_json::json;
use tracing::warn;

/// Opening delimiter of a tool block.
pub const OPEN_TAG: &str = "<tool_call>";

/// Closing delimiter of a tool block.
pub const CLOSE_TAG: &str = "</tool_call>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Outside,
    Inside,
}

/// Output of one [`ToolCallExtractor::push`] call: the plain text resolved
/// outside any tool block during that call, and the tool calls newly
/// completed during that call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// The incremental parser.
pub struct ToolCallExtractor {
    state: ParserState,
    /// Undecided text outside any tool block.
    outer: String,
    /// Accumulated tool-block content (never emitted as visible text).
    block: String,
}

impl ToolCallExtractor {
    pub fn new() -> Self {
        Self {
            state: ParserState::Outside,
            outer: String::new(),
            block: String::new(),
        }
    }

    /// Feed one streamed fragment; returns the text and tool calls that
    /// this fragment resolved. A single fragment may close one block and
    /// open another, so the scan loops until neither buffer can advance.
    pub fn push(&mut self, fragment: &str) -> Extracted {
        match self.state {
            ParserState::Outside => self.outer.push_str(fragment),
            ParserState::Inside => self.block.push_str(fragment),
        }

        let mut out = Extracted::default();
        loop {
            match self.state {
                ParserState::Outside => {
                    if let Some(idx) = self.outer.find(OPEN_TAG) {
                        out.text.push_str(&self.outer[..idx]);
                        self.block = self.outer[idx + OPEN_TAG.len()..].to_string();
                        self.outer.clear();
                        self.state = ParserState::Inside;
                    } else {
                        // No opening delimiter: emit everything except the
                        // trailing bytes that could be the start of one,
                        // split across fragment boundaries. Backing off to a
                        // char boundary only ever withholds more, never less.
                        let keep_from = self.outer.len().saturating_sub(OPEN_TAG.len() - 1);
                        let split = floor_char_boundary(&self.outer, keep_from);
                        out.text.push_str(&self.outer[..split]);
                        self.outer.drain(..split);
                        break;
                    }
                }
                ParserState::Inside => {
                    if let Some(idx) = self.block.find(CLOSE_TAG) {
                        let body = self.block[..idx].to_string();
                        // Everything after the closing delimiter goes back
                        // into the outer buffer for the next pass.
                        self.outer = self.block[idx + CLOSE_TAG.len()..].to_string();
                        self.block.clear();
                        self.state = ParserState::Outside;
                        if let Some(call) = parse_block(&body) {
                            out.tool_calls.push(call);
                        }
                    } else {
                        break;
                    }
                }
            }
        }
        out
    }

    /// Drain any buffered plain text at stream end. An unterminated tool
    /// block is discarded.
    pub fn flush(&mut self) -> String {
        self.block.clear();
        self.state = ParserState::Outside;
        std::mem::take(&mut self.outer)
    }
}

impl Default for ToolCallExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest index `<= idx` that is a char boundary of `s`.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Parse the body of a completed tool block.
///
/// Expects a `name:` line and a `parameters:` marker followed by JSON
/// (which may span lines). Malformed JSON degrades to `{"raw": <text>}` so
/// one bad call never corrupts extraction of the next. A block without a
/// name is dropped.
fn parse_block(body: &str) -> Option<ToolCall> {
    let name = body
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("name:"))
        .map(|rest| rest.trim().to_string())
        .filter(|n| !n.is_empty());

    let Some(name) = name else {
        warn!(body_len = body.len(), "Dropping tool block without a name");
        return None;
    };

    let parameters = match body.find("parameters:") {
        Some(pos) => {
            let raw = body[pos + "parameters:".len()..].trim();
            serde_json::from_str(raw).unwrap_or_else(|_| json!({ "raw": raw }))
        }
        None => json!({}),
    };

    Some(ToolCall::new(name, parameters))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_CALL: &str = "Let me check.\n<tool_call>\nname: product_search\nparameters: {\"query\": \"boots\"}\n</tool_call>";

    /// Feed `input` in chunks of `size` bytes (respecting char boundaries)
    /// and collect everything emitted.
    fn feed_chunked(input: &str, size: usize) -> Extracted {
        let mut ex = ToolCallExtractor::new();
        let mut combined = Extracted::default();
        let mut rest = input;
        while !rest.is_empty() {
            let mut split = size.min(rest.len());
            while !rest.is_char_boundary(split) {
                split += 1;
            }
            let (chunk, tail) = rest.split_at(split);
            let got = ex.push(chunk);
            combined.text.push_str(&got.text);
            combined.tool_calls.extend(got.tool_calls);
            rest = tail;
        }
        combined.text.push_str(&ex.flush());
        combined
    }

    #[test]
    fn plain_text_passes_through() {
        let got = feed_chunked("Hello there, how can I help?", 7);
        assert_eq!(got.text, "Hello there, how can I help?");
        assert!(got.tool_calls.is_empty());
    }

    #[test]
    fn parses_single_tool_call() {
        let got = feed_chunked(SINGLE_CALL, SINGLE_CALL.len());
        assert_eq!(got.text, "Let me check.\n");
        assert_eq!(got.tool_calls.len(), 1);
        assert_eq!(got.tool_calls[0].name, "product_search");
        assert_eq!(got.tool_calls[0].parameters["query"], "boots");
    }

    #[test]
    fn split_invariance_across_all_fragmentations() {
        let fixture = format!(
            "Intro text. {SINGLE_CALL}\nAnd then <tool_call>\nname: generate_page\nparameters: {{\"layout\": \"grid\"}}\n</tool_call> trailing."
        );
        let whole = feed_chunked(&fixture, fixture.len());
        assert_eq!(whole.tool_calls.len(), 2);

        for size in 1..=fixture.len() {
            let chunked = feed_chunked(&fixture, size);
            assert_eq!(chunked, whole, "diverged at chunk size {size}");
        }
    }

    #[test]
    fn fragmented_open_tag_is_not_emitted() {
        let mut ex = ToolCallExtractor::new();
        let first = ex.push("text before <tool_");
        // The partial tag must be withheld, not shown.
        assert!(!first.text.contains('<'));
        let second = ex.push("call>\nname: t\nparameters: {}\n</tool_call>");
        assert_eq!(second.tool_calls.len(), 1);
        assert_eq!(format!("{}{}", first.text, second.text), "text before ");
    }

    #[test]
    fn fragmented_close_tag_resolves() {
        let mut ex = ToolCallExtractor::new();
        ex.push("<tool_call>\nname: t\nparameters: {}\n</tool_");
        let got = ex.push("call>done");
        assert_eq!(got.tool_calls.len(), 1);
        // Text after the closing tag re-enters the outer buffer; some of it
        // may be withheld pending a possible open tag.
        assert_eq!(format!("{}{}", got.text, ex.flush()), "done");
    }

    #[test]
    fn two_blocks_in_one_fragment() {
        let input = "<tool_call>\nname: a\nparameters: {}\n</tool_call><tool_call>\nname: b\nparameters: {}\n</tool_call>";
        let got = feed_chunked(input, input.len());
        assert_eq!(got.tool_calls.len(), 2);
        assert_eq!(got.tool_calls[0].name, "a");
        assert_eq!(got.tool_calls[1].name, "b");
        assert!(got.text.is_empty());
    }

    #[test]
    fn malformed_json_degrades_to_raw() {
        let input =
            "<tool_call>\nname: broken\nparameters: {not json at all\n</tool_call><tool_call>\nname: fine\nparameters: {\"k\": 1}\n</tool_call>";
        let got = feed_chunked(input, 5);
        assert_eq!(got.tool_calls.len(), 2);
        assert_eq!(
            got.tool_calls[0].parameters["raw"],
            "{not json at all"
        );
        assert_eq!(got.tool_calls[1].parameters["k"], 1);
    }

    #[test]
    fn multiline_parameters_json() {
        let input = "<tool_call>\nname: generate_page\nparameters: {\n  \"layout\": \"grid\",\n  \"title\": \"Sale\"\n}\n</tool_call>";
        let got = feed_chunked(input, 9);
        assert_eq!(got.tool_calls.len(), 1);
        assert_eq!(got.tool_calls[0].parameters["title"], "Sale");
    }

    #[test]
    fn block_without_name_is_dropped() {
        let input = "<tool_call>\nparameters: {}\n</tool_call>ok<tool_call>\nname: real\nparameters: {}\n</tool_call>";
        let got = feed_chunked(input, input.len());
        assert_eq!(got.tool_calls.len(), 1);
        assert_eq!(got.tool_calls[0].name, "real");
        assert_eq!(got.text, "ok");
    }

    #[test]
    fn missing_parameters_defaults_to_empty_object() {
        let input = "<tool_call>\nname: bare\n</tool_call>";
        let got = feed_chunked(input, input.len());
        assert_eq!(got.tool_calls.len(), 1);
        assert_eq!(got.tool_calls[0].parameters, serde_json::json!({}));
    }

    #[test]
    fn unterminated_block_discarded_on_flush() {
        let mut ex = ToolCallExtractor::new();
        let got = ex.push("visible <tool_call>\nname: never\nparameters: {}");
        assert_eq!(got.text, "visible ");
        assert!(got.tool_calls.is_empty());
        assert_eq!(ex.flush(), "");
    }

    #[test]
    fn flush_drains_withheld_text() {
        let mut ex = ToolCallExtractor::new();
        let got = ex.push("short");
        // Too short to rule out a split open tag; all withheld.
        assert_eq!(got.text, "");
        assert_eq!(ex.flush(), "short");
    }

    #[test]
    fn multibyte_text_survives_withholding() {
        let input = "héllo wörld — ครับ ✓";
        for size in 1..=8 {
            let got = feed_chunked(input, size);
            assert_eq!(got.text, input, "diverged at chunk size {size}");
        }
    }
}
