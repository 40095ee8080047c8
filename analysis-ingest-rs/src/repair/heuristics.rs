//! Heuristic repair passes
//!
//! Each pass is a standalone `&str -> String` transformation. [`repair`] runs
//! them in the fixed order of [`PASSES`] until the text stops changing;
//! [`repair_traced`] returns every intermediate result of one round so the
//! behaviour of a single pass can be asserted.
//!
//! All structural passes work on a small tokenizer that understands string
//! literals and escapes, so punctuation inside a quoted value (including an
//! escaped quote) never affects separator insertion or depth tracking.

use once_cell::sync::Lazy;
use regex::Regex;

/// A named repair pass.
pub type Pass = fn(&str) -> String;

/// The heuristic pipeline, in execution order.
pub const PASSES: &[(&str, Pass)] = &[
    ("strip_fence_markers", strip_fence_markers),
    ("strip_leading_prose", strip_leading_prose),
    ("strip_control_chars", strip_control_chars),
    ("close_truncated_string", close_truncated_string),
    ("quote_bare_values", quote_bare_values),
    ("insert_missing_colons", insert_missing_colons),
    ("canonicalize_keys", canonicalize_keys),
    ("insert_missing_commas", insert_missing_commas),
    ("drop_trailing_separators", drop_trailing_separators),
    ("close_open_structures", close_open_structures),
];

/// Known truncated or garbled key names and their canonical spelling.
pub const KEY_CORRECTIONS: &[(&str, &str)] = &[
    ("ummary", "summary"),
    ("summry", "summary"),
    ("ttacksAnalysis", "attacksAnalysis"),
    ("attackAnalysis", "attacksAnalysis"),
    ("attacks_analysis", "attacksAnalysis"),
    ("ttackName", "attackName"),
    ("attack_name", "attackName"),
    ("ool", "tool"),
    ("tatus", "status"),
    ("nalysis", "analysis"),
    ("ecommendation", "recommendation"),
    ("verallAssessment", "overallAssessment"),
    ("overall_assessment", "overallAssessment"),
    ("ecurityImplications", "securityImplications"),
    ("security_implications", "securityImplications"),
    ("extSteps", "nextSteps"),
    ("next_steps", "nextSteps"),
    ("xternalMonitoringSummary", "externalMonitoringSummary"),
    ("external_monitoring_summary", "externalMonitoringSummary"),
];

static FENCE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("fence pattern is valid"));

static JSON_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$").expect("number pattern is valid")
});

/// Upper bound on pipeline rounds. A dropped closer or an inserted separator
/// can change what the next round sees.
const MAX_ROUNDS: usize = 4;

fn repair_round(input: &str) -> String {
    PASSES
        .iter()
        .fold(input.to_string(), |text, (_, pass)| pass(&text))
}

/// Run the full heuristic pipeline until its output is stable.
pub fn repair(input: &str) -> String {
    let mut current = repair_round(input);
    for _ in 1..MAX_ROUNDS {
        let next = repair_round(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Run one round of the pipeline, returning the output of every pass in order.
pub fn repair_traced(input: &str) -> Vec<(&'static str, String)> {
    let mut current = input.to_string();
    let mut trace = Vec::with_capacity(PASSES.len());
    for (name, pass) in PASSES {
        current = pass(&current);
        trace.push((*name, current.clone()));
    }
    trace
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Colon,
    Comma,
    /// A string literal including its quotes; may be unterminated at end of input
    Str,
    /// An unquoted run such as `true`, `42` or `partial success`
    Bare,
    Space,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
}

impl Token<'_> {
    fn is_opener(&self) -> bool {
        matches!(self.kind, TokenKind::OpenBrace | TokenKind::OpenBracket)
    }
}

fn is_structural(c: char) -> bool {
    matches!(c, '{' | '}' | '[' | ']' | ':' | ',' | '"')
}

/// Split `input` into tokens whose concatenation is exactly `input`.
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while let Some(first) = rest.chars().next() {
        let (kind, len) = match first {
            '{' => (TokenKind::OpenBrace, 1),
            '}' => (TokenKind::CloseBrace, 1),
            '[' => (TokenKind::OpenBracket, 1),
            ']' => (TokenKind::CloseBracket, 1),
            ':' => (TokenKind::Colon, 1),
            ',' => (TokenKind::Comma, 1),
            '"' => (TokenKind::Str, string_end(rest).unwrap_or(rest.len())),
            c if c.is_whitespace() => {
                let len = rest
                    .char_indices()
                    .find(|(_, c)| !c.is_whitespace())
                    .map_or(rest.len(), |(i, _)| i);
                (TokenKind::Space, len)
            }
            _ => {
                let end = rest
                    .char_indices()
                    .find(|(_, c)| is_structural(*c) || *c == '\n' || *c == '\r')
                    .map_or(rest.len(), |(i, _)| i);
                let len = rest[..end].trim_end().len();
                (TokenKind::Bare, len)
            }
        };

        let (text, tail) = rest.split_at(len);
        tokens.push(Token { kind, text });
        rest = tail;
    }

    tokens
}

/// Byte offset just past the closing quote of the string literal at the
/// start of `text` (which begins with `"`), or `None` when it never closes.
fn string_end(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in text.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some(i + 1);
        }
    }
    None
}

fn is_terminated(literal: &str) -> bool {
    string_end(literal) == Some(literal.len())
}

/// The next non-space token after `index`.
fn next_significant<'a>(tokens: &[Token<'a>], index: usize) -> Option<Token<'a>> {
    tokens[index + 1..]
        .iter()
        .find(|t| t.kind != TokenKind::Space)
        .copied()
}

// ---------------------------------------------------------------------------
// Character-level passes
// ---------------------------------------------------------------------------

/// Remove residual code-fence markers and their language tags.
pub fn strip_fence_markers(input: &str) -> String {
    FENCE_MARKER.replace_all(input, "").into_owned()
}

/// Drop control characters.
///
/// Outside string literals only newline, carriage return and tab survive.
/// Inside string literals those three are escaped so the literal stays valid.
pub fn strip_control_chars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
                if !c.is_control() {
                    out.push(c);
                } else {
                    // A backslash followed by a raw control char; keep the escape valid
                    out.push('\\');
                }
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => {}
                c => out.push(c),
            }
        } else {
            match c {
                '"' => {
                    in_string = true;
                    out.push(c);
                }
                '\n' | '\r' | '\t' => out.push(c),
                c if c.is_control() => {}
                c => out.push(c),
            }
        }
    }

    out
}

/// Terminate a string literal cut off by the end of input.
pub fn close_truncated_string(input: &str) -> String {
    let tokens = tokenize(input);
    match tokens.last() {
        Some(last) if last.kind == TokenKind::Str && !is_terminated(last.text) => {
            let mut out = input.to_string();
            let trailing_backslashes = last.text.chars().rev().take_while(|c| *c == '\\').count();
            if trailing_backslashes % 2 == 1 {
                out.pop();
            }
            out.push('"');
            out
        }
        _ => input.to_string(),
    }
}

/// Drop any text before the first `{` when the input does not start with one.
///
/// Braces inside quoted prose are skipped. When every `{` sits inside a
/// string literal the first one is used anyway.
pub fn strip_leading_prose(input: &str) -> String {
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    let mut offset = 0;
    for token in tokenize(trimmed) {
        if token.kind == TokenKind::OpenBrace {
            return trimmed[offset..].to_string();
        }
        offset += token.text.len();
    }

    match trimmed.find('{') {
        Some(start) => trimmed[start..].to_string(),
        None => trimmed.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Token-level passes
// ---------------------------------------------------------------------------

/// Replace known truncated/garbled key names with their canonical spelling.
///
/// Runs once bare keys are quoted and colons are in place, so a key is any
/// string literal directly followed by `:`.
pub fn canonicalize_keys(input: &str) -> String {
    let tokens = tokenize(input);
    let mut out = String::with_capacity(input.len());

    for (index, token) in tokens.iter().enumerate() {
        if token.kind == TokenKind::Str && is_terminated(token.text) {
            let inner = &token.text[1..token.text.len() - 1];
            let key_position = matches!(
                next_significant(&tokens, index).map(|t| t.kind),
                Some(TokenKind::Colon)
            );
            if key_position {
                if let Some((_, canonical)) = KEY_CORRECTIONS.iter().find(|(bad, _)| *bad == inner) {
                    out.push('"');
                    out.push_str(canonical);
                    out.push('"');
                    continue;
                }
            }
        }
        out.push_str(token.text);
    }

    out
}

/// Quote unquoted values that are not `true`, `false`, `null` or a number.
///
/// Python-style `True`/`False`/`None` become their JSON literals and
/// single-quoted runs lose their single quotes.
pub fn quote_bare_values(input: &str) -> String {
    let tokens = tokenize(input);
    let mut out = String::with_capacity(input.len() + 8);

    for token in &tokens {
        if token.kind != TokenKind::Bare {
            out.push_str(token.text);
            continue;
        }

        let bare = token.text;
        match bare {
            "true" | "false" | "null" => out.push_str(bare),
            "True" => out.push_str("true"),
            "False" => out.push_str("false"),
            "None" | "NULL" | "Null" => out.push_str("null"),
            _ if JSON_NUMBER.is_match(bare) => out.push_str(bare),
            _ => {
                let unquoted = bare
                    .strip_prefix('\'')
                    .and_then(|b| b.strip_suffix('\''))
                    .unwrap_or(bare);
                out.push('"');
                push_escaped(&mut out, unquoted);
                out.push('"');
            }
        }
    }

    out
}

/// Append `text` as string-literal content: backslashes and control
/// characters are escaped.
fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
}

/// Insert `:` between a key and its value when the separator is missing.
///
/// Covers quoted values (`"key" "value"`), bare literals (`"key" 42`) and
/// containers (`"key" [ ... ]`, `"key" { ... }`). A key with no value before
/// a closer or end of input receives `null`.
pub fn insert_missing_colons(input: &str) -> String {
    SeparatorWalk::run(input, Fixes { colons: true, ..Fixes::NONE })
}

/// Insert `,` between consecutive members or elements.
pub fn insert_missing_commas(input: &str) -> String {
    SeparatorWalk::run(input, Fixes { commas: true, ..Fixes::NONE })
}

/// Remove separators directly before a closing brace/bracket or end of
/// input, and collapse doubled separators.
pub fn drop_trailing_separators(input: &str) -> String {
    SeparatorWalk::run(input, Fixes { trailing: true, ..Fixes::NONE })
}

/// Append the closers still owed at end of input, innermost first.
///
/// A closer that does not match the innermost opener closes the intervening
/// structures first; a closer with no matching opener is dropped. Anything
/// after the top-level structure closes is discarded, as is surrounding
/// whitespace.
pub fn close_open_structures(input: &str) -> String {
    let tokens = tokenize(input);
    let mut out = String::with_capacity(input.len() + 8);
    let mut owed: Vec<char> = Vec::new();
    let mut opened = false;

    for token in &tokens {
        match token.kind {
            TokenKind::OpenBrace => {
                owed.push('}');
                opened = true;
                out.push_str(token.text);
            }
            TokenKind::OpenBracket => {
                owed.push(']');
                opened = true;
                out.push_str(token.text);
            }
            TokenKind::CloseBrace | TokenKind::CloseBracket => {
                let closer = if token.kind == TokenKind::CloseBrace { '}' } else { ']' };
                let Some(index) = owed.iter().rposition(|c| *c == closer) else {
                    continue;
                };
                while owed.len() > index + 1 {
                    if let Some(inner) = owed.pop() {
                        out.push(inner);
                    }
                }
                owed.pop();
                out.push(closer);
                if opened && owed.is_empty() {
                    return out.trim_start().to_string();
                }
            }
            _ => out.push_str(token.text),
        }
    }

    let mut out = out.trim().to_string();
    while let Some(closer) = owed.pop() {
        out.push(closer);
    }
    out
}

// ---------------------------------------------------------------------------
// Separator state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Fixes {
    colons: bool,
    commas: bool,
    trailing: bool,
}

impl Fixes {
    const NONE: Fixes = Fixes {
        colons: false,
        commas: false,
        trailing: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectState {
    Key,
    Colon,
    Value,
    AfterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    Value,
    AfterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object(ObjectState),
    Array(ArrayState),
}

/// Walks the token stream tracking object/array grammar state so that each
/// separator fix knows whether a literal is a key or a value. The state is
/// tracked identically whichever fixes are enabled; only emission differs.
struct SeparatorWalk {
    fixes: Fixes,
    out: String,
    stack: Vec<Frame>,
    /// Whitespace seen since the last significant token
    space: String,
    /// A comma (with the whitespace before it) not yet known to be needed
    held_comma: Option<String>,
}

impl SeparatorWalk {
    fn run(input: &str, fixes: Fixes) -> String {
        let mut walk = SeparatorWalk {
            fixes,
            out: String::with_capacity(input.len() + 16),
            stack: Vec::new(),
            space: String::new(),
            held_comma: None,
        };

        for token in tokenize(input) {
            walk.step(token);
        }
        walk.finish()
    }

    fn step(&mut self, token: Token<'_>) {
        if token.kind == TokenKind::Space {
            self.space.push_str(token.text);
            return;
        }

        match self.stack.last().copied() {
            None => self.top_level(token),
            Some(Frame::Object(state)) => self.in_object(state, token),
            Some(Frame::Array(state)) => self.in_array(state, token),
        }
    }

    fn top_level(&mut self, token: Token<'_>) {
        self.emit(token.text);
        self.push_if_opener(token);
    }

    fn in_object(&mut self, state: ObjectState, token: Token<'_>) {
        use TokenKind::*;

        match (state, token.kind) {
            (_, CloseBrace) | (_, CloseBracket) => {
                if matches!(state, ObjectState::Colon) && token.kind == CloseBrace {
                    self.insert_if(self.fixes.colons, ": null");
                } else if matches!(state, ObjectState::Value) && token.kind == CloseBrace {
                    self.insert_if(self.fixes.colons, " null");
                }
                self.close(token);
            }

            (ObjectState::Key, Str) | (ObjectState::Key, Bare) => {
                self.emit(token.text);
                self.set_top(Frame::Object(ObjectState::Colon));
            }
            (ObjectState::Key, Comma) => self.stray_separator(token),
            (ObjectState::Key, _) => self.opaque(token),

            (ObjectState::Colon, Colon) => {
                self.emit(token.text);
                self.set_top(Frame::Object(ObjectState::Value));
            }
            (ObjectState::Colon, Comma) => {
                self.insert_if(self.fixes.colons, ": null");
                self.hold_comma(token, Frame::Object(ObjectState::Key));
            }
            (ObjectState::Colon, _) => {
                self.insert_if(self.fixes.colons, ":");
                self.value(token, Frame::Object(ObjectState::AfterValue));
            }

            (ObjectState::Value, Comma) => {
                self.insert_if(self.fixes.colons, " null");
                self.hold_comma(token, Frame::Object(ObjectState::Key));
            }
            (ObjectState::Value, Colon) => self.stray_separator(token),
            (ObjectState::Value, _) => self.value(token, Frame::Object(ObjectState::AfterValue)),

            (ObjectState::AfterValue, Comma) => {
                self.hold_comma(token, Frame::Object(ObjectState::Key))
            }
            (ObjectState::AfterValue, Str) | (ObjectState::AfterValue, Bare) => {
                self.insert_if(self.fixes.commas, ",");
                self.emit(token.text);
                self.set_top(Frame::Object(ObjectState::Colon));
            }
            (ObjectState::AfterValue, _) if token.is_opener() => {
                self.insert_if(self.fixes.commas, ",");
                self.value(token, Frame::Object(ObjectState::AfterValue));
            }
            (ObjectState::AfterValue, _) => self.opaque(token),
        }
    }

    fn in_array(&mut self, state: ArrayState, token: Token<'_>) {
        use TokenKind::*;

        match (state, token.kind) {
            (_, CloseBrace) | (_, CloseBracket) => self.close(token),

            (ArrayState::Value, Comma) => self.stray_separator(token),
            (ArrayState::Value, Colon) => self.opaque(token),
            (ArrayState::Value, _) => self.value(token, Frame::Array(ArrayState::AfterValue)),

            (ArrayState::AfterValue, Comma) => {
                self.hold_comma(token, Frame::Array(ArrayState::Value))
            }
            (ArrayState::AfterValue, Colon) => self.opaque(token),
            (ArrayState::AfterValue, _) => {
                self.insert_if(self.fixes.commas, ",");
                self.value(token, Frame::Array(ArrayState::AfterValue));
            }
        }
    }

    /// Emit a value token; containers are pushed after the parent has moved on.
    fn value(&mut self, token: Token<'_>, parent_after: Frame) {
        self.set_top(parent_after);
        self.emit(token.text);
        self.push_if_opener(token);
    }

    fn push_if_opener(&mut self, token: Token<'_>) {
        match token.kind {
            TokenKind::OpenBrace => self.stack.push(Frame::Object(ObjectState::Key)),
            TokenKind::OpenBracket => self.stack.push(Frame::Array(ArrayState::Value)),
            _ => {}
        }
    }

    fn close(&mut self, token: Token<'_>) {
        if self.fixes.trailing {
            self.held_comma = None;
        }
        let wanted = |frame: &Frame| match token.kind {
            TokenKind::CloseBrace => matches!(frame, Frame::Object(_)),
            _ => matches!(frame, Frame::Array(_)),
        };
        if let Some(index) = self.stack.iter().rposition(wanted) {
            self.stack.truncate(index);
        }
        self.emit(token.text);
    }

    fn hold_comma(&mut self, token: Token<'_>, next: Frame) {
        let mut held = self.held_comma.take().unwrap_or_default();
        held.push_str(&std::mem::take(&mut self.space));
        held.push_str(token.text);
        self.held_comma = Some(held);
        self.set_top(next);
    }

    /// A separator where none belongs (`{,`, `[,`, `,,`, `::`).
    fn stray_separator(&mut self, token: Token<'_>) {
        if !self.fixes.trailing {
            self.emit(token.text);
        }
    }

    /// A token the walker cannot place; passed through untouched.
    fn opaque(&mut self, token: Token<'_>) {
        self.emit(token.text);
        self.push_if_opener(token);
    }

    fn set_top(&mut self, frame: Frame) {
        if let Some(top) = self.stack.last_mut() {
            *top = frame;
        }
    }

    /// Write pending separator/whitespace, then `text`.
    fn emit(&mut self, text: &str) {
        if let Some(held) = self.held_comma.take() {
            self.out.push_str(&held);
        }
        self.out.push_str(&self.space);
        self.space.clear();
        self.out.push_str(text);
    }

    /// Write `text` directly after the previous significant token.
    fn insert_if(&mut self, enabled: bool, text: &str) {
        if enabled {
            if let Some(held) = self.held_comma.take() {
                self.out.push_str(&held);
            }
            self.out.push_str(text);
        }
    }

    fn finish(mut self) -> String {
        match self.stack.last().copied() {
            Some(Frame::Object(ObjectState::Colon)) => self.insert_if(self.fixes.colons, ": null"),
            Some(Frame::Object(ObjectState::Value)) => self.insert_if(self.fixes.colons, " null"),
            _ => {}
        }
        if let Some(held) = self.held_comma.take() {
            if !self.fixes.trailing {
                self.out.push_str(&held);
            }
        }
        self.out.push_str(&self.space);
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parses(text: &str) -> bool {
        serde_json::from_str::<serde_json::Value>(text).is_ok()
    }

    #[test]
    fn test_tokenizer_round_trips_input() {
        let inputs = [
            r#"{"a": "b \"q\" {x}", "c": [1, 2.5, true]}"#,
            "{ summary: partial success,\n next: None }",
            r#"{"unterminated": "abc"#,
            "",
            "\t\n  ",
        ];
        for input in inputs {
            let joined: String = tokenize(input).iter().map(|t| t.text).collect();
            assert_eq!(joined, input);
        }
    }

    #[test]
    fn test_bare_token_stops_at_newline_and_trims() {
        let tokens = tokenize("partial success  \n next");
        assert_eq!(tokens[0].kind, TokenKind::Bare);
        assert_eq!(tokens[0].text, "partial success");
        assert_eq!(tokens[1].kind, TokenKind::Space);
    }

    #[test]
    fn test_strip_fence_markers() {
        assert_eq!(strip_fence_markers("```json\n{}\n```"), "\n{}\n");
        assert_eq!(strip_fence_markers("```JSON{}"), "{}");
    }

    #[test]
    fn test_strip_control_chars() {
        assert_eq!(strip_control_chars("{\u{0}\"a\":\u{7}1}"), "{\"a\":1}");
        assert_eq!(strip_control_chars("{\"a\": \"line1\nline2\"}"), "{\"a\": \"line1\\nline2\"}");
        assert_eq!(strip_control_chars("{\n\t\"a\": 1\n}"), "{\n\t\"a\": 1\n}");
    }

    #[test]
    fn test_close_truncated_string() {
        assert_eq!(close_truncated_string(r#"{"a": "Test ru"#), r#"{"a": "Test ru""#);
        assert_eq!(close_truncated_string(r#"{"a": "x\"#), r#"{"a": "x""#);
        assert_eq!(close_truncated_string(r#"{"a": "x"}"#), r#"{"a": "x"}"#);
    }

    #[test]
    fn test_strip_leading_prose() {
        assert_eq!(strip_leading_prose("Sure! Here you go: {\"a\": 1"), "{\"a\": 1");
        assert_eq!(strip_leading_prose("  {\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_leading_prose("no structure"), "no structure");
    }

    #[test]
    fn test_strip_leading_prose_skips_quoted_braces() {
        assert_eq!(
            strip_leading_prose(r#"Output of "echo {x" follows: {"summary": "ok"#),
            r#"{"summary": "ok"#
        );
        // Only quoted braces: fall back to the first one
        assert_eq!(strip_leading_prose(r#"say "{a""#), r#"{a""#);
    }

    #[test]
    fn test_quoted_brace_in_prose_repairs() {
        let raw = r#"Output of "echo {x" follows: {"summary": "ok", "nextSteps": ["a""#;
        let repaired = repair(raw);
        assert_eq!(repaired, r#"{"summary": "ok", "nextSteps": ["a"]}"#);
        assert_eq!(repair(&repaired), repaired);
    }

    #[test]
    fn test_canonicalize_keys() {
        assert_eq!(
            canonicalize_keys(r#"{"ummary": "x", "extSteps": ["a"]}"#),
            r#"{"summary": "x", "nextSteps": ["a"]}"#
        );
        // Values are never rewritten, including array elements missing a comma
        assert_eq!(canonicalize_keys(r#"{"tool": "ool"}"#), r#"{"tool": "ool"}"#);
        assert_eq!(canonicalize_keys(r#"["ool" "tatus"]"#), r#"["ool" "tatus"]"#);
    }

    #[test]
    fn test_unquoted_truncated_key_is_corrected() {
        assert_eq!(repair("{ummary: x}"), r#"{"summary": "x"}"#);
        assert_eq!(repair("{extSteps [a]}"), r#"{"nextSteps": ["a"]}"#);
    }

    #[test]
    fn test_quote_bare_values() {
        assert_eq!(
            quote_bare_values("{\"status\": partial success, \"count\": 3, \"ok\": True}"),
            "{\"status\": \"partial success\", \"count\": 3, \"ok\": true}"
        );
        assert_eq!(quote_bare_values("{summary: 'hi'}"), "{\"summary\": \"hi\"}");
        assert_eq!(quote_bare_values("{\"n\": -1.5e3, \"z\": null}"), "{\"n\": -1.5e3, \"z\": null}");
        assert_eq!(quote_bare_values(r"{a: C:\tmp}"), r#"{"a": "C":"\\tmp"}"#);
    }

    #[test]
    fn test_quote_bare_values_escapes_control_chars() {
        assert_eq!(
            quote_bare_values("{\"summary\": Test\trun}"),
            "{\"summary\": \"Test\\trun\"}"
        );
        assert_eq!(quote_bare_values("{a: x\u{1}y}"), "{\"a\": \"x\\u0001y\"}");

        let repaired = repair("{\"summary\": Test\trun}");
        assert!(parses(&repaired), "not valid JSON: {}", repaired);
    }

    #[test]
    fn test_insert_missing_colons() {
        assert_eq!(insert_missing_colons(r#"{"key" "value"}"#), r#"{"key": "value"}"#);
        assert_eq!(insert_missing_colons(r#"{"n" 42}"#), r#"{"n": 42}"#);
        assert_eq!(insert_missing_colons(r#"{"list" [1]}"#), r#"{"list": [1]}"#);
        assert_eq!(insert_missing_colons(r#"{"obj"{"a": 1}}"#), r#"{"obj":{"a": 1}}"#);
        assert_eq!(insert_missing_colons(r#"{"dangling"}"#), r#"{"dangling": null}"#);
        assert_eq!(insert_missing_colons(r#"{"ok": "yes"}"#), r#"{"ok": "yes"}"#);
    }

    #[test]
    fn test_colon_insertion_ignores_escaped_quotes_in_values() {
        let input = r#"{"a": "he said \"b\" \"c\"", "d": 1}"#;
        assert_eq!(insert_missing_colons(input), input);
    }

    #[test]
    fn test_insert_missing_commas() {
        assert_eq!(
            insert_missing_commas("{\"a\": 1\n \"b\": [1 2 \"x\"]}"),
            "{\"a\": 1,\n \"b\": [1, 2, \"x\"]}"
        );
        assert_eq!(insert_missing_commas(r#"[{"a": 1} {"b": 2}]"#), r#"[{"a": 1}, {"b": 2}]"#);
    }

    #[test]
    fn test_colons_and_commas_commute() {
        let input = r#"{"summary" "Test run" "attacksAnalysis" [ {"attackName" "X" "tool" "Y"} ]}"#;
        let a = insert_missing_commas(&insert_missing_colons(input));
        let b = insert_missing_colons(&insert_missing_commas(input));
        assert_eq!(a, b);
        assert!(parses(&a));
    }

    #[test]
    fn test_drop_trailing_separators() {
        assert_eq!(drop_trailing_separators(r#"{"a": [1, 2,], }"#), r#"{"a": [1, 2] }"#);
        assert_eq!(drop_trailing_separators(r#"[1,, 2]"#), r#"[1, 2]"#);
        assert_eq!(drop_trailing_separators(r#"{"a": 1,"#), r#"{"a": 1"#);
    }

    #[test]
    fn test_close_open_structures() {
        assert_eq!(close_open_structures(r#"{"a": [1, {"b": 2"#), r#"{"a": [1, {"b": 2}]}"#);
        assert_eq!(close_open_structures(r#"{"a": [1, 2}"#), r#"{"a": [1, 2]}"#);
        assert_eq!(close_open_structures(r#"{"a": 1}} trailing"#), r#"{"a": 1}"#);
        assert_eq!(close_open_structures(r#"] {"a": 1"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_full_repair_of_colonless_response() {
        let raw = "{\n  \"summary\" \"Test run\"\n  \"attacksAnalysis\" [ {\"attackName\" \"X\" \"tool\" \"Y\" \"status\" \"success\"} ]\n";
        let repaired = repair(raw);
        assert!(parses(&repaired), "not valid JSON: {}", repaired);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let corpus = [
            "{\n  \"summary\" \"Test run\"\n  \"attacksAnalysis\" [ {\"attackName\" \"X\" \"tool\" \"Y\" \"status\" \"success\"} ]\n}",
            r#"{"ummary": "x", "nextSteps": ["a", "b",],"#,
            "```json\n{summary: partial success, nextSteps: [retry\n upgrade]}\n```",
            r#"Here: {"a": "he said \"hi\"" "b" {"c" [1 2"#,
            r#"{"a": "line1
line2", "b": None}"#,
            r#"{"x": 1}} {"y": 2}"#,
            "}}]] {,,\"a\"::1,}",
            "",
            "plain prose only",
            "{\"k\": \"unterminated \\",
            "{\"summary\": Test\trun}",
            r#"Output of "echo {x" follows: {"summary": "ok", "nextSteps": ["a""#,
            "{ummary: x, ool [y z]}",
        ];

        for input in corpus {
            let once = repair(input);
            let twice = repair(&once);
            assert_eq!(once, twice, "repair oscillated for input {:?}", input);
        }
    }

    const FRAGMENTS: &[&str] = &[
        "{", "}", "[", "]", ":", ",", "\"", "\"summary\"", "\"ummary\"", "\"nextSteps\"", " ", "\n",
        "\r", "\t", "Test run", "42", "1.5e3", "true", "null", "None", "'x'", "'", "\\", "\\\"",
        "```json", "prose ", "\"a{b\"", "é", "ool", "extSteps", "-", "\u{1}",
    ];

    #[test]
    fn test_repair_is_idempotent_on_generated_inputs() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..2000 {
            let len = rng.gen_range(1..=16);
            let input: String = (0..len)
                .map(|_| FRAGMENTS[rng.gen_range(0..FRAGMENTS.len())])
                .collect();

            let once = repair(&input);
            assert_eq!(repair(&once), once, "repair oscillated for input {:?}", input);
            let _ = crate::repair::parse(&input);
        }
    }

    #[test]
    fn test_repair_traced_reports_every_pass() {
        let trace = repair_traced(r#"{"a" 1"#);
        assert_eq!(trace.len(), PASSES.len());
        let colons = trace.iter().find(|(name, _)| *name == "insert_missing_colons").unwrap();
        assert_eq!(colons.1, r#"{"a": 1"#);
        assert_eq!(trace.last().unwrap().1, r#"{"a": 1}"#);
    }
}
