//! Line/column lookup for mapping keys of a YAML document.
//!
//! `serde_yaml` does not keep spans, so positions are recovered from the text:
//! each mapping key is indexed by its JSON pointer (`/jobs/build/steps/0/uses`).
//! Block structure is tracked by indentation; flow collections (`{ .. }`,
//! `[ .. ]`, possibly spanning lines) are scanned character by character.
//! Anchors, aliases and complex keys are not resolved.

use std::collections::HashMap;

/// 1-based source position. `Pos::default()` (0:0) means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: Pos,
    value: Pos,
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone)]
struct Frame {
    indent: usize,
    segment: Segment,
}

#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    entries: HashMap<String, Entry>,
}

impl SourceMap {
    pub fn build(src: &str) -> Self {
        let lines: Vec<&str> = src.lines().collect();
        let mut entries: HashMap<String, Entry> = HashMap::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut block_scalar_owner: Option<usize> = None;

        let mut next = 0;
        while next < lines.len() {
            let idx = next;
            next += 1;
            let line = lines[idx];
            let line_no = to_line(idx);
            let indent = line.len() - line.trim_start_matches(' ').len();
            let mut rest = line[indent..].trim_end();

            if let Some(owner) = block_scalar_owner {
                if rest.is_empty() || indent > owner {
                    continue;
                }
                block_scalar_owner = None;
            }
            if rest.is_empty() || is_directive(rest) {
                continue;
            }

            let mut col = indent;
            while rest == "-" || rest.starts_with("- ") {
                while stack.last().is_some_and(|f| f.indent > col) {
                    stack.pop();
                }
                let next_index = match stack.last() {
                    Some(Frame {
                        indent,
                        segment: Segment::Index(i),
                    }) if *indent == col => {
                        let n = i + 1;
                        stack.pop();
                        n
                    }
                    _ => 0,
                };
                stack.push(Frame {
                    indent: col,
                    segment: Segment::Index(next_index),
                });
                let after = &rest[1..];
                let skip = after.len() - after.trim_start_matches(' ').len();
                col += 1 + skip;
                rest = &after[skip..];
            }
            if rest.is_empty() || rest.starts_with('#') {
                continue;
            }
            if rest.starts_with('{') || rest.starts_with('[') {
                // Flow collection as a sequence item.
                let base = base_pointer(&stack);
                next = scan_flow(&lines, idx, col, &base, &mut entries) + 1;
                continue;
            }

            let Some((key, value_off)) = split_key(rest) else {
                continue;
            };
            while stack.last().is_some_and(|f| f.indent >= col) {
                stack.pop();
            }

            let key_pos = Pos::new(line_no, to_col(col));
            let value = &rest[value_off..];
            let value_skip = value.len() - value.trim_start().len();
            let value = value.trim_start();
            let value_col = col + value_off + value_skip;
            let value_pos = if value.is_empty() || value.starts_with('#') {
                key_pos
            } else {
                Pos::new(line_no, to_col(value_col))
            };
            if value.starts_with('|') || value.starts_with('>') {
                block_scalar_owner = Some(col);
            }

            let ptr = pointer(&stack, &key);
            if value.starts_with('{') || value.starts_with('[') {
                next = scan_flow(&lines, idx, value_col, &ptr, &mut entries) + 1;
            }
            entries.entry(ptr).or_insert(Entry {
                key: key_pos,
                value: value_pos,
            });
            stack.push(Frame {
                indent: col,
                segment: Segment::Key(key),
            });
        }

        Self { entries }
    }

    /// Position of the key named by `ptr`.
    pub fn key_pos(&self, ptr: &str) -> Option<Pos> {
        self.entries.get(ptr).map(|e| e.key)
    }

    /// Position of the inline value of `ptr`, or of its key when the value is a nested block.
    pub fn value_pos(&self, ptr: &str) -> Option<Pos> {
        self.entries.get(ptr).map(|e| e.value)
    }
}

/// Escapes one JSON pointer reference token.
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn base_pointer(stack: &[Frame]) -> String {
    let mut out = String::new();
    for frame in stack {
        out.push('/');
        match &frame.segment {
            Segment::Key(k) => out.push_str(&escape_token(k)),
            Segment::Index(i) => out.push_str(&i.to_string()),
        }
    }
    out
}

fn pointer(stack: &[Frame], key: &str) -> String {
    format!("{}/{}", base_pointer(stack), escape_token(key))
}

fn is_directive(rest: &str) -> bool {
    rest.starts_with('#') || rest.starts_with("---") || rest.starts_with("...") || rest.starts_with('%')
}

fn to_line(zero_based: usize) -> u32 {
    u32::try_from(zero_based + 1).unwrap_or(u32::MAX)
}

fn to_col(zero_based: usize) -> u32 {
    u32::try_from(zero_based + 1).unwrap_or(u32::MAX)
}

/// Splits `key: value` and returns the unquoted key plus the byte offset just past the colon.
fn split_key(rest: &str) -> Option<(String, usize)> {
    let bytes = rest.as_bytes();
    match bytes.first()? {
        b'{' | b'[' | b'&' | b'*' | b'!' | b'|' | b'>' => return None,
        q @ (b'"' | b'\'') => {
            let close = rest[1..].find(*q as char)? + 1;
            let key = rest[1..close].to_string();
            let after = &rest[close + 1..];
            let skip = after.len() - after.trim_start_matches(' ').len();
            let colon = close + 1 + skip;
            if bytes.get(colon) != Some(&b':') {
                return None;
            }
            if !matches!(bytes.get(colon + 1), None | Some(b' ')) {
                return None;
            }
            return Some((key, colon + 1));
        }
        _ => {}
    }

    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'#' if i > 0 && bytes[i - 1] == b' ' => return None,
            b':' if matches!(bytes.get(i + 1), None | Some(b' ')) => {
                let key = rest[..i].trim_end();
                if key.is_empty() {
                    return None;
                }
                return Some((key.to_string(), i + 1));
            }
            _ => {}
        }
    }
    None
}

/// Indexes the flow collection starting at byte `start` of line `first`, which
/// may continue over following lines. Returns the index of its last line.
fn scan_flow(
    lines: &[&str],
    first: usize,
    start: usize,
    base: &str,
    entries: &mut HashMap<String, Entry>,
) -> usize {
    let mut chars: Vec<(char, Pos)> = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut last = first;

    'lines: for (idx, line) in lines.iter().enumerate().skip(first) {
        last = idx;
        let offset = if idx == first { start } else { 0 };
        let mut prev_blank = true;
        for (b, c) in line[offset..].char_indices() {
            match quote {
                Some(_) if escaped => escaped = false,
                Some('"') if c == '\\' => escaped = true,
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None => match c {
                    '"' | '\'' => quote = Some(c),
                    '#' if prev_blank => break,
                    '{' | '[' => depth += 1,
                    '}' | ']' => depth = depth.saturating_sub(1),
                    _ => {}
                },
            }
            chars.push((c, Pos::new(to_line(idx), to_col(offset + b))));
            prev_blank = c == ' ' || c == '\t';
            if depth == 0 && quote.is_none() {
                break 'lines;
            }
        }
        chars.push((' ', Pos::default()));
    }

    let mut flow = Flow { chars: &chars, i: 0 };
    flow.value(base, entries);
    last
}

struct Flow<'a> {
    chars: &'a [(char, Pos)],
    i: usize,
}

impl Flow<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).map(|(c, _)| *c)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.i + n).map(|(c, _)| *c)
    }

    fn pos(&self) -> Pos {
        self.chars.get(self.i).map(|(_, p)| *p).unwrap_or_default()
    }

    fn skip_blank(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.i += 1;
        }
    }

    fn value(&mut self, ptr: &str, entries: &mut HashMap<String, Entry>) {
        self.skip_blank();
        match self.peek() {
            Some('{') => self.mapping(ptr, entries),
            Some('[') => self.sequence(ptr, entries),
            _ => {
                self.scalar(false);
            }
        }
    }

    fn mapping(&mut self, ptr: &str, entries: &mut HashMap<String, Entry>) {
        self.i += 1;
        loop {
            self.skip_blank();
            match self.peek() {
                None => return,
                Some('}') => {
                    self.i += 1;
                    return;
                }
                Some(',') => {
                    self.i += 1;
                    continue;
                }
                _ => {}
            }
            let begin = self.i;
            let key_pos = self.pos();
            let key = self.scalar(true);
            if self.i == begin {
                self.i += 1;
                continue;
            }
            let child = format!("{ptr}/{}", escape_token(&key));
            self.skip_blank();
            let mut value_pos = key_pos;
            let has_value = if self.peek() == Some(':') {
                self.i += 1;
                self.skip_blank();
                let inline = !matches!(self.peek(), None | Some(',') | Some('}'));
                if inline {
                    value_pos = self.pos();
                }
                inline
            } else {
                false
            };
            entries.entry(child.clone()).or_insert(Entry {
                key: key_pos,
                value: value_pos,
            });
            if has_value {
                self.value(&child, entries);
            }
        }
    }

    fn sequence(&mut self, ptr: &str, entries: &mut HashMap<String, Entry>) {
        self.i += 1;
        let mut index = 0usize;
        loop {
            self.skip_blank();
            match self.peek() {
                None => return,
                Some(']') => {
                    self.i += 1;
                    return;
                }
                Some(',') => {
                    self.i += 1;
                    index += 1;
                }
                _ => {
                    let begin = self.i;
                    self.value(&format!("{ptr}/{index}"), entries);
                    if self.i == begin {
                        self.i += 1;
                    }
                }
            }
        }
    }

    /// Reads a quoted or plain scalar. Keys stop at `: `; values only at `,`, `}` or `]`.
    fn scalar(&mut self, key: bool) -> String {
        let mut out = String::new();
        if let Some(q @ ('"' | '\'')) = self.peek() {
            self.i += 1;
            while let Some(c) = self.peek() {
                self.i += 1;
                if q == '\'' && c == '\'' && self.peek() == Some('\'') {
                    self.i += 1;
                    out.push('\'');
                } else if q == '"' && c == '\\' {
                    if let Some(e) = self.peek() {
                        self.i += 1;
                        out.push(e);
                    }
                } else if c == q {
                    break;
                } else {
                    out.push(c);
                }
            }
            return out;
        }
        while let Some(c) = self.peek() {
            let ends_key = key
                && c == ':'
                && matches!(
                    self.peek_at(1),
                    None | Some(' ') | Some('\t') | Some(',') | Some('}') | Some(']')
                );
            if matches!(c, ',' | '}' | ']') || ends_key {
                break;
            }
            out.push(c);
            self.i += 1;
        }
        out.trim_end().to_string()
    }
}
