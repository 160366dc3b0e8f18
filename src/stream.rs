//! Incremental decoder for the agent's line-framed streaming responses.
//!
//! The stream is a sequence of `\n`-delimited frames. A frame carries answer
//! text iff it starts with the `0:` marker, followed by a JSON-string-encoded
//! fragment; every other frame (status and metadata) is skipped. Network
//! chunks split the stream at arbitrary byte positions, so the decoder keeps
//! the unterminated tail of each chunk and prepends it to the next one.

use regex::Regex;

/// Marker prefix of payload-bearing frames.
const PAYLOAD_MARKER: &str = "0:";

pub struct FrameDecoder {
    carry: Vec<u8>,
    text: String,
    quoted: Regex,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            carry: Vec::new(),
            text: String::new(),
            quoted: Regex::new(r#"^"(.*)"$"#).expect("quoted-payload pattern is valid"),
        }
    }

    /// Feeds one network chunk. A chunk may split a frame anywhere, including
    /// mid-marker or inside a multi-byte character.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        let (lines, carry) = split_complete_lines(std::mem::take(&mut self.carry), chunk);
        self.carry = carry;
        for line in &lines {
            self.push_line(line);
        }
    }

    fn push_line(&mut self, line: &str) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            return;
        }
        let Some(payload) = line.strip_prefix(PAYLOAD_MARKER) else {
            return;
        };
        // Strip exactly one outer quote pair; anything that doesn't look like
        // a quoted fragment passes through as-is.
        match self.quoted.captures(payload) {
            Some(caps) => self.text.push_str(&caps[1]),
            None => self.text.push_str(payload),
        }
    }

    /// Ends the stream: flushes the carried tail, unescapes the accumulated
    /// text and returns it. `None` means the stream produced no answer text.
    pub fn finish(mut self) -> Option<String> {
        if !self.carry.is_empty() {
            let tail = String::from_utf8_lossy(&self.carry).into_owned();
            self.push_line(&tail);
        }

        let text = unescape(&self.text);
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// Appends `chunk` to `buffer` and splits off all complete lines, returning
/// the unterminated tail as the new buffer.
fn split_complete_lines(mut buffer: Vec<u8>, chunk: &[u8]) -> (Vec<String>, Vec<u8>) {
    buffer.extend_from_slice(chunk);

    let Some(last_newline) = buffer.iter().rposition(|&b| b == b'\n') else {
        return (Vec::new(), buffer);
    };

    let rest = buffer.split_off(last_newline + 1);
    let lines = buffer[..last_newline]
        .split(|&b| b == b'\n')
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect();
    (lines, rest)
}

/// Expands the JSON-string escapes the agent emits: `\n`, `\"` and `\\`.
/// Escape pairs are consumed left to right, so a doubled backslash can never
/// turn the character after it into a newline. Unknown escapes pass through
/// untouched.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}
