//! Work-unit records decoded from snapshot values.
//!
//! Values are textual mappings. The work server historically wrote them as
//! Python literals (`{'run': 0, 'gen': 20, 'state': 'FINISHED'}`); newer
//! tooling writes JSON. [`decode_record`] parses JSON with `serde_json` and
//! falls back to a literal parser for the Python spelling; either way the
//! record is deserialized from the resulting `serde_json::Value`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::RecordError;

/// Lifecycle state of a work unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkUnitState {
    Assigned,
    Finished,
    Failed,
    /// Any state label the reporting core does not classify.
    Other(String),
}

impl WorkUnitState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Assigned => "ASSIGNED",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for WorkUnitState {
    fn from(label: String) -> Self {
        match label.as_str() {
            "ASSIGNED" => Self::Assigned,
            "FINISHED" => Self::Finished,
            "FAILED" => Self::Failed,
            _ => Self::Other(label),
        }
    }
}

impl From<WorkUnitState> for String {
    fn from(state: WorkUnitState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for WorkUnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One work unit (clone) as stored in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnitRecord {
    /// Snapshot key the record was read from (lossy UTF-8).
    #[serde(skip_deserializing, default)]
    pub key: String,
    pub run: u32,
    /// Generation reached so far.
    #[serde(rename = "gen")]
    pub generation: u32,
    pub state: WorkUnitState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone: Option<u32>,
    /// Every other field of the stored mapping, preserved as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl WorkUnitRecord {
    /// Build a record with no extra fields.
    pub fn new(key: impl Into<String>, run: u32, generation: u32, state: WorkUnitState) -> Self {
        Self {
            key: key.into(),
            run,
            generation,
            state,
            clone: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Decode one snapshot value into a record.
pub fn decode_record(key: &[u8], value: &[u8]) -> Result<WorkUnitRecord, RecordError> {
    let key = String::from_utf8_lossy(key).into_owned();
    let decode_err = |message: String| RecordError::Decode {
        key: key.clone(),
        message,
    };

    let text = std::str::from_utf8(value).map_err(|e| decode_err(format!("not UTF-8: {e}")))?;
    let parsed = parse_mapping(text).map_err(decode_err)?;
    let mut record: WorkUnitRecord =
        serde_json::from_value(parsed).map_err(|e| decode_err(e.to_string()))?;
    record.key = key;
    Ok(record)
}

/// Parse a JSON object or Python-literal dict into a JSON value.
pub fn parse_mapping(text: &str) -> Result<Value, String> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(_) => {
            let mut parser = LiteralParser::new(text);
            let value = parser.value()?;
            parser.skip_ws();
            if !parser.at_end() {
                return Err(format!("trailing input at offset {}", parser.pos));
            }
            value
        }
    };
    if !value.is_object() {
        return Err("value is not a mapping".into());
    }
    Ok(value)
}

/// Recursive-descent parser for the literal subset the work server emits:
/// dicts, lists, tuples, quoted strings, numbers, and the Python and JSON
/// spellings of booleans and null.
struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char) -> Result<(), String> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(format!("expected '{want}', found '{c}' at offset {}", self.pos - c.len_utf8())),
            None => Err(format!("expected '{want}', found end of input")),
        }
    }

    fn value(&mut self) -> Result<Value, String> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.mapping(),
            Some('[') => self.sequence('[', ']'),
            Some('(') => self.sequence('(', ')'),
            Some('\'' | '"') => self.string().map(Value::String),
            Some('b' | 'u') if matches!(self.rest().chars().nth(1), Some('\'' | '"')) => {
                self.bump();
                self.string().map(Value::String)
            }
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.keyword(),
            Some(c) => Err(format!("unexpected '{c}' at offset {}", self.pos)),
            None => Err("unexpected end of input".into()),
        }
    }

    fn mapping(&mut self) -> Result<Value, String> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                other => return Err(format!("unsupported mapping key {other}")),
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(c) => return Err(format!("expected ',' or '}}', found '{c}'")),
                None => return Err("unterminated mapping".into()),
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value, String> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(Value::Array(items)),
                Some(c) => return Err(format!("expected ',' or '{close}', found '{c}'")),
                None => return Err("unterminated sequence".into()),
            }
        }
    }

    fn string(&mut self) -> Result<String, String> {
        let quote = self.bump().ok_or("unexpected end of input")?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err("unterminated string".into()),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    /// Python string escapes. Unrecognized escapes keep their backslash.
    fn escape(&mut self, out: &mut String) -> Result<(), String> {
        let escaped = self.bump().ok_or("unterminated escape")?;
        match escaped {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(escaped),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{b}'),
            '0'..='7' => out.push(self.octal_escape(escaped)?),
            'x' => out.push(self.code_point(2)?),
            'u' => out.push(self.utf16_escape()?),
            'U' => out.push(self.code_point(8)?),
            'N' => return Err("named unicode escapes are not supported".into()),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    /// Up to three octal digits, the first already consumed.
    fn octal_escape(&mut self, first: char) -> Result<char, String> {
        let mut code = first.to_digit(8).unwrap_or(0);
        for _ in 0..2 {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(d) => {
                    code = code * 8 + d;
                    self.bump();
                }
                None => break,
            }
        }
        char::from_u32(code).ok_or_else(|| format!("invalid code point {code:#o}"))
    }

    /// `\uXXXX`, joining a surrogate pair when a low half follows.
    fn utf16_escape(&mut self) -> Result<char, String> {
        let high = self.hex(4)?;
        if !(0xd800..0xdc00).contains(&high) {
            return char::from_u32(high).ok_or_else(|| format!("invalid code point {high:#x}"));
        }
        if !self.rest().starts_with("\\u") {
            return Err(format!("unpaired surrogate {high:#x}"));
        }
        self.pos += 2;
        let low = self.hex(4)?;
        if !(0xdc00..0xe000).contains(&low) {
            return Err(format!("unpaired surrogate {high:#x}"));
        }
        let code = 0x10000 + ((high - 0xd800) << 10) + (low - 0xdc00);
        char::from_u32(code).ok_or_else(|| format!("invalid code point {code:#x}"))
    }

    fn code_point(&mut self, digits: usize) -> Result<char, String> {
        let code = self.hex(digits)?;
        char::from_u32(code).ok_or_else(|| format!("invalid code point {code:#x}"))
    }

    fn hex(&mut self, digits: usize) -> Result<u32, String> {
        let end = self.pos + digits;
        let hex = self
            .src
            .get(self.pos..end)
            .ok_or("truncated hex escape")?;
        let code = u32::from_str_radix(hex, 16).map_err(|e| format!("bad hex escape: {e}"))?;
        self.pos = end;
        Ok(code)
    }

    fn number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {}
                '.' | 'e' | 'E' => is_float = true,
                '-' | '+' if is_float => {}
                _ => break,
            }
            self.bump();
        }
        let literal: String = self.src[start..self.pos].chars().filter(|&c| c != '_').collect();
        let literal = literal.strip_prefix('+').unwrap_or(&literal);
        if is_float {
            let f: f64 = literal
                .parse()
                .map_err(|e| format!("bad number \"{literal}\": {e}"))?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| format!("non-finite number \"{literal}\""))
        } else {
            literal
                .parse::<i64>()
                .map(|i| Value::Number(i.into()))
                .map_err(|e| format!("bad number \"{literal}\": {e}"))
        }
    }

    fn keyword(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            other => Err(format!("unknown identifier \"{other}\"")),
        }
    }
}
