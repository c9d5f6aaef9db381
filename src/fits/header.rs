//! Header cards: 80-byte ASCII records grouped in 2880-byte blocks and
//! terminated by an `END` card.

use std::fmt;

pub const BLOCK_SIZE: usize = 2880;
pub const CARD_SIZE: usize = 80;

/// Round `len` up to a whole number of blocks.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

// ---------------------------------------------------------------------------
// HeaderValue – the typed value of one card
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Logical(bool),
    Integer(i64),
    Float(f64),
    /// Present but not interpretable (complex numbers, malformed tokens).
    Raw(String),
    /// Value indicator with an empty value field.
    Undefined,
}

impl HeaderValue {
    fn parse(field: &str) -> HeaderValue {
        let field = field.trim_start();
        if let Some(rest) = field.strip_prefix('\'') {
            return HeaderValue::Text(parse_quoted(rest));
        }
        let token = field.split('/').next().unwrap_or("").trim();
        match token {
            "" => HeaderValue::Undefined,
            "T" => HeaderValue::Logical(true),
            "F" => HeaderValue::Logical(false),
            _ => {
                if let Ok(i) = token.parse::<i64>() {
                    HeaderValue::Integer(i)
                } else if let Ok(f) = token.replace(['D', 'd'], "E").parse::<f64>() {
                    HeaderValue::Float(f)
                } else {
                    HeaderValue::Raw(token.to_string())
                }
            }
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(i) => Some(*i),
            HeaderValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Integer(i) => Some(*i as f64),
            HeaderValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

/// Body of a quoted string after the opening quote. `''` is an escaped
/// quote; trailing blanks are not significant.
fn parse_quoted(rest: &str) -> String {
    let mut out = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                out.push('\'');
            } else {
                break;
            }
        } else {
            out.push(c);
        }
    }
    out.trim_end().to_string()
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::Text(s.to_string())
    }
}

impl From<bool> for HeaderValue {
    fn from(b: bool) -> Self {
        HeaderValue::Logical(b)
    }
}

impl From<i64> for HeaderValue {
    fn from(i: i64) -> Self {
        HeaderValue::Integer(i)
    }
}

impl From<f64> for HeaderValue {
    fn from(f: f64) -> Self {
        HeaderValue::Float(f)
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(s) => write!(f, "'{s}'"),
            HeaderValue::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            HeaderValue::Integer(i) => write!(f, "{i}"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Raw(s) => write!(f, "{s}"),
            HeaderValue::Undefined => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Card / Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    /// `None` for commentary cards (`COMMENT`, `HISTORY`, blank keyword).
    pub value: Option<HeaderValue>,
}

impl Card {
    fn parse(raw: &[u8]) -> Card {
        let text = String::from_utf8_lossy(raw);
        let keyword = text.get(..8).unwrap_or(&text[..]).trim_end().to_string();
        let has_value = text.get(8..10) == Some("= ")
            && !matches!(keyword.as_str(), "COMMENT" | "HISTORY" | "");
        let value = if has_value {
            Some(HeaderValue::parse(text.get(10..).unwrap_or("")))
        } else {
            None
        };
        Card { keyword, value }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

/// Result of scanning one header out of a byte buffer.
#[derive(Debug)]
pub struct ParsedHeader {
    pub header: Header,
    /// Bytes consumed, always a multiple of [`BLOCK_SIZE`].
    pub len: usize,
}

impl Header {
    /// Scan cards from the start of `bytes` until `END`.
    ///
    /// Returns an error message when the buffer ends before the `END` card.
    pub fn parse(bytes: &[u8]) -> Result<ParsedHeader, String> {
        let mut cards = Vec::new();
        let mut pos = 0;
        while pos + CARD_SIZE <= bytes.len() {
            let card = Card::parse(&bytes[pos..pos + CARD_SIZE]);
            pos += CARD_SIZE;
            if card.keyword == "END" {
                return Ok(ParsedHeader {
                    header: Header { cards },
                    len: padded_len(pos),
                });
            }
            cards.push(card);
        }
        Err(format!(
            "header has no END card within the remaining {} bytes",
            bytes.len()
        ))
    }

    pub fn from_cards(cards: Vec<Card>) -> Self {
        Header { cards }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// First card carrying `keyword`.
    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.cards
            .iter()
            .find(|c| c.keyword == keyword)
            .and_then(|c| c.value.as_ref())
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_i64)
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(HeaderValue::as_str)
    }

    pub fn get_bool(&self, keyword: &str) -> Option<bool> {
        self.get(keyword).and_then(HeaderValue::as_bool)
    }
}
