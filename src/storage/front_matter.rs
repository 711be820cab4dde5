//! Splitting element files into YAML front matter and a markdown body.

use serde_yaml::{Mapping, Value};

const DELIMITER: &str = "---";

/// A source document: the structured block and the free-text body.
///
/// The body is kept byte for byte, so that rewriting the front matter never
/// disturbs the documentation that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The parsed front matter, in file order.
    pub front_matter: Mapping,
    /// Everything after the closing delimiter line.
    pub body: String,
}

impl Document {
    /// Splits raw text into front matter and body.
    ///
    /// # Errors
    ///
    /// - [`ParseError::MalformedDocument`] if the text does not open with a
    ///   `---` line, or the block is never closed
    /// - [`ParseError::InvalidStructuredData`] if the block is not a YAML
    ///   mapping
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut lines = text.split_inclusive('\n');

        let first = lines.next().ok_or(ParseError::MalformedDocument(
            "document is empty",
        ))?;
        if !is_delimiter(first) {
            return Err(ParseError::MalformedDocument(
                "expected front matter starting with '---'",
            ));
        }

        let block_start = first.len();
        let mut offset = block_start;
        let mut closing = None;
        for line in lines {
            if is_delimiter(line) {
                closing = Some((offset, offset + line.len()));
                break;
            }
            offset += line.len();
        }

        let (block_end, body_start) = closing.ok_or(ParseError::MalformedDocument(
            "front matter is not closed with '---'",
        ))?;

        let front_matter = parse_block(&text[block_start..block_end])?;

        Ok(Self {
            front_matter,
            body: text[body_start..].to_string(),
        })
    }

    /// Serialises the document back to text.
    ///
    /// # Errors
    ///
    /// Returns an error if the front matter cannot be represented as YAML.
    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        let yaml = if self.front_matter.is_empty() {
            String::new()
        } else {
            serde_yaml::to_string(&self.front_matter)?
        };
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{}", self.body))
    }

    /// Looks up a string-valued key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.front_matter.get(key).and_then(Value::as_str)
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\n', '\r']).trim_end() == DELIMITER
}

fn parse_block(block: &str) -> Result<Mapping, ParseError> {
    if block.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(block)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(ParseError::NotAMapping),
    }
}

/// The ways a document can fail to split.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Missing or unclosed front matter.
    #[error("malformed document: {0}")]
    MalformedDocument(&'static str),
    /// The front matter is not valid YAML.
    #[error("invalid front matter: {0}")]
    InvalidStructuredData(#[from] serde_yaml::Error),
    /// The front matter is valid YAML, but not a mapping.
    #[error("invalid front matter: expected a mapping of keys to values")]
    NotAMapping,
}
