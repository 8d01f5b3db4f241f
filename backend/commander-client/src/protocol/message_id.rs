use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation id tying a command to its progress and terminal responses.
///
/// A plain id is a UUIDv4 string. When a command is caused by earlier ones, the
/// id is the parents' chain with one fresh UUID appended, and travels on the
/// wire as an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Single(String),
    Chain(Vec<String>),
}

impl MessageId {
    /// Generate a fresh id, appended to `parents` when given.
    pub fn generate(parents: Option<&[String]>) -> Self {
        let fresh = Uuid::new_v4().to_string();
        match parents {
            Some(parents) => {
                let mut chain = Vec::with_capacity(parents.len() + 1);
                chain.extend_from_slice(parents);
                chain.push(fresh);
                MessageId::Chain(chain)
            }
            None => MessageId::Single(fresh),
        }
    }

    /// The id generated for this command, without its ancestry.
    pub fn leaf(&self) -> &str {
        match self {
            MessageId::Single(id) => id,
            MessageId::Chain(chain) => chain.last().map(String::as_str).unwrap_or_default(),
        }
    }

    /// Ids of the commands this one descends from, oldest first.
    pub fn parents(&self) -> &[String] {
        match self {
            MessageId::Single(_) => &[],
            MessageId::Chain(chain) => chain.split_last().map(|(_, rest)| rest).unwrap_or(&[]),
        }
    }
}

impl Display for MessageId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            MessageId::Single(id) => formatter.write_str(id),
            MessageId::Chain(chain) => formatter.write_str(&chain.join("/")),
        }
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId::Single(id.to_string())
    }
}
