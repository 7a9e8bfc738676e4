use std::fmt::{self, Display};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    static ref TOPIC_NAME_REGEX: Regex = Regex::new(r"^[a-zA-Z-]+$").unwrap();
}

/// The maximum length of a topic name
pub const MAX_TOPIC_NAME_LENGTH: usize = 50;

/// A validated room identifier.
/// Only letters and hyphens, between 1 and 50 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicName(String);

/// Why a topic name was rejected.
/// The messages match the room creation form of the web client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("Name must be between 1 and 50 chars")]
    InvalidLength,
    #[error("Only letters and hyphens allowed in name")]
    InvalidCharacters,
}

impl TopicName {
    pub fn new(name: &str) -> Result<Self, TopicError> {
        if name.is_empty() || name.chars().count() > MAX_TOPIC_NAME_LENGTH {
            return Err(TopicError::InvalidLength);
        }

        if !TOPIC_NAME_REGEX.is_match(name) {
            return Err(TopicError::InvalidCharacters);
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for TopicName {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TopicName {
    type Error = TopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TopicName> for String {
    fn from(value: TopicName) -> Self {
        value.0
    }
}
