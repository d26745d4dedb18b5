//! Member identity for lanchat.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::messages::{SEPARATOR, SYSTEM_TAG, UNKNOWN_SENDER};
use crate::NameError;

/// The display name identifying a member of the chat group.
///
/// Equality is exact string comparison, with no normalization. Construction
/// rejects only the names that would not survive the wire format: empty
/// names, names with surrounding whitespace, names containing a newline or
/// the `": "` separator, and the reserved `SYSTEM` tag.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberName(String);

impl MemberName {
    /// Validate and wrap a display name.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.trim() != name {
            return Err(NameError::SurroundingWhitespace(name));
        }
        if name.contains('\n') {
            return Err(NameError::ContainsNewline(name));
        }
        if name.contains(SEPARATOR) {
            return Err(NameError::ContainsSeparator(name));
        }
        if name == SYSTEM_TAG {
            return Err(NameError::Reserved(name));
        }
        Ok(Self(name))
    }

    /// The pseudo-sender used for datagrams that carry no usable tag.
    pub fn unknown() -> Self {
        Self(UNKNOWN_SENDER.to_string())
    }

    /// Borrow the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MemberName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for MemberName {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MemberName> for String {
    fn from(name: MemberName) -> Self {
        name.0
    }
}

impl AsRef<str> for MemberName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for MemberName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MemberName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberName({:?})", self.0)
    }
}
