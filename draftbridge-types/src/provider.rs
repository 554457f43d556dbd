//! External document-editing providers a document can be mirrored to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The external providers Draftbridge can mirror a document into.
///
/// A document may be mirrored to several providers, but at most once to
/// each one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Online word processor (heading-delimited section documents).
    Word,
    /// Online slide-deck editor (one named section per slide).
    Slides,
    /// Online spreadsheet editor (sparse cell maps).
    Sheets,
}

impl Provider {
    /// All known providers, in a stable order.
    pub const ALL: [Provider; 3] = [Provider::Word, Provider::Slides, Provider::Sheets];

    /// Returns the stable string form used in persistence and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Provider::Word => "word",
            Provider::Slides => "slides",
            Provider::Sheets => "sheets",
        }
    }

    /// Returns a human-readable provider name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Provider::Word => "Word Online",
            Provider::Slides => "Slide Deck Online",
            Provider::Sheets => "Sheets Online",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "word" => Ok(Provider::Word),
            "slides" => Ok(Provider::Slides),
            "sheets" => Ok(Provider::Sheets),
            other => Err(crate::Error::UnknownProvider(other.to_string())),
        }
    }
}
