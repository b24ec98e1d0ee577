//! Conversation data model shared by the controller, the prompt builder and
//! the session store.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp layout used for every turn, both in memory and on disk.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Who produced a turn
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Hash)]
pub enum Sender {
    User,
    Bot,
    System,
    /// Recovered from a line that could not be attributed to anyone
    Unknown,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Bot => "Bot",
            Sender::System => "System",
            Sender::Unknown => "Unknown",
        }
    }

    /// Parse a sender label as written by [`Sender::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "User" => Some(Sender::User),
            "Bot" => Some(Sender::Bot),
            "System" => Some(Sender::System),
            "Unknown" => Some(Sender::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One message in the conversation log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub sender: Sender,
    pub text: String,
    #[serde(rename = "time")]
    pub timestamp: String,
    #[serde(default)]
    pub has_image: bool,
}

impl Turn {
    /// Create a turn stamped with the current local wall-clock time.
    pub fn now(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: Local::now().format(TIME_FORMAT).to_string(),
            has_image: false,
        }
    }

    pub fn with_timestamp(sender: Sender, text: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: timestamp.into(),
            has_image: false,
        }
    }

    pub fn with_image(mut self, has_image: bool) -> Self {
        self.has_image = has_image;
        self
    }
}

/// Tutoring subject the bot is steered towards
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Hash, Default)]
pub enum Subject {
    Math,
    Science,
    History,
    English,
    #[default]
    General,
}

impl Subject {
    pub const ALL: [Subject; 5] = [
        Subject::Math,
        Subject::Science,
        Subject::History,
        Subject::English,
        Subject::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Science => "science",
            Subject::History => "history",
            Subject::English => "english",
            Subject::General => "general",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Math => "Math",
            Subject::Science => "Science",
            Subject::History => "History",
            Subject::English => "English",
            Subject::General => "General",
        }
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Subject::ALL
            .into_iter()
            .find(|subject| subject.as_str() == wanted)
            .ok_or_else(|| format!("unknown subject '{}'", s.trim()))
    }
}

/// Subject and constraint toggles chosen by the user
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct ModeFilters {
    pub subject: Subject,
    #[serde(default)]
    pub math_only: bool,
    #[serde(default)]
    pub science_only: bool,
}

/// Everything persisted for one session
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub filters: ModeFilters,
    pub turns: Vec<Turn>,
}
