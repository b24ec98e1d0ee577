//! Session persistence
//!
//! A session is saved either as a JSON document (`{filters, turns}`) or as a
//! plain transcript with one `[HH:MM:SS] Sender: text` line per turn. The
//! encoding is picked from the file extension on both save and load.
//! Any bracketed timestamp is accepted in a transcript, as long as it has no
//! `]` in it.
//!
//! Loading is best-effort: a JSON record that does not decode is skipped and
//! reported, and a transcript line that does not have the expected shape is
//! kept as an `Unknown` turn carrying the whole line. Saving goes through a
//! temp file in the target directory that is renamed over the target, so a
//! reader never sees a half-written session.

use regex::Regex;
use serde_json::Value;
use shared::{MalformedRecord, ModeFilters, PersistenceError, Sender, SessionState, Turn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

static TRANSCRIPT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[([^\]]*)\] ([A-Za-z]+): (.*)$").expect("transcript pattern is valid")
});

/// On-disk encoding of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionFormat {
    /// JSON document with filters and an ordered array of turn records
    Structured,
    /// One `[HH:MM:SS] Sender: text` line per turn
    Lines,
}

impl SessionFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("txt") | Some("log") => SessionFormat::Lines,
            _ => SessionFormat::Structured,
        }
    }
}

/// Result of a best-effort load
#[derive(Debug, Clone, Default)]
pub struct LoadedSession {
    pub turns: Vec<Turn>,
    /// `None` when the encoding does not carry filters
    pub filters: Option<ModeFilters>,
    pub skipped: Vec<MalformedRecord>,
}

impl LoadedSession {
    /// Build a full session state, keeping `current` filters if none were stored.
    pub fn into_state(self, current: ModeFilters) -> SessionState {
        SessionState {
            filters: self.filters.unwrap_or(current),
            turns: self.turns,
        }
    }
}

/// Read a session from `path`, choosing the decoder by extension.
pub fn load(path: &Path) -> Result<LoadedSession, PersistenceError> {
    let content = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
    let loaded = match SessionFormat::from_path(path) {
        SessionFormat::Structured => decode_structured(path, &content)?,
        SessionFormat::Lines => decode_lines(&content),
    };
    info!(
        path = %path.display(),
        turns = loaded.turns.len(),
        skipped = loaded.skipped.len(),
        "Loaded session"
    );
    Ok(loaded)
}

/// Write `state` to `path` atomically, choosing the encoder by extension.
pub fn save(path: &Path, state: &SessionState) -> Result<(), PersistenceError> {
    let body = match SessionFormat::from_path(path) {
        SessionFormat::Structured => serde_json::to_string_pretty(state)?,
        SessionFormat::Lines => encode_lines(&state.turns),
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| write_error(&dir, e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| write_error(&dir, e))?;
    tmp.write_all(body.as_bytes())
        .map_err(|e| write_error(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| write_error(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| write_error(path, e.error))?;

    info!(path = %path.display(), turns = state.turns.len(), "Saved session");
    Ok(())
}

fn write_error(path: &Path, source: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn decode_structured(path: &Path, content: &str) -> Result<LoadedSession, PersistenceError> {
    let json_error = |source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    };
    let doc: Value = serde_json::from_str(content).map_err(json_error)?;

    // Accept both the full document and a bare array of turn records
    let (records, filters) = match doc {
        Value::Object(mut map) => {
            let filters = match map.remove("filters") {
                Some(raw) => match serde_json::from_value::<ModeFilters>(raw) {
                    Ok(filters) => Some(filters),
                    Err(e) => {
                        warn!(error = %e, "Ignoring unreadable filters in session file");
                        None
                    }
                },
                None => None,
            };
            let turns = map.remove("turns").unwrap_or(Value::Null);
            let records = serde_json::from_value::<Vec<Value>>(turns).map_err(json_error)?;
            (records, filters)
        }
        other => (
            serde_json::from_value::<Vec<Value>>(other).map_err(json_error)?,
            None,
        ),
    };

    let mut turns = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Turn>(record) {
            Ok(turn) => turns.push(turn),
            Err(e) => {
                let malformed = MalformedRecord {
                    index,
                    reason: e.to_string(),
                };
                warn!("{}", malformed);
                skipped.push(malformed);
            }
        }
    }

    Ok(LoadedSession {
        turns,
        filters,
        skipped,
    })
}

fn decode_lines(content: &str) -> LoadedSession {
    let turns = content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(decode_line)
        .collect();

    LoadedSession {
        turns,
        filters: None,
        skipped: Vec::new(),
    }
}

fn decode_line(line: &str) -> Turn {
    if let Some(caps) = TRANSCRIPT_LINE.captures(line) {
        if let Some(sender) = parse_sender(&caps[2]) {
            return Turn::with_timestamp(sender, unescape(&caps[3]), &caps[1]);
        }
    }
    debug!(line, "Keeping unrecognized transcript line as text");
    Turn::with_timestamp(Sender::Unknown, line, "")
}

/// Sender labels, including the names older transcripts were written with.
fn parse_sender(label: &str) -> Option<Sender> {
    Sender::from_label(label).or(match label {
        "You" => Some(Sender::User),
        "TutorBot" => Some(Sender::Bot),
        _ => None,
    })
}

fn encode_lines(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            turn.timestamp,
            turn.sender.label(),
            escape(&turn.text)
        ));
    }
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

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
            Some('r') => out.push('\r'),
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

/// Location of the automatically kept last session
pub struct SessionStore {
    last_session_path: PathBuf,
}

impl SessionStore {
    pub fn new(last_session_path: PathBuf) -> Self {
        Self { last_session_path }
    }

    pub fn default_location() -> PathBuf {
        directories::ProjectDirs::from("com.local", "TutorBot", "TutorBot")
            .map(|p| p.data_dir().join("last_session.json"))
            .unwrap_or_else(|| PathBuf::from("./last_session.json"))
    }

    pub fn last_session_path(&self) -> &Path {
        &self.last_session_path
    }

    /// Restore the previous session, or `None` if there has never been one.
    pub fn load_last(&self) -> Result<Option<LoadedSession>, PersistenceError> {
        match load(&self.last_session_path) {
            Ok(loaded) => Ok(Some(loaded)),
            Err(PersistenceError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save_last(&self, state: &SessionState) -> Result<(), PersistenceError> {
        save(&self.last_session_path, state)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Self::default_location())
    }
}
