//! The conversation log and search over it.

use shared::{Sender, Turn};

/// Ordered, append-only log of turns. The whole log may be replaced at once,
/// but individual turns are never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The last `n` turns in original order, or the whole log if shorter.
    pub fn recent(&self, n: usize) -> impl DoubleEndedIterator<Item = &Turn> + ExactSizeIterator {
        let start = self.turns.len().saturating_sub(n);
        self.turns[start..].iter()
    }

    /// Indices of turns whose text contains `term`, ignoring case.
    /// An empty term matches nothing.
    pub fn search(&self, term: &str) -> Vec<usize> {
        if term.is_empty() {
            return Vec::new();
        }
        let needle = term.to_lowercase();
        self.turns
            .iter()
            .enumerate()
            .filter(|(_, turn)| turn.text.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect()
    }

    /// Swap in a new log in one step.
    pub fn replace_all(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
    }

    pub fn clear(&mut self) {
        self.replace_all(Vec::new());
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Question/answer pairs: every user turn immediately followed by a bot turn.
    pub fn exchanges(&self) -> Vec<(&Turn, &Turn)> {
        self.turns
            .windows(2)
            .filter(|pair| pair[0].sender == Sender::User && pair[1].sender == Sender::Bot)
            .map(|pair| (&pair[0], &pair[1]))
            .collect()
    }
}

/// Next/previous navigation over one search result, wrapping at both ends.
#[derive(Debug, Clone, Default)]
pub struct SearchCursor {
    term: String,
    matches: Vec<usize>,
    position: Option<usize>,
}

impl SearchCursor {
    pub fn new(log: &ConversationLog, term: &str) -> Self {
        Self {
            term: term.to_string(),
            matches: log.search(term),
            position: None,
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    /// Log index of the match the cursor is on, if it has moved yet.
    pub fn current(&self) -> Option<usize> {
        self.position.map(|p| self.matches[p])
    }

    /// 1-based rank of the current match, for "3 of 7" style display.
    pub fn rank(&self) -> Option<usize> {
        self.position.map(|p| p + 1)
    }

    /// Move to the next match. `None` means there is nothing to find.
    pub fn next_match(&mut self) -> Option<usize> {
        if self.matches.is_empty() {
            return None;
        }
        let len = self.matches.len();
        self.position = Some(match self.position {
            None => 0,
            Some(p) => (p + 1) % len,
        });
        self.current()
    }

    /// Move to the previous match. `None` means there is nothing to find.
    pub fn previous_match(&mut self) -> Option<usize> {
        if self.matches.is_empty() {
            return None;
        }
        let len = self.matches.len();
        self.position = Some(match self.position {
            None => len - 1,
            Some(p) => (p + len - 1) % len,
        });
        self.current()
    }
}
