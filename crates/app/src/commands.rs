//! Terminal input parsing
//!
//! Anything not starting with `/` is a message. `//` escapes a message that
//! itself starts with a slash.

use shared::Subject;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text to submit
    Say(String),
    Attach(PathBuf),
    /// Submit the pending image without text
    SendImage,
    Subject(Subject),
    /// `None` toggles
    MathOnly(Option<bool>),
    ScienceOnly(Option<bool>),
    Search(String),
    NextMatch,
    PrevMatch,
    /// `None` means the last-session file
    Save(Option<PathBuf>),
    Load(Option<PathBuf>),
    Clear,
    /// `None` lists the quick replies
    Quick(Option<usize>),
    History,
    Help,
    Quit,
    Empty,
}

pub const HELP: &str = "\
Type a message and press Enter to ask TutorBot.
  /attach <path>        attach an image to the next message
  /send                 send the attached image on its own
  /subject <name>       math, science, history, english or general
  /math [on|off]        only answer math questions
  /science [on|off]     only answer science questions
  /search <term>        find messages; /next and /prev to move
  /save [path]          save the session (.json or .txt)
  /load [path]          load a saved session
  /clear                start over with an empty conversation
  /quick [n]            list quick replies, or send number n
  /history              list question/answer pairs
  /help                 show this help
  /quit                 save and exit";

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(Command::Empty);
    }
    if let Some(escaped) = line.strip_prefix("//") {
        return Ok(Command::Say(format!("/{}", escaped)));
    }
    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let arg = (!arg.is_empty()).then_some(arg);

    match (name.to_lowercase().as_str(), arg) {
        ("attach", Some(path)) => Ok(Command::Attach(PathBuf::from(path))),
        ("attach", None) => Err("usage: /attach <path>".into()),
        ("send", _) => Ok(Command::SendImage),
        ("subject", Some(s)) => s.parse().map(Command::Subject),
        ("subject", None) => Err("usage: /subject <math|science|history|english|general>".into()),
        ("math", flag) => parse_switch(flag).map(Command::MathOnly),
        ("science", flag) => parse_switch(flag).map(Command::ScienceOnly),
        ("search", Some(term)) => Ok(Command::Search(term.to_string())),
        ("search", None) => Err("usage: /search <term>".into()),
        ("next", _) => Ok(Command::NextMatch),
        ("prev", _) => Ok(Command::PrevMatch),
        ("save", path) => Ok(Command::Save(path.map(PathBuf::from))),
        ("load", path) => Ok(Command::Load(path.map(PathBuf::from))),
        ("clear", _) => Ok(Command::Clear),
        ("quick", None) => Ok(Command::Quick(None)),
        ("quick", Some(n)) => n
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(|n| Command::Quick(Some(n)))
            .ok_or_else(|| format!("'{}' is not a quick reply number", n)),
        ("history", _) => Ok(Command::History),
        ("help", _) | ("?", _) => Ok(Command::Help),
        ("quit", _) | ("exit", _) => Ok(Command::Quit),
        (other, _) => Err(format!("unknown command '/{}' (try /help)", other)),
    }
}

fn parse_switch(flag: Option<&str>) -> Result<Option<bool>, String> {
    match flag.map(|f| f.to_lowercase()).as_deref() {
        None => Ok(None),
        Some("on") | Some("true") | Some("yes") => Ok(Some(true)),
        Some("off") | Some("false") | Some("no") => Ok(Some(false)),
        Some(other) => Err(format!("expected on or off, got '{}'", other)),
    }
}
