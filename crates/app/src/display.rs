use shared::{Sender, Turn};
use tutor_host::{ConversationLog, SearchCursor};

pub const BOT_NAME: &str = "TutorBot";

/// One transcript line for a turn, using the profile name for the user.
pub fn format_turn(turn: &Turn, user_name: &str) -> String {
    let who = match turn.sender {
        Sender::User => user_name,
        Sender::Bot => BOT_NAME,
        Sender::System => "System",
        Sender::Unknown => "?",
    };
    let stamp = if turn.timestamp.is_empty() {
        String::new()
    } else {
        format!("[{}] ", turn.timestamp)
    };
    let image = if turn.has_image && turn.text != tutor_host::IMAGE_PLACEHOLDER {
        " [image]"
    } else {
        ""
    };
    format!("{}{}: {}{}", stamp, who, turn.text, image)
}

pub fn format_log(log: &ConversationLog, user_name: &str) -> String {
    log.turns()
        .iter()
        .map(|turn| format_turn(turn, user_name))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Status line for the match the cursor just moved to.
pub fn format_match(cursor: &SearchCursor, log: &ConversationLog, user_name: &str) -> String {
    match (cursor.current(), cursor.rank()) {
        (Some(index), Some(rank)) => {
            let line = log
                .get(index)
                .map(|turn| format_turn(turn, user_name))
                .unwrap_or_default();
            format!("match {} of {}: {}", rank, cursor.matches().len(), line)
        }
        _ => format!("'{}' not found", cursor.term()),
    }
}
