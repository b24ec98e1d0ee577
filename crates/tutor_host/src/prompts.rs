//! Prompt assembly.
//!
//! A prompt is the recent history rendered as `Sender: text` lines, followed
//! by the subject directive, the optional constraint directives and, when the
//! user typed something, a `User: ...` / `Bot:` completion cue. The output
//! only depends on its inputs, so the same log and filters always produce the
//! same bytes.

use crate::conversation::ConversationLog;
use shared::agent_api::{ImageAttachment, Prompt};
use shared::{ChatError, ModeFilters, Subject};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

pub const PREAMBLE: &str = "You are TutorBot, a friendly and patient tutor.";

pub const MATH_ONLY_DIRECTIVE: &str =
    "Constraint: only answer mathematics questions; politely decline anything else.";

pub const SCIENCE_ONLY_DIRECTIVE: &str =
    "Constraint: only answer science questions; politely decline anything else.";

/// The directive line steering the bot towards a subject
pub fn subject_directive(subject: Subject) -> &'static str {
    match subject {
        Subject::Math => "Subject: Math. Show your working step by step.",
        Subject::Science => "Subject: Science. Explain the underlying concepts in plain words.",
        Subject::History => "Subject: History. Give dates and context for events.",
        Subject::English => "Subject: English. Help with grammar, reading and writing.",
        Subject::General => "Subject: General. Answer clearly and briefly.",
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    history_limit: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl PromptBuilder {
    pub fn new(history_limit: usize) -> Self {
        Self { history_limit }
    }

    /// Assemble the outbound prompt. Fails with [`ChatError::EmptyInput`]
    /// when there is neither text nor an image to send.
    pub fn build(
        &self,
        log: &ConversationLog,
        filters: &ModeFilters,
        pending_text: Option<&str>,
        pending_image: Option<&ImageAttachment>,
    ) -> Result<Prompt, ChatError> {
        if pending_text.is_none() && pending_image.is_none() {
            return Err(ChatError::EmptyInput);
        }

        let mut lines: Vec<String> = vec![PREAMBLE.to_string()];
        for turn in log.recent(self.history_limit) {
            lines.push(format!("{}: {}", turn.sender.label(), turn.text));
        }

        lines.push(subject_directive(filters.subject).to_string());
        // Both constraints may be on at once; they are passed through as-is
        if filters.math_only {
            lines.push(MATH_ONLY_DIRECTIVE.to_string());
        }
        if filters.science_only {
            lines.push(SCIENCE_ONLY_DIRECTIVE.to_string());
        }

        if let Some(text) = pending_text {
            lines.push(format!("User: {}", text));
            lines.push("Bot:".to_string());
        }

        Ok(Prompt {
            text: lines.join("\n"),
            image: pending_image.cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Sender, Turn};

    fn filters(math_only: bool, science_only: bool) -> ModeFilters {
        ModeFilters {
            subject: Subject::Math,
            math_only,
            science_only,
        }
    }

    fn chat(n: usize) -> ConversationLog {
        let mut log = ConversationLog::new();
        for i in 0..n {
            log.append(Turn::with_timestamp(Sender::User, format!("question {}", i), "10:00:00"));
            log.append(Turn::with_timestamp(Sender::Bot, format!("answer {}", i), "10:00:01"));
        }
        log
    }

    #[test]
    fn test_math_only_directive() {
        let prompt = PromptBuilder::default()
            .build(&chat(1), &filters(true, false), Some("hello"), None)
            .unwrap();

        assert!(prompt.text.contains(MATH_ONLY_DIRECTIVE));
        assert!(!prompt.text.contains(SCIENCE_ONLY_DIRECTIVE));
    }

    #[test]
    fn test_both_constraints_are_kept() {
        let prompt = PromptBuilder::default()
            .build(&chat(1), &filters(true, true), Some("hello"), None)
            .unwrap();

        assert!(prompt.text.contains(MATH_ONLY_DIRECTIVE));
        assert!(prompt.text.contains(SCIENCE_ONLY_DIRECTIVE));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let result = PromptBuilder::default().build(&chat(3), &filters(true, true), None, None);
        assert_eq!(result, Err(ChatError::EmptyInput));
    }

    #[test]
    fn test_layout_and_cue() {
        let prompt = PromptBuilder::default()
            .build(&chat(1), &filters(false, false), Some("2+2?"), None)
            .unwrap();

        let expected = [
            PREAMBLE,
            "User: question 0",
            "Bot: answer 0",
            subject_directive(Subject::Math),
            "User: 2+2?",
            "Bot:",
        ]
        .join("\n");
        assert_eq!(prompt.text, expected);
        assert!(prompt.image.is_none());
    }

    #[test]
    fn test_image_only_has_no_cue() {
        let image = ImageAttachment::new(vec![0x89, b'P', b'N', b'G'], "image/png");
        let prompt = PromptBuilder::default()
            .build(&ConversationLog::new(), &ModeFilters::default(), None, Some(&image))
            .unwrap();

        assert!(prompt.text.ends_with(subject_directive(Subject::General)));
        assert!(!prompt.text.contains("User:"));
        assert_eq!(prompt.image, Some(image));
    }

    #[test]
    fn test_history_is_bounded() {
        let prompt = PromptBuilder::new(4)
            .build(&chat(5), &filters(false, false), Some("next"), None)
            .unwrap();

        assert!(!prompt.text.contains("question 2"));
        assert!(prompt.text.contains("question 3"));
        assert!(prompt.text.contains("answer 4"));
        let question_3 = prompt.text.find("question 3").unwrap();
        let answer_4 = prompt.text.find("answer 4").unwrap();
        assert!(question_3 < answer_4);
    }

    #[test]
    fn test_output_is_deterministic() {
        let builder = PromptBuilder::default();
        let log = chat(3);
        let a = builder.build(&log, &filters(true, false), Some("again"), None).unwrap();
        let b = builder.build(&log, &filters(true, false), Some("again"), None).unwrap();
        assert_eq!(a.text.as_bytes(), b.text.as_bytes());
    }
}
