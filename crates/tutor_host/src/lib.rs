//! Tutor Host - conversation management for TutorBot
//!
//! This crate holds the toolkit-independent core:
//! - The conversation log with search and wraparound navigation
//! - Prompt assembly from history, subject and constraint filters
//! - The turn controller that runs one request at a time off the caller's thread

pub mod controller;
pub mod conversation;
pub mod error_messages;
pub mod prompts;

pub use controller::{ControllerState, TurnController, TurnEvent, TurnObserver, IMAGE_PLACEHOLDER};
pub use conversation::{ConversationLog, SearchCursor};
pub use error_messages::describe_request_error;
pub use prompts::{PromptBuilder, DEFAULT_HISTORY_LIMIT};
