//! Services - durable storage for chat sessions

pub mod session_store;

pub use session_store::{load, save, LoadedSession, SessionFormat, SessionStore};
