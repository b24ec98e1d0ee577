pub mod error;
pub mod turn;

pub use error::{ChatError, MalformedRecord, PersistenceError};
pub use turn::{ModeFilters, Sender, SessionState, Subject, Turn};

pub mod settings {
    use serde::{Deserialize, Serialize};

    fn default_true() -> bool {
        true
    }

    fn default_history_limit() -> usize {
        10
    }

    fn default_quick_replies() -> Vec<String> {
        vec![
            "Can you explain that step by step?".into(),
            "Give me a practice problem.".into(),
            "Summarize what we covered so far.".into(),
        ]
    }

    #[derive(Debug, Clone, Serialize, Deserialize, Default)]
    pub struct ProviderAuth {
        pub api_key: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ModelProvider {
        pub provider_preference: Vec<String>, // e.g., ["gemini", "local"]
        pub gemini_model: String,             // e.g., "gemini-1.5-flash"
        pub local_model: String,              // e.g., "llava" for Ollama
        pub gemini_auth: ProviderAuth,
    }

    impl Default for ModelProvider {
        fn default() -> Self {
            Self {
                provider_preference: vec!["gemini".into(), "local".into()],
                gemini_model: "gemini-1.5-flash".into(),
                local_model: "llava".into(),
                gemini_auth: ProviderAuth::default(),
            }
        }
    }

    /// User profile for personalization
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserProfile {
        pub name: String,
    }

    impl Default for UserProfile {
        fn default() -> Self {
            Self {
                name: "Guest".into(),
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AppSettings {
        #[serde(default)]
        pub user_profile: UserProfile,
        #[serde(default)]
        pub model: ModelProvider,
        /// How many past turns are replayed into each prompt
        #[serde(default = "default_history_limit")]
        pub history_limit: usize,
        /// Fixed pause before each request, in milliseconds
        #[serde(default)]
        pub response_delay_ms: u64,
        /// Save the last session after every completed turn
        #[serde(default = "default_true")]
        pub auto_save: bool,
        /// Ring the terminal bell when a response arrives
        #[serde(default)]
        pub notify_on_response: bool,
        #[serde(default = "default_quick_replies")]
        pub quick_replies: Vec<String>,
    }

    impl Default for AppSettings {
        fn default() -> Self {
            Self {
                user_profile: UserProfile::default(),
                model: ModelProvider::default(),
                history_limit: default_history_limit(),
                response_delay_ms: 0,
                auto_save: true,
                notify_on_response: false,
                quick_replies: default_quick_replies(),
            }
        }
    }
}

pub mod agent_api {
    /// Raw image bytes plus the mime type the provider should be told about.
    #[derive(Clone, PartialEq, Eq)]
    pub struct ImageAttachment {
        pub bytes: Vec<u8>,
        pub mime_type: String,
    }

    impl ImageAttachment {
        pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
            Self {
                bytes,
                mime_type: mime_type.into(),
            }
        }
    }

    impl std::fmt::Debug for ImageAttachment {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ImageAttachment")
                .field("mime_type", &self.mime_type)
                .field("len", &self.bytes.len())
                .finish()
        }
    }

    /// The single payload sent to a response client per request cycle.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Prompt {
        pub text: String,
        pub image: Option<ImageAttachment>,
    }
}

#[cfg(test)]
mod tests {
    use super::settings::AppSettings;

    #[test]
    fn test_partial_settings_take_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"user_profile": {"name": "Ada"}, "history_limit": 4}"#)
                .unwrap();

        assert_eq!(settings.user_profile.name, "Ada");
        assert_eq!(settings.history_limit, 4);
        assert!(settings.auto_save);
        assert_eq!(settings.model.provider_preference, vec!["gemini", "local"]);
        assert_eq!(settings.quick_replies.len(), 3);
    }
}
