use anyhow::Result;
use providers::ProviderRouter;
use services::SessionStore;
use shared::settings::AppSettings;
use shared::ChatError;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tutor_host::{PromptBuilder, SearchCursor, TurnController, TurnEvent};

mod attachments;
mod commands;
mod config;
mod display;
mod observers;

use commands::Command;
use observers::{AutoSave, Bell};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct App {
    controller: TurnController,
    settings: AppSettings,
    store: SessionStore,
    cursor: Option<SearchCursor>,
}

impl App {
    fn new(settings: AppSettings, store: SessionStore) -> Self {
        let router = ProviderRouter::new(settings.model.clone());
        info!(
            provider = router.active_provider().unwrap_or("none"),
            history_limit = settings.history_limit,
            "TutorBot started"
        );

        let mut controller =
            TurnController::new(Arc::new(router), PromptBuilder::new(settings.history_limit))
                .with_response_delay(Duration::from_millis(settings.response_delay_ms));
        if settings.auto_save {
            let path = store.last_session_path().to_path_buf();
            controller.add_observer(Box::new(AutoSave::new(SessionStore::new(path))));
        }
        if settings.notify_on_response {
            controller.add_observer(Box::new(Bell));
        }

        Self {
            controller,
            settings,
            store,
            cursor: None,
        }
    }

    fn user_name(&self) -> &str {
        &self.settings.user_profile.name
    }

    /// Startup hook: bring back the previous session if there is one.
    fn restore_last_session(&mut self) {
        match self.store.load_last() {
            Ok(Some(loaded)) => {
                let skipped = loaded.skipped.len();
                let state = loaded.into_state(*self.controller.filters());
                if self.controller.restore(state).is_ok() && skipped > 0 {
                    println!("(skipped {} unreadable messages from last session)", skipped);
                }
            }
            Ok(None) => info!("No previous session"),
            Err(e) => warn!(error = %e, "Could not restore last session"),
        }
    }

    /// Shutdown hook: always try to keep the session, never fail on it.
    fn save_last_session(&self) {
        if let Err(e) = self.store.save_last(&self.controller.snapshot()) {
            warn!(error = %e, "Could not save session on exit");
        }
    }

    fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Empty => {}
            Command::Say(text) => self.submit(Some(&text)),
            Command::SendImage => self.submit(None),
            Command::Attach(path) => match attachments::load_image(&path) {
                Ok(image) => {
                    println!("Attached {} ({} bytes)", path.display(), image.bytes.len());
                    self.controller.attach(image);
                }
                Err(e) => println!("Could not attach image: {:#}", e),
            },
            Command::Subject(subject) => {
                self.controller.set_subject(subject);
                self.print_filters();
            }
            Command::MathOnly(flag) => {
                let on = flag.unwrap_or(!self.controller.filters().math_only);
                self.controller.set_math_only(on);
                self.print_filters();
            }
            Command::ScienceOnly(flag) => {
                let on = flag.unwrap_or(!self.controller.filters().science_only);
                self.controller.set_science_only(on);
                self.print_filters();
            }
            Command::Search(term) => {
                let mut cursor = SearchCursor::new(self.controller.log(), &term);
                cursor.next_match();
                println!("{}", display::format_match(&cursor, self.controller.log(), self.user_name()));
                self.cursor = Some(cursor);
            }
            Command::NextMatch | Command::PrevMatch => {
                let Some(cursor) = self.cursor.as_mut() else {
                    println!("No search yet. Use /search <term>");
                    return Flow::Continue;
                };
                if command == Command::NextMatch {
                    cursor.next_match();
                } else {
                    cursor.previous_match();
                }
                let line = display::format_match(
                    cursor,
                    self.controller.log(),
                    &self.settings.user_profile.name,
                );
                println!("{}", line);
            }
            Command::Save(path) => {
                let path = path.unwrap_or_else(|| self.store.last_session_path().to_path_buf());
                self.save_to(&path);
            }
            Command::Load(path) => {
                let path = path.unwrap_or_else(|| self.store.last_session_path().to_path_buf());
                self.load_from(&path);
            }
            Command::Clear => match self.controller.clear() {
                Ok(()) => {
                    self.cursor = None;
                    println!("Conversation cleared.");
                }
                Err(e) => println!("{}", e),
            },
            Command::Quick(None) => {
                for (i, reply) in self.settings.quick_replies.iter().enumerate() {
                    println!("  {}. {}", i + 1, reply);
                }
            }
            Command::Quick(Some(n)) => match self.settings.quick_replies.get(n - 1).cloned() {
                Some(reply) => {
                    println!("> {}", reply);
                    self.submit(Some(&reply));
                }
                None => println!("There is no quick reply {}", n),
            },
            Command::History => {
                let exchanges = self.controller.log().exchanges();
                if exchanges.is_empty() {
                    println!("No questions answered yet.");
                }
                for (i, (question, answer)) in exchanges.iter().enumerate() {
                    println!("{}. Q: {}", i + 1, preview(&question.text));
                    println!("   A: {}", preview(&answer.text));
                }
            }
            Command::Help => println!("{}", commands::HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn submit(&mut self, text: Option<&str>) {
        match self.controller.submit(text, None) {
            Ok(()) => self.await_reply(),
            // Both rejections are no-ops; just say why
            Err(e @ (ChatError::EmptyInput | ChatError::Busy)) => println!("{}", e),
        }
    }

    /// Poll the controller until the reply is in, showing progress meanwhile.
    fn await_reply(&mut self) {
        let mut out = io::stdout();
        let _ = write!(out, "{} is thinking", display::BOT_NAME);
        let _ = out.flush();
        let event = loop {
            if let Some(event) = self.controller.poll() {
                break event;
            }
            let _ = write!(out, ".");
            let _ = out.flush();
            thread::sleep(POLL_INTERVAL);
        };
        println!();

        if let Some(turn) = self.controller.log().turns().last() {
            println!("{}", display::format_turn(turn, self.user_name()));
        }
        if let TurnEvent::Failed { error } = event {
            info!(%error, "Reply replaced with error message");
        }
    }

    fn save_to(&self, path: &Path) {
        let path = attachments::expand_user_path(path);
        match services::save(&path, &self.controller.snapshot()) {
            Ok(()) => println!("Saved {} messages to {}", self.controller.log().len(), path.display()),
            Err(e) => println!("Save failed: {}", e),
        }
    }

    fn load_from(&mut self, path: &Path) {
        let path = attachments::expand_user_path(path);
        let loaded = match services::load(&path) {
            Ok(loaded) => loaded,
            Err(e) => {
                println!("Load failed: {}", e);
                return;
            }
        };
        let skipped = loaded.skipped.len();
        let state = loaded.into_state(*self.controller.filters());
        match self.controller.restore(state) {
            Ok(()) => {
                self.cursor = None;
                println!("{}", display::format_log(self.controller.log(), self.user_name()));
                println!("Loaded {} messages from {}", self.controller.log().len(), path.display());
                if skipped > 0 {
                    println!("(skipped {} unreadable records)", skipped);
                }
            }
            Err(e) => println!("{}", e),
        }
    }

    fn print_filters(&self) {
        let filters = self.controller.filters();
        let mut line = format!("Subject: {}", filters.subject.display_name());
        if filters.math_only {
            line.push_str(" | math only");
        }
        if filters.science_only {
            line.push_str(" | science only");
        }
        println!("{}", line);
    }
}

fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > 70 {
        format!("{}...", first_line.chars().take(70).collect::<String>())
    } else {
        first_line.to_string()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let (settings, fresh) = config::load_settings_or_default();
    if fresh {
        config::save_settings(&settings);
    }

    let mut app = App::new(settings, SessionStore::default());
    app.restore_last_session();

    println!("TutorBot - Powered by Gemini. Type /help for commands.");
    if !app.controller.log().is_empty() {
        println!("{}\n", display::format_log(app.controller.log(), app.user_name()));
    }
    app.print_filters();

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        match commands::parse(&line) {
            Ok(command) => {
                if app.handle(command) == Flow::Quit {
                    break;
                }
            }
            Err(msg) => println!("{}", msg),
        }
    }

    app.save_last_session();
    info!("TutorBot stopped");
    Ok(())
}
