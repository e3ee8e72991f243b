//! Application wiring: startup sequence and the interactive command loop.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::io::{AsyncBufRead, Lines};
use tracing::{info, warn};

use crate::api::{ChoreApi, HttpApi};
use crate::commands::{Command, HELP, is_affirmative};
use crate::config::ClientConfig;
use crate::error::{Error, PushError, SessionError};
use crate::model::User;
use crate::push::{PushHandle, PushListener, push_url};
use crate::render::Renderer;
use crate::sync::Synchronizer;

/// What the command loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The chore board client.
pub struct App {
    config: ClientConfig,
    api: Arc<HttpApi>,
    sync: Arc<Synchronizer>,
    renderer: Arc<dyn Renderer>,
}

impl App {
    pub fn new(config: ClientConfig, renderer: Arc<dyn Renderer>) -> Result<Self, Error> {
        let api = Arc::new(HttpApi::new(&config.origin, config.connect_timeout)?);
        let sync = Synchronizer::new(api.clone(), renderer.clone());
        Ok(Self {
            config,
            api,
            sync,
            renderer,
        })
    }

    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.sync
    }

    pub fn base_url(&self) -> String {
        self.api.base_url()
    }

    /// Ask the backend for its public address and use it from now on.
    ///
    /// On failure the configured origin stays in use and the user is alerted.
    pub async fn resolve_base_url(&self) {
        let resolved = match self.api.resolve_base_url().await {
            Ok(url) => self.api.set_base_url(&url).map(|_| url),
            Err(e) => Err(e),
        };
        match resolved {
            Ok(url) => info!(base_url = %url, "Backend address resolved"),
            Err(e) => {
                warn!(error = %e, origin = %self.config.origin, "Could not resolve backend address");
                self.renderer
                    .alert("Failed to initialize the application. Please try again.");
            }
        }
    }

    pub async fn login(&self, name: &str, password: &SecretString) -> Result<User, Error> {
        match self.sync.login(name, password).await {
            Ok(user) => Ok(user),
            Err(e) => {
                warn!(user = name, error = %e, "Login failed");
                Err(SessionError::Rejected {
                    name: name.to_string(),
                }
                .into())
            }
        }
    }

    /// Connect the push channel, if enabled.
    pub fn start_push(&self) -> Result<Option<PushHandle>, PushError> {
        if !self.config.push_enabled {
            info!("Push channel disabled");
            return Ok(None);
        }
        let url = push_url(&self.api.base_url(), &self.config.push_path)?;
        let listener = PushListener::new(
            url,
            Arc::clone(&self.sync),
            self.config.push_initial_backoff,
            self.config.push_max_backoff,
        );
        Ok(Some(listener.spawn()))
    }

    /// Run one command.
    pub async fn execute(&self, command: Command) -> Flow {
        if command.requires_admin() && !self.sync.is_admin().await {
            let err = SessionError::AdminRequired {
                action: command.name().to_string(),
            };
            self.renderer.alert(&err.to_string());
            return Flow::Continue;
        }

        // Failures are already alerted and logged by the synchronizer.
        match command {
            Command::Show => match self.sync.views().await {
                Some(views) => self.renderer.render(&views),
                None => self.sync.resync().await,
            },
            Command::Refresh => self.sync.resync().await,
            Command::AddCleaner { name } => {
                let _ = self.sync.add_cleaner(&name).await;
            }
            Command::RemoveCleaner { id, .. } => {
                let _ = self.sync.remove_cleaner(id).await;
            }
            Command::AddTask {
                cleaner_id,
                day,
                description,
            } => {
                let _ = self.sync.add_task(cleaner_id, day, &description).await;
            }
            Command::RemoveTask { id, .. } => {
                let _ = self.sync.remove_task(id).await;
            }
            Command::SetCompleted { id, completed } => {
                let _ = self.sync.set_task_completed(id, completed).await;
            }
            Command::Qr => println!("{}", self.api.qr_code_url()),
            Command::Help => println!("{HELP}"),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Read commands until `quit` or end of input.
    pub async fn run<R>(&self, lines: &mut Lines<R>) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        eprint!("> ");
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                eprint!("> ");
                continue;
            }

            match Command::parse(&line) {
                Ok(command) => {
                    if let Some(question) = command.confirmation_prompt() {
                        eprint!("{question} [y/N] ");
                        let answer = lines.next_line().await?.unwrap_or_default();
                        if !is_affirmative(&answer) {
                            eprintln!("Cancelled.");
                            eprint!("> ");
                            continue;
                        }
                    }
                    if self.execute(command).await == Flow::Quit {
                        break;
                    }
                }
                Err(usage) => eprintln!("{usage}"),
            }
            eprint!("> ");
        }
        Ok(())
    }
}

/// Print `label` and read one line of input.
pub async fn prompt<R>(lines: &mut Lines<R>, label: &str) -> anyhow::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    eprint!("{label}: ");
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow::anyhow!("input closed while waiting for {label}"))?;
    Ok(line.trim().to_string())
}
