//! Command registry and the state handed to every handler.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::config::{Config, ConfigStore};
use crate::db::{Database, User};
use crate::error::{GatorError, Result};

/// A parsed invocation: `gator <name> [args...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Build a command from argv with the program name already stripped.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut args = args.into_iter();
        let name = args
            .next()
            .ok_or_else(|| GatorError::Usage("not enough arguments provided".to_string()))?;
        Ok(Self {
            name,
            args: args.collect(),
        })
    }

    /// The argument at `index`, or a usage error quoting `usage`.
    pub fn arg(&self, index: usize, usage: &str) -> Result<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| GatorError::Usage(usage.to_string()))
    }
}

/// Per-invocation session: the store plus the config loaded at startup.
pub struct State {
    pub db: Database,
    pub config: Config,
    pub config_store: ConfigStore,
}

impl State {
    pub fn new(db: Database, config: Config, config_store: ConfigStore) -> Self {
        Self {
            db,
            config,
            config_store,
        }
    }

    /// Resolve the configured current user against the store.
    pub async fn current_user(&self) -> Result<User> {
        let name = self.config.current_user().ok_or(GatorError::NotLoggedIn)?;
        self.db
            .get_user_by_name(name)
            .await?
            .ok_or_else(|| GatorError::UserNotFound(name.to_string()))
    }
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

pub type Handler =
    Box<dyn for<'a> Fn(&'a mut State, &'a Command) -> HandlerFuture<'a> + Send + Sync>;

/// Box a closure as a [`Handler`], fixing its signature.
pub fn boxed<F>(handler: F) -> Handler
where
    F: for<'a> Fn(&'a mut State, &'a Command) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    Box::new(handler)
}

#[derive(Default)]
pub struct Commands {
    registered: HashMap<String, Handler>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut State, &'a Command) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.registered.insert(name.to_string(), boxed(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registered.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    pub async fn run(&self, state: &mut State, command: &Command) -> Result<()> {
        let handler = self
            .registered
            .get(&command.name)
            .ok_or_else(|| GatorError::UnknownCommand(command.name.clone()))?;

        debug!("Running command '{}' with {:?}", command.name, command.args);
        handler(state, command)
            .await
            .map_err(|source| GatorError::Command {
                name: command.name.clone(),
                source: Box::new(source),
            })
    }
}

/// Fresh in-memory store and a config file in a temp dir nobody is logged into.
#[cfg(test)]
pub(crate) async fn test_state() -> (State, tempfile::TempDir) {
    let db = Database::new("sqlite::memory:").await.unwrap();
    db.initialize().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path().join(".gatorconfig.json"));
    let config = Config {
        db_url: "sqlite::memory:".to_string(),
        current_user_name: String::new(),
    };
    store.write(&config).unwrap();
    (State::new(db, config, store), dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn noop(_: &mut State, _: &Command) -> Result<()> {
        Ok(())
    }

    async fn fail(_: &mut State, _: &Command) -> Result<()> {
        Err(GatorError::Usage("failed handler".to_string()))
    }

    mod command_tests {
        use super::*;

        #[test]
        fn test_from_args() {
            let cmd = Command::from_args(vec!["addfeed".to_string(), "Blog".to_string()]).unwrap();
            assert_eq!(cmd.name, "addfeed");
            assert_eq!(cmd.args, vec!["Blog".to_string()]);
        }

        #[test]
        fn test_from_empty_args() {
            let result = Command::from_args(Vec::<String>::new());
            assert!(matches!(result, Err(GatorError::Usage(_))));
        }

        #[test]
        fn test_missing_arg_is_usage_error() {
            let cmd = Command::new("login", vec![]);
            let err = cmd.arg(0, "login <name>").unwrap_err();
            assert_eq!(err.to_string(), "usage: login <name>");
        }
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn test_register_commands() {
            let mut commands = Commands::new();
            assert!(commands.is_empty());

            commands.register("test", |s, c| Box::pin(noop(s, c)));
            commands.register("test_2", |s, c| Box::pin(noop(s, c)));

            assert_eq!(commands.len(), 2);
            assert!(commands.contains("test"));
        }

        #[tokio::test]
        async fn test_last_registration_wins() {
            let calls = Arc::new(AtomicUsize::new(0));
            let mut commands = Commands::new();

            commands.register("dup", |s, c| Box::pin(fail(s, c)));
            let counter = calls.clone();
            commands.register("dup", move |s, c| {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(noop(s, c))
            });

            assert_eq!(commands.len(), 1);

            let (mut state, _dir) = test_state().await;
            commands
                .run(&mut state, &Command::new("dup", vec![]))
                .await
                .unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_unknown_command() {
            let commands = Commands::new();
            let (mut state, _dir) = test_state().await;

            let err = commands
                .run(&mut state, &Command::new("nonexistent", vec![]))
                .await
                .unwrap_err();

            assert!(matches!(err, GatorError::UnknownCommand(ref name) if name == "nonexistent"));
        }

        #[tokio::test]
        async fn test_handler_failure_is_wrapped() {
            let mut commands = Commands::new();
            commands.register("fail", |s, c| Box::pin(fail(s, c)));
            let (mut state, _dir) = test_state().await;

            let err = commands
                .run(&mut state, &Command::new("fail", vec![]))
                .await
                .unwrap_err();

            match err {
                GatorError::Command { name, source } => {
                    assert_eq!(name, "fail");
                    assert!(matches!(*source, GatorError::Usage(_)));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_handler_receives_args() {
            let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
            let mut commands = Commands::new();
            let sink = seen.clone();
            commands.register("echo", move |s, cmd| {
                sink.lock().unwrap().extend(cmd.args.clone());
                Box::pin(noop(s, cmd))
            });
            let (mut state, _dir) = test_state().await;

            commands
                .run(&mut state, &Command::new("echo", vec!["a".to_string(), "b".to_string()]))
                .await
                .unwrap();

            assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
        }
    }

    mod current_user_tests {
        use super::*;

        #[tokio::test]
        async fn test_not_logged_in() {
            let (state, _dir) = test_state().await;
            assert!(matches!(state.current_user().await, Err(GatorError::NotLoggedIn)));
        }

        #[tokio::test]
        async fn test_configured_user_missing_from_store() {
            let (mut state, _dir) = test_state().await;
            state.config.current_user_name = "ghost".to_string();
            assert!(matches!(
                state.current_user().await,
                Err(GatorError::UserNotFound(_))
            ));
        }

        #[tokio::test]
        async fn test_resolves_user() {
            let (mut state, _dir) = test_state().await;
            state.db.create_user("alice").await.unwrap();
            state.config.current_user_name = "alice".to_string();
            assert_eq!(state.current_user().await.unwrap().name, "alice");
        }
    }
}
