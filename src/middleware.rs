//! Login gate for commands that act as the current user.
//!
//! Identity is whatever user name the local config names; there are no tokens
//! or roles. A command wrapped with [`logged_in`] only runs once that name
//! resolves to a stored user.

use std::sync::Arc;

use tracing::debug;

use crate::commands::{boxed, Command, Handler, HandlerFuture, State};
use crate::db::User;

/// Wrap `handler` so it receives the resolved current user. Lookup failures
/// are returned without calling the inner handler.
pub fn logged_in<F>(handler: F) -> Handler
where
    F: for<'a> Fn(&'a mut State, &'a Command, User) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    boxed(move |state, command| {
        let handler = Arc::clone(&handler);
        Box::pin(async move {
            let user = state.current_user().await?;
            debug!("Authenticated as '{}' for '{}'", user.name, command.name);
            handler(state, command, user).await
        })
    })
}
