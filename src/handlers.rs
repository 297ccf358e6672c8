//! Handlers for every CLI command.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::commands::{Command, Commands, State};
use crate::db::User;
use crate::error::{GatorError, Result};
use crate::fetcher::HttpFetcher;
use crate::middleware::logged_in;
use crate::scraper::{parse_interval, Scraper};

const DEFAULT_BROWSE_LIMIT: i64 = 2;

/// All commands, authenticated ones behind [`logged_in`].
pub fn registry() -> Commands {
    let mut commands = Commands::new();
    commands.register("login", |s, c| Box::pin(login(s, c)));
    commands.register("register", |s, c| Box::pin(register(s, c)));
    commands.register("reset", |s, c| Box::pin(reset(s, c)));
    commands.register("users", |s, c| Box::pin(users(s, c)));
    commands.register("agg", |s, c| Box::pin(agg(s, c)));
    commands.register("feeds", |s, c| Box::pin(feeds(s, c)));
    commands.register(
        "addfeed",
        logged_in(|s, c, u| Box::pin(add_feed(s, c, u))),
    );
    commands.register("follow", logged_in(|s, c, u| Box::pin(follow(s, c, u))));
    commands.register(
        "following",
        logged_in(|s, c, u| Box::pin(following(s, c, u))),
    );
    commands.register(
        "unfollow",
        logged_in(|s, c, u| Box::pin(unfollow(s, c, u))),
    );
    commands.register("browse", logged_in(|s, c, u| Box::pin(browse(s, c, u))));
    commands
}

pub async fn login(state: &mut State, cmd: &Command) -> Result<()> {
    let name = cmd.arg(0, "login <name>")?;

    if state.db.get_user_by_name(name).await?.is_none() {
        return Err(GatorError::UserNotFound(name.to_string()));
    }

    state.config_store.set_user(&mut state.config, name)?;
    println!("Username has been set to: {}", name);
    Ok(())
}

pub async fn register(state: &mut State, cmd: &Command) -> Result<()> {
    let name = cmd.arg(0, "register <name>")?;

    if state.db.get_user_by_name(name).await?.is_some() {
        return Err(GatorError::UserExists(name.to_string()));
    }

    let user = state.db.create_user(name).await.map_err(|e| {
        if e.is_unique_violation() {
            GatorError::UserExists(name.to_string())
        } else {
            e
        }
    })?;

    state.config_store.set_user(&mut state.config, &user.name)?;
    info!("Registered user '{}' (id {})", user.name, user.id);
    println!("User {} has been created and logged in", user.name);
    Ok(())
}

pub async fn reset(state: &mut State, _cmd: &Command) -> Result<()> {
    let deleted = state.db.delete_users().await?;
    println!("Successfully deleted {} user(s)", deleted);
    Ok(())
}

pub async fn users(state: &mut State, _cmd: &Command) -> Result<()> {
    let users = state.db.get_users().await?;
    let current = state.config.current_user();

    for user in users {
        if Some(user.name.as_str()) == current {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }
    Ok(())
}

/// Scrape feeds forever, one per interval, until Ctrl-C.
pub async fn agg(state: &mut State, cmd: &Command) -> Result<()> {
    let interval = parse_interval(cmd.arg(0, "agg <interval>")?)?;
    let scraper = Scraper::new(state.db.clone(), Arc::new(HttpFetcher::new()?));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, stopping scraper");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("Unable to listen for Ctrl-C: {}", e);
                shutdown_tx.closed().await;
            }
        }
    });

    println!("Collecting feeds every {:?}", interval);
    scraper.run(interval, shutdown_rx).await;
    Ok(())
}

pub async fn feeds(state: &mut State, _cmd: &Command) -> Result<()> {
    let feeds = state.db.get_feeds().await?;
    if feeds.is_empty() {
        println!("There are no feeds yet, try adding one with addfeed");
    }

    for feed in feeds {
        println!("* {}", feed.name);
        println!("  URL:     {}", feed.url);
        println!("  Creator: {}", feed.user_name);
    }
    Ok(())
}

/// Creates the feed and the acting user's follow of it atomically.
pub async fn add_feed(state: &mut State, cmd: &Command, user: User) -> Result<()> {
    if cmd.args.len() != 2 {
        return Err(GatorError::Usage("addfeed <name> <url>".to_string()));
    }
    let (name, url) = (cmd.args[0].as_str(), cmd.args[1].as_str());

    if state.db.get_feed_by_url(url).await?.is_some() {
        return Err(GatorError::FeedExists(url.to_string()));
    }

    let (feed, _follow) = state
        .db
        .create_feed_with_follow(name, url, user.id)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                GatorError::FeedExists(url.to_string())
            } else {
                e
            }
        })?;

    info!("User '{}' added feed '{}' (id {})", user.name, feed.name, feed.id);
    println!("Added feed {} ({})", feed.name, feed.url);
    println!("{} is now following {}", user.name, feed.name);
    Ok(())
}

pub async fn follow(state: &mut State, cmd: &Command, user: User) -> Result<()> {
    let url = cmd.arg(0, "follow <url>")?;
    let feed = state
        .db
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| GatorError::FeedNotFound(url.to_string()))?;

    state
        .db
        .create_feed_follow(user.id, feed.id)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                GatorError::AlreadyFollowing(url.to_string())
            } else {
                e
            }
        })?;

    println!("{} is now following {}", user.name, feed.name);
    Ok(())
}

pub async fn following(state: &mut State, _cmd: &Command, user: User) -> Result<()> {
    let follows = state.db.get_feed_follows_for_user(user.id).await?;
    if follows.is_empty() {
        println!("{} is not following any feeds", user.name);
        return Ok(());
    }

    for follow in follows {
        println!("* {} ({})", follow.feed_name, follow.feed_url);
    }
    Ok(())
}

pub async fn unfollow(state: &mut State, cmd: &Command, user: User) -> Result<()> {
    let url = cmd.arg(0, "unfollow <url>")?;
    let feed = state
        .db
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| GatorError::FeedNotFound(url.to_string()))?;

    if !state.db.delete_feed_follow(user.id, feed.id).await? {
        return Err(GatorError::NotFollowing(url.to_string()));
    }

    println!("{} unfollowed {}", user.name, feed.name);
    Ok(())
}

pub async fn browse(state: &mut State, cmd: &Command, user: User) -> Result<()> {
    let limit = match cmd.args.first() {
        None => DEFAULT_BROWSE_LIMIT,
        Some(raw) => match raw.parse::<i64>() {
            Ok(limit) if limit > 0 => limit,
            _ => return Err(GatorError::Usage("browse [limit]".to_string())),
        },
    };

    let posts = state.db.get_posts_for_user(user.id, limit).await?;
    if posts.is_empty() {
        println!("No posts yet, run agg to collect some");
    }

    for post in posts {
        println!("{} ({})", post.title, post.published_at.format("%a %b %e %Y"));
        println!("  {}", post.url);
        if let Some(description) = post.description {
            println!("  {}", description);
        }
    }
    Ok(())
}
