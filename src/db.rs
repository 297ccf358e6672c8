use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, SqlitePool,
};

use crate::error::Result;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Feed {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FeedFollow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: i64,
    pub feed_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub feed_id: i64,
}

/// A feed together with the name of the user who added it.
#[derive(Debug, Clone, FromRow)]
pub struct FeedListing {
    pub name: String,
    pub url: String,
    pub user_name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct FollowedFeed {
    pub feed_id: i64,
    pub feed_name: String,
    pub feed_url: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub feed_id: i64,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);

        // One long-lived connection: the CLI and the scraper never run concurrently,
        // and `sqlite::memory:` databases vanish with their connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                name TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                last_fetched_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_follows (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                UNIQUE(user_id, feed_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                description TEXT,
                published_at TEXT NOT NULL,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_feed_published
            ON posts(feed_id, published_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Users

    pub async fn create_user(&self, name: &str) -> Result<User> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (created_at, updated_at, name)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Deletes every user; feeds, follows and posts go with them.
    pub async fn delete_users(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // Feeds

    /// Creates a feed and the creator's follow of it in one transaction.
    pub async fn create_feed_with_follow(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<(Feed, FeedFollow)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let feed = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (created_at, updated_at, name, url, user_id)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let follow = sqlx::query_as::<_, FeedFollow>(
            r#"
            INSERT INTO feed_follows (created_at, updated_at, user_id, feed_id)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((feed, follow))
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE id = ?")
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    pub async fn get_feeds(&self) -> Result<Vec<FeedListing>> {
        let feeds = sqlx::query_as::<_, FeedListing>(
            r#"
            SELECT feeds.name AS name, feeds.url AS url, users.name AS user_name
            FROM feeds
            JOIN users ON users.id = feeds.user_id
            ORDER BY feeds.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// The feed fetched longest ago, never-fetched feeds first.
    pub async fn get_next_feed_to_fetch(&self) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT * FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Stamps `last_fetched_at` with the current time. Returns `None` if the feed is gone.
    pub async fn mark_feed_fetched(&self, feed_id: i64) -> Result<Option<Feed>> {
        let now = Utc::now();
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    // Follows

    pub async fn create_feed_follow(&self, user_id: i64, feed_id: i64) -> Result<FeedFollow> {
        let now = Utc::now();
        let follow = sqlx::query_as::<_, FeedFollow>(
            r#"
            INSERT INTO feed_follows (created_at, updated_at, user_id, feed_id)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(follow)
    }

    /// Returns false when there was no such follow.
    pub async fn delete_feed_follow(&self, user_id: i64, feed_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_feed_follows_for_user(&self, user_id: i64) -> Result<Vec<FollowedFeed>> {
        let follows = sqlx::query_as::<_, FollowedFeed>(
            r#"
            SELECT feeds.id AS feed_id, feeds.name AS feed_name, feeds.url AS feed_url
            FROM feed_follows
            JOIN feeds ON feeds.id = feed_follows.feed_id
            WHERE feed_follows.user_id = ?
            ORDER BY feed_follows.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(follows)
    }

    // Posts

    /// Inserts a post. A post whose URL is already stored fails with a
    /// unique violation (see [`crate::error::GatorError::is_unique_violation`]).
    pub async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let now = Utc::now();
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    /// Newest posts across the feeds `user_id` follows.
    pub async fn get_posts_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT posts.* FROM posts
            JOIN feed_follows ON feed_follows.feed_id = posts.feed_id
            WHERE feed_follows.user_id = ?
            ORDER BY posts.published_at DESC, posts.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn get_post_count_for_feed(&self, feed_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
