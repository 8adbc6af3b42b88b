pub mod types;

use std::str::FromStr;

use chrono::Utc;
pub use sqlx::Error;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, Sqlite,
};
use teloxide::types::UserId;

use self::types::{
    Counts, NewReferralChannel, NewSubscriptionChannel, ReferralChannel, SubscriptionChannel,
    UserRecord,
};
use crate::types::ChannelKind;

type Pool = sqlx::Pool<Sqlite>;

/// Persistent store of users, channels and confirmations.
///
/// Constructed once on startup and handed to whoever needs it.
pub struct Database {
    pool: Pool,
}

impl Database {
    /// Open (creating if needed) the SQLite database at `database_url`,
    /// like `sqlite:channel_gate.sqlite`, and create the tables.
    pub async fn new(database_url: &str) -> Result<Database, Error> {
        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            Sqlite::create_database(database_url).await?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(
                SqliteConnectOptions::from_str(database_url)?
                    .foreign_keys(true)
                    .pragma("cache_size", "-8192")
                    .busy_timeout(std::time::Duration::from_secs(60)),
            )
            .await?;

        Self::from_pool(pool).await
    }

    /// A fresh database living purely in memory.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Database, Error> {
        // Every connection to ":memory:" is its own database,
        // so keep exactly one around forever.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: Pool) -> Result<Database, Error> {
        // USERS:
        // user_id (Telegram user ID, i64 because sqlite doesn't support u64)
        // username (without the @, may be NULL)
        // full_name
        // joined_at, last_active (date+time in UTC)
        // total_checks (how many times the user went through the gate)
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY NOT NULL,
                username TEXT NULL,
                full_name TEXT NOT NULL,
                joined_at TEXT NOT NULL,
                last_active TEXT NOT NULL,
                total_checks INTEGER NOT NULL DEFAULT 0
            ) STRICT;",
        ))
        .await?;

        // SUBSCRIPTION_CHANNELS:
        // handle (@username or numeric chat ID, NULL if it can't be looked up,
        //         unique ignoring case since Telegram usernames are)
        // kind ("public" or "private")
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS subscription_channels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                handle TEXT NULL UNIQUE COLLATE NOCASE,
                url TEXT NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL
            ) STRICT;",
        ))
        .await?;

        // CONFIRMED_SUBSCRIPTIONS:
        // One row per user per channel they were seen in or claimed to be in.
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS confirmed_subscriptions (
                user_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL
                    REFERENCES subscription_channels(id) ON DELETE CASCADE,
                confirmed INTEGER NOT NULL DEFAULT 0,
                confirmed_at TEXT NULL,
                PRIMARY KEY (user_id, channel_id)
            ) STRICT;",
        ))
        .await?;

        // REFERRAL_CHANNELS:
        // The first one by creation order is what users get after passing the gate.
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS referral_channels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NULL,
                created_at TEXT NOT NULL
            ) STRICT;",
        ))
        .await?;

        pool.execute(sqlx::query(
            "CREATE INDEX IF NOT EXISTS confirmed_subscriptions_channel_id
            ON confirmed_subscriptions(channel_id);",
        ))
        .await?;

        Ok(Database { pool })
    }

    /// Remember the user, or refresh their info and last activity if they're
    /// already known.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn touch_user(
        &self,
        user_id: UserId,
        username: Option<&str>,
        full_name: &str,
    ) -> Result<(), Error> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users(user_id, username, full_name, joined_at, last_active, total_checks)
            VALUES (?, ?, ?, ?, ?, 0)
        ON CONFLICT(user_id) DO
            UPDATE SET username=excluded.username,
                full_name=excluded.full_name,
                last_active=excluded.last_active;",
        )
        .bind(user_id.0 as i64)
        .bind(username)
        .bind(full_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Count one more pass through the gate. The user must have been touched before.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn count_check(&self, user_id: UserId) -> Result<(), Error> {
        sqlx::query("UPDATE users SET total_checks=total_checks + 1 WHERE user_id=?;")
            .bind(user_id.0 as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>, Error> {
        sqlx::query(
            "SELECT user_id, username, full_name, joined_at, last_active, total_checks
            FROM users WHERE user_id=?;",
        )
        .bind(user_id.0 as i64)
        .map(|row: SqliteRow| UserRecord {
            user_id: UserId(row.get::<i64, _>("user_id") as u64),
            username: row.get("username"),
            full_name: row.get("full_name"),
            joined_at: row.get("joined_at"),
            last_active: row.get("last_active"),
            total_checks: row.get("total_checks"),
        })
        .fetch_optional(&self.pool)
        .await
    }

    /// Inserts a new subscription channel and returns its ID.
    pub async fn add_subscription_channel(
        &self,
        channel: &NewSubscriptionChannel,
    ) -> Result<i64, Error> {
        let result = sqlx::query(
            "INSERT INTO subscription_channels(handle, url, name, kind, created_at)
            VALUES (?, ?, ?, ?, ?);",
        )
        .bind(channel.handle.as_deref())
        .bind(&channel.url)
        .bind(&channel.name)
        .bind(channel.kind.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// All subscription channels, oldest first.
    pub async fn list_subscription_channels(&self) -> Result<Vec<SubscriptionChannel>, Error> {
        sqlx::query(
            "SELECT id, handle, url, name, kind, created_at
            FROM subscription_channels ORDER BY created_at, id;",
        )
        .try_map(subscription_channel_from_row)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_subscription_channel(
        &self,
        id: i64,
    ) -> Result<Option<SubscriptionChannel>, Error> {
        sqlx::query(
            "SELECT id, handle, url, name, kind, created_at
            FROM subscription_channels WHERE id=?;",
        )
        .bind(id)
        .try_map(subscription_channel_from_row)
        .fetch_optional(&self.pool)
        .await
    }

    /// Deletes a subscription channel along with everyone's confirmations of it.
    /// Returns `false` if there was no such channel.
    pub async fn remove_subscription_channel(&self, id: i64) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM subscription_channels WHERE id=?;")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether the user has a confirmed subscription to this channel on record.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn is_confirmed(&self, user_id: UserId, channel_id: i64) -> Result<bool, Error> {
        sqlx::query(
            "SELECT confirmed FROM confirmed_subscriptions
            WHERE user_id=? AND channel_id=?;",
        )
        .bind(user_id.0 as i64)
        .bind(channel_id)
        .map(|row: SqliteRow| row.get::<bool, _>("confirmed"))
        .fetch_optional(&self.pool)
        .await
        .map(|x| x.unwrap_or(false))
    }

    /// Marks the user as subscribed to this channel.
    /// Overwrites whatever was there before.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn set_confirmed(&self, user_id: UserId, channel_id: i64) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO confirmed_subscriptions(user_id, channel_id, confirmed, confirmed_at)
            VALUES (?, ?, 1, ?)
        ON CONFLICT(user_id, channel_id) DO
            UPDATE SET confirmed=1, confirmed_at=excluded.confirmed_at;",
        )
        .bind(user_id.0 as i64)
        .bind(channel_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Forgets the user's confirmation of this channel, if any.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn delete_confirmation(&self, user_id: UserId, channel_id: i64) -> Result<(), Error> {
        sqlx::query("DELETE FROM confirmed_subscriptions WHERE user_id=? AND channel_id=?;")
            .bind(user_id.0 as i64)
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Amount of confirmation rows for this channel, across all users.
    pub async fn count_confirmations_of(&self, channel_id: i64) -> Result<i64, Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM confirmed_subscriptions WHERE channel_id=?;")
            .bind(channel_id)
            .fetch_one(&self.pool)
            .await
    }

    /// Inserts a new referral channel and returns its ID.
    pub async fn add_referral_channel(&self, channel: &NewReferralChannel) -> Result<i64, Error> {
        let result = sqlx::query(
            "INSERT INTO referral_channels(url, name, description, created_at)
            VALUES (?, ?, ?, ?);",
        )
        .bind(&channel.url)
        .bind(&channel.name)
        .bind(channel.description.as_deref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// All referral channels, oldest first.
    pub async fn list_referral_channels(&self) -> Result<Vec<ReferralChannel>, Error> {
        sqlx::query(
            "SELECT id, url, name, description, created_at
            FROM referral_channels ORDER BY created_at, id;",
        )
        .map(referral_channel_from_row)
        .fetch_all(&self.pool)
        .await
    }

    /// The referral channel users get after passing the gate: the oldest one.
    pub async fn first_referral_channel(&self) -> Result<Option<ReferralChannel>, Error> {
        sqlx::query(
            "SELECT id, url, name, description, created_at
            FROM referral_channels ORDER BY created_at, id LIMIT 1;",
        )
        .map(referral_channel_from_row)
        .fetch_optional(&self.pool)
        .await
    }

    /// Returns `false` if there was no such channel.
    pub async fn remove_referral_channel(&self, id: i64) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM referral_channels WHERE id=?;")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn counts(&self) -> Result<Counts, Error> {
        let users = sqlx::query_scalar("SELECT COUNT(*) FROM users;")
            .fetch_one(&self.pool)
            .await?;
        let public_channels =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscription_channels WHERE kind=?;")
                .bind(ChannelKind::Public.as_str())
                .fetch_one(&self.pool)
                .await?;
        let private_channels =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscription_channels WHERE kind=?;")
                .bind(ChannelKind::Private.as_str())
                .fetch_one(&self.pool)
                .await?;
        let referral_channels = sqlx::query_scalar("SELECT COUNT(*) FROM referral_channels;")
            .fetch_one(&self.pool)
            .await?;
        let confirmations =
            sqlx::query_scalar("SELECT COUNT(*) FROM confirmed_subscriptions WHERE confirmed=1;")
                .fetch_one(&self.pool)
                .await?;

        Ok(Counts {
            users,
            public_channels,
            private_channels,
            referral_channels,
            confirmations,
        })
    }
}

fn subscription_channel_from_row(row: SqliteRow) -> Result<SubscriptionChannel, Error> {
    let kind: String = row.try_get("kind")?;
    let kind = ChannelKind::from_db(&kind).ok_or_else(|| Error::ColumnDecode {
        index: "kind".to_string(),
        source: format!("Unknown channel kind: {kind}").into(),
    })?;

    Ok(SubscriptionChannel {
        id: row.try_get("id")?,
        handle: row.try_get("handle")?,
        url: row.try_get("url")?,
        name: row.try_get("name")?,
        kind,
        created_at: row.try_get("created_at")?,
    })
}

fn referral_channel_from_row(row: SqliteRow) -> ReferralChannel {
    ReferralChannel {
        id: row.get("id"),
        url: row.get("url"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}
