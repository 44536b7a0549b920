use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
    models::User,
};

fn row_to_user(row: &Row) -> Result<User> {
    let created_at: String = row.get("created_at")?;
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Returns the user with this name, creating it on first use.
    /// The flag is `true` when the row was inserted by this call.
    pub async fn ensure_user(&self, username: &str) -> Result<(User, bool)> {
        let username = username.to_string();
        self.execute(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (username, created_at) VALUES (?1, ?2)",
                params![username, format_datetime(&Utc::now())],
            )?;

            let mut stmt =
                conn.prepare("SELECT id, username, created_at FROM users WHERE username = ?1")?;
            let mut rows = stmt.query(params![username])?;
            let user = match rows.next()? {
                Some(row) => row_to_user(row)?,
                None => anyhow::bail!("user {username} missing after insert"),
            };

            Ok((user, inserted > 0))
        })
        .await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.execute(move |conn| {
            let created_at_and_name = conn
                .query_row(
                    "SELECT username, created_at FROM users WHERE id = ?1",
                    params![user_id],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;

            created_at_and_name
                .map(|(username, created_at)| {
                    Ok(User {
                        id: user_id,
                        username,
                        created_at: parse_datetime(&created_at, "created_at")?,
                    })
                })
                .transpose()
        })
        .await
    }
}
