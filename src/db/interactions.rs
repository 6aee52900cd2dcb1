use chrono::{DateTime, Utc};
use rusqlite::params;

use super::DbPool;
use crate::error::AppError;

/// One completed exchange, as it will be written.
#[derive(Debug, Clone, Default)]
pub struct NewInteraction {
    pub user_input_text: Option<String>,
    pub user_input_voice_path: Option<String>,
    pub response_text: Option<String>,
    pub response_voice_path: Option<String>,
}

/// A persisted row.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Interaction {
    pub id: i64,
    pub user_input_text: Option<String>,
    pub user_input_voice_path: Option<String>,
    pub response_text: Option<String>,
    pub response_voice_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only log of interactions. The only writer of the table.
#[derive(Clone)]
pub struct InteractionLog {
    pool: DbPool,
}

impl InteractionLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Blocking; call from `spawn_blocking`.
    pub fn record(&self, new: NewInteraction) -> Result<Interaction, AppError> {
        if is_blank(&new.response_text) && is_blank(&new.response_voice_path) {
            return Err(AppError::Persistence(
                "interaction has neither response text nor response audio".into(),
            ));
        }

        let conn = self.pool.get()?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO interactions
                (user_input_text, user_input_voice_path, response_text, response_voice_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.user_input_text,
                new.user_input_voice_path,
                new.response_text,
                new.response_voice_path,
                created_at.to_rfc3339(),
            ],
        )?;

        let interaction = Interaction {
            id: conn.last_insert_rowid(),
            user_input_text: new.user_input_text,
            user_input_voice_path: new.user_input_voice_path,
            response_text: new.response_text,
            response_voice_path: new.response_voice_path,
            created_at,
        };
        tracing::debug!(id = interaction.id, "interaction recorded");
        Ok(interaction)
    }

    #[cfg(test)]
    pub fn all(&self) -> Result<Vec<Interaction>, AppError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_input_text, user_input_voice_path, response_text,
                    response_voice_path, created_at
             FROM interactions ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Interaction {
                id: row.get(0)?,
                user_input_text: row.get(1)?,
                user_input_voice_path: row.get(2)?,
                response_text: row.get(3)?,
                response_voice_path: row.get(4)?,
                created_at: row
                    .get::<_, String>(5)?
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
