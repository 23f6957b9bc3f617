use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

/// What happened to a form definition
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "history_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
}

/// Before/after snapshot of one change to a form definition
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct FormDesignHistory {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub form_definition_id: i64,
    #[ts(type = "number | null")]
    pub user_id: Option<i64>,
    pub action: HistoryAction,
    pub previous_config: Option<serde_json::Value>,
    pub new_config: Option<serde_json::Value>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FormDesignHistoryRow {
    id: i64,
    form_definition_id: i64,
    user_id: Option<i64>,
    action: HistoryAction,
    previous_config: Option<String>,
    new_config: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

fn decode_snapshot(raw: Option<String>) -> Result<Option<serde_json::Value>, sqlx::Error> {
    raw.map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

impl TryFrom<FormDesignHistoryRow> for FormDesignHistory {
    type Error = sqlx::Error;

    fn try_from(row: FormDesignHistoryRow) -> Result<Self, Self::Error> {
        Ok(FormDesignHistory {
            id: row.id,
            form_definition_id: row.form_definition_id,
            user_id: row.user_id,
            action: row.action,
            previous_config: decode_snapshot(row.previous_config)?,
            new_config: decode_snapshot(row.new_config)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

/// Input for appending a history entry
#[derive(Debug, Clone)]
pub struct CreateFormDesignHistory {
    pub form_definition_id: i64,
    pub user_id: Option<i64>,
    pub action: HistoryAction,
    pub previous_config: Option<serde_json::Value>,
    pub new_config: Option<serde_json::Value>,
    pub description: Option<String>,
}

impl FormDesignHistory {
    pub async fn create<'e, E>(executor: E, data: &CreateFormDesignHistory) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let previous = data.previous_config.as_ref().map(|v| v.to_string());
        let new = data.new_config.as_ref().map(|v| v.to_string());
        let row = sqlx::query_as::<_, FormDesignHistoryRow>(
            r#"INSERT INTO form_design_history
                   (form_definition_id, user_id, action, previous_config, new_config, description)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, form_definition_id, user_id, action, previous_config, new_config,
                         description, created_at"#,
        )
        .bind(data.form_definition_id)
        .bind(data.user_id)
        .bind(data.action)
        .bind(previous)
        .bind(new)
        .bind(&data.description)
        .fetch_one(executor)
        .await?;

        FormDesignHistory::try_from(row)
    }

    /// Newest first
    pub async fn find_by_form_definition_id(
        pool: &SqlitePool,
        form_definition_id: i64,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, FormDesignHistoryRow>(
            r#"SELECT id, form_definition_id, user_id, action, previous_config, new_config,
                      description, created_at
               FROM form_design_history
               WHERE form_definition_id = $1
               ORDER BY created_at DESC, id DESC
               LIMIT $2"#,
        )
        .bind(form_definition_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(FormDesignHistory::try_from).collect()
    }

    pub async fn count_by_form_definition_id(
        pool: &SqlitePool,
        form_definition_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM form_design_history WHERE form_definition_id = $1",
        )
        .bind(form_definition_id)
        .fetch_one(pool)
        .await
    }
}
