use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;

use super::field_spec::FieldSpec;

/// A named, persisted form for one entity type.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    #[ts(type = "number")]
    pub id: i64,
    pub entity_type: String,
    pub display_name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldSpec>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage shape; `fields` is a JSON array in a TEXT column.
#[derive(Debug, FromRow)]
struct FormDefinitionRow {
    id: i64,
    entity_type: String,
    display_name: String,
    description: Option<String>,
    fields: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FormDefinitionRow> for FormDefinition {
    type Error = sqlx::Error;

    fn try_from(row: FormDefinitionRow) -> Result<Self, Self::Error> {
        let fields = serde_json::from_str(&row.fields).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(FormDefinition {
            id: row.id,
            entity_type: row.entity_type,
            display_name: row.display_name,
            description: row.description,
            fields,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormDefinition {
    pub entity_type: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// Partial update; `None` leaves the column untouched. `description` is
/// cleared by an explicit `null` (`Some(None)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormDefinition {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(optional)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub fields: Option<Vec<FieldSpec>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

const SELECT_COLUMNS: &str = r#"
    id,
    entity_type,
    display_name,
    description,
    fields,
    is_active,
    created_at,
    updated_at
"#;

fn encode_fields(fields: &[FieldSpec]) -> Result<String, sqlx::Error> {
    serde_json::to_string(fields).map_err(|e| sqlx::Error::Protocol(e.to_string()))
}

impl FormDefinition {
    /// JSON snapshot used for the design history side-log.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, FormDefinitionRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM form_definitions ORDER BY display_name COLLATE NOCASE, id"
        ))
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(FormDefinition::try_from).collect()
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, FormDefinitionRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM form_definitions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(FormDefinition::try_from)
        .transpose()
    }

    pub async fn find_by_entity_type(
        pool: &SqlitePool,
        entity_type: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FormDefinitionRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM form_definitions WHERE entity_type = $1"
        ))
        .bind(entity_type)
        .fetch_optional(pool)
        .await?
        .map(FormDefinition::try_from)
        .transpose()
    }

    /// Insert a new definition. New definitions start active.
    pub async fn create<'e, E>(executor: E, data: &CreateFormDefinition) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let fields = encode_fields(&data.fields)?;
        let row = sqlx::query_as::<_, FormDefinitionRow>(&format!(
            r#"INSERT INTO form_definitions (entity_type, display_name, description, fields, is_active)
               VALUES ($1, $2, $3, $4, 1)
               RETURNING {SELECT_COLUMNS}"#
        ))
        .bind(&data.entity_type)
        .bind(&data.display_name)
        .bind(data.description.is_some())
        .bind(data.description.clone())
        .bind(fields)
        .fetch_one(executor)
        .await?;

        FormDefinition::try_from(row)
    }

    /// Apply a partial update. Returns `None` if no row has `id`.
    pub async fn update<'e, E>(
        executor: E,
        id: i64,
        data: &UpdateFormDefinition,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let fields = data.fields.as_deref().map(encode_fields).transpose()?;
        sqlx::query_as::<_, FormDefinitionRow>(&format!(
            r#"UPDATE form_definitions
               SET display_name = COALESCE($2, display_name),
                   description  = CASE WHEN $3 THEN $4 ELSE description END,
                   fields       = COALESCE($5, fields),
                   is_active    = COALESCE($6, is_active),
                   updated_at   = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {SELECT_COLUMNS}"#
        ))
        .bind(id)
        .bind(&data.display_name)
        .bind(data.description.is_some())
        .bind(data.description.clone().flatten())
        .bind(fields)
        .bind(data.is_active)
        .fetch_optional(executor)
        .await?
        .map(FormDefinition::try_from)
        .transpose()
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM form_definitions WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
