use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

use super::field_spec::{DEFAULT_HEIGHT, DEFAULT_WIDTH, FieldOption, FieldSpec, FieldType};

/// A field persisted as its own row, for callers that do not embed the
/// field list in the definition.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub form_definition_id: i64,
    pub field_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub position: i32,
    pub width: i32,
    pub height: i32,
    pub is_required: bool,
    pub placeholder: Option<String>,
    pub default_value: Option<String>,
    pub options: Vec<FieldOption>,
    pub validation: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FormFieldRow {
    id: i64,
    form_definition_id: i64,
    field_name: String,
    field_label: String,
    field_type: FieldType,
    position: i32,
    width: i32,
    height: i32,
    is_required: bool,
    placeholder: Option<String>,
    default_value: Option<String>,
    options: String,
    validation: Option<String>,
    metadata: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FormFieldRow> for FormField {
    type Error = sqlx::Error;

    fn try_from(row: FormFieldRow) -> Result<Self, Self::Error> {
        let options = serde_json::from_str(&row.options).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(FormField {
            id: row.id,
            form_definition_id: row.form_definition_id,
            field_name: row.field_name,
            field_label: row.field_label,
            field_type: row.field_type,
            position: row.position,
            width: row.width,
            height: row.height,
            is_required: row.is_required,
            placeholder: row.placeholder,
            default_value: row.default_value,
            options,
            validation: decode_json(row.validation)?,
            metadata: decode_json(row.metadata)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<FormField> for FieldSpec {
    fn from(field: FormField) -> Self {
        FieldSpec {
            id: field.id.to_string(),
            field_name: field.field_name,
            field_label: field.field_label,
            field_type: field.field_type,
            position: field.position,
            width: field.width,
            height: field.height,
            is_required: field.is_required,
            placeholder: field.placeholder,
            default_value: field.default_value,
            options: field.options,
            validation: field.validation,
            metadata: field.metadata,
        }
    }
}

fn default_width() -> i32 {
    DEFAULT_WIDTH
}

fn default_height() -> i32 {
    DEFAULT_HEIGHT
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormField {
    pub field_name: String,
    pub field_label: String,
    #[serde(default)]
    pub field_type: FieldType,
    pub position: i32,
    #[serde(default = "default_width")]
    pub width: i32,
    #[serde(default = "default_height")]
    pub height: i32,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub validation: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Partial update. For the nullable columns an absent key keeps the stored
/// value and an explicit `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormField {
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub field_label: Option<String>,
    #[serde(default)]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub is_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(optional)]
    pub placeholder: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(optional)]
    pub default_value: Option<Option<String>>,
    #[serde(default)]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(optional)]
    pub validation: Option<Option<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(optional)]
    pub metadata: Option<Option<serde_json::Value>>,
}

const SELECT_COLUMNS: &str = r#"
    id,
    form_definition_id,
    field_name,
    field_label,
    field_type,
    position,
    width,
    height,
    is_required,
    placeholder,
    default_value,
    options,
    validation,
    metadata,
    created_at,
    updated_at
"#;

fn encode_options(options: &[FieldOption]) -> Result<String, sqlx::Error> {
    serde_json::to_string(options).map_err(|e| sqlx::Error::Protocol(e.to_string()))
}

fn encode_json(value: Option<&serde_json::Value>) -> Option<String> {
    value.map(serde_json::Value::to_string)
}

fn decode_json(raw: Option<String>) -> Result<Option<serde_json::Value>, sqlx::Error> {
    raw.map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

impl FormField {
    pub async fn find_by_form_definition_id(
        pool: &SqlitePool,
        form_definition_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, FormFieldRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM form_fields WHERE form_definition_id = $1 ORDER BY position, id"
        ))
        .bind(form_definition_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(FormField::try_from).collect()
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FormFieldRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM form_fields WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(FormField::try_from)
        .transpose()
    }

    pub async fn create(
        pool: &SqlitePool,
        form_definition_id: i64,
        data: &CreateFormField,
    ) -> Result<Self, sqlx::Error> {
        let options = encode_options(&data.options)?;
        let row = sqlx::query_as::<_, FormFieldRow>(&format!(
            r#"INSERT INTO form_fields (
                   form_definition_id, field_name, field_label, field_type, position,
                   width, height, is_required, placeholder, default_value, options,
                   validation, metadata
               )
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
               RETURNING {SELECT_COLUMNS}"#
        ))
        .bind(form_definition_id)
        .bind(&data.field_name)
        .bind(&data.field_label)
        .bind(data.field_type)
        .bind(data.position)
        .bind(data.width)
        .bind(data.height)
        .bind(data.is_required)
        .bind(&data.placeholder)
        .bind(&data.default_value)
        .bind(options)
        .bind(encode_json(data.validation.as_ref()))
        .bind(encode_json(data.metadata.as_ref()))
        .fetch_one(pool)
        .await?;

        FormField::try_from(row)
    }

    /// Apply a partial update. Returns `None` if no row has `id`. Nullable
    /// columns are rewritten only when their flag parameter is set, so
    /// `Some(None)` clears them.
    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        data: &UpdateFormField,
    ) -> Result<Option<Self>, sqlx::Error> {
        let options = data.options.as_deref().map(encode_options).transpose()?;
        sqlx::query_as::<_, FormFieldRow>(&format!(
            r#"UPDATE form_fields
               SET field_name    = COALESCE($2, field_name),
                   field_label   = COALESCE($3, field_label),
                   field_type    = COALESCE($4, field_type),
                   position      = COALESCE($5, position),
                   width         = COALESCE($6, width),
                   height        = COALESCE($7, height),
                   is_required   = COALESCE($8, is_required),
                   placeholder   = CASE WHEN $9 THEN $10 ELSE placeholder END,
                   default_value = CASE WHEN $11 THEN $12 ELSE default_value END,
                   options       = COALESCE($13, options),
                   validation    = CASE WHEN $14 THEN $15 ELSE validation END,
                   metadata      = CASE WHEN $16 THEN $17 ELSE metadata END,
                   updated_at    = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {SELECT_COLUMNS}"#
        ))
        .bind(id)
        .bind(&data.field_name)
        .bind(&data.field_label)
        .bind(data.field_type)
        .bind(data.position)
        .bind(data.width)
        .bind(data.height)
        .bind(data.is_required)
        .bind(data.placeholder.is_some())
        .bind(data.placeholder.clone().flatten())
        .bind(data.default_value.is_some())
        .bind(data.default_value.clone().flatten())
        .bind(options)
        .bind(data.validation.is_some())
        .bind(encode_json(data.validation.as_ref().and_then(Option::as_ref)))
        .bind(data.metadata.is_some())
        .bind(encode_json(data.metadata.as_ref().and_then(Option::as_ref)))
        .fetch_optional(pool)
        .await?
        .map(FormField::try_from)
        .transpose()
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM form_fields WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        DBService,
        models::form_definition::{CreateFormDefinition, FormDefinition},
    };

    async fn definition(db: &DBService) -> FormDefinition {
        FormDefinition::create(
            &db.pool,
            &CreateFormDefinition {
                entity_type: "orders".to_string(),
                display_name: "Orders".to_string(),
                description: None,
                fields: Vec::new(),
            },
        )
        .await
        .unwrap()
    }

    fn status_field(position: i32) -> CreateFormField {
        CreateFormField {
            field_name: "status".to_string(),
            field_label: "Status".to_string(),
            field_type: FieldType::Select,
            position,
            width: 100,
            height: 40,
            is_required: true,
            placeholder: None,
            default_value: Some("open".to_string()),
            options: vec![
                FieldOption::new("open", "Open"),
                FieldOption::new("closed", "Closed"),
            ],
            validation: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn field_rows_round_trip_and_convert_to_specs() {
        let db = DBService::new_in_memory().await.unwrap();
        let def = definition(&db).await;

        FormField::create(&db.pool, def.id, &status_field(1)).await.unwrap();
        let first = FormField::create(
            &db.pool,
            def.id,
            &CreateFormField {
                field_name: "note".to_string(),
                field_label: "Note".to_string(),
                field_type: FieldType::Textarea,
                ..status_field(0)
            },
        )
        .await
        .unwrap();

        let rows = FormField::find_by_form_definition_id(&db.pool, def.id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first.id);
        assert_eq!(rows[1].options.len(), 2);

        let spec: FieldSpec = rows[1].clone().into();
        assert_eq!(spec.field_type, FieldType::Select);
        assert_eq!(spec.default_value.as_deref(), Some("open"));
    }

    #[tokio::test]
    async fn update_only_touches_given_columns() {
        let db = DBService::new_in_memory().await.unwrap();
        let def = definition(&db).await;
        let field = FormField::create(&db.pool, def.id, &status_field(0)).await.unwrap();

        let updated = FormField::update(
            &db.pool,
            field.id,
            &UpdateFormField {
                field_label: Some("Order status".to_string()),
                is_required: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("row updated");

        assert_eq!(updated.field_label, "Order status");
        assert!(!updated.is_required);
        assert_eq!(updated.field_name, "status");
        assert_eq!(updated.options, field.options);
    }

    #[tokio::test]
    async fn json_columns_round_trip_into_specs() {
        let db = DBService::new_in_memory().await.unwrap();
        let def = definition(&db).await;
        let field = FormField::create(
            &db.pool,
            def.id,
            &CreateFormField {
                validation: Some(json!({ "min": 3 })),
                metadata: Some(json!({ "color": "red" })),
                ..status_field(0)
            },
        )
        .await
        .unwrap();

        let stored = FormField::find_by_id(&db.pool, field.id).await.unwrap().unwrap();
        assert_eq!(stored.validation, Some(json!({ "min": 3 })));
        let spec: FieldSpec = stored.into();
        assert_eq!(spec.metadata, Some(json!({ "color": "red" })));
    }

    #[tokio::test]
    async fn explicit_null_clears_nullable_columns() {
        let db = DBService::new_in_memory().await.unwrap();
        let def = definition(&db).await;
        let field = FormField::create(
            &db.pool,
            def.id,
            &CreateFormField {
                placeholder: Some("Pick one".to_string()),
                metadata: Some(json!({ "color": "red" })),
                ..status_field(0)
            },
        )
        .await
        .unwrap();

        let update: UpdateFormField =
            serde_json::from_str(r#"{"placeholder":null,"metadata":null}"#).unwrap();
        assert_eq!(update.placeholder, Some(None));
        assert_eq!(update.default_value, None);

        let updated = FormField::update(&db.pool, field.id, &update)
            .await
            .unwrap()
            .expect("row updated");
        assert!(updated.placeholder.is_none());
        assert!(updated.metadata.is_none());
        assert_eq!(updated.default_value.as_deref(), Some("open"));
    }

    #[tokio::test]
    async fn deleting_the_definition_cascades_to_field_rows() {
        let db = DBService::new_in_memory().await.unwrap();
        let def = definition(&db).await;
        let field = FormField::create(&db.pool, def.id, &status_field(0)).await.unwrap();

        FormDefinition::delete(&db.pool, def.id).await.unwrap();
        assert!(FormField::find_by_id(&db.pool, field.id).await.unwrap().is_none());
    }
}
