//! Host-side glue between the HTTP surface and the form definition store.
//!
//! Field lists are renormalised and clamped before they are written, and
//! every definition write appends a `form_design_history` row.

use db::models::{
    field_spec::{FieldSpec, clamp_height, clamp_width, normalize_positions},
    form_definition::{CreateFormDefinition, FormDefinition, UpdateFormDefinition},
    form_design_history::{CreateFormDesignHistory, FormDesignHistory, HistoryAction},
    form_field::{CreateFormField, FormField, UpdateFormField},
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    form_renderer::{FormDataRecord, FormRenderer},
    form_validation::FieldValidationError,
};

pub const MAX_ENTITY_TYPE_LEN: usize = 100;
pub const MAX_DISPLAY_NAME_LEN: usize = 255;
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Error)]
pub enum FormDesignerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Form definition for entity type '{0}' already exists")]
    DuplicateEntityType(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("form definition for entity type '{0}' is inactive")]
    Inactive(String),
    #[error(transparent)]
    Validation(#[from] FieldValidationError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn definition_not_found(id: i64) -> FormDesignerError {
    FormDesignerError::NotFound(format!("form definition {id}"))
}

fn require_text(value: &str, what: &str, max_len: usize) -> Result<(), FormDesignerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FormDesignerError::InvalidInput(format!("{what} must not be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(FormDesignerError::InvalidInput(format!(
            "{what} must be at most {max_len} characters"
        )));
    }
    Ok(())
}

fn require_non_empty(value: &str, what: &str) -> Result<(), FormDesignerError> {
    require_text(value, what, usize::MAX)
}

/// Reject fields without a name or label, clamp dimensions and make
/// positions dense.
fn prepare_fields(fields: &mut [FieldSpec]) -> Result<(), FormDesignerError> {
    for field in fields.iter_mut() {
        require_non_empty(&field.field_name, "field name")?;
        require_non_empty(&field.field_label, "field label")?;
        field.clamp_dimensions();
    }
    normalize_positions(fields);
    Ok(())
}

fn map_unique_violation(err: sqlx::Error, entity_type: &str) -> FormDesignerError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            FormDesignerError::DuplicateEntityType(entity_type.to_string())
        }
        _ => FormDesignerError::Database(err),
    }
}

#[derive(Clone)]
pub struct FormDesignerService {
    pool: SqlitePool,
}

impl FormDesignerService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_definitions(&self) -> Result<Vec<FormDefinition>, FormDesignerError> {
        Ok(FormDefinition::find_all(&self.pool).await?)
    }

    pub async fn get_definition(
        &self,
        entity_type: &str,
    ) -> Result<FormDefinition, FormDesignerError> {
        FormDefinition::find_by_entity_type(&self.pool, entity_type)
            .await?
            .ok_or_else(|| FormDesignerError::NotFound(format!("form definition '{entity_type}'")))
    }

    pub async fn get_definition_by_id(&self, id: i64) -> Result<FormDefinition, FormDesignerError> {
        FormDefinition::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| definition_not_found(id))
    }

    pub async fn create_definition(
        &self,
        mut data: CreateFormDefinition,
        user_id: Option<i64>,
    ) -> Result<FormDefinition, FormDesignerError> {
        data.entity_type = data.entity_type.trim().to_string();
        require_text(&data.entity_type, "entity type", MAX_ENTITY_TYPE_LEN)?;
        require_text(&data.display_name, "display name", MAX_DISPLAY_NAME_LEN)?;
        prepare_fields(&mut data.fields)?;

        let mut tx = self.pool.begin().await?;
        let definition = FormDefinition::create(&mut *tx, &data)
            .await
            .map_err(|e| map_unique_violation(e, &data.entity_type))?;
        FormDesignHistory::create(
            &mut *tx,
            &CreateFormDesignHistory {
                form_definition_id: definition.id,
                user_id,
                action: HistoryAction::Create,
                previous_config: None,
                new_config: Some(definition.snapshot()),
                description: Some(format!("Created form '{}'", definition.display_name)),
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            definition_id = definition.id,
            entity_type = %definition.entity_type,
            field_count = definition.fields.len(),
            "form definition created"
        );
        Ok(definition)
    }

    /// Partial update. Exactly one history row is written per call, holding
    /// the stored state before and after.
    pub async fn update_definition(
        &self,
        id: i64,
        mut data: UpdateFormDefinition,
        user_id: Option<i64>,
    ) -> Result<FormDefinition, FormDesignerError> {
        if let Some(display_name) = &data.display_name {
            require_text(display_name, "display name", MAX_DISPLAY_NAME_LEN)?;
        }
        if let Some(fields) = data.fields.as_mut() {
            prepare_fields(fields)?;
        }

        let mut tx = self.pool.begin().await?;
        let before = FormDefinition::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| definition_not_found(id))?;
        let after = FormDefinition::update(&mut *tx, id, &data)
            .await?
            .ok_or_else(|| definition_not_found(id))?;
        FormDesignHistory::create(
            &mut *tx,
            &CreateFormDesignHistory {
                form_definition_id: id,
                user_id,
                action: HistoryAction::Update,
                previous_config: Some(before.snapshot()),
                new_config: Some(after.snapshot()),
                description: Some(format!("Updated form '{}'", after.display_name)),
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            definition_id = id,
            entity_type = %after.entity_type,
            field_count = after.fields.len(),
            "form definition updated"
        );
        Ok(after)
    }

    /// Field rows are removed with the definition; history rows are kept.
    pub async fn delete_definition(
        &self,
        id: i64,
        user_id: Option<i64>,
    ) -> Result<(), FormDesignerError> {
        let mut tx = self.pool.begin().await?;
        let before = FormDefinition::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| definition_not_found(id))?;
        FormDesignHistory::create(
            &mut *tx,
            &CreateFormDesignHistory {
                form_definition_id: id,
                user_id,
                action: HistoryAction::Delete,
                previous_config: Some(before.snapshot()),
                new_config: None,
                description: Some(format!("Deleted form '{}'", before.display_name)),
            },
        )
        .await?;
        FormDefinition::delete(&mut *tx, id).await?;
        tx.commit().await?;

        info!(definition_id = id, entity_type = %before.entity_type, "form definition deleted");
        Ok(())
    }

    pub async fn list_fields(&self, definition_id: i64) -> Result<Vec<FormField>, FormDesignerError> {
        self.get_definition_by_id(definition_id).await?;
        Ok(FormField::find_by_form_definition_id(&self.pool, definition_id).await?)
    }

    pub async fn create_field(
        &self,
        definition_id: i64,
        mut data: CreateFormField,
    ) -> Result<FormField, FormDesignerError> {
        self.get_definition_by_id(definition_id).await?;
        require_non_empty(&data.field_name, "field name")?;
        require_non_empty(&data.field_label, "field label")?;
        data.width = clamp_width(data.width);
        data.height = clamp_height(data.height);

        let field = FormField::create(&self.pool, definition_id, &data).await?;
        debug!(definition_id, field_id = field.id, field_name = %field.field_name, "form field created");
        Ok(field)
    }

    pub async fn update_field(
        &self,
        id: i64,
        mut data: UpdateFormField,
    ) -> Result<FormField, FormDesignerError> {
        if let Some(name) = &data.field_name {
            require_non_empty(name, "field name")?;
        }
        if let Some(label) = &data.field_label {
            require_non_empty(label, "field label")?;
        }
        data.width = data.width.map(clamp_width);
        data.height = data.height.map(clamp_height);

        let field = FormField::update(&self.pool, id, &data)
            .await?
            .ok_or_else(|| FormDesignerError::NotFound(format!("form field {id}")))?;
        debug!(field_id = id, "form field updated");
        Ok(field)
    }

    pub async fn delete_field(&self, id: i64) -> Result<(), FormDesignerError> {
        if FormField::delete(&self.pool, id).await? == 0 {
            return Err(FormDesignerError::NotFound(format!("form field {id}")));
        }
        debug!(field_id = id, "form field deleted");
        Ok(())
    }

    /// Newest first. History outlives its definition, so a deleted id still
    /// lists its trail.
    pub async fn history(
        &self,
        definition_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<FormDesignHistory>, FormDesignerError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);
        Ok(FormDesignHistory::find_by_form_definition_id(&self.pool, definition_id, limit).await?)
    }

    /// Check a submitted record against the stored form, applying the same
    /// rules as the renderer. Returns the full record, with defaults filled
    /// in for fields the caller omitted.
    pub async fn validate_submission(
        &self,
        entity_type: &str,
        record: FormDataRecord,
    ) -> Result<FormDataRecord, FormDesignerError> {
        let definition = self.get_definition(entity_type).await?;
        if !definition.is_active {
            return Err(FormDesignerError::Inactive(definition.entity_type));
        }

        let renderer = FormRenderer::new(definition.fields, Some(record));
        if let Err(err) = renderer.validate() {
            warn!(entity_type, field = %err.field_name, kind = %err.kind, "submission rejected");
            return Err(err.into());
        }
        Ok(renderer.record().clone())
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::field_spec::{FieldOption, FieldType},
    };

    use super::*;
    use crate::services::form_validation::ValidationKind;

    async fn service() -> FormDesignerService {
        let db = DBService::new_in_memory().await.unwrap();
        FormDesignerService::new(db.pool)
    }

    fn field(name: &str, field_type: FieldType, position: i32) -> FieldSpec {
        FieldSpec {
            field_name: name.to_string(),
            field_label: name.to_uppercase(),
            field_type,
            position,
            ..FieldSpec::new_default(0)
        }
    }

    fn customers(fields: Vec<FieldSpec>) -> CreateFormDefinition {
        CreateFormDefinition {
            entity_type: "customers".to_string(),
            display_name: "Customers".to_string(),
            description: None,
            fields,
        }
    }

    #[tokio::test]
    async fn create_normalises_and_logs_history() {
        let service = service().await;
        let mut wide = field("name", FieldType::Text, 4);
        wide.width = 400;
        let created = service
            .create_definition(customers(vec![field("email", FieldType::Email, 9), wide]), Some(7))
            .await
            .unwrap();

        let names: Vec<_> = created.fields.iter().map(|f| f.field_name.as_str()).collect();
        let positions: Vec<_> = created.fields.iter().map(|f| f.position).collect();
        assert_eq!(names, ["name", "email"]);
        assert_eq!(positions, [0, 1]);
        assert_eq!(created.fields[0].width, 100);

        let history = service.history(created.id, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::Create);
        assert_eq!(history[0].user_id, Some(7));
    }

    #[tokio::test]
    async fn duplicate_entity_type_is_reported_by_name() {
        let service = service().await;
        service.create_definition(customers(Vec::new()), None).await.unwrap();
        let err = service
            .create_definition(customers(Vec::new()), None)
            .await
            .unwrap_err();
        assert!(matches!(&err, FormDesignerError::DuplicateEntityType(t) if t == "customers"));
        assert_eq!(
            err.to_string(),
            "Form definition for entity type 'customers' already exists"
        );
    }

    #[tokio::test]
    async fn create_rejects_blank_or_oversized_input() {
        let service = service().await;
        let mut blank = customers(Vec::new());
        blank.entity_type = "   ".to_string();
        assert!(matches!(
            service.create_definition(blank, None).await,
            Err(FormDesignerError::InvalidInput(_))
        ));

        let mut long = customers(Vec::new());
        long.entity_type = "x".repeat(MAX_ENTITY_TYPE_LEN + 1);
        assert!(service.create_definition(long, None).await.is_err());

        let mut unnamed = field("a", FieldType::Text, 0);
        unnamed.field_name.clear();
        assert!(service.create_definition(customers(vec![unnamed]), None).await.is_err());
        assert!(service.list_definitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn each_update_appends_one_history_row_with_snapshots() {
        let service = service().await;
        let created = service
            .create_definition(customers(vec![field("a", FieldType::Text, 0)]), None)
            .await
            .unwrap();

        let updated = service
            .update_definition(
                created.id,
                UpdateFormDefinition {
                    display_name: Some("Clients".to_string()),
                    fields: Some(vec![
                        field("b", FieldType::Text, 5),
                        field("a", FieldType::Text, 2),
                    ]),
                    ..Default::default()
                },
                Some(3),
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name, "Clients");
        assert_eq!(updated.fields[0].field_name, "a");
        assert_eq!(updated.fields[1].position, 1);

        let history = service.history(created.id, None).await.unwrap();
        assert_eq!(history.len(), 2);
        let latest = &history[0];
        assert_eq!(latest.action, HistoryAction::Update);
        assert_eq!(latest.user_id, Some(3));
        let before = latest.previous_config.as_ref().unwrap();
        let after = latest.new_config.as_ref().unwrap();
        assert_eq!(before["displayName"], "Customers");
        assert_eq!(after["displayName"], "Clients");
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_definition_are_not_found() {
        let service = service().await;
        assert!(matches!(
            service
                .update_definition(42, UpdateFormDefinition::default(), None)
                .await,
            Err(FormDesignerError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_definition(42, None).await,
            Err(FormDesignerError::NotFound(_))
        ));
        assert!(service.history(42, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_keeps_the_audit_trail() {
        let service = service().await;
        let created = service.create_definition(customers(Vec::new()), None).await.unwrap();
        service.delete_definition(created.id, Some(1)).await.unwrap();

        assert!(matches!(
            service.get_definition("customers").await,
            Err(FormDesignerError::NotFound(_))
        ));
        let history = service.history(created.id, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, HistoryAction::Delete);
        assert!(history[0].new_config.is_none());
    }

    #[tokio::test]
    async fn field_rows_are_clamped_and_scoped_to_a_definition() {
        let service = service().await;
        let created = service.create_definition(customers(Vec::new()), None).await.unwrap();

        let row = service
            .create_field(
                created.id,
                CreateFormField {
                    field_name: "status".to_string(),
                    field_label: "Status".to_string(),
                    field_type: FieldType::Select,
                    position: 0,
                    width: 10,
                    height: 5,
                    is_required: false,
                    placeholder: None,
                    default_value: None,
                    options: vec![FieldOption::new("open", "Open")],
                    validation: None,
                    metadata: None,
                },
            )
            .await
            .unwrap();
        assert_eq!((row.width, row.height), (50, 30));

        let row = service
            .update_field(
                row.id,
                UpdateFormField {
                    width: Some(120),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(row.width, 100);
        assert_eq!(service.list_fields(created.id).await.unwrap().len(), 1);

        service.delete_field(row.id).await.unwrap();
        assert!(matches!(
            service.delete_field(row.id).await,
            Err(FormDesignerError::NotFound(_))
        ));
        assert!(matches!(
            service.list_fields(999).await,
            Err(FormDesignerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn submissions_are_validated_against_the_stored_form() {
        let service = service().await;
        let mut email = field("email", FieldType::Email, 0);
        email.is_required = true;
        let mut country = field("country", FieldType::Text, 1);
        country.default_value = Some("DE".to_string());
        let created = service
            .create_definition(customers(vec![email, country]), None)
            .await
            .unwrap();

        let err = service
            .validate_submission("customers", FormDataRecord::new())
            .await
            .unwrap_err();
        match err {
            FormDesignerError::Validation(e) => assert_eq!(e.kind, ValidationKind::Required),
            other => panic!("unexpected error {other:?}"),
        }

        let mut record = FormDataRecord::new();
        record.insert("email".to_string(), "a@b.co".to_string());
        let accepted = service.validate_submission("customers", record).await.unwrap();
        assert_eq!(accepted.get("country").map(String::as_str), Some("DE"));

        service
            .update_definition(
                created.id,
                UpdateFormDefinition {
                    is_active: Some(false),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert!(matches!(
            service.validate_submission("customers", FormDataRecord::new()).await,
            Err(FormDesignerError::Inactive(_))
        ));
    }
}
