use std::{fs, path::PathBuf};

use anyhow::Context;
use db::models::{
    field_spec::{FieldOption, FieldSpec, FieldType},
    form_definition::{CreateFormDefinition, FormDefinition, UpdateFormDefinition},
    form_design_history::{FormDesignHistory, HistoryAction},
    form_field::{CreateFormField, FormField, UpdateFormField},
};
use services::services::{
    form_renderer::{KeyboardHint, LabelPlacement, RenderedField, SubmitButton, Widget},
    form_validation::{FieldValidationError, ValidationKind},
};
use ts_rs::TS;
use utils::response::ApiResponse;

const DEFAULT_OUTPUT: &str = "shared/types.ts";

fn main() -> anyhow::Result<()> {
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let decls = [
        FieldType::decl(),
        FieldOption::decl(),
        FieldSpec::decl(),
        FormDefinition::decl(),
        CreateFormDefinition::decl(),
        UpdateFormDefinition::decl(),
        FormField::decl(),
        CreateFormField::decl(),
        UpdateFormField::decl(),
        HistoryAction::decl(),
        FormDesignHistory::decl(),
        ValidationKind::decl(),
        FieldValidationError::decl(),
        KeyboardHint::decl(),
        LabelPlacement::decl(),
        Widget::decl(),
        RenderedField::decl(),
        SubmitButton::decl(),
        ApiResponse::<(), ()>::decl(),
    ];

    let mut content = String::from(
        "// This file was generated by `generate-types`. Do not edit it by hand.\n\n",
    );
    for decl in decls {
        content.push_str("export ");
        content.push_str(&decl);
        content.push_str("\n\n");
    }
    content.push_str("export type FormDataRecord = Record<string, string>;\n");

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&output, content).with_context(|| format!("failed to write {}", output.display()))?;
    println!("wrote {}", output.display());
    Ok(())
}
