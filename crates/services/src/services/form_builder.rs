//! Interactive editor over an in-memory, ordered list of field specs.
//!
//! The builder owns a working copy of the list. Every change is reported to
//! the host through [`FormBuilderHost::fields_changed`]; nothing reaches the
//! store until [`FormBuilder::save`].

use db::models::field_spec::{
    DEFAULT_HEIGHT, DEFAULT_WIDTH, FieldOption, FieldSpec, FieldType, clamp_height, clamp_width,
    normalize_positions, parse_dimension_input, reindex_positions, sorted_by_position,
};
use tracing::debug;

/// Receiver of builder events.
pub trait FormBuilderHost {
    /// Called after every change to the working list.
    fn fields_changed(&mut self, fields: &[FieldSpec]);

    /// Called once per explicit save with the renormalised list.
    fn save(&mut self, fields: Vec<FieldSpec>);

    fn cancel(&mut self);
}

pub struct FormBuilder<H> {
    fields: Vec<FieldSpec>,
    selected_field_id: Option<String>,
    editing_field: Option<FieldSpec>,
    pending_delete: Option<String>,
    host: H,
}

impl<H: FormBuilderHost> FormBuilder<H> {
    pub fn new(fields: Vec<FieldSpec>, host: H) -> Self {
        Self {
            fields: sorted_by_position(&fields),
            selected_field_id: None,
            editing_field: None,
            pending_delete: None,
            host,
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn selected_field_id(&self) -> Option<&str> {
        self.selected_field_id.as_deref()
    }

    /// The editor draft, if the editor is open.
    pub fn editing_field(&self) -> Option<&FieldSpec> {
        self.editing_field.as_ref()
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.id == id)
    }

    fn notify(&mut self) {
        self.host.fields_changed(&self.fields);
    }

    /// Append a default text field and open it in the editor. Returns the new
    /// field's id.
    pub fn add_field(&mut self) -> String {
        let field = FieldSpec::new_default(self.fields.len());
        let id = field.id.clone();
        debug!(field_id = %id, position = field.position, "field added");

        self.editing_field = Some(field.clone());
        self.fields.push(field);
        self.notify();
        id
    }

    /// Replace the field with the same id and close the editor. Returns
    /// `false`, leaving everything untouched, when no field has that id.
    pub fn update_field(&mut self, updated: FieldSpec) -> bool {
        let Some(index) = self.index_of(&updated.id) else {
            debug!(field_id = %updated.id, "update ignored, no such field");
            return false;
        };

        debug!(field_id = %updated.id, field_name = %updated.field_name, "field updated");
        self.fields[index] = updated;
        self.editing_field = None;
        self.notify();
        true
    }

    pub fn select_field(&mut self, id: &str) -> bool {
        if !self.open_editor(id) {
            return false;
        }
        self.selected_field_id = Some(id.to_string());
        true
    }

    /// Open the editor on a copy of the field.
    pub fn open_editor(&mut self, id: &str) -> bool {
        match self.field(id).cloned() {
            Some(field) => {
                self.editing_field = Some(field);
                true
            }
            None => false,
        }
    }

    /// Close the editor, dropping any uncommitted draft.
    pub fn close_editor(&mut self) {
        self.editing_field = None;
    }

    /// Apply `edit` to the editor draft. Returns `false` when the editor is
    /// closed.
    pub fn edit_draft(&mut self, edit: impl FnOnce(&mut FieldSpec)) -> bool {
        match self.editing_field.as_mut() {
            Some(draft) => {
                edit(draft);
                true
            }
            None => false,
        }
    }

    pub fn edit_name(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        self.edit_draft(|d| d.field_name = name)
    }

    pub fn edit_label(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        self.edit_draft(|d| d.field_label = label)
    }

    pub fn edit_type(&mut self, field_type: FieldType) -> bool {
        self.edit_draft(|d| d.field_type = field_type)
    }

    pub fn edit_placeholder(&mut self, placeholder: impl Into<String>) -> bool {
        let placeholder = placeholder.into();
        self.edit_draft(|d| d.placeholder = Some(placeholder))
    }

    pub fn edit_default_value(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        self.edit_draft(|d| d.default_value = Some(value))
    }

    pub fn edit_required(&mut self, required: bool) -> bool {
        self.edit_draft(|d| d.is_required = required)
    }

    pub fn edit_options(&mut self, options: Vec<FieldOption>) -> bool {
        self.edit_draft(|d| d.options = options)
    }

    /// Raw width keystrokes. Unreadable input becomes 100, then clamps.
    pub fn edit_width_input(&mut self, input: &str) -> bool {
        let width = clamp_width(parse_dimension_input(input, DEFAULT_WIDTH));
        self.edit_draft(|d| d.width = width)
    }

    /// Raw height keystrokes. Unreadable input becomes 40, then clamps.
    pub fn edit_height_input(&mut self, input: &str) -> bool {
        let height = clamp_height(parse_dimension_input(input, DEFAULT_HEIGHT));
        self.edit_draft(|d| d.height = height)
    }

    /// Write the draft back into the list.
    pub fn commit_editor(&mut self) -> bool {
        match self.editing_field.clone() {
            Some(draft) => self.update_field(draft),
            None => false,
        }
    }

    /// First step of a delete; nothing is removed until confirmed.
    pub fn request_delete(&mut self, id: &str) -> bool {
        if self.index_of(id).is_none() {
            return false;
        }
        self.pending_delete = Some(id.to_string());
        true
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Remove the field awaiting confirmation. Remaining positions are left
    /// as they are; [`save`](Self::save) closes the gaps.
    pub fn confirm_delete(&mut self) -> Option<FieldSpec> {
        let id = self.pending_delete.take()?;
        let index = self.index_of(&id)?;
        let removed = self.fields.remove(index);

        if self.selected_field_id.as_deref() == Some(id.as_str()) {
            self.selected_field_id = None;
        }
        if self.editing_field.as_ref().is_some_and(|f| f.id == id) {
            self.editing_field = None;
        }

        debug!(field_id = %id, remaining = self.fields.len(), "field deleted");
        self.notify();
        Some(removed)
    }

    fn swap_and_reindex(&mut self, a: usize, b: usize) {
        let mut reordered = self.fields.clone();
        reordered.swap(a, b);
        reindex_positions(&mut reordered);
        self.fields = reordered;
        self.notify();
    }

    /// Returns `false` for the first field or an unknown id.
    pub fn move_field_up(&mut self, id: &str) -> bool {
        match self.index_of(id) {
            Some(index) if index > 0 => {
                debug!(field_id = %id, from = index, to = index - 1, "field moved");
                self.swap_and_reindex(index, index - 1);
                true
            }
            _ => false,
        }
    }

    /// Returns `false` for the last field or an unknown id.
    pub fn move_field_down(&mut self, id: &str) -> bool {
        match self.index_of(id) {
            Some(index) if index + 1 < self.fields.len() => {
                debug!(field_id = %id, from = index, to = index + 1, "field moved");
                self.swap_and_reindex(index, index + 1);
                true
            }
            _ => false,
        }
    }

    pub fn resize_field(&mut self, id: &str, width: i32, height: i32) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };

        let field = &mut self.fields[index];
        field.width = clamp_width(width);
        field.height = clamp_height(height);
        debug!(field_id = %id, width = field.width, height = field.height, "field resized");
        self.notify();
        true
    }

    /// Resize from raw input, falling back to 100 x 40 for unreadable values.
    pub fn resize_field_from_input(&mut self, id: &str, width: &str, height: &str) -> bool {
        self.resize_field(
            id,
            parse_dimension_input(width, DEFAULT_WIDTH),
            parse_dimension_input(height, DEFAULT_HEIGHT),
        )
    }

    /// Renormalise positions and hand the list to the host.
    pub fn save(&mut self) {
        normalize_positions(&mut self.fields);
        debug!(field_count = self.fields.len(), "form saved");
        self.host.save(self.fields.clone());
    }

    /// Discard the working copy. Returns the host.
    pub fn cancel(mut self) -> H {
        debug!(field_count = self.fields.len(), "form edit cancelled");
        self.host.cancel();
        self.host
    }
}
