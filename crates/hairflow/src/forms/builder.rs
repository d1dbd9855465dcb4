use serde::{Deserialize, Serialize};

use super::domain::{Branding, FieldDefinition, FieldId, FieldKind, FormTemplate, TemplateDraft};

/// Partial update merged into a single field. `None` leaves the attribute untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl FieldPatch {
    pub fn required(required: bool) -> Self {
        Self {
            required: Some(required),
            ..Self::default()
        }
    }

    pub fn kind(kind: FieldKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    fn apply(self, field: &mut FieldDefinition) {
        if let Some(kind) = self.kind {
            field.kind = kind;
        }
        if let Some(label) = self.label {
            field.label = label;
        }
        if let Some(placeholder) = self.placeholder {
            field.placeholder = Some(placeholder);
        }
        if let Some(required) = self.required {
            field.required = required;
        }
        if let Some(options) = self.options {
            field.options = Some(options);
        }
    }
}

/// Split a dropdown's option block, one option per line, dropping blank lines.
pub fn parse_options(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Interactive editor over one working draft.
#[derive(Debug, Clone)]
pub struct FormBuilder {
    draft: TemplateDraft,
    field_sequence: u64,
}

impl Default for FormBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormBuilder {
    /// Start a new template from the three-field skeleton.
    pub fn new() -> Self {
        let draft = TemplateDraft {
            id: None,
            name: String::new(),
            description: String::new(),
            fields: default_fields(),
            branding: Branding::default(),
        };
        Self::from_draft(draft)
    }

    /// Edit an existing template. The draft keeps the template id so saving updates it.
    pub fn editing(template: &FormTemplate) -> Self {
        Self::from_draft(TemplateDraft::from(template))
    }

    pub fn from_draft(draft: TemplateDraft) -> Self {
        let field_sequence = draft.fields.len() as u64;
        Self {
            draft,
            field_sequence,
        }
    }

    pub fn draft(&self) -> &TemplateDraft {
        &self.draft
    }

    pub fn into_draft(self) -> TemplateDraft {
        self.draft
    }

    pub fn field(&self, id: &FieldId) -> Option<&FieldDefinition> {
        self.draft.fields.iter().find(|field| &field.id == id)
    }

    /// Append a blank short-text field and return its generated id.
    pub fn add_field(&mut self) -> FieldId {
        let id = self.next_field_id();
        self.draft.fields.push(FieldDefinition {
            id: id.clone(),
            kind: FieldKind::ShortText,
            label: "New Field".to_string(),
            placeholder: Some(String::new()),
            required: false,
            options: None,
        });
        id
    }

    /// Merge `patch` into the field with `id`. Returns false when no such field exists.
    pub fn update_field(&mut self, id: &FieldId, patch: FieldPatch) -> bool {
        match self.draft.fields.iter_mut().find(|field| &field.id == id) {
            Some(field) => {
                patch.apply(field);
                true
            }
            None => false,
        }
    }

    pub fn remove_field(&mut self, id: &FieldId) -> bool {
        let before = self.draft.fields.len();
        self.draft.fields.retain(|field| &field.id != id);
        self.draft.fields.len() != before
    }

    /// Replace a dropdown's options from a multi-line text block.
    pub fn set_options_text(&mut self, id: &FieldId, text: &str) -> bool {
        self.update_field(
            id,
            FieldPatch {
                options: Some(parse_options(text)),
                ..FieldPatch::default()
            },
        )
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    pub fn set_primary_color(&mut self, color: impl Into<String>) {
        self.draft.branding.primary_color = color.into();
    }

    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.draft.branding.background_color = color.into();
    }

    pub fn set_welcome_message(&mut self, message: impl Into<String>) {
        self.draft.branding.welcome_message = message.into();
    }

    pub fn set_thank_you_message(&mut self, message: impl Into<String>) {
        self.draft.branding.thank_you_message = message.into();
    }

    pub fn set_logo(&mut self, logo: Option<String>) {
        self.draft.branding.logo = logo;
    }

    pub fn set_organization_name(&mut self, name: Option<String>) {
        self.draft.branding.organization_name = name;
    }

    pub fn set_contact_info(&mut self, contact: Option<String>) {
        self.draft.branding.contact_info = contact;
    }

    /// Hand the working draft to the persistence callback as-is.
    pub fn save<F, T>(&self, on_save: F) -> T
    where
        F: FnOnce(&TemplateDraft) -> T,
    {
        on_save(&self.draft)
    }

    /// Hand the working draft to the preview callback as-is.
    pub fn preview<F, T>(&self, on_preview: F) -> T
    where
        F: FnOnce(&TemplateDraft) -> T,
    {
        on_preview(&self.draft)
    }

    fn next_field_id(&mut self) -> FieldId {
        loop {
            self.field_sequence += 1;
            let candidate = FieldId(format!("field-{}", self.field_sequence));
            if self.field(&candidate).is_none() {
                return candidate;
            }
        }
    }
}

fn default_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("1", FieldKind::ShortText, "First Name")
            .with_placeholder("Enter your first name")
            .required(),
        FieldDefinition::new("2", FieldKind::ShortText, "Last Name")
            .with_placeholder("Enter your last name")
            .required(),
        FieldDefinition::new("3", FieldKind::Email, "Email Address")
            .with_placeholder("Enter your email")
            .required(),
    ]
}
