use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for persisted form templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub String);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a field, unique within its template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub String);

impl FieldId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of input kinds a template can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    ShortText,
    Email,
    Phone,
    LongText,
    SingleSelect,
    Boolean,
    File,
    Date,
}

impl FieldKind {
    pub const ALL: [FieldKind; 8] = [
        FieldKind::ShortText,
        FieldKind::Email,
        FieldKind::Phone,
        FieldKind::LongText,
        FieldKind::SingleSelect,
        FieldKind::Boolean,
        FieldKind::File,
        FieldKind::Date,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            FieldKind::ShortText => "Text Input",
            FieldKind::Email => "Email",
            FieldKind::Phone => "Phone",
            FieldKind::LongText => "Text Area",
            FieldKind::SingleSelect => "Dropdown",
            FieldKind::Boolean => "Checkbox",
            FieldKind::File => "File Upload",
            FieldKind::Date => "Date",
        }
    }

    /// Checkboxes and uploads have nothing to show as placeholder text.
    pub const fn accepts_placeholder(self) -> bool {
        !matches!(self, FieldKind::Boolean | FieldKind::File)
    }

    pub const fn requires_options(self) -> bool {
        matches!(self, FieldKind::SingleSelect)
    }
}

/// Schema for one input element of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: FieldId,
    pub kind: FieldKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>, kind: FieldKind, label: impl Into<String>) -> Self {
        Self {
            id: FieldId(id.into()),
            kind,
            label: label.into(),
            placeholder: None,
            required: false,
            options: None,
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Checks the options invariant: present and non-empty iff single select.
    pub fn validate(&self) -> Result<(), FieldDefinitionError> {
        let has_options = self
            .options
            .as_ref()
            .is_some_and(|options| !options.is_empty());

        if self.kind.requires_options() && !has_options {
            return Err(FieldDefinitionError::MissingOptions {
                field: self.id.clone(),
            });
        }
        if !self.kind.requires_options() && self.options.is_some() {
            return Err(FieldDefinitionError::UnexpectedOptions {
                field: self.id.clone(),
                kind: self.kind,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldDefinitionError {
    #[error("field '{field}' is a dropdown but has no options")]
    MissingOptions { field: FieldId },
    #[error("field '{field}' of kind {kind:?} cannot carry options")]
    UnexpectedOptions { field: FieldId, kind: FieldKind },
    #[error("field id '{field}' appears more than once")]
    DuplicateId { field: FieldId },
}

/// Visual identity and copy shown to respondents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branding {
    pub primary_color: String,
    pub background_color: String,
    pub welcome_message: String,
    pub thank_you_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            primary_color: "#2563EB".to_string(),
            background_color: "#F8FAFC".to_string(),
            welcome_message: "Welcome! Please fill out this intake form to help us better understand your needs.".to_string(),
            thank_you_message: "Thank you for completing the form. We will review your information and get back to you soon.".to_string(),
            logo: None,
            organization_name: None,
            contact_info: None,
        }
    }
}

/// Aggregate distribution counters for a template.
///
/// `completed` only counts invitations that reached the completed state, so the rate can
/// never be inflated by anonymous public-link submissions; those land in `public_submissions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateStats {
    pub sent: u32,
    pub completed: u32,
    /// Rounded percentage of `completed / sent`.
    pub completion_rate: u8,
    #[serde(default)]
    pub public_submissions: u32,
}

impl TemplateStats {
    pub fn new(sent: u32, completed: u32) -> Self {
        Self {
            sent,
            completed,
            completion_rate: completion_rate(sent, completed),
            public_submissions: 0,
        }
    }

    pub fn record_sent(&mut self, count: u32) {
        self.sent = self.sent.saturating_add(count);
        self.completion_rate = completion_rate(self.sent, self.completed);
    }

    /// An invitation moved to completed.
    pub fn record_completed(&mut self) {
        self.completed = self.completed.saturating_add(1);
        self.completion_rate = completion_rate(self.sent, self.completed);
    }

    pub fn record_public_submission(&mut self) {
        self.public_submissions = self.public_submissions.saturating_add(1);
    }
}

/// `completed / sent` as a rounded percentage, capped at 100. Zero sends yield 0.
pub fn completion_rate(sent: u32, completed: u32) -> u8 {
    if sent == 0 {
        return 0;
    }
    let pct = (f64::from(completed) / f64::from(sent) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Persisted template with lifecycle metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormTemplate {
    pub id: TemplateId,
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldDefinition>,
    pub branding: Branding,
    pub share_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stats: TemplateStats,
}

impl FormTemplate {
    pub fn field(&self, id: &FieldId) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| &field.id == id)
    }

    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        needle.is_empty()
            || self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

/// Working copy edited by the builder. Templates that have never been saved carry no id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TemplateId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub branding: Branding,
}

impl TemplateDraft {
    /// Ephemeral template used when rendering a draft that has not been persisted.
    pub fn preview_template(&self, now: DateTime<Utc>) -> FormTemplate {
        FormTemplate {
            id: self
                .id
                .clone()
                .unwrap_or_else(|| TemplateId("preview".to_string())),
            name: self.name.clone(),
            description: self.description.clone(),
            fields: self.fields.clone(),
            branding: self.branding.clone(),
            share_url: String::new(),
            created_at: now,
            updated_at: now,
            stats: TemplateStats::default(),
        }
    }
}

impl From<&FormTemplate> for TemplateDraft {
    fn from(template: &FormTemplate) -> Self {
        Self {
            id: Some(template.id.clone()),
            name: template.name.clone(),
            description: template.description.clone(),
            fields: template.fields.clone(),
            branding: template.branding.clone(),
        }
    }
}

/// Lowercase the name and collapse every run of non-alphanumerics into one dash.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("form");
    }
    slug
}

/// `{base}/intake/{slug}-{suffix}`
pub fn share_url(base: &str, name: &str, suffix: &str) -> String {
    format!(
        "{}/intake/{}-{}",
        base.trim_end_matches('/'),
        slugify(name),
        suffix
    )
}
