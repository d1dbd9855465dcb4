use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Branding, FieldDefinition, FieldId, FieldKind, FormTemplate, TemplateId};
use super::uploads::FileReference;

/// Maximum number of fields shown on one page.
pub const FIELDS_PER_PAGE: usize = 5;

/// Value submitted for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Text(String),
    Files(Vec<FileReference>),
}

impl AnswerValue {
    /// Convert into the shape the field kind stores, if possible.
    fn coerce(self, kind: FieldKind) -> Option<AnswerValue> {
        match (kind, self) {
            (FieldKind::Boolean, AnswerValue::Flag(flag)) => Some(AnswerValue::Flag(flag)),
            (FieldKind::Boolean, AnswerValue::Text(text)) => {
                parse_flag(&text).map(AnswerValue::Flag)
            }
            (FieldKind::Boolean, AnswerValue::Files(_)) => None,
            (FieldKind::File, AnswerValue::Files(files)) => Some(AnswerValue::Files(files)),
            (FieldKind::File, _) => None,
            (_, AnswerValue::Text(text)) => Some(AnswerValue::Text(text)),
            (_, AnswerValue::Flag(flag)) => Some(AnswerValue::Text(flag.to_string())),
            (_, AnswerValue::Files(_)) => None,
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Flag(flag) => !flag,
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::Files(files) => files.is_empty(),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" | "" => Some(false),
        _ => None,
    }
}

/// Answers keyed by field id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet(BTreeMap<FieldId, AnswerValue>);

impl AnswerSet {
    pub fn get(&self, id: &FieldId) -> Option<&AnswerValue> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &AnswerValue)> {
        self.0.iter()
    }

    fn upsert(&mut self, id: FieldId, value: AnswerValue) {
        self.0.insert(id, value);
    }

    fn append_files(&mut self, id: FieldId, files: Vec<FileReference>) {
        match self.0.entry(id).or_insert_with(|| AnswerValue::Files(Vec::new())) {
            AnswerValue::Files(existing) => existing.extend(files),
            other => *other = AnswerValue::Files(files),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    Editing,
    Submitted,
}

/// Outcome of a page navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PageTransition {
    Advanced { page: usize },
    Retreated { page: usize },
    Unchanged,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RendererError {
    #[error("form has no field '{0}'")]
    UnknownField(FieldId),
    #[error("value does not fit field '{field}' of kind {kind:?}")]
    KindMismatch { field: FieldId, kind: FieldKind },
    #[error("form has already been submitted")]
    AlreadySubmitted,
}

/// Receives the frozen answers once the respondent completes the last page.
pub trait SubmissionHandler {
    fn on_submit(&mut self, template: &FormTemplate, answers: &AnswerSet);
}

impl<F> SubmissionHandler for F
where
    F: FnMut(&FormTemplate, &AnswerSet),
{
    fn on_submit(&mut self, template: &FormTemplate, answers: &AnswerSet) {
        self(template, answers)
    }
}

/// Paginated, one-way render session over a template.
#[derive(Debug)]
pub struct FormRenderer<H> {
    template: FormTemplate,
    current_page: usize,
    answers: AnswerSet,
    phase: RenderPhase,
    handler: H,
}

impl<H> FormRenderer<H>
where
    H: SubmissionHandler,
{
    pub fn new(template: FormTemplate, handler: H) -> Self {
        Self {
            template,
            current_page: 0,
            answers: AnswerSet::default(),
            phase: RenderPhase::Editing,
            handler,
        }
    }

    pub fn template(&self) -> &FormTemplate {
        &self.template
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn is_submitted(&self) -> bool {
        self.phase == RenderPhase::Submitted
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// `ceil(fields / FIELDS_PER_PAGE)`, with a single empty page for a field-less template.
    pub fn page_count(&self) -> usize {
        self.template.fields.len().div_ceil(FIELDS_PER_PAGE).max(1)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page + 1 >= self.page_count()
    }

    pub fn pages(&self) -> Vec<&[FieldDefinition]> {
        if self.template.fields.is_empty() {
            return vec![&self.template.fields[..]];
        }
        self.template.fields.chunks(FIELDS_PER_PAGE).collect()
    }

    pub fn current_fields(&self) -> &[FieldDefinition] {
        let fields = &self.template.fields;
        let start = (self.current_page * FIELDS_PER_PAGE).min(fields.len());
        let end = (start + FIELDS_PER_PAGE).min(fields.len());
        &fields[start..end]
    }

    pub fn progress_percent(&self) -> f32 {
        let pages = self.page_count();
        if pages == 0 {
            return 100.0;
        }
        (self.current_page + 1) as f32 / pages as f32 * 100.0
    }

    /// Upsert an answer after coercing it to the field's kind.
    pub fn record_answer(
        &mut self,
        field_id: &FieldId,
        value: AnswerValue,
    ) -> Result<(), RendererError> {
        let kind = self.editable_field_kind(field_id)?;
        let value = value
            .coerce(kind)
            .ok_or_else(|| RendererError::KindMismatch {
                field: field_id.clone(),
                kind,
            })?;
        self.answers.upsert(field_id.clone(), value);
        Ok(())
    }

    /// Add uploaded files to a file field, keeping earlier uploads.
    pub fn append_files(
        &mut self,
        field_id: &FieldId,
        files: Vec<FileReference>,
    ) -> Result<(), RendererError> {
        let kind = self.editable_field_kind(field_id)?;
        if kind != FieldKind::File {
            return Err(RendererError::KindMismatch {
                field: field_id.clone(),
                kind,
            });
        }
        self.answers.append_files(field_id.clone(), files);
        Ok(())
    }

    /// Advance a page, or submit when already on the last one.
    pub fn next(&mut self) -> PageTransition {
        if self.is_submitted() {
            return PageTransition::Unchanged;
        }
        if !self.is_last_page() {
            self.current_page += 1;
            return PageTransition::Advanced {
                page: self.current_page,
            };
        }

        self.phase = RenderPhase::Submitted;
        self.handler.on_submit(&self.template, &self.answers);
        PageTransition::Submitted
    }

    pub fn previous(&mut self) -> PageTransition {
        if self.is_submitted() || self.current_page == 0 {
            return PageTransition::Unchanged;
        }
        self.current_page -= 1;
        PageTransition::Retreated {
            page: self.current_page,
        }
    }

    /// Required fields without a meaningful answer. Display only; submission is never blocked.
    pub fn missing_required(&self) -> Vec<&FieldDefinition> {
        self.template
            .fields
            .iter()
            .filter(|field| field.required)
            .filter(|field| {
                self.answers
                    .get(&field.id)
                    .map_or(true, AnswerValue::is_blank)
            })
            .collect()
    }

    pub fn view(&self) -> RenderView {
        let submitted = self.is_submitted();
        let fields = if submitted {
            Vec::new()
        } else {
            self.current_fields()
                .iter()
                .map(|field| RenderedField {
                    definition: field.clone(),
                    value: self.answers.get(&field.id).cloned(),
                })
                .collect()
        };
        let message = if submitted {
            self.template.branding.thank_you_message.clone()
        } else {
            self.template.branding.welcome_message.clone()
        };

        RenderView {
            template_id: self.template.id.clone(),
            name: self.template.name.clone(),
            description: self.template.description.clone(),
            branding: self.template.branding.clone(),
            phase: self.phase,
            page: self.current_page,
            page_count: self.page_count(),
            progress_percent: self.progress_percent(),
            is_last_page: self.is_last_page(),
            fields,
            missing_required: self
                .missing_required()
                .into_iter()
                .map(|field| field.id.clone())
                .collect(),
            message,
        }
    }

    fn editable_field_kind(&self, field_id: &FieldId) -> Result<FieldKind, RendererError> {
        if self.is_submitted() {
            return Err(RendererError::AlreadySubmitted);
        }
        self.template
            .field(field_id)
            .map(|field| field.kind)
            .ok_or_else(|| RendererError::UnknownField(field_id.clone()))
    }
}

/// Snapshot of what the respondent currently sees.
#[derive(Debug, Clone, Serialize)]
pub struct RenderView {
    pub template_id: TemplateId,
    pub name: String,
    pub description: String,
    pub branding: Branding,
    pub phase: RenderPhase,
    pub page: usize,
    pub page_count: usize,
    pub progress_percent: f32,
    pub is_last_page: bool,
    pub fields: Vec<RenderedField>,
    pub missing_required: Vec<FieldId>,
    /// Welcome copy while editing, thank-you copy once submitted.
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedField {
    #[serde(flatten)]
    pub definition: FieldDefinition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<AnswerValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::domain::{Branding, TemplateDraft};
    use crate::forms::uploads::UploadKind;
    use chrono::Utc;

    fn template_with(count: usize) -> FormTemplate {
        let fields = (1..=count)
            .map(|n| FieldDefinition::new(n.to_string(), FieldKind::ShortText, format!("Field {n}")))
            .collect();
        TemplateDraft {
            id: None,
            name: "Consultation".to_string(),
            description: String::new(),
            fields,
            branding: Branding::default(),
        }
        .preview_template(Utc::now())
    }

    fn discard(_: &FormTemplate, _: &AnswerSet) {}

    #[test]
    fn pages_partition_fields_in_order() {
        for count in [0usize, 1, 4, 5, 6, 10, 11, 23] {
            let template = template_with(count);
            let renderer = FormRenderer::new(template.clone(), discard);
            let expected_pages = if count == 0 { 1 } else { count.div_ceil(5) };
            assert_eq!(renderer.page_count(), expected_pages, "count {count}");

            let flattened: Vec<FieldDefinition> = renderer
                .pages()
                .into_iter()
                .flat_map(|page| page.iter().cloned())
                .collect();
            assert_eq!(flattened, template.fields, "count {count}");
            assert!(renderer.pages().iter().all(|page| page.len() <= FIELDS_PER_PAGE));
        }
    }

    #[test]
    fn empty_template_is_one_page_at_full_progress() {
        let renderer = FormRenderer::new(template_with(0), discard);
        assert_eq!(renderer.page_count(), 1);
        assert!(renderer.current_fields().is_empty());
        assert_eq!(renderer.progress_percent(), 100.0);
    }

    #[test]
    fn navigation_clamps_and_tracks_progress() {
        let mut renderer = FormRenderer::new(template_with(12), discard);
        assert_eq!(renderer.previous(), PageTransition::Unchanged);
        assert_eq!(renderer.current_page(), 0);
        assert!((renderer.progress_percent() - 100.0 / 3.0).abs() < 0.01);

        assert_eq!(renderer.next(), PageTransition::Advanced { page: 1 });
        assert_eq!(renderer.next(), PageTransition::Advanced { page: 2 });
        assert_eq!(renderer.current_fields().len(), 2);
        assert_eq!(renderer.progress_percent(), 100.0);
        assert_eq!(renderer.previous(), PageTransition::Retreated { page: 1 });
    }

    #[test]
    fn submission_handler_runs_once() {
        let mut calls = Vec::new();
        {
            let mut renderer = FormRenderer::new(template_with(6), |_: &FormTemplate, answers: &AnswerSet| {
                calls.push(answers.clone());
            });
            renderer
                .record_answer(&FieldId::new("1"), AnswerValue::Text("Ada".to_string()))
                .expect("answer recorded");
            assert_eq!(renderer.next(), PageTransition::Advanced { page: 1 });
            assert_eq!(renderer.next(), PageTransition::Submitted);
            for _ in 0..3 {
                assert_eq!(renderer.next(), PageTransition::Unchanged);
            }
            assert_eq!(renderer.previous(), PageTransition::Unchanged);
            assert_eq!(renderer.current_page(), 1);
            assert!(renderer.is_submitted());
            assert_eq!(
                renderer.record_answer(&FieldId::new("2"), AnswerValue::Text("late".to_string())),
                Err(RendererError::AlreadySubmitted)
            );
        }
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].get(&FieldId::new("1")),
            Some(&AnswerValue::Text("Ada".to_string()))
        );
    }

    #[test]
    fn answers_are_coerced_by_kind() {
        let mut template = template_with(0);
        template.fields = vec![
            FieldDefinition::new("consent", FieldKind::Boolean, "Consent"),
            FieldDefinition::new("email", FieldKind::Email, "Email"),
            FieldDefinition::new("photos", FieldKind::File, "Photos"),
        ];
        let mut renderer = FormRenderer::new(template, discard);

        renderer
            .record_answer(&FieldId::new("consent"), AnswerValue::Text("on".to_string()))
            .expect("checkbox text coerces");
        assert_eq!(
            renderer.answers().get(&FieldId::new("consent")),
            Some(&AnswerValue::Flag(true))
        );

        renderer
            .record_answer(&FieldId::new("email"), AnswerValue::Flag(false))
            .expect("flag coerces to text");
        assert_eq!(
            renderer.answers().get(&FieldId::new("email")),
            Some(&AnswerValue::Text("false".to_string()))
        );

        assert!(matches!(
            renderer.record_answer(&FieldId::new("photos"), AnswerValue::Text("x".to_string())),
            Err(RendererError::KindMismatch { .. })
        ));
        assert!(matches!(
            renderer.record_answer(&FieldId::new("ghost"), AnswerValue::Flag(true)),
            Err(RendererError::UnknownField(_))
        ));
    }

    #[test]
    fn uploads_accumulate_on_file_fields() {
        let mut template = template_with(0);
        template.fields = vec![FieldDefinition::new("photos", FieldKind::File, "Photos")];
        let mut renderer = FormRenderer::new(template, discard);
        let file = |name: &str| FileReference {
            name: name.to_string(),
            url: format!("https://cdn.test/{name}"),
            kind: UploadKind::Photos,
            size: 10,
        };

        renderer
            .append_files(&FieldId::new("photos"), vec![file("front.jpg")])
            .expect("first batch");
        renderer
            .append_files(&FieldId::new("photos"), vec![file("crown.jpg")])
            .expect("second batch");

        match renderer.answers().get(&FieldId::new("photos")) {
            Some(AnswerValue::Files(files)) => assert_eq!(files.len(), 2),
            other => panic!("unexpected answer {other:?}"),
        }
    }

    #[test]
    fn required_fields_are_reported_but_do_not_block_submission() {
        let mut template = template_with(2);
        template.fields[0].required = true;
        let mut submitted = false;
        {
            let mut renderer = FormRenderer::new(template, |_: &FormTemplate, _: &AnswerSet| {
                submitted = true;
            });
            assert_eq!(renderer.missing_required().len(), 1);
            assert_eq!(renderer.view().missing_required, vec![FieldId::new("1")]);
            assert_eq!(renderer.next(), PageTransition::Submitted);
            let view = renderer.view();
            assert!(view.fields.is_empty());
            assert_eq!(view.message, Branding::default().thank_you_message);
        }
        assert!(submitted);
    }
}
