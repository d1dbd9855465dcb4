use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{completion_rate, FormTemplate, TemplateId};
use crate::views::{Badge, BadgeTone};

pub const DEFAULT_INVITATION_MESSAGE: &str = "Hi there!\n\nI'd like to invite you to complete our patient intake form. This will help us better understand your needs and provide you with the best possible care.\n\nPlease click the link below to get started:\n\nThe form should take about 10-15 minutes to complete.\n\nIf you have any questions, please don't hesitate to reach out.\n\nBest regards";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributionId(pub String);

impl fmt::Display for DistributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery state of one form sent to one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    Sent,
    Opened,
    Completed,
    Expired,
}

impl DistributionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DistributionStatus::Sent => "sent",
            DistributionStatus::Opened => "opened",
            DistributionStatus::Completed => "completed",
            DistributionStatus::Expired => "expired",
        }
    }

    pub const fn badge(self) -> Badge {
        match self {
            DistributionStatus::Sent => Badge::new("Sent", BadgeTone::Blue).with_icon("mail"),
            DistributionStatus::Opened => {
                Badge::new("Opened", BadgeTone::Yellow).with_icon("alert-circle")
            }
            DistributionStatus::Completed => {
                Badge::new("Completed", BadgeTone::Green).with_icon("check-circle")
            }
            DistributionStatus::Expired => Badge::new("Expired", BadgeTone::Red).with_icon("clock"),
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            DistributionStatus::Completed | DistributionStatus::Expired
        )
    }

    const fn rank(self) -> u8 {
        match self {
            DistributionStatus::Sent => 0,
            DistributionStatus::Opened => 1,
            DistributionStatus::Completed => 2,
            DistributionStatus::Expired => 3,
        }
    }

    /// Sent -> Opened -> Completed, with Expired reachable from any non-terminal state.
    /// Re-applying the current state is a no-op.
    pub fn advance_to(self, next: DistributionStatus) -> Result<Self, StatusTransitionError> {
        if self == next {
            return Ok(self);
        }
        let allowed = !self.is_terminal()
            && (next == DistributionStatus::Expired || next.rank() > self.rank());
        if allowed {
            Ok(next)
        } else {
            Err(StatusTransitionError {
                from: self,
                to: next,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("distribution cannot move from {} to {}", .from.label(), .to.label())]
pub struct StatusTransitionError {
    pub from: DistributionStatus,
    pub to: DistributionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One form instance sent to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub id: DistributionId,
    pub template_id: TemplateId,
    pub recipient: Recipient,
    pub status: DistributionStatus,
    pub sent_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl DistributionRecord {
    pub fn sent(
        id: DistributionId,
        template_id: TemplateId,
        recipient: Recipient,
        sent_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id,
            template_id,
            recipient,
            status: DistributionStatus::Sent,
            sent_at,
            completed_at: None,
            expires_at: sent_at + ttl,
        }
    }

    pub fn transition(&mut self, next: DistributionStatus) -> Result<(), StatusTransitionError> {
        self.status = self.status.advance_to(next)?;
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), StatusTransitionError> {
        self.transition(DistributionStatus::Completed)?;
        self.completed_at.get_or_insert(now);
        Ok(())
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && now >= self.expires_at
    }

    pub fn view(&self) -> DistributionRecordView {
        DistributionRecordView {
            id: self.id.clone(),
            recipient: self.recipient.clone(),
            status: self.status,
            badge: self.status.badge(),
            sent_at: self.sent_at,
            completed_at: self.completed_at,
            expires_at: self.expires_at,
            can_resend: self.status != DistributionStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionRecordView {
    pub id: DistributionId,
    pub recipient: Recipient,
    pub status: DistributionStatus,
    pub badge: Badge,
    pub sent_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub can_resend: bool,
}

/// Split a comma separated recipient list, trimming entries and dropping empties.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn embed_snippet(share_url: &str) -> String {
    format!(r#"<iframe src="{share_url}" width="100%" height="600" frameborder="0"></iframe>"#)
}

/// Personal link that lets the service attribute an intake to its distribution record.
pub fn invitation_link(share_url: &str, distribution_id: &DistributionId) -> String {
    format!("{share_url}?invite={distribution_id}")
}

/// Stand-in for a generated QR image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrPlaceholder {
    pub target_url: String,
    pub caption: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShareAnalytics {
    pub total_sent: usize,
    pub completed: usize,
    pub completion_rate: u8,
}

impl ShareAnalytics {
    pub fn from_records(records: &[DistributionRecord]) -> Self {
        let total_sent = records.len();
        let completed = records
            .iter()
            .filter(|record| record.status == DistributionStatus::Completed)
            .count();
        Self {
            total_sent,
            completed,
            completion_rate: completion_rate(
                u32::try_from(total_sent).unwrap_or(u32::MAX),
                u32::try_from(completed).unwrap_or(u32::MAX),
            ),
        }
    }
}

/// Everything the sharing screen shows for one template.
#[derive(Debug, Clone, Serialize)]
pub struct SharePanel {
    pub template_id: TemplateId,
    pub template_name: String,
    pub share_url: String,
    pub embed_snippet: String,
    pub qr: QrPlaceholder,
    pub default_message: &'static str,
    pub analytics: ShareAnalytics,
    pub records: Vec<DistributionRecordView>,
}

impl SharePanel {
    pub fn build(template: &FormTemplate, records: &[DistributionRecord]) -> Self {
        Self {
            template_id: template.id.clone(),
            template_name: template.name.clone(),
            share_url: template.share_url.clone(),
            embed_snippet: embed_snippet(&template.share_url),
            qr: QrPlaceholder {
                target_url: template.share_url.clone(),
                caption: "Patients can scan this QR code to access the form",
            },
            default_message: DEFAULT_INVITATION_MESSAGE,
            analytics: ShareAnalytics::from_records(records),
            records: records.iter().map(DistributionRecord::view).collect(),
        }
    }
}

/// Payload handed to the dispatch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invitation {
    pub template_id: TemplateId,
    pub template_name: String,
    pub message: String,
    pub deliveries: Vec<InvitationDelivery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvitationDelivery {
    pub distribution_id: DistributionId,
    pub email: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub template_id: TemplateId,
    pub recipient_count: usize,
    pub distribution_ids: Vec<DistributionId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(status: DistributionStatus) -> DistributionRecord {
        let sent_at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let mut record = DistributionRecord::sent(
            DistributionId("dist-000001".to_string()),
            TemplateId("tpl-000001".to_string()),
            Recipient {
                email: "john@example.com".to_string(),
                name: Some("John Smith".to_string()),
            },
            sent_at,
            Duration::days(7),
        );
        record.status = status;
        record
    }

    #[test]
    fn recipients_are_trimmed_and_empties_dropped() {
        assert_eq!(
            parse_recipients("a@x.com, b@y.com ,, c@z.com"),
            vec!["a@x.com", "b@y.com", "c@z.com"]
        );
        assert!(parse_recipients("   ").is_empty());
        assert!(parse_recipients(" , ,").is_empty());
        assert!(parse_recipients("").is_empty());
    }

    #[test]
    fn embed_snippet_is_fixed_size_iframe() {
        assert_eq!(
            embed_snippet("https://forms.hairflow.com/intake/consult-1"),
            r#"<iframe src="https://forms.hairflow.com/intake/consult-1" width="100%" height="600" frameborder="0"></iframe>"#
        );
    }

    #[test]
    fn status_moves_forward_only() {
        use DistributionStatus::*;
        assert_eq!(Sent.advance_to(Opened), Ok(Opened));
        assert_eq!(Sent.advance_to(Completed), Ok(Completed));
        assert_eq!(Opened.advance_to(Completed), Ok(Completed));
        assert_eq!(Opened.advance_to(Opened), Ok(Opened));
        assert!(Opened.advance_to(Sent).is_err());
        assert!(Completed.advance_to(Opened).is_err());
    }

    #[test]
    fn expiry_preempts_any_open_state() {
        use DistributionStatus::*;
        assert_eq!(Sent.advance_to(Expired), Ok(Expired));
        assert_eq!(Opened.advance_to(Expired), Ok(Expired));
        assert!(Completed.advance_to(Expired).is_err());
        assert!(Expired.advance_to(Completed).is_err());
    }

    #[test]
    fn every_status_has_a_distinct_badge() {
        use DistributionStatus::*;
        let badges: Vec<Badge> = [Sent, Opened, Completed, Expired]
            .into_iter()
            .map(DistributionStatus::badge)
            .collect();
        for (index, badge) in badges.iter().enumerate() {
            assert!(badges[index + 1..].iter().all(|other| other.label != badge.label));
        }
        assert_eq!(Completed.badge().tone, BadgeTone::Green);
    }

    #[test]
    fn overdue_only_for_open_records_past_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 23, 0, 0, 0).unwrap();
        assert!(record(DistributionStatus::Sent).is_overdue(now));
        assert!(record(DistributionStatus::Opened).is_overdue(now));
        assert!(!record(DistributionStatus::Completed).is_overdue(now));

        let early = Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap();
        assert!(!record(DistributionStatus::Sent).is_overdue(early));
    }

    #[test]
    fn analytics_count_completed_records() {
        let records = vec![
            record(DistributionStatus::Completed),
            record(DistributionStatus::Opened),
            record(DistributionStatus::Sent),
        ];
        let analytics = ShareAnalytics::from_records(&records);
        assert_eq!(analytics.total_sent, 3);
        assert_eq!(analytics.completed, 1);
        assert_eq!(analytics.completion_rate, 33);
    }

    #[test]
    fn completing_stamps_completion_time_once() {
        let mut record = record(DistributionStatus::Opened);
        let first = Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap();
        record.complete(first).expect("opened record completes");
        assert_eq!(record.completed_at, Some(first));
        assert!(!record.view().can_resend);
    }
}
