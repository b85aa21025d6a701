use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::ZoomApi;
use crate::crm::CrmApi;
use crate::error::SyncError;
use crate::models::crm::{Attendee, RegisteredParticipant};
use crate::models::settings::ZoomCredentials;
use crate::models::zoom::ZoomEntityKind;
use crate::services::settings::SettingsService;

/// Participant status written for everyone who joined
pub const ATTENDED_STATUS: &str = "Attended";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Updated,
    Skipped,
    Failed,
}

// Outcome of reconciling one event
#[derive(Debug, Clone, Serialize)]
pub struct EventAttendance {
    pub event_id: i64,
    pub status: EventStatus,
    pub entity: Option<ZoomEntityKind>,
    pub zoom_id: Option<String>,
    pub attendees: Vec<Attendee>,
    pub message: Option<String>,
}

impl EventAttendance {
    fn skipped(event_id: i64, message: String) -> Self {
        Self {
            event_id,
            status: EventStatus::Skipped,
            entity: None,
            zoom_id: None,
            attendees: Vec::new(),
            message: Some(message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReport {
    pub days: u32,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub updated_participants: usize,
    pub events: Vec<EventAttendance>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Pick the registered participants that attended.
///
/// For a webinar `emails` are the absentees and a contact email outside the
/// set counts as attendance; for a meeting they are the joined participants
/// and a contact email inside the set counts. Every email of the contact is
/// checked, participants without one never match, and each participant is
/// returned at most once with the first matching email.
pub fn select_attendees(
    participants: &[RegisteredParticipant],
    emails: &HashSet<String>,
    kind: ZoomEntityKind,
) -> Vec<Attendee> {
    let mut seen = HashSet::new();
    participants
        .iter()
        .filter_map(|participant| {
            let email = participant.emails.iter().find(|email| {
                let normalized = normalize_email(email);
                if normalized.is_empty() {
                    return false;
                }

                let listed = emails.contains(&normalized);
                match kind {
                    ZoomEntityKind::Webinar => !listed,
                    ZoomEntityKind::Meeting => listed,
                }
            })?;

            seen.insert(participant.participant_id).then(|| Attendee {
                email: email.clone(),
                contact_id: participant.contact_id,
                participant_id: participant.participant_id,
            })
        })
        .collect()
}

/// Marks participants of recently ended events as attended based on Zoom
/// attendance data.
pub struct AttendanceReconciler {
    crm: Arc<dyn CrmApi>,
    zoom: Arc<dyn ZoomApi>,
    settings: Arc<SettingsService>,
}

impl AttendanceReconciler {
    pub fn new(crm: Arc<dyn CrmApi>, zoom: Arc<dyn ZoomApi>, settings: Arc<SettingsService>) -> Self {
        Self {
            crm,
            zoom,
            settings,
        }
    }

    /// Reconcile every event that ended within the last `days` days.
    ///
    /// A failure while processing one event is recorded in that event's
    /// entry and the remaining events are still processed.
    pub async fn generate_attendance(
        &self,
        days: u32,
        today: NaiveDate,
    ) -> Result<AttendanceReport, SyncError> {
        if self.settings.webinar_custom_field().is_none()
            && self.settings.meeting_custom_field().is_none()
        {
            return Err(SyncError::NotConfigured(
                "webinar and meeting custom fields".to_string(),
            ));
        }

        let from = today - Duration::days(i64::from(days));
        let filter = json!({
            "end_date": {
                "BETWEEN": [
                    format!("{} 00:00:00", from.format("%Y-%m-%d")),
                    format!("{} 23:59:59", today.format("%Y-%m-%d")),
                ]
            }
        });

        let events = self.crm.get_events(filter).await?;
        info!(
            "Generating Zoom attendance for {} events ended between {} and {}",
            events.len(),
            from,
            today
        );

        let mut report = AttendanceReport {
            days,
            from,
            to: today,
            updated_participants: 0,
            events: Vec::with_capacity(events.len()),
        };

        for event in events {
            let outcome = match self.reconcile_event(event.id).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!("Attendance for event {} failed: {}", event.id, err);
                    EventAttendance {
                        event_id: event.id,
                        status: EventStatus::Failed,
                        entity: None,
                        zoom_id: None,
                        attendees: Vec::new(),
                        message: Some(err.to_string()),
                    }
                }
            };

            report.updated_participants += outcome.attendees.len();
            report.events.push(outcome);
        }

        info!(
            "Zoom attendance done: {} participants marked {}",
            report.updated_participants, ATTENDED_STATUS
        );
        Ok(report)
    }

    /// Webinar id is checked before meeting id
    pub async fn linked_zoom_entity(
        &self,
        event_id: i64,
    ) -> Result<Option<(ZoomEntityKind, String)>, SyncError> {
        let candidates = [
            (ZoomEntityKind::Webinar, self.settings.webinar_custom_field()),
            (ZoomEntityKind::Meeting, self.settings.meeting_custom_field()),
        ];

        for (kind, field) in candidates {
            let Some(field) = field else { continue };
            if let Some(zoom_id) = self.crm.event_field(event_id, &field).await? {
                return Ok(Some((kind, zoom_id)));
            }
        }
        Ok(None)
    }

    async fn reconcile_event(&self, event_id: i64) -> Result<EventAttendance, SyncError> {
        let Some((kind, zoom_id)) = self.linked_zoom_entity(event_id).await? else {
            return Ok(EventAttendance::skipped(
                event_id,
                "no Zoom webinar or meeting linked".to_string(),
            ));
        };

        let settings = match self
            .settings
            .zoom_settings_for_event(self.crm.as_ref(), event_id)
            .await
        {
            Ok(settings) => settings,
            Err(SyncError::NotConfigured(reason)) => {
                warn!("Skipping event {}: {}", event_id, reason);
                return Ok(EventAttendance::skipped(event_id, reason));
            }
            Err(err) => return Err(err),
        };
        let creds = settings.credentials().ok_or_else(|| {
            SyncError::NotConfigured(format!(
                "Zoom credentials for account {:?}",
                settings.account_id
            ))
        })?;

        let emails = match kind {
            ZoomEntityKind::Webinar => self.absentee_emails(&creds, &zoom_id).await?,
            ZoomEntityKind::Meeting => self.participant_emails(&creds, &zoom_id).await?,
        };

        let participants = self.crm.registered_participants(event_id).await?;
        let attendees = select_attendees(&participants, &emails, kind);

        // Participants already marked stay in the report when a later update fails
        let mut updated = Vec::with_capacity(attendees.len());
        for attendee in attendees {
            if let Err(err) = self
                .crm
                .set_participant_status(event_id, attendee.participant_id, ATTENDED_STATUS)
                .await
            {
                error!(
                    "Marking participant {} of event {} failed after {} updates: {}",
                    attendee.participant_id,
                    event_id,
                    updated.len(),
                    err
                );
                return Ok(EventAttendance {
                    event_id,
                    status: EventStatus::Failed,
                    entity: Some(kind),
                    zoom_id: Some(zoom_id),
                    attendees: updated,
                    message: Some(SyncError::from(err).to_string()),
                });
            }
            updated.push(attendee);
        }
        let attendees = updated;

        info!(
            "{} {} for event {}: {} of {} participants attended",
            kind,
            zoom_id,
            event_id,
            attendees.len(),
            participants.len()
        );

        Ok(EventAttendance {
            event_id,
            status: EventStatus::Updated,
            entity: Some(kind),
            zoom_id: Some(zoom_id),
            attendees,
            message: None,
        })
    }

    /// Absentee emails collected across every page
    async fn absentee_emails(
        &self,
        creds: &ZoomCredentials,
        webinar_id: &str,
    ) -> Result<HashSet<String>, SyncError> {
        let mut emails = HashSet::new();
        let mut page_number = 1;

        loop {
            let page = self
                .zoom
                .past_webinar_absentees(creds, webinar_id, page_number)
                .await?;
            emails.extend(
                page.registrants
                    .iter()
                    .map(|absentee| normalize_email(&absentee.email))
                    .filter(|email| !email.is_empty()),
            );

            if page_number >= page.page_count {
                break;
            }
            page_number += 1;
        }

        Ok(emails)
    }

    async fn participant_emails(
        &self,
        creds: &ZoomCredentials,
        meeting_id: &str,
    ) -> Result<HashSet<String>, SyncError> {
        let page = self.zoom.past_meeting_participants(creds, meeting_id).await?;
        Ok(page
            .participants
            .iter()
            .filter_map(|participant| participant.user_email.as_deref())
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .collect())
    }
}

#[cfg(test)]
#[path = "attendance_test.rs"]
mod attendance_test;
