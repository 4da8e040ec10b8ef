use async_trait::async_trait;
use consentry_application::{AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository};
use consentry_core::AppResult;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredAuditEvent {
    event_id: Uuid,
    event: AuditEvent,
}

/// In-memory append-only audit log.
///
/// Events are recorded by the in-memory repositories while they still hold
/// the write guard of the transition being audited.
#[derive(Debug, Default)]
pub struct InMemoryAuditRepository {
    events: RwLock<Vec<StoredAuditEvent>>,
}

impl InMemoryAuditRepository {
    /// Creates an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn record(&self, events: &[AuditEvent]) {
        self.events
            .write()
            .await
            .extend(events.iter().cloned().map(|event| StoredAuditEvent {
                event_id: Uuid::new_v4(),
                event,
            }));
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditRepository {
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let events = self.events.read().await;
        let mut matching: Vec<&StoredAuditEvent> = events
            .iter()
            .filter(|stored| stored.event.patient_pin == query.patient_pin)
            .filter(|stored| query.action.is_none_or(|action| stored.event.action == action))
            .collect();
        // Stable sort keeps append order for equal timestamps; reverse gives newest first.
        matching.sort_by_key(|stored| stored.event.occurred_at);
        matching.reverse();

        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit.clamp(1, 200))
            .map(|stored| AuditLogEntry {
                event_id: stored.event_id.to_string(),
                actor: stored.event.actor.clone(),
                action: stored.event.action.as_str().to_owned(),
                resource_type: stored.event.resource_type.clone(),
                resource_id: stored.event.resource_id.clone(),
                patient_pin: stored.event.patient_pin.to_string(),
                resulting_state: stored.event.resulting_state.clone(),
                detail: stored.event.detail.clone(),
                created_at: stored
                    .event
                    .occurred_at
                    .format("%Y-%m-%dT%H:%M:%SZ")
                    .to_string(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use consentry_application::{AuditEvent, AuditLogQuery, AuditLogRepository};
    use consentry_domain::{AuditAction, PatientPin};

    use super::InMemoryAuditRepository;

    fn event(pin: &str, action: AuditAction, minutes: i64) -> AuditEvent {
        let base = Utc
            .with_ymd_and_hms(2024, 1, 24, 10, 30, 0)
            .single()
            .unwrap_or_default();
        AuditEvent {
            actor: "patient-1".to_owned(),
            action,
            resource_type: "consent_request".to_owned(),
            resource_id: "r-1".to_owned(),
            patient_pin: PatientPin::new(pin).unwrap_or_else(|_| unreachable!()),
            resulting_state: "pending".to_owned(),
            detail: None,
            occurred_at: base + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn entries_are_newest_first_and_pin_scoped() {
        let repository = InMemoryAuditRepository::new();
        repository
            .record(&[event("UHB1234", AuditAction::ConsentRequestCreated, 0)])
            .await;
        repository
            .record(&[
                event("UHB1234", AuditAction::ConsentRequestApproved, 5),
                event("UHB1234", AuditAction::ConsentGrantGranted, 5),
            ])
            .await;
        repository
            .record(&[event("UHB5678", AuditAction::ConsentRequestCreated, 6)])
            .await;

        let entries = repository
            .list_recent_entries(AuditLogQuery {
                patient_pin: PatientPin::new("UHB1234").unwrap_or_else(|_| unreachable!()),
                limit: 10,
                offset: 0,
                action: None,
            })
            .await
            .unwrap_or_default();

        let actions: Vec<&str> = entries.iter().map(|entry| entry.action.as_str()).collect();
        assert_eq!(
            actions,
            vec![
                "consent.grant.granted",
                "consent.request.approved",
                "consent.request.created",
            ]
        );
        assert_eq!(entries[2].created_at, "2024-01-24T10:30:00Z");
    }
}
