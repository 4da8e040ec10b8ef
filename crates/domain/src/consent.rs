//! Consent request and grant lifecycle.
//!
//! ```text
//! pending --approve--> [Consent:active] --revoke--> revoked
//! pending --approve--> [Consent:active] --expiry--> expired
//! pending --deny-----> denied
//! ```

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use consentry_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::patient::{PatientPin, Requester};
use crate::scope::ScopeSet;

macro_rules! uuid_identifier {
    ($name:ident, $label:literal) => {
        #[doc = concat!("Unique identifier for a ", $label, ".")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random ", $label, " identifier.")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Creates a ", $label, " identifier from an existing UUID value.")]
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            #[doc = concat!("Parses a ", $label, " identifier from transport.")]
            pub fn parse(value: &str) -> AppResult<Self> {
                Uuid::parse_str(value.trim()).map(Self).map_err(|_| {
                    AppError::Validation(format!(concat!("invalid ", $label, " id '{}'"), value))
                })
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(ConsentRequestId, "consent request");
uuid_identifier!(ConsentId, "consent");

/// Validated access duration in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessDuration(u32);

impl AccessDuration {
    /// Shortest duration a patient may approve.
    pub const MIN_MINUTES: u32 = 15;
    /// Longest duration a patient may approve (seven days).
    pub const MAX_MINUTES: u32 = 7 * 24 * 60;
    /// Duration used when the requester does not ask for one.
    pub const DEFAULT_MINUTES: u32 = 2 * 60;
    /// Durations offered by the portal.
    pub const PRESET_MINUTES: [u32; 6] = [15, 60, 120, 360, 1_440, 10_080];

    /// Creates a validated duration.
    pub fn from_minutes(minutes: u32) -> AppResult<Self> {
        if !(Self::MIN_MINUTES..=Self::MAX_MINUTES).contains(&minutes) {
            return Err(AppError::Validation(format!(
                "access duration must be between {} and {} minutes",
                Self::MIN_MINUTES,
                Self::MAX_MINUTES
            )));
        }

        Ok(Self(minutes))
    }

    /// Returns the duration in minutes.
    #[must_use]
    pub fn minutes(&self) -> u32 {
        self.0
    }

    /// Returns the duration as a time delta.
    #[must_use]
    pub fn as_delta(&self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }
}

impl Default for AccessDuration {
    fn default() -> Self {
        Self(Self::DEFAULT_MINUTES)
    }
}

/// Disposition of a consent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentRequestStatus {
    /// Waiting for the patient.
    Pending,
    /// Approved; a grant was created.
    Approved,
    /// Denied by the patient.
    Denied,
}

impl ConsentRequestStatus {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    /// Returns whether the status is final.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for ConsentRequestStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            _ => Err(AppError::Validation(format!(
                "unknown consent request status '{value}'"
            ))),
        }
    }
}

/// Lifecycle status of a consent grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    /// Grant is in force until `expires_at`.
    Active,
    /// Grant was revoked by the patient.
    Revoked,
    /// Grant reached `expires_at`.
    Expired,
}

impl ConsentStatus {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for ConsentStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            _ => Err(AppError::Validation(format!(
                "unknown consent status '{value}'"
            ))),
        }
    }
}

/// Input for opening a new consent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConsentRequest {
    /// Patient whose records are requested.
    pub patient_pin: PatientPin,
    /// Provider asking for access.
    pub requester: Requester,
    /// Requested scopes.
    pub scope: ScopeSet,
    /// Why access is needed.
    pub purpose: String,
    /// Episode that `currentEpisode` refers to.
    pub episode_id: Option<String>,
    /// Access duration the provider asks for.
    pub requested_duration: AccessDuration,
}

/// Patient decision when approving a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalDecision {
    /// Scopes granted; `None` grants everything requested.
    pub scope: Option<ScopeSet>,
    /// Granted duration; `None` keeps the requested duration.
    pub duration: Option<AccessDuration>,
}

/// Flat storage representation of a consent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequestSnapshot {
    /// Request identifier.
    pub id: ConsentRequestId,
    /// Patient whose records are requested.
    pub patient_pin: PatientPin,
    /// Provider asking for access.
    pub requester: Requester,
    /// Requested scopes.
    pub scope: ScopeSet,
    /// Why access is needed.
    pub purpose: String,
    /// Episode that `currentEpisode` refers to.
    pub episode_id: Option<String>,
    /// Access duration the provider asked for.
    pub requested_duration: AccessDuration,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Current disposition.
    pub status: ConsentRequestStatus,
    /// When the request was approved or denied.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Who approved or denied the request.
    pub resolved_by: Option<String>,
    /// Denial reason, when given.
    pub resolution_note: Option<String>,
}

/// Provider request for access to a patient's records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    id: ConsentRequestId,
    patient_pin: PatientPin,
    requester: Requester,
    scope: ScopeSet,
    purpose: NonEmptyString,
    episode_id: Option<String>,
    requested_duration: AccessDuration,
    created_at: DateTime<Utc>,
    status: ConsentRequestStatus,
    resolved_at: Option<DateTime<Utc>>,
    resolved_by: Option<String>,
    resolution_note: Option<String>,
}

impl ConsentRequest {
    /// Opens a pending request.
    pub fn open(input: NewConsentRequest, now: DateTime<Utc>) -> AppResult<Self> {
        let purpose = NonEmptyString::new(input.purpose.trim()).map_err(|_| {
            AppError::Validation("consent request purpose is required".to_owned())
        })?;

        Ok(Self {
            id: ConsentRequestId::new(),
            patient_pin: input.patient_pin,
            requester: input.requester,
            scope: input.scope,
            purpose,
            episode_id: normalize_episode_id(input.episode_id),
            requested_duration: input.requested_duration,
            created_at: now,
            status: ConsentRequestStatus::Pending,
            resolved_at: None,
            resolved_by: None,
            resolution_note: None,
        })
    }

    /// Rebuilds a request from storage, checking lifecycle consistency.
    pub fn restore(snapshot: ConsentRequestSnapshot) -> AppResult<Self> {
        let purpose = NonEmptyString::new(snapshot.purpose)?;
        let resolved = snapshot.resolved_at.is_some() && snapshot.resolved_by.is_some();
        if snapshot.status.is_terminal() != resolved {
            return Err(AppError::Internal(format!(
                "consent request '{}' has inconsistent resolution state",
                snapshot.id
            )));
        }

        Ok(Self {
            id: snapshot.id,
            patient_pin: snapshot.patient_pin,
            requester: snapshot.requester,
            scope: snapshot.scope,
            purpose,
            episode_id: snapshot.episode_id,
            requested_duration: snapshot.requested_duration,
            created_at: snapshot.created_at,
            status: snapshot.status,
            resolved_at: snapshot.resolved_at,
            resolved_by: snapshot.resolved_by,
            resolution_note: snapshot.resolution_note,
        })
    }

    /// Approves the request and mints the grant.
    ///
    /// The granted scope must be a subset of the requested scope. The grant's
    /// `expires_at` is fixed here and never recomputed.
    pub fn approve(
        &mut self,
        decision: ApprovalDecision,
        approved_by: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Consent> {
        self.ensure_pending()?;

        let scope = decision.scope.unwrap_or_else(|| self.scope.clone());
        if !scope.is_subset_of(&self.scope) {
            return Err(AppError::Validation(
                "approved scope must be a subset of the requested scope".to_owned(),
            ));
        }

        let duration = decision.duration.unwrap_or(self.requested_duration);
        let expires_at = now
            .checked_add_signed(duration.as_delta())
            .ok_or_else(|| AppError::Validation("access duration overflows clock".to_owned()))?;

        self.status = ConsentRequestStatus::Approved;
        self.resolved_at = Some(now);
        self.resolved_by = Some(approved_by.to_owned());

        Ok(Consent {
            id: ConsentId::new(),
            request_id: self.id,
            patient_pin: self.patient_pin.clone(),
            requester: self.requester.clone(),
            scope,
            episode_id: self.episode_id.clone(),
            status: ConsentStatus::Active,
            created_at: now,
            expires_at,
            revoked_at: None,
            revoked_by: None,
            revoke_reason: None,
            expired_at: None,
        })
    }

    /// Denies the request.
    pub fn deny(
        &mut self,
        denied_by: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.ensure_pending()?;

        self.status = ConsentRequestStatus::Denied;
        self.resolved_at = Some(now);
        self.resolved_by = Some(denied_by.to_owned());
        self.resolution_note = reason.filter(|value| !value.trim().is_empty());
        Ok(())
    }

    fn ensure_pending(&self) -> AppResult<()> {
        if self.status != ConsentRequestStatus::Pending {
            return Err(AppError::Conflict(format!(
                "consent request '{}' is already {}",
                self.id,
                self.status.as_str()
            )));
        }

        Ok(())
    }

    /// Returns the request identifier.
    #[must_use]
    pub fn id(&self) -> ConsentRequestId {
        self.id
    }

    /// Returns the patient PIN.
    #[must_use]
    pub fn patient_pin(&self) -> &PatientPin {
        &self.patient_pin
    }

    /// Returns the requesting provider.
    #[must_use]
    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    /// Returns requested scopes.
    #[must_use]
    pub fn scope(&self) -> &ScopeSet {
        &self.scope
    }

    /// Returns the stated purpose.
    #[must_use]
    pub fn purpose(&self) -> &str {
        self.purpose.as_str()
    }

    /// Returns the episode referenced by `currentEpisode`.
    #[must_use]
    pub fn episode_id(&self) -> Option<&str> {
        self.episode_id.as_deref()
    }

    /// Returns the duration the provider asked for.
    #[must_use]
    pub fn requested_duration(&self) -> AccessDuration {
        self.requested_duration
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the current disposition.
    #[must_use]
    pub fn status(&self) -> ConsentRequestStatus {
        self.status
    }

    /// Returns the resolution timestamp.
    #[must_use]
    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    /// Returns who resolved the request.
    #[must_use]
    pub fn resolved_by(&self) -> Option<&str> {
        self.resolved_by.as_deref()
    }

    /// Returns the denial reason.
    #[must_use]
    pub fn resolution_note(&self) -> Option<&str> {
        self.resolution_note.as_deref()
    }
}

/// Flat storage representation of a consent grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentSnapshot {
    /// Grant identifier.
    pub id: ConsentId,
    /// Request this grant was minted from.
    pub request_id: ConsentRequestId,
    /// Patient whose records are shared.
    pub patient_pin: PatientPin,
    /// Provider holding the grant.
    pub requester: Requester,
    /// Granted scopes.
    pub scope: ScopeSet,
    /// Episode that `currentEpisode` refers to.
    pub episode_id: Option<String>,
    /// Stored status.
    pub status: ConsentStatus,
    /// Approval timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp fixed at approval.
    pub expires_at: DateTime<Utc>,
    /// Revocation timestamp.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Who revoked the grant.
    pub revoked_by: Option<String>,
    /// Revocation reason.
    pub revoke_reason: Option<String>,
    /// When the expiry transition was recorded.
    pub expired_at: Option<DateTime<Utc>>,
}

/// Consent grant allowing one provider to read scoped patient data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consent {
    id: ConsentId,
    request_id: ConsentRequestId,
    patient_pin: PatientPin,
    requester: Requester,
    scope: ScopeSet,
    episode_id: Option<String>,
    status: ConsentStatus,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<String>,
    revoke_reason: Option<String>,
    expired_at: Option<DateTime<Utc>>,
}

impl Consent {
    /// Rebuilds a grant from storage, checking lifecycle consistency.
    pub fn restore(snapshot: ConsentSnapshot) -> AppResult<Self> {
        let consistent = match snapshot.status {
            ConsentStatus::Active => snapshot.revoked_at.is_none() && snapshot.expired_at.is_none(),
            ConsentStatus::Revoked => snapshot.revoked_at.is_some(),
            ConsentStatus::Expired => snapshot.expired_at.is_some(),
        };
        if !consistent || snapshot.expires_at < snapshot.created_at {
            return Err(AppError::Internal(format!(
                "consent '{}' has inconsistent lifecycle state",
                snapshot.id
            )));
        }

        Ok(Self {
            id: snapshot.id,
            request_id: snapshot.request_id,
            patient_pin: snapshot.patient_pin,
            requester: snapshot.requester,
            scope: snapshot.scope,
            episode_id: snapshot.episode_id,
            status: snapshot.status,
            created_at: snapshot.created_at,
            expires_at: snapshot.expires_at,
            revoked_at: snapshot.revoked_at,
            revoked_by: snapshot.revoked_by,
            revoke_reason: snapshot.revoke_reason,
            expired_at: snapshot.expired_at,
        })
    }

    /// Returns the status as observed at `now`.
    ///
    /// An active grant past `expires_at` reads as expired even before the
    /// transition is persisted.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> ConsentStatus {
        match self.status {
            ConsentStatus::Active if now >= self.expires_at => ConsentStatus::Expired,
            status => status,
        }
    }

    /// Returns whether the stored status still needs the expiry transition.
    #[must_use]
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == ConsentStatus::Active && now >= self.expires_at
    }

    /// Revokes an active grant.
    pub fn revoke(
        &mut self,
        revoked_by: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let status = self.effective_status(now);
        if status != ConsentStatus::Active {
            return Err(AppError::Conflict(format!(
                "consent '{}' is already {}",
                self.id,
                status.as_str()
            )));
        }

        self.status = ConsentStatus::Revoked;
        self.revoked_at = Some(now);
        self.revoked_by = Some(revoked_by.to_owned());
        self.revoke_reason = reason.filter(|value| !value.trim().is_empty());
        Ok(())
    }

    /// Applies the expiry transition when due. Returns `false` when nothing changed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_due_for_expiry(now) {
            return false;
        }

        self.status = ConsentStatus::Expired;
        self.expired_at = Some(now);
        true
    }

    /// Returns the grant identifier.
    #[must_use]
    pub fn id(&self) -> ConsentId {
        self.id
    }

    /// Returns the originating request identifier.
    #[must_use]
    pub fn request_id(&self) -> ConsentRequestId {
        self.request_id
    }

    /// Returns the patient PIN.
    #[must_use]
    pub fn patient_pin(&self) -> &PatientPin {
        &self.patient_pin
    }

    /// Returns the provider holding the grant.
    #[must_use]
    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    /// Returns granted scopes.
    #[must_use]
    pub fn scope(&self) -> &ScopeSet {
        &self.scope
    }

    /// Returns the episode referenced by `currentEpisode`.
    #[must_use]
    pub fn episode_id(&self) -> Option<&str> {
        self.episode_id.as_deref()
    }

    /// Returns the stored status.
    #[must_use]
    pub fn status(&self) -> ConsentStatus {
        self.status
    }

    /// Returns the approval timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the expiry timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the revocation timestamp.
    #[must_use]
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Returns who revoked the grant.
    #[must_use]
    pub fn revoked_by(&self) -> Option<&str> {
        self.revoked_by.as_deref()
    }

    /// Returns the revocation reason.
    #[must_use]
    pub fn revoke_reason(&self) -> Option<&str> {
        self.revoke_reason.as_deref()
    }

    /// Returns when the expiry transition was recorded.
    #[must_use]
    pub fn expired_at(&self) -> Option<DateTime<Utc>> {
        self.expired_at
    }
}

fn normalize_episode_id(value: Option<String>) -> Option<String> {
    value
        .map(|episode_id| episode_id.trim().to_owned())
        .filter(|episode_id| !episode_id.is_empty())
}
