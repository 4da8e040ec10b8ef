use std::str::FromStr;

use consentry_core::{ActorRole, AppError};
use serde::{Deserialize, Serialize};

/// Permissions enforced by application policy checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows opening consent requests.
    ConsentRequestCreate,
    /// Allows approving or denying consent requests.
    ConsentRequestDecide,
    /// Allows revoking consent grants.
    ConsentGrantRevoke,
    /// Allows listing requests and grants the caller is party to.
    ConsentRead,
    /// Allows evaluating access attempts against grants.
    ConsentAccessCheck,
    /// Allows reading the caller's consent audit trail.
    ConsentAuditRead,
    /// Allows issuing presence verification codes.
    ConsentPresenceIssue,
    /// Allows redeeming presence verification codes.
    ConsentPresenceVerify,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsentRequestCreate => "consent.request.create",
            Self::ConsentRequestDecide => "consent.request.decide",
            Self::ConsentGrantRevoke => "consent.grant.revoke",
            Self::ConsentRead => "consent.read",
            Self::ConsentAccessCheck => "consent.access.check",
            Self::ConsentAuditRead => "consent.audit.read",
            Self::ConsentPresenceIssue => "consent.presence.issue",
            Self::ConsentPresenceVerify => "consent.presence.verify",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::ConsentRequestCreate,
            Permission::ConsentRequestDecide,
            Permission::ConsentGrantRevoke,
            Permission::ConsentRead,
            Permission::ConsentAccessCheck,
            Permission::ConsentAuditRead,
            Permission::ConsentPresenceIssue,
            Permission::ConsentPresenceVerify,
        ];

        ALL
    }

    /// Returns whether a portal role holds this permission.
    #[must_use]
    pub fn is_granted_to(&self, role: ActorRole) -> bool {
        match self {
            Self::ConsentRequestCreate
            | Self::ConsentAccessCheck
            | Self::ConsentPresenceVerify => role.is_provider(),
            Self::ConsentRequestDecide
            | Self::ConsentGrantRevoke
            | Self::ConsentAuditRead
            | Self::ConsentPresenceIssue => role == ActorRole::Patient,
            Self::ConsentRead => role != ActorRole::System,
        }
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission value '{value}'")))
    }
}

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a provider opens a consent request.
    ConsentRequestCreated,
    /// Emitted when a patient approves a request.
    ConsentRequestApproved,
    /// Emitted when a patient denies a request.
    ConsentRequestDenied,
    /// Emitted when a grant is minted from an approval.
    ConsentGrantGranted,
    /// Emitted when a patient revokes a grant.
    ConsentGrantRevoked,
    /// Emitted when a grant reaches its expiry.
    ConsentGrantExpired,
    /// Emitted when a patient issues a presence code.
    ConsentPresenceChallengeIssued,
    /// Emitted when a provider redeems a presence code.
    ConsentPresenceVerified,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsentRequestCreated => "consent.request.created",
            Self::ConsentRequestApproved => "consent.request.approved",
            Self::ConsentRequestDenied => "consent.request.denied",
            Self::ConsentGrantGranted => "consent.grant.granted",
            Self::ConsentGrantRevoked => "consent.grant.revoked",
            Self::ConsentGrantExpired => "consent.grant.expired",
            Self::ConsentPresenceChallengeIssued => "consent.presence.challenge_issued",
            Self::ConsentPresenceVerified => "consent.presence.verified",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[AuditAction] = &[
            AuditAction::ConsentRequestCreated,
            AuditAction::ConsentRequestApproved,
            AuditAction::ConsentRequestDenied,
            AuditAction::ConsentGrantGranted,
            AuditAction::ConsentGrantRevoked,
            AuditAction::ConsentGrantExpired,
            AuditAction::ConsentPresenceChallengeIssued,
            AuditAction::ConsentPresenceVerified,
        ];

        ALL
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown audit action '{value}'")))
    }
}
