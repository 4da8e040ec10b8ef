use std::fmt::{Display, Formatter};
use std::str::FromStr;

use consentry_core::{ActorIdentity, ActorRole, AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Minimum accepted PIN length.
const PIN_MIN_LENGTH: usize = 6;

/// Maximum accepted PIN length.
const PIN_MAX_LENGTH: usize = 16;

/// Patient identification number used as the lookup key for patient records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientPin(String);

impl PatientPin {
    /// Creates a validated, upper-cased patient PIN.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let normalized = value.into().trim().to_uppercase();
        let length = normalized.chars().count();

        if !(PIN_MIN_LENGTH..=PIN_MAX_LENGTH).contains(&length) {
            return Err(AppError::Validation(format!(
                "patient pin must be between {PIN_MIN_LENGTH} and {PIN_MAX_LENGTH} characters"
            )));
        }

        if !normalized.chars().all(|character| character.is_ascii_alphanumeric()) {
            return Err(AppError::Validation(
                "patient pin must contain only ASCII letters and digits".to_owned(),
            ));
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized PIN value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PatientPin {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Kind of provider requesting access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterType {
    /// A doctor.
    Doctor,
    /// A laboratory.
    Lab,
}

impl RequesterType {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Lab => "lab",
        }
    }

    /// Returns the requester type matching an actor role, if the role is a provider.
    #[must_use]
    pub fn from_role(role: ActorRole) -> Option<Self> {
        match role {
            ActorRole::Doctor => Some(Self::Doctor),
            ActorRole::Lab => Some(Self::Lab),
            ActorRole::Patient | ActorRole::System => None,
        }
    }
}

impl FromStr for RequesterType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "doctor" => Ok(Self::Doctor),
            "lab" => Ok(Self::Lab),
            _ => Err(AppError::Validation(format!(
                "unknown requester type '{value}'"
            ))),
        }
    }
}

/// Provider on whose behalf a request or grant exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    requester_id: NonEmptyString,
    requester_name: String,
    requester_type: RequesterType,
}

impl Requester {
    /// Creates a requester descriptor.
    pub fn new(
        requester_id: impl Into<String>,
        requester_name: impl Into<String>,
        requester_type: RequesterType,
    ) -> AppResult<Self> {
        let requester_id = NonEmptyString::new(requester_id)?;
        let requester_name = requester_name.into();
        let requester_name = if requester_name.trim().is_empty() {
            requester_id.as_str().to_owned()
        } else {
            requester_name
        };

        Ok(Self {
            requester_id,
            requester_name,
            requester_type,
        })
    }

    /// Builds the requester descriptor for an authenticated provider.
    pub fn from_actor(actor: &ActorIdentity) -> AppResult<Self> {
        let requester_type = RequesterType::from_role(actor.role()).ok_or_else(|| {
            AppError::Forbidden(format!(
                "role '{}' cannot request consent",
                actor.role().as_str()
            ))
        })?;

        Self::new(actor.subject(), actor.display_name(), requester_type)
    }

    /// Returns the provider subject identifier.
    #[must_use]
    pub fn requester_id(&self) -> &str {
        self.requester_id.as_str()
    }

    /// Returns the provider display name.
    #[must_use]
    pub fn requester_name(&self) -> &str {
        self.requester_name.as_str()
    }

    /// Returns the provider type.
    #[must_use]
    pub fn requester_type(&self) -> RequesterType {
        self.requester_type
    }
}
