use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// Portal role carried by an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Patient owning records addressed by a PIN.
    Patient,
    /// Doctor requesting access to patient records.
    Doctor,
    /// Laboratory requesting access to patient records.
    Lab,
    /// Background process acting on behalf of the platform.
    System,
}

impl ActorRole {
    /// Returns a stable transport value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Lab => "lab",
            Self::System => "system",
        }
    }

    /// Returns whether the role requests access on behalf of a provider.
    #[must_use]
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Doctor | Self::Lab)
    }
}

impl Display for ActorRole {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "patient" => Ok(Self::Patient),
            "doctor" => Ok(Self::Doctor),
            "lab" => Ok(Self::Lab),
            "system" => Ok(Self::System),
            _ => Err(AppError::Validation(format!("unknown actor role '{value}'"))),
        }
    }
}

/// Identity of the caller performing a use-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    subject: String,
    display_name: String,
    role: ActorRole,
    patient_pin: Option<String>,
}

impl ActorIdentity {
    /// Creates an identity for a provider (doctor or lab).
    pub fn provider(
        subject: impl Into<String>,
        display_name: impl Into<String>,
        role: ActorRole,
    ) -> AppResult<Self> {
        if !role.is_provider() {
            return Err(AppError::Validation(format!(
                "role '{role}' is not a provider role"
            )));
        }

        Self::build(subject.into(), display_name.into(), role, None)
    }

    /// Creates an identity for a patient bound to one PIN.
    pub fn patient(
        subject: impl Into<String>,
        display_name: impl Into<String>,
        patient_pin: impl Into<String>,
    ) -> AppResult<Self> {
        let patient_pin = patient_pin.into();
        if patient_pin.trim().is_empty() {
            return Err(AppError::Validation(
                "patient identity requires a patient pin".to_owned(),
            ));
        }

        Self::build(
            subject.into(),
            display_name.into(),
            ActorRole::Patient,
            Some(patient_pin.trim().to_uppercase()),
        )
    }

    /// Creates the identity used by background processes.
    #[must_use]
    pub fn system(subject: impl Into<String>) -> Self {
        let subject = subject.into();
        Self {
            display_name: subject.clone(),
            subject,
            role: ActorRole::System,
            patient_pin: None,
        }
    }

    fn build(
        subject: String,
        display_name: String,
        role: ActorRole,
        patient_pin: Option<String>,
    ) -> AppResult<Self> {
        if subject.trim().is_empty() {
            return Err(AppError::Validation(
                "actor subject must not be empty".to_owned(),
            ));
        }

        let display_name = if display_name.trim().is_empty() {
            subject.clone()
        } else {
            display_name
        };

        Ok(Self {
            subject,
            display_name,
            role,
            patient_pin,
        })
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the display name for the current actor.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the portal role of the actor.
    #[must_use]
    pub fn role(&self) -> ActorRole {
        self.role
    }

    /// Returns the patient PIN bound to a patient identity.
    #[must_use]
    pub fn patient_pin(&self) -> Option<&str> {
        self.patient_pin.as_deref()
    }
}
