use consentry_core::{ActorIdentity, ActorRole, AppError, AppResult};
use consentry_domain::{PatientPin, Permission, Requester};

/// Role policy and ownership checks for consent use-cases.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationService;

impl AuthorizationService {
    /// Creates the authorization service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Ensures the actor's role holds the permission.
    pub fn require_permission(
        &self,
        actor: &ActorIdentity,
        permission: Permission,
    ) -> AppResult<()> {
        if permission.is_granted_to(actor.role()) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "subject '{}' with role '{}' is missing permission '{}'",
            actor.subject(),
            actor.role(),
            permission.as_str()
        )))
    }

    /// Returns the PIN bound to a patient actor.
    pub fn patient_pin_of(&self, actor: &ActorIdentity) -> AppResult<PatientPin> {
        if actor.role() != ActorRole::Patient {
            return Err(AppError::Forbidden(format!(
                "subject '{}' is not a patient",
                actor.subject()
            )));
        }

        let pin = actor.patient_pin().ok_or_else(|| {
            AppError::Unauthorized("patient identity carries no patient pin".to_owned())
        })?;

        PatientPin::new(pin)
    }

    /// Ensures a patient actor owns the given PIN.
    pub fn require_own_pin(&self, actor: &ActorIdentity, patient_pin: &PatientPin) -> AppResult<()> {
        if &self.patient_pin_of(actor)? != patient_pin {
            return Err(AppError::Forbidden(format!(
                "subject '{}' cannot act on records of another patient",
                actor.subject()
            )));
        }

        Ok(())
    }

    /// Ensures a provider actor is the requester.
    pub fn require_requester(&self, actor: &ActorIdentity, requester: &Requester) -> AppResult<()> {
        if !actor.role().is_provider() || actor.subject() != requester.requester_id() {
            return Err(AppError::Forbidden(format!(
                "subject '{}' is not the requester of this consent",
                actor.subject()
            )));
        }

        Ok(())
    }
}
