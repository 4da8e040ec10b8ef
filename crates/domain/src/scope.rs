use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use consentry_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Length of the rolling window covered by [`ConsentScope::Last12Months`].
const LAST_12_MONTHS_DAYS: i64 = 365;

/// Enumerated category of medical data a consent grant permits access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsentScope {
    /// Records belonging to the treatment episode named on the request.
    CurrentEpisode,
    /// All laboratory reports.
    AllLabs,
    /// Any record from the rolling last twelve months.
    Last12Months,
    /// Clinical notes only.
    NotesOnly,
}

impl ConsentScope {
    /// Returns a stable storage value for this scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentEpisode => "currentEpisode",
            Self::AllLabs => "allLabs",
            Self::Last12Months => "last12Months",
            Self::NotesOnly => "notesOnly",
        }
    }

    /// Returns all known scopes.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ConsentScope] = &[
            ConsentScope::CurrentEpisode,
            ConsentScope::AllLabs,
            ConsentScope::Last12Months,
            ConsentScope::NotesOnly,
        ];

        ALL
    }

    /// Returns whether this scope covers one access attempt.
    ///
    /// `grant_episode_id` is the episode recorded on the grant; without it
    /// [`ConsentScope::CurrentEpisode`] covers nothing.
    #[must_use]
    pub fn covers(
        &self,
        attempt: &DataAccessAttempt,
        grant_episode_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        match self {
            Self::AllLabs => attempt.category == RecordCategory::LabReport,
            Self::NotesOnly => attempt.category == RecordCategory::ClinicalNote,
            Self::Last12Months => {
                attempt.recorded_at <= now
                    && now - attempt.recorded_at <= Duration::days(LAST_12_MONTHS_DAYS)
            }
            Self::CurrentEpisode => match (grant_episode_id, attempt.episode_id.as_deref()) {
                (Some(grant_episode), Some(record_episode)) => grant_episode == record_episode,
                _ => false,
            },
        }
    }
}

impl FromStr for ConsentScope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "currentEpisode" => Ok(Self::CurrentEpisode),
            "allLabs" => Ok(Self::AllLabs),
            "last12Months" => Ok(Self::Last12Months),
            "notesOnly" => Ok(Self::NotesOnly),
            _ => Err(AppError::Validation(format!(
                "unknown consent scope '{value}'"
            ))),
        }
    }
}

/// Non-empty set of consent scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSet(BTreeSet<ConsentScope>);

impl ScopeSet {
    /// Creates a validated scope set. Duplicates collapse.
    pub fn new(scopes: impl IntoIterator<Item = ConsentScope>) -> AppResult<Self> {
        let scopes: BTreeSet<ConsentScope> = scopes.into_iter().collect();
        if scopes.is_empty() {
            return Err(AppError::Validation(
                "consent scope must contain at least one entry".to_owned(),
            ));
        }

        Ok(Self(scopes))
    }

    /// Parses transport values into a scope set.
    pub fn from_transport<S: AsRef<str>>(values: &[S]) -> AppResult<Self> {
        let scopes = values
            .iter()
            .map(|value| ConsentScope::from_str(value.as_ref()))
            .collect::<AppResult<Vec<_>>>()?;

        Self::new(scopes)
    }

    /// Returns whether every scope in `self` also appears in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Iterates scopes in stable order.
    pub fn iter(&self) -> impl Iterator<Item = ConsentScope> + '_ {
        self.0.iter().copied()
    }

    /// Returns stable storage values in order.
    #[must_use]
    pub fn storage_values(&self) -> Vec<&'static str> {
        self.0.iter().map(ConsentScope::as_str).collect()
    }
}

/// Category of medical data addressed by an access attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordCategory {
    /// Laboratory test report.
    LabReport,
    /// Doctor note or clinical observation.
    ClinicalNote,
    /// Prescription issued during an episode.
    Prescription,
    /// Procedure performed during an episode.
    Procedure,
    /// Summary of a treatment episode.
    EpisodeSummary,
}

impl RecordCategory {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LabReport => "labReport",
            Self::ClinicalNote => "clinicalNote",
            Self::Prescription => "prescription",
            Self::Procedure => "procedure",
            Self::EpisodeSummary => "episodeSummary",
        }
    }
}

impl FromStr for RecordCategory {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "labReport" => Ok(Self::LabReport),
            "clinicalNote" => Ok(Self::ClinicalNote),
            "prescription" => Ok(Self::Prescription),
            "procedure" => Ok(Self::Procedure),
            "episodeSummary" => Ok(Self::EpisodeSummary),
            _ => Err(AppError::Validation(format!(
                "unknown record category '{value}'"
            ))),
        }
    }
}

/// One attempt to read patient data, described by what is being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataAccessAttempt {
    /// Category of the record.
    pub category: RecordCategory,
    /// Episode the record belongs to, when any.
    pub episode_id: Option<String>,
    /// Clinical timestamp of the record.
    pub recorded_at: DateTime<Utc>,
}
