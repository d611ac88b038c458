use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

str_enum!(DocumentType {
    Contract => "contract",
    Invoice => "invoice",
    Minutes => "minutes",
    Budget => "budget",
    Report => "report",
    Unclassified => "unclassified",
});

impl DocumentType {
    /// The closed label set offered to the AI classifier.
    /// `Unclassified` is the fallback, never a label the AI may pick.
    pub fn classifiable() -> &'static [DocumentType] {
        &[
            Self::Contract,
            Self::Invoice,
            Self::Minutes,
            Self::Budget,
            Self::Report,
        ]
    }
}

str_enum!(StageStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

impl StageStatus {
    /// Allowed-transition table. Statuses only move forward within a run;
    /// the edge back to `Pending` exists solely for reprocess resets.
    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (_, Self::Pending)
        )
    }
}

str_enum!(ExtractionMethod {
    PdfDirect => "pdf_direct",
    Ocr => "ocr",
    AiVision => "ai_vision",
});

str_enum!(ClassificationMethod {
    Rule => "rule",
    Ai => "ai",
});

/// Pipeline stages in execution order. The numeric level of a stage is its
/// 1-based position; a document's processing level is the highest stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Extraction,
    Classification,
    Metadata,
    Chunking,
}

impl PipelineStage {
    pub fn all() -> &'static [PipelineStage] {
        &[
            Self::Extraction,
            Self::Classification,
            Self::Metadata,
            Self::Chunking,
        ]
    }

    pub fn level(&self) -> u8 {
        match self {
            Self::Extraction => 1,
            Self::Classification => 2,
            Self::Metadata => 3,
            Self::Chunking => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Classification => "classification",
            Self::Metadata => "metadata",
            Self::Chunking => "chunking",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

str_enum!(Role {
    Admin => "admin",
    Manager => "manager",
    Resident => "resident",
});

impl Role {
    /// Hierarchy rank: admin ⊇ manager ⊇ resident.
    fn rank(&self) -> u8 {
        match self {
            Self::Admin => 3,
            Self::Manager => 2,
            Self::Resident => 1,
        }
    }

    /// Whether a grant of `self` satisfies a requirement of `needed`.
    pub fn satisfies(&self, needed: Role) -> bool {
        self.rank() >= needed.rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn document_type_round_trip() {
        for ty in DocumentType::classifiable() {
            assert_eq!(DocumentType::from_str(ty.as_str()).unwrap(), *ty);
        }
        assert_eq!(
            DocumentType::from_str("unclassified").unwrap(),
            DocumentType::Unclassified
        );
    }

    #[test]
    fn unclassified_not_in_closed_set() {
        assert!(!DocumentType::classifiable().contains(&DocumentType::Unclassified));
    }

    #[test]
    fn invalid_enum_value_rejected() {
        assert!(DocumentType::from_str("spreadsheet").is_err());
        assert!(StageStatus::from_str("paused").is_err());
    }

    #[test]
    fn stage_status_forward_transitions() {
        assert!(StageStatus::Pending.can_transition_to(StageStatus::Running));
        assert!(StageStatus::Running.can_transition_to(StageStatus::Completed));
        assert!(StageStatus::Running.can_transition_to(StageStatus::Failed));
    }

    #[test]
    fn stage_status_no_skipping() {
        assert!(!StageStatus::Pending.can_transition_to(StageStatus::Completed));
        assert!(!StageStatus::Pending.can_transition_to(StageStatus::Failed));
        assert!(!StageStatus::Completed.can_transition_to(StageStatus::Running));
        assert!(!StageStatus::Failed.can_transition_to(StageStatus::Running));
    }

    #[test]
    fn stage_status_reset_to_pending_always_allowed() {
        assert!(StageStatus::Completed.can_transition_to(StageStatus::Pending));
        assert!(StageStatus::Failed.can_transition_to(StageStatus::Pending));
        assert!(StageStatus::Running.can_transition_to(StageStatus::Pending));
    }

    #[test]
    fn stage_levels_are_ordered() {
        let levels: Vec<u8> = PipelineStage::all().iter().map(|s| s.level()).collect();
        assert_eq!(levels, vec![1, 2, 3, 4]);
    }

    #[test]
    fn admin_satisfies_everything() {
        assert!(Role::Admin.satisfies(Role::Admin));
        assert!(Role::Admin.satisfies(Role::Manager));
        assert!(Role::Admin.satisfies(Role::Resident));
    }

    #[test]
    fn resident_satisfies_only_resident() {
        assert!(Role::Resident.satisfies(Role::Resident));
        assert!(!Role::Resident.satisfies(Role::Manager));
        assert!(!Role::Resident.satisfies(Role::Admin));
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::to_string(&ExtractionMethod::AiVision).unwrap(),
            "\"ai_vision\""
        );
    }
}
