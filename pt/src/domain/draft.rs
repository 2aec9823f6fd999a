//! Petition draft
//!
//! The in-progress intake form. A single mutable aggregate per session; it is
//! only copied into a PetitionRecord when a generation succeeds.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixed case categories offered by the intake form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseType {
    #[serde(rename = "Concessão de Aposentadoria por Idade")]
    AgeRetirement,
    #[serde(rename = "Aposentadoria por Invalidez")]
    DisabilityRetirement,
    #[serde(rename = "Benefício Assistencial (LOAS)")]
    AssistanceBenefit,
    #[serde(rename = "Salário Maternidade")]
    MaternityPay,
    #[serde(rename = "Auxílio Doença")]
    SicknessAid,
}

impl CaseType {
    pub const ALL: [CaseType; 5] = [
        Self::AgeRetirement,
        Self::DisabilityRetirement,
        Self::AssistanceBenefit,
        Self::MaternityPay,
        Self::SicknessAid,
    ];

    /// Label shown to the user and embedded in the prompt
    pub fn label(&self) -> &'static str {
        match self {
            Self::AgeRetirement => "Concessão de Aposentadoria por Idade",
            Self::DisabilityRetirement => "Aposentadoria por Invalidez",
            Self::AssistanceBenefit => "Benefício Assistencial (LOAS)",
            Self::MaternityPay => "Salário Maternidade",
            Self::SicknessAid => "Auxílio Doença",
        }
    }

    /// Short ASCII key, handy on the command line
    pub fn key(&self) -> &'static str {
        match self {
            Self::AgeRetirement => "age-retirement",
            Self::DisabilityRetirement => "disability-retirement",
            Self::AssistanceBenefit => "assistance-benefit",
            Self::MaternityPay => "maternity-pay",
            Self::SicknessAid => "sickness-aid",
        }
    }
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for CaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "CaseType::from_str: called");
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(needle) || c.label().to_lowercase() == needle.to_lowercase())
            .ok_or_else(|| {
                let keys: Vec<&str> = Self::ALL.iter().map(|c| c.key()).collect();
                format!("Unknown case type '{}'. Expected one of: {}", needle, keys.join(", "))
            })
    }
}

/// Claimant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plaintiff {
    pub name: String,
    /// CPF
    pub national_id: String,
    pub address: String,
    pub occupation: String,
}

/// Respondent, usually the social-security institute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defendant {
    pub name: String,
    pub address: String,
}

/// Attorney signing the petition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lawyer {
    pub name: String,
    /// OAB registration number
    pub bar_number: String,
}

/// In-progress petition form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Draft {
    pub case_type: Option<CaseType>,
    pub court: String,
    pub plaintiff: Plaintiff,
    pub defendant: Defendant,
    pub lawyer: Lawyer,
    /// Narrative of the facts; the only substantive case content
    pub facts_narrative: String,
    /// Names of the selected files (no content)
    pub attached_file_names: Vec<String>,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_case_type(&mut self, case_type: CaseType) {
        self.case_type = Some(case_type);
    }

    pub fn set_court(&mut self, court: impl Into<String>) {
        self.court = court.into();
    }

    pub fn set_plaintiff_name(&mut self, name: impl Into<String>) {
        self.plaintiff.name = name.into();
    }

    pub fn set_plaintiff_national_id(&mut self, national_id: impl Into<String>) {
        self.plaintiff.national_id = national_id.into();
    }

    pub fn set_plaintiff_address(&mut self, address: impl Into<String>) {
        self.plaintiff.address = address.into();
    }

    pub fn set_plaintiff_occupation(&mut self, occupation: impl Into<String>) {
        self.plaintiff.occupation = occupation.into();
    }

    pub fn set_defendant_name(&mut self, name: impl Into<String>) {
        self.defendant.name = name.into();
    }

    pub fn set_defendant_address(&mut self, address: impl Into<String>) {
        self.defendant.address = address.into();
    }

    pub fn set_lawyer_name(&mut self, name: impl Into<String>) {
        self.lawyer.name = name.into();
    }

    pub fn set_lawyer_bar_number(&mut self, bar_number: impl Into<String>) {
        self.lawyer.bar_number = bar_number.into();
    }

    pub fn set_facts_narrative(&mut self, facts: impl Into<String>) {
        self.facts_narrative = facts.into();
    }

    /// Replace the attachment list with a new selection
    ///
    /// Selecting again discards the previous selection.
    pub fn set_attached_file_names(&mut self, names: Vec<String>) {
        debug!(count = names.len(), "set_attached_file_names: called");
        self.attached_file_names = names;
    }

    /// Replace the attachment list with the file names of `paths`
    pub fn select_attachments<P: AsRef<Path>>(&mut self, paths: &[P]) {
        let names = paths
            .iter()
            .filter_map(|p| p.as_ref().file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        self.set_attached_file_names(names);
    }

    /// Required fields that are still empty, by dotted path
    pub fn missing_fields(&self) -> Vec<&'static str> {
        debug!("missing_fields: called");
        let mut missing = Vec::new();
        if self.case_type.is_none() {
            missing.push("case_type");
        }
        let required = [
            ("court", &self.court),
            ("plaintiff.name", &self.plaintiff.name),
            ("plaintiff.national_id", &self.plaintiff.national_id),
            ("plaintiff.address", &self.plaintiff.address),
            ("plaintiff.occupation", &self.plaintiff.occupation),
            ("defendant.name", &self.defendant.name),
            ("defendant.address", &self.defendant.address),
            ("lawyer.name", &self.lawyer.name),
            ("lawyer.bar_number", &self.lawyer.bar_number),
            ("facts_narrative", &self.facts_narrative),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                missing.push(field);
            }
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Parse a draft from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
