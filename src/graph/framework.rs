//! Framework, node kind and relation vocabularies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a tag string does not name a known vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {vocabulary}: {value}")]
pub struct UnknownTag {
    pub vocabulary: &'static str,
    pub value: String,
}

impl UnknownTag {
    fn new(vocabulary: &'static str, value: &str) -> Self {
        Self {
            vocabulary,
            value: value.to_string(),
        }
    }
}

/// One of the six supported cybersecurity/compliance frameworks.
///
/// Immutable once assigned to a node: it is part of the identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Framework {
    /// Structured threat-intel bundle (MITRE ATT&CK, STIX 2.x)
    ThreatModel,
    /// Numbered security controls and safeguards (CIS Controls, NIST 800-53 style)
    ControlsCatalog,
    /// Function / category / subcategory catalog (NIST CSF)
    RiskFunctions,
    /// Health privacy regulation text (HIPAA)
    HealthPrivacy,
    /// Financial examination handbook (FFIEC)
    FinancialExam,
    /// Payment card security standard (PCI DSS)
    PaymentSecurity,
}

impl Framework {
    pub const ALL: [Framework; 6] = [
        Framework::ThreatModel,
        Framework::ControlsCatalog,
        Framework::RiskFunctions,
        Framework::HealthPrivacy,
        Framework::FinancialExam,
        Framework::PaymentSecurity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreatModel => "THREAT_MODEL",
            Self::ControlsCatalog => "CONTROLS_CATALOG",
            Self::RiskFunctions => "RISK_FUNCTIONS",
            Self::HealthPrivacy => "HEALTH_PRIVACY",
            Self::FinancialExam => "FINANCIAL_EXAM",
            Self::PaymentSecurity => "PAYMENT_SECURITY",
        }
    }

    /// True for the five frameworks ingested from free-form documents.
    ///
    /// Nodes from these frameworks must carry a citation.
    pub fn is_document_based(&self) -> bool {
        !matches!(self, Self::ThreatModel)
    }

    /// Node kinds this framework may produce.
    pub fn allowed_kinds(&self) -> &'static [NodeKind] {
        use NodeKind::*;
        match self {
            Self::ThreatModel => &[Technique, Tactic, ThreatGroup, Malware, Tool, Mitigation],
            Self::ControlsCatalog => &[Control, Safeguard],
            Self::RiskFunctions => &[Function, Category, Subcategory],
            Self::HealthPrivacy => &[Section, Requirement],
            Self::FinancialExam => &[Section, Requirement],
            Self::PaymentSecurity => &[Requirement],
        }
    }

    pub fn allows(&self, kind: NodeKind) -> bool {
        self.allowed_kinds().contains(&kind)
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = UnknownTag;

    /// Accepts the canonical tag in any case (dashes allowed for underscores)
    /// plus the common names of the standards behind each framework.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "THREAT_MODEL" | "ATTACK" | "MITRE" | "ATT&CK" => Ok(Self::ThreatModel),
            "CONTROLS_CATALOG" | "CIS" => Ok(Self::ControlsCatalog),
            "RISK_FUNCTIONS" | "NIST" | "CSF" => Ok(Self::RiskFunctions),
            "HEALTH_PRIVACY" | "HIPAA" => Ok(Self::HealthPrivacy),
            "FINANCIAL_EXAM" | "FFIEC" => Ok(Self::FinancialExam),
            "PAYMENT_SECURITY" | "PCI" | "PCI_DSS" => Ok(Self::PaymentSecurity),
            _ => Err(UnknownTag::new("framework", s)),
        }
    }
}

/// Kind tag of a canonical node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Technique,
    Tactic,
    ThreatGroup,
    Malware,
    Tool,
    Mitigation,
    Control,
    Safeguard,
    Function,
    Category,
    Subcategory,
    Requirement,
    Section,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technique => "Technique",
            Self::Tactic => "Tactic",
            Self::ThreatGroup => "ThreatGroup",
            Self::Malware => "Malware",
            Self::Tool => "Tool",
            Self::Mitigation => "Mitigation",
            Self::Control => "Control",
            Self::Safeguard => "Safeguard",
            Self::Function => "Function",
            Self::Category => "Category",
            Self::Subcategory => "Subcategory",
            Self::Requirement => "Requirement",
            Self::Section => "Section",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let kind = match lowered.as_str() {
            "technique" => Self::Technique,
            "tactic" => Self::Tactic,
            "threatgroup" | "threat_group" | "group" => Self::ThreatGroup,
            "malware" => Self::Malware,
            "tool" => Self::Tool,
            "mitigation" => Self::Mitigation,
            "control" => Self::Control,
            "safeguard" => Self::Safeguard,
            "function" => Self::Function,
            "category" => Self::Category,
            "subcategory" => Self::Subcategory,
            "requirement" => Self::Requirement,
            "section" => Self::Section,
            _ => return Err(UnknownTag::new("node kind", s)),
        };
        Ok(kind)
    }
}

/// Relationship tag of a directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    Uses,
    Mitigates,
    PartOf,
    Detects,
    /// Inferred cross-framework mapping
    MapsTo,
    RelatesTo,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uses => "USES",
            Self::Mitigates => "MITIGATES",
            Self::PartOf => "PART_OF",
            Self::Detects => "DETECTS",
            Self::MapsTo => "MAPS_TO",
            Self::RelatesTo => "RELATES_TO",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "USES" => Ok(Self::Uses),
            "MITIGATES" => Ok(Self::Mitigates),
            "PART_OF" | "SUBTECHNIQUE_OF" => Ok(Self::PartOf),
            "DETECTS" => Ok(Self::Detects),
            "MAPS_TO" => Ok(Self::MapsTo),
            "RELATES_TO" => Ok(Self::RelatesTo),
            _ => Err(UnknownTag::new("relation", s)),
        }
    }
}
