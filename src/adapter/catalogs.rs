//! Heading catalogs for the five document-based frameworks

use super::document::{Catalog, FieldRule, HeadingRule, IdScheme, ParentRule};
use crate::graph::{Framework, NodeKind};
use regex::Regex;

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("static heading pattern")
}

fn field(key: &'static str, re: &str, list: bool) -> FieldRule {
    FieldRule {
        key,
        pattern: pattern(re),
        list,
    }
}

/// The catalog for a document-based framework; `None` for the threat model.
pub fn catalog_for(framework: Framework) -> Option<Catalog> {
    let catalog = match framework {
        Framework::ThreatModel => return None,
        Framework::ControlsCatalog => controls_catalog(),
        Framework::RiskFunctions => risk_functions(),
        Framework::HealthPrivacy => health_privacy(),
        Framework::FinancialExam => financial_exam(),
        Framework::PaymentSecurity => payment_security(),
    };
    Some(catalog)
}

/// `Control AC-1: …`, `CIS Control 3: …`, `Safeguard 3.1 …`
pub fn controls_catalog() -> Catalog {
    Catalog {
        framework: Framework::ControlsCatalog,
        rules: vec![
            HeadingRule::new(
                NodeKind::Control,
                pattern(r"^Control\s+(?P<id>[A-Z]{2,3}-\d+(?:\(\d+\))?)\s*[:.\-–]\s*(?P<title>.+)$"),
                IdScheme::Verbatim,
                ParentRule::Root,
            )
            .with_marker(pattern(r"^Control\b.*:")),
            HeadingRule::new(
                NodeKind::Control,
                pattern(r"^CIS\s+Control\s+(?P<id>\d{1,2})\s*[:.\-–]?\s*(?P<title>.+)$"),
                IdScheme::Prefixed("CIS-"),
                ParentRule::Root,
            )
            .with_marker(pattern(r"^CIS\s+Control\b")),
            HeadingRule::new(
                NodeKind::Safeguard,
                pattern(r"^Safeguard\s+(?P<id>\d{1,2}\.\d{1,2})\s*[:.\-–]?\s*(?P<title>.+)$"),
                IdScheme::Verbatim,
                ParentRule::Enclosing(NodeKind::Control),
            )
            .with_marker(pattern(r"^Safeguard\b")),
        ],
        fields: vec![
            field("asset_type", r"^Asset Type\s*:\s*(?P<value>.+)$", false),
            field("security_function", r"^Security Function\s*:\s*(?P<value>.+)$", false),
            field(
                "implementation_groups",
                r"^Implementation Groups?\s*:\s*(?P<value>.+)$",
                true,
            ),
        ],
    }
}

/// `GOVERN (GV): …`, `Organizational Context (GV.OC): …`, `GV.OC-01: …`
pub fn risk_functions() -> Catalog {
    Catalog {
        framework: Framework::RiskFunctions,
        rules: vec![
            HeadingRule::new(
                NodeKind::Function,
                pattern(r"^(?P<title>[A-Z]{3,}(?: [A-Z]{3,})*)\s*\((?P<id>[A-Z]{2})\)\s*[:.\-–]?\s*(?P<text>.*)$"),
                IdScheme::Verbatim,
                ParentRule::Root,
            ),
            HeadingRule::new(
                NodeKind::Category,
                pattern(r"^(?P<title>[A-Z][A-Za-z ,&'/\-]+?)\s*\((?P<id>[A-Z]{2}\.[A-Z]{2})\)\s*[:.\-–]?\s*(?P<text>.*)$"),
                IdScheme::Verbatim,
                ParentRule::Prefix {
                    kind: NodeKind::Function,
                    delimiter: '.',
                },
            ),
            HeadingRule::new(
                NodeKind::Subcategory,
                pattern(r"^(?P<id>[A-Z]{2}\.[A-Z]{2}-\d{2,3})\s*[:.\-–]?\s*(?P<title>.+)$"),
                IdScheme::Verbatim,
                ParentRule::Prefix {
                    kind: NodeKind::Category,
                    delimiter: '-',
                },
            )
            .with_marker(pattern(r"^[A-Z]{2}\.[A-Z]{2}-")),
        ],
        fields: Vec::new(),
    }
}

/// `§ 164.308 Administrative safeguards.`, `(a)(1) Standard: …`
pub fn health_privacy() -> Catalog {
    Catalog {
        framework: Framework::HealthPrivacy,
        rules: vec![
            HeadingRule::new(
                NodeKind::Section,
                pattern(r"^§\s*(?P<id>\d{3}\.\d{1,4})\s+(?P<title>.+?)\.?$"),
                IdScheme::Verbatim,
                ParentRule::Root,
            )
            .with_marker(pattern(r"^§")),
            HeadingRule::new(
                NodeKind::Requirement,
                pattern(r"^(?P<id>\([a-z]\)(?:\(\d+\))?(?:\([ivx]+\))?(?:\([A-Z]\))?)\s+(?P<title>\S.*)$"),
                IdScheme::QualifiedBy(NodeKind::Section),
                ParentRule::Enclosing(NodeKind::Section),
            ),
        ],
        fields: Vec::new(),
    }
}

/// `II.C.13 Patch Management`, `Objective 3: …`
pub fn financial_exam() -> Catalog {
    Catalog {
        framework: Framework::FinancialExam,
        rules: vec![
            HeadingRule::new(
                NodeKind::Section,
                pattern(r"^(?P<id>[IVX]+\.[A-Z](?:\.\d+)*)\.?\s+(?P<title>[A-Z].*)$"),
                IdScheme::Verbatim,
                ParentRule::Prefix {
                    kind: NodeKind::Section,
                    delimiter: '.',
                },
            ),
            HeadingRule::new(
                NodeKind::Requirement,
                pattern(r"^Objective\s+(?P<id>\d+)\s*[:.\-–]\s*(?P<title>.+)$"),
                IdScheme::Prefixed("OBJ-"),
                ParentRule::Enclosing(NodeKind::Section),
            )
            .with_marker(pattern(r"^Objective\b")),
        ],
        fields: Vec::new(),
    }
}

/// `Requirement 1: …`, `1.2.1 …`
pub fn payment_security() -> Catalog {
    Catalog {
        framework: Framework::PaymentSecurity,
        rules: vec![
            HeadingRule::new(
                NodeKind::Requirement,
                pattern(r"^Requirement\s+(?P<id>\d{1,2})\s*[:.\-–]\s*(?P<title>.+)$"),
                IdScheme::Verbatim,
                ParentRule::Root,
            )
            .with_marker(pattern(r"^Requirement\b")),
            HeadingRule::new(
                NodeKind::Requirement,
                pattern(r"^(?P<id>\d{1,2}(?:\.\d{1,2}){1,3})\s+(?P<title>[A-Z].+)$"),
                IdScheme::Verbatim,
                ParentRule::Prefix {
                    kind: NodeKind::Requirement,
                    delimiter: '.',
                },
            ),
        ],
        fields: Vec::new(),
    }
}
