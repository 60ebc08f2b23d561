//! Small but realistic source fixtures, one per framework.
//!
//! Cross-references between them are deliberate: AC-2 cites T1078, SI-3
//! cites T1055, PR.AA-05 cites AC-2, the HIPAA access control standard
//! cites PR.AA-05 and PCI 8.2.1 cites AC-2.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::json;

pub const ATTACK_DOCUMENT: &str = "enterprise-attack";

pub fn attack_bundle() -> String {
    let attack_ref = |id: &str| json!([{"source_name": "mitre-attack", "external_id": id}]);
    let phase = |name: &str| json!({"kill_chain_name": "mitre-attack", "phase_name": name});
    json!({
        "type": "bundle",
        "id": "bundle--6c9c4b1e-1f7c-4d3a-9a56-0d5d0f8c2a11",
        "objects": [
            {"type": "identity", "id": "identity--c78cb6e5", "name": "The MITRE Corporation"},
            {"type": "x-mitre-tactic", "id": "x-mitre-tactic--78b23412", "name": "Defense Evasion",
             "x_mitre_shortname": "defense-evasion", "external_references": attack_ref("TA0005")},
            {"type": "x-mitre-tactic", "id": "x-mitre-tactic--5e29b093", "name": "Privilege Escalation",
             "x_mitre_shortname": "privilege-escalation", "external_references": attack_ref("TA0004")},
            {"type": "attack-pattern", "id": "attack-pattern--43e7dc91", "name": "Process Injection",
             "description": "Adversaries may inject code into processes in order to evade process-based defenses.",
             "x_mitre_platforms": ["Windows", "Linux", "macOS"],
             "kill_chain_phases": [phase("defense-evasion"), phase("privilege-escalation")],
             "external_references": attack_ref("T1055")},
            {"type": "attack-pattern", "id": "attack-pattern--f4599aa0", "name": "Dynamic-link Library Injection",
             "description": "Adversaries may inject dynamic-link libraries (DLLs) into processes.",
             "x_mitre_is_subtechnique": true,
             "kill_chain_phases": [phase("defense-evasion")],
             "external_references": attack_ref("T1055.001")},
            {"type": "attack-pattern", "id": "attack-pattern--b17a1a56", "name": "Valid Accounts",
             "description": "Adversaries may obtain and abuse credentials of existing accounts.",
             "kill_chain_phases": [phase("defense-evasion")],
             "external_references": attack_ref("T1078")},
            {"type": "intrusion-set", "id": "intrusion-set--c93fccb1", "name": "Lazarus Group",
             "aliases": ["Lazarus Group", "HIDDEN COBRA"], "external_references": attack_ref("G0032")},
            {"type": "course-of-action", "id": "course-of-action--90f39ee1", "name": "Behavior Prevention on Endpoint",
             "external_references": attack_ref("M1040")},
            {"type": "course-of-action", "id": "course-of-action--9bb9e696", "name": "Privileged Account Management",
             "external_references": attack_ref("M1026")},
            {"type": "relationship", "id": "relationship--1", "relationship_type": "uses",
             "source_ref": "intrusion-set--c93fccb1", "target_ref": "attack-pattern--43e7dc91"},
            {"type": "relationship", "id": "relationship--2", "relationship_type": "mitigates",
             "source_ref": "course-of-action--90f39ee1", "target_ref": "attack-pattern--43e7dc91"},
            {"type": "relationship", "id": "relationship--3", "relationship_type": "subtechnique-of",
             "source_ref": "attack-pattern--f4599aa0", "target_ref": "attack-pattern--43e7dc91"},
            {"type": "relationship", "id": "relationship--4", "relationship_type": "uses",
             "source_ref": "identity--c78cb6e5", "target_ref": "attack-pattern--43e7dc91"}
        ]
    })
    .to_string()
}

pub const CONTROLS: &str = "Control AC-1: Policy and Procedures\n\
Develop, document, and disseminate an access control policy.\n\
Control AC-2: Account Management\n\
Manage system accounts, including privileged accounts, to counter T1078.\n\
\u{c}Control SI-3: Malicious Code Protection\n\
Detect code injected into running processes such as T1055.\n";

/// The controls catalog as a two-page PDF, one text object per line.
pub fn controls_pdf() -> Vec<u8> {
    pdf_document(&[
        &[
            "Control AC-1: Policy and Procedures",
            "Develop, document, and disseminate an access control policy.",
            "Control AC-2: Account Management",
            "Manage system accounts, including privileged accounts, to counter T1078.",
        ],
        &[
            "Control SI-3: Malicious Code Protection",
            "Detect code injected into running processes such as T1055.",
        ],
    ])
}

pub fn pdf_document(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), Object::Integer(10)]));
            operations.push(Operation::new("Td", vec![Object::Integer(50), Object::Integer(780 - 12 * i as i64)]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let encoded = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0, 0, 612, 792].into_iter().map(Object::Integer).collect::<Vec<_>>(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// One well-formed control followed by an entry that lost its identifier.
pub const CONTROLS_WITH_MALFORMED: &str = "Control AC-1: Policy and Procedures\n\
Develop, document, and disseminate an access control policy.\n\
Control: Account Management\n\
This entry has no control number.\n";

pub const RISK_FUNCTIONS: &str = "PROTECT (PR): Safeguards to manage cybersecurity risks are used.\n\
Identity Management, Authentication, and Access Control (PR.AA): Access to assets is limited to authorized users.\n\
PR.AA-05: Access permissions and authorizations are defined and managed (see AC-2).\n";

pub const HEALTH_PRIVACY: &str = "§ 164.312 Technical safeguards.\n\
(a)(1) Standard: Access control.\n\
Implement technical policies that allow access only to authorized persons (PR.AA-05).\n";

pub const FINANCIAL_EXAM: &str = "II.C Operations\n\
II.C.13 Patch Management\n\
Management should maintain a patch management program.\n\
Objective 3: Determine whether management has effective patch management.\n";

pub const PAYMENT_SECURITY: &str = "Requirement 8: Identify Users and Authenticate Access to System Components\n\
8.2 User identification and related accounts are strictly managed.\n\
8.2.1 All users are assigned a unique ID (aligns with AC-2).\n";
