//! Structured-bundle adapter for the threat model (STIX 2.x ATT&CK bundles)
//!
//! Objects are visited in bundle order. Node records come first; kill-chain
//! links and relationship objects are deferred until every object has been
//! seen, so all link endpoints are known by then.

use super::fetch::RawSource;
use super::traits::{AdapterConfig, AdapterEvents, FrameworkAdapter};
use super::types::{AdapterEvent, LinkRecord, ParseError, UnitRecord, UnitRef};
use crate::graph::{Citation, Framework, NodeKind, Properties, Relation};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};

const ATTACK_SOURCE: &str = "mitre-attack";

#[derive(Debug, Deserialize)]
struct RawBundle {
    #[serde(default)]
    objects: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ExternalReference {
    source_name: String,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KillChainPhase {
    kill_chain_name: String,
    phase_name: String,
}

#[derive(Debug, Deserialize)]
struct StixObject {
    #[serde(rename = "type")]
    object_type: String,
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    revoked: bool,
    #[serde(default)]
    x_mitre_deprecated: bool,
    #[serde(default)]
    external_references: Vec<ExternalReference>,
    #[serde(default)]
    kill_chain_phases: Vec<KillChainPhase>,
    #[serde(default)]
    x_mitre_platforms: Vec<String>,
    #[serde(default)]
    x_mitre_data_sources: Vec<String>,
    #[serde(default)]
    x_mitre_permissions_required: Vec<String>,
    #[serde(default)]
    x_mitre_is_subtechnique: bool,
    #[serde(default)]
    x_mitre_shortname: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    modified: Option<String>,
    #[serde(default)]
    relationship_type: Option<String>,
    #[serde(default)]
    source_ref: Option<String>,
    #[serde(default)]
    target_ref: Option<String>,
}

impl StixObject {
    fn is_retired(&self) -> bool {
        self.revoked || self.x_mitre_deprecated
    }

    fn attack_reference(&self) -> Option<&ExternalReference> {
        self.external_references
            .iter()
            .find(|r| r.source_name == ATTACK_SOURCE && r.external_id.is_some())
    }

    fn external_id(&self) -> String {
        self.attack_reference()
            .and_then(|r| r.external_id.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

fn kind_for(object_type: &str) -> Option<NodeKind> {
    match object_type {
        "attack-pattern" => Some(NodeKind::Technique),
        "x-mitre-tactic" => Some(NodeKind::Tactic),
        "intrusion-set" => Some(NodeKind::ThreatGroup),
        "malware" => Some(NodeKind::Malware),
        "tool" => Some(NodeKind::Tool),
        "course-of-action" => Some(NodeKind::Mitigation),
        _ => None,
    }
}

fn relation_for(relationship_type: &str) -> Relation {
    match relationship_type {
        "uses" => Relation::Uses,
        "mitigates" => Relation::Mitigates,
        "subtechnique-of" => Relation::PartOf,
        "detects" => Relation::Detects,
        _ => Relation::RelatesTo,
    }
}

/// `defense-evasion` -> `Defense Evasion`
fn phase_title(phase: &str) -> String {
    phase
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn insert_list(properties: &mut Properties, key: &str, values: &[String]) {
    if !values.is_empty() {
        properties.insert(key, values.to_vec());
    }
}

/// Adapter for ATT&CK-style STIX bundles.
#[derive(Debug, Clone, Default)]
pub struct BundleAdapter;

impl BundleAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl FrameworkAdapter for BundleAdapter {
    fn framework(&self) -> Framework {
        Framework::ThreatModel
    }

    fn parse(&self, raw: RawSource, config: &AdapterConfig) -> AdapterEvents {
        Box::new(BundleEvents::new(&raw.bytes, config.document_id.clone()))
    }
}

enum Phase {
    Objects,
    KillChain,
    Relationships,
    Done,
}

struct BundleEvents {
    document_id: String,
    phase: Phase,
    objects: std::vec::IntoIter<Value>,
    queue: VecDeque<AdapterEvent>,
    /// STIX id -> unit for every object that produced a node
    known: HashMap<String, UnitRef>,
    /// STIX ids present in the bundle but outside the model
    ignored: HashSet<String>,
    /// Tactic shortname -> tactic external id
    tactics: HashMap<String, String>,
    /// (technique, phase name, technique STIX id), in bundle order
    kill_chain: Vec<(UnitRef, String, String)>,
    deferred: Vec<StixObject>,
    relationships: std::vec::IntoIter<StixObject>,
}

impl BundleEvents {
    fn new(bytes: &[u8], document_id: String) -> Self {
        let mut events = Self {
            document_id,
            phase: Phase::Objects,
            objects: Vec::new().into_iter(),
            queue: VecDeque::new(),
            known: HashMap::new(),
            ignored: HashSet::new(),
            tactics: HashMap::new(),
            kill_chain: Vec::new(),
            deferred: Vec::new(),
            relationships: Vec::new().into_iter(),
        };

        match serde_json::from_slice::<RawBundle>(bytes) {
            Ok(bundle) => events.objects = bundle.objects.into_iter(),
            Err(e) => {
                events.queue.push_back(
                    ParseError::Unreadable {
                        expected: "STIX bundle",
                        detail: e.to_string(),
                    }
                    .into(),
                );
                events.phase = Phase::Done;
            }
        }
        events
    }

    fn visit_object(&mut self, value: Value) {
        let object: StixObject = match serde_json::from_value(value.clone()) {
            Ok(object) => object,
            Err(e) => {
                let object_id = value
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or("<no id>")
                    .to_string();
                self.queue.push_back(
                    ParseError::MalformedObject {
                        object_id,
                        detail: e.to_string(),
                    }
                    .into(),
                );
                return;
            }
        };

        if object.object_type == "relationship" {
            self.deferred.push(object);
            return;
        }

        let kind = match kind_for(&object.object_type) {
            Some(kind) if !object.is_retired() => kind,
            _ => {
                self.ignored.insert(object.id);
                return;
            }
        };

        let name = object.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            self.queue.push_back(
                ParseError::MalformedObject {
                    object_id: object.id.clone(),
                    detail: format!("{} has no name", object.object_type),
                }
                .into(),
            );
            self.ignored.insert(object.id);
            return;
        }

        let unit = UnitRef::of(kind, object.external_id());
        let description = object.description.clone().unwrap_or_default();
        let properties = self.properties_for(kind, &object, &unit);

        self.known.insert(object.id.clone(), unit.clone());
        self.queue.push_back(
            UnitRecord {
                unit,
                name: name.to_string(),
                citation: Some(Citation::new(&self.document_id, &object.id, &description)),
                description,
                properties,
            }
            .into(),
        );
    }

    fn properties_for(&mut self, kind: NodeKind, object: &StixObject, unit: &UnitRef) -> Properties {
        let mut properties = Properties::new();
        if let Some(url) = object.attack_reference().and_then(|r| r.url.clone()) {
            properties.insert("url", url);
        }

        match kind {
            NodeKind::Technique => {
                let phases: Vec<String> = object
                    .kill_chain_phases
                    .iter()
                    .filter(|p| p.kill_chain_name == ATTACK_SOURCE)
                    .map(|p| p.phase_name.clone())
                    .collect();
                for phase in &phases {
                    self.kill_chain
                        .push((unit.clone(), phase.clone(), object.id.clone()));
                }
                insert_list(&mut properties, "tactics", &phases);
                insert_list(&mut properties, "platforms", &object.x_mitre_platforms);
                insert_list(&mut properties, "data_sources", &object.x_mitre_data_sources);
                insert_list(
                    &mut properties,
                    "permissions_required",
                    &object.x_mitre_permissions_required,
                );
                properties.insert("is_subtechnique", object.x_mitre_is_subtechnique);
            }
            NodeKind::Tactic => {
                if let Some(shortname) = &object.x_mitre_shortname {
                    self.tactics
                        .insert(shortname.clone(), unit.external_id.clone());
                    properties.insert("shortname", shortname.as_str());
                }
            }
            NodeKind::ThreatGroup => {
                insert_list(&mut properties, "aliases", &object.aliases);
            }
            NodeKind::Malware | NodeKind::Tool => {
                insert_list(&mut properties, "platforms", &object.x_mitre_platforms);
                insert_list(&mut properties, "labels", &object.labels);
            }
            _ => {}
        }

        if let Some(created) = &object.created {
            properties.insert("created", created.as_str());
        }
        if let Some(modified) = &object.modified {
            properties.insert("modified", modified.as_str());
        }
        properties
    }

    /// Technique PART_OF Tactic for every kill-chain phase, synthesizing
    /// tactics the bundle does not define.
    fn resolve_kill_chain(&mut self) {
        let mut synthesized: HashSet<String> = HashSet::new();
        let mut links = Vec::new();

        for (technique, phase, technique_stix_id) in std::mem::take(&mut self.kill_chain) {
            let tactic_id = match self.tactics.get(&phase) {
                Some(id) => id.clone(),
                None => {
                    if synthesized.insert(phase.clone()) {
                        let title = phase_title(&phase);
                        self.queue.push_back(
                            UnitRecord {
                                unit: UnitRef::of(NodeKind::Tactic, phase.as_str()),
                                name: title.clone(),
                                description: format!("ATT&CK tactic: {}", title),
                                properties: Properties::new().with("shortname", phase.as_str()),
                                citation: Some(Citation::new(
                                    &self.document_id,
                                    format!("{}/kill_chain_phases/{}", technique_stix_id, phase),
                                    phase.as_str(),
                                )),
                            }
                            .into(),
                        );
                    }
                    phase.clone()
                }
            };
            links.push(LinkRecord::asserted(
                Relation::PartOf,
                technique,
                UnitRef::of(NodeKind::Tactic, tactic_id),
            ));
        }

        self.queue.extend(links.into_iter().map(AdapterEvent::from));
    }

    fn visit_relationship(&mut self, object: StixObject) {
        if object.is_retired() {
            return;
        }
        let (Some(source_ref), Some(target_ref)) = (&object.source_ref, &object.target_ref) else {
            self.queue.push_back(
                ParseError::MalformedObject {
                    object_id: object.id.clone(),
                    detail: "relationship without source_ref/target_ref".into(),
                }
                .into(),
            );
            return;
        };

        if self.ignored.contains(source_ref) || self.ignored.contains(target_ref) {
            return;
        }

        let source = self.known.get(source_ref).cloned();
        let target = self.known.get(target_ref).cloned();
        let (source, target) = match (source, target) {
            (Some(source), Some(target)) => (source, target),
            (None, _) => return self.dangling(&object.id, source_ref),
            (_, None) => return self.dangling(&object.id, target_ref),
        };

        let relation = relation_for(object.relationship_type.as_deref().unwrap_or_default());
        self.queue
            .push_back(LinkRecord::asserted(relation, source, target).into());
    }

    fn dangling(&mut self, object_id: &str, endpoint: &str) {
        self.queue.push_back(
            ParseError::DanglingReference {
                object_id: object_id.to_string(),
                endpoint: endpoint.to_string(),
            }
            .into(),
        );
    }
}

impl Iterator for BundleEvents {
    type Item = AdapterEvent;

    fn next(&mut self) -> Option<AdapterEvent> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            match self.phase {
                Phase::Objects => match self.objects.next() {
                    Some(value) => self.visit_object(value),
                    None => self.phase = Phase::KillChain,
                },
                Phase::KillChain => {
                    self.resolve_kill_chain();
                    self.relationships = std::mem::take(&mut self.deferred).into_iter();
                    self.phase = Phase::Relationships;
                }
                Phase::Relationships => match self.relationships.next() {
                    Some(object) => self.visit_relationship(object),
                    None => self.phase = Phase::Done,
                },
                Phase::Done => return None,
            }
        }
    }
}
