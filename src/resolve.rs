//! Cross-framework relationship resolver
//!
//! Infers `MAPS_TO` edges between two ingested frameworks. An explicit
//! citation of a target identifier in the source text wins outright
//! (confidence 1.0); otherwise the best name-token overlap at or above the
//! threshold is taken, with its score as confidence. Output is a pure
//! function of the graph state, so passes are repeatable.

use crate::graph::{Edge, Framework, Node, NodeKind};
use crate::ingest::{IngestionGates, UpsertError, UpsertGateway};
use crate::storage::{NodeFilter, StorageError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fuzzy matches never reach the confidence of an explicit citation.
pub const FUZZY_CEILING: f64 = 0.99;

const STOPWORDS: &[&str] = &[
    "a", "all", "an", "and", "any", "are", "as", "at", "be", "by", "for", "from", "has", "have",
    "in", "into", "is", "it", "its", "of", "on", "or", "that", "the", "their", "these", "this",
    "those", "to", "with", "within",
];

/// Lowercased, stopword-stripped word tokens.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .collect()
}

/// Jaccard similarity of two token sets; 0 when either is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let shared = a.intersection(b).count();
    if shared == 0 {
        return 0.0;
    }
    shared as f64 / a.union(b).count() as f64
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no mapping policy for {0} -> {1}")]
    NoPolicy(Framework, Framework),

    #[error("reading {0} -> {1} candidates failed: {2}")]
    Store(Framework, Framework, #[source] StorageError),

    #[error("writing {0} -> {1} mappings failed: {2}")]
    Upsert(Framework, Framework, #[source] UpsertError),
}

/// Which candidate wins among equally scored fuzzy matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    SmallerExternalId,
    LargerExternalId,
}

impl TieBreak {
    fn prefers(&self, candidate: &str, incumbent: &str) -> bool {
        match self {
            Self::SmallerExternalId => candidate < incumbent,
            Self::LargerExternalId => candidate > incumbent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum Jaccard score for a fuzzy match
    pub threshold: f64,
    pub tie_break: TieBreak,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            tie_break: TieBreak::default(),
        }
    }
}

/// How nodes of one framework are matched against another.
#[derive(Debug, Clone)]
pub struct MappingPolicy {
    pub source: Framework,
    pub target: Framework,
    pub source_kinds: Vec<NodeKind>,
    pub target_kinds: Vec<NodeKind>,
    /// Finds identifiers of the target framework in source text
    pub reference: Regex,
    /// Overrides the resolver-wide threshold for this pair
    pub threshold: Option<f64>,
}

impl MappingPolicy {
    pub fn new(
        source: Framework,
        target: Framework,
        source_kinds: &[NodeKind],
        target_kinds: &[NodeKind],
    ) -> Self {
        Self {
            source,
            target,
            source_kinds: source_kinds.to_vec(),
            target_kinds: target_kinds.to_vec(),
            reference: reference_pattern(target),
            threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn pair(&self) -> (Framework, Framework) {
        (self.source, self.target)
    }

    /// Distinct target identifiers cited anywhere in a node's text.
    fn cited_ids(&self, node: &Node) -> BTreeSet<String> {
        let mut texts = vec![node.name.as_str(), node.description.as_str()];
        for (_, value) in node.properties.iter() {
            texts.extend(value.text_fragments());
        }
        texts
            .into_iter()
            .flat_map(|text| self.reference.find_iter(text).map(|m| m.as_str().to_string()))
            .collect()
    }
}

/// Identifier shapes each framework is cited by.
fn reference_pattern(target: Framework) -> Regex {
    let pattern = match target {
        Framework::ThreatModel => r"\b(?:T\d{4}(?:\.\d{3})?|M1\d{3})\b",
        Framework::ControlsCatalog => r"\b(?:[A-Z]{2}-\d{1,2}|CIS-\d{1,2})\b",
        Framework::RiskFunctions => r"\b[A-Z]{2}\.[A-Z]{2}(?:-\d{2})?\b",
        Framework::HealthPrivacy => r"\b16[04]\.\d{3,4}(?:\([a-z0-9]+\))*",
        Framework::FinancialExam => r"\b(?:[IVX]+\.[A-Z](?:\.\d+)+|OBJ-\d+)\b",
        Framework::PaymentSecurity => r"\b\d{1,2}\.\d{1,2}(?:\.\d{1,2}){0,2}\b",
    };
    Regex::new(pattern).expect("static reference pattern")
}

/// The mapping pairs resolved out of the box.
pub fn default_policies() -> Vec<MappingPolicy> {
    use Framework::*;
    use NodeKind::*;
    vec![
        MappingPolicy::new(ControlsCatalog, ThreatModel, &[Control, Safeguard], &[Technique, Mitigation]),
        MappingPolicy::new(RiskFunctions, ControlsCatalog, &[Category, Subcategory], &[Control, Safeguard]),
        MappingPolicy::new(RiskFunctions, ThreatModel, &[Subcategory], &[Technique, Mitigation]),
        MappingPolicy::new(HealthPrivacy, RiskFunctions, &[Section, Requirement], &[Category, Subcategory]),
        MappingPolicy::new(FinancialExam, RiskFunctions, &[Section, Requirement], &[Category, Subcategory]),
        MappingPolicy::new(PaymentSecurity, ControlsCatalog, &[Requirement], &[Control, Safeguard]),
    ]
}

/// Outcome of one resolved pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairOutcome {
    pub source: Framework,
    pub target: Framework,
    pub exact: usize,
    pub fuzzy: usize,
    /// Edges upserted, sorted by `(source, target)`
    pub edges: Vec<Edge>,
}

#[derive(Debug, Default)]
pub struct ResolveReport {
    pub resolved: Vec<PairOutcome>,
    pub errors: Vec<ResolutionError>,
}

impl ResolveReport {
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.resolved.iter().flat_map(|pair| pair.edges.iter())
    }
}

pub struct Resolver {
    gateway: UpsertGateway,
    gates: IngestionGates,
    policies: Vec<MappingPolicy>,
    config: ResolverConfig,
}

impl Resolver {
    /// A resolver with the default policies and configuration.
    pub fn new(gateway: UpsertGateway, gates: IngestionGates) -> Self {
        Self {
            gateway,
            gates,
            policies: default_policies(),
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a policy, replacing any existing one for the same pair.
    pub fn with_policy(mut self, policy: MappingPolicy) -> Self {
        self.policies.retain(|p| p.pair() != policy.pair());
        self.policies.push(policy);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn policy(&self, source: Framework, target: Framework) -> Option<&MappingPolicy> {
        self.policies.iter().find(|p| p.pair() == (source, target))
    }

    /// Every pair with a policy, in policy order.
    pub fn pairs(&self) -> Vec<(Framework, Framework)> {
        self.policies.iter().map(MappingPolicy::pair).collect()
    }

    /// Resolve each pair in turn. A pair that fails is reported and skipped.
    pub async fn resolve(&self, pairs: &[(Framework, Framework)]) -> ResolveReport {
        let mut report = ResolveReport::default();
        for &(source, target) in pairs {
            match self.resolve_pair(source, target).await {
                Ok(outcome) => report.resolved.push(outcome),
                Err(e) => {
                    warn!(%source, %target, error = %e, "mapping pair skipped");
                    report.errors.push(e);
                }
            }
        }
        report
    }

    async fn resolve_pair(
        &self,
        source: Framework,
        target: Framework,
    ) -> Result<PairOutcome, ResolutionError> {
        let policy = self
            .policy(source, target)
            .ok_or(ResolutionError::NoPolicy(source, target))?;

        let _settled = self.gates.settled(&[source, target]).await;
        let edges = self
            .infer(policy)
            .map_err(|e| ResolutionError::Store(source, target, e))?;

        if !edges.is_empty() {
            self.gateway
                .upsert(&[], &edges)
                .await
                .map_err(|e| ResolutionError::Upsert(source, target, e))?;
        }

        let exact = edges.iter().filter(|e| !e.is_inferred()).count();
        let outcome = PairOutcome {
            source,
            target,
            exact,
            fuzzy: edges.len() - exact,
            edges,
        };
        info!(
            %source,
            %target,
            exact = outcome.exact,
            fuzzy = outcome.fuzzy,
            "mapping pair resolved"
        );
        Ok(outcome)
    }

    /// Compute the mapping edges for one policy from the current graph state.
    pub fn infer(&self, policy: &MappingPolicy) -> Result<Vec<Edge>, StorageError> {
        let store = self.gateway.store();
        let sources = store.find_nodes(
            &NodeFilter::new()
                .in_framework(policy.source)
                .with_kinds(policy.source_kinds.iter().copied()),
        )?;
        let targets = store.find_nodes(
            &NodeFilter::new()
                .in_framework(policy.target)
                .with_kinds(policy.target_kinds.iter().copied()),
        )?;
        debug!(
            source = %policy.source,
            target = %policy.target,
            sources = sources.len(),
            targets = targets.len(),
            "resolving candidates"
        );

        let mut by_id: HashMap<&str, Vec<&Node>> = HashMap::new();
        for node in &targets {
            by_id.entry(node.external_id()).or_default().push(node);
        }
        let target_tokens: Vec<(&Node, BTreeSet<String>)> =
            targets.iter().map(|node| (node, tokenize(&node.name))).collect();
        let threshold = policy.threshold.unwrap_or(self.config.threshold);

        let mut edges = Vec::new();
        for node in &sources {
            let mut cited_any = false;
            for id in policy.cited_ids(node) {
                for target in by_id.get(id.as_str()).into_iter().flatten() {
                    cited_any = true;
                    edges.push(Edge::mapping(
                        node.key.clone(),
                        target.key.clone(),
                        1.0,
                        format!("explicit citation of {} in {}", id, node.key),
                    ));
                }
            }
            if cited_any {
                continue;
            }
            if let Some(edge) = self.best_fuzzy(node, &target_tokens, threshold) {
                edges.push(edge);
            }
        }

        edges.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        edges.dedup_by(|a, b| a.key() == b.key());
        Ok(edges)
    }

    fn best_fuzzy(
        &self,
        node: &Node,
        targets: &[(&Node, BTreeSet<String>)],
        threshold: f64,
    ) -> Option<Edge> {
        let tokens = tokenize(&node.name);
        if tokens.is_empty() {
            return None;
        }

        let mut best: Option<(f64, &Node, &BTreeSet<String>)> = None;
        for (target, target_tokens) in targets {
            let score = jaccard(&tokens, target_tokens);
            if score == 0.0 || score < threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((top, incumbent, _)) => {
                    score > top
                        || (score == top
                            && self
                                .config
                                .tie_break
                                .prefers(target.external_id(), incumbent.external_id()))
                }
            };
            if better {
                best = Some((score, *target, target_tokens));
            }
        }

        best.map(|(score, target, target_tokens)| {
            let shared: Vec<&str> = tokens
                .intersection(target_tokens)
                .map(String::as_str)
                .collect();
            Edge::mapping(
                node.key.clone(),
                target.key.clone(),
                score.min(FUZZY_CEILING),
                format!("name token overlap {:.2} on: {}", score, shared.join(", ")),
            )
        })
    }
}
