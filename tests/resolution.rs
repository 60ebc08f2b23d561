//! Cross-framework mapping over ingested fixtures

mod common;

use common::*;
use cyberweave::resolve::{MappingPolicy, ResolutionError};
use cyberweave::{Framework, GraphStore, NodeKind, Relation};
use std::time::Duration;

async fn ingested() -> Harness {
    let h = Harness::new();
    h.api.reingest_many(&Framework::ALL).await;
    h
}

fn mapping_pairs(h: &Harness) -> Vec<(String, String)> {
    h.maps_to()
        .into_iter()
        .map(|e| (e.source.to_string(), e.target.to_string()))
        .collect()
}

#[tokio::test]
async fn explicit_citation_becomes_a_certain_mapping() {
    let h = ingested().await;
    let report = h
        .api
        .resolve_pairs(&[(Framework::ControlsCatalog, Framework::ThreatModel)])
        .await;

    assert!(report.errors.is_empty());
    let pair = &report.resolved[0];
    assert_eq!(pair.exact, 2);
    assert_eq!(pair.fuzzy, 0);

    let si3 = key(Framework::ControlsCatalog, NodeKind::Control, "SI-3");
    let edges = h.store.edges_touching(&si3, Some(Relation::MapsTo)).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(
        edges[0].target,
        key(Framework::ThreatModel, NodeKind::Technique, "T1055")
    );
    assert_eq!(edges[0].confidence, 1.0);
    assert!(edges[0].evidence.as_deref().unwrap().contains("T1055"));
}

#[tokio::test]
async fn every_mapped_pair_links_its_citations() {
    let h = ingested().await;
    let report = h.api.resolve().await;
    assert!(report.errors.is_empty());
    assert_eq!(report.resolved.len(), 6);

    assert_eq!(
        mapping_pairs(&h),
        vec![
            (
                "CONTROLS_CATALOG/Control/AC-2".to_string(),
                "THREAT_MODEL/Technique/T1078".to_string()
            ),
            (
                "CONTROLS_CATALOG/Control/SI-3".to_string(),
                "THREAT_MODEL/Technique/T1055".to_string()
            ),
            (
                "RISK_FUNCTIONS/Subcategory/PR.AA-05".to_string(),
                "CONTROLS_CATALOG/Control/AC-2".to_string()
            ),
            (
                "HEALTH_PRIVACY/Requirement/164.312(a)(1)".to_string(),
                "RISK_FUNCTIONS/Subcategory/PR.AA-05".to_string()
            ),
            (
                "PAYMENT_SECURITY/Requirement/8.2.1".to_string(),
                "CONTROLS_CATALOG/Control/AC-2".to_string()
            ),
        ]
    );
    assert!(h.maps_to().iter().all(|e| e.confidence == 1.0));
}

#[tokio::test]
async fn resolving_twice_changes_nothing() {
    let h = ingested().await;
    let first = h.api.resolve().await;
    let edges = h.store.edge_count().unwrap();
    let mapped = h.maps_to();

    let second = h.api.resolve().await;

    assert_eq!(h.store.edge_count().unwrap(), edges);
    assert_eq!(h.maps_to(), mapped);
    let first_edges: Vec<_> = first.edges().cloned().collect();
    let second_edges: Vec<_> = second.edges().cloned().collect();
    assert_eq!(first_edges, second_edges);
}

#[tokio::test]
async fn name_overlap_yields_a_scored_mapping() {
    let controls = format!(
        "{}Control AC-6: Privileged Account Management\nRestrict privileged accounts.\n",
        CONTROLS
    );
    let fetcher = fixture_fetcher().with_memory("controls.txt", controls);
    let h = Harness::with_fetcher(std::sync::Arc::new(fetcher));
    h.api.reingest_many(&Framework::ALL).await;

    h.api
        .resolve_pairs(&[(Framework::ControlsCatalog, Framework::ThreatModel)])
        .await;

    let ac6 = key(Framework::ControlsCatalog, NodeKind::Control, "AC-6");
    let edges = h.store.edges_touching(&ac6, Some(Relation::MapsTo)).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(
        edges[0].target,
        key(Framework::ThreatModel, NodeKind::Mitigation, "M1026")
    );
    assert!(edges[0].confidence < 1.0);
    assert!(edges[0].evidence.as_deref().unwrap().starts_with("name token overlap"));
}

#[tokio::test]
async fn pair_without_policy_is_reported() {
    let h = ingested().await;
    let report = h
        .api
        .resolve_pairs(&[
            (Framework::ThreatModel, Framework::PaymentSecurity),
            (Framework::PaymentSecurity, Framework::ControlsCatalog),
        ])
        .await;

    assert_eq!(report.errors.len(), 1);
    assert!(matches!(
        report.errors[0],
        ResolutionError::NoPolicy(Framework::ThreatModel, Framework::PaymentSecurity)
    ));
    assert_eq!(report.resolved.len(), 1);
    assert_eq!(report.resolved[0].exact, 1);
}

#[tokio::test]
async fn custom_policy_threshold_overrides_default() {
    let h = ingested().await;
    let strict = MappingPolicy::new(
        Framework::FinancialExam,
        Framework::RiskFunctions,
        &[NodeKind::Section, NodeKind::Requirement],
        &[NodeKind::Category, NodeKind::Subcategory],
    )
    .with_threshold(0.1);
    let resolver = cyberweave::Resolver::new(
        h.engine().gateway().clone(),
        h.engine().gates().clone(),
    )
    .with_policy(strict);

    let report = resolver
        .resolve(&[(Framework::FinancialExam, Framework::RiskFunctions)])
        .await;
    assert!(report.errors.is_empty());
    // "Patch Management" shares one token with the PR.AA category name
    assert!(report.edges().any(|e| {
        e.source == key(Framework::FinancialExam, NodeKind::Section, "II.C.13")
            && e.target == key(Framework::RiskFunctions, NodeKind::Category, "PR.AA")
    }));
}

#[tokio::test]
async fn resolver_waits_for_running_ingestion() {
    let h = ingested().await;
    let gate = h.engine().gates().ingest(Framework::ThreatModel).await;

    let api = h.api.clone();
    let pending = tokio::spawn(async move {
        api.resolve_pairs(&[(Framework::ControlsCatalog, Framework::ThreatModel)])
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!pending.is_finished());
    assert!(h
        .store
        .edges_touching(
            &key(Framework::ControlsCatalog, NodeKind::Control, "SI-3"),
            Some(Relation::MapsTo)
        )
        .unwrap()
        .is_empty());

    drop(gate);
    let report = pending.await.unwrap();
    assert!(report.errors.is_empty());
    assert_eq!(report.resolved[0].exact, 2);
}
