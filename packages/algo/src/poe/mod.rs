//! Pedagogical Orchestration Engine
//!
//! Maps (graph, mastery, context, time budget) to a session directive. The
//! decision table is evaluated in strict priority order and the function is
//! pure: identical inputs always produce identical directives.

use std::collections::HashMap;

use crate::types::{
    KnowledgeGraph, Level, MasteryState, PedagogicalDirective, SessionMode, SessionType,
    UserContext,
};

const CRITICAL_STABILITY: f64 = 40.0;
const REMEDIATION_CONFIDENCE: f64 = 40.0;
const HIGH_MASTERY_CONFIDENCE: f64 = 90.0;
const PREREQUISITE_CONFIDENCE: f64 = 70.0;
const DEEP_WORK_FOCUS: u8 = 80;
const SOCRATIC_MIN_PILLARS: usize = 3;
const FLASH_SESSION_MINUTES: f64 = 10.0;

const REVIEW_TARGETS: usize = 3;
const REMEDIATION_TARGETS: usize = 2;
const EXPANSION_TARGETS: usize = 2;
const SOCRATIC_TARGETS: usize = 1;

pub const RATIONALE_LOW_ENERGY: &str = "low energy: passive recall only.";
pub const RATIONALE_FLASH: &str = "flash session: fast memory anchors.";
pub const RATIONALE_REMEDIATION: &str = "critical gaps detected.";
pub const RATIONALE_SOCRATIC: &str = "optimal focus + solid base: deep synthesis.";
pub const RATIONALE_DEEP_EXPANSION: &str = "high cognitive availability: acquire adjacent nodes.";
pub const RATIONALE_STABILIZE: &str = "retention-erosion risk: stabilize via SRS.";
pub const RATIONALE_LINEAR: &str = "standard linear progression.";
pub const RATIONALE_EXPANSION_BLOCKED: &str =
    "expansion blocked by unmet prerequisites: falling back to review.";

/// Item volume for the available time.
pub fn max_items_for(time_available_minutes: f64) -> usize {
    let minutes = sanitize_minutes(time_available_minutes);
    if minutes >= 45.0 {
        20
    } else if minutes >= 20.0 {
        10
    } else if minutes >= 10.0 {
        5
    } else {
        3
    }
}

fn sanitize_minutes(minutes: f64) -> f64 {
    if minutes.is_finite() {
        minutes.max(0.0)
    } else {
        0.0
    }
}

/// Mastery entries split by the thresholds the decision table reads.
struct MasterySegments<'a> {
    critical_stability: Vec<&'a MasteryState>,
    remediation: Vec<&'a MasteryState>,
    high_mastery: Vec<&'a MasteryState>,
}

impl<'a> MasterySegments<'a> {
    fn classify(mastery: &'a [MasteryState]) -> Self {
        let mut critical_stability: Vec<&MasteryState> = mastery
            .iter()
            .filter(|m| m.stability_index < CRITICAL_STABILITY)
            .collect();
        critical_stability.sort_by(|a, b| a.stability_index.total_cmp(&b.stability_index));

        let mut remediation: Vec<&MasteryState> = mastery
            .iter()
            .filter(|m| m.confidence_score < REMEDIATION_CONFIDENCE)
            .collect();
        remediation.sort_by(|a, b| a.confidence_score.total_cmp(&b.confidence_score));

        let high_mastery = mastery
            .iter()
            .filter(|m| m.confidence_score >= HIGH_MASTERY_CONFIDENCE)
            .collect();

        Self {
            critical_stability,
            remediation,
            high_mastery,
        }
    }
}

fn decide_mode(
    segments: &MasterySegments<'_>,
    context: &UserContext,
    minutes: f64,
) -> (SessionMode, u8, &'static str) {
    if context.energy_level() == Some(Level::Low) || context.session_type == SessionType::Recovery {
        (SessionMode::Review, 1, RATIONALE_LOW_ENERGY)
    } else if minutes <= FLASH_SESSION_MINUTES {
        (SessionMode::Review, 2, RATIONALE_FLASH)
    } else if !segments.remediation.is_empty() {
        (SessionMode::Remediation, 3, RATIONALE_REMEDIATION)
    } else if context.session_type == SessionType::DeepWork && context.focus_score >= DEEP_WORK_FOCUS {
        if segments.high_mastery.len() >= SOCRATIC_MIN_PILLARS {
            (SessionMode::Socratic, 5, RATIONALE_SOCRATIC)
        } else {
            (SessionMode::Expansion, 4, RATIONALE_DEEP_EXPANSION)
        }
    } else if !segments.critical_stability.is_empty() {
        (SessionMode::Review, 3, RATIONALE_STABILIZE)
    } else {
        (SessionMode::Expansion, 3, RATIONALE_LINEAR)
    }
}

fn node_ids(states: &[&MasteryState], take: usize) -> Vec<String> {
    states.iter().take(take).map(|m| m.node_id.clone()).collect()
}

fn leading_mastery_ids(mastery: &[MasteryState]) -> Vec<String> {
    mastery
        .iter()
        .take(REVIEW_TARGETS)
        .map(|m| m.node_id.clone())
        .collect()
}

/// Graph nodes not yet mastered whose prerequisites all are, in graph order.
pub fn expansion_candidates<'g>(
    graph: &'g KnowledgeGraph,
    mastery: &[MasteryState],
) -> Vec<&'g str> {
    let by_node: HashMap<&str, &MasteryState> =
        mastery.iter().map(|m| (m.node_id.as_str(), m)).collect();

    graph
        .nodes
        .iter()
        .filter(|node| {
            let not_mastered = by_node
                .get(node.id.as_str())
                .map_or(true, |m| m.confidence_score < PREREQUISITE_CONFIDENCE);
            let prerequisites_met = node.prerequisites.iter().all(|p| {
                by_node
                    .get(p.as_str())
                    .is_some_and(|m| m.confidence_score >= PREREQUISITE_CONFIDENCE)
            });
            not_mastered && prerequisites_met
        })
        .map(|node| node.id.as_str())
        .collect()
}

pub fn compute_directive(
    graph: &KnowledgeGraph,
    mastery: &[MasteryState],
    context: &UserContext,
    time_available_minutes: f64,
) -> PedagogicalDirective {
    let minutes = sanitize_minutes(time_available_minutes);
    let max_items = max_items_for(minutes);
    let segments = MasterySegments::classify(mastery);

    let (mut mode, intensity, mut rationale) = decide_mode(&segments, context, minutes);

    let mut target_node_ids = match mode {
        SessionMode::Review => {
            if segments.critical_stability.is_empty() {
                leading_mastery_ids(mastery)
            } else {
                node_ids(&segments.critical_stability, REVIEW_TARGETS)
            }
        }
        SessionMode::Remediation => node_ids(&segments.remediation, REMEDIATION_TARGETS),
        SessionMode::Expansion => {
            let candidates: Vec<String> = expansion_candidates(graph, mastery)
                .into_iter()
                .take(EXPANSION_TARGETS)
                .map(str::to_string)
                .collect();
            if candidates.is_empty() {
                mode = SessionMode::Review;
                rationale = RATIONALE_EXPANSION_BLOCKED;
                leading_mastery_ids(mastery)
            } else {
                candidates
            }
        }
        SessionMode::Socratic => node_ids(&segments.high_mastery, SOCRATIC_TARGETS),
    };

    if target_node_ids.is_empty() {
        if let Some(first) = graph.nodes.first() {
            target_node_ids.push(first.id.clone());
        }
    }

    PedagogicalDirective {
        mode,
        target_node_ids,
        intensity,
        max_items,
        rationale: rationale.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KnowledgeNode, UserSignals};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn node(id: &str, prerequisites: &[&str]) -> KnowledgeNode {
        KnowledgeNode {
            id: id.to_string(),
            label: id.to_uppercase(),
            description: String::new(),
            content_atoms: vec![format!("{id} fact")],
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            difficulty_weight: 2,
        }
    }

    fn graph(nodes: Vec<KnowledgeNode>) -> KnowledgeGraph {
        KnowledgeGraph {
            id: "g1".into(),
            title: "Graph".into(),
            nodes,
            source_text: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn chain_graph() -> KnowledgeGraph {
        graph(vec![node("a", &[]), node("b", &["a"]), node("c", &["b"]), node("d", &[])])
    }

    fn m(id: &str, confidence: f64, stability: f64) -> MasteryState {
        MasteryState {
            node_id: id.to_string(),
            confidence_score: confidence,
            stability_index: stability,
            last_interaction_at: None,
        }
    }

    fn context(session_type: SessionType, focus: u8, energy: Level) -> UserContext {
        UserContext {
            focus_score: focus,
            session_type,
            state_description: String::new(),
            signals: Some(UserSignals {
                time_available: 30.0,
                energy_level: energy,
                stress_level: Level::Medium,
            }),
        }
    }

    #[test]
    fn test_max_items_buckets() {
        assert_eq!(max_items_for(5.0), 3);
        assert_eq!(max_items_for(10.0), 5);
        assert_eq!(max_items_for(19.9), 5);
        assert_eq!(max_items_for(20.0), 10);
        assert_eq!(max_items_for(44.0), 10);
        assert_eq!(max_items_for(45.0), 20);
        assert_eq!(max_items_for(f64::NAN), 3);
    }

    #[test]
    fn test_low_energy_always_passive_review() {
        let mastery = vec![m("a", 10.0, 5.0), m("b", 95.0, 90.0)];
        for session in [SessionType::DeepWork, SessionType::Sprint, SessionType::Maintenance] {
            let directive = compute_directive(
                &chain_graph(),
                &mastery,
                &context(session, 100, Level::Low),
                90.0,
            );
            assert_eq!(directive.mode, SessionMode::Review);
            assert_eq!(directive.intensity, 1);
            assert_eq!(directive.rationale, RATIONALE_LOW_ENERGY);
        }
    }

    #[test]
    fn test_recovery_session_is_passive_review() {
        let directive = compute_directive(
            &chain_graph(),
            &[],
            &context(SessionType::Recovery, 90, Level::High),
            60.0,
        );
        assert_eq!(directive.mode, SessionMode::Review);
        assert_eq!(directive.intensity, 1);
        assert_eq!(directive.target_node_ids, vec!["a"]);
    }

    #[test]
    fn test_flash_session() {
        let mastery = vec![m("a", 80.0, 10.0), m("b", 80.0, 30.0), m("c", 80.0, 20.0), m("d", 80.0, 50.0)];
        let directive = compute_directive(
            &chain_graph(),
            &mastery,
            &context(SessionType::Sprint, 50, Level::Medium),
            10.0,
        );
        assert_eq!(directive.mode, SessionMode::Review);
        assert_eq!(directive.intensity, 2);
        assert_eq!(directive.max_items, 5);
        assert_eq!(directive.target_node_ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_remediation_targets_weakest_two() {
        let mastery = vec![m("a", 30.0, 60.0), m("b", 10.0, 60.0), m("c", 20.0, 60.0)];
        let directive = compute_directive(
            &chain_graph(),
            &mastery,
            &context(SessionType::DeepWork, 95, Level::High),
            30.0,
        );
        assert_eq!(directive.mode, SessionMode::Remediation);
        assert_eq!(directive.intensity, 3);
        assert_eq!(directive.target_node_ids, vec!["b", "c"]);
    }

    #[test]
    fn test_socratic_needs_three_pillars() {
        let mastery = vec![m("a", 95.0, 80.0), m("b", 92.0, 80.0), m("c", 90.0, 80.0), m("d", 60.0, 80.0)];
        let directive = compute_directive(
            &chain_graph(),
            &mastery,
            &context(SessionType::DeepWork, 85, Level::High),
            60.0,
        );
        assert_eq!(directive.mode, SessionMode::Socratic);
        assert_eq!(directive.intensity, 5);
        assert_eq!(directive.target_node_ids, vec!["a"]);
        assert_eq!(directive.max_items, 20);
    }

    #[test]
    fn test_deep_work_expansion_respects_prerequisites() {
        let mastery = vec![m("a", 75.0, 80.0), m("b", 50.0, 80.0), m("c", 45.0, 80.0), m("d", 95.0, 80.0)];
        let directive = compute_directive(
            &chain_graph(),
            &mastery,
            &context(SessionType::DeepWork, 85, Level::High),
            30.0,
        );
        assert_eq!(directive.mode, SessionMode::Expansion);
        assert_eq!(directive.intensity, 4);
        // a and d are mastered; c waits on b
        assert_eq!(directive.target_node_ids, vec!["b"]);
    }

    #[test]
    fn test_stabilization_review() {
        let mastery = vec![m("a", 70.0, 50.0), m("b", 70.0, 20.0), m("c", 70.0, 35.0), m("d", 70.0, 60.0)];
        let directive = compute_directive(
            &chain_graph(),
            &mastery,
            &context(SessionType::Maintenance, 50, Level::Medium),
            25.0,
        );
        assert_eq!(directive.mode, SessionMode::Review);
        assert_eq!(directive.intensity, 3);
        assert_eq!(directive.rationale, RATIONALE_STABILIZE);
        assert_eq!(directive.target_node_ids, vec!["b", "c"]);
    }

    #[test]
    fn test_linear_expansion_fallback() {
        let mastery = vec![m("a", 72.0, 50.0), m("b", 60.0, 50.0), m("c", 40.0, 50.0), m("d", 80.0, 50.0)];
        let directive = compute_directive(
            &chain_graph(),
            &mastery,
            &context(SessionType::Sprint, 50, Level::Medium),
            30.0,
        );
        assert_eq!(directive.mode, SessionMode::Expansion);
        assert_eq!(directive.intensity, 3);
        assert_eq!(directive.rationale, RATIONALE_LINEAR);
        assert_eq!(directive.target_node_ids, vec!["b"]);
    }

    #[test]
    fn test_blocked_expansion_demotes_to_review() {
        let cyclic = graph(vec![node("x", &["y"]), node("y", &["x"])]);
        let mastery = vec![m("x", 50.0, 60.0), m("y", 50.0, 60.0)];
        let directive = compute_directive(
            &cyclic,
            &mastery,
            &context(SessionType::Sprint, 50, Level::Medium),
            30.0,
        );
        assert_eq!(directive.mode, SessionMode::Review);
        assert_eq!(directive.intensity, 3);
        assert_eq!(directive.rationale, RATIONALE_EXPANSION_BLOCKED);
        assert_eq!(directive.target_node_ids, vec!["x", "y"]);
    }

    #[test]
    fn test_safety_net_uses_first_node() {
        let directive = compute_directive(
            &chain_graph(),
            &[],
            &context(SessionType::Sprint, 50, Level::Medium),
            5.0,
        );
        assert_eq!(directive.target_node_ids, vec!["a"]);
    }

    #[test]
    fn test_empty_graph_yields_empty_targets() {
        let directive = compute_directive(
            &graph(vec![]),
            &[],
            &context(SessionType::Sprint, 50, Level::Medium),
            30.0,
        );
        assert_eq!(directive.mode, SessionMode::Review);
        assert!(directive.target_node_ids.is_empty());
    }

    fn arb_mastery() -> impl Strategy<Value = Vec<MasteryState>> {
        prop::collection::vec((0.0f64..=100.0, 0.0f64..=100.0), 4).prop_map(|scores| {
            ["a", "b", "c", "d"]
                .iter()
                .zip(scores)
                .map(|(id, (c, s))| m(id, c, s))
                .collect()
        })
    }

    fn arb_context() -> impl Strategy<Value = UserContext> {
        (
            prop_oneof![
                Just(SessionType::Sprint),
                Just(SessionType::DeepWork),
                Just(SessionType::Maintenance),
                Just(SessionType::Recovery),
            ],
            1u8..=100,
            prop_oneof![Just(Level::Low), Just(Level::Medium), Just(Level::High)],
        )
            .prop_map(|(session, focus, energy)| context(session, focus, energy))
    }

    proptest! {
        #[test]
        fn prop_directive_is_deterministic(
            mastery in arb_mastery(),
            ctx in arb_context(),
            minutes in 0.0f64..120.0,
        ) {
            let g = chain_graph();
            let first = compute_directive(&g, &mastery, &ctx, minutes);
            let second = compute_directive(&g, &mastery, &ctx, minutes);
            prop_assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );
            prop_assert!(!first.target_node_ids.is_empty());
            prop_assert!(first.target_node_ids.len() <= 3);
            prop_assert!((1..=5).contains(&first.intensity));
        }

        #[test]
        fn prop_low_energy_is_review(mastery in arb_mastery(), minutes in 0.0f64..120.0) {
            let ctx = context(SessionType::DeepWork, 100, Level::Low);
            let directive = compute_directive(&chain_graph(), &mastery, &ctx, minutes);
            prop_assert_eq!(directive.mode, SessionMode::Review);
            prop_assert_eq!(directive.intensity, 1);
        }
    }
}
