//! Local item synthesis
//!
//! Used when the external generator is unavailable: every target node yields
//! plain recall flashcards built only from its own content atoms.

use chrono::{DateTime, Utc};

use crate::mastery::FALLBACK_ITEM_PREFIX;
use crate::types::{ItemKind, KnowledgeGraph, KnowledgeNode, PedagogicalDirective, StudyItem};

const ATOMS_PER_NODE: usize = 2;
const FALLBACK_ANSWER: &str = "Information extraite du document source.";

/// Recall flashcards for the first atoms of each node.
pub fn fallback_items(nodes: &[&KnowledgeNode], now: DateTime<Utc>) -> Vec<StudyItem> {
    let millis = now.timestamp_millis();
    let mut items = Vec::new();

    for node in nodes {
        let coverage = 1.0 / node.content_atoms.len().max(1) as f64;
        for (i, atom) in node.content_atoms.iter().take(ATOMS_PER_NODE).enumerate() {
            let mut item = StudyItem::new(
                format!("{FALLBACK_ITEM_PREFIX}{}-{i}-{millis}", node.id),
                ItemKind::Flashcard {
                    answer: FALLBACK_ANSWER.to_string(),
                },
                format!("Concept : {}. Rappel de l'atome : {atom}", node.label),
            );
            item.explanation = Some(format!("Source : {}", node.description));
            item.difficulty = node.difficulty_weight;
            item.tags = vec!["Rappel".to_string(), node.label.clone()];
            item.source_node_id = Some(node.id.clone());
            item.source_atoms = vec![atom.clone()];
            item.atom_coverage = Some(coverage);
            items.push(item);
        }
    }

    items
}

/// Nodes named by the directive, in graph order. When none of the ids
/// resolve, the first node of the graph stands in.
pub fn targets_for_directive<'g>(
    graph: &'g KnowledgeGraph,
    directive: &PedagogicalDirective,
) -> Vec<&'g KnowledgeNode> {
    let targets: Vec<&KnowledgeNode> = graph
        .nodes
        .iter()
        .filter(|node| directive.target_node_ids.iter().any(|id| *id == node.id))
        .collect();
    if targets.is_empty() {
        return graph.nodes.iter().take(1).collect();
    }
    targets
}

/// Fallback items for a directive, capped at `max_items`.
pub fn fallback_for_directive(
    graph: &KnowledgeGraph,
    directive: &PedagogicalDirective,
    now: DateTime<Utc>,
) -> Vec<StudyItem> {
    let mut items = fallback_items(&targets_for_directive(graph, directive), now);
    items.truncate(directive.max_items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::resolve_source_node;
    use crate::types::{SessionMode, Sm2State};
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap()
    }

    fn node(id: &str, atoms: &[&str]) -> KnowledgeNode {
        KnowledgeNode {
            id: id.to_string(),
            label: format!("Label {id}"),
            description: format!("about {id}"),
            content_atoms: atoms.iter().map(|a| a.to_string()).collect(),
            prerequisites: Vec::new(),
            difficulty_weight: 4,
        }
    }

    fn graph(nodes: Vec<KnowledgeNode>) -> KnowledgeGraph {
        KnowledgeGraph {
            id: "g".into(),
            title: "t".into(),
            nodes,
            source_text: String::new(),
            created_at: now(),
        }
    }

    #[test]
    fn test_one_card_per_leading_atom() {
        let n = node("cell-wall", &["x1", "x2", "x3", "x4"]);
        let items = fallback_items(&[&n], now());
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.id, format!("ige-fallback-cell-wall-0-{}", now().timestamp_millis()));
        assert_eq!(first.question, "Concept : Label cell-wall. Rappel de l'atome : x1");
        assert_eq!(
            first.kind,
            ItemKind::Flashcard {
                answer: "Information extraite du document source.".into()
            }
        );
        assert_eq!(first.explanation.as_deref(), Some("Source : about cell-wall"));
        assert_eq!(first.difficulty, 4);
        assert_eq!(first.tags, vec!["Rappel", "Label cell-wall"]);
        assert_eq!(first.source_atoms, vec!["x1"]);
        assert_eq!(first.atom_coverage, Some(0.25));
        assert_eq!(first.sm2, Sm2State::default());
        assert!(first.is_new());
    }

    #[test]
    fn test_fallback_ids_resolve_to_their_node() {
        let n = node("cell-wall", &["x1"]);
        let items = fallback_items(&[&n], now());
        let mut item = items[0].clone();
        item.source_node_id = None;
        let ids: HashSet<&str> = ["cell-wall"].into_iter().collect();
        assert_eq!(resolve_source_node(&item, &ids).as_deref(), Some("cell-wall"));
    }

    #[test]
    fn test_node_without_atoms_yields_nothing() {
        let n = node("empty", &[]);
        assert!(fallback_items(&[&n], now()).is_empty());
    }

    #[test]
    fn test_directive_targets_in_graph_order_and_capped() {
        let g = graph(vec![node("a", &["a1", "a2"]), node("b", &["b1"]), node("c", &["c1", "c2"])]);
        let directive = PedagogicalDirective {
            mode: SessionMode::Expansion,
            target_node_ids: vec!["c".into(), "ghost".into(), "a".into()],
            intensity: 4,
            max_items: 3,
            rationale: String::new(),
        };

        let targets: Vec<&str> = targets_for_directive(&g, &directive)
            .into_iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(targets, vec!["a", "c"]);

        let items = fallback_for_directive(&g, &directive, now());
        let sources: Vec<&str> = items.iter().filter_map(|i| i.source_node_id.as_deref()).collect();
        assert_eq!(sources, vec!["a", "a", "c"]);
    }

    #[test]
    fn test_unresolved_targets_fall_back_to_first_node() {
        let g = graph(vec![node("a", &["a1", "a2", "a3"]), node("b", &["b1"])]);
        let directive = PedagogicalDirective {
            mode: SessionMode::Remediation,
            target_node_ids: vec!["ghost".into()],
            intensity: 2,
            max_items: 5,
            rationale: String::new(),
        };

        let targets: Vec<&str> = targets_for_directive(&g, &directive)
            .into_iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(targets, vec!["a"]);
        assert_eq!(fallback_for_directive(&g, &directive, now()).len(), 2);

        assert!(targets_for_directive(&graph(Vec::new()), &directive).is_empty());
    }
}
