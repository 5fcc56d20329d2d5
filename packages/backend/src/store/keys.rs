//! Storage key layout, scoped per knowledge graph.

pub fn graph(graph_id: &str) -> String {
    format!("graph:{graph_id}")
}

pub fn mastery(graph_id: &str) -> String {
    format!("graph:{graph_id}:mastery")
}

pub fn items(graph_id: &str) -> String {
    format!("graph:{graph_id}:items")
}

pub fn progress(graph_id: &str) -> String {
    format!("graph:{graph_id}:progress")
}

pub fn activity(graph_id: &str) -> String {
    format!("graph:{graph_id}:activity")
}
