//! Study orchestration
//!
//! Glues the decision core to persistence. Every read-modify-write for a
//! graph runs under that graph's lock, so two reviews of the same graph never
//! interleave their item, mastery, progress or activity updates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use savant_algo::sanitize::{sanitize_activity, sanitize_items, sanitize_mastery_layer, sanitize_progress};
use savant_algo::{
    apply_review, apply_xp, award_xp, build_daily_review_queue, clamp_quality, compute_directive,
    compute_weak_nodes, fallback_for_directive, format_anki_txt, format_json, get_due_study_items,
    is_valid_graph_id, mastery_summary, node_labels, normalize_mastery_layer, parse_json, prune_activity,
    resolve_source_node, review_item, validate_graph, ActivityEvent, GraphError, KnowledgeGraph,
    MasteryLayer, MasteryState, MasterySummary, PedagogicalDirective, Progress, ReviewMode, StudyItem,
    StudySet, UserContext, ValidatedGraph, WeakNodeInsight,
};

use crate::config::Config;
use crate::store::{keys, Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid knowledge graph: {0}")]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub item: StudyItem,
    /// `None` when the item could not be attributed to a graph node
    pub mastery: Option<MasteryState>,
    pub gained_xp: u32,
    pub progress: Progress,
    pub leveled_up: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub progress: Progress,
    pub mastery: MasterySummary,
    pub weak_nodes: Vec<WeakNodeInsight>,
    pub due_count: usize,
    pub item_count: usize,
}

pub struct StudyService {
    store: Store,
    config: Config,
    locks: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StudyService {
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store,
            config,
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Callers confirm the graph exists first, so the map stays bounded by
    /// the number of stored graphs.
    fn graph_lock(&self, graph_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(graph_id.to_string()).or_default())
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.lock().len()
    }

    // ==================== Snapshots ====================

    pub async fn graph(&self, graph_id: &str) -> Result<KnowledgeGraph, StudyError> {
        let not_found = || StudyError::NotFound(format!("graph {graph_id}"));
        if !is_valid_graph_id(graph_id) {
            return Err(not_found());
        }
        let value = self.store.load(&keys::graph(graph_id)).await?.ok_or_else(not_found)?;
        serde_json::from_value(value).map_err(|err| {
            tracing::warn!(graph_id, error = %err, "stored graph is unreadable");
            not_found()
        })
    }

    async fn load_mastery(&self, graph: &KnowledgeGraph) -> Result<MasteryLayer, StudyError> {
        let stored = self
            .store
            .load(&keys::mastery(&graph.id))
            .await?
            .map(|value| sanitize_mastery_layer(&value));
        Ok(normalize_mastery_layer(graph.node_ids(), stored.as_deref()))
    }

    async fn load_items(&self, graph_id: &str) -> Result<Vec<StudyItem>, StudyError> {
        let value = self.store.load(&keys::items(graph_id)).await?;
        Ok(value.map(|value| sanitize_items(&value)).unwrap_or_default())
    }

    async fn load_progress(&self, graph_id: &str) -> Result<Progress, StudyError> {
        let value = self.store.load(&keys::progress(graph_id)).await?;
        Ok(value.map(|value| sanitize_progress(&value)).unwrap_or_default())
    }

    async fn load_activity(&self, graph_id: &str) -> Result<Vec<ActivityEvent>, StudyError> {
        let value = self.store.load(&keys::activity(graph_id)).await?;
        Ok(value.map(|value| sanitize_activity(&value)).unwrap_or_default())
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StudyError> {
        let value: Value = serde_json::to_value(value).map_err(StoreError::from)?;
        self.store.save(key, &value).await?;
        Ok(())
    }

    async fn merge_and_save(&self, graph_id: &str, incoming: Vec<StudyItem>) -> Result<usize, StudyError> {
        let mut items = self.load_items(graph_id).await?;
        merge_items(&mut items, incoming);
        self.save(&keys::items(graph_id), &items).await?;
        Ok(items.len())
    }

    // ==================== Mutations ====================

    pub async fn import_graph(&self, graph: KnowledgeGraph) -> Result<ValidatedGraph, StudyError> {
        let validated = validate_graph(&graph, self.config.cycle_policy)?;
        let graph_id = validated.graph.id.clone();

        let lock = self.graph_lock(&graph_id);
        let _guard = lock.lock().await;

        let mastery = self.load_mastery(&validated.graph).await?;
        self.store
            .save_batch(&[
                snapshot(keys::graph(&graph_id), &validated.graph)?,
                snapshot(keys::mastery(&graph_id), &mastery)?,
            ])
            .await?;

        tracing::info!(
            graph_id = %graph_id,
            nodes = validated.graph.nodes.len(),
            repairs = validated.repairs.len(),
            "knowledge graph imported"
        );
        Ok(validated)
    }

    /// Adds fresh items, replacing any stored item with the same id. Returns
    /// the number of items stored for the graph.
    pub async fn add_items(&self, graph_id: &str, new_items: Vec<StudyItem>) -> Result<usize, StudyError> {
        if let Some(item) = new_items.iter().find(|item| item.id.trim().is_empty()) {
            return Err(StudyError::Validation(format!(
                "item with question {:?} has an empty id",
                item.question
            )));
        }

        self.graph(graph_id).await?;
        let lock = self.graph_lock(graph_id);
        let _guard = lock.lock().await;

        let added = new_items.len();
        let total = self.merge_and_save(graph_id, new_items).await?;

        tracing::info!(graph_id, added, total, "study items stored");
        Ok(total)
    }

    pub async fn generate_fallback_items(
        &self,
        graph_id: &str,
        directive: &PedagogicalDirective,
        now: DateTime<Utc>,
    ) -> Result<Vec<StudyItem>, StudyError> {
        self.graph(graph_id).await?;
        let lock = self.graph_lock(graph_id);
        let _guard = lock.lock().await;

        let graph = self.graph(graph_id).await?;
        let generated = fallback_for_directive(&graph, directive, now);
        self.merge_and_save(graph_id, generated.clone()).await?;

        tracing::info!(graph_id, generated = generated.len(), "fallback items synthesized");
        Ok(generated)
    }

    pub async fn record_review(
        &self,
        graph_id: &str,
        item_id: &str,
        quality: f64,
        mode: Option<ReviewMode>,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, StudyError> {
        self.graph(graph_id).await?;
        let lock = self.graph_lock(graph_id);
        let _guard = lock.lock().await;

        let graph = self.graph(graph_id).await?;
        let mut items = self.load_items(graph_id).await?;
        let index = items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| StudyError::NotFound(format!("item {item_id}")))?;

        let quality = clamp_quality(quality);
        let reviewed = review_item(&items[index], f64::from(quality), now);
        items[index] = reviewed.clone();
        let mut snapshots = vec![snapshot(keys::items(graph_id), &items)?];

        let node_ids: HashSet<&str> = graph.node_ids().collect();
        let node_id = resolve_source_node(&reviewed, &node_ids);
        let mastery = match node_id.as_deref() {
            Some(node_id) => {
                let layer = self.load_mastery(&graph).await?;
                match apply_review(&layer, node_id, quality, reviewed.sm2.interval, now) {
                    Some(updated) => {
                        snapshots.push(snapshot(keys::mastery(graph_id), &updated)?);
                        updated.into_iter().find(|state| state.node_id == node_id)
                    }
                    None => None,
                }
            }
            None => {
                tracing::warn!(graph_id, item_id, "review not attributable to a node, mastery unchanged");
                None
            }
        };

        let gained_xp = award_xp(quality);
        let previous = self.load_progress(graph_id).await?;
        let progress = apply_xp(previous.level, previous.current_xp, gained_xp);
        snapshots.push(snapshot(keys::progress(graph_id), &progress)?);

        let mut activity = self.load_activity(graph_id).await?;
        activity.push(ActivityEvent::review(now, item_id, node_id, quality, mode, gained_xp));
        let activity = prune_activity(
            &activity,
            now,
            self.config.activity_retention_days,
            self.config.activity_max_entries,
        );
        snapshots.push(snapshot(keys::activity(graph_id), &activity)?);

        self.store.save_batch(&snapshots).await?;

        tracing::debug!(
            graph_id,
            item_id,
            quality,
            interval = reviewed.sm2.interval,
            gained_xp,
            level = progress.level,
            "review recorded"
        );

        Ok(ReviewOutcome {
            item: reviewed,
            mastery,
            gained_xp,
            leveled_up: progress.level > previous.level,
            progress,
        })
    }

    // ==================== Queries ====================

    pub async fn plan_session(
        &self,
        graph_id: &str,
        context: &UserContext,
        time_available_minutes: f64,
    ) -> Result<PedagogicalDirective, StudyError> {
        let graph = self.graph(graph_id).await?;
        let mastery = self.load_mastery(&graph).await?;
        let directive = compute_directive(&graph, &mastery, context, time_available_minutes);

        tracing::info!(
            graph_id,
            mode = directive.mode.as_str(),
            targets = directive.target_node_ids.len(),
            max_items = directive.max_items,
            "session planned"
        );
        Ok(directive)
    }

    pub async fn items(&self, graph_id: &str) -> Result<Vec<StudyItem>, StudyError> {
        self.graph(graph_id).await?;
        self.load_items(graph_id).await
    }

    pub async fn daily_queue(
        &self,
        graph_id: &str,
        now: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<StudyItem>, StudyError> {
        let items = self.items(graph_id).await?;
        let limit = limit.unwrap_or(self.config.review_queue_limit);
        Ok(build_daily_review_queue(&items, now, limit))
    }

    pub async fn due_items(&self, graph_id: &str, now: DateTime<Utc>) -> Result<Vec<StudyItem>, StudyError> {
        let items = self.items(graph_id).await?;
        Ok(get_due_study_items(&items, now))
    }

    pub async fn weak_nodes(
        &self,
        graph_id: &str,
        now: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<WeakNodeInsight>, StudyError> {
        let graph = self.graph(graph_id).await?;
        let limit = limit.unwrap_or(self.config.weak_node_limit);
        self.weak_nodes_for(&graph, now, limit).await
    }

    async fn weak_nodes_for(
        &self,
        graph: &KnowledgeGraph,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WeakNodeInsight>, StudyError> {
        let mastery = self.load_mastery(graph).await?;
        let activity = self.load_activity(&graph.id).await?;
        Ok(compute_weak_nodes(&mastery, &activity, &node_labels(graph), now, limit))
    }

    pub async fn progress(&self, graph_id: &str) -> Result<Progress, StudyError> {
        self.graph(graph_id).await?;
        self.load_progress(graph_id).await
    }

    pub async fn dashboard(&self, graph_id: &str, now: DateTime<Utc>) -> Result<Dashboard, StudyError> {
        let graph = self.graph(graph_id).await?;
        let mastery = self.load_mastery(&graph).await?;
        let items = self.load_items(graph_id).await?;

        Ok(Dashboard {
            progress: self.load_progress(graph_id).await?,
            mastery: mastery_summary(&mastery),
            weak_nodes: self.weak_nodes_for(&graph, now, self.config.weak_node_limit).await?,
            due_count: get_due_study_items(&items, now).len(),
            item_count: items.len(),
        })
    }

    pub async fn export_anki(&self, graph_id: &str) -> Result<String, StudyError> {
        let items = self.items(graph_id).await?;
        Ok(format_anki_txt(&items))
    }

    /// The graph's items as a study set document.
    pub async fn export_json(&self, graph_id: &str) -> Result<String, StudyError> {
        let graph = self.graph(graph_id).await?;
        let set = StudySet {
            id: graph.id.clone(),
            title: graph.title.clone(),
            items: self.load_items(graph_id).await?,
            created_at: graph.created_at,
            source_text: Some(graph.source_text).filter(|text| !text.is_empty()),
        };
        format_json(&set).map_err(|err| StudyError::Store(err.into()))
    }

    /// Reads an exported study set and adds its items, under fresh ids, to the graph.
    pub async fn import_json(&self, graph_id: &str, raw: &str, now: DateTime<Utc>) -> Result<StudySet, StudyError> {
        let set = parse_json(raw, now).map_err(|err| StudyError::Validation(err.to_string()))?;

        self.graph(graph_id).await?;
        let lock = self.graph_lock(graph_id);
        let _guard = lock.lock().await;

        let total = self.merge_and_save(graph_id, set.items.clone()).await?;
        tracing::info!(graph_id, imported = set.items.len(), total, "study set imported");
        Ok(set)
    }
}

fn snapshot<T: Serialize>(key: String, value: &T) -> Result<(String, Value), StudyError> {
    let value = serde_json::to_value(value).map_err(StoreError::from)?;
    Ok((key, value))
}

/// New items start unscheduled; an incoming id replaces the stored item in place.
fn merge_items(items: &mut Vec<StudyItem>, incoming: Vec<StudyItem>) {
    for mut item in incoming {
        item.reset_schedule();
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
    }
}
