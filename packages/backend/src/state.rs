use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::services::study::StudyService;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    study: Arc<StudyService>,
}

impl AppState {
    pub fn new(study: StudyService) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            study: Arc::new(study),
        }
    }

    pub fn study(&self) -> &StudyService {
        &self.study
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
