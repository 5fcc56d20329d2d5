use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use savant_algo::{
    CyclePolicy, ACTIVITY_MAX_ENTRIES, ACTIVITY_RETENTION_DAYS, DEFAULT_QUEUE_LIMIT, DEFAULT_WEAK_NODE_LIMIT,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://savant.db?mode=rwc";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    /// `None` keeps everything in memory
    pub database_url: Option<String>,
    pub review_queue_limit: usize,
    pub weak_node_limit: usize,
    pub activity_retention_days: i64,
    pub activity_max_entries: usize,
    pub cycle_policy: CyclePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            review_queue_limit: DEFAULT_QUEUE_LIMIT,
            weak_node_limit: DEFAULT_WEAK_NODE_LIMIT,
            activity_retention_days: ACTIVITY_RETENTION_DAYS,
            activity_max_entries: ACTIVITY_MAX_ENTRIES,
            cycle_policy: CyclePolicy::Break,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);
        let host = env_parse("HOST").unwrap_or(defaults.host);
        let log_level = std::env::var("RUST_LOG").unwrap_or(defaults.log_level);

        let database_url = match std::env::var("DATABASE_URL") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(value),
            Err(_) => Some(DEFAULT_DATABASE_URL.to_string()),
        };

        let cycle_policy = std::env::var("CYCLE_POLICY")
            .ok()
            .and_then(|value| CyclePolicy::parse(&value))
            .unwrap_or(defaults.cycle_policy);

        Self {
            host,
            port,
            log_level,
            database_url,
            review_queue_limit: env_parse("REVIEW_QUEUE_LIMIT").unwrap_or(defaults.review_queue_limit),
            weak_node_limit: env_parse("WEAK_NODE_LIMIT").unwrap_or(defaults.weak_node_limit),
            activity_retention_days: env_parse::<i64>("ACTIVITY_RETENTION_DAYS")
                .filter(|days| *days > 0)
                .unwrap_or(defaults.activity_retention_days),
            activity_max_entries: env_parse::<usize>("ACTIVITY_MAX_ENTRIES")
                .filter(|max| *max > 0)
                .unwrap_or(defaults.activity_max_entries),
            cycle_policy,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse::<T>().ok())
}
