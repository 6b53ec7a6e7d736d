use serde::Deserialize;

/// Flag-check queue configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Whether answers are checked through the queue. When disabled, answers are
    /// checked inline by the request that submitted them. Default: true.
    #[serde(default = "default_mq_enabled")]
    pub enabled: bool,
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Queue carrying flag-check jobs. Default: "flag_checks".
    #[serde(default = "default_mq_queue_name")]
    pub queue_name: String,
    /// Number of jobs checked concurrently. Default: 4.
    #[serde(default = "default_mq_concurrency")]
    pub concurrency: usize,
}

fn default_mq_enabled() -> bool {
    true
}
fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_mq_queue_name() -> String {
    "flag_checks".into()
}
fn default_mq_concurrency() -> usize {
    4
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            enabled: default_mq_enabled(),
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            queue_name: default_mq_queue_name(),
            concurrency: default_mq_concurrency(),
        }
    }
}
