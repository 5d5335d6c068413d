// ABOUTME: Persistent service coordinates for the rollback path.
// ABOUTME: Cluster and service names are templates expanded per environment.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RollbackConfig {
    #[serde(default = "default_cluster")]
    pub cluster: String,

    #[serde(default = "default_service")]
    pub service: String,
}

fn default_cluster() -> String {
    "{project}-cluster-{env}".to_string()
}

fn default_service() -> String {
    "{project}-service-{env}".to_string()
}

impl Default for RollbackConfig {
    fn default() -> Self {
        RollbackConfig {
            cluster: default_cluster(),
            service: default_service(),
        }
    }
}
