//! Configuracion del cliente.
//!
//! Un `ClientConfig` con un `Default` que encarna los valores por
//! omision, y un `merge` que aplica overrides parciales sobre esos
//! valores, igual que `config_parser` arma el `Config` del nodo
//! superponiendo lo leido del archivo `.conf` sobre valores por omision.

use std::time::Duration;

/// Un rango de slots `[start, end]` (ambos inclusive) asignado a un
/// endpoint, tal como los devuelve `CLUSTER SLOTS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
    pub endpoint: String,
}

/// Configuracion del modo cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub enabled: bool,
    pub clusters: Vec<SlotRange>,
    pub init_on_start: bool,
    pub init_on_error: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            enabled: false,
            clusters: Vec::new(),
            init_on_start: false,
            init_on_error: false,
        }
    }
}

/// Configuracion completa de un `RedisClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server: String,
    pub timeout: Duration,
    pub database: u32,
    pub password: Option<String>,
    pub cluster: ClusterConfig,
    pub version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server: "127.0.0.1:6379".to_string(),
            timeout: Duration::from_secs(1),
            database: 0,
            password: None,
            cluster: ClusterConfig::default(),
            version: "3.2".to_string(),
        }
    }
}

/// Override parcial: solo los campos presentes reemplazan al default
/// correspondiente. Pensado para que el llamador solo tenga que nombrar
/// lo que le importa, como hace `config_parser` con el mapa clave/valor
/// del archivo de configuracion del nodo.
#[derive(Debug, Clone, Default)]
pub struct PartialClientConfig {
    pub server: Option<String>,
    pub timeout: Option<Duration>,
    pub database: Option<u32>,
    pub password: Option<String>,
    pub cluster_enabled: Option<bool>,
    pub cluster_clusters: Option<Vec<SlotRange>>,
    pub cluster_init_on_start: Option<bool>,
    pub cluster_init_on_error: Option<bool>,
    pub version: Option<String>,
}

impl ClientConfig {
    /// Aplica un override parcial sobre esta configuracion, devolviendo
    /// la combinacion. Campos ausentes en el override se conservan.
    pub fn merge(mut self, over: PartialClientConfig) -> ClientConfig {
        if let Some(server) = over.server {
            self.server = server;
        }
        if let Some(timeout) = over.timeout {
            self.timeout = timeout;
        }
        if let Some(database) = over.database {
            self.database = database;
        }
        if over.password.is_some() {
            self.password = over.password;
        }
        if let Some(enabled) = over.cluster_enabled {
            self.cluster.enabled = enabled;
        }
        if let Some(clusters) = over.cluster_clusters {
            self.cluster.clusters = clusters;
        }
        if let Some(init_on_start) = over.cluster_init_on_start {
            self.cluster.init_on_start = init_on_start;
        }
        if let Some(init_on_error) = over.cluster_init_on_error {
            self.cluster.init_on_error = init_on_error;
        }
        if let Some(version) = over.version {
            self.version = version;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.server, "127.0.0.1:6379");
        assert_eq!(cfg.timeout, Duration::from_secs(1));
        assert_eq!(cfg.database, 0);
        assert_eq!(cfg.password, None);
        assert!(!cfg.cluster.enabled);
    }

    #[test]
    fn merge_only_overrides_set_fields() {
        let cfg = ClientConfig::default().merge(PartialClientConfig {
            database: Some(3),
            password: Some("secret".to_string()),
            ..Default::default()
        });
        assert_eq!(cfg.database, 3);
        assert_eq!(cfg.password.as_deref(), Some("secret"));
        assert_eq!(cfg.server, "127.0.0.1:6379");
    }
}
