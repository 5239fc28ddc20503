//! La fachada publica del crate: configuracion, handshake, y los puntos
//! de entrada que usaria cualquier llamador (`execute_raw`,
//! `execute_raw_string`, `pipeline`).

use logger::logger::Logger;

use crate::command::CommandDescription;
use crate::config::ClientConfig;
use crate::connection::Endpoint;
use crate::dispatcher::Dispatcher;
use crate::error::{RedisCoreError, ServerError};
use crate::parsers::ParsedValue;
use crate::pipeline::{Pipeline, PipelineItemResult};
use crate::protocol::SessionState;
use crate::raw_parser;

const MODULE: &str = "client";

/// Cliente Redis: posee la configuracion y el `Dispatcher` que ruta
/// cada comando. No es `Send`/`Sync` a proposito: el nucleo es
/// single-threaded y bloqueante por instancia; compartir un cliente
/// entre threads requiere exclusion mutua externa, fuera del alcance de
/// este crate.
pub struct RedisClient {
    config: ClientConfig,
    dispatcher: Dispatcher,
    handshake_done: bool,
    logger: Logger,
}

impl RedisClient {
    /// Crea un cliente con logging deshabilitado (`Logger::null()`).
    pub fn new(config: ClientConfig) -> RedisClient {
        RedisClient::with_logger(config, Logger::null())
    }

    /// Crea un cliente con un logger concreto, para observar
    /// connect/reconnect/timeout/redireccion.
    pub fn with_logger(config: ClientConfig, logger: Logger) -> RedisClient {
        let endpoint = Endpoint::new(config.server.clone());
        let dispatcher = Dispatcher::new(endpoint, config.timeout, logger.clone());
        RedisClient {
            config,
            dispatcher,
            handshake_done: false,
            logger,
        }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Corre el handshake si todavia no se hizo en este `Protocol`:
    /// `AUTH` si hay password, `SELECT` si `database > 0`, y si el modo
    /// cluster esta activo, arma el mapa de slots (y lo prima con
    /// `CLUSTER SLOTS` si `init_on_start` esta configurado). Idempotente:
    /// llamadas subsiguientes no repiten nada.
    fn ensure_handshake(&mut self) -> Result<(), RedisCoreError> {
        if self.handshake_done {
            return Ok(());
        }

        if let Some(password) = self.config.password.clone() {
            let reply = self
                .dispatcher
                .default_protocol()
                .send(&[b"AUTH".to_vec(), password.into_bytes()])?;
            if let Some(e) = reply.as_server_error() {
                self.logger.error(&format!("AUTH rejected: {e}"), MODULE);
                return Err(e.into());
            }
            self.dispatcher
                .default_protocol()
                .set_session_state(SessionState::Authenticated);
        }

        if self.config.database > 0 {
            let reply = self.dispatcher.default_protocol().send(&[
                b"SELECT".to_vec(),
                self.config.database.to_string().into_bytes(),
            ])?;
            if let Some(e) = reply.as_server_error() {
                self.logger.error(&format!("SELECT rejected: {e}"), MODULE);
                return Err(e.into());
            }
            self.dispatcher
                .default_protocol()
                .set_session_state(SessionState::DbSelected);
        }

        self.dispatcher
            .default_protocol()
            .set_session_state(SessionState::Ready);

        if self.config.cluster.enabled {
            let default_endpoint = Endpoint::new(self.config.server.clone());
            self.dispatcher.enable_cluster(&self.config.cluster, default_endpoint);
            if self.config.cluster.init_on_start {
                self.dispatcher.refresh_cluster_slots()?;
            }
            self.dispatcher
                .default_protocol()
                .set_session_state(SessionState::ClusterPrimed);
        }

        self.handshake_done = true;
        Ok(())
    }

    /// Ejecuta un comando crudo: una lista de tokens binary-safe. Para
    /// enrutamiento en modo cluster se asume, como convencion estandar
    /// de los clientes Redis, que el segundo token (si existe) es la
    /// key del comando.
    pub fn execute_raw(&mut self, tokens: Vec<Vec<u8>>) -> Result<ParsedValue, RedisCoreError> {
        if tokens.is_empty() {
            return Err(RedisCoreError::Usage("empty command".to_string()));
        }
        self.ensure_handshake()?;
        let keys = tokens.get(1).cloned().into_iter().collect();
        let cmd = CommandDescription::new(tokens).with_keys(keys);
        self.dispatcher.execute(&cmd)
    }

    /// Tokeniza `line` con el parser de comandos crudo (reglas de
    /// comillas y escape de `raw_parser`) y lo ejecuta.
    pub fn execute_raw_string(&mut self, line: &str) -> Result<ParsedValue, RedisCoreError> {
        let tokens = raw_parser::tokenize_to_bytes(line);
        if tokens.is_empty() {
            return Err(RedisCoreError::Usage("empty or invalid command line".to_string()));
        }
        self.execute_raw(tokens)
    }

    /// Ejecuta directamente una `CommandDescription` ya armada (el punto
    /// de entrada que usarian los metodos tipados fuera de alcance de
    /// este nucleo).
    pub fn execute(&mut self, cmd: &CommandDescription) -> Result<ParsedValue, RedisCoreError> {
        self.ensure_handshake()?;
        self.dispatcher.execute(cmd)
    }

    /// Devuelve un `Pipeline` vacio para que quien llama lo arme a mano
    /// y lo corra despues con `run_pipeline`.
    pub fn pipeline_builder(&self) -> Pipeline {
        Pipeline::new()
    }

    /// Arma un `Pipeline` nuevo, deja que `build` lo llene, y lo corre
    /// de una.
    pub fn pipeline<F>(&mut self, build: F) -> Result<Vec<PipelineItemResult>, RedisCoreError>
    where
        F: FnOnce(&mut Pipeline),
    {
        self.ensure_handshake()?;
        let mut pipeline = Pipeline::new();
        build(&mut pipeline);
        pipeline.execute(&mut self.dispatcher)
    }

    /// Corre un `Pipeline` armado previamente con `pipeline_builder`.
    pub fn run_pipeline(&mut self, pipeline: &Pipeline) -> Result<Vec<PipelineItemResult>, RedisCoreError> {
        self.ensure_handshake()?;
        pipeline.execute(&mut self.dispatcher)
    }
}

/// Azucar para inspeccionar si un `RedisCoreError` envuelve un error
/// servidor ya clasificado, sin tener que hacer el `match` completo.
pub fn as_server_error(err: &RedisCoreError) -> Option<&ServerError> {
    match err {
        RedisCoreError::Server(e) => Some(e),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_raw_rejects_empty_token_list() {
        let mut client = RedisClient::new(ClientConfig::default());
        let err = client.execute_raw(Vec::new()).unwrap_err();
        assert!(matches!(err, RedisCoreError::Usage(_)));
    }

    #[test]
    fn execute_raw_string_rejects_blank_line() {
        let mut client = RedisClient::new(ClientConfig::default());
        let err = client.execute_raw_string("   ").unwrap_err();
        assert!(matches!(err, RedisCoreError::Usage(_)));
    }
}
