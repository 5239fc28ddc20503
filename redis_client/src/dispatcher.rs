//! Ruteo de un unico comando, incluyendo la logica de redireccion
//! MOVED/ASK del modo cluster.
//!
//! La redireccion corre en un loop acotado (`MAX_REDIRECTS`) en vez de
//! recursion sin limite: un cluster migrando no deberia poder hacer
//! oscilar al dispatcher indefinidamente entre un puñado de nodos.

use std::time::Duration;

use logger::logger::Logger;

use crate::cluster::ClusterMap;
use crate::command::CommandDescription;
use crate::config::{ClusterConfig, SlotRange};
use crate::connection::{Connection, Endpoint};
use crate::error::{RedisCoreError, ServerError};
use crate::parsers::{self, ParsedValue, ParserId};
use crate::protocol::Protocol;
use crate::resp::Value;

const MODULE: &str = "dispatcher";

/// Limite de redirecciones MOVED seguidas por una misma llamada a
/// `execute`, para evitar loops patologicos durante un resharding en
/// curso.
pub const MAX_REDIRECTS: u32 = 5;

struct ClusterState {
    map: ClusterMap,
    init_on_error: bool,
}

/// Envia un comando a traves del `Protocol` adecuado y resuelve
/// redirecciones de cluster. En modo no-cluster, siempre usa la misma
/// conexion por omision.
pub struct Dispatcher {
    default_protocol: Protocol,
    cluster: Option<ClusterState>,
    timeout: Duration,
    logger: Logger,
}

impl Dispatcher {
    pub fn new(default_endpoint: Endpoint, timeout: Duration, logger: Logger) -> Dispatcher {
        let connection = Connection::new(default_endpoint, timeout, logger.clone());
        Dispatcher {
            default_protocol: Protocol::new(connection, logger.clone()),
            cluster: None,
            timeout,
            logger,
        }
    }

    pub fn enable_cluster(&mut self, cluster_cfg: &ClusterConfig, default_endpoint: Endpoint) {
        let mut map = ClusterMap::new(default_endpoint, self.timeout, self.logger.clone());
        map.set_clusters(&cluster_cfg.clusters);
        self.cluster = Some(ClusterState {
            map,
            init_on_error: cluster_cfg.init_on_error,
        });
    }

    pub fn is_cluster_enabled(&self) -> bool {
        self.cluster.is_some()
    }

    /// Acceso directo al `Protocol` por omision, usado por el handshake
    /// de la Facade (AUTH/SELECT/CLUSTER SLOTS iniciales).
    pub fn default_protocol(&mut self) -> &mut Protocol {
        &mut self.default_protocol
    }

    /// Pide `CLUSTER SLOTS` al endpoint por omision y reemplaza la
    /// tabla de slots completa.
    pub fn refresh_cluster_slots(&mut self) -> Result<(), RedisCoreError> {
        let reply = self.default_protocol.send(&[b"CLUSTER".to_vec(), b"SLOTS".to_vec()])?;
        if let Some(err) = reply.as_server_error() {
            return Err(err.into());
        }
        let parsed = parsers::apply(ParserId::ClusterSlots, reply)?;
        let entries = match parsed {
            ParsedValue::ClusterSlots(e) => e,
            _ => unreachable!("ClusterSlots parser always returns ClusterSlots"),
        };
        let ranges: Vec<SlotRange> = entries
            .into_iter()
            .map(|e| SlotRange {
                start: e.start,
                end: e.end,
                endpoint: e.endpoint.as_str().to_string(),
            })
            .collect();
        if let Some(state) = &mut self.cluster {
            state.map.set_clusters(&ranges);
        }
        Ok(())
    }

    /// Ejecuta un comando, siguiendo redirecciones MOVED/ASK segun
    /// corresponda, y aplicando el parser de la descripcion a la
    /// respuesta final.
    pub fn execute(&mut self, cmd: &CommandDescription) -> Result<ParsedValue, RedisCoreError> {
        let raw = self.execute_raw_value(cmd)?;
        match cmd.parser_id {
            Some(id) => parsers::apply(id, raw),
            None => Ok(ParsedValue::Raw(raw)),
        }
    }

    /// Igual que `execute`, pero devuelve el `Value` crudo sin aplicar
    /// ningun parser. Usado internamente por `Pipeline`.
    pub fn execute_raw_value(&mut self, cmd: &CommandDescription) -> Result<Value, RedisCoreError> {
        let wire = cmd.wire_tokens();
        let mut redirects = 0;

        loop {
            let reply = {
                let protocol = self.protocol_for(cmd)?;
                protocol.send(&wire)?
            };

            let Some(server_err) = reply.as_server_error() else {
                return Ok(reply);
            };

            match server_err {
                ServerError::Moved { slot, endpoint } => {
                    redirects += 1;
                    if redirects > MAX_REDIRECTS {
                        self.logger.error(
                            &format!("exceeded {MAX_REDIRECTS} MOVED redirects, last target {endpoint}"),
                            MODULE,
                        );
                        return Err(RedisCoreError::Server(ServerError::Moved { slot, endpoint }));
                    }
                    self.logger
                        .warn(&format!("MOVED slot {slot} to {endpoint}"), MODULE);
                    let target = Endpoint::new(endpoint.clone());
                    if self.cluster.as_ref().map(|c| c.init_on_error).unwrap_or(false) {
                        self.refresh_cluster_slots()?;
                    } else if let Some(state) = &mut self.cluster {
                        state.map.add_cluster(slot, target);
                    }
                    // Loop again; next `protocol_for` will pick up the updated table.
                }
                ServerError::Ask { slot, endpoint } => {
                    self.logger.warn(&format!("ASK slot {slot} to {endpoint}"), MODULE);
                    return self.execute_via_ask(&endpoint, &wire);
                }
                other => return Err(RedisCoreError::Server(other)),
            }
        }
    }

    fn protocol_for(&mut self, cmd: &CommandDescription) -> Result<&mut Protocol, RedisCoreError> {
        self.protocol_for_key(cmd.first_key())
    }

    /// Misma regla de ruteo que `protocol_for`, pero tomando
    /// directamente una key opcional. Usado tambien por `Pipeline`, que
    /// enruta una vez para todo el lote segun la primera key de la
    /// primera orden que tenga alguna.
    pub fn protocol_for_key(&mut self, key: Option<&[u8]>) -> Result<&mut Protocol, RedisCoreError> {
        match (&mut self.cluster, key) {
            (Some(state), Some(key)) => state.map.protocol_for_key(key),
            _ => Ok(&mut self.default_protocol),
        }
    }

    /// Maneja una redireccion ASK: abre un `Protocol` temporario
    /// (nunca se agrega al mapa de cluster permanente), manda `ASKING`,
    /// reenvia el comando original, y devuelve su resultado. El slot
    /// map permanente queda intacto.
    fn execute_via_ask(&mut self, endpoint: &str, wire: &[Vec<u8>]) -> Result<Value, RedisCoreError> {
        let connection = Connection::new(Endpoint::new(endpoint), self.timeout, self.logger.clone());
        let mut temp = Protocol::new(connection, self.logger.clone());
        let _ = temp.send(&[b"ASKING".to_vec()])?;
        temp.send(wire)
    }
}
