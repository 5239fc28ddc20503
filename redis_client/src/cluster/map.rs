//! Tabla slot -> endpoint y cache de endpoint -> `Protocol`.
//!
//! Representacion interna: un slice fijo de 16384 entradas indexado
//! directamente por slot (O(1), sin ramas) en vez de un `BTreeMap<u16,
//! Endpoint>` con busqueda por piso sobre el inicio de cada rango. El
//! espacio de slots es chico y acotado, asi que la tabla plana gana en
//! simplicidad sin perder nada; ver DESIGN.md para la resolucion de
//! esta pregunta abierta.

use std::collections::HashMap;
use std::time::Duration;

use logger::logger::Logger;

use crate::cluster::slot::{slot_of, SLOT_COUNT};
use crate::config::SlotRange;
use crate::connection::{Connection, Endpoint};
use crate::protocol::Protocol;

const MODULE: &str = "cluster_map";

/// Mapea slots a endpoints y cachea, por endpoint, el `Protocol` ya
/// abierto hacia el. Invariantes: a) toda busqueda de ruteo pasa por
/// `slot_of(key)` y despues por la tabla de slots; b) `endpoint ->
/// Protocol` es a lo sumo uno por endpoint dentro del mapa; c) una
/// entrada de slot ausente cae al endpoint por omision configurado.
pub struct ClusterMap {
    table: Box<[Option<Endpoint>]>,
    default_endpoint: Endpoint,
    connections: HashMap<Endpoint, Protocol>,
    timeout: Duration,
    logger: Logger,
}

impl ClusterMap {
    pub fn new(default_endpoint: Endpoint, timeout: Duration, logger: Logger) -> ClusterMap {
        ClusterMap {
            table: vec![None; SLOT_COUNT as usize].into_boxed_slice(),
            default_endpoint,
            connections: HashMap::new(),
            timeout,
            logger,
        }
    }

    pub fn slot_of(&self, key: &[u8]) -> u16 {
        slot_of(key)
    }

    /// Reemplaza la tabla de slots entera a partir de una lista de
    /// rangos, tipicamente la salida parseada de `CLUSTER SLOTS`.
    pub fn set_clusters(&mut self, ranges: &[SlotRange]) {
        for slot in self.table.iter_mut() {
            *slot = None;
        }
        for range in ranges {
            self.add_cluster_range(range.start, range.end, Endpoint::new(range.endpoint.clone()));
        }
        self.logger.info(
            &format!("cluster slot table replaced with {} ranges", ranges.len()),
            MODULE,
        );
    }

    /// Asigna un unico slot a un endpoint, usado por una redireccion
    /// MOVED sin refresco completo de la tabla.
    pub fn add_cluster(&mut self, slot: u16, endpoint: Endpoint) {
        self.add_cluster_range(slot, slot, endpoint);
    }

    fn add_cluster_range(&mut self, start: u16, end: u16, endpoint: Endpoint) {
        for s in start..=end {
            self.table[s as usize] = Some(endpoint.clone());
        }
    }

    fn endpoint_for_slot(&self, slot: u16) -> &Endpoint {
        self.table[slot as usize]
            .as_ref()
            .unwrap_or(&self.default_endpoint)
    }

    /// Busca (o abre, lazy) el `Protocol` que corresponde a una key,
    /// segun slot -> endpoint -> protocolo cacheado.
    pub fn protocol_for_key(&mut self, key: &[u8]) -> Result<&mut Protocol, crate::error::RedisCoreError> {
        let slot = slot_of(key);
        let endpoint = self.endpoint_for_slot(slot).clone();
        self.protocol_for_endpoint(&endpoint)
    }

    /// Busca (o abre, lazy) el `Protocol` para un endpoint dado,
    /// memoizado: a lo sumo un `Protocol` vivo por endpoint.
    pub fn protocol_for_endpoint(
        &mut self,
        endpoint: &Endpoint,
    ) -> Result<&mut Protocol, crate::error::RedisCoreError> {
        if !self.connections.contains_key(endpoint) {
            let connection = Connection::new(endpoint.clone(), self.timeout, self.logger.clone());
            self.connections
                .insert(endpoint.clone(), Protocol::new(connection, self.logger.clone()));
        }
        Ok(self.connections.get_mut(endpoint).expect("just inserted"))
    }

    pub fn default_endpoint(&self) -> &Endpoint {
        &self.default_endpoint
    }
}
