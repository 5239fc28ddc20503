//! Transporte: posee un socket hacia un unico endpoint.
//!
//! Un `Connection` nunca intenta interpretar RESP; solo sabe escribir
//! bytes, leer bytes con un deadline, y llevar un buffer de lectura
//! acumulado. El `Protocol` (ver `protocol.rs`) es quien combina esto
//! con el `Decoder` del modulo `resp`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use logger::logger::Logger;

use crate::error::RedisCoreError;

const MODULE: &str = "connection";

/// Estado de una `Connection`: `Fresh` (todavia no se abrio el socket),
/// `Open` (lista para usar), `Broken` (hubo un error de I/O; el proximo
/// uso debe reabrir).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Fresh,
    Open,
    Broken,
}

/// Una direccion de endpoint: `host:port`, `tcp://host:port` o
/// `unix:///path`. Se guarda tal cual como string y solo se interpreta
/// al momento de abrir el socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(raw: impl Into<String>) -> Endpoint {
        Endpoint(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Direccion `host:port` lista para `TcpStream::connect`, pelando el
    /// prefijo `tcp://` si esta presente.
    ///
    /// `unix:///path` se reconoce y se puede inspeccionar con
    /// `is_unix`, pero conectar sobre ese transporte no esta
    /// implementado (ver DESIGN.md, resolucion de la pregunta abierta
    /// sobre transportes). El endpoint igual se guarda y se puede
    /// imprimir/comparar sin perder informacion, por si un
    /// `CLUSTER SLOTS` real devuelve nodos con ese esquema.
    pub fn tcp_address(&self) -> &str {
        self.0.strip_prefix("tcp://").unwrap_or(&self.0)
    }

    pub fn is_unix(&self) -> bool {
        self.0.starts_with("unix://")
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conexion a un unico endpoint. Posee el socket, el buffer de bytes sin
/// procesar todavia, y el deadline configurado.
pub struct Connection {
    endpoint: Endpoint,
    timeout: Duration,
    stream: Option<TcpStream>,
    state: ConnectionState,
    read_buf: Vec<u8>,
    logger: Logger,
}

impl Connection {
    pub fn new(endpoint: Endpoint, timeout: Duration, logger: Logger) -> Connection {
        Connection {
            endpoint,
            timeout,
            stream: None,
            state: ConnectionState::Fresh,
            read_buf: Vec::new(),
            logger,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Abre el socket si hace falta (estado `Fresh` o `Broken`). Llamar
    /// en cualquier estado es seguro: si ya esta `Open` no hace nada.
    pub fn ensure_open(&mut self) -> Result<(), RedisCoreError> {
        if self.state == ConnectionState::Open && self.stream.is_some() {
            return Ok(());
        }
        if self.endpoint.is_unix() {
            return Err(RedisCoreError::Protocol(format!(
                "unix socket transport not supported for endpoint {}",
                self.endpoint
            )));
        }
        let addr = self.endpoint.tcp_address();
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        let was_broken = self.state == ConnectionState::Broken;
        self.state = ConnectionState::Open;
        self.read_buf.clear();
        if was_broken {
            self.logger
                .warn(&format!("reconnected to {addr}"), MODULE);
        } else {
            self.logger.info(&format!("connected to {addr}"), MODULE);
        }
        Ok(())
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), RedisCoreError> {
        self.ensure_open()?;
        let stream = self.stream.as_mut().expect("ensure_open guarantees Some");
        match stream.write_all(bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.mark_broken(&e);
                Err(e.into())
            }
        }
    }

    /// Lee lo que haya disponible (hasta un buffer intermedio de 8KiB) y
    /// lo agrega al final del buffer acumulado. Un timeout durante esta
    /// lectura marca la conexion como `Broken`.
    pub fn read_some(&mut self) -> Result<(), RedisCoreError> {
        self.ensure_open()?;
        let stream = self.stream.as_mut().expect("ensure_open guarantees Some");
        let mut chunk = [0u8; 8192];
        match stream.read(&mut chunk) {
            Ok(0) => {
                let e = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed by peer");
                self.mark_broken(&e);
                Err(e.into())
            }
            Ok(n) => {
                self.read_buf.extend_from_slice(&chunk[..n]);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                self.mark_broken(&e);
                Err(RedisCoreError::Io(e))
            }
            Err(e) => {
                self.mark_broken(&e);
                Err(e.into())
            }
        }
    }

    pub fn read_buf(&self) -> &[u8] {
        &self.read_buf
    }

    /// Descarta los primeros `n` bytes ya consumidos del buffer de
    /// lectura.
    pub fn consume(&mut self, n: usize) {
        self.read_buf.drain(..n);
    }

    pub fn close(&mut self) {
        self.stream = None;
        self.state = ConnectionState::Fresh;
        self.read_buf.clear();
    }

    fn mark_broken(&mut self, e: &std::io::Error) {
        self.logger
            .warn(&format!("connection to {} broken: {e}", self.endpoint), MODULE);
        self.stream = None;
        self.state = ConnectionState::Broken;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_tcp_scheme() {
        let e = Endpoint::new("tcp://10.0.0.2:6380");
        assert_eq!(e.tcp_address(), "10.0.0.2:6380");
        assert!(!e.is_unix());
    }

    #[test]
    fn endpoint_recognizes_unix_scheme() {
        let e = Endpoint::new("unix:///var/run/redis.sock");
        assert!(e.is_unix());
        assert_eq!(e.as_str(), "unix:///var/run/redis.sock");
    }

    #[test]
    fn plain_host_port_is_unchanged() {
        let e = Endpoint::new("127.0.0.1:6379");
        assert_eq!(e.tcp_address(), "127.0.0.1:6379");
    }

    #[test]
    fn fresh_connection_reports_fresh_state() {
        let c = Connection::new(Endpoint::new("127.0.0.1:0"), Duration::from_millis(50), Logger::null());
        assert_eq!(c.state(), ConnectionState::Fresh);
    }
}
