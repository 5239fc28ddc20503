//! Tipo de error unico expuesto por el crate.
//!
//! Toda falla que puede producirse al hablar con un nodo Redis cae en una
//! de tres categorias: transporte (el socket fallo), protocolo (el nodo
//! mando algo que no entendemos o que el servidor rechazo), o uso (quien
//! llama al driver le paso algo invalido). `RedisCoreError` las junta en
//! un solo tipo para que el resto del crate pueda propagar con `?`.
use std::fmt;
use std::io;

/// Clasificacion de un `Error` RESP por su primera palabra.
///
/// Redis identifica el tipo de error por el primer token separado por
/// espacios del mensaje (`ERR`, `MOVED`, `WRONGTYPE`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    Generic(String),
    Moved { slot: u16, endpoint: String },
    Ask { slot: u16, endpoint: String },
    ClusterDown(String),
    Loading(String),
    NoAuth(String),
    WrongType(String),
    Busy(String),
    Oom(String),
    NoScript(String),
    ReadOnly(String),
    ExecAbort(String),
}

impl ServerError {
    /// Clasifica el payload crudo de un `Error` RESP (sin el `-` inicial
    /// ni el `\r\n` final) segun su primera palabra.
    pub fn classify(payload: &[u8]) -> ServerError {
        let text = String::from_utf8_lossy(payload);
        let mut words = text.splitn(2, ' ');
        let tag = words.next().unwrap_or("");
        let rest = words.next().unwrap_or("").to_string();

        match tag {
            "MOVED" => match parse_redirect(&rest) {
                Some((slot, endpoint)) => ServerError::Moved { slot, endpoint },
                None => ServerError::Generic(text.into_owned()),
            },
            "ASK" => match parse_redirect(&rest) {
                Some((slot, endpoint)) => ServerError::Ask { slot, endpoint },
                None => ServerError::Generic(text.into_owned()),
            },
            "CLUSTERDOWN" => ServerError::ClusterDown(rest),
            "LOADING" => ServerError::Loading(rest),
            "NOAUTH" => ServerError::NoAuth(rest),
            "WRONGTYPE" => ServerError::WrongType(rest),
            "BUSY" => ServerError::Busy(rest),
            "OOM" => ServerError::Oom(rest),
            "NOSCRIPT" => ServerError::NoScript(rest),
            "READONLY" => ServerError::ReadOnly(rest),
            "EXECABORT" => ServerError::ExecAbort(rest),
            _ => ServerError::Generic(text.into_owned()),
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, ServerError::Moved { .. } | ServerError::Ask { .. })
    }
}

fn parse_redirect(rest: &str) -> Option<(u16, String)> {
    let mut parts = rest.splitn(2, ' ');
    let slot = parts.next()?.parse::<u16>().ok()?;
    let endpoint = parts.next()?.trim().to_string();
    if endpoint.is_empty() {
        return None;
    }
    Some((slot, endpoint))
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Generic(m) => write!(f, "{m}"),
            ServerError::Moved { slot, endpoint } => write!(f, "MOVED {slot} {endpoint}"),
            ServerError::Ask { slot, endpoint } => write!(f, "ASK {slot} {endpoint}"),
            ServerError::ClusterDown(m) => write!(f, "CLUSTERDOWN {m}"),
            ServerError::Loading(m) => write!(f, "LOADING {m}"),
            ServerError::NoAuth(m) => write!(f, "NOAUTH {m}"),
            ServerError::WrongType(m) => write!(f, "WRONGTYPE {m}"),
            ServerError::Busy(m) => write!(f, "BUSY {m}"),
            ServerError::Oom(m) => write!(f, "OOM {m}"),
            ServerError::NoScript(m) => write!(f, "NOSCRIPT {m}"),
            ServerError::ReadOnly(m) => write!(f, "READONLY {m}"),
            ServerError::ExecAbort(m) => write!(f, "EXECABORT {m}"),
        }
    }
}

/// Error unico del crate.
#[derive(Debug)]
pub enum RedisCoreError {
    /// Fallo de socket: conexion, lectura, escritura, timeout.
    Io(io::Error),
    /// Bytes recibidos que no respetan el protocolo RESP (byte de tipo
    /// desconocido, largo invalido, numero mal formado).
    Protocol(String),
    /// Error RESP en banda, ya clasificado.
    Server(ServerError),
    /// Mal uso de la API por parte de quien llama (builder invalido,
    /// parser_id desconocido, metodo inexistente).
    Usage(String),
}

impl fmt::Display for RedisCoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedisCoreError::Io(e) => write!(f, "io: {e}"),
            RedisCoreError::Protocol(m) => write!(f, "protocol: {m}"),
            RedisCoreError::Server(e) => write!(f, "server: {e}"),
            RedisCoreError::Usage(m) => write!(f, "usage: {m}"),
        }
    }
}

impl std::error::Error for RedisCoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RedisCoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RedisCoreError {
    fn from(e: io::Error) -> Self {
        RedisCoreError::Io(e)
    }
}

impl From<std::num::ParseIntError> for RedisCoreError {
    fn from(e: std::num::ParseIntError) -> Self {
        RedisCoreError::Protocol(e.to_string())
    }
}

impl From<ServerError> for RedisCoreError {
    fn from(e: ServerError) -> Self {
        RedisCoreError::Server(e)
    }
}

pub type RedisCoreResult<T> = Result<T, RedisCoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_moved() {
        let e = ServerError::classify(b"MOVED 866 10.0.0.2:6380");
        assert_eq!(
            e,
            ServerError::Moved {
                slot: 866,
                endpoint: "10.0.0.2:6380".to_string()
            }
        );
    }

    #[test]
    fn classifies_ask() {
        let e = ServerError::classify(b"ASK 3999 10.0.0.3:6381");
        assert_eq!(
            e,
            ServerError::Ask {
                slot: 3999,
                endpoint: "10.0.0.3:6381".to_string()
            }
        );
    }

    #[test]
    fn classifies_wrongtype() {
        let e = ServerError::classify(b"WRONGTYPE Operation against a key holding the wrong kind of value");
        assert!(matches!(e, ServerError::WrongType(_)));
    }

    #[test]
    fn unknown_tag_is_generic() {
        let e = ServerError::classify(b"ERR unknown command 'FOO'");
        assert!(matches!(e, ServerError::Generic(_)));
    }

    #[test]
    fn malformed_moved_falls_back_to_generic() {
        let e = ServerError::classify(b"MOVED not-a-slot");
        assert!(matches!(e, ServerError::Generic(_)));
    }
}
