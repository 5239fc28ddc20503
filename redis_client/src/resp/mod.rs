//! Codec del protocolo RESP (REdis Serialization Protocol).
//!
//! Este modulo tiene dos responsabilidades, separadas a proposito:
//! - `encode`: arma el multi-bulk que Redis espera para un comando.
//! - `Decoder`: interpreta bytes ya acumulados en un buffer y devuelve el
//!   proximo `Value` completo, o `Value::NeedMore` si falta informacion.
//!
//! El decoder nunca bloquea ni hace I/O: solo mira un `&[u8]` que el
//! `Connection` le va agrandando a medida que llegan bytes del socket.
//! Esto es lo que permite que funcione igual de bien si un mensaje llega
//! entero de una vez o repartido en diez paquetes TCP.

use crate::error::{RedisCoreError, ServerError};

/// Un valor RESP ya decodificado. Los payloads son binary-safe (`Vec<u8>`),
/// nunca `String`: una bulk string de Redis puede contener bytes que no
/// son UTF-8 valido.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    SimpleString(Vec<u8>),
    Error(Vec<u8>),
    Integer(i64),
    BulkString(Vec<u8>),
    NullBulk,
    Array(Vec<Value>),
    NullArray,
}

impl Value {
    pub fn ok() -> Value {
        Value::SimpleString(b"OK".to_vec())
    }

    /// Si este valor es un `Error`, lo clasifica; en otro caso `None`.
    pub fn as_server_error(&self) -> Option<ServerError> {
        match self {
            Value::Error(payload) => Some(ServerError::classify(payload)),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Vista de bytes, si el valor es una bulk o simple string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::BulkString(b) | Value::SimpleString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Codifica una lista de tokens binary-safe como un array RESP de bulk
/// strings: la forma de wire que Redis espera para cualquier comando.
///
/// ```
/// use redis_client::resp::encode;
/// let wire = encode(&[b"SET".to_vec(), b"foo".to_vec(), b"bar".to_vec()]);
/// assert_eq!(wire, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
/// ```
pub fn encode(tokens: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + tokens.iter().map(|t| t.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", tokens.len()).as_bytes());
    for token in tokens {
        out.extend_from_slice(format!("${}\r\n", token.len()).as_bytes());
        out.extend_from_slice(token);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Resultado de un intento de decodificacion: o bien consumimos `usize`
/// bytes del buffer y obtuvimos un `Value`, o bien el buffer no alcanza
/// todavia y hay que pedirle mas bytes a la conexion.
pub enum Decoded {
    Value(Value, usize),
    NeedMore,
}

/// Decodificador sin estado propio: no posee el buffer, lo recibe como
/// `&[u8]` en cada llamada. Quien posee el `Vec<u8>` acumulado (el
/// `Connection`) es responsable de descartar los bytes consumidos luego
/// de un `Decoded::Value`.
pub struct Decoder;

impl Decoder {
    /// Intenta decodificar un unico valor RESP desde el comienzo de
    /// `buf`. No avanza ningun cursor compartido: devuelve cuantos bytes
    /// fueron consumidos para que el llamador los descarte.
    pub fn decode(buf: &[u8]) -> Result<Decoded, RedisCoreError> {
        decode_value(buf, 0).map(|opt| match opt {
            Some((value, consumed)) => Decoded::Value(value, consumed),
            None => Decoded::NeedMore,
        })
    }
}

/// Busca un `\r\n` a partir de `start`. Devuelve el indice del `\r`.
fn find_crlf(buf: &[u8], start: usize) -> Option<usize> {
    if start >= buf.len() {
        return None;
    }
    buf[start..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|p| p + start)
}

/// Decodifica un unico valor a partir de `buf[pos..]`.
///
/// Devuelve `Ok(None)` si faltan bytes (NeedMore), `Ok(Some((value,
/// nuevo_pos)))` en exito, `Err` si los bytes violan el protocolo.
fn decode_value(buf: &[u8], pos: usize) -> Result<Option<(Value, usize)>, RedisCoreError> {
    if pos >= buf.len() {
        return Ok(None);
    }
    let type_byte = buf[pos];
    let Some(line_end) = find_crlf(buf, pos + 1) else {
        return Ok(None);
    };
    let header = &buf[pos + 1..line_end];
    let after_header = line_end + 2;

    match type_byte {
        b'+' => Ok(Some((Value::SimpleString(header.to_vec()), after_header))),
        b'-' => Ok(Some((Value::Error(header.to_vec()), after_header))),
        b':' => {
            let n = parse_i64(header)?;
            Ok(Some((Value::Integer(n), after_header)))
        }
        b'$' => {
            let len = parse_i64(header)?;
            if len == -1 {
                return Ok(Some((Value::NullBulk, after_header)));
            }
            if len < -1 {
                return Err(RedisCoreError::Protocol(format!(
                    "invalid bulk length {len}"
                )));
            }
            let len = len as usize;
            let needed = after_header + len + 2;
            if buf.len() < needed {
                return Ok(None);
            }
            let payload = buf[after_header..after_header + len].to_vec();
            Ok(Some((Value::BulkString(payload), needed)))
        }
        b'*' => {
            let len = parse_i64(header)?;
            if len == -1 {
                return Ok(Some((Value::NullArray, after_header)));
            }
            if len < -1 {
                return Err(RedisCoreError::Protocol(format!(
                    "invalid array length {len}"
                )));
            }
            let mut items = Vec::with_capacity(len as usize);
            let mut cursor = after_header;
            for _ in 0..len {
                match decode_value(buf, cursor)? {
                    Some((value, next)) => {
                        items.push(value);
                        cursor = next;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Value::Array(items), cursor)))
        }
        other => Err(RedisCoreError::Protocol(format!(
            "unknown RESP type byte '{}'",
            other as char
        ))),
    }
}

fn parse_i64(header: &[u8]) -> Result<i64, RedisCoreError> {
    std::str::from_utf8(header)
        .map_err(|_| RedisCoreError::Protocol("non-utf8 numeric header".to_string()))?
        .parse::<i64>()
        .map_err(|e| RedisCoreError::Protocol(format!("invalid integer header: {e}")))
}
