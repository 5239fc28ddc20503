//! Post-procesadores de respuestas crudas en formas de dominio.
//!
//! Un parser se elige por un id entero (`ParserId`) que viaja en el
//! `CommandDescription`. Son funciones puras de un `Value`: no tocan la
//! red ni el estado del cliente, solo reinterpretan lo que ya llego.

use std::collections::HashMap;

use crate::connection::Endpoint;
use crate::error::RedisCoreError;
use crate::resp::Value;

/// Identifica que post-procesador aplicar a una respuesta cruda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserId {
    Identity,
    Integer,
    BoolFromInteger,
    KeyValuePairs,
    ClusterSlots,
    Info,
    StatusOk,
    OptionalBulkString,
}

/// Una entrada de `CLUSTER SLOTS`: el rango de slots y el endpoint
/// (master) que los sirve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSlotEntry {
    pub start: u16,
    pub end: u16,
    pub endpoint: Endpoint,
}

/// Aplica el parser identificado por `id` al valor crudo `value`.
pub fn apply(id: ParserId, value: Value) -> Result<ParsedValue, RedisCoreError> {
    match id {
        ParserId::Identity => Ok(ParsedValue::Raw(value)),
        ParserId::Integer => parse_integer(value).map(ParsedValue::Integer),
        ParserId::BoolFromInteger => parse_integer(value).map(|n| ParsedValue::Bool(n != 0)),
        ParserId::KeyValuePairs => parse_kv_pairs(value).map(ParsedValue::KeyValuePairs),
        ParserId::ClusterSlots => parse_cluster_slots(value).map(ParsedValue::ClusterSlots),
        ParserId::Info => parse_info(value).map(ParsedValue::Info),
        ParserId::StatusOk => parse_status_ok(value).map(|()| ParsedValue::Unit),
        ParserId::OptionalBulkString => Ok(ParsedValue::OptionalBytes(parse_optional_bulk(value))),
    }
}

/// Resultado de aplicar un parser: una de varias formas de dominio,
/// segun que `ParserId` se haya usado.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Raw(Value),
    Integer(i64),
    Bool(bool),
    KeyValuePairs(Vec<(Vec<u8>, Vec<u8>)>),
    ClusterSlots(Vec<ClusterSlotEntry>),
    Info(HashMap<String, HashMap<String, String>>),
    Unit,
    OptionalBytes(Option<Vec<u8>>),
}

fn parse_integer(value: Value) -> Result<i64, RedisCoreError> {
    match value {
        Value::Integer(n) => Ok(n),
        other => Err(RedisCoreError::Protocol(format!(
            "expected Integer, got {other:?}"
        ))),
    }
}

fn parse_status_ok(value: Value) -> Result<(), RedisCoreError> {
    match value {
        Value::SimpleString(ref s) if s == b"OK" => Ok(()),
        other => Err(RedisCoreError::Protocol(format!(
            "expected +OK, got {other:?}"
        ))),
    }
}

fn parse_optional_bulk(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::NullBulk | Value::NullArray => None,
        Value::BulkString(b) => Some(b),
        other => Some(format!("{other:?}").into_bytes()),
    }
}

/// Interpreta una respuesta en flat `[k1, v1, k2, v2, ...]` como una
/// lista de pares. Usado por comandos como `HGETALL`/`CONFIG GET`.
fn parse_kv_pairs(value: Value) -> Result<Vec<(Vec<u8>, Vec<u8>)>, RedisCoreError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(RedisCoreError::Protocol(format!(
                "expected Array for key/value pairs, got {other:?}"
            )));
        }
    };
    if items.len() % 2 != 0 {
        return Err(RedisCoreError::Protocol(
            "key/value array has an odd number of elements".to_string(),
        ));
    }
    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut it = items.into_iter();
    while let (Some(k), Some(v)) = (it.next(), it.next()) {
        let key = k
            .as_bytes()
            .ok_or_else(|| RedisCoreError::Protocol("non-bulk key in pair list".to_string()))?
            .to_vec();
        let val = v
            .as_bytes()
            .ok_or_else(|| RedisCoreError::Protocol("non-bulk value in pair list".to_string()))?
            .to_vec();
        pairs.push((key, val));
    }
    Ok(pairs)
}

/// Interpreta la respuesta de `CLUSTER SLOTS`: un array de
/// `[start, end, [host, port, ...], ...]`. Solo se toma el primer nodo
/// (master) de cada rango; los replicas listados despues no se usan
/// para enrutamiento de escritura/lectura en esta implementacion.
fn parse_cluster_slots(value: Value) -> Result<Vec<ClusterSlotEntry>, RedisCoreError> {
    let rows = match value {
        Value::Array(rows) => rows,
        other => {
            return Err(RedisCoreError::Protocol(format!(
                "expected Array for CLUSTER SLOTS, got {other:?}"
            )));
        }
    };

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let cols = row
            .as_array()
            .ok_or_else(|| RedisCoreError::Protocol("CLUSTER SLOTS row is not an array".to_string()))?;
        if cols.len() < 3 {
            return Err(RedisCoreError::Protocol(
                "CLUSTER SLOTS row has fewer than 3 columns".to_string(),
            ));
        }
        let start = expect_integer(&cols[0])?;
        let end = expect_integer(&cols[1])?;
        let node = cols[2]
            .as_array()
            .ok_or_else(|| RedisCoreError::Protocol("CLUSTER SLOTS node entry is not an array".to_string()))?;
        if node.len() < 2 {
            return Err(RedisCoreError::Protocol(
                "CLUSTER SLOTS node entry missing host/port".to_string(),
            ));
        }
        let host = node[0]
            .as_bytes()
            .ok_or_else(|| RedisCoreError::Protocol("CLUSTER SLOTS host is not a string".to_string()))?;
        let host = String::from_utf8_lossy(host).into_owned();
        let port = expect_integer(&node[1])?;

        entries.push(ClusterSlotEntry {
            start: u16::try_from(start)
                .map_err(|_| RedisCoreError::Protocol("slot start out of range".to_string()))?,
            end: u16::try_from(end)
                .map_err(|_| RedisCoreError::Protocol("slot end out of range".to_string()))?,
            endpoint: Endpoint::new(format!("{host}:{port}")),
        });
    }
    Ok(entries)
}

fn expect_integer(value: &Value) -> Result<i64, RedisCoreError> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(RedisCoreError::Protocol(format!(
            "expected Integer, got {other:?}"
        ))),
    }
}

/// Interpreta la respuesta de `INFO`: lineas separadas por `\r\n` (o
/// `\n`), seccionadas por lineas que empiezan con `#`, cada linea de
/// datos de la forma `clave:valor`.
fn parse_info(value: Value) -> Result<HashMap<String, HashMap<String, String>>, RedisCoreError> {
    let bytes = value
        .as_bytes()
        .ok_or_else(|| RedisCoreError::Protocol("INFO reply is not a bulk/simple string".to_string()))?;
    let text = String::from_utf8_lossy(bytes);

    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current = "default".to_string();
    sections.entry(current.clone()).or_default();

    for raw_line in text.split(['\n']) {
        let line = raw_line.trim_end_matches('\r').trim();
        if line.is_empty() {
            continue;
        }
        if let Some(section) = line.strip_prefix('#') {
            current = section.trim().to_string();
            sections.entry(current.clone()).or_default();
            continue;
        }
        if let Some((key, val)) = line.split_once(':') {
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.to_string(), val.to_string());
        }
    }
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_parser_extracts_value() {
        let parsed = apply(ParserId::Integer, Value::Integer(42)).unwrap();
        assert_eq!(parsed, ParsedValue::Integer(42));
    }

    #[test]
    fn bool_from_integer_parser() {
        assert_eq!(
            apply(ParserId::BoolFromInteger, Value::Integer(1)).unwrap(),
            ParsedValue::Bool(true)
        );
        assert_eq!(
            apply(ParserId::BoolFromInteger, Value::Integer(0)).unwrap(),
            ParsedValue::Bool(false)
        );
    }

    #[test]
    fn kv_pairs_parser_builds_pairs_in_order() {
        let value = Value::Array(vec![
            Value::BulkString(b"a".to_vec()),
            Value::BulkString(b"1".to_vec()),
            Value::BulkString(b"b".to_vec()),
            Value::BulkString(b"2".to_vec()),
        ]);
        let parsed = apply(ParserId::KeyValuePairs, value).unwrap();
        assert_eq!(
            parsed,
            ParsedValue::KeyValuePairs(vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
            ])
        );
    }

    #[test]
    fn cluster_slots_parser_reads_start_end_and_master_endpoint() {
        let value = Value::Array(vec![Value::Array(vec![
            Value::Integer(0),
            Value::Integer(5460),
            Value::Array(vec![
                Value::BulkString(b"10.0.0.1".to_vec()),
                Value::Integer(6379),
            ]),
        ])]);
        let parsed = apply(ParserId::ClusterSlots, value).unwrap();
        assert_eq!(
            parsed,
            ParsedValue::ClusterSlots(vec![ClusterSlotEntry {
                start: 0,
                end: 5460,
                endpoint: Endpoint::new("10.0.0.1:6379"),
            }])
        );
    }

    #[test]
    fn info_parser_splits_sections_and_kv_lines() {
        let raw = "# Server\r\nredis_version:7.0.0\r\nuptime_in_seconds:10\r\n# Clients\r\nconnected_clients:1\r\n";
        let parsed = apply(ParserId::Info, Value::BulkString(raw.as_bytes().to_vec())).unwrap();
        match parsed {
            ParsedValue::Info(sections) => {
                assert_eq!(
                    sections.get("Server").unwrap().get("redis_version").unwrap(),
                    "7.0.0"
                );
                assert_eq!(
                    sections.get("Clients").unwrap().get("connected_clients").unwrap(),
                    "1"
                );
            }
            _ => panic!("expected Info variant"),
        }
    }

    #[test]
    fn status_ok_parser_rejects_non_ok() {
        assert!(apply(ParserId::StatusOk, Value::SimpleString(b"OK".to_vec())).is_ok());
        assert!(apply(ParserId::StatusOk, Value::SimpleString(b"PONG".to_vec())).is_err());
    }

    #[test]
    fn optional_bulk_string_maps_null_to_none() {
        assert_eq!(
            apply(ParserId::OptionalBulkString, Value::NullBulk).unwrap(),
            ParsedValue::OptionalBytes(None)
        );
        assert_eq!(
            apply(ParserId::OptionalBulkString, Value::BulkString(b"v".to_vec())).unwrap(),
            ParsedValue::OptionalBytes(Some(b"v".to_vec()))
        );
    }
}
