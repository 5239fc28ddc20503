//! REPL minimo para hablar con un nodo Redis usando `redis_client`.
//!
//! Cada linea se tokeniza con el parser de comandos crudo y se despacha
//! via `RedisClient::execute_raw_string`; la respuesta se imprime con
//! un formato analogo al de `redis-cli`. Esta es una superficie de
//! demostracion/integracion, no parte del contrato testeado de la
//! biblioteca.

use std::env;
use std::io::{self, Write};
use std::time::Duration;

use logger::logger::Logger;
use redis_client::config::ClientConfig;
use redis_client::error::RedisCoreError;
use redis_client::parsers::ParsedValue;
use redis_client::resp::Value;
use redis_client::RedisClient;

fn main() {
    let args: Vec<String> = env::args().collect();
    let server = args.get(1).cloned().unwrap_or_else(|| "127.0.0.1:6379".to_string());

    let config = ClientConfig {
        server: server.clone(),
        timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    };
    let mut client = RedisClient::with_logger(config, Logger::null());

    println!("Conectando a {server} ('quit' o 'q' para salir)");

    loop {
        print!("{server}> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        if io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("q") {
            break;
        }

        match client.execute_raw_string(line) {
            Ok(parsed) => println!("{}", render_parsed(&parsed)),
            Err(e) => println!("{}", render_error(&e)),
        }
    }
}

fn render_error(err: &RedisCoreError) -> String {
    match err {
        RedisCoreError::Server(server_err) => format!("(error) {server_err}"),
        other => format!("(error) {other}"),
    }
}

fn render_parsed(parsed: &ParsedValue) -> String {
    match parsed {
        ParsedValue::Raw(value) => render_value(value, 0),
        ParsedValue::Integer(n) => format!("(integer) {n}"),
        ParsedValue::Bool(b) => format!("(integer) {}", i32::from(*b)),
        ParsedValue::Unit => "OK".to_string(),
        ParsedValue::OptionalBytes(None) => "(nil)".to_string(),
        ParsedValue::OptionalBytes(Some(bytes)) => format!("\"{}\"", String::from_utf8_lossy(bytes)),
        ParsedValue::KeyValuePairs(pairs) => pairs
            .iter()
            .enumerate()
            .map(|(i, (k, v))| {
                format!(
                    "{}) \"{}\" => \"{}\"",
                    i + 1,
                    String::from_utf8_lossy(k),
                    String::from_utf8_lossy(v)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        ParsedValue::ClusterSlots(entries) => entries
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}) {}-{} -> {}", i + 1, e.start, e.end, e.endpoint))
            .collect::<Vec<_>>()
            .join("\n"),
        ParsedValue::Info(sections) => {
            let mut out = Vec::new();
            for (section, kv) in sections {
                out.push(format!("# {section}"));
                for (k, v) in kv {
                    out.push(format!("{k}:{v}"));
                }
            }
            out.join("\n")
        }
    }
}

/// Pretty-printer al estilo `redis-cli`: `(integer) N`, `"bulk"`,
/// `1) ...` para arrays, `(nil)`, `(error) ...`.
fn render_value(value: &Value, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    match value {
        Value::SimpleString(s) => String::from_utf8_lossy(s).into_owned(),
        Value::Error(e) => format!("(error) {}", String::from_utf8_lossy(e)),
        Value::Integer(n) => format!("(integer) {n}"),
        Value::BulkString(b) => format!("\"{}\"", String::from_utf8_lossy(b)),
        Value::NullBulk | Value::NullArray => "(nil)".to_string(),
        Value::Array(items) => {
            if items.is_empty() {
                return "(empty array)".to_string();
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| format!("{indent}{}) {}", i + 1, render_value(item, depth + 1)))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_integer_like_redis_cli() {
        assert_eq!(render_value(&Value::Integer(42), 0), "(integer) 42");
    }

    #[test]
    fn renders_nil_for_null_bulk() {
        assert_eq!(render_value(&Value::NullBulk, 0), "(nil)");
    }

    #[test]
    fn renders_array_with_one_based_indices() {
        let value = Value::Array(vec![
            Value::BulkString(b"a".to_vec()),
            Value::BulkString(b"b".to_vec()),
        ]);
        assert_eq!(render_value(&value, 0), "1) \"a\"\n2) \"b\"");
    }
}
