//! Un lote de comandos enviado de una vez para reducir round-trips.
//!
//! `Pipeline` solo acumula `CommandDescription`s; quien efectivamente
//! dispara el lote es el `Dispatcher` via `Pipeline::execute`. Un error
//! en banda en una de las respuestas ocupa su posicion en el resultado
//! (no aborta el lote); un fallo de transporte si aborta todo.

use crate::command::CommandDescription;
use crate::dispatcher::Dispatcher;
use crate::error::{RedisCoreError, ServerError};
use crate::parsers::{self, ParsedValue};

/// El resultado de una posicion del pipeline: o el valor ya parseado, o
/// el error RESP en banda que ocupo esa posicion.
pub type PipelineItemResult = Result<ParsedValue, ServerError>;

#[derive(Default)]
pub struct Pipeline {
    commands: Vec<CommandDescription>,
}

impl Pipeline {
    pub fn new() -> Pipeline {
        Pipeline::default()
    }

    pub fn append(&mut self, command: CommandDescription) -> &mut Pipeline {
        self.commands.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Lista ordenada de las primeras keys de cada comando que tenga
    /// alguna, usada una vez para decidir a que conexion enrutar el
    /// lote entero. Un pipeline cross-slot es responsabilidad de quien
    /// llama: esta implementacion rutea por la primera key encontrada.
    pub fn get_keys(&self) -> Vec<&[u8]> {
        self.commands.iter().filter_map(|c| c.first_key()).collect()
    }

    /// Dispara el lote entero a traves de `dispatcher` y devuelve un
    /// resultado por comando, en el mismo orden en que fueron
    /// agregados. Invariante: `len(result) == len(self)` si el
    /// round-trip de transporte tiene exito.
    pub fn execute(&self, dispatcher: &mut Dispatcher) -> Result<Vec<PipelineItemResult>, RedisCoreError> {
        if self.commands.is_empty() {
            return Ok(Vec::new());
        }

        let routing_key = self.get_keys().first().copied();
        let wire_forms: Vec<Vec<Vec<u8>>> = self.commands.iter().map(|c| c.wire_tokens()).collect();

        let replies = {
            let protocol = dispatcher.protocol_for_key(routing_key)?;
            protocol.send_many(&wire_forms)?
        };

        let mut results = Vec::with_capacity(self.commands.len());
        for (cmd, reply) in self.commands.iter().zip(replies.into_iter()) {
            if let Some(server_err) = reply.as_server_error() {
                results.push(Err(server_err));
                continue;
            }
            let parsed = match cmd.parser_id {
                Some(id) => parsers::apply(id, reply)?,
                None => ParsedValue::Raw(reply),
            };
            results.push(Ok(parsed));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pipeline_executes_to_empty_result_without_touching_dispatcher() {
        let pipeline = Pipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.get_keys().len(), 0);
    }

    #[test]
    fn append_returns_builder_style_handle() {
        let mut pipeline = Pipeline::new();
        pipeline
            .append(CommandDescription::from_strs(&["PING"]))
            .append(CommandDescription::from_strs(&["PING"]));
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn get_keys_collects_only_commands_that_have_one() {
        let mut pipeline = Pipeline::new();
        pipeline.append(CommandDescription::from_strs(&["PING"]));
        pipeline.append(
            CommandDescription::from_strs(&["SET", "a", "1"]).with_keys(vec![b"a".to_vec()]),
        );
        assert_eq!(pipeline.get_keys(), vec![b"a".as_slice()]);
    }

    #[test]
    fn execute_keeps_an_in_band_error_in_its_own_slot_without_aborting_the_batch() {
        use std::io::{Read, Write};
        use std::net::{TcpListener, TcpStream};
        use std::thread;
        use std::time::Duration;

        use logger::logger::Logger;

        use crate::connection::Endpoint;
        use crate::resp::{Decoded, Decoder};

        fn read_one_command(stream: &mut TcpStream, buf: &mut Vec<u8>) {
            loop {
                match Decoder::decode(buf).unwrap() {
                    Decoded::Value(_, consumed) => {
                        buf.drain(..consumed);
                        return;
                    }
                    Decoded::NeedMore => {
                        let mut chunk = [0u8; 4096];
                        let n = stream.read(&mut chunk).expect("test server read");
                        assert!(n > 0, "peer closed before sending a full command");
                        buf.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = Endpoint::new(listener.local_addr().unwrap().to_string());
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            // SET a 1, INCR a, LPUSH a x all arrive as a single contiguous
            // write; reply to each in turn, the third one an in-band error.
            read_one_command(&mut stream, &mut buf);
            stream.write_all(b"+OK\r\n").unwrap();
            read_one_command(&mut stream, &mut buf);
            stream.write_all(b":2\r\n").unwrap();
            read_one_command(&mut stream, &mut buf);
            stream
                .write_all(b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n")
                .unwrap();
        });

        let mut dispatcher = Dispatcher::new(endpoint, Duration::from_secs(2), Logger::null());
        let mut pipeline = Pipeline::new();
        pipeline
            .append(CommandDescription::from_strs(&["SET", "a", "1"]).with_keys(vec![b"a".to_vec()]))
            .append(CommandDescription::from_strs(&["INCR", "a"]).with_keys(vec![b"a".to_vec()]))
            .append(CommandDescription::from_strs(&["LPUSH", "a", "x"]).with_keys(vec![b"a".to_vec()]));

        let results = pipeline.execute(&mut dispatcher).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok(ParsedValue::Raw(crate::resp::Value::SimpleString(b"OK".to_vec()))));
        assert_eq!(results[1], Ok(ParsedValue::Raw(crate::resp::Value::Integer(2))));
        assert!(matches!(&results[2], Err(ServerError::WrongType(_))));

        server.join().unwrap();
    }
}
