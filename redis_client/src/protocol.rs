//! Empareja el codec (`resp`) con una `Connection` y expone las tres
//! operaciones de mas alto nivel que necesita el resto del crate:
//! mandar un comando y esperar una respuesta, mandar muchos comandos y
//! esperar todas las respuestas en orden, y suscribirse a un canal.

use crate::connection::{Connection, Endpoint};
use crate::error::RedisCoreError;
use crate::resp::{Decoded, Decoder, Value};
use logger::logger::Logger;

const MODULE: &str = "protocol";

/// Estado de handshake de una sesion de `Protocol`: `Fresh ->
/// Authenticated -> DbSelected -> Ready`, con `Ready -> ClusterPrimed` en
/// modo cluster. Cualquier error de transporte hace caer el estado a
/// `Fresh`; el proximo uso repite el handshake desde cero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Fresh,
    Authenticated,
    DbSelected,
    Ready,
    ClusterPrimed,
}

pub struct Protocol {
    connection: Connection,
    state: SessionState,
    logger: Logger,
}

impl Protocol {
    pub fn new(connection: Connection, logger: Logger) -> Protocol {
        Protocol {
            connection,
            state: SessionState::Fresh,
            logger,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.connection.endpoint()
    }

    pub fn session_state(&self) -> SessionState {
        self.state
    }

    pub fn set_session_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Codifica un comando, lo escribe, y decodifica respuestas hasta
    /// tener exactamente un `Value` completo.
    pub fn send(&mut self, tokens: &[Vec<u8>]) -> Result<Value, RedisCoreError> {
        let wire = crate::resp::encode(tokens);
        self.write_and_write_err(&wire)?;
        self.read_one_value()
    }

    /// Codifica y escribe todos los comandos como un unico buffer
    /// contiguo (pipelining), despues decodifica exactamente
    /// `commands.len()` valores en orden de llegada. Redis garantiza que
    /// las respuestas vuelven en el mismo orden en que se mandaron los
    /// comandos sobre una misma conexion.
    pub fn send_many(&mut self, commands: &[Vec<Vec<u8>>]) -> Result<Vec<Value>, RedisCoreError> {
        let mut wire = Vec::new();
        for tokens in commands {
            wire.extend_from_slice(&crate::resp::encode(tokens));
        }
        self.write_and_write_err(&wire)?;

        let mut values = Vec::with_capacity(commands.len());
        for _ in 0..commands.len() {
            values.push(self.read_one_value()?);
        }
        Ok(values)
    }

    /// Manda `command` una vez, despues entra en un loop decodificando
    /// respuestas e invocando `callback` con cada una. Sale cuando
    /// `callback` devuelve `false` ("stop"); en ese momento manda
    /// `UNSUBSCRIBE` y consume su respuesta antes de devolver el
    /// control.
    pub fn subscribe<F>(&mut self, command: &[Vec<u8>], mut callback: F) -> Result<(), RedisCoreError>
    where
        F: FnMut(Value) -> bool,
    {
        self.logger.info("subscribe loop starting", MODULE);
        self.send_fire_and_forget(command)?;
        loop {
            let value = self.read_one_value()?;
            if !callback(value) {
                break;
            }
        }
        self.send_fire_and_forget(&[b"UNSUBSCRIBE".to_vec()])?;
        let _ = self.read_one_value()?;
        self.logger.info("subscribe loop stopped", MODULE);
        Ok(())
    }

    fn send_fire_and_forget(&mut self, tokens: &[Vec<u8>]) -> Result<(), RedisCoreError> {
        let wire = crate::resp::encode(tokens);
        self.write_and_write_err(&wire)
    }

    fn write_and_write_err(&mut self, wire: &[u8]) -> Result<(), RedisCoreError> {
        self.connection.write_all(wire)
    }

    /// Decodifica repetidamente el buffer de la conexion hasta obtener
    /// un unico `Value`, leyendo mas bytes del socket cada vez que el
    /// decoder devuelve `NeedMore`.
    fn read_one_value(&mut self) -> Result<Value, RedisCoreError> {
        loop {
            match Decoder::decode(self.connection.read_buf())? {
                Decoded::Value(value, consumed) => {
                    self.connection.consume(consumed);
                    return Ok(value);
                }
                Decoded::NeedMore => {
                    self.connection.read_some()?;
                }
            }
        }
    }
}

impl std::fmt::Debug for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("endpoint", &self.connection.endpoint())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

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

    fn bind_loopback() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = Endpoint::new(listener.local_addr().unwrap().to_string());
        (listener, endpoint)
    }

    fn protocol_for(endpoint: Endpoint) -> Protocol {
        let connection = Connection::new(endpoint, Duration::from_secs(2), Logger::null());
        Protocol::new(connection, Logger::null())
    }

    #[test]
    fn send_round_trips_a_single_command_over_a_real_socket() {
        let (listener, endpoint) = bind_loopback();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            read_one_command(&mut stream, &mut buf);
            stream.write_all(b"+PONG\r\n").unwrap();
        });

        let mut protocol = protocol_for(endpoint);
        let reply = protocol.send(&[b"PING".to_vec()]).unwrap();
        assert_eq!(reply, Value::SimpleString(b"PONG".to_vec()));

        server.join().unwrap();
    }

    #[test]
    fn send_many_decodes_replies_in_the_same_order_commands_were_sent() {
        let (listener, endpoint) = bind_loopback();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            read_one_command(&mut stream, &mut buf);
            stream.write_all(b"+OK\r\n").unwrap();
            read_one_command(&mut stream, &mut buf);
            stream.write_all(b":2\r\n").unwrap();
            read_one_command(&mut stream, &mut buf);
            stream.write_all(b"$3\r\nbar\r\n").unwrap();
        });

        let mut protocol = protocol_for(endpoint);
        let commands = vec![
            vec![b"SET".to_vec(), b"a".to_vec(), b"1".to_vec()],
            vec![b"INCR".to_vec(), b"a".to_vec()],
            vec![b"GET".to_vec(), b"b".to_vec()],
        ];
        let replies = protocol.send_many(&commands).unwrap();
        assert_eq!(
            replies,
            vec![
                Value::SimpleString(b"OK".to_vec()),
                Value::Integer(2),
                Value::BulkString(b"bar".to_vec()),
            ]
        );

        server.join().unwrap();
    }

    #[test]
    fn subscribe_delivers_pushes_until_callback_stops_then_unsubscribes() {
        let (listener, endpoint) = bind_loopback();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            read_one_command(&mut stream, &mut buf); // SUBSCRIBE chan
            stream.write_all(b"+msg1\r\n").unwrap();
            stream.write_all(b"+msg2\r\n").unwrap();
            read_one_command(&mut stream, &mut buf); // UNSUBSCRIBE
            stream.write_all(b"+OK\r\n").unwrap();
        });

        let mut protocol = protocol_for(endpoint);
        let mut received = Vec::new();
        protocol
            .subscribe(&[b"SUBSCRIBE".to_vec(), b"chan".to_vec()], |value| {
                received.push(value);
                received.len() < 2
            })
            .unwrap();

        assert_eq!(
            received,
            vec![
                Value::SimpleString(b"msg1".to_vec()),
                Value::SimpleString(b"msg2".to_vec()),
            ]
        );

        server.join().unwrap();
    }
}
