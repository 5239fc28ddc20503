//! La "command description": el registro que el resto del crate usa
//! para hablar de un comando sin saber nada de su tipado especifico.
//!
//! Un cliente Redis tradicional expone cientos de metodos tipados
//! (`SET`, `HGET`, ...) que no son mas que un nombre de comando fijo mas
//! argumentos del llamador. Ese surtido se colapsa aca en una unica
//! tabla consumida por el nucleo: cada metodo tipado arma un
//! `CommandDescription` y se lo pasa al `Dispatcher`.

use crate::parsers::ParserId;

/// Un parametro de comando: o bien un token unico, o una lista de
/// tokens que debe separarse (splice) en el orden dado. Sirve para
/// comandos variadicos como `MSET k1 v1 k2 v2` armados a partir de un
/// `Vec<(String, String)>` sin que el llamador tenga que aplanarlo a
/// mano.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Single(Vec<u8>),
    Many(Vec<Vec<u8>>),
}

impl Param {
    pub fn single(bytes: impl Into<Vec<u8>>) -> Param {
        Param::Single(bytes.into())
    }

    pub fn many(items: impl IntoIterator<Item = Vec<u8>>) -> Param {
        Param::Many(items.into_iter().collect())
    }
}

/// Descripcion de un comando: los tokens fijos, las keys usadas para
/// enrutamiento en modo cluster, los parametros a aplanar, y el id del
/// parser que debe aplicarse a la respuesta.
///
/// Invariante: la forma de wire es `tokens` seguido de `params`
/// aplanados en orden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescription {
    pub tokens: Vec<Vec<u8>>,
    pub keys: Vec<Vec<u8>>,
    pub params: Vec<Param>,
    pub parser_id: Option<ParserId>,
}

impl CommandDescription {
    pub fn new(tokens: Vec<Vec<u8>>) -> CommandDescription {
        CommandDescription {
            tokens,
            keys: Vec::new(),
            params: Vec::new(),
            parser_id: None,
        }
    }

    /// Construye una descripcion a partir de tokens en texto, conveniente
    /// para comandos armados a mano o para el REPL.
    pub fn from_strs(tokens: &[&str]) -> CommandDescription {
        CommandDescription::new(tokens.iter().map(|t| t.as_bytes().to_vec()).collect())
    }

    pub fn with_keys(mut self, keys: Vec<Vec<u8>>) -> CommandDescription {
        self.keys = keys;
        self
    }

    pub fn with_params(mut self, params: Vec<Param>) -> CommandDescription {
        self.params = params;
        self
    }

    pub fn with_parser(mut self, parser_id: ParserId) -> CommandDescription {
        self.parser_id = Some(parser_id);
        self
    }

    /// La primera key, usada para decidir a que slot/endpoint enrutar.
    pub fn first_key(&self) -> Option<&[u8]> {
        self.keys.first().map(|k| k.as_slice())
    }

    /// La forma de wire completa: `tokens` seguido de `params`
    /// aplanados en orden.
    pub fn wire_tokens(&self) -> Vec<Vec<u8>> {
        let mut out = self.tokens.clone();
        for param in &self.params {
            match param {
                Param::Single(bytes) => out.push(bytes.clone()),
                Param::Many(items) => out.extend(items.iter().cloned()),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tokens_splices_many_params_in_order() {
        let cmd = CommandDescription::from_strs(&["MSET"]).with_params(vec![Param::many([
            b"k1".to_vec(),
            b"v1".to_vec(),
            b"k2".to_vec(),
            b"v2".to_vec(),
        ])]);
        assert_eq!(
            cmd.wire_tokens(),
            vec![
                b"MSET".to_vec(),
                b"k1".to_vec(),
                b"v1".to_vec(),
                b"k2".to_vec(),
                b"v2".to_vec(),
            ]
        );
    }

    #[test]
    fn first_key_is_none_when_no_keys() {
        let cmd = CommandDescription::from_strs(&["PING"]);
        assert_eq!(cmd.first_key(), None);
    }
}
