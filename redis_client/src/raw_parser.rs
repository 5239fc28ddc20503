//! Tokenizador de una linea de comando escrita a mano (como la que un
//! usuario tipea en el REPL del `cli`), con reglas de comillas y
//! escape.
//!
//! Reglas:
//! - El delimitador es espacio en blanco sin comillas; varios espacios
//!   seguidos colapsan en uno.
//! - Un tramo entre comillas dobles preserva los espacios internos y se
//!   abre/cierra con una comilla sin escapar.
//! - Una comilla precedida de `\` dentro de un tramo entre comillas es
//!   una comilla literal y no cierra el tramo.
//! - Terminada la tokenizacion, cada `\"` del resultado ya quedo
//!   reemplazado por `"` (se hace en el mismo pasada, no en un segundo
//!   paso).
//! - No se emiten tokens vacios, salvo que los produzca un tramo `""`
//!   explicito.
//! - El fin de la entrada vuelca cualquier token pendiente, incluso si
//!   las comillas quedaron desbalanceadas.

/// Tokeniza `line` en una lista de tokens de texto.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut have_token = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '\\' && chars.peek() == Some(&'"') {
                current.push('"');
                chars.next();
                continue;
            }
            if ch == '"' {
                in_quotes = false;
                continue;
            }
            current.push(ch);
            continue;
        }

        if ch == '\\' && chars.peek() == Some(&'"') {
            current.push('"');
            chars.next();
            have_token = true;
            continue;
        }

        if ch == '"' {
            in_quotes = true;
            have_token = true;
            continue;
        }

        if ch.is_whitespace() {
            if have_token {
                tokens.push(std::mem::take(&mut current));
                have_token = false;
            }
            continue;
        }

        current.push(ch);
        have_token = true;
    }

    if have_token || in_quotes {
        tokens.push(current);
    }

    tokens
}

/// Tokeniza una linea y convierte cada token a bytes, lista para
/// construir un `CommandDescription`.
pub fn tokenize_to_bytes(line: &str) -> Vec<Vec<u8>> {
    tokenize(line).into_iter().map(String::into_bytes).collect()
}

/// Re-emite una lista de tokens como una linea: los que contienen
/// espacio se vuelven a entrecomillar. Usado solo para verificar que
/// `tokenize` es idempotente bajo re-emision; no es parte de la
/// superficie publica del crate.
#[cfg(test)]
fn requote(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| {
            if t.contains(' ') || t.is_empty() {
                format!("\"{}\"", t.replace('"', "\\\""))
            } else {
                t.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
