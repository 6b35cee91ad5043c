// session-engine/src/encoding.rs
use sha2::{Digest, Sha256};

/// Encode a contract call into an opaque intent payload: a 4-byte
/// selector derived from the function name followed by the arguments,
/// NUL-separated, rendered as 0x-prefixed hex.
///
/// The anchor treats the payload as opaque bytes; this only guarantees
/// the encoding is deterministic so identical calls produce identical
/// intents.
pub fn encode_call(function: &str, args: &[&str]) -> String {
    let digest = Sha256::digest(function.as_bytes());

    let mut payload = Vec::with_capacity(4 + args.iter().map(|a| a.len() + 1).sum::<usize>());
    payload.extend_from_slice(&digest[..4]);
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            payload.push(0);
        }
        payload.extend_from_slice(arg.as_bytes());
    }

    format!("0x{}", hex::encode(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_deterministic() {
        let a = encode_call("contribute", &["5", "0xdead"]);
        let b = encode_call("contribute", &["5", "0xdead"]);
        assert_eq!(a, b);
        assert!(a.starts_with("0x"));
    }

    #[test]
    fn different_functions_get_different_selectors() {
        let join = encode_call("joinCircle", &[]);
        let contribute = encode_call("contribute", &[]);
        assert_ne!(join, contribute);
        // selector only, no arguments
        assert_eq!(join.len(), 2 + 8);
    }

    #[test]
    fn arguments_change_the_payload() {
        assert_ne!(
            encode_call("contribute", &["5"]),
            encode_call("contribute", &["6"])
        );
    }
}
