//! Payload byte-size estimation.
//!
//! Strings are measured as UTF-8 directly. Everything else is measured as its
//! compact JSON encoding. A value that cannot be serialized counts as 0 bytes;
//! estimation must never abort message delivery.

use crate::socket::Payload;
use serde::Serialize;
use serde_json::Value;
use std::io;
use tracing::trace;

/// `io::Write` sink that only counts bytes.
#[derive(Default)]
struct ByteCounter(u64);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Estimate the byte size of any serializable value.
pub fn estimate<T: Serialize + ?Sized>(value: &T) -> u64 {
    match serde_json::to_value(value) {
        Ok(v) => value_len(&v),
        Err(e) => {
            trace!(error = %e, "Payload not serializable, counting 0 bytes");
            0
        }
    }
}

/// Size of an already-converted value: a string by its UTF-8 length,
/// anything else by its JSON encoding.
pub fn value_len(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.len() as u64,
        v => json_len(v),
    }
}

/// Length of the compact JSON encoding of `value`, without allocating it.
pub fn json_len(value: &Value) -> u64 {
    let mut counter = ByteCounter::default();
    match serde_json::to_writer(&mut counter, value) {
        Ok(()) => counter.0,
        Err(e) => {
            trace!(error = %e, "JSON encoding failed, counting 0 bytes");
            0
        }
    }
}

/// Total estimated size of an argument list.
pub fn args_size(args: &[Payload]) -> u64 {
    args.iter().map(Payload::byte_size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde_json::json;
    use std::collections::HashMap;

    /// Stand-in for a value that refuses to serialize, e.g. a cyclic graph.
    struct Cyclic;

    impl Serialize for Cyclic {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cycle detected"))
        }
    }

    #[test]
    fn strings_are_measured_directly() {
        assert_eq!(estimate("hi"), 2);
        assert_eq!(estimate(&"ünïcode".to_string()), 9);
        assert_eq!(estimate(""), 0);
    }

    #[test]
    fn structured_values_use_compact_json() {
        assert_eq!(estimate(&json!({"a": 1})), 7);
        assert_eq!(estimate(&vec![1, 2, 3]), 7);
        assert_eq!(estimate(&42), 2);
        assert_eq!(estimate(&Option::<u8>::None), 4);
    }

    #[test]
    fn unserializable_values_count_zero() {
        assert_eq!(estimate(&Cyclic), 0);

        let mut tuple_keys = HashMap::new();
        tuple_keys.insert((1u8, 2u8), "x");
        assert_eq!(estimate(&tuple_keys), 0);
    }

    #[test]
    fn value_len_matches_estimate() {
        assert_eq!(value_len(&json!("ünïcode")), 9);
        assert_eq!(value_len(&json!({"a": 1})), estimate(&json!({"a": 1})));
        assert_eq!(Payload::Json(json!("hi")).byte_size(), Payload::from("hi").byte_size());
    }

    #[test]
    fn args_are_summed() {
        let args = vec![Payload::from("hi"), Payload::from(json!({"a": 1}))];
        assert_eq!(args_size(&args), 9);
        assert_eq!(args_size(&[]), 0);
    }
}
