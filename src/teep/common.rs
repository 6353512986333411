// SPDX-License-Identifier: Apache-2.0

use crate::errors::Error;
use ciborium::Value;

pub(crate) fn to_bstr(v: &Value, name: &str) -> Result<Vec<u8>, Error> {
    if let Value::Bytes(b) = v {
        Ok(b.clone())
    } else {
        Err(Error::MalformedMessage(format!(
            "{name} MUST be byte string"
        )))
    }
}

pub(crate) fn to_uint(v: &Value, name: &str) -> Result<u64, Error> {
    if let Value::Integer(i) = v {
        u64::try_from(*i).map_err(|_| {
            Error::MalformedMessage(format!("{name} MUST be unsigned integer"))
        })
    } else {
        Err(Error::MalformedMessage(format!(
            "{name} MUST be unsigned integer"
        )))
    }
}

/// Map keys and message type codes are integer labels on the wire.  A label
/// outside the i64 range cannot match any registered value, so it is reported
/// with the same error the per-label dispatch would produce.
pub(crate) fn to_label(v: &Value, name: &str) -> Result<i64, Error> {
    if let Value::Integer(i) = v {
        i64::try_from(*i)
            .map_err(|_| Error::UnrecognizedField(format!("{name}: label out of range")))
    } else {
        Err(Error::MalformedMessage(format!(
            "{name} MUST be integer label"
        )))
    }
}

pub(crate) fn to_map<'a>(v: &'a Value, name: &str) -> Result<&'a Vec<(Value, Value)>, Error> {
    v.as_map()
        .ok_or_else(|| Error::MalformedMessage(format!("{name} MUST be map")))
}

pub(crate) fn to_array<'a>(v: &'a Value, name: &str) -> Result<&'a Vec<Value>, Error> {
    v.as_array()
        .ok_or_else(|| Error::MalformedMessage(format!("{name} MUST be array")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bstr_type_mismatch() {
        let r = to_bstr(&Value::Integer(1.into()), "token");

        assert_eq!(
            r.unwrap_err(),
            Error::MalformedMessage("token MUST be byte string".to_string())
        );
    }

    #[test]
    fn uint_rejects_negative() {
        let r = to_uint(&Value::Integer((-1).into()), "seq");

        assert!(r.is_err());
    }

    #[test]
    fn label_out_of_i64_range() {
        let big = ciborium::value::Integer::from(u64::MAX);
        let r = to_label(&Value::Integer(big), "options");

        assert!(matches!(r, Err(Error::UnrecognizedField(_))));
    }
}
