//! # Storage Values
//!
//! The tagged union of values a field can hold. Values have a canonical
//! byte encoding (one selector byte plus the payload) and a canonical total
//! order, so that sets of updates marshal identically on every replica.
//!
//! The two boolean constants take their own selectors, so a boolean needs a
//! single byte on the wire.

use crate::errors::MarshalError;
use crate::marshalling::{Marshallable, MarshalReader, MarshalWriter};
use crate::references::StorageReference;
use num_bigint::BigInt;
use std::cmp::Ordering;
use std::fmt;

/// A value held by a field of a storage object.
#[derive(Clone, Debug)]
pub enum StorageValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Char(char),
    Float(f32),
    Double(f64),
    BigInteger(BigInt),
    String(std::string::String),
    Null,
    /// An element of an enumeration: class name plus element name.
    Enum { class: std::string::String, element: std::string::String },
    /// A reference to another storage object.
    Reference(StorageReference),
}

mod value_selectors {
    pub const BOOLEAN_TRUE: u8 = 0;
    pub const BOOLEAN_FALSE: u8 = 1;
    pub const BYTE: u8 = 2;
    pub const SHORT: u8 = 3;
    pub const INT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const CHAR: u8 = 6;
    pub const FLOAT: u8 = 7;
    pub const DOUBLE: u8 = 8;
    pub const BIG_INTEGER: u8 = 9;
    pub const STRING: u8 = 10;
    pub const NULL: u8 = 11;
    pub const ENUM: u8 = 12;
    pub const REFERENCE: u8 = 13;
}

impl StorageValue {
    /// The selector byte that prefixes this value's encoding.
    #[must_use]
    pub fn selector(&self) -> u8 {
        use value_selectors as sel;
        match self {
            StorageValue::Boolean(true) => sel::BOOLEAN_TRUE,
            StorageValue::Boolean(false) => sel::BOOLEAN_FALSE,
            StorageValue::Byte(_) => sel::BYTE,
            StorageValue::Short(_) => sel::SHORT,
            StorageValue::Int(_) => sel::INT,
            StorageValue::Long(_) => sel::LONG,
            StorageValue::Char(_) => sel::CHAR,
            StorageValue::Float(_) => sel::FLOAT,
            StorageValue::Double(_) => sel::DOUBLE,
            StorageValue::BigInteger(_) => sel::BIG_INTEGER,
            StorageValue::String(_) => sel::STRING,
            StorageValue::Null => sel::NULL,
            StorageValue::Enum { .. } => sel::ENUM,
            StorageValue::Reference(_) => sel::REFERENCE,
        }
    }

    /// Rank used as the major key of the canonical order; boolean is one
    /// kind regardless of its two selectors.
    fn kind_rank(&self) -> u8 {
        match self {
            StorageValue::Boolean(_) => 0,
            StorageValue::Byte(_) => 1,
            StorageValue::Short(_) => 2,
            StorageValue::Int(_) => 3,
            StorageValue::Long(_) => 4,
            StorageValue::Char(_) => 5,
            StorageValue::Float(_) => 6,
            StorageValue::Double(_) => 7,
            StorageValue::BigInteger(_) => 8,
            StorageValue::String(_) => 9,
            StorageValue::Null => 10,
            StorageValue::Enum { .. } => 11,
            StorageValue::Reference(_) => 12,
        }
    }

    /// Convenience accessor for big-integer values.
    #[must_use]
    pub fn as_big_integer(&self) -> Option<&BigInt> {
        match self {
            StorageValue::BigInteger(v) => Some(v),
            _ => None,
        }
    }

    /// Convenience accessor for reference values.
    #[must_use]
    pub fn as_reference(&self) -> Option<&StorageReference> {
        match self {
            StorageValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Convenience accessor for string values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StorageValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for StorageValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for StorageValue {}

impl PartialOrd for StorageValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StorageValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use StorageValue::*;
        match (self, other) {
            (Boolean(a), Boolean(b)) => a.cmp(b),
            (Byte(a), Byte(b)) => a.cmp(b),
            (Short(a), Short(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Long(a), Long(b)) => a.cmp(b),
            (Char(a), Char(b)) => a.cmp(b),
            // Floats use the IEEE-754 total order so NaN sorts consistently.
            (Float(a), Float(b)) => a.total_cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (BigInteger(a), BigInteger(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Null, Null) => Ordering::Equal,
            (
                Enum { class: ca, element: ea },
                Enum { class: cb, element: eb },
            ) => ca.cmp(cb).then_with(|| ea.cmp(eb)),
            (Reference(a), Reference(b)) => a.cmp(b),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }
}

impl fmt::Display for StorageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageValue::Boolean(v) => write!(f, "{v}"),
            StorageValue::Byte(v) => write!(f, "{v}b"),
            StorageValue::Short(v) => write!(f, "{v}s"),
            StorageValue::Int(v) => write!(f, "{v}"),
            StorageValue::Long(v) => write!(f, "{v}L"),
            StorageValue::Char(v) => write!(f, "'{v}'"),
            StorageValue::Float(v) => write!(f, "{v}f"),
            StorageValue::Double(v) => write!(f, "{v}d"),
            StorageValue::BigInteger(v) => write!(f, "{v}"),
            StorageValue::String(v) => write!(f, "{v:?}"),
            StorageValue::Null => write!(f, "null"),
            StorageValue::Enum { class, element } => write!(f, "{class}.{element}"),
            StorageValue::Reference(r) => write!(f, "{r}"),
        }
    }
}

impl From<StorageReference> for StorageValue {
    fn from(r: StorageReference) -> Self {
        StorageValue::Reference(r)
    }
}

impl From<BigInt> for StorageValue {
    fn from(v: BigInt) -> Self {
        StorageValue::BigInteger(v)
    }
}

impl Marshallable for StorageValue {
    fn marshal(&self, w: &mut MarshalWriter) {
        w.write_u8(self.selector());
        match self {
            StorageValue::Boolean(_) | StorageValue::Null => {}
            StorageValue::Byte(v) => w.write_i8(*v),
            StorageValue::Short(v) => w.write_i16(*v),
            StorageValue::Int(v) => w.write_i32(*v),
            StorageValue::Long(v) => w.write_i64(*v),
            StorageValue::Char(v) => w.write_u32(*v as u32),
            StorageValue::Float(v) => w.write_f32(*v),
            StorageValue::Double(v) => w.write_f64(*v),
            StorageValue::BigInteger(v) => w.write_big_int(v),
            StorageValue::String(v) => w.write_str(v),
            StorageValue::Enum { class, element } => {
                w.write_str(class);
                w.write_str(element);
            }
            StorageValue::Reference(r) => r.marshal(w),
        }
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        use value_selectors as sel;
        let selector = r.read_u8()?;
        Ok(match selector {
            sel::BOOLEAN_TRUE => StorageValue::Boolean(true),
            sel::BOOLEAN_FALSE => StorageValue::Boolean(false),
            sel::BYTE => StorageValue::Byte(r.read_i8()?),
            sel::SHORT => StorageValue::Short(r.read_i16()?),
            sel::INT => StorageValue::Int(r.read_i32()?),
            sel::LONG => StorageValue::Long(r.read_i64()?),
            sel::CHAR => {
                let code = r.read_u32()?;
                StorageValue::Char(char::from_u32(code).ok_or(MarshalError::InvalidChar(code))?)
            }
            sel::FLOAT => StorageValue::Float(r.read_f32()?),
            sel::DOUBLE => StorageValue::Double(r.read_f64()?),
            sel::BIG_INTEGER => StorageValue::BigInteger(r.read_big_int()?),
            sel::STRING => StorageValue::String(r.read_str()?),
            sel::NULL => StorageValue::Null,
            sel::ENUM => StorageValue::Enum {
                class: r.read_str()?,
                element: r.read_str()?,
            },
            sel::REFERENCE => StorageValue::Reference(StorageReference::unmarshal(r)?),
            other => {
                return Err(MarshalError::UnknownSelector {
                    context: "storage value",
                    selector: other,
                })
            }
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::TransactionReference;

    fn sample_values() -> Vec<StorageValue> {
        vec![
            StorageValue::Boolean(true),
            StorageValue::Boolean(false),
            StorageValue::Byte(-5),
            StorageValue::Short(1000),
            StorageValue::Int(-123456),
            StorageValue::Long(1 << 40),
            StorageValue::Char('λ'),
            StorageValue::Float(1.5),
            StorageValue::Double(-2.25),
            StorageValue::BigInteger("123456789012345678901234567890".parse().unwrap()),
            StorageValue::String("ciao".to_string()),
            StorageValue::Null,
            StorageValue::Enum {
                class: "app.Color".to_string(),
                element: "RED".to_string(),
            },
            StorageValue::Reference(StorageReference::new(
                TransactionReference::new([9; 32]),
                2,
            )),
        ]
    }

    #[test]
    fn test_roundtrip_every_kind() {
        for v in sample_values() {
            let decoded = StorageValue::from_bytes(&v.to_bytes()).unwrap();
            assert_eq!(decoded, v, "roundtrip mismatch for {v}");
        }
    }

    #[test]
    fn test_boolean_encodes_in_one_byte() {
        assert_eq!(StorageValue::Boolean(true).to_bytes(), vec![0]);
        assert_eq!(StorageValue::Boolean(false).to_bytes(), vec![1]);
    }

    #[test]
    fn test_order_is_total_and_deterministic() {
        let mut values = sample_values();
        let mut reversed: Vec<_> = values.iter().cloned().rev().collect();
        values.sort();
        reversed.sort();
        assert_eq!(values, reversed);
    }

    #[test]
    fn test_nan_sorts_consistently() {
        let a = StorageValue::Double(f64::NAN);
        let b = StorageValue::Double(1.0);
        // The total order puts the positive NaN pattern after ordinary values.
        assert_eq!(a.cmp(&b), std::cmp::Ordering::Greater);
        assert_eq!(a.cmp(&a), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_unknown_selector_rejected() {
        assert!(matches!(
            StorageValue::from_bytes(&[200]),
            Err(MarshalError::UnknownSelector { .. })
        ));
    }
}
