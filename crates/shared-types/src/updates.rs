//! # Updates
//!
//! The atom of state change: an object was created with a given class, or a
//! field of an object took a value. Responses carry updates as flat records
//! with reference-typed fields; they never embed other objects, so cyclic
//! object graphs cost nothing here.
//!
//! Updates carry the canonical total order used to serialize a response's
//! update set: by target object, class tags before field assignments, then
//! by field signature, then by the value's canonical encoding.

use crate::errors::MarshalError;
use crate::marshalling::{Marshallable, MarshalReader, MarshalWriter};
use crate::references::StorageReference;
use crate::signatures::FieldSignature;
use crate::values::StorageValue;
use std::cmp::Ordering;
use std::fmt;

/// One recorded effect of a transaction on a storage object.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Update {
    /// The creation update: tags a freshly allocated object with its class.
    /// Exactly one per object, in the response of its creating transaction.
    ClassTag {
        object: StorageReference,
        class: String,
    },
    /// Assignment of a value to a field of an object.
    Field {
        object: StorageReference,
        field: FieldSignature,
        value: StorageValue,
    },
}

const SEL_CLASS_TAG: u8 = 0;
const SEL_FIELD: u8 = 1;

impl Update {
    /// The object this update refers to.
    #[must_use]
    pub fn object(&self) -> &StorageReference {
        match self {
            Update::ClassTag { object, .. } | Update::Field { object, .. } => object,
        }
    }

    /// True for creation updates.
    #[must_use]
    pub fn is_class_tag(&self) -> bool {
        matches!(self, Update::ClassTag { .. })
    }

    /// The field signature, for field assignments.
    #[must_use]
    pub fn field(&self) -> Option<&FieldSignature> {
        match self {
            Update::Field { field, .. } => Some(field),
            Update::ClassTag { .. } => None,
        }
    }
}

impl PartialOrd for Update {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Update {
    fn cmp(&self, other: &Self) -> Ordering {
        self.object().cmp(other.object()).then_with(|| match (self, other) {
            (Update::ClassTag { class: a, .. }, Update::ClassTag { class: b, .. }) => a.cmp(b),
            (Update::ClassTag { .. }, Update::Field { .. }) => Ordering::Less,
            (Update::Field { .. }, Update::ClassTag { .. }) => Ordering::Greater,
            (
                Update::Field { field: fa, value: va, .. },
                Update::Field { field: fb, value: vb, .. },
            ) => fa
                .cmp(fb)
                .then_with(|| va.to_bytes().cmp(&vb.to_bytes())),
        })
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::ClassTag { object, class } => write!(f, "<{object} is a {class}>"),
            Update::Field { object, field, value } => {
                write!(f, "<{object}.{}={value}>", field.name)
            }
        }
    }
}

impl Marshallable for Update {
    fn marshal(&self, w: &mut MarshalWriter) {
        match self {
            Update::ClassTag { object, class } => {
                w.write_u8(SEL_CLASS_TAG);
                object.marshal(w);
                w.write_str(class);
            }
            Update::Field { object, field, value } => {
                w.write_u8(SEL_FIELD);
                object.marshal(w);
                field.marshal(w);
                value.marshal(w);
            }
        }
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        match r.read_u8()? {
            SEL_CLASS_TAG => Ok(Update::ClassTag {
                object: StorageReference::unmarshal(r)?,
                class: r.read_str()?,
            }),
            SEL_FIELD => Ok(Update::Field {
                object: StorageReference::unmarshal(r)?,
                field: FieldSignature::unmarshal(r)?,
                value: StorageValue::unmarshal(r)?,
            }),
            other => Err(MarshalError::UnknownSelector {
                context: "update",
                selector: other,
            }),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
