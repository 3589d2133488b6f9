//! # Type and Member Signatures
//!
//! Names of the things contract code declares: storage types, fields,
//! constructors and methods. Signatures compare equal on all of their
//! components and carry a total order so that update sets sort
//! deterministically.

use crate::errors::MarshalError;
use crate::marshalling::{Marshallable, MarshalReader, MarshalWriter};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// STORAGE TYPE
// =============================================================================

/// The declared type of a field, formal parameter or return value.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum StorageType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Char,
    Float,
    Double,
    BigInteger,
    String,
    /// A class of the installed code, by fully-qualified name.
    Class(std::string::String),
}

mod type_selectors {
    pub const BOOLEAN: u8 = 0;
    pub const BYTE: u8 = 1;
    pub const SHORT: u8 = 2;
    pub const INT: u8 = 3;
    pub const LONG: u8 = 4;
    pub const CHAR: u8 = 5;
    pub const FLOAT: u8 = 6;
    pub const DOUBLE: u8 = 7;
    pub const BIG_INTEGER: u8 = 8;
    pub const STRING: u8 = 9;
    pub const CLASS: u8 = 10;
}

impl StorageType {
    /// The selector byte that prefixes this type's encoding.
    #[must_use]
    pub fn selector(&self) -> u8 {
        use type_selectors as sel;
        match self {
            StorageType::Boolean => sel::BOOLEAN,
            StorageType::Byte => sel::BYTE,
            StorageType::Short => sel::SHORT,
            StorageType::Int => sel::INT,
            StorageType::Long => sel::LONG,
            StorageType::Char => sel::CHAR,
            StorageType::Float => sel::FLOAT,
            StorageType::Double => sel::DOUBLE,
            StorageType::BigInteger => sel::BIG_INTEGER,
            StorageType::String => sel::STRING,
            StorageType::Class(_) => sel::CLASS,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Class(name) => write!(f, "{name}"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

impl Marshallable for StorageType {
    fn marshal(&self, w: &mut MarshalWriter) {
        w.write_u8(self.selector());
        if let StorageType::Class(name) = self {
            w.write_str(name);
        }
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        use type_selectors as sel;
        let selector = r.read_u8()?;
        Ok(match selector {
            sel::BOOLEAN => StorageType::Boolean,
            sel::BYTE => StorageType::Byte,
            sel::SHORT => StorageType::Short,
            sel::INT => StorageType::Int,
            sel::LONG => StorageType::Long,
            sel::CHAR => StorageType::Char,
            sel::FLOAT => StorageType::Float,
            sel::DOUBLE => StorageType::Double,
            sel::BIG_INTEGER => StorageType::BigInteger,
            sel::STRING => StorageType::String,
            sel::CLASS => StorageType::Class(r.read_str()?),
            other => {
                return Err(MarshalError::UnknownSelector {
                    context: "storage type",
                    selector: other,
                })
            }
        })
    }
}

// =============================================================================
// FIELD SIGNATURE
// =============================================================================

/// Identity of a field: defining class, field name and declared type.
/// Two signatures compare equal on all three components.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct FieldSignature {
    /// Fully-qualified name of the class declaring the field.
    pub definer: String,
    /// The field's name inside its class.
    pub name: String,
    /// The field's declared type.
    pub ty: StorageType,
}

impl FieldSignature {
    #[must_use]
    pub fn new(definer: impl Into<String>, name: impl Into<String>, ty: StorageType) -> Self {
        Self {
            definer: definer.into(),
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for FieldSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.definer, self.name, self.ty)
    }
}

impl Marshallable for FieldSignature {
    fn marshal(&self, w: &mut MarshalWriter) {
        w.write_str(&self.definer);
        w.write_str(&self.name);
        self.ty.marshal(w);
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            definer: r.read_str()?,
            name: r.read_str()?,
            ty: StorageType::unmarshal(r)?,
        })
    }
}

// =============================================================================
// CONSTRUCTOR AND METHOD SIGNATURES
// =============================================================================

/// Identity of a constructor: defining class and formal parameter types.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ConstructorSignature {
    /// Fully-qualified name of the instantiated class.
    pub definer: String,
    /// Declared types of the formal parameters, in order.
    pub formals: Vec<StorageType>,
}

impl ConstructorSignature {
    #[must_use]
    pub fn new(definer: impl Into<String>, formals: Vec<StorageType>) -> Self {
        Self {
            definer: definer.into(),
            formals,
        }
    }
}

impl Marshallable for ConstructorSignature {
    fn marshal(&self, w: &mut MarshalWriter) {
        w.write_str(&self.definer);
        w.write_array(&self.formals);
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            definer: r.read_str()?,
            formals: r.read_array()?,
        })
    }
}

/// Identity of a method: defining class, name, formal parameter types and
/// optional return type (`None` for void).
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Fully-qualified name of the class declaring the method.
    pub definer: String,
    /// The method's name.
    pub name: String,
    /// Declared types of the formal parameters, in order.
    pub formals: Vec<StorageType>,
    /// Declared return type; `None` for void methods.
    pub returns: Option<StorageType>,
}

impl MethodSignature {
    #[must_use]
    pub fn new(
        definer: impl Into<String>,
        name: impl Into<String>,
        formals: Vec<StorageType>,
        returns: Option<StorageType>,
    ) -> Self {
        Self {
            definer: definer.into(),
            name: name.into(),
            formals,
            returns,
        }
    }

    /// True if the method declares no return value.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.returns.is_none()
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.definer, self.name, self.formals.len())
    }
}

impl Marshallable for MethodSignature {
    fn marshal(&self, w: &mut MarshalWriter) {
        w.write_str(&self.definer);
        w.write_str(&self.name);
        w.write_array(&self.formals);
        match &self.returns {
            None => w.write_u8(0),
            Some(ty) => {
                w.write_u8(1);
                ty.marshal(w);
            }
        }
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        let definer = r.read_str()?;
        let name = r.read_str()?;
        let formals = r.read_array()?;
        let returns = match r.read_u8()? {
            0 => None,
            1 => Some(StorageType::unmarshal(r)?),
            other => {
                return Err(MarshalError::UnknownSelector {
                    context: "method return flag",
                    selector: other,
                })
            }
        };
        Ok(Self {
            definer,
            name,
            formals,
            returns,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
