//! # Transaction Responses
//!
//! What delivering a request produced: the ordered set of updates, the
//! event references in emission order, and the gas split over its three
//! buckets. Failed variants additionally carry the penalty (the gas that
//! was charged but neither consumed nor refunded) and the cause.
//!
//! ## Wire layout
//!
//! `[selector][updates array][events array][gasCPU][gasRAM][gasStorage]
//! [per-variant additions]`
//!
//! One selector quirk is kept for compatibility: a successful void method
//! call encodes with selector 12, or 16 when its events list is empty.

use crate::errors::MarshalError;
use crate::marshalling::{Marshallable, MarshalReader, MarshalWriter};
use crate::references::{StorageReference, TransactionReference};
use crate::updates::Update;
use crate::values::StorageValue;
use std::fmt;

// =============================================================================
// GAS COUNTERS
// =============================================================================

/// Gas consumed by a delivered request, split by resource.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct GasCounts {
    /// Units charged for computation.
    pub cpu: u64,
    /// Units charged for memory allocation.
    pub ram: u64,
    /// Units charged for bytes written to the store.
    pub storage: u64,
}

impl GasCounts {
    /// No gas consumed; what initial responses report.
    pub const ZERO: Self = Self { cpu: 0, ram: 0, storage: 0 };

    /// Sum of the three buckets.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.cpu + self.ram + self.storage
    }
}

impl Marshallable for GasCounts {
    fn marshal(&self, w: &mut MarshalWriter) {
        w.write_u64(self.cpu);
        w.write_u64(self.ram);
        w.write_u64(self.storage);
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            cpu: r.read_u64()?,
            ram: r.read_u64()?,
            storage: r.read_u64()?,
        })
    }
}

// =============================================================================
// FAILURE CAUSE
// =============================================================================

/// Why a delivered request failed after gas was charged.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FailureCause {
    /// The gas limit was exhausted during execution.
    OutOfGas,
    /// The code called something outside the allowed surface.
    WhitelistViolation(String),
    /// The code performed a non-deterministic operation.
    DeterminismViolation(String),
    /// A view call produced updates beyond caller bookkeeping.
    ViewViolation(String),
    /// Any other executor abort.
    Internal(String),
}

const CAUSE_OUT_OF_GAS: u8 = 0;
const CAUSE_WHITELIST: u8 = 1;
const CAUSE_DETERMINISM: u8 = 2;
const CAUSE_VIEW: u8 = 3;
const CAUSE_INTERNAL: u8 = 4;

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::OutOfGas => write!(f, "out of gas"),
            FailureCause::WhitelistViolation(what) => write!(f, "non-whitelisted call: {what}"),
            FailureCause::DeterminismViolation(what) => {
                write!(f, "non-deterministic operation: {what}")
            }
            FailureCause::ViewViolation(what) => write!(f, "view method updated state: {what}"),
            FailureCause::Internal(what) => write!(f, "execution failure: {what}"),
        }
    }
}

impl Marshallable for FailureCause {
    fn marshal(&self, w: &mut MarshalWriter) {
        match self {
            FailureCause::OutOfGas => w.write_u8(CAUSE_OUT_OF_GAS),
            FailureCause::WhitelistViolation(s) => {
                w.write_u8(CAUSE_WHITELIST);
                w.write_str(s);
            }
            FailureCause::DeterminismViolation(s) => {
                w.write_u8(CAUSE_DETERMINISM);
                w.write_str(s);
            }
            FailureCause::ViewViolation(s) => {
                w.write_u8(CAUSE_VIEW);
                w.write_str(s);
            }
            FailureCause::Internal(s) => {
                w.write_u8(CAUSE_INTERNAL);
                w.write_str(s);
            }
        }
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        Ok(match r.read_u8()? {
            CAUSE_OUT_OF_GAS => FailureCause::OutOfGas,
            CAUSE_WHITELIST => FailureCause::WhitelistViolation(r.read_str()?),
            CAUSE_DETERMINISM => FailureCause::DeterminismViolation(r.read_str()?),
            CAUSE_VIEW => FailureCause::ViewViolation(r.read_str()?),
            CAUSE_INTERNAL => FailureCause::Internal(r.read_str()?),
            other => {
                return Err(MarshalError::UnknownSelector {
                    context: "failure cause",
                    selector: other,
                })
            }
        })
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

/// Stable selector bytes for the response variants.
pub mod response_selectors {
    pub const GAMETE_CREATED: u8 = 0;
    pub const INITIALIZED: u8 = 1;
    pub const INSTALL_CODE_SUCCESSFUL: u8 = 2;
    pub const INSTALL_CODE_FAILED: u8 = 3;
    pub const CONSTRUCTOR_SUCCESSFUL: u8 = 4;
    pub const CONSTRUCTOR_EXCEPTION: u8 = 5;
    pub const CONSTRUCTOR_FAILED: u8 = 6;
    pub const METHOD_SUCCESSFUL: u8 = 11;
    pub const METHOD_SUCCESSFUL_VOID: u8 = 12;
    pub const METHOD_EXCEPTION: u8 = 13;
    pub const METHOD_FAILED: u8 = 14;
    /// Void method success with an empty events list.
    pub const METHOD_SUCCESSFUL_VOID_NO_EVENTS: u8 = 16;
}

/// The immutable outcome of a delivered request.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Response {
    /// The gamete exists; its reference is `gamete`.
    GameteCreated {
        gamete: StorageReference,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCounts,
    },

    /// The manifest pointer is set; the initial phase is closed.
    Initialized {
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCounts,
    },

    /// The module was verified and stored; this transaction's reference is
    /// now a valid classpath.
    InstallCodeSuccessful {
        /// The instrumented module bytes actually stored.
        module: Vec<u8>,
        dependencies: Vec<TransactionReference>,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCounts,
    },

    /// The module was rejected after gas was charged.
    InstallCodeFailed {
        cause: FailureCause,
        penalty: u64,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCounts,
    },

    /// The constructor ran to completion; `new_object` is the instance.
    ConstructorSuccessful {
        new_object: StorageReference,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCounts,
    },

    /// The constructor was reached and threw.
    ConstructorException {
        exception_class: String,
        message: String,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCounts,
    },

    /// The constructor call failed after gas was charged.
    ConstructorFailed {
        cause: FailureCause,
        penalty: u64,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCounts,
    },

    /// The method ran to completion. `result` is `None` for void methods.
    MethodSuccessful {
        result: Option<StorageValue>,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCounts,
    },

    /// The method was reached and threw.
    MethodException {
        exception_class: String,
        message: String,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCounts,
    },

    /// The method call failed after gas was charged.
    MethodFailed {
        cause: FailureCause,
        penalty: u64,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCounts,
    },
}

impl Response {
    /// The selector byte that prefixes this response's encoding.
    #[must_use]
    pub fn selector(&self) -> u8 {
        use response_selectors as sel;
        match self {
            Response::GameteCreated { .. } => sel::GAMETE_CREATED,
            Response::Initialized { .. } => sel::INITIALIZED,
            Response::InstallCodeSuccessful { .. } => sel::INSTALL_CODE_SUCCESSFUL,
            Response::InstallCodeFailed { .. } => sel::INSTALL_CODE_FAILED,
            Response::ConstructorSuccessful { .. } => sel::CONSTRUCTOR_SUCCESSFUL,
            Response::ConstructorException { .. } => sel::CONSTRUCTOR_EXCEPTION,
            Response::ConstructorFailed { .. } => sel::CONSTRUCTOR_FAILED,
            Response::MethodSuccessful { result: Some(_), .. } => sel::METHOD_SUCCESSFUL,
            Response::MethodSuccessful { result: None, events, .. } => {
                if events.is_empty() {
                    sel::METHOD_SUCCESSFUL_VOID_NO_EVENTS
                } else {
                    sel::METHOD_SUCCESSFUL_VOID
                }
            }
            Response::MethodException { .. } => sel::METHOD_EXCEPTION,
            Response::MethodFailed { .. } => sel::METHOD_FAILED,
        }
    }

    /// The ordered updates carried by this response.
    #[must_use]
    pub fn updates(&self) -> &[Update] {
        match self {
            Response::GameteCreated { updates, .. }
            | Response::Initialized { updates, .. }
            | Response::InstallCodeSuccessful { updates, .. }
            | Response::InstallCodeFailed { updates, .. }
            | Response::ConstructorSuccessful { updates, .. }
            | Response::ConstructorException { updates, .. }
            | Response::ConstructorFailed { updates, .. }
            | Response::MethodSuccessful { updates, .. }
            | Response::MethodException { updates, .. }
            | Response::MethodFailed { updates, .. } => updates,
        }
    }

    /// The event references, in emission order.
    #[must_use]
    pub fn events(&self) -> &[StorageReference] {
        match self {
            Response::GameteCreated { events, .. }
            | Response::Initialized { events, .. }
            | Response::InstallCodeSuccessful { events, .. }
            | Response::InstallCodeFailed { events, .. }
            | Response::ConstructorSuccessful { events, .. }
            | Response::ConstructorException { events, .. }
            | Response::ConstructorFailed { events, .. }
            | Response::MethodSuccessful { events, .. }
            | Response::MethodException { events, .. }
            | Response::MethodFailed { events, .. } => events,
        }
    }

    /// The gas consumed, by bucket.
    #[must_use]
    pub fn gas(&self) -> GasCounts {
        match self {
            Response::GameteCreated { gas, .. }
            | Response::Initialized { gas, .. }
            | Response::InstallCodeSuccessful { gas, .. }
            | Response::InstallCodeFailed { gas, .. }
            | Response::ConstructorSuccessful { gas, .. }
            | Response::ConstructorException { gas, .. }
            | Response::ConstructorFailed { gas, .. }
            | Response::MethodSuccessful { gas, .. }
            | Response::MethodException { gas, .. }
            | Response::MethodFailed { gas, .. } => *gas,
        }
    }

    /// The unrefunded gas, non-zero only in failed variants.
    #[must_use]
    pub fn penalty(&self) -> u64 {
        match self {
            Response::InstallCodeFailed { penalty, .. }
            | Response::ConstructorFailed { penalty, .. }
            | Response::MethodFailed { penalty, .. } => *penalty,
            _ => 0,
        }
    }

    /// True for the failed variants.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            Response::InstallCodeFailed { .. }
                | Response::ConstructorFailed { .. }
                | Response::MethodFailed { .. }
        )
    }

    /// True for the in-user-code exception variants.
    #[must_use]
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Response::ConstructorException { .. } | Response::MethodException { .. }
        )
    }
}

impl Marshallable for Response {
    fn marshal(&self, w: &mut MarshalWriter) {
        use Response::*;
        w.write_u8(self.selector());
        w.write_array(self.updates());
        w.write_array(self.events());
        self.gas().marshal(w);
        match self {
            GameteCreated { gamete, .. } => gamete.marshal(w),
            Initialized { .. } => {}
            InstallCodeSuccessful { module, dependencies, .. } => {
                w.write_bytes(module);
                w.write_array(dependencies);
            }
            InstallCodeFailed { cause, penalty, .. }
            | ConstructorFailed { cause, penalty, .. }
            | MethodFailed { cause, penalty, .. } => {
                cause.marshal(w);
                w.write_u64(*penalty);
            }
            ConstructorSuccessful { new_object, .. } => new_object.marshal(w),
            ConstructorException { exception_class, message, .. }
            | MethodException { exception_class, message, .. } => {
                w.write_str(exception_class);
                w.write_str(message);
            }
            MethodSuccessful { result, .. } => {
                if let Some(value) = result {
                    value.marshal(w);
                }
            }
        }
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        use response_selectors as sel;
        let selector = r.read_u8()?;
        let updates: Vec<Update> = r.read_array()?;
        let events: Vec<StorageReference> = r.read_array()?;
        let gas = GasCounts::unmarshal(r)?;
        match selector {
            sel::GAMETE_CREATED => Ok(Response::GameteCreated {
                gamete: StorageReference::unmarshal(r)?,
                updates,
                events,
                gas,
            }),
            sel::INITIALIZED => Ok(Response::Initialized { updates, events, gas }),
            sel::INSTALL_CODE_SUCCESSFUL => Ok(Response::InstallCodeSuccessful {
                module: r.read_bytes()?,
                dependencies: r.read_array()?,
                updates,
                events,
                gas,
            }),
            sel::INSTALL_CODE_FAILED => Ok(Response::InstallCodeFailed {
                cause: FailureCause::unmarshal(r)?,
                penalty: r.read_u64()?,
                updates,
                events,
                gas,
            }),
            sel::CONSTRUCTOR_SUCCESSFUL => Ok(Response::ConstructorSuccessful {
                new_object: StorageReference::unmarshal(r)?,
                updates,
                events,
                gas,
            }),
            sel::CONSTRUCTOR_EXCEPTION => Ok(Response::ConstructorException {
                exception_class: r.read_str()?,
                message: r.read_str()?,
                updates,
                events,
                gas,
            }),
            sel::CONSTRUCTOR_FAILED => Ok(Response::ConstructorFailed {
                cause: FailureCause::unmarshal(r)?,
                penalty: r.read_u64()?,
                updates,
                events,
                gas,
            }),
            sel::METHOD_SUCCESSFUL => Ok(Response::MethodSuccessful {
                result: Some(StorageValue::unmarshal(r)?),
                updates,
                events,
                gas,
            }),
            sel::METHOD_SUCCESSFUL_VOID => Ok(Response::MethodSuccessful {
                result: None,
                updates,
                events,
                gas,
            }),
            sel::METHOD_SUCCESSFUL_VOID_NO_EVENTS => {
                if !events.is_empty() {
                    return Err(MarshalError::NonCanonical(
                        "void-no-events selector with a non-empty events list",
                    ));
                }
                Ok(Response::MethodSuccessful {
                    result: None,
                    updates,
                    events,
                    gas,
                })
            }
            sel::METHOD_EXCEPTION => Ok(Response::MethodException {
                exception_class: r.read_str()?,
                message: r.read_str()?,
                updates,
                events,
                gas,
            }),
            sel::METHOD_FAILED => Ok(Response::MethodFailed {
                cause: FailureCause::unmarshal(r)?,
                penalty: r.read_u64()?,
                updates,
                events,
                gas,
            }),
            other => Err(MarshalError::UnknownSelector {
                context: "response",
                selector: other,
            }),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
