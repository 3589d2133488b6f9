//! # shared-types
//!
//! Ubiquitous domain types for Strata-Chain, shared by every subsystem:
//!
//! - the canonical marshalling toolkit (`marshalling`);
//! - references identifying transactions and storage objects (`references`);
//! - type/field/method signatures (`signatures`);
//! - storage values and updates, with their canonical orders (`values`,
//!   `updates`);
//! - the request and response families with stable wire selectors
//!   (`requests`, `responses`);
//! - the consensus snapshot and gas cost model (`consensus`).
//!
//! Everything here is pure data: no I/O, no async, no global state.

pub mod consensus;
pub mod errors;
pub mod marshalling;
pub mod references;
pub mod requests;
pub mod responses;
pub mod signatures;
pub mod standard;
pub mod updates;
pub mod values;

pub use consensus::{ConsensusConfig, GasCostModel};
pub use errors::MarshalError;
pub use marshalling::{Marshallable, MarshalReader, MarshalWriter};
pub use references::{StorageReference, TransactionReference, REFERENCE_LEN};
pub use requests::Request;
pub use responses::{FailureCause, GasCounts, Response};
pub use signatures::{ConstructorSignature, FieldSignature, MethodSignature, StorageType};
pub use updates::Update;
pub use values::StorageValue;
