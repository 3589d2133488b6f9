//! # Transaction Requests
//!
//! The seven kinds of request a node accepts. A request is immutable once
//! constructed; its identity is the node hash of its marshalled bytes.
//!
//! ## Wire layout
//!
//! `[selector][caller if non-initial][nonce][gasLimit][gasPrice][chainId]
//! [classpath][payload...][signature if signed]`
//!
//! The selector is the first byte; initial kinds (gamete creation,
//! manifest initialization) skip the caller/nonce/gas/chain-id block;
//! system method calls are unsigned and carry no chain id. Selectors are
//! stable across versions; new kinds take fresh numbers.

use crate::errors::MarshalError;
use crate::marshalling::{Marshallable, MarshalReader, MarshalWriter};
use crate::references::{StorageReference, TransactionReference};
use crate::signatures::{ConstructorSignature, MethodSignature};
use crate::values::StorageValue;
use num_bigint::BigInt;

/// Stable selector bytes for the request kinds.
pub mod request_selectors {
    pub const GAMETE_CREATION: u8 = 1;
    pub const INSTALL_CODE: u8 = 3;
    pub const CONSTRUCTOR_CALL: u8 = 4;
    pub const INSTANCE_METHOD_CALL: u8 = 5;
    pub const STATIC_METHOD_CALL: u8 = 6;
    pub const INSTANCE_SYSTEM_METHOD_CALL: u8 = 7;
    pub const INITIALIZE_MANIFEST: u8 = 10;
}

/// A smart-contract transaction request.
///
/// All fields are public and immutable by convention: the node never
/// mutates a request after computing its reference.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Request {
    /// Bootstrap: create the initial externally-owned account holding the
    /// whole supply. Only accepted before the manifest is set.
    GameteCreation {
        classpath: TransactionReference,
        initial_amount: BigInt,
        /// Hex encoding of the gamete's raw public key.
        public_key: String,
    },

    /// Bootstrap: mark a previously created object as the node's manifest.
    /// Closes the initial phase.
    InitializeManifest {
        classpath: TransactionReference,
        manifest: StorageReference,
    },

    /// Installs an executable code module; its reference becomes a
    /// classpath for later calls.
    InstallCode {
        caller: StorageReference,
        nonce: BigInt,
        gas_limit: u64,
        gas_price: u64,
        chain_id: String,
        classpath: TransactionReference,
        module: Vec<u8>,
        dependencies: Vec<TransactionReference>,
        signature: Vec<u8>,
    },

    /// Runs a constructor of a class of the given classpath.
    ConstructorCall {
        caller: StorageReference,
        nonce: BigInt,
        gas_limit: u64,
        gas_price: u64,
        chain_id: String,
        classpath: TransactionReference,
        constructor: ConstructorSignature,
        actuals: Vec<StorageValue>,
        signature: Vec<u8>,
    },

    /// Runs an instance method on a stored receiver object.
    InstanceMethodCall {
        caller: StorageReference,
        nonce: BigInt,
        gas_limit: u64,
        gas_price: u64,
        chain_id: String,
        classpath: TransactionReference,
        method: MethodSignature,
        receiver: StorageReference,
        actuals: Vec<StorageValue>,
        /// View calls must not update anything beyond caller bookkeeping.
        view: bool,
        signature: Vec<u8>,
    },

    /// Runs a static method of a class of the given classpath.
    StaticMethodCall {
        caller: StorageReference,
        nonce: BigInt,
        gas_limit: u64,
        gas_price: u64,
        chain_id: String,
        classpath: TransactionReference,
        method: MethodSignature,
        actuals: Vec<StorageValue>,
        view: bool,
        signature: Vec<u8>,
    },

    /// Instance method call issued by the node itself: unsigned, gas
    /// priced at zero, no chain id.
    InstanceSystemMethodCall {
        caller: StorageReference,
        nonce: BigInt,
        gas_limit: u64,
        classpath: TransactionReference,
        method: MethodSignature,
        receiver: StorageReference,
        actuals: Vec<StorageValue>,
    },
}

impl Request {
    /// The selector byte that prefixes this request's encoding.
    #[must_use]
    pub fn selector(&self) -> u8 {
        use request_selectors as sel;
        match self {
            Request::GameteCreation { .. } => sel::GAMETE_CREATION,
            Request::InitializeManifest { .. } => sel::INITIALIZE_MANIFEST,
            Request::InstallCode { .. } => sel::INSTALL_CODE,
            Request::ConstructorCall { .. } => sel::CONSTRUCTOR_CALL,
            Request::InstanceMethodCall { .. } => sel::INSTANCE_METHOD_CALL,
            Request::StaticMethodCall { .. } => sel::STATIC_METHOD_CALL,
            Request::InstanceSystemMethodCall { .. } => sel::INSTANCE_SYSTEM_METHOD_CALL,
        }
    }

    /// True for the bootstrap kinds that run before the manifest exists.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        matches!(
            self,
            Request::GameteCreation { .. } | Request::InitializeManifest { .. }
        )
    }

    /// True for view-flagged calls.
    #[must_use]
    pub fn is_view(&self) -> bool {
        matches!(
            self,
            Request::InstanceMethodCall { view: true, .. }
                | Request::StaticMethodCall { view: true, .. }
        )
    }

    /// The paying account, absent for initial kinds.
    #[must_use]
    pub fn caller(&self) -> Option<&StorageReference> {
        match self {
            Request::GameteCreation { .. } | Request::InitializeManifest { .. } => None,
            Request::InstallCode { caller, .. }
            | Request::ConstructorCall { caller, .. }
            | Request::InstanceMethodCall { caller, .. }
            | Request::StaticMethodCall { caller, .. }
            | Request::InstanceSystemMethodCall { caller, .. } => Some(caller),
        }
    }

    /// The caller's declared nonce, absent for initial kinds.
    #[must_use]
    pub fn nonce(&self) -> Option<&BigInt> {
        match self {
            Request::GameteCreation { .. } | Request::InitializeManifest { .. } => None,
            Request::InstallCode { nonce, .. }
            | Request::ConstructorCall { nonce, .. }
            | Request::InstanceMethodCall { nonce, .. }
            | Request::StaticMethodCall { nonce, .. }
            | Request::InstanceSystemMethodCall { nonce, .. } => Some(nonce),
        }
    }

    /// Maximum gas this request may consume, absent for initial kinds.
    #[must_use]
    pub fn gas_limit(&self) -> Option<u64> {
        match self {
            Request::GameteCreation { .. } | Request::InitializeManifest { .. } => None,
            Request::InstallCode { gas_limit, .. }
            | Request::ConstructorCall { gas_limit, .. }
            | Request::InstanceMethodCall { gas_limit, .. }
            | Request::StaticMethodCall { gas_limit, .. }
            | Request::InstanceSystemMethodCall { gas_limit, .. } => Some(*gas_limit),
        }
    }

    /// Price per gas unit; system calls run at price zero.
    #[must_use]
    pub fn gas_price(&self) -> Option<u64> {
        match self {
            Request::GameteCreation { .. } | Request::InitializeManifest { .. } => None,
            Request::InstanceSystemMethodCall { .. } => Some(0),
            Request::InstallCode { gas_price, .. }
            | Request::ConstructorCall { gas_price, .. }
            | Request::InstanceMethodCall { gas_price, .. }
            | Request::StaticMethodCall { gas_price, .. } => Some(*gas_price),
        }
    }

    /// The chain this request was built for, absent for initial and
    /// system kinds.
    #[must_use]
    pub fn chain_id(&self) -> Option<&str> {
        match self {
            Request::InstallCode { chain_id, .. }
            | Request::ConstructorCall { chain_id, .. }
            | Request::InstanceMethodCall { chain_id, .. }
            | Request::StaticMethodCall { chain_id, .. } => Some(chain_id),
            _ => None,
        }
    }

    /// The installed module this request executes against.
    #[must_use]
    pub fn classpath(&self) -> &TransactionReference {
        match self {
            Request::GameteCreation { classpath, .. }
            | Request::InitializeManifest { classpath, .. }
            | Request::InstallCode { classpath, .. }
            | Request::ConstructorCall { classpath, .. }
            | Request::InstanceMethodCall { classpath, .. }
            | Request::StaticMethodCall { classpath, .. }
            | Request::InstanceSystemMethodCall { classpath, .. } => classpath,
        }
    }

    /// The attached signature, absent for initial and system kinds.
    #[must_use]
    pub fn signature(&self) -> Option<&[u8]> {
        match self {
            Request::InstallCode { signature, .. }
            | Request::ConstructorCall { signature, .. }
            | Request::InstanceMethodCall { signature, .. }
            | Request::StaticMethodCall { signature, .. } => Some(signature),
            _ => None,
        }
    }

    /// The canonical bytes a signer commits to: the full encoding minus
    /// the trailing signature block.
    #[must_use]
    pub fn signed_payload(&self) -> Vec<u8> {
        let mut w = MarshalWriter::new();
        self.marshal_unsigned(&mut w);
        w.into_bytes()
    }

    fn marshal_unsigned(&self, w: &mut MarshalWriter) {
        w.write_u8(self.selector());
        match self {
            Request::GameteCreation {
                classpath,
                initial_amount,
                public_key,
            } => {
                classpath.marshal(w);
                w.write_big_int(initial_amount);
                w.write_str(public_key);
            }
            Request::InitializeManifest { classpath, manifest } => {
                classpath.marshal(w);
                manifest.marshal(w);
            }
            Request::InstallCode {
                caller,
                nonce,
                gas_limit,
                gas_price,
                chain_id,
                classpath,
                module,
                dependencies,
                ..
            } => {
                caller.marshal(w);
                w.write_big_int(nonce);
                w.write_u64(*gas_limit);
                w.write_u64(*gas_price);
                w.write_str(chain_id);
                classpath.marshal(w);
                w.write_bytes(module);
                w.write_array(dependencies);
            }
            Request::ConstructorCall {
                caller,
                nonce,
                gas_limit,
                gas_price,
                chain_id,
                classpath,
                constructor,
                actuals,
                ..
            } => {
                caller.marshal(w);
                w.write_big_int(nonce);
                w.write_u64(*gas_limit);
                w.write_u64(*gas_price);
                w.write_str(chain_id);
                classpath.marshal(w);
                constructor.marshal(w);
                w.write_array(actuals);
            }
            Request::InstanceMethodCall {
                caller,
                nonce,
                gas_limit,
                gas_price,
                chain_id,
                classpath,
                method,
                receiver,
                actuals,
                view,
                ..
            } => {
                caller.marshal(w);
                w.write_big_int(nonce);
                w.write_u64(*gas_limit);
                w.write_u64(*gas_price);
                w.write_str(chain_id);
                classpath.marshal(w);
                method.marshal(w);
                w.write_u8(u8::from(*view));
                receiver.marshal(w);
                w.write_array(actuals);
            }
            Request::StaticMethodCall {
                caller,
                nonce,
                gas_limit,
                gas_price,
                chain_id,
                classpath,
                method,
                actuals,
                view,
                ..
            } => {
                caller.marshal(w);
                w.write_big_int(nonce);
                w.write_u64(*gas_limit);
                w.write_u64(*gas_price);
                w.write_str(chain_id);
                classpath.marshal(w);
                method.marshal(w);
                w.write_u8(u8::from(*view));
                w.write_array(actuals);
            }
            Request::InstanceSystemMethodCall {
                caller,
                nonce,
                gas_limit,
                classpath,
                method,
                receiver,
                actuals,
            } => {
                caller.marshal(w);
                w.write_big_int(nonce);
                w.write_u64(*gas_limit);
                classpath.marshal(w);
                method.marshal(w);
                receiver.marshal(w);
                w.write_array(actuals);
            }
        }
    }
}

impl Marshallable for Request {
    fn marshal(&self, w: &mut MarshalWriter) {
        self.marshal_unsigned(w);
        if let Some(signature) = self.signature() {
            w.write_bytes(signature);
        }
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        use request_selectors as sel;
        let selector = r.read_u8()?;
        match selector {
            sel::GAMETE_CREATION => Ok(Request::GameteCreation {
                classpath: TransactionReference::unmarshal(r)?,
                initial_amount: r.read_big_int()?,
                public_key: r.read_str()?,
            }),
            sel::INITIALIZE_MANIFEST => Ok(Request::InitializeManifest {
                classpath: TransactionReference::unmarshal(r)?,
                manifest: StorageReference::unmarshal(r)?,
            }),
            sel::INSTALL_CODE => Ok(Request::InstallCode {
                caller: StorageReference::unmarshal(r)?,
                nonce: r.read_big_int()?,
                gas_limit: r.read_u64()?,
                gas_price: r.read_u64()?,
                chain_id: r.read_str()?,
                classpath: TransactionReference::unmarshal(r)?,
                module: r.read_bytes()?,
                dependencies: r.read_array()?,
                signature: r.read_bytes()?,
            }),
            sel::CONSTRUCTOR_CALL => Ok(Request::ConstructorCall {
                caller: StorageReference::unmarshal(r)?,
                nonce: r.read_big_int()?,
                gas_limit: r.read_u64()?,
                gas_price: r.read_u64()?,
                chain_id: r.read_str()?,
                classpath: TransactionReference::unmarshal(r)?,
                constructor: ConstructorSignature::unmarshal(r)?,
                actuals: r.read_array()?,
                signature: r.read_bytes()?,
            }),
            sel::INSTANCE_METHOD_CALL => {
                let caller = StorageReference::unmarshal(r)?;
                let nonce = r.read_big_int()?;
                let gas_limit = r.read_u64()?;
                let gas_price = r.read_u64()?;
                let chain_id = r.read_str()?;
                let classpath = TransactionReference::unmarshal(r)?;
                let method = MethodSignature::unmarshal(r)?;
                let view = read_bool(r, "view flag")?;
                let receiver = StorageReference::unmarshal(r)?;
                let actuals = r.read_array()?;
                let signature = r.read_bytes()?;
                Ok(Request::InstanceMethodCall {
                    caller,
                    nonce,
                    gas_limit,
                    gas_price,
                    chain_id,
                    classpath,
                    method,
                    receiver,
                    actuals,
                    view,
                    signature,
                })
            }
            sel::STATIC_METHOD_CALL => {
                let caller = StorageReference::unmarshal(r)?;
                let nonce = r.read_big_int()?;
                let gas_limit = r.read_u64()?;
                let gas_price = r.read_u64()?;
                let chain_id = r.read_str()?;
                let classpath = TransactionReference::unmarshal(r)?;
                let method = MethodSignature::unmarshal(r)?;
                let view = read_bool(r, "view flag")?;
                let actuals = r.read_array()?;
                let signature = r.read_bytes()?;
                Ok(Request::StaticMethodCall {
                    caller,
                    nonce,
                    gas_limit,
                    gas_price,
                    chain_id,
                    classpath,
                    method,
                    actuals,
                    view,
                    signature,
                })
            }
            sel::INSTANCE_SYSTEM_METHOD_CALL => Ok(Request::InstanceSystemMethodCall {
                caller: StorageReference::unmarshal(r)?,
                nonce: r.read_big_int()?,
                gas_limit: r.read_u64()?,
                classpath: TransactionReference::unmarshal(r)?,
                method: MethodSignature::unmarshal(r)?,
                receiver: StorageReference::unmarshal(r)?,
                actuals: r.read_array()?,
            }),
            other => Err(MarshalError::UnknownSelector {
                context: "request",
                selector: other,
            }),
        }
    }
}

fn read_bool(r: &mut MarshalReader<'_>, context: &'static str) -> Result<bool, MarshalError> {
    match r.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(MarshalError::UnknownSelector {
            context,
            selector: other,
        }),
    }
}

// =============================================================================
// TESTS
// =============================================================================
