//! # Consensus Parameters
//!
//! The snapshot of node-wide parameters agreed by the consensus
//! collaborator: chain identity, the names of the pluggable crypto
//! algorithms, and the gas cost model. The snapshot lives in the `info`
//! trie, so it is canonically marshallable; it also derives `serde` for
//! configuration files and diagnostics.

use crate::errors::MarshalError;
use crate::marshalling::{Marshallable, MarshalReader, MarshalWriter};
use serde::{Deserialize, Serialize};

/// Default cost constants of the gas model.
pub mod default_costs {
    /// CPU units charged for dispatching any code execution.
    pub const BASE_CPU_TRANSACTION_COST: u64 = 10;
    /// RAM units charged per allocated cell.
    pub const RAM_PER_CELL: u64 = 1;
    /// Storage units charged per byte written to the store.
    pub const STORAGE_PER_BYTE: u64 = 4;
}

/// How execution effort converts into gas units.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct GasCostModel {
    /// Flat CPU charge for reaching the executor at all.
    pub base_cpu_transaction_cost: u64,
    /// RAM units per allocated cell.
    pub ram_per_cell: u64,
    /// Storage units per byte written.
    pub storage_per_byte: u64,
}

impl Default for GasCostModel {
    fn default() -> Self {
        Self {
            base_cpu_transaction_cost: default_costs::BASE_CPU_TRANSACTION_COST,
            ram_per_cell: default_costs::RAM_PER_CELL,
            storage_per_byte: default_costs::STORAGE_PER_BYTE,
        }
    }
}

impl GasCostModel {
    /// Storage gas for writing `bytes` bytes.
    #[must_use]
    pub fn storage_cost_of(&self, bytes: usize) -> u64 {
        self.storage_per_byte.saturating_mul(bytes as u64)
    }
}

impl Marshallable for GasCostModel {
    fn marshal(&self, w: &mut MarshalWriter) {
        w.write_u64(self.base_cpu_transaction_cost);
        w.write_u64(self.ram_per_cell);
        w.write_u64(self.storage_per_byte);
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            base_cpu_transaction_cost: r.read_u64()?,
            ram_per_cell: r.read_u64()?,
            storage_per_byte: r.read_u64()?,
        })
    }
}

/// The consensus parameters a store snapshot was built under.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Identifier of the chain; non-initial requests must quote it.
    pub chain_id: String,
    /// Name of the signature scheme for request verification.
    pub signature_algorithm: String,
    /// Name of the node hashing algorithm.
    pub hasher: String,
    /// The gas cost model.
    pub gas_cost_model: GasCostModel,
    /// Upper bound on the gas limit of a single request.
    pub max_gas_per_request: u64,
    /// Requests offering less than this per gas unit are rejected.
    pub min_gas_price: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            chain_id: "strata".to_string(),
            signature_algorithm: "ed25519".to_string(),
            hasher: "sha256".to_string(),
            gas_cost_model: GasCostModel::default(),
            max_gas_per_request: 1_000_000_000,
            min_gas_price: 1,
        }
    }
}

impl Marshallable for ConsensusConfig {
    fn marshal(&self, w: &mut MarshalWriter) {
        w.write_str(&self.chain_id);
        w.write_str(&self.signature_algorithm);
        w.write_str(&self.hasher);
        self.gas_cost_model.marshal(w);
        w.write_u64(self.max_gas_per_request);
        w.write_u64(self.min_gas_price);
    }

    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            chain_id: r.read_str()?,
            signature_algorithm: r.read_str()?,
            hasher: r.read_str()?,
            gas_cost_model: GasCostModel::unmarshal(r)?,
            max_gas_per_request: r.read_u64()?,
            min_gas_price: r.read_u64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consensus_roundtrip() {
        let config = ConsensusConfig {
            chain_id: "strata-test".to_string(),
            max_gas_per_request: 500_000,
            ..ConsensusConfig::default()
        };
        assert_eq!(ConsensusConfig::from_bytes(&config.to_bytes()).unwrap(), config);
    }

    #[test]
    fn test_storage_cost_scales_per_byte() {
        let model = GasCostModel::default();
        assert_eq!(model.storage_cost_of(10), 10 * model.storage_per_byte);
    }
}
