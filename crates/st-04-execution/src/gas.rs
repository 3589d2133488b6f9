//! # Gas Metering
//!
//! One meter per delivered request, charged across three buckets: CPU for
//! computation, RAM per allocated cell, storage per byte written. A charge
//! that would cross the limit is refused without being counted, so the
//! consumed totals always stay within the limit and the penalty of a
//! failed request is exactly the unconsumed remainder.

use crate::errors::ExecutionAbort;
use shared_types::{GasCounts, GasCostModel};

/// Meters one request's gas against its declared limit.
pub struct GasMeter {
    limit: u64,
    model: GasCostModel,
    cpu: u64,
    ram: u64,
    storage: u64,
}

impl GasMeter {
    /// A fresh meter for a request with the given limit.
    #[must_use]
    pub fn new(limit: u64, model: GasCostModel) -> Self {
        Self {
            limit,
            model,
            cpu: 0,
            ram: 0,
            storage: 0,
        }
    }

    /// The cost model in force, for executors that derive charges.
    #[must_use]
    pub fn model(&self) -> &GasCostModel {
        &self.model
    }

    /// Gas still available under the limit.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.limit - self.total()
    }

    /// What has been consumed so far, by bucket.
    #[must_use]
    pub fn consumed(&self) -> GasCounts {
        GasCounts {
            cpu: self.cpu,
            ram: self.ram,
            storage: self.storage,
        }
    }

    fn total(&self) -> u64 {
        self.cpu + self.ram + self.storage
    }

    fn charge(&mut self, units: u64) -> Result<u64, ExecutionAbort> {
        if units > self.remaining() {
            return Err(ExecutionAbort::OutOfGas);
        }
        Ok(units)
    }

    /// Charges CPU units; refuses, uncounted, past the limit.
    pub fn charge_cpu(&mut self, units: u64) -> Result<(), ExecutionAbort> {
        self.cpu += self.charge(units)?;
        Ok(())
    }

    /// Charges RAM units for `cells` allocated cells.
    pub fn charge_ram_cells(&mut self, cells: u64) -> Result<(), ExecutionAbort> {
        let units = self.model.ram_per_cell.saturating_mul(cells);
        self.ram += self.charge(units)?;
        Ok(())
    }

    /// Charges storage units for `bytes` written bytes.
    pub fn charge_storage_bytes(&mut self, bytes: usize) -> Result<(), ExecutionAbort> {
        let units = self.model.storage_cost_of(bytes);
        self.storage += self.charge(units)?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
