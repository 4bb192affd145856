//! Growable list of matched addresses with linear growth.

use crate::error::ScanError;

/// Capacity of a fresh list and the size of each growth step.
pub const MATCH_GROWTH: usize = 10_000;

/// Matched addresses in discovery order.
///
/// Capacity starts at [`MATCH_GROWTH`] and grows by exactly
/// [`MATCH_GROWTH`] whenever an append would exceed it.
#[derive(Debug)]
pub struct MatchList {
    addresses: Vec<u64>,
}

impl MatchList {
    pub fn new() -> Result<Self, ScanError> {
        let mut addresses = Vec::new();
        addresses
            .try_reserve_exact(MATCH_GROWTH)
            .map_err(|_| ScanError::AllocationFailed { what: "match list" })?;
        Ok(Self { addresses })
    }

    pub fn push(&mut self, address: u64) -> Result<(), ScanError> {
        if self.addresses.len() == self.addresses.capacity() {
            self.addresses
                .try_reserve_exact(MATCH_GROWTH)
                .map_err(|_| ScanError::AllocationFailed { what: "match list" })?;
        }
        self.addresses.push(address);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.addresses.capacity()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.addresses
    }

    pub fn into_vec(self) -> Vec<u64> {
        self.addresses
    }
}
