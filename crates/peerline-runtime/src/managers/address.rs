//! Address Registry
//!
//! Hands out the endpoint's [`LocalAddress`]. An address is drawn uniformly
//! from the six-digit range on first use and cached for the rest of the
//! process. Collisions retire the current address; no value is handed out
//! twice until the whole range has been used up.

use core::ops::RangeInclusive;
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use std::collections::HashSet;
use tracing::{debug, warn};

use peerline_core::LocalAddress;

/// Six-digit numbers without a leading zero
pub const ADDRESS_RANGE: RangeInclusive<u32> = 100_000..=999_999;

/// Consecutive draws of already-issued addresses before the history is reset
const MAX_DRAW_ATTEMPTS: usize = 1024;

pub struct AddressRegistry {
    rng: Box<dyn RngCore + Send>,
    space: RangeInclusive<u32>,
    current: Option<LocalAddress>,
    issued: HashSet<LocalAddress>,
}

impl AddressRegistry {
    /// Registry drawing from OS entropy
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }

    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            rng,
            space: ADDRESS_RANGE,
            current: None,
            issued: HashSet::new(),
        }
    }

    #[cfg(test)]
    fn with_space(rng: Box<dyn RngCore + Send>, space: RangeInclusive<u32>) -> Self {
        Self {
            space,
            ..Self::with_rng(rng)
        }
    }

    /// Start from an address cached earlier in the same session
    pub fn with_cached(mut self, address: LocalAddress) -> Self {
        self.issued.insert(address.clone());
        self.current = Some(address);
        self
    }

    /// The cached address, or a freshly drawn one
    pub fn acquire_address(&mut self) -> LocalAddress {
        if let Some(address) = &self.current {
            return address.clone();
        }
        let address = self.draw(None);
        self.current = Some(address.clone());
        address
    }

    /// Retire the current address and draw a replacement
    pub fn on_collision(&mut self) -> LocalAddress {
        let retired = self.current.take();
        let address = self.draw(retired.as_ref());
        debug!(
            "Address collision on {:?}, drew {}",
            retired.as_ref().map(LocalAddress::as_str),
            address
        );
        self.current = Some(address.clone());
        address
    }

    pub fn current(&self) -> Option<&LocalAddress> {
        self.current.as_ref()
    }

    fn draw(&mut self, retired: Option<&LocalAddress>) -> LocalAddress {
        if let Some(address) = self.try_draw() {
            return address;
        }
        // Range exhausted or nearly so: forget everything but the retired one
        warn!(issued = self.issued.len(), "Address space exhausted, recycling issued addresses");
        self.issued.retain(|address| Some(address) == retired);
        loop {
            if let Some(address) = self.try_draw() {
                return address;
            }
        }
    }

    fn try_draw(&mut self) -> Option<LocalAddress> {
        (0..MAX_DRAW_ATTEMPTS).find_map(|_| {
            let address = LocalAddress::from_number(self.rng.gen_range(self.space.clone()));
            self.issued.insert(address.clone()).then_some(address)
        })
    }
}

impl Default for AddressRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for AddressRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AddressRegistry")
            .field("current", &self.current)
            .field("issued", &self.issued.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;

    fn seeded(seed: u64) -> AddressRegistry {
        AddressRegistry::with_rng(Box::new(ChaCha8Rng::seed_from_u64(seed)))
    }

    #[test]
    fn test_acquire_is_cached() {
        let mut registry = seeded(1);
        let first = registry.acquire_address();
        assert_eq!(registry.acquire_address(), first);
        assert_eq!(first.as_str().len(), 6);
        let n: u32 = first.as_str().parse().unwrap();
        assert!(ADDRESS_RANGE.contains(&n));
    }

    #[test]
    fn test_collision_draws_fresh_address() {
        let mut registry = seeded(2);
        let first = registry.acquire_address();
        let second = registry.on_collision();
        assert_ne!(first, second);
        assert_eq!(registry.acquire_address(), second);
    }

    #[test]
    fn test_exhausted_space_recycles_without_repeating_retired() {
        let space = 100_000..=100_003;
        let mut registry = AddressRegistry::with_space(
            Box::new(ChaCha8Rng::seed_from_u64(4)),
            space.clone(),
        );
        let mut previous = registry.acquire_address();
        for _ in 0..50 {
            let next = registry.on_collision();
            let n: u32 = next.as_str().parse().unwrap();
            assert!(space.contains(&n));
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_cached_address_is_used_and_never_redrawn() {
        let cached = LocalAddress::from_number(111_111);
        let mut registry = seeded(3).with_cached(cached.clone());
        assert_eq!(registry.acquire_address(), cached);
        for _ in 0..100 {
            assert_ne!(registry.on_collision(), cached);
        }
    }
}
