//! Fixed-capacity address → name cache
//!
//! Resolved names live in a dense, append-only entry array. A power-of-two index
//! of slots points into it and is searched with linear probing starting at a
//! Fibonacci hash of the address. The cache never grows and never evicts: once
//! the entry array is full, new addresses are reported as [`SymbolCacheError::Full`]
//! without touching the resolver.
//!
//! Names are `Rc<str>`, which keeps the cache on the thread that created it.

use crate::domain::SymbolCacheError;
use std::rc::Rc;

/// 2^32 / φ
const FIBONACCI_MULTIPLIER: u32 = 0x9E37_79B9;

/// Turns an address into a function name
pub trait SymbolResolver {
    /// Name of the function at `address`, or `None` if it cannot be resolved
    fn resolve(&mut self, address: u64) -> Option<Rc<str>>;
}

impl<F> SymbolResolver for F
where
    F: FnMut(u64) -> Option<Rc<str>>,
{
    fn resolve(&mut self, address: u64) -> Option<Rc<str>> {
        self(address)
    }
}

#[derive(Debug)]
struct SymbolEntry {
    address: u64,
    name: Rc<str>,
}

enum Probe {
    Hit(usize),
    Vacant(usize),
    Exhausted,
}

/// Open-addressing symbol cache
#[derive(Debug)]
pub struct SymbolCache {
    entries: Vec<SymbolEntry>,
    /// Slot → entry index
    index: Box<[Option<usize>]>,
    capacity: usize,
    /// log2 of the index size
    index_bits: u32,
}

impl SymbolCache {
    /// Create a cache holding at most `capacity` names
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let index_size = capacity.max(1).next_power_of_two();
        Self {
            entries: Vec::with_capacity(capacity),
            index: vec![None; index_size].into_boxed_slice(),
            capacity,
            index_bits: index_size.trailing_zeros(),
        }
    }

    /// Name for `address`, asking `resolver` only on a miss
    ///
    /// # Errors
    /// Returns [`SymbolCacheError::Full`] when a new address cannot be stored, and
    /// [`SymbolCacheError::Unresolved`] when the resolver fails. The cache is left
    /// unchanged in both cases.
    pub fn resolve<R>(&mut self, address: u64, resolver: &mut R) -> Result<&str, SymbolCacheError>
    where
        R: SymbolResolver + ?Sized,
    {
        let slot = match self.probe(address) {
            Probe::Hit(entry) => return Ok(&*self.entries[entry].name),
            Probe::Exhausted => return Err(self.full()),
            Probe::Vacant(slot) => slot,
        };

        if self.entries.len() >= self.capacity {
            return Err(self.full());
        }
        let name = resolver
            .resolve(address)
            .ok_or(SymbolCacheError::Unresolved(address))?;

        let entry = self.entries.len();
        self.entries.push(SymbolEntry { address, name });
        self.index[slot] = Some(entry);
        Ok(&*self.entries[entry].name)
    }

    /// Cached name for `address`, without resolving
    #[must_use]
    pub fn get(&self, address: u64) -> Option<&str> {
        match self.probe(address) {
            Probe::Hit(entry) => Some(&*self.entries[entry].name),
            Probe::Vacant(_) | Probe::Exhausted => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of index slots (a power of two, at least `capacity`)
    #[must_use]
    pub fn index_size(&self) -> usize {
        self.index.len()
    }

    fn probe(&self, address: u64) -> Probe {
        let mask = self.index.len() - 1;
        let home = self.home_slot(address);

        for i in 0..self.index.len() {
            let slot = (home + i) & mask;
            match self.index[slot] {
                None => return Probe::Vacant(slot),
                Some(entry) if self.entries[entry].address == address => {
                    return Probe::Hit(entry)
                }
                Some(_) => {}
            }
        }
        Probe::Exhausted
    }

    /// Fibonacci hash of the low 32 address bits, keeping the high product bits
    ///
    /// Function addresses share their low bits through alignment, so the top of
    /// the product is used rather than masking the bottom.
    #[allow(clippy::cast_possible_truncation)]
    fn home_slot(&self, address: u64) -> usize {
        if self.index_bits == 0 {
            return 0;
        }
        let hash = (address as u32).wrapping_mul(FIBONACCI_MULTIPLIER);
        let bits = self.index_bits.min(32);
        (hash >> (32 - bits)) as usize & (self.index.len() - 1)
    }

    fn full(&self) -> SymbolCacheError {
        SymbolCacheError::Full {
            capacity: self.capacity,
        }
    }
}
