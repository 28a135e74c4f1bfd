//! # Symbol Resolution for Automatic Tracing
//!
//! When tracing is driven by raw function addresses (for example from
//! instrumentation hooks on function entry) every `Begin` event needs a name.
//! Resolving an address through debug information is expensive, and the same
//! few thousand functions are entered over and over, so each thread keeps a
//! [`SymbolCache`] in front of a [`SymbolResolver`].
//!
//! ## Address Translation Flow
//!
//! ```text
//! 1. Function entry hook reports runtime address 0x55f3a2b4c780
//!
//! 2. SymbolCache::resolve probes its index from hash(0x55f3a2b4c780)
//!    hit  → cached name, no resolver call
//!    miss → ask the resolver, remember the answer
//!
//! 3. DwarfResolver subtracts the load bias (PIE/ASLR)
//!    /proc/self/maps: binary mapped from offset 0 at 0x55f3a2b4c000
//!    link-time address = 0x55f3a2b4c780 - 0x55f3a2b4c000 = 0x780
//!
//! 4. Look up 0x780 in DWARF (addr2line), else in the ELF symbol table
//!
//! 5. Demangle
//!    _ZN7my_app6worker3run17h...E → my_app::worker::run
//! ```
//!
//! ## Module Structure
//!
//! - **`cache`**: fixed-capacity open-addressing cache and the resolver trait
//! - **`symbolizer`**: [`DwarfResolver`] built on `object`, `gimli`, `addr2line`
//!   and `rustc-demangle`
//! - **`memory_maps`**: `/proc/<pid>/maps` parsing for the load base
//!
//! ## Limitations
//!
//! - **Requires debug symbols** for DWARF names: build with `debug = true`.
//!   Stripped binaries fall back to the symbol table, or fail to resolve.
//! - **Main executable only**: addresses inside shared libraries are not
//!   translated and resolve to nothing.

pub mod cache;
pub mod memory_maps;
pub mod symbolizer;

pub use cache::{SymbolCache, SymbolResolver};
pub use memory_maps::{find_load_base, MemoryMapping, MemoryRange};
pub use symbolizer::DwarfResolver;
