//! DWARF-backed symbol resolver for automatic tracing

use crate::domain::Pid;
use crate::symbolization::cache::SymbolResolver;
use crate::symbolization::memory_maps::find_load_base;
use addr2line::Context;
use anyhow::{anyhow, Context as _, Result};
use gimli::{EndianRcSlice, RunTimeEndian};
use log::info;
use object::{Object, ObjectKind, ObjectSection, ObjectSegment, ObjectSymbol, SymbolKind};
use rustc_demangle::demangle;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// Text symbol from the ELF symbol table
#[derive(Debug, Clone)]
struct TextSymbol {
    address: u64,
    size: u64,
    name: String,
}

/// Resolves runtime function addresses to demangled names
///
/// Names come from DWARF debug information when present, falling back to the
/// ELF symbol table. Runtime addresses are shifted by the load bias before
/// lookup, so a position-independent executable resolves correctly once
/// [`with_load_base`](Self::with_load_base) has been applied.
pub struct DwarfResolver {
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
    /// Sorted by address
    symbols: Vec<TextSymbol>,
    /// Link-time address of the segment at file offset zero
    link_base: u64,
    position_independent: bool,
    bias: u64,
}

impl DwarfResolver {
    /// Load debug information and symbols of the binary at `binary_path`
    ///
    /// # Errors
    /// Returns an error if the binary cannot be read or parsed, or its DWARF
    /// sections are malformed.
    pub fn new<P: AsRef<Path>>(binary_path: P) -> Result<Self> {
        let binary_path = binary_path.as_ref();
        let binary_data = fs::read(binary_path)
            .with_context(|| format!("Failed to read binary file {}", binary_path.display()))?;

        let obj_file = object::File::parse(&*binary_data).context("Failed to parse object file")?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)?;
        let ctx = Context::from_dwarf(dwarf).context("Failed to load DWARF debug information")?;

        let mut symbols: Vec<TextSymbol> = obj_file
            .symbols()
            .filter(|sym| sym.kind() == SymbolKind::Text && sym.address() != 0)
            .filter_map(|sym| {
                let name = sym.name().ok()?;
                Some(TextSymbol {
                    address: sym.address(),
                    size: sym.size(),
                    name: name.to_string(),
                })
            })
            .collect();
        symbols.sort_by_key(|sym| sym.address);

        let link_base = obj_file
            .segments()
            .find(|segment| segment.file_range().0 == 0)
            .map_or(0, |segment| segment.address());

        info!(
            "Loaded {} ({} text symbols, link base 0x{link_base:x})",
            binary_path.display(),
            symbols.len()
        );

        Ok(Self {
            ctx,
            symbols,
            link_base,
            position_independent: obj_file.kind() == ObjectKind::Dynamic,
            bias: 0,
        })
    }

    /// Resolver for the running executable, with its load bias applied
    ///
    /// # Errors
    /// Returns an error if the executable cannot be located or loaded, or its
    /// load address cannot be found in `/proc/self/maps`.
    pub fn for_current_exe() -> Result<Self> {
        let exe = std::env::current_exe().context("Failed to locate current executable")?;
        let resolver = Self::new(&exe)?;
        if !resolver.position_independent {
            return Ok(resolver);
        }

        let exe_path = exe.to_str().ok_or_else(|| anyhow!("Non UTF-8 executable path"))?;
        let load_base = find_load_base(Pid(std::process::id()), exe_path)?;
        Ok(resolver.with_load_base(load_base))
    }

    /// Account for the binary having been mapped at `load_base`
    ///
    /// Has no effect on non-PIE binaries, which run at their link addresses.
    #[must_use]
    pub fn with_load_base(mut self, load_base: u64) -> Self {
        if self.position_independent {
            self.bias = load_base.wrapping_sub(self.link_base);
        }
        self
    }

    /// Difference between runtime and link-time addresses
    #[must_use]
    pub fn bias(&self) -> u64 {
        self.bias
    }

    /// Demangled name of the function containing runtime address `addr`
    #[must_use]
    pub fn function_name(&self, addr: u64) -> Option<String> {
        let file_addr = addr.wrapping_sub(self.bias);
        self.dwarf_name(file_addr).or_else(|| self.symbol_table_name(file_addr))
    }

    /// Outermost function covering `file_addr` according to DWARF
    fn dwarf_name(&self, file_addr: u64) -> Option<String> {
        let mut frames = self.ctx.find_frames(file_addr).skip_all_loads().ok()?;
        let mut name = None;
        while let Ok(Some(frame)) = frames.next() {
            if let Some(function) = frame
                .function
                .and_then(|f| f.demangle().ok().map(|s| s.to_string()))
            {
                name = Some(function);
            }
        }
        name
    }

    fn symbol_table_name(&self, file_addr: u64) -> Option<String> {
        let idx = self.symbols.partition_point(|sym| sym.address <= file_addr).checked_sub(1)?;
        let symbol = &self.symbols[idx];
        let within = symbol.size == 0 || file_addr < symbol.address.saturating_add(symbol.size);
        within.then(|| Self::demangle_symbol(&symbol.name))
    }

    /// Demangle a Rust symbol name
    #[must_use]
    pub fn demangle_symbol(symbol: &str) -> String {
        format!("{:#}", demangle(symbol))
    }
}

impl SymbolResolver for DwarfResolver {
    fn resolve(&mut self, address: u64) -> Option<Rc<str>> {
        self.function_name(address).map(Rc::from)
    }
}
