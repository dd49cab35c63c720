//! Address allocation.
//!
//! Every block is split into areas: one for its local registers and one per
//! sub-block reference. Areas are placed largest first, each one at the
//! running cursor. As all sizes are powers of two, the cursor is always a
//! multiple of the size of the area being placed, so every area is
//! naturally aligned and can be decoded with a single base/mask pair.

use std::collections::HashMap;

use log::{debug, trace};

use crate::errors::ConfigError;
use crate::model::{Block, Registry};
use crate::util;

/// Contiguous, power-of-two sized region of a block's address space.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Area {
    pub name: String,
    /// Referenced block type, `None` for the local registers.
    pub target: Option<String>,
    pub reps: u32,
    /// Words actually used.
    pub raw_size: u64,
    pub address_bits: u32,
    pub rounded_size: u64,
    pub base_address: u64,
    /// Size of the window of a single instance.
    pub stride: u64,
}

/// Decode window of one instance of an area.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub base: u64,
    pub size: u64,
}

impl Window {
    /// Address bits tested by the interconnect for this window.
    pub fn mask(&self) -> u64 {
        self.size - 1
    }

    pub fn address_bits(&self) -> u32 {
        util::address_bits(self.size)
    }
}

impl Area {
    pub fn is_local(&self) -> bool {
        self.target.is_none()
    }

    pub fn is_array(&self) -> bool {
        self.reps > 1
    }

    /// One window per repetition, `stride` apart.
    pub fn windows(&self) -> impl Iterator<Item = Window> + '_ {
        (0..u64::from(self.reps)).map(move |i| Window {
            base: self.base_address + i * self.stride,
            size: self.stride,
        })
    }

    pub fn end(&self) -> u64 {
        self.base_address + self.rounded_size
    }
}

/// Result of analysing one block.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    pub name: String,
    /// Areas in placement order (largest first).
    pub areas: Vec<Area>,
    pub address_bits: u32,
    pub total_address_size: u64,
    #[cfg_attr(feature = "serde", serde(skip))]
    local: usize,
}

impl Layout {
    /// The area holding the block's own registers.
    pub fn local_area(&self) -> &Area {
        &self.areas[self.local]
    }

    /// The area of the sub-block instance `name`.
    pub fn area(&self, name: &str) -> Option<&Area> {
        self.areas
            .iter()
            .find(|a| !a.is_local() && a.name == name)
    }
}

/// Memoised analysis of the blocks of a [`Registry`].
#[derive(Debug)]
pub struct Analysis<'r> {
    registry: &'r Registry,
    layouts: HashMap<String, Layout>,
    /// Names in the order their analysis completed.
    order: Vec<String>,
    in_progress: Vec<String>,
}

impl<'r> Analysis<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            layouts: HashMap::new(),
            order: Vec::new(),
            in_progress: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Analyses block `name` and, first, every block it references.
    /// Each block type is analysed at most once.
    pub fn analyze(&mut self, name: &str) -> Result<&Layout, ConfigError> {
        if self.registry.get(name).is_none() {
            return Err(ConfigError::UnknownTop(name.to_string()));
        }
        self.ensure(name, name)?;
        Ok(&self.layouts[name])
    }

    pub fn layout(&self, name: &str) -> Option<&Layout> {
        self.layouts.get(name)
    }

    /// Names of analysed blocks, children before their parents.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Analysed blocks with their layouts, in declaration order.
    pub fn blocks(&self) -> impl Iterator<Item = (&'r Block, &Layout)> + '_ {
        self.registry
            .iter()
            .filter_map(|b| self.layouts.get(&b.name).map(|l| (b, l)))
    }

    fn ensure(&mut self, name: &str, referrer: &str) -> Result<(), ConfigError> {
        if self.layouts.contains_key(name) {
            return Ok(());
        }
        if self.in_progress.iter().any(|n| n == name) {
            return Err(ConfigError::RecursiveBlock(name.to_string()));
        }
        let registry = self.registry;
        let block = registry.get(name).ok_or_else(|| ConfigError::UnknownBlock {
            block: referrer.to_string(),
            ty: name.to_string(),
        })?;

        self.in_progress.push(name.to_string());
        let mut areas = Vec::with_capacity(block.subblocks.len() + 1);
        let local_size = u64::from(block.free_reg_addr());
        areas.push(Area {
            name: "int_regs".to_string(),
            target: None,
            reps: 1,
            raw_size: local_size,
            address_bits: 0,
            rounded_size: 0,
            base_address: 0,
            stride: 0,
        });
        for subblock in &block.subblocks {
            self.ensure(&subblock.ty, &block.name)?;
            let target_size = self.layouts[&subblock.ty].total_address_size;
            areas.push(Area {
                name: subblock.name.clone(),
                target: Some(subblock.ty.clone()),
                reps: subblock.reps,
                raw_size: u64::from(subblock.reps) * target_size,
                address_bits: 0,
                rounded_size: 0,
                base_address: 0,
                stride: target_size,
            });
        }
        self.in_progress.pop();

        // stable: equal sizes keep declaration order
        areas.sort_by(|a, b| b.raw_size.cmp(&a.raw_size));
        let mut cursor = 0u64;
        for area in &mut areas {
            area.address_bits = util::address_bits(area.raw_size);
            if area.address_bits > util::BITS_PER_WORD {
                return Err(ConfigError::AddressOverflow {
                    block: block.name.clone(),
                    bits: area.address_bits,
                });
            }
            area.rounded_size = 1 << area.address_bits;
            if area.is_local() {
                area.stride = area.rounded_size;
            }
            area.base_address = cursor;
            cursor += area.rounded_size;
            trace!(
                "{}: area {} at {} ({} of {} words)",
                block.name,
                area.name,
                util::hex(area.base_address),
                area.raw_size,
                area.rounded_size
            );
        }

        let address_bits = util::address_bits(cursor);
        if address_bits > util::BITS_PER_WORD {
            return Err(ConfigError::AddressOverflow {
                block: block.name.clone(),
                bits: address_bits,
            });
        }
        let local = areas.iter().position(|a| a.is_local()).unwrap_or_default();
        let layout = Layout {
            name: block.name.clone(),
            areas,
            address_bits,
            total_address_size: 1 << address_bits,
            local,
        };
        debug!(
            "Analyzed {}: {} words, {} address bits",
            layout.name, layout.total_address_size, layout.address_bits
        );
        self.layouts.insert(block.name.clone(), layout);
        self.order.push(block.name.clone());
        Ok(())
    }
}
