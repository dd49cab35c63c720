//! Registers, bit fields and blocks as declared in the input description.

pub mod block;
pub mod field;
pub mod register;

use std::collections::HashMap;

pub use block::{Block, BlockOptions, Item, SubblockRef};
pub use field::{ElementType, Field, FieldOptions};
pub use register::{Register, RegisterKind, RegisterOptions};

use crate::errors::ConfigError;

/// All block types known to one compilation run.
///
/// Filled once while reading the description and only read afterwards;
/// analysis results are kept apart, in [`crate::analyze::Analysis`].
#[derive(Clone, Debug, Default)]
pub struct Registry {
    blocks: Vec<Block>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blocks(blocks: impl IntoIterator<Item = Block>) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for block in blocks {
            registry.insert(block)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, block: Block) -> Result<(), ConfigError> {
        if self.index.contains_key(&block.name) {
            return Err(ConfigError::DuplicateBlock(block.name));
        }
        self.index.insert(block.name.clone(), self.blocks.len());
        self.blocks.push(block);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Block> {
        self.index.get(name).map(|&i| &self.blocks[i])
    }

    /// Blocks in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
