use log::debug;

use crate::errors::ConfigError;
use crate::model::register::{Register, RegisterOptions};
use crate::util;

/// Address of the block identification word.
pub const ID_ADDRESS: u32 = 0;
/// Address of the interface version word.
pub const VERSION_ADDRESS: u32 = 1;
/// First address available to registers.
pub const FIRST_REGISTER_ADDRESS: u32 = 2;

/// Prefixes of the ports and signals of the generated bus interface.
const RESERVED_NAMES: &[&str] = &["slave", "wb_up", "wb_m", "int_regs", "int_addr", "rst_n", "clk_sys"];

fn check_member_name(name: &str) -> Result<(), ConfigError> {
    util::check_name(name)?;
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(name)) {
        return Err(ConfigError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Reference to another block type, possibly repeated.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubblockRef {
    /// Instance name, used for ports and documentation.
    pub name: String,
    /// Name of the referenced block type.
    pub ty: String,
    pub reps: u32,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl SubblockRef {
    /// A single instance named after its type.
    pub fn new(ty: &str) -> Self {
        Self {
            name: ty.to_string(),
            ty: ty.to_string(),
            reps: 1,
            description: None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.reps > 1
    }
}

/// A child of a block declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Register(RegisterOptions),
    Subblock(SubblockRef),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockOptions {
    pub name: String,
    /// Explicit identification word.
    pub id: Option<u32>,
    pub description: Option<String>,
    /// Children in declaration order.
    pub items: Vec<Item>,
}

impl BlockOptions {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn register(mut self, options: RegisterOptions) -> Self {
        self.items.push(Item::Register(options));
        self
    }

    pub fn subblock(mut self, subblock: SubblockRef) -> Self {
        self.items.push(Item::Subblock(subblock));
        self
    }
}

/// One addressable unit: local registers plus references to nested blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub id: Option<u32>,
    pub description: Option<String>,
    pub registers: Vec<Register>,
    pub subblocks: Vec<SubblockRef>,
    free_reg_addr: u32,
}

impl Block {
    /// Builds the block, assigning register addresses in declaration order
    /// right after the ID and version words.
    pub fn new(options: BlockOptions) -> Result<Self, ConfigError> {
        util::check_name(&options.name)?;
        let mut block = Self {
            name: options.name,
            id: options.id,
            description: options.description,
            registers: Vec::new(),
            subblocks: Vec::new(),
            free_reg_addr: FIRST_REGISTER_ADDRESS,
        };
        for item in options.items {
            let name = match &item {
                Item::Register(options) => &options.name,
                Item::Subblock(subblock) => &subblock.name,
            };
            if block.contains(name) {
                return Err(ConfigError::DuplicateName {
                    scope: format!("block `{}`", block.name),
                    name: name.clone(),
                });
            }
            check_member_name(name)?;
            match item {
                Item::Register(options) => {
                    let Some(next) = block.free_reg_addr.checked_add(options.reps) else {
                        return Err(ConfigError::RegisterOverflow {
                            block: block.name,
                            register: options.name,
                        });
                    };
                    let register = Register::new(options, block.free_reg_addr)?;
                    block.free_reg_addr = next;
                    block.registers.push(register);
                }
                Item::Subblock(subblock) => {
                    util::check_name(&subblock.ty)?;
                    if subblock.reps == 0 {
                        return Err(ConfigError::ZeroReps(subblock.name));
                    }
                    block.subblocks.push(subblock);
                }
            }
        }
        debug!(
            "Block {}: {} registers, {} subblocks, {} local words",
            block.name,
            block.registers.len(),
            block.subblocks.len(),
            block.free_reg_addr
        );
        Ok(block)
    }

    fn contains(&self, name: &str) -> bool {
        self.registers.iter().any(|r| r.name == name)
            || self.subblocks.iter().any(|s| s.name == name)
    }

    /// Number of words used by the ID, version and register words.
    pub fn free_reg_addr(&self) -> u32 {
        self.free_reg_addr
    }

    pub fn register(&self, name: &str) -> Option<&Register> {
        self.registers.iter().find(|r| r.name == name)
    }

    /// Value of the identification word: the explicit `id`, or the CRC-32
    /// of the block name.
    pub fn id_word(&self) -> u32 {
        self.id
            .unwrap_or_else(|| crc32fast::hash(self.name.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::register::RegisterKind;

    #[test]
    fn registers_follow_the_reserved_words() {
        let mut arr = RegisterOptions::new("arr", RegisterKind::Control);
        arr.reps = 3;
        let block = Block::new(
            BlockOptions::new("blk")
                .register(RegisterOptions::new("ctrl", RegisterKind::Control))
                .subblock(SubblockRef::new("child"))
                .register(arr)
                .register(RegisterOptions::new("status", RegisterKind::Status)),
        )
        .unwrap();

        let bases: Vec<_> = block.registers.iter().map(|r| r.addresses()).collect();
        assert_eq!(bases, [2..3, 3..6, 6..7]);
        assert_eq!(block.free_reg_addr(), 7);
        assert_eq!(block.subblocks.len(), 1);
    }

    #[test]
    fn register_ranges_never_overlap() {
        let mut options = BlockOptions::new("blk");
        for (i, reps) in [1, 4, 2, 1, 7].into_iter().enumerate() {
            let mut reg = RegisterOptions::new(&format!("r{i}"), RegisterKind::Status);
            reg.reps = reps;
            options = options.register(reg);
        }
        let block = Block::new(options).unwrap();
        for (i, a) in block.registers.iter().enumerate() {
            assert!(a.base >= FIRST_REGISTER_ADDRESS);
            for b in &block.registers[i + 1..] {
                let (a, b) = (a.addresses(), b.addresses());
                assert!(a.end <= b.start || b.end <= a.start);
            }
        }
    }

    #[test]
    fn names_are_unique_within_a_block() {
        let err = Block::new(
            BlockOptions::new("blk")
                .register(RegisterOptions::new("x", RegisterKind::Control))
                .subblock(SubblockRef::new("x")),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { .. }));

        let err = Block::new(
            BlockOptions::new("blk").register(RegisterOptions::new("slave", RegisterKind::Status)),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ReservedName(_)));
    }

    #[test]
    fn register_words_must_fit_the_address_space() {
        let mut big = RegisterOptions::new("big", RegisterKind::Control);
        big.reps = u32::MAX;
        let err = Block::new(
            BlockOptions::new("blk")
                .register(RegisterOptions::new("ctrl", RegisterKind::Control))
                .register(big),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::RegisterOverflow { ref block, ref register } if block == "blk" && register == "big"
        ));

        let mut last = RegisterOptions::new("last", RegisterKind::Status);
        last.reps = u32::MAX - FIRST_REGISTER_ADDRESS;
        let block = Block::new(BlockOptions::new("blk").register(last)).unwrap();
        assert_eq!(block.free_reg_addr(), u32::MAX);
        assert_eq!(block.registers[0].addresses().end, u32::MAX);
    }

    #[test]
    fn id_defaults_to_name_checksum() {
        let block = Block::new(BlockOptions::new("main")).unwrap();
        assert_eq!(block.id_word(), crc32fast::hash(b"main"));

        let mut options = BlockOptions::new("main");
        options.id = Some(0x1234);
        assert_eq!(Block::new(options).unwrap().id_word(), 0x1234);
    }
}
