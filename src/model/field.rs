use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// Scalar type of a register or bit field in the generated HDL.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ElementType {
    #[default]
    StdLogicVector,
    Unsigned,
    Signed,
}

impl ElementType {
    pub fn vhdl_name(self) -> &'static str {
        match self {
            Self::StdLogicVector => "std_logic_vector",
            Self::Unsigned => "unsigned",
            Self::Signed => "signed",
        }
    }
}

impl FromStr for ElementType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "std_logic_vector" => Self::StdLogicVector,
            "unsigned" => Self::Unsigned,
            "signed" => Self::Signed,
            _ => return Err(ConfigError::UnknownType(s.to_string())),
        })
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.vhdl_name())
    }
}

/// Declaration of a bit field, before it is placed in its register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldOptions {
    pub name: String,
    pub width: u32,
    pub element_type: ElementType,
    pub description: Option<String>,
}

impl FieldOptions {
    pub fn new(name: &str, width: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            element_type: ElementType::default(),
            description: None,
        }
    }
}

/// A named bit range of a register.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub width: u32,
    /// Position of the least significant bit.
    pub offset: u32,
    pub element_type: ElementType,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl Field {
    pub(crate) fn place(options: FieldOptions, offset: u32) -> Self {
        Self {
            name: options.name,
            width: options.width,
            offset,
            element_type: options.element_type,
            description: options.description,
        }
    }

    /// Position of the most significant bit.
    pub fn msb(&self) -> u32 {
        self.offset + self.width - 1
    }

    /// Mask of the field within the register word.
    pub fn mask(&self) -> u32 {
        crate::util::mask(self.width) << self.offset
    }
}
