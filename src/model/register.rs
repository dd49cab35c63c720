use std::ops::Range;

use log::trace;

use crate::errors::ConfigError;
use crate::model::field::{ElementType, Field, FieldOptions};
use crate::util::{self, BITS_PER_WORD};

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterKind {
    /// Written by software, read by hardware
    Control,
    /// Written by hardware, read by software
    Status,
}

impl RegisterKind {
    /// Tag of the XML node declaring a register of this kind.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Control => "creg",
            Self::Status => "sreg",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Status => "status",
        }
    }
}

/// Everything a register declaration may specify, with defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterOptions {
    pub name: String,
    pub kind: RegisterKind,
    pub reps: u32,
    /// Type of a register without fields.
    pub element_type: ElementType,
    pub fields: Vec<FieldOptions>,
    /// One-cycle pulse after each bus write (control registers).
    pub strobe: bool,
    /// One-cycle pulse after each bus read (status registers).
    pub ack: bool,
    pub description: Option<String>,
}

impl RegisterOptions {
    pub fn new(name: &str, kind: RegisterKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            reps: 1,
            element_type: ElementType::default(),
            fields: Vec::new(),
            strobe: false,
            ack: false,
            description: None,
        }
    }
}

/// A control or status register, or an array of identical ones.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Register {
    pub name: String,
    pub kind: RegisterKind,
    pub reps: u32,
    /// Word address of the first element, relative to the local register area.
    pub base: u32,
    pub element_type: ElementType,
    pub fields: Vec<Field>,
    pub strobe: bool,
    pub ack: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl Register {
    /// Places the fields of `options` contiguously from bit 0 and assigns the
    /// register `reps` consecutive addresses starting at `base`.
    ///
    /// `base + reps` must fit in a `u32`; [`Block::new`](super::Block::new)
    /// checks this before placing the register.
    pub(crate) fn new(options: RegisterOptions, base: u32) -> Result<Self, ConfigError> {
        let RegisterOptions {
            name,
            kind,
            reps,
            element_type,
            fields: field_options,
            strobe,
            ack,
            description,
        } = options;

        util::check_name(&name)?;
        if reps == 0 {
            return Err(ConfigError::ZeroReps(name));
        }
        let misplaced = match kind {
            RegisterKind::Control if ack => Some("ack"),
            RegisterKind::Status if strobe => Some("stb"),
            _ => None,
        };
        if let Some(flag) = misplaced {
            return Err(ConfigError::MisplacedFlag {
                register: name,
                kind: kind.describe(),
                flag,
            });
        }

        let mut fields: Vec<Field> = Vec::with_capacity(field_options.len());
        let mut free_bit = 0u32;
        for fo in field_options {
            util::check_name(&fo.name)?;
            if fo.width == 0 {
                return Err(ConfigError::ZeroWidth {
                    register: name,
                    field: fo.name,
                });
            }
            if fields.iter().any(|f| f.name == fo.name) {
                return Err(ConfigError::DuplicateName {
                    scope: format!("register `{name}`"),
                    name: fo.name,
                });
            }
            let offset = free_bit;
            free_bit = free_bit.saturating_add(fo.width);
            if free_bit > BITS_PER_WORD {
                return Err(ConfigError::FieldOverflow {
                    register: name,
                    width: free_bit,
                });
            }
            trace!("Field {}.{}: bits {}..{}", name, fo.name, offset, free_bit);
            fields.push(Field::place(fo, offset));
        }

        Ok(Self {
            name,
            kind,
            reps,
            base,
            element_type,
            fields,
            strobe,
            ack,
            description,
        })
    }

    pub fn addresses(&self) -> Range<u32> {
        self.base..self.base + self.reps
    }

    pub fn is_array(&self) -> bool {
        self.reps > 1
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Number of bits of the bus word carrying data.
    pub fn width(&self) -> u32 {
        if self.has_fields() {
            self.fields.iter().map(|f| f.width).sum()
        } else {
            BITS_PER_WORD
        }
    }

    /// `(offset, width)` of every value carried by the register; a register
    /// without fields carries a single 32-bit value.
    fn segments(&self) -> Vec<(u32, u32)> {
        if self.has_fields() {
            self.fields.iter().map(|f| (f.offset, f.width)).collect()
        } else {
            vec![(0, BITS_PER_WORD)]
        }
    }

    /// Packs one value per field into a bus word, the way the generated
    /// `t_<reg>_to_slv` function does. Values are truncated to the field
    /// width, missing values are zero and bits above [`Register::width`]
    /// are always zero.
    pub fn pack(&self, values: &[u64]) -> u32 {
        self.segments()
            .into_iter()
            .zip(values)
            .fold(0, |word, ((offset, width), &value)| {
                word | ((value as u32 & util::mask(width)) << offset)
            })
    }

    /// Splits a bus word into one value per field, the way the generated
    /// `slv_to_t_<reg>` function does.
    pub fn unpack(&self, word: u32) -> Vec<u64> {
        self.segments()
            .into_iter()
            .map(|(offset, width)| u64::from((word >> offset) & util::mask(width)))
            .collect()
    }
}
