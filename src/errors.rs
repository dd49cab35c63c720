use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors in the block description itself. All of them are fatal for the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("total width of fields in register `{register}` is {width} bits, above the 32-bit limit")]
    FieldOverflow { register: String, width: u32 },
    #[error("field `{field}` in register `{register}` has zero width")]
    ZeroWidth { register: String, field: String },
    #[error("`{0}` has a zero repeat count")]
    ZeroReps(String),
    #[error("unknown node `<{tag}>` in {context}")]
    UnknownNode { tag: String, context: String },
    #[error("missing required attribute `{attribute}` on `<{tag}>`")]
    MissingAttribute { tag: String, attribute: String },
    #[error("invalid value `{value}` for attribute `{attribute}` on `<{tag}>`")]
    InvalidAttribute {
        tag: String,
        attribute: String,
        value: String,
    },
    #[error("unknown element type `{0}`, expected `std_logic_vector`, `unsigned` or `signed`")]
    UnknownType(String),
    #[error("`{0}` is not a valid VHDL identifier")]
    InvalidName(String),
    #[error("`{0}` is reserved for the generated bus interface")]
    ReservedName(String),
    #[error("duplicate name `{name}` in {scope}")]
    DuplicateName { scope: String, name: String },
    #[error("duplicate definition of block `{0}`")]
    DuplicateBlock(String),
    #[error("duplicate definition of constant `{0}`")]
    DuplicateConstant(String),
    #[error("unknown constant `{0}`")]
    UnknownConstant(String),
    #[error("block `{block}` references undeclared block type `{ty}`")]
    UnknownBlock { block: String, ty: String },
    #[error("top block `{0}` is not declared")]
    UnknownTop(String),
    #[error("block `{0}` contains itself")]
    RecursiveBlock(String),
    #[error("address space of block `{block}` needs {bits} address bits, more than 32")]
    AddressOverflow { block: String, bits: u32 },
    #[error("register `{register}` of block `{block}` runs past the 32-bit register address space")]
    RegisterOverflow { block: String, register: String },
    #[error("`{flag}` flag is not allowed on {kind} register `{register}`")]
    MisplacedFlag {
        register: String,
        kind: &'static str,
        flag: &'static str,
    },
}

/// Failures of the include expansion step.
#[derive(Debug, Error)]
pub enum IncludeError {
    #[error("couldn't read `{}`{}", path.display(), IncludedFrom(included_from))]
    Read {
        path: PathBuf,
        included_from: Option<SourceLine>,
        #[source]
        source: io::Error,
    },
}

struct IncludedFrom<'a>(&'a Option<SourceLine>);

impl fmt::Display for IncludedFrom<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(line) => write!(f, " included from {line}"),
            None => Ok(()),
        }
    }
}

/// A line of an original (pre-expansion) source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLine {
    pub path: PathBuf,
    /// 1-based
    pub line: usize,
}

impl fmt::Display for SourceLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}
