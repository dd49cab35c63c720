//! Wishbone register interface generator
//!
//! `addrgen` reads a hierarchical XML description of register blocks and
//! produces, for every block in use:
//!
//! - a VHDL interface module (`<block>_wb.vhd`) decoding the bus accesses to
//!   the block's own registers and routing everything else to the nested
//!   blocks through an `xwb_crossbar`;
//! - a VHDL support package (`<block>_pkg.vhd`) with one type per register
//!   and the functions converting it from and to a bus word;
//! - optionally C headers, IPbus address tables, a FuseSoC core file, an
//!   HTML address map and a JSON or YAML map of absolute addresses.
//!
//! # Installation
//!
//! ```text
//! $ cargo install addrgen
//! ```
//!
//! # Usage
//!
//! ```text
//! $ addrgen -i system.xml --hdl hdl/ --header include/ --html doc/
//! ```
//!
//! Every option can also be read from a TOML file given with `--config`.
//!
//! # Input
//!
//! ```xml
//! <sysdef top="main" masters="1">
//!   <constant name="NCHAN" val="4"/>
//!   <block name="main">
//!     <creg name="ctrl" reps="NCHAN" stb="1">
//!       <field name="mode" width="3" type="unsigned"/>
//!       <field name="enable" width="1"/>
//!     </creg>
//!     <sreg name="status" ack="1"/>
//!     <subblock name="link" type="linkblk" reps="2"/>
//!   </block>
//!   <block name="linkblk">
//!     <creg name="cfg"/>
//!   </block>
//! </sysdef>
//! ```
//!
//! `creg` declares a control register (written by software), `sreg` a status
//! register (written by hardware). Fields are packed from bit 0 in
//! declaration order and may not exceed 32 bits in total. Numeric attributes
//! accept decimal, `0x` and `0b` literals or the name of a constant.
//!
//! Other files can be pulled in with `<!-- include path/to/file.xml -->`;
//! errors are reported against the file and line they come from.
//!
//! # Address allocation
//!
//! Word 0 of every block holds its identification word and word 1 the
//! interface version; registers follow from word 2. The local registers and
//! every sub-block reference form areas whose sizes are rounded up to powers
//! of two. Areas are placed largest first, so each one is aligned on its own
//! size and the crossbar decodes it with a single address/mask pair. A
//! repeated sub-block is placed as consecutive copies of the sub-block's
//! rounded size.
//!
//! # Generated logic
//!
//! For a control register `ctrl` the interface module drives `ctrl_o`; with
//! `stb="1"` it also pulses `ctrl_o_stb` for one cycle after each bus write.
//! A status register `status` is read from `status_i`; with `ack="1"`,
//! `status_i_ack` pulses for one cycle after each bus read. Unused addresses
//! read as `0xA5A5A5A5`.

pub mod analyze;
pub mod config;
pub mod errors;
pub mod generate;
pub mod include;
pub mod model;
pub mod parse;
pub mod util;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

pub use crate::config::Config;
pub use crate::generate::Artifact;

use crate::analyze::Analysis;
use crate::errors::ConfigError;
use crate::include::Expanded;
use crate::parse::{Design, Origins};

/// Compiles `config.input` and writes the artifacts enabled in `config`.
///
/// Nothing is written unless every artifact could be generated.
pub fn compile(config: &Config) -> Result<Vec<Artifact>> {
    let input = config.input()?;
    let source = include::expand(input, config.base_dir())
        .with_context(|| format!("Error reading {}", input.display()))?;
    let artifacts = compile_source(&source, config)?;
    generate::write(&artifacts, config)?;
    Ok(artifacts)
}

/// Generates the artifacts of an already expanded description, in memory.
pub fn compile_source(source: &Expanded, config: &Config) -> Result<Vec<Artifact>> {
    let design = parse::parse(source, config.top.as_deref())?;
    let mut analysis = Analysis::new(&design.registry);
    let layout = analysis
        .analyze(&design.top)
        .map_err(|e| located(&design, e))?;
    info!(
        "Block {} spans {} words ({} address bits)",
        design.top, layout.total_address_size, layout.address_bits
    );
    for block in design.registry.iter() {
        if analysis.layout(&block.name).is_none() {
            warn!(
                "Block {} ({}) is never used",
                block.name,
                Origins(design.origin(&block.name))
            );
        }
    }
    generate::render(&design, &analysis, config)
}

/// Adds the declaration site of the block an analysis error is about.
fn located(design: &Design, err: ConfigError) -> anyhow::Error {
    let block = match &err {
        ConfigError::UnknownBlock { block, .. }
        | ConfigError::RecursiveBlock(block)
        | ConfigError::AddressOverflow { block, .. } => Some(block.as_str()),
        _ => None,
    };
    match block {
        Some(block) => {
            let context = format!(
                "In <block name=\"{}\"> at {}",
                block,
                Origins(design.origin(block))
            );
            anyhow!(err).context(context)
        }
        None => anyhow!(err),
    }
}
