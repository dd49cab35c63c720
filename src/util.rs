use std::sync::OnceLock;

use regex::Regex;

use crate::errors::ConfigError;

/// Width of the bus data word.
pub const BITS_PER_WORD: u32 = 32;

/// VHDL-2008 reserved words. Names of blocks, registers and fields become
/// identifiers in the generated code, so these are rejected.
const VHDL_KEYWORDS: &[&str] = &[
    "abs", "access", "after", "alias", "all", "and", "architecture", "array", "assert",
    "assume", "assume_guarantee", "attribute", "begin", "block", "body", "buffer", "bus",
    "case", "component", "configuration", "constant", "context", "cover", "default",
    "disconnect", "downto", "else", "elsif", "end", "entity", "exit", "fairness", "file",
    "for", "force", "function", "generate", "generic", "group", "guarded", "if", "impure",
    "in", "inertial", "inout", "is", "label", "library", "linkage", "literal", "loop", "map",
    "mod", "nand", "new", "next", "nor", "not", "null", "of", "on", "open", "or", "others",
    "out", "package", "parameter", "port", "postponed", "procedure", "process", "property",
    "protected", "pure", "range", "record", "register", "reject", "release", "rem", "report",
    "restrict", "restrict_guarantee", "return", "rol", "ror", "select", "sequence",
    "severity", "shared", "signal", "sla", "sll", "sra", "srl", "strong", "subtype", "then",
    "to", "transport", "type", "unaffected", "units", "until", "use", "variable", "vmode",
    "vprop", "vunit", "wait", "when", "while", "with", "xnor", "xor",
];

fn identifier() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    // basic identifiers: no leading, trailing or doubled underscores
    IDENTIFIER.get_or_init(|| Regex::new(r"^[A-Za-z](_?[A-Za-z0-9])*$").unwrap())
}

/// Fails unless `name` can be used as-is as a VHDL basic identifier.
pub fn check_name(name: &str) -> Result<(), ConfigError> {
    if identifier().is_match(name) && !VHDL_KEYWORDS.contains(&&*name.to_lowercase()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName(name.to_string()))
    }
}

/// Number of address bits needed to decode `size` words: `⌈log2 size⌉`.
pub fn address_bits(size: u64) -> u32 {
    size.max(1)
        .checked_next_power_of_two()
        .map_or(u64::BITS, u64::trailing_zeros)
}

/// Parses a decimal, `0x` hexadecimal or `0b` binary literal.
pub fn parse_int(s: &str) -> Option<u64> {
    let s = s.trim().replace('_', "");
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (bin, 2)
    } else {
        (&s[..], 10)
    };
    u64::from_str_radix(digits, radix).ok()
}

pub fn respace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn hex(n: u64) -> String {
    format!("0x{n:08x}")
}

/// `width`-bit binary VHDL string literal, e.g. `"0101"`.
pub fn binary(n: u64, width: u32) -> String {
    format!("\"{:0width$b}\"", n, width = width as usize)
}

/// 32-bit VHDL hex literal, e.g. `x"0000abcd"`.
pub fn vhdl_hex(n: u32) -> String {
    format!("x\"{n:08x}\"")
}

/// Mask covering the low `width` bits of a word.
pub fn mask(width: u32) -> u32 {
    if width >= BITS_PER_WORD {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}
