//! Wishbone interface module and support package of a block.

use anyhow::Result;
use log::{debug, trace};

use crate::analyze::Layout;
use crate::generate::template::{self, Values};
use crate::generate::{Artifact, ArtifactKind};
use crate::model::block::{ID_ADDRESS, VERSION_ADDRESS};
use crate::model::{Block, Register, RegisterKind};
use crate::util;

const WB_TEMPLATE: &str = include_str!("templates/wb.vhd");
const PKG_TEMPLATE: &str = include_str!("templates/pkg.vhd");

/// Settings shared by every block of a design.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    /// Number of bus masters driving the block.
    pub masters: u32,
    /// Registered crossbar outputs.
    pub registered: bool,
    /// Interface version word.
    pub version: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            masters: 1,
            registered: false,
            version: 0,
        }
    }
}

/// Named text sections filling the templates of one block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockSections {
    pub block: String,
    pub id: String,
    pub version: String,
    pub address_bits: u32,
    /// Address bits decoded by the local register process.
    pub local_bits: u32,
    pub masters: u32,
    pub slots: u32,
    pub registered: bool,
    pub ports: Vec<String>,
    pub signals: Vec<String>,
    pub addresses: Vec<String>,
    pub masks: Vec<String>,
    pub slave_connections: Vec<String>,
    pub connections: Vec<String>,
    pub pulse_defaults: Vec<String>,
    pub resets: Vec<String>,
    pub register_access: Vec<String>,
    pub outputs: Vec<String>,
    pub types: Vec<String>,
    pub functions: Vec<String>,
}

impl BlockSections {
    fn values(&self) -> Values {
        let lines = |v: &[String]| v.join("\n");
        let mut values = Values::new();
        values.insert("tool_version", env!("CARGO_PKG_VERSION").to_string());
        values.insert("block", self.block.clone());
        values.insert("id", self.id.clone());
        values.insert("version", self.version.clone());
        values.insert("address_bits", self.address_bits.to_string());
        values.insert("local_bits", self.local_bits.to_string());
        values.insert("masters", self.masters.to_string());
        values.insert("last_master", (self.masters - 1).to_string());
        values.insert("slots", self.slots.to_string());
        values.insert("last_slot", (self.slots - 1).to_string());
        values.insert("registered", self.registered.to_string());
        values.insert("id_address", self.local_address(ID_ADDRESS));
        values.insert("version_address", self.local_address(VERSION_ADDRESS));
        values.insert("ports", self.ports.join(";\n"));
        values.insert("addresses", self.addresses.join(",\n"));
        values.insert("masks", self.masks.join(",\n"));
        values.insert("signals", lines(&self.signals));
        values.insert("slave_connections", lines(&self.slave_connections));
        values.insert("connections", lines(&self.connections));
        values.insert("pulse_defaults", lines(&self.pulse_defaults));
        values.insert("resets", lines(&self.resets));
        values.insert("register_access", lines(&self.register_access));
        values.insert("outputs", lines(&self.outputs));
        values.insert("types", lines(&self.types));
        values.insert("functions", lines(&self.functions));
        values
    }

    fn local_address(&self, address: u32) -> String {
        util::binary(address.into(), self.local_bits)
    }
}

fn register_type(reg: &Register) -> String {
    if reg.is_array() {
        format!("t_{}_array", reg.name)
    } else {
        format!("t_{}", reg.name)
    }
}

/// `std_logic` for a single register, a vector for an array.
fn pulse_type(reg: &Register) -> String {
    if reg.is_array() {
        format!("std_logic_vector({} downto 0)", reg.reps - 1)
    } else {
        "std_logic".to_string()
    }
}

fn pulse_port(reg: &Register) -> Option<String> {
    match reg.kind {
        RegisterKind::Control if reg.strobe => Some(format!("{}_o_stb", reg.name)),
        RegisterKind::Status if reg.ack => Some(format!("{}_i_ack", reg.name)),
        _ => None,
    }
}

fn index(reg: &Register, i: u32) -> String {
    if reg.is_array() {
        format!("({i})")
    } else {
        String::new()
    }
}

/// Type and conversion functions of `reg` for the support package.
fn package_items(reg: &Register, s: &mut BlockSections) {
    let t = format!("t_{}", reg.name);
    let mut decl = Vec::new();
    let mut body = Vec::new();

    if reg.has_fields() {
        decl.push(format!("type {t} is record"));
        for f in &reg.fields {
            decl.push(format!(
                "  {} : {}({} downto 0);",
                f.name,
                f.element_type.vhdl_name(),
                f.width - 1
            ));
        }
        decl.push("end record;".to_string());

        body.push(format!("function {t}_to_slv(x : {t}) return std_logic_vector is"));
        body.push("  variable res : std_logic_vector(31 downto 0) := (others => '0');".to_string());
        body.push("begin".to_string());
        for f in &reg.fields {
            body.push(format!(
                "  res({} downto {}) := std_logic_vector(x.{});",
                f.msb(),
                f.offset,
                f.name
            ));
        }
        body.push("  return res;".to_string());
        body.push("end function;".to_string());
        body.push(String::new());
        body.push(format!("function slv_to_{t}(x : std_logic_vector) return {t} is"));
        body.push(format!("  variable res : {t};"));
        body.push("begin".to_string());
        for f in &reg.fields {
            body.push(format!(
                "  res.{} := {}(x({} downto {}));",
                f.name,
                f.element_type.vhdl_name(),
                f.msb(),
                f.offset
            ));
        }
        body.push("  return res;".to_string());
        body.push("end function;".to_string());
    } else {
        decl.push(format!(
            "subtype {t} is {}(31 downto 0);",
            reg.element_type.vhdl_name()
        ));
        body.push(format!("function {t}_to_slv(x : {t}) return std_logic_vector is"));
        body.push("begin".to_string());
        body.push("  return std_logic_vector(x);".to_string());
        body.push("end function;".to_string());
        body.push(String::new());
        body.push(format!("function slv_to_{t}(x : std_logic_vector) return {t} is"));
        body.push("begin".to_string());
        body.push(format!("  return {t}(x);"));
        body.push("end function;".to_string());
    }
    decl.push(format!("function {t}_to_slv(x : {t}) return std_logic_vector;"));
    decl.push(format!("function slv_to_{t}(x : std_logic_vector) return {t};"));
    if reg.is_array() {
        decl.push(format!("type {t}_array is array (0 to {}) of {t};", reg.reps - 1));
    }
    decl.push(String::new());
    body.push(String::new());
    s.types.push(decl.join("\n"));
    s.functions.push(body.join("\n"));
}

/// Ports, signals and case arms of `reg`.
fn register_logic(reg: &Register, local_bits: u32, s: &mut BlockSections) {
    let name = &reg.name;
    let ty = register_type(reg);
    let pulse = pulse_port(reg);

    match reg.kind {
        RegisterKind::Control => {
            s.ports.push(format!("{name}_o : out {ty}"));
            s.signals.push(format!("signal int_{name}_o : {ty};"));
            s.outputs.push(format!("{name}_o <= int_{name}_o;"));
            let zero = format!("slv_to_t_{name}(x\"00000000\")");
            s.resets.push(if reg.is_array() {
                format!("int_{name}_o <= (others => {zero});")
            } else {
                format!("int_{name}_o <= {zero};")
            });
        }
        RegisterKind::Status => s.ports.push(format!("{name}_i : in {ty}")),
    }
    if let Some(pulse) = &pulse {
        s.ports.push(format!("{pulse} : out {}", pulse_type(reg)));
        s.pulse_defaults.push(if reg.is_array() {
            format!("{pulse} <= (others => '0');")
        } else {
            format!("{pulse} <= '0';")
        });
    }

    for i in 0..reg.reps {
        let address = reg.base + i;
        let ix = index(reg, i);
        trace!("{}: {}{} at {}", s.block, name, ix, util::hex(address.into()));
        let mut arm = vec![format!(
            "when {} =>  -- {} {name}{ix}",
            util::binary(address.into(), local_bits),
            util::hex(address.into())
        )];
        match reg.kind {
            RegisterKind::Control => {
                arm.push(format!("  int_regs_wb_m_i.dat <= t_{name}_to_slv(int_{name}_o{ix});"));
                arm.push("  if int_regs_wb_m_o.we = '1' then".to_string());
                arm.push(format!("    int_{name}_o{ix} <= slv_to_t_{name}(int_regs_wb_m_o.dat);"));
                if let Some(pulse) = &pulse {
                    arm.push(format!("    {pulse}{ix} <= '1';"));
                }
                arm.push("  end if;".to_string());
            }
            RegisterKind::Status => {
                arm.push(format!("  int_regs_wb_m_i.dat <= t_{name}_to_slv({name}_i{ix});"));
                if let Some(pulse) = &pulse {
                    arm.push("  if int_regs_wb_m_o.we = '0' then".to_string());
                    arm.push(format!("    {pulse}{ix} <= '1';"));
                    arm.push("  end if;".to_string());
                }
            }
        }
        s.register_access.push(arm.join("\n"));
    }
}

/// Builds the sections of `block`, analysed as `layout`.
pub fn sections(block: &Block, layout: &Layout, options: &Options) -> BlockSections {
    let local_bits = layout.local_area().address_bits;
    let mut s = BlockSections {
        block: block.name.clone(),
        id: util::vhdl_hex(block.id_word()),
        version: util::vhdl_hex(options.version),
        address_bits: layout.address_bits,
        local_bits,
        masters: options.masters,
        registered: options.registered,
        ..Default::default()
    };

    s.ports.push("rst_n_i   : in  std_logic".to_string());
    s.ports.push("clk_sys_i : in  std_logic".to_string());
    if options.masters > 1 {
        let last = options.masters - 1;
        s.ports.push(format!("slave_i : in  t_wishbone_slave_in_array(0 to {last})"));
        s.ports.push(format!("slave_o : out t_wishbone_slave_out_array(0 to {last})"));
        s.slave_connections.push("wb_up_i <= slave_i;".to_string());
        s.slave_connections.push("slave_o <= wb_up_o;".to_string());
    } else {
        s.ports.push("slave_i : in  t_wishbone_slave_in".to_string());
        s.ports.push("slave_o : out t_wishbone_slave_out".to_string());
        s.slave_connections.push("wb_up_i(0) <= slave_i;".to_string());
        s.slave_connections.push("slave_o <= wb_up_o(0);".to_string());
    }

    let mut slot = 0u32;
    for area in &layout.areas {
        if !area.is_local() {
            let (out_ty, in_ty) = if area.is_array() {
                let range = format!("(0 to {})", area.reps - 1);
                (
                    format!("t_wishbone_master_out_array{range}"),
                    format!("t_wishbone_master_in_array{range}"),
                )
            } else {
                (
                    "t_wishbone_master_out".to_string(),
                    "t_wishbone_master_in".to_string(),
                )
            };
            s.ports.push(format!("{}_wb_m_o : out {out_ty}", area.name));
            s.ports.push(format!("{}_wb_m_i : in  {in_ty}", area.name));
        }
        for (i, window) in area.windows().enumerate() {
            let port = |dir: char| {
                if area.is_array() {
                    format!("{}_wb_m_{dir}({i})", area.name)
                } else {
                    format!("{}_wb_m_{dir}", area.name)
                }
            };
            s.connections.push(format!("{} <= wb_m_o({slot});", port('o')));
            s.connections.push(format!("wb_m_i({slot}) <= {};", port('i')));
            // windows never exceed the 32-bit address space
            s.addresses.push(format!("{slot} => {}", util::vhdl_hex(window.base as u32)));
            s.masks.push(format!("{slot} => {}", util::vhdl_hex(window.mask() as u32)));
            slot += 1;
        }
    }
    s.slots = slot;

    for reg in &block.registers {
        package_items(reg, &mut s);
        register_logic(reg, local_bits, &mut s);
    }
    s
}

/// Renders the interface module and support package of `block`.
pub fn render(block: &Block, layout: &Layout, options: &Options) -> Result<Vec<Artifact>> {
    let sections = sections(block, layout, options);
    debug!(
        "{}: {} crossbar slots, {} register arms",
        block.name,
        sections.slots,
        sections.register_access.len()
    );
    let values = sections.values();
    Ok(vec![
        Artifact::new(
            ArtifactKind::Hdl,
            format!("{}_wb.vhd", block.name),
            template::render("wb.vhd", WB_TEMPLATE, &values)?,
        ),
        Artifact::new(
            ArtifactKind::Hdl,
            format!("{}_pkg.vhd", block.name),
            template::render("pkg.vhd", PKG_TEMPLATE, &values)?,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::Analysis;
    use crate::model::{BlockOptions, FieldOptions, Registry, RegisterOptions, SubblockRef};

    /// A block whose local area uses exactly `words` words.
    fn filler(name: &str, words: u32, subblocks: &[(&str, &str, u32)]) -> Block {
        let mut options = BlockOptions::new(name);
        if words > 2 {
            let mut fill = RegisterOptions::new("fill", RegisterKind::Status);
            fill.reps = words - 2;
            options = options.register(fill);
        }
        for &(instance, ty, reps) in subblocks {
            let mut sb = SubblockRef::new(ty);
            sb.name = instance.to_string();
            sb.reps = reps;
            options = options.subblock(sb);
        }
        Block::new(options).unwrap()
    }

    fn sample() -> Block {
        let mut ctrl = RegisterOptions::new("ctrl", RegisterKind::Control);
        ctrl.reps = 2;
        ctrl.strobe = true;
        ctrl.fields = vec![FieldOptions::new("mode", 3), FieldOptions::new("en", 1)];
        let mut status = RegisterOptions::new("status", RegisterKind::Status);
        status.ack = true;
        Block::new(BlockOptions::new("main").register(ctrl).register(status)).unwrap()
    }

    fn sections_of(registry: &Registry, name: &str, options: &Options) -> BlockSections {
        let mut analysis = Analysis::new(registry);
        let layout = analysis.analyze(name).unwrap().clone();
        sections(registry.get(name).unwrap(), &layout, options)
    }

    #[test]
    fn one_case_arm_per_register_word() {
        let registry = Registry::from_blocks([sample()]).unwrap();
        let s = sections_of(&registry, "main", &Options::default());
        // 2 reserved + 2 + 1 words
        assert_eq!(s.local_bits, 3);
        let arms: Vec<_> = s
            .register_access
            .iter()
            .map(|a| a.lines().next().unwrap().to_string())
            .collect();
        assert_eq!(
            arms,
            [
                "when \"010\" =>  -- 0x00000002 ctrl(0)",
                "when \"011\" =>  -- 0x00000003 ctrl(1)",
                "when \"100\" =>  -- 0x00000004 status",
            ]
        );
        assert!(s.register_access[1].contains("int_ctrl_o(1) <= slv_to_t_ctrl(int_regs_wb_m_o.dat);"));
        assert!(s.register_access[1].contains("ctrl_o_stb(1) <= '1';"));
        assert!(s.register_access[2].contains("status_i_ack <= '1';"));
        assert!(s.ports.contains(&"ctrl_o_stb : out std_logic_vector(1 downto 0)".to_string()));
        assert!(s.ports.contains(&"status_i_ack : out std_logic".to_string()));
        assert!(s.ports.contains(&"ctrl_o : out t_ctrl_array".to_string()));
        assert!(s.ports.contains(&"status_i : in t_status".to_string()));
        assert_eq!(s.values()["id_address"], "\"000\"");
        assert_eq!(s.values()["version_address"], "\"001\"");
    }

    #[test]
    fn address_and_mask_vectors_follow_the_layout() {
        let registry = Registry::from_blocks([
            filler("top", 8, &[("big", "bigblk", 1), ("small", "smallblk", 1)]),
            filler("bigblk", 16, &[]),
            filler("smallblk", 4, &[]),
        ])
        .unwrap();
        let s = sections_of(&registry, "top", &Options::default());
        assert_eq!(s.slots, 3);
        assert_eq!(
            s.addresses,
            ["0 => x\"00000000\"", "1 => x\"00000010\"", "2 => x\"00000018\""]
        );
        assert_eq!(
            s.masks,
            ["0 => x\"0000000f\"", "1 => x\"00000007\"", "2 => x\"00000003\""]
        );
        assert_eq!(
            s.connections[..2],
            ["big_wb_m_o <= wb_m_o(0);", "wb_m_i(0) <= big_wb_m_i;"]
        );
        assert_eq!(
            s.connections[2..4],
            ["int_regs_wb_m_o <= wb_m_o(1);", "wb_m_i(1) <= int_regs_wb_m_i;"]
        );
    }

    #[test]
    fn repeated_subblocks_take_consecutive_slots() {
        let registry = Registry::from_blocks([
            filler("top", 2, &[("link", "leaf", 3)]),
            filler("leaf", 4, &[]),
        ])
        .unwrap();
        let s = sections_of(&registry, "top", &Options::default());
        assert_eq!(s.slots, 4);
        assert_eq!(
            s.addresses,
            [
                "0 => x\"00000000\"",
                "1 => x\"00000004\"",
                "2 => x\"00000008\"",
                "3 => x\"00000010\"",
            ]
        );
        assert_eq!(
            s.masks,
            [
                "0 => x\"00000003\"",
                "1 => x\"00000003\"",
                "2 => x\"00000003\"",
                "3 => x\"00000001\"",
            ]
        );
        assert!(s
            .ports
            .contains(&"link_wb_m_o : out t_wishbone_master_out_array(0 to 2)".to_string()));
        assert!(s.connections.contains(&"wb_m_i(2) <= link_wb_m_i(2);".to_string()));
    }

    #[test]
    fn several_masters_use_array_ports() {
        let registry = Registry::from_blocks([sample()]).unwrap();
        let options = Options {
            masters: 2,
            ..Default::default()
        };
        let s = sections_of(&registry, "main", &options);
        assert!(s
            .ports
            .contains(&"slave_i : in  t_wishbone_slave_in_array(0 to 1)".to_string()));
        assert_eq!(s.values()["last_master"], "1");
    }

    #[test]
    fn rendering_is_deterministic() {
        let registry = Registry::from_blocks([sample()]).unwrap();
        let mut analysis = Analysis::new(&registry);
        let layout = analysis.analyze("main").unwrap().clone();
        let block = registry.get("main").unwrap();
        let options = Options {
            version: 0x0102_0304,
            ..Default::default()
        };
        let first = render(block, &layout, &options).unwrap();
        let second = render(block, &layout, &options).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.get("main"), Some(block));

        let wb = &first[0];
        assert_eq!(wb.file_name, "main_wb.vhd");
        assert!(wb.contents.contains("entity main_wb is"));
        assert!(wb.contents.contains("g_num_slaves  => 1,"));
        assert!(wb.contents.contains("when others =>\n            int_regs_wb_m_i.dat <= x\"A5A5A5A5\";"));
        assert!(!wb.contents.contains('{'));

        let pkg = &first[1];
        assert_eq!(pkg.file_name, "main_pkg.vhd");
        assert!(pkg.contents.contains("c_main_ver       : std_logic_vector(31 downto 0) := x\"01020304\";"));
        assert!(pkg.contents.contains("    mode : std_logic_vector(2 downto 0);"));
        assert!(pkg.contents.contains("    res(3 downto 3) := std_logic_vector(x.en);"));
        assert!(pkg.contents.contains("  type t_ctrl_array is array (0 to 1) of t_ctrl;"));
        assert!(pkg.contents.contains("  subtype t_status is std_logic_vector(31 downto 0);"));
    }
}
