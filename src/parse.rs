//! Reading of the expanded XML description.
//!
//! ```xml
//! <sysdef top="main" masters="1">
//!   <constant name="NCHAN" val="4" desc="number of channels"/>
//!   <block name="main">
//!     <creg name="ctrl" reps="NCHAN" stb="1">
//!       <field name="mode" width="3" type="unsigned"/>
//!     </creg>
//!     <sreg name="status" ack="1"/>
//!     <subblock name="link" type="linkblk" reps="2"/>
//!   </block>
//! </sysdef>
//! ```

use std::collections::HashMap;
use std::fmt;

use anyhow::{anyhow, Result};
use log::debug;
use roxmltree::{Document, Node};

use crate::errors::{ConfigError, SourceLine};
use crate::include::Expanded;
use crate::model::{
    Block, BlockOptions, ElementType, FieldOptions, Item, RegisterKind, RegisterOptions,
    Registry, SubblockRef,
};
use crate::util;

/// A named integer shared by the whole design.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    pub value: u64,
    pub description: Option<String>,
}

/// Everything read from the description.
#[derive(Clone, Debug)]
pub struct Design {
    /// Name of the block exposed to the bus masters.
    pub top: String,
    /// Number of bus masters of the top block.
    pub masters: u32,
    pub constants: Vec<Constant>,
    pub registry: Registry,
    /// CRC-32 of the expanded description.
    pub checksum: u32,
    origins: HashMap<String, Vec<SourceLine>>,
}

impl Design {
    /// Where block `name` was declared.
    pub fn origin(&self, name: &str) -> &[SourceLine] {
        self.origins.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Displays a list of source locations, e.g. `a.xml:3, b.xml:1`.
pub struct Origins<'a>(pub &'a [SourceLine]);

impl fmt::Display for Origins<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("unknown location");
        }
        for (i, line) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Parses the expanded description. `top` overrides the root's `top`
/// attribute.
pub fn parse(source: &Expanded, top: Option<&str>) -> Result<Design> {
    let doc = Document::parse(&source.text).map_err(|e| {
        let pos = e.pos();
        let origins = source.locate(pos.row as usize);
        anyhow!(e).context(format!(
            "XML syntax error at row {}, column {} of the expanded description ({})",
            pos.row,
            pos.col,
            Origins(&origins)
        ))
    })?;
    let mut reader = Reader {
        doc: &doc,
        source,
        constants: Vec::new(),
    };
    let root = doc.root_element();

    for node in root.children().filter(Node::is_element) {
        match node.tag_name().name() {
            "constant" => reader
                .constant(node)
                .map_err(|e| reader.located(node, e))?,
            "block" => {}
            tag => {
                return Err(reader.located(
                    node,
                    ConfigError::UnknownNode {
                        tag: tag.to_string(),
                        context: "the description root".to_string(),
                    },
                ))
            }
        }
    }

    let mut registry = Registry::new();
    let mut origins = HashMap::new();
    for node in root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "block")
    {
        let block = reader.block(node)?;
        origins.insert(block.name.clone(), reader.origins(node));
        registry
            .insert(block)
            .map_err(|e| reader.located(node, e))?;
    }

    let top = match top {
        Some(top) => top.to_string(),
        None => reader
            .required(root, "top")
            .map_err(|e| reader.located(root, e))?
            .to_string(),
    };
    let masters = reader
        .number(root, "masters")
        .and_then(|m| reader.positive(root, "masters", m.unwrap_or(1)))
        .map_err(|e| reader.located(root, e))?;

    debug!(
        "Read {} blocks and {} constants, top block {}",
        registry.len(),
        reader.constants.len(),
        top
    );
    Ok(Design {
        top,
        masters,
        constants: reader.constants,
        registry,
        checksum: crc32fast::hash(source.text.as_bytes()),
        origins,
    })
}

struct Reader<'a, 'input> {
    doc: &'a Document<'input>,
    source: &'a Expanded,
    constants: Vec<Constant>,
}

impl Reader<'_, '_> {
    fn origins(&self, node: Node) -> Vec<SourceLine> {
        let row = self.doc.text_pos_at(node.range().start).row;
        self.source.locate(row as usize)
    }

    /// Attaches the node and its original location to `err`.
    fn located(&self, node: Node, err: ConfigError) -> anyhow::Error {
        let name = node
            .attribute("name")
            .map(|n| format!(" name=\"{n}\""))
            .unwrap_or_default();
        anyhow!(err).context(format!(
            "In <{}{}> at {}",
            node.tag_name().name(),
            name,
            Origins(&self.origins(node))
        ))
    }

    fn required<'n>(&self, node: Node<'n, '_>, attribute: &str) -> Result<&'n str, ConfigError> {
        node.attribute(attribute)
            .ok_or_else(|| ConfigError::MissingAttribute {
                tag: node.tag_name().name().to_string(),
                attribute: attribute.to_string(),
            })
    }

    fn invalid(&self, node: Node, attribute: &str, value: &str) -> ConfigError {
        ConfigError::InvalidAttribute {
            tag: node.tag_name().name().to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    /// Literal or constant name.
    fn number(&self, node: Node, attribute: &str) -> Result<Option<u64>, ConfigError> {
        let Some(value) = node.attribute(attribute) else {
            return Ok(None);
        };
        if let Some(n) = util::parse_int(value) {
            return Ok(Some(n));
        }
        let value = value.trim();
        match self.constants.iter().find(|c| c.name == value) {
            Some(c) => Ok(Some(c.value)),
            None if util::check_name(value).is_ok() => {
                Err(ConfigError::UnknownConstant(value.to_string()))
            }
            None => Err(self.invalid(node, attribute, value)),
        }
    }

    fn positive(&self, node: Node, attribute: &str, value: u64) -> Result<u32, ConfigError> {
        match u32::try_from(value) {
            Ok(v) if v > 0 => Ok(v),
            _ => Err(self.invalid(node, attribute, &value.to_string())),
        }
    }

    fn word(&self, node: Node, attribute: &str) -> Result<Option<u32>, ConfigError> {
        self.number(node, attribute)?
            .map(|v| u32::try_from(v).map_err(|_| self.invalid(node, attribute, &v.to_string())))
            .transpose()
    }

    fn flag(&self, node: Node, attribute: &str) -> Result<bool, ConfigError> {
        match node.attribute(attribute).map(str::trim) {
            None | Some("0") | Some("false") => Ok(false),
            Some("1") | Some("true") => Ok(true),
            Some(other) => Err(self.invalid(node, attribute, other)),
        }
    }

    fn element_type(&self, node: Node) -> Result<ElementType, ConfigError> {
        node.attribute("type")
            .map(str::parse::<ElementType>)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    fn description(node: Node) -> Option<String> {
        node.attribute("desc").map(util::respace)
    }

    fn constant(&mut self, node: Node) -> Result<(), ConfigError> {
        let name = self.required(node, "name")?;
        util::check_name(name)?;
        if self.constants.iter().any(|c| c.name == name) {
            return Err(ConfigError::DuplicateConstant(name.to_string()));
        }
        let value = match self.number(node, "val")? {
            Some(value) => value,
            None => {
                return Err(ConfigError::MissingAttribute {
                    tag: "constant".to_string(),
                    attribute: "val".to_string(),
                })
            }
        };
        self.constants.push(Constant {
            name: name.to_string(),
            value,
            description: Self::description(node),
        });
        Ok(())
    }

    fn block(&self, node: Node) -> Result<Block> {
        let options = self.block_options(node).map_err(|e| self.located(node, e))?;
        Block::new(options).map_err(|err| {
            // report the child the error is about when it can be told
            let culprit = match &err {
                ConfigError::FieldOverflow { register: name, .. }
                | ConfigError::ZeroWidth { register: name, .. }
                | ConfigError::MisplacedFlag { register: name, .. }
                | ConfigError::ZeroReps(name)
                | ConfigError::RegisterOverflow { register: name, .. }
                | ConfigError::InvalidName(name)
                | ConfigError::ReservedName(name)
                | ConfigError::DuplicateName { name, .. } => node
                    .children()
                    .filter(|c| c.is_element() && c.attribute("name") == Some(name.as_str()))
                    .last(),
                _ => None,
            };
            self.located(culprit.unwrap_or(node), err)
        })
    }

    fn block_options(&self, node: Node) -> Result<BlockOptions, ConfigError> {
        let mut options = BlockOptions::new(self.required(node, "name")?);
        options.id = self.word(node, "id")?;
        options.description = Self::description(node);
        for child in node.children().filter(Node::is_element) {
            let item = match child.tag_name().name() {
                "creg" => Item::Register(self.register(child, RegisterKind::Control)?),
                "sreg" => Item::Register(self.register(child, RegisterKind::Status)?),
                "subblock" => Item::Subblock(self.subblock(child)?),
                tag => {
                    return Err(ConfigError::UnknownNode {
                        tag: tag.to_string(),
                        context: format!("block `{}`", options.name),
                    })
                }
            };
            options.items.push(item);
        }
        Ok(options)
    }

    fn register(&self, node: Node, kind: RegisterKind) -> Result<RegisterOptions, ConfigError> {
        let mut options = RegisterOptions::new(self.required(node, "name")?, kind);
        if let Some(reps) = self.number(node, "reps")? {
            options.reps = self.positive(node, "reps", reps)?;
        }
        options.element_type = self.element_type(node)?;
        options.strobe = self.flag(node, "stb")?;
        options.ack = self.flag(node, "ack")?;
        options.description = Self::description(node);
        for child in node.children().filter(Node::is_element) {
            if child.tag_name().name() != "field" {
                return Err(ConfigError::UnknownNode {
                    tag: child.tag_name().name().to_string(),
                    context: format!("register `{}`", options.name),
                });
            }
            let name = self.required(child, "name")?;
            let width = match self.number(child, "width")? {
                Some(width) => u32::try_from(width)
                    .map_err(|_| self.invalid(child, "width", &width.to_string()))?,
                None => {
                    return Err(ConfigError::MissingAttribute {
                        tag: "field".to_string(),
                        attribute: "width".to_string(),
                    })
                }
            };
            let mut field = FieldOptions::new(name, width);
            field.element_type = self.element_type(child)?;
            field.description = Self::description(child);
            options.fields.push(field);
        }
        Ok(options)
    }

    fn subblock(&self, node: Node) -> Result<SubblockRef, ConfigError> {
        let mut subblock = SubblockRef::new(self.required(node, "type")?);
        if let Some(name) = node.attribute("name") {
            subblock.name = name.to_string();
        }
        if let Some(reps) = self.number(node, "reps")? {
            subblock.reps = self.positive(node, "reps", reps)?;
        }
        subblock.description = Self::description(node);
        if let Some(child) = node.children().find(Node::is_element) {
            return Err(ConfigError::UnknownNode {
                tag: child.tag_name().name().to_string(),
                context: format!("subblock `{}`", subblock.name),
            });
        }
        Ok(subblock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(text: &str) -> Result<Design> {
        parse(&Expanded::from_text(text, "test.xml"), None)
    }

    const SYSTEM: &str = r#"<sysdef top="main" masters="2">
  <constant name="NCHAN" val="0x3" desc="channel   count"/>
  <block name="main" id="0x1234">
    <creg name="ctrl" reps="NCHAN" stb="1">
      <field name="mode" width="3" type="unsigned"/>
      <field name="en" width="1"/>
    </creg>
    <sreg name="status" ack="1" type="signed"/>
    <subblock name="link" type="linkblk" reps="2"/>
  </block>
  <block name="linkblk">
    <creg name="cfg"/>
  </block>
</sysdef>
"#;

    #[test]
    fn reads_a_complete_description() {
        let design = parse_str(SYSTEM).unwrap();
        assert_eq!(design.top, "main");
        assert_eq!(design.masters, 2);
        assert_eq!(
            design.constants,
            [Constant {
                name: "NCHAN".to_string(),
                value: 3,
                description: Some("channel count".to_string()),
            }]
        );
        assert_eq!(design.checksum, crc32fast::hash(SYSTEM.as_bytes()));

        let main = design.registry.get("main").unwrap();
        assert_eq!(main.id, Some(0x1234));
        let ctrl = main.register("ctrl").unwrap();
        assert_eq!(ctrl.reps, 3);
        assert!(ctrl.strobe);
        assert_eq!(ctrl.fields[0].element_type, ElementType::Unsigned);
        assert_eq!(ctrl.fields[1].offset, 3);
        let status = main.register("status").unwrap();
        assert_eq!(status.base, 5);
        assert!(status.ack);
        assert_eq!(status.element_type, ElementType::Signed);
        assert_eq!(main.subblocks, [SubblockRef {
            name: "link".to_string(),
            ty: "linkblk".to_string(),
            reps: 2,
            description: None,
        }]);
        assert_eq!(design.origin("linkblk"), [SourceLine {
            path: "test.xml".into(),
            line: 11,
        }]);
    }

    #[test]
    fn top_can_be_overridden() {
        let design = parse(&Expanded::from_text(SYSTEM, "test.xml"), Some("linkblk")).unwrap();
        assert_eq!(design.top, "linkblk");
    }

    #[test]
    fn unknown_nodes_are_fatal() {
        let err = parse_str(
            "<sysdef top=\"a\">\n<block name=\"a\">\n<wreg name=\"x\"/>\n</block>\n</sysdef>",
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownNode { tag, .. }) if tag == "wreg"
        ));
        assert!(err.to_string().contains("test.xml:2"), "{err}");

        let err = parse_str("<sysdef top=\"a\"><table/></sysdef>").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownNode { .. })
        ));
    }

    #[test]
    fn field_overflow_points_at_the_register() {
        let err = parse_str(
            "<sysdef top=\"a\">\n<block name=\"a\">\n<creg name=\"ok\"/>\n<creg name=\"wide\">\n\
             <field name=\"lo\" width=\"30\"/>\n<field name=\"hi\" width=\"3\"/>\n</creg>\n</block>\n</sysdef>",
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::FieldOverflow { register, width: 33 }) if register == "wide"
        ));
        let message = err.to_string();
        assert!(message.contains("<creg name=\"wide\">"), "{message}");
        assert!(message.contains("test.xml:4"), "{message}");
    }

    #[test]
    fn huge_repeat_counts_are_rejected() {
        let err = parse_str(
            "<sysdef top=\"a\">\n<block name=\"a\">\n<creg name=\"ok\"/>\n\
             <creg name=\"big\" reps=\"0xFFFFFFFF\"/>\n</block>\n</sysdef>",
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::RegisterOverflow { block, register }) if block == "a" && register == "big"
        ));
        assert!(err.to_string().contains("test.xml:4"), "{err:#}");
    }

    #[test]
    fn attribute_errors() {
        let missing = parse_str("<sysdef top=\"a\"><block name=\"a\"><creg/></block></sysdef>")
            .unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingAttribute { attribute, .. }) if attribute == "name"
        ));

        let unknown = parse_str(
            "<sysdef top=\"a\"><block name=\"a\"><creg name=\"c\" reps=\"N\"/></block></sysdef>",
        )
        .unwrap_err();
        assert!(matches!(
            unknown.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownConstant(n)) if n == "N"
        ));

        let bad_flag = parse_str(
            "<sysdef top=\"a\"><block name=\"a\"><creg name=\"c\" stb=\"yes\"/></block></sysdef>",
        )
        .unwrap_err();
        assert!(matches!(
            bad_flag.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidAttribute { .. })
        ));

        let bad_type = parse_str(
            "<sysdef top=\"a\"><block name=\"a\"><creg name=\"c\" type=\"real\"/></block></sysdef>",
        )
        .unwrap_err();
        assert!(matches!(
            bad_type.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownType(_))
        ));

        let no_top = parse_str("<sysdef><block name=\"a\"/></sysdef>").unwrap_err();
        assert!(matches!(
            no_top.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingAttribute { attribute, .. }) if attribute == "top"
        ));

        let zero = parse_str(
            "<sysdef top=\"a\"><block name=\"a\"><subblock type=\"b\" reps=\"0\"/></block></sysdef>",
        )
        .unwrap_err();
        assert!(matches!(
            zero.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn duplicate_blocks_are_rejected() {
        let err = parse_str("<sysdef top=\"a\"><block name=\"a\"/><block name=\"a\"/></sysdef>")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::DuplicateBlock(_))
        ));
    }

    #[test]
    fn syntax_errors_are_located() {
        let err = parse_str("<sysdef top=\"a\">\n<block name=\"a\">\n</sysdef>\n").unwrap_err();
        assert!(err.to_string().contains("test.xml:"), "{err}");
    }
}
