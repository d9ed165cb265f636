//! This file provides the object image produced by the assembler.

use std::{collections::BTreeMap, fmt::Display};

use anyhow::{Context, Result};

use crate::{
    asm::Rule,
    config::BranchTarget,
    framework::MemData,
    isa,
    utils::parse_literal,
};

pub type SymbolMap = BTreeMap<String, u32>;

/// Register operand `r0`..`r15`.
pub(crate) fn reg_of(pair: pest::iterators::Pair<'_, Rule>) -> Result<u8> {
    let s = pair.as_str();
    let idx: u8 = s[1..]
        .parse()
        .with_context(|| format!("invalid register `{s}`"))?;
    anyhow::ensure!(idx < 16, "invalid register `{s}`");
    Ok(idx)
}

/// Immediate values (can be raw number or address of label)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imm {
    Num(i64),
    Label(String),
}

impl Imm {
    pub(crate) fn from_pair(pair: pest::iterators::Pair<'_, Rule>) -> Result<Self> {
        match pair.as_rule() {
            Rule::label => Ok(Self::Label(pair.as_str().to_string())),
            // `#n` wraps the number
            Rule::imm => Self::from_pair(
                pair.into_inner()
                    .next()
                    .context("immediate without value")?,
            ),
            _ => {
                let s = pair.as_str();
                let num = parse_literal(s).with_context(|| format!("invalid number `{s}`"))?;
                Ok(Self::Num(num))
            }
        }
    }

    fn desymbol(&self, sym: &SymbolMap) -> Result<u32> {
        match self {
            Imm::Num(n) => {
                anyhow::ensure!(
                    (i32::MIN as i64..=u32::MAX as i64).contains(n),
                    "number {n} does not fit in 32 bits"
                );
                Ok(*n as u32)
            }
            Imm::Label(label) => sym
                .get(label)
                .copied()
                .with_context(|| format!("undefined label `{label}`")),
        }
    }
}

/// Assembly instructions
pub type Inst = isa::Inst<Imm>;

impl Inst {
    fn desymbol(&self, sym: &SymbolMap) -> Result<isa::Inst<u32>> {
        use isa::Inst::*;
        Ok(match self {
            Ldr(rd, addr) => Ldr(*rd, *addr),
            Str(rd, addr) => Str(*rd, *addr),
            Op(op, rd, rn, rm) => Op(*op, *rd, *rn, *rm),
            Mov(rd, rm, kind, shamt) => Mov(*rd, *rm, *kind, *shamt),
            B(cond, target) => B(*cond, target.desymbol(sym)?),
        })
    }
}

/// One line of assembly, annotated with its address.
#[derive(Debug)]
pub struct SourceInfo {
    pub addr: Option<u32>,
    pub inst: Option<Inst>,
    pub label: Option<String>,
    /// `.word` data
    pub data: Option<Imm>,
    pub src: String,
}

impl SourceInfo {
    pub fn write_object(&self, obj: &mut Object, branch_target: BranchTarget) -> Result<()> {
        let Some(addr) = self.addr else {
            return Ok(());
        };
        let word = if let Some(inst) = &self.inst {
            inst.desymbol(&obj.symbols)?
                .encode(addr, branch_target)
                .with_context(|| format!("cannot encode `{}`", self.src.trim()))?
        } else if let Some(data) = &self.data {
            data.desymbol(&obj.symbols)?
        } else {
            return Ok(());
        };
        obj.binary
            .write(addr, word)
            .with_context(|| format!("address {addr:#x} outside memory"))?;
        Ok(())
    }

    /// Whether this line occupies a word of memory.
    pub fn has_word(&self) -> bool {
        self.inst.is_some() || self.data.is_some()
    }
}

/// Object image: initial memory content plus the symbol table.
#[derive(Debug, Default)]
pub struct Object {
    pub binary: MemData,
    /// basically labels
    pub symbols: SymbolMap,
}

impl Object {
    pub fn init_mem(&self) -> MemData {
        self.binary.clone()
    }
}

#[derive(Debug, Default)]
pub struct ObjectExt {
    pub obj: Object,
    /// annotate each line with its address
    pub source: Vec<SourceInfo>,
}

impl Display for ObjectExt {
    /// Listing: `addr: word | source`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for src in &self.source {
            match src.addr {
                Some(addr) if src.has_word() => {
                    let word = self.obj.binary.read(addr).map_err(|_| std::fmt::Error)?;
                    write!(f, "{addr:#06x}: {word:08x}   ")?
                }
                Some(addr) => write!(f, "{addr:#06x}:{: <12}", "")?,
                None => write!(f, "{: <19}", "")?,
            }
            writeln!(f, "| {}", src.src)?
        }
        Ok(())
    }
}
