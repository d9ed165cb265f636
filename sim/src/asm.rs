//! This module provides parsing utilities for the assembly of the ARM
//! subset.
use anyhow::{Context, Result};

use pest::Parser;
use pest_derive::Parser;

use crate::{
    config::BranchTarget,
    isa::{Addr, Condition, Inst, Opcode, ShiftKind},
    object::{self, reg_of, Imm, Object, ObjectExt, SourceInfo},
};

#[derive(Parser)]
#[grammar = "grammar.pest"] // relative to src
pub struct ArmAsmParser;

pub fn parse(src: &str) -> Result<pest::iterators::Pairs<'_, Rule>> {
    Ok(ArmAsmParser::parse(Rule::main, src)
        .context("fail to parse assembly")?
        .next()
        .context("empty parse tree")?
        .into_inner())
}

#[derive(Default, Debug, Clone)]
pub struct AssembleOption {
    verbose: bool,
    branch_target: BranchTarget,
}

impl AssembleOption {
    pub fn set_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
    /// How branch targets are encoded. Must match the simulator's
    /// [`crate::SimConfig`].
    pub fn set_branch_target(mut self, branch_target: BranchTarget) -> Self {
        self.branch_target = branch_target;
        self
    }
}

type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

fn next<'a>(it: &mut Pairs<'a>) -> Result<pest::iterators::Pair<'a, Rule>> {
    it.next().context("missing operand")
}

/// Parse the operands of an instruction rule.
fn parse_inst(rule: Rule, text: &str, mut it: Pairs<'_>) -> Result<object::Inst> {
    let opname = next(&mut it)?.as_str().to_ascii_lowercase();
    Ok(match rule {
        Rule::i_mem => {
            let rd = reg_of(next(&mut it)?)?;
            let rn = reg_of(next(&mut it)?)?;
            let offset = match it.next() {
                Some(imm) => match Imm::from_pair(imm)? {
                    Imm::Num(n) => u32::try_from(n)
                        .ok()
                        .filter(|n| *n < 1 << 12)
                        .with_context(|| format!("offset {n} out of range in `{text}`"))?,
                    Imm::Label(l) => anyhow::bail!("label `{l}` used as offset"),
                },
                None => 0,
            };
            if opname == "ldr" {
                Inst::Ldr(rd, Addr(rn, offset))
            } else {
                Inst::Str(rd, Addr(rn, offset))
            }
        }
        Rule::i_op => {
            let op = match opname.as_str() {
                "add" => Opcode::Add,
                "sub" => Opcode::Sub,
                "and" => Opcode::And,
                _ => Opcode::Orr,
            };
            let rd = reg_of(next(&mut it)?)?;
            let rn = reg_of(next(&mut it)?)?;
            let rm = reg_of(next(&mut it)?)?;
            Inst::Op(op, rd, rn, rm)
        }
        Rule::i_cmp => {
            let regs = it.map(reg_of).collect::<Result<Vec<_>>>()?;
            match regs[..] {
                [rd, rn, rm] => Inst::Op(Opcode::Cmp, rd, rn, rm),
                [rn, rm] => Inst::Op(Opcode::Cmp, 0, rn, rm),
                _ => anyhow::bail!("invalid operands in `{text}`"),
            }
        }
        Rule::i_mov => {
            let rd = reg_of(next(&mut it)?)?;
            let rm = reg_of(next(&mut it)?)?;
            let (kind, shamt) = match it.next() {
                Some(kind) => {
                    let kind = match kind.as_str().to_ascii_lowercase().as_str() {
                        "lsl" => ShiftKind::Lsl,
                        _ => ShiftKind::Lsr,
                    };
                    let shamt = match Imm::from_pair(next(&mut it)?)? {
                        Imm::Num(n) if (0..32).contains(&n) => n as u8,
                        _ => anyhow::bail!("invalid shift amount in `{text}`"),
                    };
                    (kind, shamt)
                }
                None => (ShiftKind::Lsl, 0),
            };
            Inst::Mov(rd, rm, kind, shamt)
        }
        Rule::i_branch => {
            let cond = if opname == "beq" {
                Condition::Eq
            } else {
                Condition::Al
            };
            Inst::B(cond, Imm::from_pair(next(&mut it)?)?)
        }
        _ => anyhow::bail!("unexpected rule {rule:?}"),
    })
}

/// transform assembly code to binary object code
pub fn assemble(src: &str, option: AssembleOption) -> Result<ObjectExt> {
    macro_rules! verbo {
        ($e:expr) => {
            if option.verbose {
                dbg!($e);
            }
        };
    }
    let mut src_infos = Vec::default();
    let lines = parse(src).context("fail to assemble")?;
    let mut cur_addr = 0u32;

    for line in lines.filter(|l| l.as_rule() == Rule::line) {
        let text = line.as_str().to_string();
        let mut src_info = SourceInfo {
            addr: None,
            inst: None,
            label: None,
            data: None,
            src: text.clone(),
        };
        for pair in line.into_inner() {
            verbo!(&pair);
            src_info.addr = Some(cur_addr);
            let rule = pair.as_rule();
            let mut it = pair.into_inner();
            match rule {
                Rule::label_def => {
                    src_info.label = Some(next(&mut it)?.as_str().to_string());
                }
                Rule::d_pos => {
                    let s = next(&mut it)?.as_str();
                    let pos = crate::utils::parse_literal(s)
                        .and_then(|n| u32::try_from(n).ok())
                        .with_context(|| format!("invalid position `{s}`"))?;
                    anyhow::ensure!(pos % 4 == 0, "position {pos:#x} is not word aligned");
                    cur_addr = pos;
                    src_info.addr = Some(cur_addr) // override
                }
                Rule::d_word => {
                    src_info.data = Some(Imm::from_pair(next(&mut it)?)?);
                    cur_addr = cur_addr.checked_add(4).context("address overflow")?;
                }
                rule => {
                    let inst = parse_inst(rule, text.trim(), it)
                        .with_context(|| format!("invalid instruction `{}`", text.trim()))?;
                    src_info.inst = Some(inst);
                    cur_addr = cur_addr.checked_add(4).context("address overflow")?;
                }
            }
        }
        verbo!(&src_info);
        src_infos.push(src_info);
    }

    let mut obj = Object::default();
    for info in &src_infos {
        if let (Some(label), Some(addr)) = (&info.label, info.addr) {
            let prev = obj.symbols.insert(label.clone(), addr);
            anyhow::ensure!(prev.is_none(), "duplicate label `{label}`");
        }
    }
    verbo!(&obj.symbols);

    for it in &src_infos {
        it.write_object(&mut obj, option.branch_target)?
    }

    Ok(ObjectExt {
        obj,
        source: src_infos,
    })
}
