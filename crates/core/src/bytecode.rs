//! Bytecode disassembly.
//!
//! Traces refer to instructions by program counter (byte offset) while source maps refer to
//! them by instruction counter (position in the instruction sequence). The two only coincide
//! for code without `PUSH` data, so every [`Instruction`] carries both.

use crate::{error::MalformedBytecode, opcodes};
use alloy_primitives::{Bytes, U256, hex};
use revm::bytecode::opcode;
use serde::Serialize;
use std::{borrow::Cow, collections::BTreeMap, fmt, slice};

/// A map of program counters to instruction counters.
pub type PcIcMap = BTreeMap<usize, usize>;

/// A map of instruction counters to program counters.
pub type IcPcMap = BTreeMap<usize, usize>;

/// Decodes a hex string, with or without `0x` prefix, into bytes.
pub fn decode_hex(code: &str) -> Result<Bytes, MalformedBytecode> {
    let code = code.trim();
    let digits = code.strip_prefix("0x").or_else(|| code.strip_prefix("0X")).unwrap_or(code);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|err| MalformedBytecode::from_hex_error(err, digits.len()))
}

/// Returns the number of immediate bytes that follow `op`.
#[inline]
const fn imm_len(op: u8) -> usize {
    if op >= opcode::PUSH1 && op <= opcode::PUSH32 { (op - opcode::PUSH1 + 1) as usize } else { 0 }
}

/// One decoded bytecode instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    /// Byte offset of the opcode in the bytecode.
    pub pc: usize,
    /// Position among all decoded instructions.
    pub index: usize,
    pub opcode: u8,
    pub mnemonic: Cow<'static, str>,
    /// The pushed constant, for `PUSH1..=PUSH32`.
    ///
    /// Holds fewer bytes than the opcode announces if the bytecode ends early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub immediate: Option<Bytes>,
    /// Number of bytes consumed: the opcode plus the immediate bytes actually present.
    pub size: usize,
}

impl Instruction {
    /// Returns true if this is `PUSH1..=PUSH32`.
    pub fn is_push(&self) -> bool {
        imm_len(self.opcode) > 0
    }

    /// Returns true if the bytecode ended before all immediate bytes were read.
    pub fn is_truncated(&self) -> bool {
        self.immediate.as_ref().is_some_and(|imm| imm.len() < imm_len(self.opcode))
    }

    /// Returns the immediate as a big-endian integer.
    pub fn push_value(&self) -> Option<U256> {
        self.immediate.as_ref().and_then(|imm| U256::try_from_be_slice(imm))
    }

    /// Returns true if `pc` falls on this instruction or its immediate bytes.
    pub fn contains_pc(&self, pc: usize) -> bool {
        (self.pc..self.pc + self.size).contains(&pc)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic)?;
        if let Some(imm) = &self.immediate {
            write!(f, " {imm}")?;
        }
        Ok(())
    }
}

/// An iterator that decodes instructions one at a time.
///
/// A `PUSH` at the end of the bytecode whose immediate is cut short is yielded with the bytes
/// that remain, after which the iterator is exhausted.
#[derive(Clone, Debug)]
pub struct InstIter<'a> {
    iter: slice::Iter<'a, u8>,
    pc: usize,
    index: usize,
}

impl<'a> InstIter<'a> {
    /// Create a new iterator over the given bytecode slice.
    #[inline]
    pub fn new(code: &'a [u8]) -> Self {
        Self { iter: code.iter(), pc: 0, index: 0 }
    }
}

impl Iterator for InstIter<'_> {
    type Item = Instruction;

    fn next(&mut self) -> Option<Self::Item> {
        let &op = self.iter.next()?;
        let rest = self.iter.as_slice();
        let len = imm_len(op);
        let immediate = (len > 0).then(|| {
            let (imm, remaining) = rest.split_at(len.min(rest.len()));
            self.iter = remaining.iter();
            Bytes::copy_from_slice(imm)
        });
        let size = 1 + immediate.as_ref().map_or(0, |imm| imm.len());

        let inst = Instruction {
            pc: self.pc,
            index: self.index,
            opcode: op,
            mnemonic: opcodes::mnemonic(op),
            immediate,
            size,
        };
        self.pc += size;
        self.index += 1;
        Some(inst)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.iter.len();
        ((len != 0) as usize, Some(len))
    }
}

impl std::iter::FusedIterator for InstIter<'_> {}

/// The ordered instructions of a piece of bytecode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Disassembly {
    instructions: Vec<Instruction>,
}

impl Disassembly {
    /// Disassembles raw bytecode. Empty bytecode yields an empty disassembly.
    pub fn new(code: &[u8]) -> Self {
        let instructions: Vec<_> = InstIter::new(code).collect();
        if instructions.last().is_some_and(Instruction::is_truncated) {
            debug!(len = code.len(), "bytecode ends inside PUSH data");
        }
        Self { instructions }
    }

    /// Disassembles hex encoded bytecode.
    pub fn from_hex(code: &str) -> Result<Self, MalformedBytecode> {
        decode_hex(code).map(|code| Self::new(&code))
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn iter(&self) -> slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction with the given instruction counter.
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Returns the instruction whose opcode sits exactly at `pc`.
    pub fn instruction_at_pc(&self, pc: usize) -> Option<&Instruction> {
        self.instructions
            .binary_search_by_key(&pc, |inst| inst.pc)
            .ok()
            .map(|idx| &self.instructions[idx])
    }

    /// Returns the instruction covering `pc`, which may point into `PUSH` data.
    pub fn instruction_containing_pc(&self, pc: usize) -> Option<&Instruction> {
        let idx = self.instructions.partition_point(|inst| inst.pc <= pc).checked_sub(1)?;
        let inst = &self.instructions[idx];
        inst.contains_pc(pc).then_some(inst)
    }

    /// Builds a mapping from program counters to instruction counters.
    pub fn pc_ic_map(&self) -> PcIcMap {
        self.iter().map(|inst| (inst.pc, inst.index)).collect()
    }

    /// Builds a mapping from instruction counters to program counters.
    pub fn ic_pc_map(&self) -> IcPcMap {
        self.iter().map(|inst| (inst.index, inst.pc)).collect()
    }
}

impl<'a> IntoIterator for &'a Disassembly {
    type Item = &'a Instruction;
    type IntoIter = slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Disassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in self {
            writeln!(f, "{:06x}: {inst}", inst.pc)?;
        }
        Ok(())
    }
}

/// Disassembles raw bytecode.
pub fn disassemble(code: &[u8]) -> Disassembly {
    Disassembly::new(code)
}
