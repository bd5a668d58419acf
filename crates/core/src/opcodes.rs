//! Opcode names and coarse categories.

use revm::bytecode::OpCode;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt};

/// Returns the mnemonic of `opcode`, or `UNKNOWN(0xXX)` for unassigned bytes.
pub fn mnemonic(opcode: u8) -> Cow<'static, str> {
    match OpCode::new(opcode) {
        Some(op) => Cow::Borrowed(op.as_str()),
        None => Cow::Owned(format!("UNKNOWN(0x{opcode:02x})")),
    }
}

/// A coarse grouping of opcodes by what they touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Jump,
    Storage,
    Memory,
    Call,
    Create,
    Flow,
    Stack,
    Arithmetic,
    Other,
}

const JUMP: &[&str] = &["JUMP", "JUMPI", "JUMPDEST"];

const STORAGE: &[&str] = &["SLOAD", "SSTORE", "TLOAD", "TSTORE"];

const MEMORY: &[&str] = &[
    "MLOAD",
    "MSTORE",
    "MSTORE8",
    "MSIZE",
    "MCOPY",
    "CALLDATACOPY",
    "CODECOPY",
    "EXTCODECOPY",
    "RETURNDATACOPY",
];

const CALL: &[&str] = &["CALL", "CALLCODE", "DELEGATECALL", "STATICCALL"];

const CREATE: &[&str] = &["CREATE", "CREATE2"];

const FLOW: &[&str] = &["STOP", "RETURN", "REVERT", "INVALID", "SELFDESTRUCT"];

const STACK: &[&str] = &["POP", "PUSH0"];

/// `PUSH1..=PUSH32`, `DUP1..=DUP16` and `SWAP1..=SWAP16`.
const NUMBERED_STACK: &[(&str, u8)] = &[("PUSH", 32), ("DUP", 16), ("SWAP", 16)];

const ARITHMETIC: &[&str] = &[
    "ADD",
    "MUL",
    "SUB",
    "DIV",
    "SDIV",
    "MOD",
    "SMOD",
    "ADDMOD",
    "MULMOD",
    "EXP",
    "SIGNEXTEND",
    "LT",
    "GT",
    "SLT",
    "SGT",
    "EQ",
    "ISZERO",
    "AND",
    "OR",
    "XOR",
    "NOT",
    "BYTE",
    "SHL",
    "SHR",
    "SAR",
    "CLZ",
];

impl Category {
    /// Categorizes a mnemonic as returned by [`mnemonic`]. Unknown mnemonics are
    /// [`Category::Other`].
    pub fn of(mnemonic: &str) -> Self {
        let tables: [(&[&str], Self); 8] = [
            (JUMP, Self::Jump),
            (STORAGE, Self::Storage),
            (MEMORY, Self::Memory),
            (CALL, Self::Call),
            (CREATE, Self::Create),
            (FLOW, Self::Flow),
            (STACK, Self::Stack),
            (ARITHMETIC, Self::Arithmetic),
        ];
        if let Some((_, category)) = tables.iter().find(|(table, _)| table.contains(&mnemonic)) {
            return *category;
        }
        if is_numbered_stack_op(mnemonic) {
            return Self::Stack;
        }
        Self::Other
    }

    /// Categorizes a raw opcode byte.
    pub fn of_opcode(opcode: u8) -> Self {
        Self::of(&mnemonic(opcode))
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Jump => "JUMP",
            Self::Storage => "STORAGE",
            Self::Memory => "MEMORY",
            Self::Call => "CALL",
            Self::Create => "CREATE",
            Self::Flow => "FLOW",
            Self::Stack => "STACK",
            Self::Arithmetic => "ARITHMETIC",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the category of `mnemonic`.
pub fn category(mnemonic: &str) -> Category {
    Category::of(mnemonic)
}

fn is_numbered_stack_op(mnemonic: &str) -> bool {
    NUMBERED_STACK.iter().any(|&(prefix, max)| {
        mnemonic
            .strip_prefix(prefix)
            .filter(|n| !n.starts_with('0'))
            .and_then(|n| n.parse::<u8>().ok())
            .is_some_and(|n| (1..=max).contains(&n))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_assigned_opcodes() {
        assert_eq!(mnemonic(0x00), "STOP");
        assert_eq!(mnemonic(0x01), "ADD");
        assert_eq!(mnemonic(0x55), "SSTORE");
        assert_eq!(mnemonic(0x60), "PUSH1");
        assert_eq!(mnemonic(0x7f), "PUSH32");
        assert_eq!(mnemonic(0xfd), "REVERT");
    }

    #[test]
    fn names_unassigned_opcodes() {
        assert_eq!(mnemonic(0x0c), "UNKNOWN(0x0c)");
        assert_eq!(mnemonic(0x21), "UNKNOWN(0x21)");
    }

    #[test]
    fn categorizes() {
        assert_eq!(category("JUMPI"), Category::Jump);
        assert_eq!(category("SLOAD"), Category::Storage);
        assert_eq!(category("MSTORE8"), Category::Memory);
        assert_eq!(category("DELEGATECALL"), Category::Call);
        assert_eq!(category("CREATE2"), Category::Create);
        assert_eq!(category("REVERT"), Category::Flow);
        assert_eq!(category("PUSH0"), Category::Stack);
        assert_eq!(category("PUSH32"), Category::Stack);
        assert_eq!(category("DUP16"), Category::Stack);
        assert_eq!(category("SWAP1"), Category::Stack);
        assert_eq!(category("ISZERO"), Category::Arithmetic);
        assert_eq!(category("KECCAK256"), Category::Other);
        assert_eq!(category("UNKNOWN(0x0c)"), Category::Other);
    }

    #[test]
    fn numbered_families_are_bounded() {
        assert_eq!(category("PUSH33"), Category::Other);
        assert_eq!(category("DUP17"), Category::Other);
        assert_eq!(category("SWAP0"), Category::Other);
        assert_eq!(category("DUP01"), Category::Other);
    }

    #[test]
    fn categorizes_every_push() {
        for op in 0x60..=0x7f {
            assert_eq!(Category::of_opcode(op), Category::Stack, "{}", mnemonic(op));
        }
    }
}
