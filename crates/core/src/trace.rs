//! Execution traces as produced by the fork execution service.
//!
//! The shape follows the JSON of an EVM call trace arena: a flat list of call frames linked
//! by index, each holding the opcode steps executed in that frame. Fields that are not needed
//! for correlation are ignored and optional fields default.

use crate::opcodes;
use alloy_primitives::{Address, Bytes, U256};
use revm::bytecode::opcode;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;

/// The kind of call a frame was entered with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallKind {
    #[default]
    Call,
    StaticCall,
    CallCode,
    DelegateCall,
    AuthCall,
    Create,
    Create2,
}

impl CallKind {
    /// Returns true if the frame runs creation code rather than deployed code.
    pub fn is_any_create(&self) -> bool {
        matches!(self, Self::Create | Self::Create2)
    }
}

/// All call frames of one execution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTraceArena {
    /// The arena of nodes
    #[serde(default)]
    pub arena: Vec<CallTraceNode>,
}

impl CallTraceArena {
    pub fn nodes(&self) -> &[CallTraceNode] {
        &self.arena
    }

    /// Total number of steps over all frames.
    pub fn step_count(&self) -> usize {
        self.arena.iter().map(|node| node.trace.steps.len()).sum()
    }
}

/// A node in the arena
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallTraceNode {
    /// Parent node index in the arena
    pub parent: Option<usize>,
    /// Children node indexes in the arena
    pub children: Vec<usize>,
    /// This node's index in the arena
    pub idx: usize,
    /// The call trace
    pub trace: CallTrace,
}

/// One call frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallTrace {
    /// The depth of the call
    pub depth: usize,
    /// Whether the call was successful
    pub success: bool,
    /// The destination address of the call or the address from the created contract
    pub address: Address,
    /// The kind of call this is
    pub kind: CallKind,
    /// The executed opcodes, in order
    pub steps: Vec<TraceStep>,
}

/// One executed opcode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TraceStep {
    /// Program counter before step execution
    pub pc: usize,
    /// Opcode to be executed
    #[serde(deserialize_with = "deserialize_opcode")]
    pub op: u8,
    /// Stack before step execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<U256>>,
    /// Memory before step execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<Bytes>,
    /// Remaining gas before step execution
    #[serde(alias = "gas_remaining")]
    pub gas_remaining: u64,
    /// Gas used by the frame up to and including this step
    #[serde(alias = "gas_used")]
    pub gas_used: u64,
    /// Gas cost of step execution
    #[serde(alias = "gas_cost")]
    pub gas_cost: u64,
    /// Storage slot written or read by `SSTORE`/`SLOAD`
    #[serde(alias = "storage_change", skip_serializing_if = "Option::is_none")]
    pub storage_change: Option<StorageChange>,
}

/// A storage access recorded on a step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    pub key: U256,
    pub value: U256,
    #[serde(default, alias = "had_value", skip_serializing_if = "Option::is_none")]
    pub had_value: Option<U256>,
}

/// Mnemonic to opcode lookup for traces that record opcodes by name.
static OPCODES_BY_NAME: LazyLock<Vec<(String, u8)>> =
    LazyLock::new(|| (0..=u8::MAX).map(|op| (opcodes::mnemonic(op).into_owned(), op)).collect());

/// Accepts an opcode as its numeric value or its mnemonic.
///
/// Unknown mnemonics decode as `INVALID` so a single odd step does not reject the trace.
fn deserialize_opcode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u8),
        Name(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(op) => Ok(op),
        Repr::Name(name) => Ok(OPCODES_BY_NAME
            .iter()
            .find(|(mnemonic, _)| mnemonic.eq_ignore_ascii_case(&name))
            .map(|&(_, op)| op)
            .unwrap_or_else(|| {
                debug!(%name, "unknown opcode mnemonic, decoding as INVALID");
                opcode::INVALID
            })),
    }
}
