//! Stack bytecode that compiled formulas lower to, and the VM that runs it.

mod assemble;
mod eval;
mod program;

pub use assemble::Assembler;
pub use eval::Vm;
pub use program::{
    Checkpoint, FuncSlot, Instruction, OpCode, Program, PropertySlot, MAX_OPERAND,
};
pub(crate) use program::TableDelta;
