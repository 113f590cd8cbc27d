use super::program::Instruction;

/// Builds a relocatable code fragment.
///
/// Every jump emitted here is relative, so the finished fragment can be spliced into any other
/// fragment unchanged.
#[derive(Debug)]
pub struct Assembler {
    code: Vec<Instruction>,
}

impl Assembler {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            code: Vec::with_capacity(n),
        }
    }

    pub fn emit(&mut self, inst: Instruction) -> &mut Self {
        self.code.push(inst);
        self
    }

    pub fn splice(&mut self, fragment: Vec<Instruction>) -> &mut Self {
        self.code.extend(fragment);
        self
    }

    /// Consume the set on top of the stack, running `body` once per element with the element
    /// bound to local `slot`. `body` must leave the stack as it found it.
    pub fn each_element(&mut self, slot: u32, body: Vec<Instruction>) -> &mut Self {
        let n = body.len();
        self.emit(Instruction::iter_begin());
        self.emit(Instruction::iter_next(slot, n + 1));
        self.splice(body);
        self.emit(Instruction::jump_back(n + 2));
        self.emit(Instruction::iter_end())
    }

    pub fn finish(self) -> Vec<Instruction> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::OpCode;

    #[test]
    fn loop_offsets_frame_the_body() {
        let mut asm = Assembler::with_capacity(6);
        asm.each_element(3, vec![Instruction::load_local(3), Instruction::append_set()]);
        let code = asm.finish();
        let ops: Vec<_> = code.iter().map(|i| i.op()).collect();
        assert_eq!(
            ops,
            vec![
                OpCode::IterBegin,
                OpCode::IterNext,
                OpCode::LoadLocal,
                OpCode::AppendSet,
                OpCode::JumpBack,
                OpCode::IterEnd,
            ]
        );
        // Exhaustion lands on iter_end; the back edge lands on iter_next.
        assert_eq!(1 + 1 + code[1].b() as usize, 5);
        assert_eq!(4 + 1 - code[4].a() as usize, 1);
    }
}
