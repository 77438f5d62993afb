//! Decodes a [`bayak_image::Image`] into a runnable [`Program`].
//!
//! This is the Rust equivalent of the reference VM's `AbstractMachine`: it splits the
//! constants pool into typed [`Constant`](crate::constant::Constant) values, splits the
//! code section into function bodies (bracketed by `PROC` / `MAKE_FUNCTION` markers) and
//! a trailing top-level stream, and resolves every jump's `u16` byte offset to an index
//! into the decoded instruction vector it lives in.
use crate::constant::{Constant, ConstTag};
use crate::error::LoaderError;
use crate::instr::Instruction;
use crate::opcode::{CompareOp, Opcode};
use byteorder::{ByteOrder, LittleEndian};
use num_traits::FromPrimitive;
use std::collections::HashMap;

/// A fully decoded, ready-to-run program.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub consts: Vec<Constant>,
    pub functions: Vec<Vec<Instruction>>,
    pub top_level: Vec<Instruction>,
}

pub fn load(image: &bayak_image::Image) -> Result<Program, LoaderError> {
    let consts = decode_consts(image.consts())?;

    let code = image.code();
    let mut functions = Vec::new();
    let mut pos = 0;

    while pos < code.len() && code[pos] == Opcode::PROC as u8 {
        pos += 1;
        let body_start = pos;
        while pos < code.len() && code[pos] != Opcode::MAKE_FUNCTION as u8 {
            pos += instruction_width(code, pos)?;
        }
        if pos >= code.len() {
            return Err(LoaderError::Truncated);
        }
        functions.push(decode_instructions(&code[body_start..pos])?);
        pos += 1; // MAKE_FUNCTION
    }

    let top_level = decode_instructions(&code[pos..])?;

    Ok(Program {
        consts,
        functions,
        top_level,
    })
}

fn decode_consts(bytes: &[u8]) -> Result<Vec<Constant>, LoaderError> {
    let mut consts = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let tag = ConstTag::from_u8(bytes[pos]).ok_or(LoaderError::UnknownConstTag(bytes[pos]))?;
        pos += 1;
        match tag {
            ConstTag::INT => {
                let slice = bytes.get(pos..pos + 4).ok_or(LoaderError::Truncated)?;
                consts.push(Constant::Int(LittleEndian::read_i32(slice)));
                pos += 4;
            }
            ConstTag::FLOAT => {
                let slice = bytes.get(pos..pos + 4).ok_or(LoaderError::Truncated)?;
                consts.push(Constant::Float(LittleEndian::read_f32(slice)));
                pos += 4;
            }
            ConstTag::STRING => {
                let nul = bytes[pos..]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(LoaderError::UnterminatedString)?;
                consts.push(Constant::String(bytes[pos..pos + nul].to_vec()));
                pos += nul + 1;
            }
        }
    }
    Ok(consts)
}

/// Width in bytes, including the opcode byte itself, of the instruction starting at
/// `pos`. Used only while scanning for a function's closing `MAKE_FUNCTION` marker.
fn instruction_width(bytes: &[u8], pos: usize) -> Result<usize, LoaderError> {
    let op = Opcode::from_u8(bytes[pos]).ok_or(LoaderError::UnknownOpcode(bytes[pos]))?;
    Ok(match op.param_shape() {
        crate::opcode::ParamShape::None => 1,
        crate::opcode::ParamShape::Byte => 2,
        crate::opcode::ParamShape::Jump => 3,
    })
}

/// Decodes one section (a function body or the top-level stream) of raw bytecode,
/// resolving jump targets from byte offsets (relative to the start of this section)
/// to indices into the returned vector.
fn decode_instructions(bytes: &[u8]) -> Result<Vec<Instruction>, LoaderError> {
    enum Raw {
        Plain(Instruction),
        Jump(fn(usize) -> Instruction, u16),
    }

    let mut offset_to_index = HashMap::new();
    let mut raw = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        offset_to_index.insert(pos, raw.len());
        let op = Opcode::from_u8(bytes[pos]).ok_or(LoaderError::UnknownOpcode(bytes[pos]))?;
        pos += 1;

        let instr = match op {
            Opcode::ADD => Raw::Plain(Instruction::Add),
            Opcode::SUB => Raw::Plain(Instruction::Sub),
            Opcode::DIV => Raw::Plain(Instruction::Div),
            Opcode::MULT => Raw::Plain(Instruction::Mult),
            Opcode::RETN => Raw::Plain(Instruction::Retn),
            Opcode::PASS => Raw::Plain(Instruction::Pass),
            Opcode::PROC | Opcode::MAKE_FUNCTION => {
                return Err(LoaderError::UnknownOpcode(op as u8))
            }
            Opcode::CALL => Raw::Plain(Instruction::Call(read_byte(bytes, &mut pos)?)),
            Opcode::STORE_VAR => Raw::Plain(Instruction::StoreVar(read_byte(bytes, &mut pos)?)),
            Opcode::STORE_GLOBAL => {
                Raw::Plain(Instruction::StoreGlobal(read_byte(bytes, &mut pos)?))
            }
            Opcode::LOAD_CONST => Raw::Plain(Instruction::LoadConst(read_byte(bytes, &mut pos)?)),
            Opcode::LOAD_GLOBAL => {
                Raw::Plain(Instruction::LoadGlobal(read_byte(bytes, &mut pos)?))
            }
            Opcode::LOAD_LOCAL => Raw::Plain(Instruction::LoadLocal(read_byte(bytes, &mut pos)?)),
            Opcode::CALL_BUILTIN => {
                Raw::Plain(Instruction::CallBuiltin(read_byte(bytes, &mut pos)?))
            }
            Opcode::CMP => {
                let code = read_byte(bytes, &mut pos)?;
                let cmp = CompareOp::from_u8(code).ok_or(LoaderError::Truncated)?;
                Raw::Plain(Instruction::Cmp(cmp))
            }
            Opcode::JZ => Raw::Jump(Instruction::Jz, read_u16(bytes, &mut pos)?),
            Opcode::JNZ => Raw::Jump(Instruction::Jnz, read_u16(bytes, &mut pos)?),
            Opcode::JMP => Raw::Jump(Instruction::Jmp, read_u16(bytes, &mut pos)?),
        };
        raw.push(instr);
    }

    raw.into_iter()
        .map(|r| match r {
            Raw::Plain(instr) => Ok(instr),
            Raw::Jump(ctor, offset) => {
                let index = offset_to_index
                    .get(&(offset as usize))
                    .copied()
                    .ok_or(LoaderError::BadJumpTarget)?;
                Ok(ctor(index))
            }
        })
        .collect()
}

fn read_byte(bytes: &[u8], pos: &mut usize) -> Result<u8, LoaderError> {
    let b = *bytes.get(*pos).ok_or(LoaderError::Truncated)?;
    *pos += 1;
    Ok(b)
}

fn read_u16(bytes: &[u8], pos: &mut usize) -> Result<u16, LoaderError> {
    let slice = bytes.get(*pos..*pos + 2).ok_or(LoaderError::Truncated)?;
    *pos += 2;
    Ok(LittleEndian::read_u16(slice))
}

#[cfg(test)]
mod test {
    use super::*;

    fn image_from(consts: Vec<u8>, code: Vec<u8>) -> bayak_image::Image {
        bayak_image::Image::from(consts, code)
    }

    #[test]
    fn decodes_flat_top_level_code() {
        let consts = Constant::Int(41).encode();
        let code = vec![Opcode::LOAD_CONST as u8, 0, Opcode::RETN as u8];
        let program = load(&image_from(consts, code)).unwrap();
        assert_eq!(program.consts, vec![Constant::Int(41)]);
        assert!(program.functions.is_empty());
        assert_eq!(
            program.top_level,
            vec![Instruction::LoadConst(0), Instruction::Retn]
        );
    }

    #[test]
    fn decodes_function_bodies_before_top_level() {
        let mut code = Vec::new();
        code.push(Opcode::PROC as u8);
        code.push(Opcode::PASS as u8);
        code.push(Opcode::RETN as u8);
        code.push(Opcode::MAKE_FUNCTION as u8);
        code.push(Opcode::PASS as u8);

        let program = load(&image_from(Vec::new(), code)).unwrap();
        assert_eq!(program.functions, vec![vec![Instruction::Pass, Instruction::Retn]]);
        assert_eq!(program.top_level, vec![Instruction::Pass]);
    }

    #[test]
    fn resolves_jump_offsets_to_indices() {
        let mut code = Vec::new();
        code.push(Opcode::JMP as u8);
        code.extend_from_slice(&[3, 0]); // jump to byte offset 3 (the PASS)
        code.push(Opcode::PASS as u8);

        let program = load(&image_from(Vec::new(), code)).unwrap();
        assert_eq!(program.top_level, vec![Instruction::Jmp(1), Instruction::Pass]);
    }

    #[test]
    fn rejects_bad_const_tag() {
        let err = load(&image_from(vec![99], Vec::new())).unwrap_err();
        assert_eq!(err, LoaderError::UnknownConstTag(99));
    }
}
