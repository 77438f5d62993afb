use num_derive::{FromPrimitive, ToPrimitive};
use util::EnumFromStr;
use util_derive::EnumFromStr;

/// The bayak instruction set. Discriminants are part of the stable binary format
/// (§6 of the format notes) and must never be renumbered.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum Opcode {
    ADD = 1,
    SUB = 2,
    DIV = 3,
    MULT = 4,
    RETN = 5,
    CALL = 6,
    STORE_VAR = 7,
    STORE_GLOBAL = 8,
    LOAD_CONST = 9,
    LOAD_GLOBAL = 10,
    LOAD_LOCAL = 11,
    PROC = 12,
    MAKE_FUNCTION = 13,
    CALL_BUILTIN = 14,
    PASS = 15,
    JZ = 16,
    JNZ = 17,
    JMP = 18,
    CMP = 19,
}

impl Opcode {
    /// How many parameter bytes follow this opcode in the binary encoding.
    pub fn param_shape(self) -> ParamShape {
        match self {
            Opcode::ADD
            | Opcode::SUB
            | Opcode::DIV
            | Opcode::MULT
            | Opcode::RETN
            | Opcode::PROC
            | Opcode::MAKE_FUNCTION
            | Opcode::PASS => ParamShape::None,

            Opcode::JZ | Opcode::JNZ | Opcode::JMP => ParamShape::Jump,

            Opcode::CALL
            | Opcode::STORE_VAR
            | Opcode::STORE_GLOBAL
            | Opcode::LOAD_CONST
            | Opcode::LOAD_GLOBAL
            | Opcode::LOAD_LOCAL
            | Opcode::CALL_BUILTIN
            | Opcode::CMP => ParamShape::Byte,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamShape {
    /// No parameter byte (`ADD`, `RETN`, `PASS`, …).
    None,
    /// A single `u8` parameter (`CALL`, `LOAD_CONST`, `CMP`, …).
    Byte,
    /// A `u16` byte-offset parameter, resolved from a label at assemble time (`JZ`/`JNZ`/`JMP`).
    Jump,
}

/// Comparison codes used by the `CMP` opcode. Stable numbering, see spec §6.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum CompareOp {
    ISEQUAL = 0,
    NOTEQUAL = 1,
    GT = 2,
    GTE = 3,
    LT = 4,
    LTE = 5,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn mnemonic_round_trips() {
        assert_eq!(Opcode::from_str("STORE_VAR").unwrap(), Opcode::STORE_VAR);
        assert_eq!(Opcode::from_str("store_var"), Err(util::ParseEnumError {
            value: "store_var".to_owned(),
            enum_name: "Opcode",
        }));
    }

    #[test]
    fn stable_discriminants() {
        assert_eq!(Opcode::ADD as u8, 1);
        assert_eq!(Opcode::CMP as u8, 19);
        assert_eq!(CompareOp::ISEQUAL as u8, 0);
        assert_eq!(CompareOp::LTE as u8, 5);
    }
}
