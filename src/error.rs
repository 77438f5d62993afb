use std::fmt;

/// Fatal errors raised while decoding a binary [`Image`](bayak_image::Image) into a
/// runnable program.
#[derive(Clone, Debug, PartialEq)]
pub enum LoaderError {
    BadMagic,
    UnterminatedString,
    UnknownConstTag(u8),
    UnknownOpcode(u8),
    BadJumpTarget,
    Truncated,
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoaderError::BadMagic => write!(f, "Image does not start with the BYAK magic bytes."),
            LoaderError::UnterminatedString => {
                write!(f, "Constants pool contains an unterminated string.")
            }
            LoaderError::UnknownConstTag(tag) => write!(f, "Unknown constant tag {}.", tag),
            LoaderError::UnknownOpcode(op) => write!(f, "Unknown opcode byte {}.", op),
            LoaderError::BadJumpTarget => write!(f, "Jump instruction targets an offset that is not the start of an instruction."),
            LoaderError::Truncated => write!(f, "Image ended before an instruction could be fully decoded."),
        }
    }
}

impl std::error::Error for LoaderError {}

impl From<bayak_image::Error> for LoaderError {
    fn from(err: bayak_image::Error) -> LoaderError {
        match err {
            bayak_image::Error::BadMagic => LoaderError::BadMagic,
            bayak_image::Error::Io(_) => LoaderError::Truncated,
        }
    }
}

/// Fatal errors raised by the VM while executing a decoded program.
#[derive(Clone, Debug, PartialEq)]
pub enum VmError {
    StackUnderflow,
    UnsetGlobal(u8),
    UnsetLocal(u8),
    UnknownOp,
    NoFrame,
    BadJump,
    /// A function or builtin index did not exist.
    NoSuchFunction(u8),
    /// Arithmetic or comparison was attempted between a string and a number, or
    /// between incompatible runtime types more generally.
    TypeError(&'static str),
    /// Division by zero.
    DivisionByZero,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VmError::StackUnderflow => write!(f, "Operand stack underflow."),
            VmError::UnsetGlobal(i) => write!(f, "Global {} was read before being set.", i),
            VmError::UnsetLocal(i) => write!(f, "Local {} was read before being set.", i),
            VmError::UnknownOp => write!(f, "Encountered an opcode that must never be executed (PROC/MAKE_FUNCTION)."),
            VmError::NoFrame => write!(f, "Local variable access outside of a function call."),
            VmError::BadJump => write!(f, "Jump target is out of range."),
            VmError::NoSuchFunction(i) => write!(f, "Function or builtin {} does not exist.", i),
            VmError::TypeError(msg) => write!(f, "Type error: {}.", msg),
            VmError::DivisionByZero => write!(f, "Division by zero."),
        }
    }
}

impl std::error::Error for VmError {}
