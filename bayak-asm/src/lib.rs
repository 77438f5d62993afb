//! Assembles bayak's textual bytecode assembly (the output of `bayak-gen`) into a
//! binary `BYAK` image (see [`bayak_image`]).
//!
//! Assembly text is one instruction per line, optionally prefixed by a
//! `label:`. Jump mnemonics (`JZ`/`JNZ`/`JMP`) take a label name; every other
//! parameterized mnemonic takes a plain decimal byte. Opcode mnemonics are
//! case-insensitive. A single pass writes instructions into a growing output
//! buffer per section (one function body, or the top-level code), recording
//! backpatch sites for forward jump references and resolving them against
//! that section's label map when the section closes.
mod assembler;
mod error;

pub use assembler::assemble;
pub use error::AsmError;
