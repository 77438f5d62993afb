use crate::error::AsmError;
use bayak::{CompareOp, Constant, Opcode};
use bayak_image::Image;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;
use std::convert::TryFrom;
use std::str::FromStr;

/// One instruction stream being built: either a function body (reset at
/// `PROC`) or the trailing top-level section. Jump targets are resolved as
/// offsets relative to the start of *this* buffer, matching the loader, which
/// decodes each function body and the top-level code as independent slices.
#[derive(Default)]
struct Section {
    bytes: Vec<u8>,
    labels: HashMap<String, usize>,
    /// (label name, position of the placeholder `u16` to overwrite, line for
    /// error reporting).
    pending_jumps: Vec<(String, usize, usize)>,
}

impl Section {
    fn mark_label(&mut self, name: String) {
        self.labels.insert(name, self.bytes.len());
    }

    fn push_jump_placeholder(&mut self, label: String, line: usize) {
        let pos = self.bytes.len();
        self.bytes.extend_from_slice(&[0, 0]);
        self.pending_jumps.push((label, pos, line));
    }

    fn resolve_jumps(&mut self) -> Result<(), AsmError> {
        for (label, pos, line) in &self.pending_jumps {
            let target = *self
                .labels
                .get(label)
                .ok_or_else(|| AsmError::UnknownLabel {
                    name: label.clone(),
                    line: *line,
                })?;
            LittleEndian::write_u16(&mut self.bytes[*pos..*pos + 2], target as u16);
        }
        Ok(())
    }
}

#[derive(Default)]
struct ConstPool {
    consts: Vec<Constant>,
    index: HashMap<Vec<u8>, u8>,
}

impl ConstPool {
    fn intern(&mut self, constant: Constant) -> u8 {
        let encoded = constant.encode();
        if let Some(idx) = self.index.get(&encoded) {
            return *idx;
        }
        let idx = self.consts.len() as u8;
        self.index.insert(encoded, idx);
        self.consts.push(constant);
        idx
    }

    fn encode(&self) -> Vec<u8> {
        self.consts.iter().flat_map(|c| c.encode()).collect()
    }
}

/// Assembles textual bytecode assembly (one mnemonic, with an optional
/// leading `label:`, per line) into a binary [`Image`].
///
/// Function definitions (`PROC` .. `MAKE_FUNCTION` spans) must all appear
/// before any top-level code, matching what `bayak-gen` emits.
pub fn assemble(text: &str) -> Result<Image, AsmError> {
    let mut consts = ConstPool::default();
    let mut funcs: Vec<Vec<u8>> = Vec::new();
    let mut top = Section::default();
    let mut current_func: Option<Section> = None;

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = line_no + 1;
        let mut rest = raw_line.trim();
        if rest.is_empty() {
            continue;
        }

        if let Some(colon) = rest.find(':') {
            // Only treat as a label if there's no whitespace before the colon
            // (otherwise ':' could only appear as part of a malformed line).
            let candidate = &rest[..colon];
            if !candidate.is_empty() && !candidate.contains(char::is_whitespace) {
                validate_label_name(candidate, line)?;
                let section = active(&mut top, &mut current_func);
                if section.labels.contains_key(candidate) {
                    return Err(AsmError::DuplicateLabel {
                        name: candidate.to_string(),
                        line,
                    });
                }
                section.mark_label(candidate.to_string());
                rest = rest[colon + 1..].trim();
                if rest.is_empty() {
                    continue;
                }
            }
        }

        let (mnemonic, arg) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };

        let opcode =
            Opcode::from_str(&mnemonic.to_uppercase()).map_err(|_| AsmError::UnknownMnemonic {
                mnemonic: mnemonic.to_string(),
                line,
            })?;

        match opcode {
            Opcode::PROC => {
                require_no_operand(mnemonic, arg, line)?;
                if current_func.is_some() {
                    return Err(AsmError::NestedProc { line });
                }
                current_func = Some(Section::default());
            }
            Opcode::MAKE_FUNCTION => {
                require_no_operand(mnemonic, arg, line)?;
                let mut section = current_func
                    .take()
                    .ok_or(AsmError::UnmatchedMakeFunction { line })?;
                section.resolve_jumps()?;
                // Offsets inside `section.bytes` are relative to the instruction
                // right after PROC, matching how the loader slices out a
                // function body before decoding it. The PROC/MAKE_FUNCTION
                // marker bytes themselves only exist so the loader can find
                // that slice; they never participate in offset arithmetic.
                let mut body = vec![Opcode::PROC as u8];
                body.extend_from_slice(&section.bytes);
                body.push(Opcode::MAKE_FUNCTION as u8);
                funcs.push(body);
            }
            Opcode::ADD | Opcode::SUB | Opcode::DIV | Opcode::MULT | Opcode::RETN | Opcode::PASS => {
                require_no_operand(mnemonic, arg, line)?;
                active(&mut top, &mut current_func).bytes.push(opcode as u8);
            }
            Opcode::JZ | Opcode::JNZ | Opcode::JMP => {
                let label = require_operand(mnemonic, arg, line)?;
                let section = active(&mut top, &mut current_func);
                section.bytes.push(opcode as u8);
                section.push_jump_placeholder(label.to_string(), line);
            }
            Opcode::LOAD_CONST => {
                let arg = require_operand(mnemonic, arg, line)?;
                let constant = parse_const(arg, line)?;
                let idx = consts.intern(constant);
                let section = active(&mut top, &mut current_func);
                section.bytes.push(opcode as u8);
                section.bytes.push(idx);
            }
            Opcode::CMP => {
                let arg = require_operand(mnemonic, arg, line)?;
                let code = parse_cmp_operand(arg, line)?;
                let section = active(&mut top, &mut current_func);
                section.bytes.push(opcode as u8);
                section.bytes.push(code);
            }
            Opcode::CALL
            | Opcode::STORE_VAR
            | Opcode::STORE_GLOBAL
            | Opcode::LOAD_GLOBAL
            | Opcode::LOAD_LOCAL
            | Opcode::CALL_BUILTIN => {
                let arg = require_operand(mnemonic, arg, line)?;
                let byte = parse_byte_operand(arg, line)?;
                let section = active(&mut top, &mut current_func);
                section.bytes.push(opcode as u8);
                section.bytes.push(byte);
            }
        }
    }

    if current_func.is_some() {
        return Err(AsmError::UnterminatedFunction);
    }
    top.resolve_jumps()?;

    let mut code = Vec::new();
    for func in &funcs {
        code.extend_from_slice(func);
    }
    code.extend_from_slice(&top.bytes);

    Ok(Image::from(consts.encode(), code))
}

fn active<'a>(top: &'a mut Section, current_func: &'a mut Option<Section>) -> &'a mut Section {
    match current_func {
        Some(section) => section,
        None => top,
    }
}

fn validate_label_name(name: &str, line: usize) -> Result<(), AsmError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || c == '_');
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(AsmError::InvalidLabelName {
            text: name.to_string(),
            line,
        })
    }
}

fn require_no_operand(mnemonic: &str, arg: &str, line: usize) -> Result<(), AsmError> {
    if arg.is_empty() {
        Ok(())
    } else {
        Err(AsmError::UnexpectedOperand {
            mnemonic: mnemonic.to_string(),
            line,
        })
    }
}

fn require_operand<'a>(mnemonic: &str, arg: &'a str, line: usize) -> Result<&'a str, AsmError> {
    if arg.is_empty() {
        Err(AsmError::MissingOperand {
            mnemonic: mnemonic.to_string(),
            line,
        })
    } else {
        Ok(arg)
    }
}

fn parse_byte_operand(arg: &str, line: usize) -> Result<u8, AsmError> {
    let value: i64 = arg.parse().map_err(|_| AsmError::MalformedIntOperand {
        text: arg.to_string(),
        line,
    })?;
    u8::try_from(value).map_err(|_| AsmError::OperandOutOfRange {
        text: arg.to_string(),
        line,
    })
}

fn parse_cmp_operand(arg: &str, line: usize) -> Result<u8, AsmError> {
    if let Ok(op) = CompareOp::from_str(&arg.to_uppercase()) {
        return Ok(op as u8);
    }
    parse_byte_operand(arg, line)
}

/// Parses a `LOAD_CONST` operand: a single- or double-quoted string (with a
/// single backslash escape for an embedded matching quote), a `.`-containing
/// float, or a plain decimal integer. Hex/binary literals are not supported
/// here; the code generator resolves those down to decimal text already.
fn parse_const(arg: &str, line: usize) -> Result<Constant, AsmError> {
    let first = arg.chars().next().unwrap();
    if first == '"' || first == '\'' {
        return Ok(Constant::String(parse_quoted(arg, first, line)?));
    }
    if arg.contains('.') {
        let v: f32 = arg.parse().map_err(|_| AsmError::MalformedFloatOperand {
            text: arg.to_string(),
            line,
        })?;
        return Ok(Constant::Float(v));
    }
    let v: i32 = arg.parse().map_err(|_| AsmError::MalformedIntOperand {
        text: arg.to_string(),
        line,
    })?;
    Ok(Constant::Int(v))
}

fn parse_quoted(arg: &str, quote: char, line: usize) -> Result<Vec<u8>, AsmError> {
    let bytes: Vec<char> = arg.chars().collect();
    if bytes.len() < 2 || bytes[bytes.len() - 1] != quote {
        return Err(AsmError::MalformedStringOperand {
            text: arg.to_string(),
            line,
        });
    }
    let inner = &bytes[1..bytes.len() - 1];
    let mut out = String::new();
    let mut i = 0;
    while i < inner.len() {
        if inner[i] == '\\' && i + 1 < inner.len() && inner[i + 1] == quote {
            out.push(quote);
            i += 2;
        } else {
            out.push(inner[i]);
            i += 1;
        }
    }
    Ok(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consts_and_code(image: &Image) -> (&[u8], &[u8]) {
        (image.consts(), image.code())
    }

    #[test]
    fn flat_instructions_assemble_in_order() {
        let image = assemble("LOAD_CONST 1\nLOAD_CONST 2\nADD\n").unwrap();
        let (consts, code) = consts_and_code(&image);
        assert_eq!(consts.len(), 10); // two 5-byte int constants
        assert_eq!(code, &[Opcode::LOAD_CONST as u8, 0, Opcode::LOAD_CONST as u8, 1, Opcode::ADD as u8]);
    }

    #[test]
    fn duplicate_constants_are_deduplicated() {
        let image = assemble("LOAD_CONST 7\nLOAD_CONST 7\n").unwrap();
        assert_eq!(image.consts().len(), 5);
        assert_eq!(image.code(), &[Opcode::LOAD_CONST as u8, 0, Opcode::LOAD_CONST as u8, 0]);
    }

    #[test]
    fn jump_resolves_to_section_relative_offset() {
        let image = assemble("JZ done\nPASS\ndone: RETN\n").unwrap();
        let code = image.code();
        assert_eq!(code[0], Opcode::JZ as u8);
        let target = u16::from_le_bytes([code[1], code[2]]);
        assert_eq!(target as usize, 4); // JZ(3 bytes) + PASS(1 byte)
    }

    #[test]
    fn function_body_jump_is_relative_to_its_own_start() {
        let asm = "PROC\nJZ skip\nPASS\nskip: RETN\nMAKE_FUNCTION\nCALL 0\n";
        let image = assemble(asm).unwrap();
        let code = image.code();
        assert_eq!(code[0], Opcode::PROC as u8);
        assert_eq!(code[1], Opcode::JZ as u8);
        let target = u16::from_le_bytes([code[2], code[3]]);
        assert_eq!(target as usize, 4); // relative to the instruction right after PROC
    }

    #[test]
    fn unknown_label_is_an_error() {
        let err = assemble("JZ nowhere\n").unwrap_err();
        assert_eq!(
            err,
            AsmError::UnknownLabel {
                name: "nowhere".to_string(),
                line: 1
            }
        );
    }

    #[test]
    fn string_constant_unescapes_embedded_quote() {
        let image = assemble("LOAD_CONST 'it\\'s'\n").unwrap();
        assert_eq!(&image.consts()[1..], b"it's\0");
    }

    #[test]
    fn unterminated_function_is_an_error() {
        let err = assemble("PROC\nRETN\n").unwrap_err();
        assert_eq!(err, AsmError::UnterminatedFunction);
    }

    #[test]
    fn byte_operand_out_of_range_is_rejected() {
        let err = assemble("CALL 999\n").unwrap_err();
        assert_eq!(
            err,
            AsmError::OperandOutOfRange {
                text: "999".to_string(),
                line: 1
            }
        );
    }
}
