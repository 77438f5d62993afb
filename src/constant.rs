use byteorder::{ByteOrder, LittleEndian};

/// Tag byte that precedes every encoded constant payload.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConstTag {
    INT = 0,
    FLOAT = 1,
    STRING = 2,
}

impl ConstTag {
    pub fn from_u8(v: u8) -> Option<ConstTag> {
        match v {
            0 => Some(ConstTag::INT),
            1 => Some(ConstTag::FLOAT),
            2 => Some(ConstTag::STRING),
            _ => None,
        }
    }
}

/// A compile-time literal value, deduplicated by encoded form in the constants pool.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Int(i32),
    Float(f32),
    String(Vec<u8>),
}

impl Constant {
    /// Encodes this constant as `tag(u8) ‖ payload`, matching the binary image format.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Constant::Int(v) => {
                let mut out = vec![ConstTag::INT as u8];
                let mut buf = [0u8; 4];
                LittleEndian::write_i32(&mut buf, *v);
                out.extend_from_slice(&buf);
                out
            }
            Constant::Float(v) => {
                let mut out = vec![ConstTag::FLOAT as u8];
                let mut buf = [0u8; 4];
                LittleEndian::write_f32(&mut buf, *v);
                out.extend_from_slice(&buf);
                out
            }
            Constant::String(bytes) => {
                let mut out = vec![ConstTag::STRING as u8];
                out.extend_from_slice(bytes);
                out.push(0);
                out
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn int_round_trip_bytes() {
        let encoded = Constant::Int(-1234).encode();
        assert_eq!(encoded[0], ConstTag::INT as u8);
        assert_eq!(LittleEndian::read_i32(&encoded[1..5]), -1234);
    }

    #[test]
    fn string_is_nul_terminated() {
        let encoded = Constant::String(b"hi".to_vec()).encode();
        assert_eq!(&encoded[..], &[ConstTag::STRING as u8, b'h', b'i', 0]);
    }

    #[test]
    fn identical_constants_encode_identically() {
        assert_eq!(Constant::Int(7).encode(), Constant::Int(7).encode());
        assert_ne!(Constant::Int(7).encode(), Constant::Float(7.0).encode());
    }
}
