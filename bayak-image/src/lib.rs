//! Binary container for the [bayak](../bayak/index.html) bytecode format.
//!
//! An [`Image`] is the externally-stable artifact that couples the assembler and the
//! VM loader: a magic tag, a length-prefixed constants pool, and a trailing code
//! section holding every function body followed by the top-level instruction stream.
//! Splitting functions from top-level code is the loader's job (it scans for `PROC`
//! markers); this crate only knows about the two length-delimited byte regions.
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Magic bytes that open every bayak binary image: `'B' 'Y' 'A' 'K'`.
pub const MAGIC: [u8; 4] = [0x42, b'Y', b'A', b'K'];

#[derive(Debug, PartialEq)]
pub struct Image {
    consts: Vec<u8>,
    code: Vec<u8>,
}

impl Image {
    pub fn from(consts: Vec<u8>, code: Vec<u8>) -> Image {
        Image { consts, code }
    }

    pub fn copy_from(consts: &[u8], code: &[u8]) -> Image {
        Image {
            consts: Vec::from(consts),
            code: Vec::from(code),
        }
    }

    /// Encoded constants pool (each entry is `tag(u8) ‖ payload`, see `bayak::Const`).
    pub fn consts(&self) -> &[u8] {
        &self.consts[..]
    }

    /// Function bodies followed by the top-level instruction stream, concatenated.
    pub fn code(&self) -> &[u8] {
        &self.code[..]
    }

    pub fn required_size(&self) -> usize {
        MAGIC.len() + 4 + self.consts.len() + self.code.len()
    }
}

#[derive(Debug)]
pub enum Error {
    BadMagic,
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BadMagic => write!(f, "Image does not start with the BYAK magic bytes."),
            Error::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

pub fn read<R: Read>(reader: &mut R) -> Result<Image, Error> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(Error::BadMagic);
    }

    let consts_len = reader.read_u32::<LittleEndian>()?;
    let mut consts = vec![0; consts_len as usize];
    reader.read_exact(&mut consts)?;

    let mut code = Vec::new();
    reader.read_to_end(&mut code)?;

    Ok(Image::from(consts, code))
}

pub fn write<W: Write>(writer: &mut W, image: &Image) -> std::io::Result<()> {
    writer.write_all(&MAGIC)?;
    writer.write_u32::<LittleEndian>(image.consts.len() as u32)?;
    writer.write_all(&image.consts[..])?;
    writer.write_all(&image.code[..])?;
    Ok(())
}

pub trait ReadImageExt: Read + Sized {
    fn read_image(&mut self) -> Result<Image, Error> {
        read(self)
    }
}

impl<R: Read + Sized> ReadImageExt for R {}

pub trait WriteImageExt: Write + Sized {
    fn write_image(&mut self, image: &Image) -> std::io::Result<()> {
        write(self, image)
    }
}

impl<W: Write + Sized> WriteImageExt for W {}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Image, Error> {
    BufReader::new(File::open(path)?).read_image()
}

pub fn write_file<P: AsRef<Path>>(path: P, image: &Image) -> std::io::Result<()> {
    BufWriter::new(File::create(path)?).write_image(image)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        let image = Image::copy_from(&[0, 0, 0, 0][..], &[15, 5][..]);
        let mut buf = Vec::new();
        write(&mut buf, &image).unwrap();

        let read_back = read(&mut &buf[..]).unwrap();
        assert_eq!(image, read_back);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0u8, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(read(&mut &bytes[..]), Err(Error::BadMagic)));
    }
}
