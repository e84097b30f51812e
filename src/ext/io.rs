use crate::types::Encoding;
use crate::utils::encoding::decode_to_string;
use std::io::*;

pub trait Peek {
    fn peek(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn peek_extract(&mut self, buf: &mut [u8]) -> Result<()>;
    fn peek_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize>;
    fn peek_extract_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<()>;

    fn peek_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.peek_extract(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }
    fn peek_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.peek_extract(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
    fn peek_u16_at(&mut self, offset: usize) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.peek_extract_at(offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }
    fn peek_u32_at(&mut self, offset: usize) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.peek_extract_at(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl<T: Read + Seek> Peek for T {
    fn peek(&mut self, buf: &mut [u8]) -> Result<usize> {
        let current_pos = self.stream_position()?;
        let bytes_read = self.read(buf)?;
        self.seek(SeekFrom::Start(current_pos))?;
        Ok(bytes_read)
    }

    fn peek_extract(&mut self, buf: &mut [u8]) -> Result<()> {
        let current_pos = self.stream_position()?;
        self.read_exact(buf)?;
        self.seek(SeekFrom::Start(current_pos))?;
        Ok(())
    }

    fn peek_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let current_pos = self.stream_position()?;
        self.seek(SeekFrom::Start(offset as u64))?;
        let bytes_read = self.read(buf)?;
        self.seek(SeekFrom::Start(current_pos))?;
        Ok(bytes_read)
    }

    fn peek_extract_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let current_pos = self.stream_position()?;
        self.seek(SeekFrom::Start(offset as u64))?;
        self.read_exact(buf)?;
        self.seek(SeekFrom::Start(current_pos))?;
        Ok(())
    }
}

pub trait ReadExt {
    fn read_u16(&mut self) -> Result<u16>;
    fn read_u32(&mut self) -> Result<u32>;

    fn read_fstring(&mut self, len: usize, encoding: Encoding, trim: bool) -> Result<String>;

    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>>;
}

impl<T: Read> ReadExt for T {
    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }
    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_fstring(&mut self, len: usize, encoding: Encoding, trim: bool) -> Result<String> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        if trim {
            let first_zero = buf.iter().position(|&b| b == 0);
            if let Some(pos) = first_zero {
                buf.truncate(pos);
            }
        }
        let s = decode_to_string(encoding, &buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(s)
    }

    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

pub trait SeekExt {
    /// Total length of the stream, preserving the current position.
    fn stream_length(&mut self) -> Result<u64>;
}

impl<T: Seek> SeekExt for T {
    fn stream_length(&mut self) -> Result<u64> {
        let current_pos = self.stream_position()?;
        let len = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(current_pos))?;
        Ok(len)
    }
}
