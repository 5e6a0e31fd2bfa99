//! Offset based reading shared by all formats.
//!
//! Tables in M2, skin, and BLP files are located with absolute offsets.
//! Wrapped M2 files store offsets relative to the start of the wrapped data,
//! so [ByteCursor] adds a configurable chunk origin to every [ByteCursor::seek].
use std::io::Cursor;

use binrw::{BinRead, Endian};
use log::trace;

use crate::{error::FormatError, M2Array};

/// A little-endian reader over an in memory buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    reader: Cursor<&'a [u8]>,
    chunk_origin: u64,
    states: Vec<u64>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            reader: Cursor::new(bytes),
            chunk_origin: 0,
            states: Vec::new(),
        }
    }

    pub fn bytes(&self) -> &'a [u8] {
        *self.reader.get_ref()
    }

    pub fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// The absolute position in the buffer.
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    pub fn chunk_origin(&self) -> u64 {
        self.chunk_origin
    }

    /// Set the base offset added to every subsequent [ByteCursor::seek].
    pub fn set_chunk_origin(&mut self, chunk_origin: u64) {
        self.chunk_origin = chunk_origin;
    }

    /// Move to `offset` relative to the chunk origin.
    pub fn seek(&mut self, offset: u64) -> Result<(), FormatError> {
        let position = offset
            .checked_add(self.chunk_origin)
            .filter(|p| *p <= self.len())
            .ok_or(FormatError::OutOfBounds {
                offset: offset.saturating_add(self.chunk_origin),
                len: 0,
                size: self.len(),
            })?;
        self.reader.set_position(position);
        Ok(())
    }

    pub fn skip(&mut self, count: u64) -> Result<(), FormatError> {
        self.ensure(count)?;
        self.reader.set_position(self.position() + count);
        Ok(())
    }

    /// Save the current position without changing the chunk origin.
    pub fn push_state(&mut self) {
        self.states.push(self.position());
    }

    /// Restore the position saved by the last [ByteCursor::push_state].
    pub fn pop_state(&mut self) {
        if let Some(position) = self.states.pop() {
            self.reader.set_position(position);
        }
    }

    fn ensure(&self, len: u64) -> Result<(), FormatError> {
        if len > self.remaining() {
            Err(FormatError::OutOfBounds {
                offset: self.position(),
                len,
                size: self.len(),
            })
        } else {
            Ok(())
        }
    }

    fn read_primitive<T>(&mut self, size: u64) -> Result<T, FormatError>
    where
        for<'b> T: BinRead<Args<'b> = ()>,
    {
        self.ensure(size)?;
        T::read_le(&mut self.reader).map_err(Into::into)
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        self.read_primitive(1)
    }

    pub fn read_i8(&mut self) -> Result<i8, FormatError> {
        self.read_primitive(1)
    }

    pub fn read_u16(&mut self) -> Result<u16, FormatError> {
        self.read_primitive(2)
    }

    pub fn read_i16(&mut self) -> Result<i16, FormatError> {
        self.read_primitive(2)
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        self.read_primitive(4)
    }

    pub fn read_i32(&mut self) -> Result<i32, FormatError> {
        self.read_primitive(4)
    }

    pub fn read_f32(&mut self) -> Result<f32, FormatError> {
        self.read_primitive(4)
    }

    /// Consume exactly `len` bytes without any conversion or cleanup.
    pub fn read_fixed_string(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        self.ensure(len as u64)?;
        let start = self.position() as usize;
        let bytes = &self.bytes()[start..start + len];
        self.reader.set_position((start + len) as u64);
        Ok(bytes)
    }

    pub fn read_magic(&mut self) -> Result<[u8; 4], FormatError> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(self.read_fixed_string(4)?);
        Ok(magic)
    }

    /// Read a `(count, offset)` descriptor.
    pub fn read_array(&mut self) -> Result<M2Array, FormatError> {
        let count = self.read_u32()?;
        let offset = self.read_u32()?;
        Ok(M2Array { count, offset })
    }

    /// Read a fixed layout record at the current position.
    pub fn read_type<T>(&mut self) -> Result<T, FormatError>
    where
        for<'b> T: BinRead<Args<'b> = ()>,
    {
        let start = self.position();
        T::read_le(&mut self.reader).map_err(|e| self.read_error::<T>(start, e))
    }

    pub fn read_type_args<T, Args>(&mut self, args: Args) -> Result<T, FormatError>
    where
        for<'b> T: BinRead<Args<'b> = Args>,
    {
        let start = self.position();
        T::read_options(&mut self.reader, Endian::Little, args)
            .map_err(|e| self.read_error::<T>(start, e))
    }

    /// Running out of bytes is reported like the primitive reads.
    fn read_error<T>(&self, start: u64, e: binrw::Error) -> FormatError {
        if e.is_eof() {
            FormatError::OutOfBounds {
                offset: start,
                len: std::mem::size_of::<T>() as u64,
                size: self.len(),
            }
        } else {
            e.into()
        }
    }

    /// Read the string referenced by `array` with trailing zero bytes removed.
    pub fn read_string(&mut self, array: M2Array) -> Result<String, FormatError> {
        self.push_state();
        let result = self.seek(array.offset as u64).and_then(|_| {
            let bytes = self.read_fixed_string(array.count as usize)?;
            let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            Ok(String::from_utf8_lossy(&bytes[..end]).to_string())
        });
        self.pop_state();
        result
    }

    /// Read the `array.count` records at `array.offset` and return to the current position.
    pub fn read_vec<T>(&mut self, array: M2Array) -> Result<Vec<T>, FormatError>
    where
        for<'b> T: BinRead<Args<'b> = ()>,
    {
        self.read_vec_with(array, |cursor| cursor.read_type())
    }

    pub fn read_vec_args<T, Args>(&mut self, array: M2Array, args: Args) -> Result<Vec<T>, FormatError>
    where
        for<'b> T: BinRead<Args<'b> = Args>,
        Args: Clone,
    {
        self.read_vec_with(array, |cursor| cursor.read_type_args(args.clone()))
    }

    /// Read the `array.count` records at `array.offset` using `read_item`
    /// and return to the current position.
    pub fn read_vec_with<T, F>(&mut self, array: M2Array, mut read_item: F) -> Result<Vec<T>, FormatError>
    where
        F: FnMut(&mut Self) -> Result<T, FormatError>,
    {
        if array.count == 0 {
            return Ok(Vec::new());
        }

        self.push_state();
        let result = self.seek(array.offset as u64).and_then(|_| {
            trace!(
                "{}: {:?}",
                std::any::type_name::<Vec<T>>(),
                self.position()
            );
            // Every item takes at least one byte.
            self.ensure(array.count as u64)?;
            (0..array.count).map(|_| read_item(self)).collect()
        });
        self.pop_state();
        result
    }
}
