//! A crate for reading and writing [Java Class Files](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html).
//!
//! Reading happens in two phases: first the [`ConstantPool`] is read and validated, then the rest of the class file
//! is decoded with every constant pool index checked against that (now frozen) pool. Writing mirrors reading, and
//! for input that was read successfully, produces exactly the bytes that were read.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! let bytes = std::fs::read("Example.class")?;
//! let class = class_file::read_class(&bytes)?;
//! println!("{}", class.class_name()?.as_str_lossy());
//! assert_eq!(class_file::write_class(&class)?, bytes);
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod attribute;
pub mod class;
pub mod error;
pub mod instruction;
pub mod pool;
mod class_constants;

use std::io::Write;
use anyhow::{anyhow, Context, Result};

pub use class::{ClassFile, FieldInfo, MemberInfo, MethodInfo};
pub use class_constants::opcode;
pub use error::{BadIndex, ClassFileError};
pub use pool::{ConstantPool, PoolEntry, PoolKind};

/// Options for reading a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
	/// Check that code offsets (branch targets, exception handler ranges, type annotation locations, stack map frames
	/// and local variable ranges) land on instruction boundaries.
	pub verify_code_offsets: bool,
}

impl Default for ReadOptions {
	fn default() -> Self {
		ReadOptions {
			verify_code_offsets: true,
		}
	}
}

/// Reads a single class file, with the default [`ReadOptions`].
pub fn read_class(bytes: &[u8]) -> Result<ClassFile> {
	read_class_with(bytes, &ReadOptions::default())
}

/// Reads a single class file.
pub fn read_class_with(bytes: &[u8], options: &ReadOptions) -> Result<ClassFile> {
	ClassFile::read(bytes, options)
}

/// Writes a class file, recomputing every length and count.
pub fn write_class(class: &ClassFile) -> Result<Vec<u8>> {
	class.to_bytes()
}

/// A cursor over an in-memory buffer, that knows the offset of its data within the whole class file.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
	data: &'a [u8],
	pos: usize,
	/// Offset of `data[0]` within the class file.
	base: usize,
}

impl<'a> ByteReader<'a> {
	pub(crate) fn new(data: &'a [u8]) -> ByteReader<'a> {
		ByteReader { data, pos: 0, base: 0 }
	}

	/// The offset of the next byte to read, within the class file.
	pub(crate) fn offset(&self) -> usize {
		self.base + self.pos
	}

	/// The number of bytes read so far from this reader.
	pub(crate) fn position(&self) -> usize {
		self.pos
	}

	pub(crate) fn remaining(&self) -> usize {
		self.data.len() - self.pos
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.remaining() == 0
	}

	fn truncated(&self, needed: usize) -> ClassFileError {
		ClassFileError::Truncated {
			offset: self.offset(),
			needed,
			available: self.remaining(),
		}
	}

	pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
		if self.remaining() < len {
			return Err(self.truncated(len).into());
		}
		let slice = &self.data[self.pos..self.pos + len];
		self.pos += len;
		Ok(slice)
	}

	/// Splits off the next `len` bytes into a reader of their own, keeping offsets relative to the class file.
	pub(crate) fn sub_reader(&mut self, len: usize) -> Result<ByteReader<'a>> {
		let base = self.offset();
		let data = self.take(len)?;
		Ok(ByteReader { data, pos: 0, base })
	}
}

pub(crate) trait ClassRead {
	fn read_n<const N: usize>(&mut self) -> Result<[u8; N]>;
	fn read_u8(&mut self) -> Result<u8> {
		Ok(u8::from_be_bytes(self.read_n()?))
	}
	fn read_u16(&mut self) -> Result<u16> {
		Ok(u16::from_be_bytes(self.read_n()?))
	}
	fn read_u32(&mut self) -> Result<u32> {
		Ok(u32::from_be_bytes(self.read_n()?))
	}
	fn read_u64(&mut self) -> Result<u64> {
		Ok(u64::from_be_bytes(self.read_n()?))
	}
	fn read_i8(&mut self) -> Result<i8> {
		Ok(i8::from_be_bytes(self.read_n()?))
	}
	fn read_i16(&mut self) -> Result<i16> {
		Ok(i16::from_be_bytes(self.read_n()?))
	}
	fn read_i32(&mut self) -> Result<i32> {
		Ok(i32::from_be_bytes(self.read_n()?))
	}
	fn read_i64(&mut self) -> Result<i64> {
		Ok(i64::from_be_bytes(self.read_n()?))
	}

	fn read_u8_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u8()? as usize)
	}
	fn read_u16_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u16()? as usize)
	}
	fn read_u32_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u32()? as usize)
	}
	fn read_u8_vec(&mut self, size: usize) -> Result<Vec<u8>>;
	fn read_vec<T, S, E>(&mut self, get_size: S, mut get_element: E) -> Result<Vec<T>>
		where
			S: FnOnce(&mut Self) -> Result<usize>,
			E: FnMut(&mut Self) -> Result<T>
	{
		let size = get_size(self)?;
		// the size comes from untrusted input, so don't reserve more than could possibly be read
		let mut vec = Vec::with_capacity(size.min(1024));
		for _ in 0..size {
			vec.push(get_element(self)?);
		}
		Ok(vec)
	}
}

impl ClassRead for ByteReader<'_> {
	fn read_n<const N: usize>(&mut self) -> Result<[u8; N]> {
		let slice = self.take(N)?;
		let mut buf = [0u8; N];
		buf.copy_from_slice(slice);
		Ok(buf)
	}
	fn read_u8_vec(&mut self, size: usize) -> Result<Vec<u8>> {
		Ok(self.take(size)?.to_vec())
	}
}

pub(crate) trait ClassWrite {
	fn write_u8(&mut self, value: u8) -> Result<()> {
		self.write_u8_slice(&[value])
	}
	fn write_u16(&mut self, value: u16) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_u32(&mut self, value: u32) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_u64(&mut self, value: u64) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_i8(&mut self, value: i8) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_i16(&mut self, value: i16) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_i32(&mut self, value: i32) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes())
	}
	fn write_i64(&mut self, value: i64) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes())
	}

	fn write_usize_as_u8(&mut self, value: usize) -> Result<()> {
		self.write_u8(u8::try_from(value).with_context(|| anyhow!("failed to convert {value} to u8 for writing: value too large"))?)
	}
	fn write_usize_as_u16(&mut self, value: usize) -> Result<()> {
		self.write_u16(u16::try_from(value).with_context(|| anyhow!("failed to convert {value} to u16 for writing: value too large"))?)
	}
	fn write_usize_as_u32(&mut self, value: usize) -> Result<()> {
		self.write_u32(u32::try_from(value).with_context(|| anyhow!("failed to convert {value} to u32 for writing: value too large"))?)
	}

	fn write_u8_slice(&mut self, buf: &[u8]) -> Result<()>;
	fn write_slice<'t, T>(
		&mut self,
		slice: &'t [T],
		put_size: impl FnOnce(&mut Self, usize) -> Result<()>,
		mut put_element: impl FnMut(&mut Self, &'t T) -> Result<()>
	) -> Result<()> {
		put_size(self, slice.len())?;
		for value in slice {
			put_element(self, value)?;
		}
		Ok(())
	}
}

impl<T: Write> ClassWrite for T {
	fn write_u8_slice(&mut self, buf: &[u8]) -> Result<()> {
		self.write_all(buf).context("failed to write &[u8]")
	}
}
