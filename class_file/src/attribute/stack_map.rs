use anyhow::{anyhow, bail, Context, Result};
use crate::{ByteReader, ClassRead, ClassWrite};
use crate::attribute::code::CodeContext;
use crate::error::ClassFileError;
use crate::pool::{ConstantPool, PoolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationType {
	Top,
	Integer,
	Float,
	Double,
	Long,
	Null,
	UninitializedThis,
	/// Refers to a `Class` constant.
	Object {
		cpool_index: u16,
	},
	/// The code offset of the `new` instruction that created the object.
	Uninitialized {
		offset: u16,
	},
}

impl VerificationType {
	fn read(reader: &mut ByteReader, pool: &ConstantPool, code: Option<&CodeContext>) -> Result<VerificationType> {
		Ok(match reader.read_u8()? {
			0 => VerificationType::Top,
			1 => VerificationType::Integer,
			2 => VerificationType::Float,
			3 => VerificationType::Double,
			4 => VerificationType::Long,
			5 => VerificationType::Null,
			6 => VerificationType::UninitializedThis,
			7 => {
				let cpool_index = reader.read_u16()?;
				pool.resolve(cpool_index, PoolKind::Class)?;
				VerificationType::Object { cpool_index }
			},
			8 => {
				let offset = reader.read_u16()?;
				if let Some(code) = code {
					code.check_offset(offset as u32, "uninitialized variable offset")?;
				}
				VerificationType::Uninitialized { offset }
			},
			tag => bail!(ClassFileError::malformed(format!("unknown verification type tag {tag}"))),
		})
	}

	fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		match *self {
			VerificationType::Top => writer.write_u8(0),
			VerificationType::Integer => writer.write_u8(1),
			VerificationType::Float => writer.write_u8(2),
			VerificationType::Double => writer.write_u8(3),
			VerificationType::Long => writer.write_u8(4),
			VerificationType::Null => writer.write_u8(5),
			VerificationType::UninitializedThis => writer.write_u8(6),
			VerificationType::Object { cpool_index } => {
				writer.write_u8(7)?;
				writer.write_u16(cpool_index)
			},
			VerificationType::Uninitialized { offset } => {
				writer.write_u8(8)?;
				writer.write_u16(offset)
			},
		}
	}
}

/// An entry of the `StackMapTable` attribute.
///
/// Frame types `128` to `246` are reserved and rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
	/// Frame types `0` to `63`, the frame type is the offset delta.
	Same {
		offset_delta: u8,
	},
	/// Frame types `64` to `127`, the frame type is the offset delta plus `64`.
	SameLocals1StackItem {
		offset_delta: u8,
		stack: VerificationType,
	},
	/// Frame type `247`.
	SameLocals1StackItemExtended {
		offset_delta: u16,
		stack: VerificationType,
	},
	/// Frame types `248` to `250`, removing the last `chopped` (`1` to `3`) locals.
	Chop {
		chopped: u8,
		offset_delta: u16,
	},
	/// Frame type `251`.
	SameExtended {
		offset_delta: u16,
	},
	/// Frame types `252` to `254`, adding one to three locals.
	Append {
		offset_delta: u16,
		locals: Vec<VerificationType>,
	},
	/// Frame type `255`.
	Full {
		offset_delta: u16,
		locals: Vec<VerificationType>,
		stack: Vec<VerificationType>,
	},
}

impl StackMapFrame {
	pub fn offset_delta(&self) -> u16 {
		match *self {
			StackMapFrame::Same { offset_delta } |
			StackMapFrame::SameLocals1StackItem { offset_delta, .. } => offset_delta as u16,
			StackMapFrame::SameLocals1StackItemExtended { offset_delta, .. } |
			StackMapFrame::Chop { offset_delta, .. } |
			StackMapFrame::SameExtended { offset_delta } |
			StackMapFrame::Append { offset_delta, .. } |
			StackMapFrame::Full { offset_delta, .. } => offset_delta,
		}
	}

	fn read(reader: &mut ByteReader, pool: &ConstantPool, code: Option<&CodeContext>) -> Result<StackMapFrame> {
		let frame_type = reader.read_u8()?;
		Ok(match frame_type {
			0..=63 => StackMapFrame::Same { offset_delta: frame_type },
			64..=127 => StackMapFrame::SameLocals1StackItem {
				offset_delta: frame_type - 64,
				stack: VerificationType::read(reader, pool, code)?,
			},
			128..=246 => bail!(ClassFileError::malformed(format!("reserved stack map frame type {frame_type}"))),
			247 => StackMapFrame::SameLocals1StackItemExtended {
				offset_delta: reader.read_u16()?,
				stack: VerificationType::read(reader, pool, code)?,
			},
			248..=250 => StackMapFrame::Chop {
				chopped: 251 - frame_type,
				offset_delta: reader.read_u16()?,
			},
			251 => StackMapFrame::SameExtended { offset_delta: reader.read_u16()? },
			252..=254 => {
				let offset_delta = reader.read_u16()?;
				let locals = reader.read_vec(
					|_| Ok((frame_type - 251) as usize),
					|r| VerificationType::read(r, pool, code)
				)?;
				StackMapFrame::Append { offset_delta, locals }
			},
			255 => {
				let offset_delta = reader.read_u16()?;
				let locals = reader.read_vec(|r| r.read_u16_as_usize(), |r| VerificationType::read(r, pool, code))?;
				let stack = reader.read_vec(|r| r.read_u16_as_usize(), |r| VerificationType::read(r, pool, code))?;
				StackMapFrame::Full { offset_delta, locals, stack }
			},
		})
	}

	fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		match self {
			&StackMapFrame::Same { offset_delta } => {
				if offset_delta > 63 {
					bail!(ClassFileError::malformed(format!("offset_delta {offset_delta} too large for a same frame")));
				}
				writer.write_u8(offset_delta)
			},
			StackMapFrame::SameLocals1StackItem { offset_delta, stack } => {
				if *offset_delta > 63 {
					bail!(ClassFileError::malformed(format!("offset_delta {offset_delta} too large for a same_locals_1_stack_item frame")));
				}
				writer.write_u8(64 + offset_delta)?;
				stack.write(writer)
			},
			StackMapFrame::SameLocals1StackItemExtended { offset_delta, stack } => {
				writer.write_u8(247)?;
				writer.write_u16(*offset_delta)?;
				stack.write(writer)
			},
			&StackMapFrame::Chop { chopped, offset_delta } => {
				if !(1..=3).contains(&chopped) {
					bail!(ClassFileError::malformed(format!("a chop frame removes one to three locals, not {chopped}")));
				}
				writer.write_u8(251 - chopped)?;
				writer.write_u16(offset_delta)
			},
			&StackMapFrame::SameExtended { offset_delta } => {
				writer.write_u8(251)?;
				writer.write_u16(offset_delta)
			},
			StackMapFrame::Append { offset_delta, locals } => {
				if !(1..=3).contains(&locals.len()) {
					bail!(ClassFileError::malformed(format!("an append frame adds one to three locals, not {}", locals.len())));
				}
				writer.write_u8(251 + locals.len() as u8)?;
				writer.write_u16(*offset_delta)?;
				for local in locals {
					local.write(writer)?;
				}
				Ok(())
			},
			StackMapFrame::Full { offset_delta, locals, stack } => {
				writer.write_u8(255)?;
				writer.write_u16(*offset_delta)?;
				writer.write_slice(locals, |w, size| w.write_usize_as_u16(size), |w, local| local.write(w))?;
				writer.write_slice(stack, |w, size| w.write_usize_as_u16(size), |w, item| item.write(w))
			},
		}
	}
}

/// Reads the frames of a `StackMapTable`, checking that each frame lands on an instruction.
pub(crate) fn read_frames(reader: &mut ByteReader, pool: &ConstantPool, code: Option<&CodeContext>) -> Result<Vec<StackMapFrame>> {
	let mut previous: Option<u32> = None;
	let mut index = 0;
	reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| {
			let frame = StackMapFrame::read(r, pool, code)
				.with_context(|| anyhow!("while reading stack map frame {index}"))?;
			let offset = match previous {
				None => frame.offset_delta() as u32,
				Some(previous) => previous + frame.offset_delta() as u32 + 1,
			};
			if let Some(code) = code {
				code.check_offset(offset, "stack map frame")
					.with_context(|| anyhow!("in stack map frame {index}"))?;
			}
			previous = Some(offset);
			index += 1;
			Ok(frame)
		}
	)
}

pub(crate) fn write_frames(writer: &mut impl ClassWrite, frames: &[StackMapFrame]) -> Result<()> {
	writer.write_slice(frames, |w, size| w.write_usize_as_u16(size), |w, frame| frame.write(w))
}
