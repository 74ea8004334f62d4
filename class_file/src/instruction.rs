//! Decoding and encoding of the instruction stream of a `Code` attribute.
//!
//! Every [`Instruction`] remembers the offset it was read from. Branch operands stay relative to that offset, so
//! encoding unmodified instructions gives back the bytes that were read. After instructions are added or removed, the
//! targets are found by the recorded offsets and encoded relative to the new positions. The padding of `tableswitch` and `lookupswitch` is not stored:
//! it is computed from the position the instruction is written at.

use std::collections::HashMap;
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use crate::{ByteReader, ClassRead, ClassWrite};
use crate::class_constants::{atype, opcode};
use crate::error::ClassFileError;
use crate::pool::{ConstantPool, PoolKind, LOADABLE, LOADABLE_WIDE, METHOD_OR_INTERFACE_METHOD};

/// A decoded instruction.
///
/// For an instruction with a `wide` prefix, `opcode` is the opcode of the modified instruction and `offset` the offset
/// of the `wide` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
	pub offset: u32,
	pub opcode: u8,
	pub operands: Operands,
}

/// The operands of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operands {
	None,
	/// `bipush`
	Byte(i8),
	/// `sipush`
	Short(i16),
	/// `newarray`, one of the `T_*` array type codes.
	ArrayType(u8),
	/// A constant pool index. For `ldc` only values up to `255` can be encoded.
	Constant(u16),
	/// A local variable index, 16 bits wide if the instruction has the `wide` prefix.
	Local {
		index: u16,
		wide: bool,
	},
	/// `iinc`
	Increment {
		index: u16,
		constant: i16,
		wide: bool,
	},
	/// A branch offset, relative to the offset of the instruction.
	Branch(i32),
	TableSwitch {
		default: i32,
		low: i32,
		high: i32,
		offsets: Vec<i32>,
	},
	LookupSwitch {
		default: i32,
		/// `(match, offset)` pairs.
		pairs: Vec<(i32, i32)>,
	},
	InvokeInterface {
		index: u16,
		count: u8,
	},
	InvokeDynamic {
		index: u16,
	},
	MultiANewArray {
		index: u16,
		dimensions: u8,
	},
}

/// The layout of the operands following an opcode.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
	None,
	Byte,
	Short,
	ArrayType,
	/// `ldc`, with a one byte index.
	NarrowConstant(&'static [PoolKind]),
	Constant(&'static [PoolKind]),
	Local,
	Increment,
	Branch,
	BranchWide,
	TableSwitch,
	LookupSwitch,
	InvokeInterface,
	InvokeDynamic,
	MultiANewArray,
	Wide,
}

fn shape(op: u8) -> Option<Shape> {
	const FIELD: &[PoolKind] = &[PoolKind::Fieldref];
	const METHOD: &[PoolKind] = &[PoolKind::Methodref];
	const CLASS: &[PoolKind] = &[PoolKind::Class];

	Some(match op {
		opcode::BIPUSH => Shape::Byte,
		opcode::SIPUSH => Shape::Short,
		opcode::NEWARRAY => Shape::ArrayType,
		opcode::LDC => Shape::NarrowConstant(LOADABLE),
		opcode::LDC_W => Shape::Constant(LOADABLE),
		opcode::LDC2_W => Shape::Constant(LOADABLE_WIDE),
		opcode::ILOAD..=opcode::ALOAD |
		opcode::ISTORE..=opcode::ASTORE |
		opcode::RET => Shape::Local,
		opcode::IINC => Shape::Increment,
		opcode::IFEQ..=opcode::JSR |
		opcode::IFNULL |
		opcode::IFNONNULL => Shape::Branch,
		opcode::GOTO_W | opcode::JSR_W => Shape::BranchWide,
		opcode::TABLESWITCH => Shape::TableSwitch,
		opcode::LOOKUPSWITCH => Shape::LookupSwitch,
		opcode::GETSTATIC..=opcode::PUTFIELD => Shape::Constant(FIELD),
		opcode::INVOKEVIRTUAL => Shape::Constant(METHOD),
		opcode::INVOKESPECIAL | opcode::INVOKESTATIC => Shape::Constant(METHOD_OR_INTERFACE_METHOD),
		opcode::INVOKEINTERFACE => Shape::InvokeInterface,
		opcode::INVOKEDYNAMIC => Shape::InvokeDynamic,
		opcode::NEW | opcode::ANEWARRAY | opcode::CHECKCAST | opcode::INSTANCEOF => Shape::Constant(CLASS),
		opcode::MULTIANEWARRAY => Shape::MultiANewArray,
		opcode::WIDE => Shape::Wide,
		op => {
			opcode::mnemonic(op)?;
			Shape::None
		},
	})
}

/// The number of zero bytes following a `tableswitch` or `lookupswitch` at `offset`.
fn padding(offset: usize) -> usize {
	(4 - (offset + 1) % 4) % 4
}

impl Instruction {
	/// The lower case mnemonic of the opcode, like `invokevirtual`.
	pub fn mnemonic(&self) -> String {
		opcode::mnemonic(self.opcode)
			.map(str::to_ascii_lowercase)
			.unwrap_or_else(|| format!("<{:#04x}>", self.opcode))
	}

	/// The absolute target offsets of a branch, `tableswitch` or `lookupswitch`. Empty for all other instructions.
	///
	/// For the switches, the default target comes first.
	pub fn branch_targets(&self) -> Vec<i64> {
		let base = self.offset as i64;
		match &self.operands {
			&Operands::Branch(relative) => vec![base + relative as i64],
			Operands::TableSwitch { default, offsets, .. } => {
				std::iter::once(default).chain(offsets)
					.map(|&relative| base + relative as i64)
					.collect()
			},
			Operands::LookupSwitch { default, pairs } => {
				std::iter::once(default).chain(pairs.iter().map(|(_, offset)| offset))
					.map(|&relative| base + relative as i64)
					.collect()
			},
			_ => Vec::new(),
		}
	}

	/// A line in the style of a disassembler listing, with constant pool operands resolved.
	pub fn describe(&self, pool: &ConstantPool) -> Result<String> {
		let mnemonic = self.mnemonic();
		let wide = |wide: bool| if wide { "wide " } else { "" };
		let operands = match &self.operands {
			Operands::None => String::new(),
			Operands::Byte(value) => value.to_string(),
			Operands::Short(value) => value.to_string(),
			Operands::ArrayType(code) => array_type_name(*code).to_owned(),
			&Operands::Constant(index) |
			&Operands::InvokeDynamic { index } => format!("#{index} {}", pool.describe(index)?),
			&Operands::InvokeInterface { index, count } => format!("#{index} {} count {count}", pool.describe(index)?),
			&Operands::MultiANewArray { index, dimensions } => format!("#{index} {} dimensions {dimensions}", pool.describe(index)?),
			&Operands::Local { index, .. } => index.to_string(),
			&Operands::Increment { index, constant, .. } => format!("{index} by {constant}"),
			Operands::Branch(_) | Operands::TableSwitch { .. } | Operands::LookupSwitch { .. } => {
				let targets: Vec<String> = self.branch_targets().iter().map(i64::to_string).collect();
				format!("-> {}", targets.join(", "))
			},
		};
		let prefix = match self.operands {
			Operands::Local { wide: is_wide, .. } | Operands::Increment { wide: is_wide, .. } => wide(is_wide),
			_ => "",
		};
		if operands.is_empty() {
			Ok(format!("{}: {prefix}{mnemonic}", self.offset))
		} else {
			Ok(format!("{}: {prefix}{mnemonic} {operands}", self.offset))
		}
	}

	/// Reads one instruction. The offset of the reader within the code is the offset of the instruction.
	fn read(reader: &mut ByteReader, pool: &ConstantPool) -> Result<Instruction> {
		let offset = reader.position();
		let op = reader.read_u8()?;
		let Some(layout) = shape(op) else {
			bail!(ClassFileError::InvalidOpcode { opcode: op, offset: offset as u32 });
		};

		let constant = |reader: &mut ByteReader, kinds: &[PoolKind]| -> Result<u16> {
			let index = reader.read_u16()?;
			pool.resolve_any(index, kinds)?;
			Ok(index)
		};
		let zero = |reader: &mut ByteReader, what: &str| -> Result<()> {
			let byte = reader.read_u8()?;
			if byte != 0 {
				bail!(ClassFileError::malformed(format!("{what} must be zero, got {byte}")));
			}
			Ok(())
		};

		let (op, operands) = match layout {
			Shape::None => (op, Operands::None),
			Shape::Byte => (op, Operands::Byte(reader.read_i8()?)),
			Shape::Short => (op, Operands::Short(reader.read_i16()?)),
			Shape::ArrayType => {
				let code = reader.read_u8()?;
				if !(atype::T_BOOLEAN..=atype::T_LONG).contains(&code) {
					bail!(ClassFileError::malformed(format!("invalid array type {code} for newarray")));
				}
				(op, Operands::ArrayType(code))
			},
			Shape::NarrowConstant(kinds) => {
				let index = reader.read_u8()? as u16;
				pool.resolve_any(index, kinds)?;
				(op, Operands::Constant(index))
			},
			Shape::Constant(kinds) => (op, Operands::Constant(constant(reader, kinds)?)),
			Shape::Local => (op, Operands::Local { index: reader.read_u8()? as u16, wide: false }),
			Shape::Increment => {
				let index = reader.read_u8()? as u16;
				let constant = reader.read_i8()? as i16;
				(op, Operands::Increment { index, constant, wide: false })
			},
			Shape::Branch => (op, Operands::Branch(reader.read_i16()? as i32)),
			Shape::BranchWide => (op, Operands::Branch(reader.read_i32()?)),
			Shape::TableSwitch => {
				for _ in 0..padding(offset) {
					zero(reader, "tableswitch padding")?;
				}
				let default = reader.read_i32()?;
				let low = reader.read_i32()?;
				let high = reader.read_i32()?;
				if low > high {
					bail!(ClassFileError::malformed(format!("tableswitch with low {low} greater than high {high}")));
				}
				let count = (high as i64 - low as i64 + 1) as usize;
				let offsets = reader.read_vec(|_| Ok(count), |r| r.read_i32())?;
				(op, Operands::TableSwitch { default, low, high, offsets })
			},
			Shape::LookupSwitch => {
				for _ in 0..padding(offset) {
					zero(reader, "lookupswitch padding")?;
				}
				let default = reader.read_i32()?;
				let npairs = reader.read_i32()?;
				let npairs = usize::try_from(npairs)
					.map_err(|_| ClassFileError::malformed(format!("lookupswitch with negative npairs {npairs}")))?;
				let pairs = reader.read_vec(|_| Ok(npairs), |r| Ok((r.read_i32()?, r.read_i32()?)))?;
				(op, Operands::LookupSwitch { default, pairs })
			},
			Shape::InvokeInterface => {
				let index = constant(reader, &[PoolKind::InterfaceMethodref])?;
				let count = reader.read_u8()?;
				if count == 0 {
					bail!(ClassFileError::malformed("invokeinterface count must not be zero"));
				}
				zero(reader, "fourth operand byte of invokeinterface")?;
				(op, Operands::InvokeInterface { index, count })
			},
			Shape::InvokeDynamic => {
				let index = constant(reader, &[PoolKind::InvokeDynamic])?;
				zero(reader, "third operand byte of invokedynamic")?;
				zero(reader, "fourth operand byte of invokedynamic")?;
				(op, Operands::InvokeDynamic { index })
			},
			Shape::MultiANewArray => {
				let index = constant(reader, &[PoolKind::Class])?;
				let dimensions = reader.read_u8()?;
				if dimensions == 0 {
					bail!(ClassFileError::malformed("multianewarray dimensions must not be zero"));
				}
				(op, Operands::MultiANewArray { index, dimensions })
			},
			Shape::Wide => {
				let modified = reader.read_u8()?;
				match shape(modified) {
					Some(Shape::Local) => (modified, Operands::Local { index: reader.read_u16()?, wide: true }),
					Some(Shape::Increment) => {
						let index = reader.read_u16()?;
						let constant = reader.read_i16()?;
						(modified, Operands::Increment { index, constant, wide: true })
					},
					_ => bail!(ClassFileError::InvalidOpcode { opcode: modified, offset: offset as u32 + 1 }),
				}
			},
		};

		Ok(Instruction { offset: offset as u32, opcode: op, operands })
	}

	/// Appends the instruction to `code`. The switch padding depends on the length of `code` so far.
	fn write(&self, code: &mut Vec<u8>) -> Result<()> {
		let Some(layout) = shape(self.opcode) else {
			bail!(ClassFileError::InvalidOpcode { opcode: self.opcode, offset: self.offset });
		};
		let position = code.len();

		match (layout, &self.operands) {
			(Shape::None, Operands::None) => code.write_u8(self.opcode)?,
			(Shape::Byte, &Operands::Byte(value)) => {
				code.write_u8(self.opcode)?;
				code.write_i8(value)?;
			},
			(Shape::Short, &Operands::Short(value)) => {
				code.write_u8(self.opcode)?;
				code.write_i16(value)?;
			},
			(Shape::ArrayType, &Operands::ArrayType(array_type)) => {
				code.write_u8(self.opcode)?;
				code.write_u8(array_type)?;
			},
			(Shape::NarrowConstant(_), &Operands::Constant(index)) => {
				code.write_u8(self.opcode)?;
				code.write_usize_as_u8(index as usize)
					.context("ldc can only refer to the first 255 constant pool entries, use ldc_w instead")?;
			},
			(Shape::Constant(_), &Operands::Constant(index)) => {
				code.write_u8(self.opcode)?;
				code.write_u16(index)?;
			},
			(Shape::Local, &Operands::Local { index, wide }) => {
				if wide {
					code.write_u8(opcode::WIDE)?;
					code.write_u8(self.opcode)?;
					code.write_u16(index)?;
				} else {
					code.write_u8(self.opcode)?;
					code.write_usize_as_u8(index as usize).context("local variable index needs a wide prefix")?;
				}
			},
			(Shape::Increment, &Operands::Increment { index, constant, wide }) => {
				if wide {
					code.write_u8(opcode::WIDE)?;
					code.write_u8(self.opcode)?;
					code.write_u16(index)?;
					code.write_i16(constant)?;
				} else {
					code.write_u8(self.opcode)?;
					code.write_usize_as_u8(index as usize).context("iinc index needs a wide prefix")?;
					let constant = i8::try_from(constant)
						.with_context(|| anyhow!("iinc constant {constant} needs a wide prefix"))?;
					code.write_i8(constant)?;
				}
			},
			(Shape::Branch, &Operands::Branch(relative)) => {
				code.write_u8(self.opcode)?;
				let relative = i16::try_from(relative)
					.with_context(|| anyhow!("branch offset {relative} does not fit into 16 bits"))?;
				code.write_i16(relative)?;
			},
			(Shape::BranchWide, &Operands::Branch(relative)) => {
				code.write_u8(self.opcode)?;
				code.write_i32(relative)?;
			},
			(Shape::TableSwitch, Operands::TableSwitch { default, low, high, offsets }) => {
				if *high as i64 - *low as i64 + 1 != offsets.len() as i64 {
					bail!(ClassFileError::malformed(format!(
						"tableswitch from {low} to {high} needs {} offsets, got {}", *high as i64 - *low as i64 + 1, offsets.len()
					)));
				}
				code.write_u8(self.opcode)?;
				code.write_u8_slice(&[0; 3][..padding(position)])?;
				code.write_i32(*default)?;
				code.write_i32(*low)?;
				code.write_i32(*high)?;
				for &offset in offsets {
					code.write_i32(offset)?;
				}
			},
			(Shape::LookupSwitch, Operands::LookupSwitch { default, pairs }) => {
				code.write_u8(self.opcode)?;
				code.write_u8_slice(&[0; 3][..padding(position)])?;
				code.write_i32(*default)?;
				code.write_i32(i32::try_from(pairs.len()).context("too many lookupswitch pairs")?)?;
				for &(key, offset) in pairs {
					code.write_i32(key)?;
					code.write_i32(offset)?;
				}
			},
			(Shape::InvokeInterface, &Operands::InvokeInterface { index, count }) => {
				code.write_u8(self.opcode)?;
				code.write_u16(index)?;
				code.write_u8(count)?;
				code.write_u8(0)?;
			},
			(Shape::InvokeDynamic, &Operands::InvokeDynamic { index }) => {
				code.write_u8(self.opcode)?;
				code.write_u16(index)?;
				code.write_u16(0)?;
			},
			(Shape::MultiANewArray, &Operands::MultiANewArray { index, dimensions }) => {
				code.write_u8(self.opcode)?;
				code.write_u16(index)?;
				code.write_u8(dimensions)?;
			},
			(layout, operands) => bail!(ClassFileError::malformed(format!(
				"operands {operands:?} don't fit opcode {} with operand layout {layout:?}", self.mnemonic()
			))),
		}
		Ok(())
	}
}

fn array_type_name(code: u8) -> &'static str {
	match code {
		4 => "boolean",
		5 => "char",
		6 => "float",
		7 => "double",
		8 => "byte",
		9 => "short",
		10 => "int",
		11 => "long",
		_ => "<invalid>",
	}
}

/// Decodes the whole `code` array of a `Code` attribute.
pub(crate) fn decode(reader: &mut ByteReader, pool: &ConstantPool) -> Result<Vec<Instruction>> {
	let mut instructions = Vec::new();
	while !reader.is_empty() {
		let offset = reader.position();
		let instruction = Instruction::read(reader, pool)
			.map_err(|e| match ClassFileError::of(&e) {
				// running out of code bytes means an instruction crosses the end of the code array
				Some(ClassFileError::Truncated { .. }) => e.context(ClassFileError::malformed(format!(
					"instruction at code offset {offset} extends past the end of the code array"
				))),
				_ => e,
			})
			.with_context(|| anyhow!("while decoding the instruction at code offset {offset}"))?;
		instructions.push(instruction);
	}
	Ok(instructions)
}

/// Encodes instructions into a `code` array.
///
/// Instructions are laid out one after another. If every instruction lands on the offset it records, the operands are
/// written as they are. Otherwise branch and switch targets are resolved against the recorded offsets and turned back
/// into offsets relative to the new positions.
pub(crate) fn encode(instructions: &[Instruction]) -> Result<Vec<u8>> {
	let mut code = Vec::new();
	let mut positions = Vec::with_capacity(instructions.len());
	for instruction in instructions {
		let position = code.len();
		positions.push(position);
		instruction.write(&mut code)
			.with_context(|| anyhow!("while encoding the instruction at code offset {position}"))?;
	}

	let moved = instructions.iter().zip(&positions).any(|(instruction, &position)| instruction.offset as usize != position);
	if !moved {
		return Ok(code);
	}

	debug!("code layout changed, recomputing branch offsets of {} instructions", instructions.len());
	let relocation = Relocation::new(instructions, &positions);
	let mut code = Vec::with_capacity(code.len());
	for (instruction, &position) in instructions.iter().zip(&positions) {
		let relocated = relocation.relocate(instruction, position)
			.with_context(|| anyhow!("while encoding the instruction at code offset {position}"))?;
		relocated.write(&mut code)
			.with_context(|| anyhow!("while encoding the instruction at code offset {position}"))?;
	}
	Ok(code)
}

/// Maps the recorded offset of each instruction to the position it's written at.
struct Relocation {
	/// `None` if more than one instruction records that offset.
	positions: HashMap<i64, Option<usize>>,
}

impl Relocation {
	fn new(instructions: &[Instruction], positions: &[usize]) -> Relocation {
		let mut map = HashMap::with_capacity(instructions.len());
		for (instruction, &position) in instructions.iter().zip(positions) {
			map.entry(instruction.offset as i64)
				.and_modify(|slot| *slot = None)
				.or_insert(Some(position));
		}
		Relocation { positions: map }
	}

	fn relative(&self, instruction: &Instruction, relative: i32, position: usize) -> Result<i32> {
		let target = instruction.offset as i64 + relative as i64;
		let new_target = match self.positions.get(&target) {
			Some(&Some(new_target)) => new_target,
			Some(None) => bail!(ClassFileError::malformed(format!(
				"branch target {target} of the {} recorded at offset {} is recorded by more than one instruction",
				instruction.mnemonic(), instruction.offset
			))),
			None => bail!(ClassFileError::malformed(format!(
				"branch target {target} of the {} recorded at offset {} is not the recorded offset of any instruction",
				instruction.mnemonic(), instruction.offset
			))),
		};
		let relative = new_target as i64 - position as i64;
		i32::try_from(relative).with_context(|| anyhow!("branch offset {relative} does not fit into 32 bits"))
	}

	/// The instruction as it's written at `position`, branching to the same instructions as before.
	fn relocate(&self, instruction: &Instruction, position: usize) -> Result<Instruction> {
		let operands = match &instruction.operands {
			&Operands::Branch(relative) => Operands::Branch(self.relative(instruction, relative, position)?),
			Operands::TableSwitch { default, low, high, offsets } => Operands::TableSwitch {
				default: self.relative(instruction, *default, position)?,
				low: *low,
				high: *high,
				offsets: offsets.iter()
					.map(|&relative| self.relative(instruction, relative, position))
					.collect::<Result<_>>()?,
			},
			Operands::LookupSwitch { default, pairs } => Operands::LookupSwitch {
				default: self.relative(instruction, *default, position)?,
				pairs: pairs.iter()
					.map(|&(key, relative)| -> Result<(i32, i32)> { Ok((key, self.relative(instruction, relative, position)?)) })
					.collect::<Result<_>>()?,
			},
			operands => operands.clone(),
		};
		let offset = u32::try_from(position).context("code offset does not fit into 32 bits")?;
		Ok(Instruction { offset, opcode: instruction.opcode, operands })
	}
}
