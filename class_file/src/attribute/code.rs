use anyhow::{anyhow, bail, Context, Result};
use crate::{ByteReader, ClassRead, ClassWrite};
use crate::attribute::{Attribute, AttributeInfo, ReadContext};
use crate::error::ClassFileError;
use crate::instruction::{self, Instruction};
use crate::pool::{ConstantPool, PoolKind};

/// The body of a method: the `Code` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
	pub max_stack: u16,
	pub max_locals: u16,
	pub instructions: Vec<Instruction>,
	pub exception_table: Vec<ExceptionTableEntry>,
	/// Attributes of the code, like `LineNumberTable` or `StackMapTable`.
	pub attributes: Vec<AttributeInfo>,
}

/// A row of the exception table, all offsets are code offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
	pub start_pc: u16,
	/// Exclusive.
	pub end_pc: u16,
	pub handler_pc: u16,
	/// Zero for a handler that catches everything, like the one of a `finally` block.
	pub catch_type: u16,
}

/// What the attributes nested in a `Code` attribute may check their code offsets against.
#[derive(Debug, Clone)]
pub(crate) struct CodeContext {
	code_length: u32,
	/// `starts[offset]` tells if an instruction starts at `offset`.
	starts: Vec<bool>,
	pub(crate) exception_table_length: usize,
	verify: bool,
}

impl CodeContext {
	fn new(code_length: u32, instructions: &[Instruction], verify: bool) -> CodeContext {
		let mut starts = vec![false; code_length as usize];
		for instruction in instructions {
			if let Some(start) = starts.get_mut(instruction.offset as usize) {
				*start = true;
			}
		}
		CodeContext { code_length, starts, exception_table_length: 0, verify }
	}

	fn is_instruction(&self, offset: i64) -> bool {
		usize::try_from(offset).ok()
			.and_then(|offset| self.starts.get(offset))
			.copied()
			.unwrap_or(false)
	}

	/// Checks that an instruction starts at `offset`.
	pub(crate) fn check_offset(&self, offset: u32, what: &str) -> Result<()> {
		if self.verify && !self.is_instruction(offset as i64) {
			bail!(ClassFileError::malformed(format!(
				"{what} {offset} is not the start of an instruction, code_length is {}", self.code_length
			)));
		}
		Ok(())
	}

	/// Checks an exclusive end offset: either an instruction starts there, or it is the end of the code.
	fn check_end(&self, end: u32, what: &str) -> Result<()> {
		if self.verify && end != self.code_length && !self.is_instruction(end as i64) {
			bail!(ClassFileError::malformed(format!(
				"{what} end {end} is neither the start of an instruction nor code_length {}", self.code_length
			)));
		}
		Ok(())
	}

	/// Checks a range given by its start and length.
	pub(crate) fn check_range(&self, start_pc: u16, length: u16, what: &str) -> Result<()> {
		self.check_offset(start_pc as u32, what)?;
		self.check_end(start_pc as u32 + length as u32, what)
	}

	fn check_branch(&self, instruction: &Instruction) -> Result<()> {
		if !self.verify {
			return Ok(());
		}
		for target in instruction.branch_targets() {
			if !self.is_instruction(target) {
				bail!(ClassFileError::malformed(format!(
					"{} at code offset {} branches to {target}, which is not the start of an instruction",
					instruction.mnemonic(), instruction.offset
				)));
			}
		}
		Ok(())
	}
}

impl ExceptionTableEntry {
	fn read(reader: &mut ByteReader, pool: &ConstantPool, code: &CodeContext) -> Result<ExceptionTableEntry> {
		let start_pc = reader.read_u16()?;
		let end_pc = reader.read_u16()?;
		let handler_pc = reader.read_u16()?;
		let catch_type = reader.read_u16()?;

		pool.resolve_optional(catch_type, PoolKind::Class)?;
		if code.verify && start_pc >= end_pc {
			bail!(ClassFileError::malformed(format!("exception handler range from {start_pc} to {end_pc} is empty")));
		}
		code.check_offset(start_pc as u32, "exception handler start_pc")?;
		code.check_end(end_pc as u32, "exception handler range")?;
		code.check_offset(handler_pc as u32, "exception handler handler_pc")?;
		Ok(ExceptionTableEntry { start_pc, end_pc, handler_pc, catch_type })
	}

	fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.start_pc)?;
		writer.write_u16(self.end_pc)?;
		writer.write_u16(self.handler_pc)?;
		writer.write_u16(self.catch_type)
	}
}

impl CodeAttribute {
	pub(crate) fn read(reader: &mut ByteReader, ctx: &ReadContext) -> Result<Attribute> {
		let max_stack = reader.read_u16()?;
		let max_locals = reader.read_u16()?;

		let code_length = reader.read_u32()?;
		if code_length == 0 || code_length > u16::MAX as u32 {
			bail!(ClassFileError::malformed(format!("code_length must be between 1 and 65535, got {code_length}")));
		}
		let mut code_reader = reader.sub_reader(code_length as usize)?;
		let instructions = instruction::decode(&mut code_reader, ctx.pool)?;

		let mut code = CodeContext::new(code_length, &instructions, ctx.options.verify_code_offsets);
		for instruction in &instructions {
			code.check_branch(instruction)?;
		}

		let mut index = 0;
		let exception_table = reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| {
				let entry = ExceptionTableEntry::read(r, ctx.pool, &code)
					.with_context(|| anyhow!("in exception table entry {index}"));
				index += 1;
				entry
			}
		)?;
		code.exception_table_length = exception_table.len();

		let nested = ctx.within_code(&code);
		let attributes = AttributeInfo::read_list(reader, &nested)?;

		Ok(Attribute::Code(CodeAttribute { max_stack, max_locals, instructions, exception_table, attributes }))
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite, pool: &ConstantPool) -> Result<()> {
		let code = instruction::encode(&self.instructions)?;
		if code.is_empty() || code.len() > u16::MAX as usize {
			bail!(ClassFileError::malformed(format!("code_length must be between 1 and 65535, got {}", code.len())));
		}

		writer.write_u16(self.max_stack)?;
		writer.write_u16(self.max_locals)?;
		writer.write_usize_as_u32(code.len())?;
		writer.write_u8_slice(&code)?;
		writer.write_slice(&self.exception_table, |w, size| w.write_usize_as_u16(size), |w, entry| entry.write(w))?;
		AttributeInfo::write_list(writer, &self.attributes, pool)
	}

	/// The number of bytes the instructions take up when encoded.
	pub fn code_length(&self) -> Result<usize> {
		Ok(instruction::encode(&self.instructions)?.len())
	}

	/// The instruction starting at the given code offset.
	pub fn instruction_at(&self, offset: u32) -> Option<&Instruction> {
		self.instructions
			.binary_search_by_key(&offset, |instruction| instruction.offset)
			.ok()
			.map(|index| &self.instructions[index])
	}

	/// One line per instruction, as given by [`Instruction::describe`].
	pub fn disassemble(&self, pool: &ConstantPool) -> Result<Vec<String>> {
		self.instructions.iter()
			.map(|instruction| instruction.describe(pool))
			.collect()
	}
}
