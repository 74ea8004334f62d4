//! Rows of the table-like attributes.

use anyhow::{anyhow, Context, Result};
use crate::{ByteReader, ClassRead, ClassWrite};
use crate::attribute::{AttributeContext, AttributeInfo, ReadContext};
use crate::pool::{ConstantPool, PoolKind, BOOTSTRAP_ARGUMENT};

/// A row of the `LineNumberTable` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
	pub start_pc: u16,
	pub line_number: u16,
}

impl LineNumber {
	pub(crate) fn read(reader: &mut ByteReader, ctx: &ReadContext) -> Result<LineNumber> {
		let start_pc = reader.read_u16()?;
		let line_number = reader.read_u16()?;
		if let Some(code) = ctx.code {
			code.check_offset(start_pc as u32, "line number start_pc")?;
		}
		Ok(LineNumber { start_pc, line_number })
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.start_pc)?;
		writer.write_u16(self.line_number)
	}
}

/// A row of the `LocalVariableTable` or the `LocalVariableTypeTable` attribute.
///
/// The two have the same layout: in the latter, `descriptor_index` refers to a field signature instead of a field
/// descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
	pub start_pc: u16,
	pub length: u16,
	pub name_index: u16,
	pub descriptor_index: u16,
	pub index: u16,
}

impl LocalVariable {
	pub(crate) fn read(reader: &mut ByteReader, ctx: &ReadContext) -> Result<LocalVariable> {
		let start_pc = reader.read_u16()?;
		let length = reader.read_u16()?;
		let name_index = reader.read_u16()?;
		let descriptor_index = reader.read_u16()?;
		let index = reader.read_u16()?;

		ctx.pool.resolve(name_index, PoolKind::Utf8)?;
		ctx.pool.resolve(descriptor_index, PoolKind::Utf8)?;
		if let Some(code) = ctx.code {
			code.check_range(start_pc, length, "local variable")?;
		}
		Ok(LocalVariable { start_pc, length, name_index, descriptor_index, index })
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.start_pc)?;
		writer.write_u16(self.length)?;
		writer.write_u16(self.name_index)?;
		writer.write_u16(self.descriptor_index)?;
		writer.write_u16(self.index)
	}
}

/// A row of the `InnerClasses` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClass {
	pub inner_class_info_index: u16,
	/// Zero for top level, local and anonymous classes.
	pub outer_class_info_index: u16,
	/// Zero for anonymous classes.
	pub inner_name_index: u16,
	pub inner_class_access_flags: u16,
}

impl InnerClass {
	pub(crate) fn read(reader: &mut ByteReader, pool: &ConstantPool) -> Result<InnerClass> {
		let inner_class_info_index = reader.read_u16()?;
		let outer_class_info_index = reader.read_u16()?;
		let inner_name_index = reader.read_u16()?;
		let inner_class_access_flags = reader.read_u16()?;

		pool.resolve(inner_class_info_index, PoolKind::Class)?;
		pool.resolve_optional(outer_class_info_index, PoolKind::Class)?;
		pool.resolve_optional(inner_name_index, PoolKind::Utf8)?;
		Ok(InnerClass { inner_class_info_index, outer_class_info_index, inner_name_index, inner_class_access_flags })
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.inner_class_info_index)?;
		writer.write_u16(self.outer_class_info_index)?;
		writer.write_u16(self.inner_name_index)?;
		writer.write_u16(self.inner_class_access_flags)
	}
}

/// An entry of the `BootstrapMethods` attribute, referred to by `Dynamic` and `InvokeDynamic` constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
	/// Refers to a `MethodHandle` constant.
	pub bootstrap_method_ref: u16,
	pub bootstrap_arguments: Vec<u16>,
}

impl BootstrapMethod {
	pub(crate) fn read(reader: &mut ByteReader, pool: &ConstantPool) -> Result<BootstrapMethod> {
		let bootstrap_method_ref = reader.read_u16()?;
		pool.resolve(bootstrap_method_ref, PoolKind::MethodHandle)?;
		let bootstrap_arguments = reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| {
				let argument = r.read_u16()?;
				pool.resolve_any(argument, BOOTSTRAP_ARGUMENT)?;
				Ok(argument)
			}
		)?;
		Ok(BootstrapMethod { bootstrap_method_ref, bootstrap_arguments })
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.bootstrap_method_ref)?;
		writer.write_slice(&self.bootstrap_arguments, |w, size| w.write_usize_as_u16(size), |w, &argument| w.write_u16(argument))
	}
}

/// An entry of the `MethodParameters` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodParameter {
	/// Zero for a parameter without a name.
	pub name_index: u16,
	pub access_flags: u16,
}

impl MethodParameter {
	pub(crate) fn read(reader: &mut ByteReader, pool: &ConstantPool) -> Result<MethodParameter> {
		let name_index = reader.read_u16()?;
		let access_flags = reader.read_u16()?;
		pool.resolve_optional(name_index, PoolKind::Utf8)?;
		Ok(MethodParameter { name_index, access_flags })
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.name_index)?;
		writer.write_u16(self.access_flags)
	}
}

/// A component of the `Record` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordComponent {
	pub name_index: u16,
	pub descriptor_index: u16,
	pub attributes: Vec<AttributeInfo>,
}

impl RecordComponent {
	pub(crate) fn read(reader: &mut ByteReader, ctx: &ReadContext) -> Result<RecordComponent> {
		let name_index = reader.read_u16()?;
		let descriptor_index = reader.read_u16()?;
		let name = ctx.pool.get_utf8(name_index)?;
		ctx.pool.resolve(descriptor_index, PoolKind::Utf8)?;

		let ctx = ctx.at(AttributeContext::RecordComponent);
		let attributes = AttributeInfo::read_list(reader, &ctx)
			.with_context(|| anyhow!("in record component {:?}", name.as_str_lossy()))?;
		Ok(RecordComponent { name_index, descriptor_index, attributes })
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite, pool: &ConstantPool) -> Result<()> {
		writer.write_u16(self.name_index)?;
		writer.write_u16(self.descriptor_index)?;
		AttributeInfo::write_list(writer, &self.attributes, pool)
	}
}
