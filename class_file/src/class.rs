use anyhow::{anyhow, bail, Context, Result};
use java_string::JavaStr;
use log::trace;
use crate::{ByteReader, ClassRead, ClassWrite, ReadOptions};
use crate::attribute::{self, Attribute, AttributeContext, AttributeInfo, ReadContext};
use crate::class_constants::MAGIC;
use crate::error::ClassFileError;
use crate::pool::{ConstantPool, PoolEntry, PoolKind};

/// A decoded class file.
///
/// All references into the constant pool are kept as indices, so that writing the class produces the same bytes it was
/// read from. Use the accessors, or the lookups on [`ConstantPool`], to resolve them.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
	pub minor_version: u16,
	pub major_version: u16,
	pub constant_pool: ConstantPool,
	pub access_flags: u16,
	/// Refers to a `Class` constant.
	pub this_class: u16,
	/// Refers to a `Class` constant, or is zero for `java/lang/Object` and `module-info`.
	pub super_class: u16,
	/// Each refers to a `Class` constant.
	pub interfaces: Vec<u16>,
	pub fields: Vec<FieldInfo>,
	pub methods: Vec<MethodInfo>,
	pub attributes: Vec<AttributeInfo>,
}

/// A field or a method.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
	pub access_flags: u16,
	pub name_index: u16,
	pub descriptor_index: u16,
	pub attributes: Vec<AttributeInfo>,
}

pub type FieldInfo = MemberInfo;
pub type MethodInfo = MemberInfo;

impl MemberInfo {
	fn read(reader: &mut ByteReader, ctx: &ReadContext) -> Result<MemberInfo> {
		let access_flags = reader.read_u16()?;
		let name_index = reader.read_u16()?;
		let descriptor_index = reader.read_u16()?;
		let name = ctx.pool.get_utf8(name_index)?;
		let descriptor = ctx.pool.get_utf8(descriptor_index)?;

		trace!("reading {} {}:{}", ctx.location, name.as_str_lossy(), descriptor.as_str_lossy());
		let attributes = AttributeInfo::read_list(reader, ctx)
			.with_context(|| anyhow!("in {} {}:{}", ctx.location, name.as_str_lossy(), descriptor.as_str_lossy()))?;
		if ctx.location == AttributeContext::Method {
			attribute::check_method_throws(&attributes)
				.with_context(|| anyhow!("in method {}:{}", name.as_str_lossy(), descriptor.as_str_lossy()))?;
		}

		Ok(MemberInfo { access_flags, name_index, descriptor_index, attributes })
	}

	fn write(&self, writer: &mut impl ClassWrite, pool: &ConstantPool) -> Result<()> {
		writer.write_u16(self.access_flags)?;
		writer.write_u16(self.name_index)?;
		writer.write_u16(self.descriptor_index)?;
		AttributeInfo::write_list(writer, &self.attributes, pool)
	}

	pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a JavaStr> {
		pool.get_utf8(self.name_index)
	}

	pub fn descriptor<'a>(&self, pool: &'a ConstantPool) -> Result<&'a JavaStr> {
		pool.get_utf8(self.descriptor_index)
	}

	/// The first attribute with the given name.
	pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
		find_attribute(&self.attributes, name)
	}
}

fn find_attribute<'a>(attributes: &'a [AttributeInfo], name: &str) -> Option<&'a Attribute> {
	attributes.iter()
		.map(|info| &info.attribute)
		.find(|attribute| attribute.name() == Some(name))
}

impl ClassFile {
	/// Reads a class file, see [`crate::read_class_with`].
	pub fn read(bytes: &[u8], options: &ReadOptions) -> Result<ClassFile> {
		let mut reader = ByteReader::new(bytes);

		let magic = reader.read_u32()?;
		if magic != MAGIC {
			bail!(ClassFileError::InvalidMagic(magic));
		}
		let minor_version = reader.read_u16()?;
		let major_version = reader.read_u16()?;

		let constant_pool = ConstantPool::read(&mut reader)
			.context("while reading the constant pool")?;
		trace!("read constant pool with {} slots, class file version {major_version}.{minor_version}", constant_pool.count());

		let access_flags = reader.read_u16()?;
		let this_class = reader.read_u16()?;
		let name = constant_pool.get_class_name(this_class)
			.context("while reading this_class")?;
		let super_class = reader.read_u16()?;
		constant_pool.resolve_optional(super_class, PoolKind::Class)
			.context("while reading super_class")?;
		let interfaces = attribute::read_indices(&mut reader, &constant_pool, PoolKind::Class)
			.context("while reading interfaces")?;

		let class = ClassFile::read_body(&mut reader, &constant_pool, options, interfaces.len())
			.with_context(|| anyhow!("in class {}", name.as_str_lossy()))?;
		let (fields, methods, attributes) = class;

		if !reader.is_empty() {
			bail!(ClassFileError::malformed(format!(
				"{} bytes of trailing data after the class file at offset {}", reader.remaining(), reader.offset()
			)));
		}

		let class = ClassFile {
			minor_version,
			major_version,
			constant_pool,
			access_flags,
			this_class,
			super_class,
			interfaces,
			fields,
			methods,
			attributes,
		};
		class.check_bootstrap_method_indices()?;
		Ok(class)
	}

	fn read_body(
		reader: &mut ByteReader,
		pool: &ConstantPool,
		options: &ReadOptions,
		interfaces_count: usize,
	) -> Result<(Vec<FieldInfo>, Vec<MethodInfo>, Vec<AttributeInfo>)> {
		let ctx = ReadContext::new(pool, options, interfaces_count);

		let field_ctx = ctx.at(AttributeContext::Field);
		let fields = reader.read_vec(|r| r.read_u16_as_usize(), |r| MemberInfo::read(r, &field_ctx))?;
		let method_ctx = ctx.at(AttributeContext::Method);
		let methods = reader.read_vec(|r| r.read_u16_as_usize(), |r| MemberInfo::read(r, &method_ctx))?;
		let attributes = AttributeInfo::read_list(reader, &ctx)?;

		Ok((fields, methods, attributes))
	}

	/// Checks that every `Dynamic` and `InvokeDynamic` constant refers to an existing bootstrap method.
	fn check_bootstrap_method_indices(&self) -> Result<()> {
		let count = match self.find_attribute(crate::class_constants::attribute::BOOTSTRAP_METHODS) {
			Some(Attribute::BootstrapMethods(methods)) => methods.len(),
			_ => 0,
		};
		for (index, entry) in self.constant_pool.entries() {
			if let PoolEntry::Dynamic { bootstrap_method_attr_index, .. } | PoolEntry::InvokeDynamic { bootstrap_method_attr_index, .. } = entry {
				if *bootstrap_method_attr_index as usize >= count {
					let error = ClassFileError::BootstrapMethodIndexOutOfBounds { index: *bootstrap_method_attr_index, count };
					return Err(anyhow::Error::new(error).context(format!("in constant pool entry {index}")));
				}
			}
		}
		Ok(())
	}

	/// Writes the class file, recomputing all lengths and counts.
	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		let mut writer = Vec::new();
		self.write(&mut writer)?;
		Ok(writer)
	}

	fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		let pool = &self.constant_pool;

		writer.write_u32(MAGIC)?;
		writer.write_u16(self.minor_version)?;
		writer.write_u16(self.major_version)?;
		pool.write(writer)?;
		writer.write_u16(self.access_flags)?;
		writer.write_u16(self.this_class)?;
		writer.write_u16(self.super_class)?;
		attribute::write_indices(writer, &self.interfaces)?;

		writer.write_slice(&self.fields, |w, size| w.write_usize_as_u16(size), |w, field| {
			field.write(w, pool)
				.with_context(|| anyhow!("while writing field {}", field.name(pool).map(|name| name.as_str_lossy().into_owned()).unwrap_or_default()))
		})?;
		writer.write_slice(&self.methods, |w, size| w.write_usize_as_u16(size), |w, method| {
			method.write(w, pool)
				.with_context(|| anyhow!("while writing method {}", method.name(pool).map(|name| name.as_str_lossy().into_owned()).unwrap_or_default()))
		})?;
		AttributeInfo::write_list(writer, &self.attributes, pool)
	}

	/// Checks every constant pool reference of the class, by writing it and reading the result back.
	///
	/// Useful after editing the model, since the fields are public and nothing stops an edit from leaving a dangling
	/// index behind.
	pub fn validate(&self) -> Result<()> {
		let bytes = self.to_bytes()?;
		ClassFile::read(&bytes, &ReadOptions::default())?;
		Ok(())
	}

	pub fn class_name(&self) -> Result<&JavaStr> {
		self.constant_pool.get_class_name(self.this_class)
	}

	/// `None` only for `java/lang/Object` and `module-info`.
	pub fn super_class_name(&self) -> Result<Option<&JavaStr>> {
		match self.super_class {
			0 => Ok(None),
			index => Ok(Some(self.constant_pool.get_class_name(index)?)),
		}
	}

	pub fn interface_names(&self) -> Result<Vec<&JavaStr>> {
		self.interfaces.iter()
			.map(|&index| self.constant_pool.get_class_name(index))
			.collect()
	}

	/// The first class level attribute with the given name.
	pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
		find_attribute(&self.attributes, name)
	}

	/// The field with the given name and descriptor.
	pub fn find_field(&self, name: &str, descriptor: &str) -> Option<&FieldInfo> {
		self.find_member(&self.fields, name, descriptor)
	}

	/// The method with the given name and descriptor.
	pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
		self.find_member(&self.methods, name, descriptor)
	}

	fn find_member<'a>(&self, members: &'a [MemberInfo], name: &str, descriptor: &str) -> Option<&'a MemberInfo> {
		members.iter().find(|member| {
			self.constant_pool.is_utf8(member.name_index, name) &&
				self.constant_pool.is_utf8(member.descriptor_index, descriptor)
		})
	}
}
