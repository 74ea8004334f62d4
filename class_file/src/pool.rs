//! The constant pool: the indexed table every other structure of a class file refers into.
//!
//! All lookups go through [`ConstantPool::resolve`] (or one of the helpers built on top of it), which fails
//! with [`ClassFileError::InvalidConstantPoolIndex`] for index zero, an index past the end, the unusable slot
//! after a `Long` or `Double`, or an entry of an unexpected kind.

use std::fmt::{Display, Formatter};
use anyhow::{anyhow, bail, Context, Result};
use java_string::{JavaStr, JavaString};
use crate::{ByteReader, ClassRead, ClassWrite};
use crate::class_constants::pool;
use crate::class_constants::pool::method_handle_reference;
use crate::error::{BadIndex, ClassFileError};

/// The kind of a constant pool entry, as given by its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
	Utf8,
	Integer,
	Float,
	Long,
	Double,
	Class,
	String,
	Fieldref,
	Methodref,
	InterfaceMethodref,
	NameAndType,
	MethodHandle,
	MethodType,
	Dynamic,
	InvokeDynamic,
	Module,
	Package,
}

impl PoolKind {
	pub fn tag(self) -> u8 {
		match self {
			PoolKind::Utf8 => pool::UTF8,
			PoolKind::Integer => pool::INTEGER,
			PoolKind::Float => pool::FLOAT,
			PoolKind::Long => pool::LONG,
			PoolKind::Double => pool::DOUBLE,
			PoolKind::Class => pool::CLASS,
			PoolKind::String => pool::STRING,
			PoolKind::Fieldref => pool::FIELD_REF,
			PoolKind::Methodref => pool::METHOD_REF,
			PoolKind::InterfaceMethodref => pool::INTERFACE_METHOD_REF,
			PoolKind::NameAndType => pool::NAME_AND_TYPE,
			PoolKind::MethodHandle => pool::METHOD_HANDLE,
			PoolKind::MethodType => pool::METHOD_TYPE,
			PoolKind::Dynamic => pool::DYNAMIC,
			PoolKind::InvokeDynamic => pool::INVOKE_DYNAMIC,
			PoolKind::Module => pool::MODULE,
			PoolKind::Package => pool::PACKAGE,
		}
	}

	pub fn from_tag(tag: u8) -> Option<PoolKind> {
		Some(match tag {
			pool::UTF8 => PoolKind::Utf8,
			pool::INTEGER => PoolKind::Integer,
			pool::FLOAT => PoolKind::Float,
			pool::LONG => PoolKind::Long,
			pool::DOUBLE => PoolKind::Double,
			pool::CLASS => PoolKind::Class,
			pool::STRING => PoolKind::String,
			pool::FIELD_REF => PoolKind::Fieldref,
			pool::METHOD_REF => PoolKind::Methodref,
			pool::INTERFACE_METHOD_REF => PoolKind::InterfaceMethodref,
			pool::NAME_AND_TYPE => PoolKind::NameAndType,
			pool::METHOD_HANDLE => PoolKind::MethodHandle,
			pool::METHOD_TYPE => PoolKind::MethodType,
			pool::DYNAMIC => PoolKind::Dynamic,
			pool::INVOKE_DYNAMIC => PoolKind::InvokeDynamic,
			pool::MODULE => PoolKind::Module,
			pool::PACKAGE => PoolKind::Package,
			_ => return None,
		})
	}

	/// The number of pool indices an entry of this kind takes up.
	pub fn slots(self) -> usize {
		match self {
			PoolKind::Long | PoolKind::Double => 2,
			_ => 1,
		}
	}
}

impl Display for PoolKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{self:?}")
	}
}

/// Kinds that `ldc` and `ldc_w` may load.
pub const LOADABLE: &[PoolKind] = &[
	PoolKind::Integer, PoolKind::Float, PoolKind::String, PoolKind::Class,
	PoolKind::MethodHandle, PoolKind::MethodType, PoolKind::Dynamic,
];
/// Kinds that `ldc2_w` may load.
pub const LOADABLE_WIDE: &[PoolKind] = &[PoolKind::Long, PoolKind::Double, PoolKind::Dynamic];
/// Kinds a bootstrap method argument may refer to.
pub const BOOTSTRAP_ARGUMENT: &[PoolKind] = &[
	PoolKind::Integer, PoolKind::Float, PoolKind::Long, PoolKind::Double, PoolKind::String, PoolKind::Class,
	PoolKind::MethodHandle, PoolKind::MethodType, PoolKind::Dynamic,
];
/// Kinds the `ConstantValue` attribute may refer to.
pub const CONSTANT_VALUE: &[PoolKind] = &[
	PoolKind::Integer, PoolKind::Float, PoolKind::Long, PoolKind::Double, PoolKind::String,
];
pub const METHOD_OR_INTERFACE_METHOD: &[PoolKind] = &[PoolKind::Methodref, PoolKind::InterfaceMethodref];

/// A single constant pool entry.
///
/// `Float` and `Double` keep their raw bits, so that every NaN payload survives a round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEntry {
	Utf8(JavaString),
	Integer(i32),
	Float(u32),
	Long(i64),
	Double(u64),
	Class { name_index: u16 },
	String { string_index: u16 },
	Fieldref { class_index: u16, name_and_type_index: u16 },
	Methodref { class_index: u16, name_and_type_index: u16 },
	InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	MethodHandle { reference_kind: u8, reference_index: u16 },
	MethodType { descriptor_index: u16 },
	Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	Module { name_index: u16 },
	Package { name_index: u16 },
}

impl PoolEntry {
	pub fn kind(&self) -> PoolKind {
		match self {
			PoolEntry::Utf8(_) => PoolKind::Utf8,
			PoolEntry::Integer(_) => PoolKind::Integer,
			PoolEntry::Float(_) => PoolKind::Float,
			PoolEntry::Long(_) => PoolKind::Long,
			PoolEntry::Double(_) => PoolKind::Double,
			PoolEntry::Class { .. } => PoolKind::Class,
			PoolEntry::String { .. } => PoolKind::String,
			PoolEntry::Fieldref { .. } => PoolKind::Fieldref,
			PoolEntry::Methodref { .. } => PoolKind::Methodref,
			PoolEntry::InterfaceMethodref { .. } => PoolKind::InterfaceMethodref,
			PoolEntry::NameAndType { .. } => PoolKind::NameAndType,
			PoolEntry::MethodHandle { .. } => PoolKind::MethodHandle,
			PoolEntry::MethodType { .. } => PoolKind::MethodType,
			PoolEntry::Dynamic { .. } => PoolKind::Dynamic,
			PoolEntry::InvokeDynamic { .. } => PoolKind::InvokeDynamic,
			PoolEntry::Module { .. } => PoolKind::Module,
			PoolEntry::Package { .. } => PoolKind::Package,
		}
	}

	/// Convenience constructor for a `Utf8` entry.
	pub fn utf8(string: &str) -> PoolEntry {
		PoolEntry::Utf8(JavaStr::from_str(string).to_owned())
	}

	/// The indices this entry refers to, each with the kinds allowed there.
	///
	/// `bootstrap_method_attr_index` isn't a pool index and is checked against the `BootstrapMethods` attribute instead.
	fn references(&self) -> Result<Vec<(u16, &'static [PoolKind])>> {
		const UTF8: &[PoolKind] = &[PoolKind::Utf8];
		const CLASS: &[PoolKind] = &[PoolKind::Class];
		const NAME_AND_TYPE: &[PoolKind] = &[PoolKind::NameAndType];

		Ok(match *self {
			PoolEntry::Utf8(_) | PoolEntry::Integer(_) | PoolEntry::Float(_) | PoolEntry::Long(_) | PoolEntry::Double(_) => Vec::new(),
			PoolEntry::Class { name_index } => vec![(name_index, UTF8)],
			PoolEntry::String { string_index } => vec![(string_index, UTF8)],
			PoolEntry::Fieldref { class_index, name_and_type_index } |
			PoolEntry::Methodref { class_index, name_and_type_index } |
			PoolEntry::InterfaceMethodref { class_index, name_and_type_index } => {
				vec![(class_index, CLASS), (name_and_type_index, NAME_AND_TYPE)]
			},
			PoolEntry::NameAndType { name_index, descriptor_index } => vec![(name_index, UTF8), (descriptor_index, UTF8)],
			PoolEntry::MethodHandle { reference_kind, reference_index } => {
				let kinds: &'static [PoolKind] = match reference_kind {
					method_handle_reference::GET_FIELD |
					method_handle_reference::GET_STATIC |
					method_handle_reference::PUT_FIELD |
					method_handle_reference::PUT_STATIC => &[PoolKind::Fieldref],
					method_handle_reference::INVOKE_VIRTUAL |
					method_handle_reference::NEW_INVOKE_SPECIAL => &[PoolKind::Methodref],
					method_handle_reference::INVOKE_STATIC |
					method_handle_reference::INVOKE_SPECIAL => METHOD_OR_INTERFACE_METHOD,
					method_handle_reference::INVOKE_INTERFACE => &[PoolKind::InterfaceMethodref],
					kind => bail!("unknown reference_kind {kind} of MethodHandle"),
				};
				vec![(reference_index, kinds)]
			},
			PoolEntry::MethodType { descriptor_index } => vec![(descriptor_index, UTF8)],
			PoolEntry::Dynamic { name_and_type_index, .. } |
			PoolEntry::InvokeDynamic { name_and_type_index, .. } => vec![(name_and_type_index, NAME_AND_TYPE)],
			PoolEntry::Module { name_index } |
			PoolEntry::Package { name_index } => vec![(name_index, UTF8)],
		})
	}

	fn read(reader: &mut ByteReader, index: u16) -> Result<PoolEntry> {
		let tag = reader.read_u8()?;
		let Some(kind) = PoolKind::from_tag(tag) else {
			return Err(ClassFileError::InvalidConstantPoolTag { tag, index }.into());
		};
		Ok(match kind {
			PoolKind::Utf8 => {
				let length = reader.read_u16_as_usize()?;
				let bytes = reader.read_u8_vec(length)?;
				let string = JavaString::from_modified_utf8(bytes)
					.map_err(|e| ClassFileError::MalformedConstant { index, reason: format!("invalid modified utf8: {e}") })?;
				PoolEntry::Utf8(string)
			},
			PoolKind::Integer => PoolEntry::Integer(reader.read_i32()?),
			PoolKind::Float => PoolEntry::Float(reader.read_u32()?),
			PoolKind::Long => PoolEntry::Long(reader.read_i64()?),
			PoolKind::Double => PoolEntry::Double(reader.read_u64()?),
			PoolKind::Class => PoolEntry::Class { name_index: reader.read_u16()? },
			PoolKind::String => PoolEntry::String { string_index: reader.read_u16()? },
			PoolKind::Fieldref => PoolEntry::Fieldref {
				class_index: reader.read_u16()?,
				name_and_type_index: reader.read_u16()?,
			},
			PoolKind::Methodref => PoolEntry::Methodref {
				class_index: reader.read_u16()?,
				name_and_type_index: reader.read_u16()?,
			},
			PoolKind::InterfaceMethodref => PoolEntry::InterfaceMethodref {
				class_index: reader.read_u16()?,
				name_and_type_index: reader.read_u16()?,
			},
			PoolKind::NameAndType => PoolEntry::NameAndType {
				name_index: reader.read_u16()?,
				descriptor_index: reader.read_u16()?,
			},
			PoolKind::MethodHandle => PoolEntry::MethodHandle {
				reference_kind: reader.read_u8()?,
				reference_index: reader.read_u16()?,
			},
			PoolKind::MethodType => PoolEntry::MethodType { descriptor_index: reader.read_u16()? },
			PoolKind::Dynamic => PoolEntry::Dynamic {
				bootstrap_method_attr_index: reader.read_u16()?,
				name_and_type_index: reader.read_u16()?,
			},
			PoolKind::InvokeDynamic => PoolEntry::InvokeDynamic {
				bootstrap_method_attr_index: reader.read_u16()?,
				name_and_type_index: reader.read_u16()?,
			},
			PoolKind::Module => PoolEntry::Module { name_index: reader.read_u16()? },
			PoolKind::Package => PoolEntry::Package { name_index: reader.read_u16()? },
		})
	}

	fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u8(self.kind().tag())?;
		match self {
			PoolEntry::Utf8(string) => {
				let bytes = string.to_modified_utf8();
				writer.write_usize_as_u16(bytes.len())
					.context("modified utf8 form of string is longer than 65535 bytes")?;
				writer.write_u8_slice(&bytes)?;
			},
			&PoolEntry::Integer(value) => writer.write_i32(value)?,
			&PoolEntry::Float(bits) => writer.write_u32(bits)?,
			&PoolEntry::Long(value) => writer.write_i64(value)?,
			&PoolEntry::Double(bits) => writer.write_u64(bits)?,
			&PoolEntry::Class { name_index } => writer.write_u16(name_index)?,
			&PoolEntry::String { string_index } => writer.write_u16(string_index)?,
			&PoolEntry::Fieldref { class_index, name_and_type_index } |
			&PoolEntry::Methodref { class_index, name_and_type_index } |
			&PoolEntry::InterfaceMethodref { class_index, name_and_type_index } => {
				writer.write_u16(class_index)?;
				writer.write_u16(name_and_type_index)?;
			},
			&PoolEntry::NameAndType { name_index, descriptor_index } => {
				writer.write_u16(name_index)?;
				writer.write_u16(descriptor_index)?;
			},
			&PoolEntry::MethodHandle { reference_kind, reference_index } => {
				writer.write_u8(reference_kind)?;
				writer.write_u16(reference_index)?;
			},
			&PoolEntry::MethodType { descriptor_index } => writer.write_u16(descriptor_index)?,
			&PoolEntry::Dynamic { bootstrap_method_attr_index, name_and_type_index } |
			&PoolEntry::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
				writer.write_u16(bootstrap_method_attr_index)?;
				writer.write_u16(name_and_type_index)?;
			},
			&PoolEntry::Module { name_index } |
			&PoolEntry::Package { name_index } => writer.write_u16(name_index)?,
		}
		Ok(())
	}
}

/// The name used in the `REF_*` notation of a method handle reference kind.
fn reference_kind_name(reference_kind: u8) -> &'static str {
	match reference_kind {
		method_handle_reference::GET_FIELD => "REF_getField",
		method_handle_reference::GET_STATIC => "REF_getStatic",
		method_handle_reference::PUT_FIELD => "REF_putField",
		method_handle_reference::PUT_STATIC => "REF_putStatic",
		method_handle_reference::INVOKE_VIRTUAL => "REF_invokeVirtual",
		method_handle_reference::INVOKE_STATIC => "REF_invokeStatic",
		method_handle_reference::INVOKE_SPECIAL => "REF_invokeSpecial",
		method_handle_reference::NEW_INVOKE_SPECIAL => "REF_newInvokeSpecial",
		method_handle_reference::INVOKE_INTERFACE => "REF_invokeInterface",
		_ => "REF_unknown",
	}
}

/// The constant pool of a class file.
///
/// Index `0` is never valid. An entry of kind `Long` or `Double` at index `n` makes index `n + 1` unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
	/// Holds [`None`] for index zero and for the slot following a `Long` or `Double`.
	inner: Vec<Option<PoolEntry>>,
}

impl Default for ConstantPool {
	fn default() -> Self {
		ConstantPool::new()
	}
}

fn bad_index(index: u16, expected: &[PoolKind], problem: BadIndex) -> anyhow::Error {
	ClassFileError::InvalidConstantPoolIndex { index, expected: expected.to_vec(), problem }.into()
}

impl ConstantPool {
	/// Creates an empty constant pool, which has a `constant_pool_count` of `1`.
	pub fn new() -> ConstantPool {
		ConstantPool { inner: vec![None] }
	}

	/// The `constant_pool_count` item of the class file: one more than the largest valid index.
	pub fn count(&self) -> usize {
		self.inner.len()
	}

	/// Returns the entry at `index`, or [`None`] for index zero, unusable slots and indices out of range.
	pub fn get(&self, index: u16) -> Option<&PoolEntry> {
		self.inner.get(index as usize).and_then(Option::as_ref)
	}

	/// Iterates over all entries, with their indices.
	pub fn entries(&self) -> impl Iterator<Item=(u16, &PoolEntry)> {
		self.inner.iter()
			.enumerate()
			.filter_map(|(index, entry)| Some((index as u16, entry.as_ref()?)))
	}

	/// Resolves `index`, requiring the entry to be of kind `kind`.
	pub fn resolve(&self, index: u16, kind: PoolKind) -> Result<&PoolEntry> {
		self.resolve_any(index, &[kind])
	}

	/// Resolves `index`, requiring the entry to be of one of the given kinds.
	pub fn resolve_any(&self, index: u16, kinds: &[PoolKind]) -> Result<&PoolEntry> {
		if index == 0 {
			return Err(bad_index(index, kinds, BadIndex::Zero));
		}
		match self.inner.get(index as usize) {
			None => Err(bad_index(index, kinds, BadIndex::OutOfRange { count: self.inner.len() as u16 })),
			Some(None) => Err(bad_index(index, kinds, BadIndex::Tombstone)),
			Some(Some(entry)) if kinds.contains(&entry.kind()) => Ok(entry),
			Some(Some(entry)) => Err(bad_index(index, kinds, BadIndex::WrongKind { found: entry.kind() })),
		}
	}

	/// Like [`ConstantPool::resolve`], but index zero resolves to [`None`].
	///
	/// Used for items where zero means "absent", like `super_class` or `catch_type`.
	pub fn resolve_optional(&self, index: u16, kind: PoolKind) -> Result<Option<&PoolEntry>> {
		if index == 0 {
			Ok(None)
		} else {
			self.resolve(index, kind).map(Some)
		}
	}

	pub fn get_utf8(&self, index: u16) -> Result<&JavaStr> {
		match self.resolve(index, PoolKind::Utf8)? {
			PoolEntry::Utf8(string) => Ok(string),
			entry => bail!("resolved {entry:?} instead of Utf8"),
		}
	}

	/// Resolves a `String` entry to the text it refers to.
	pub fn get_string(&self, index: u16) -> Result<&JavaStr> {
		match *self.resolve(index, PoolKind::String)? {
			PoolEntry::String { string_index } => self.get_utf8(string_index),
			ref entry => bail!("resolved {entry:?} instead of String"),
		}
	}

	/// Resolves a `Class` entry to the internal name of the class, like `java/lang/Object`.
	pub fn get_class_name(&self, index: u16) -> Result<&JavaStr> {
		self.get_named(index, PoolKind::Class)
	}

	pub fn get_module_name(&self, index: u16) -> Result<&JavaStr> {
		self.get_named(index, PoolKind::Module)
	}

	pub fn get_package_name(&self, index: u16) -> Result<&JavaStr> {
		self.get_named(index, PoolKind::Package)
	}

	fn get_named(&self, index: u16, kind: PoolKind) -> Result<&JavaStr> {
		match *self.resolve(index, kind)? {
			PoolEntry::Class { name_index } |
			PoolEntry::Module { name_index } |
			PoolEntry::Package { name_index } => self.get_utf8(name_index),
			ref entry => bail!("resolved {entry:?} instead of {kind}"),
		}
	}

	/// Resolves a `NameAndType` entry to its name and descriptor.
	pub fn get_name_and_type(&self, index: u16) -> Result<(&JavaStr, &JavaStr)> {
		match *self.resolve(index, PoolKind::NameAndType)? {
			PoolEntry::NameAndType { name_index, descriptor_index } => {
				Ok((self.get_utf8(name_index)?, self.get_utf8(descriptor_index)?))
			},
			ref entry => bail!("resolved {entry:?} instead of NameAndType"),
		}
	}

	/// Checks whether `index` is a `Utf8` entry with exactly the given contents.
	pub fn is_utf8(&self, index: u16, expected: &str) -> bool {
		matches!(self.get(index), Some(PoolEntry::Utf8(string)) if string.as_bytes() == expected.as_bytes())
	}

	/// Finds the index of a `Utf8` entry with the given contents.
	pub fn find_utf8(&self, string: &str) -> Option<u16> {
		self.entries()
			.find(|(_, entry)| matches!(entry, PoolEntry::Utf8(s) if s.as_bytes() == string.as_bytes()))
			.map(|(index, _)| index)
	}

	/// A human readable description of the entry at `index`, with references resolved.
	pub fn describe(&self, index: u16) -> Result<String> {
		let entry = self.resolve_any(index, &ALL_KINDS)?;

		let member = |class_index: u16, name_and_type_index: u16| -> Result<String> {
			let class = self.get_class_name(class_index)?;
			let (name, descriptor) = self.get_name_and_type(name_and_type_index)?;
			Ok(format!("{}.{}:{}", class.as_str_lossy(), name.as_str_lossy(), descriptor.as_str_lossy()))
		};

		Ok(match *entry {
			PoolEntry::Utf8(ref string) => format!("{:?}", string.as_str_lossy()),
			PoolEntry::Integer(value) => format!("int {value}"),
			PoolEntry::Float(bits) => format!("float {}", f32::from_bits(bits)),
			PoolEntry::Long(value) => format!("long {value}"),
			PoolEntry::Double(bits) => format!("double {}", f64::from_bits(bits)),
			PoolEntry::Class { .. } => format!("class {}", self.get_class_name(index)?.as_str_lossy()),
			PoolEntry::String { .. } => format!("string {:?}", self.get_string(index)?.as_str_lossy()),
			PoolEntry::Fieldref { class_index, name_and_type_index } => format!("field {}", member(class_index, name_and_type_index)?),
			PoolEntry::Methodref { class_index, name_and_type_index } => format!("method {}", member(class_index, name_and_type_index)?),
			PoolEntry::InterfaceMethodref { class_index, name_and_type_index } => format!("interface method {}", member(class_index, name_and_type_index)?),
			PoolEntry::NameAndType { .. } => {
				let (name, descriptor) = self.get_name_and_type(index)?;
				format!("{}:{}", name.as_str_lossy(), descriptor.as_str_lossy())
			},
			PoolEntry::MethodHandle { reference_kind, reference_index } => {
				format!("{} {}", reference_kind_name(reference_kind), self.describe(reference_index)?)
			},
			PoolEntry::MethodType { descriptor_index } => format!("method type {}", self.get_utf8(descriptor_index)?.as_str_lossy()),
			PoolEntry::Dynamic { bootstrap_method_attr_index, name_and_type_index } => {
				let (name, descriptor) = self.get_name_and_type(name_and_type_index)?;
				format!("dynamic #{bootstrap_method_attr_index} {}:{}", name.as_str_lossy(), descriptor.as_str_lossy())
			},
			PoolEntry::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
				let (name, descriptor) = self.get_name_and_type(name_and_type_index)?;
				format!("invokedynamic #{bootstrap_method_attr_index} {}:{}", name.as_str_lossy(), descriptor.as_str_lossy())
			},
			PoolEntry::Module { .. } => format!("module {}", self.get_module_name(index)?.as_str_lossy()),
			PoolEntry::Package { .. } => format!("package {}", self.get_package_name(index)?.as_str_lossy()),
		})
	}

	/// Appends an entry, returning its index.
	///
	/// The references of the new entry must already resolve. Existing indices never change.
	pub fn push(&mut self, entry: PoolEntry) -> Result<u16> {
		let index = self.inner.len();
		let slots = entry.kind().slots();
		if index + slots > u16::MAX as usize {
			bail!("constant pool is full: cannot add {entry:?} at index {index}");
		}
		self.check_references(index as u16, &entry)?;

		self.inner.push(Some(entry));
		if slots == 2 {
			self.inner.push(None);
		}
		Ok(index as u16)
	}

	/// Replaces the entry at `index`, returning the old one.
	///
	/// The new entry has to take up the same number of slots, so that no other index moves. Every entry of the pool
	/// is validated again afterwards, since entries referring to `index` may now see a different kind. If that fails,
	/// the old entry is put back.
	pub fn replace(&mut self, index: u16, entry: PoolEntry) -> Result<PoolEntry> {
		let old_kind = self.resolve_any(index, &ALL_KINDS)?.kind();
		if old_kind.slots() != entry.kind().slots() {
			bail!("cannot replace {old_kind} entry at index {index} with {}: the number of slots taken up differs", entry.kind());
		}

		let slot = &mut self.inner[index as usize];
		let old = slot.replace(entry);

		if let Err(e) = self.validate() {
			self.inner[index as usize] = old;
			return Err(e.context(anyhow!("while replacing constant pool entry at index {index}")));
		}
		old.ok_or_else(|| anyhow!("constant pool entry at index {index} vanished"))
	}

	/// Checks that every reference from one entry to another resolves to the right kind.
	pub fn validate(&self) -> Result<()> {
		for (index, entry) in self.entries() {
			self.check_references(index, entry)?;
		}
		Ok(())
	}

	fn check_references(&self, index: u16, entry: &PoolEntry) -> Result<()> {
		let references = entry.references()
			.map_err(|e| ClassFileError::MalformedConstant { index, reason: e.to_string() })?;
		for (reference, kinds) in references {
			self.resolve_any(reference, kinds)
				.with_context(|| anyhow!("in constant pool entry at index {index}: {entry:?}"))?;
		}
		Ok(())
	}

	/// Reads `constant_pool_count` followed by the entries, and validates the references between entries.
	pub(crate) fn read(reader: &mut ByteReader) -> Result<ConstantPool> {
		let constant_pool_count = reader.read_u16_as_usize()?;
		if constant_pool_count == 0 {
			bail!(ClassFileError::MalformedConstant { index: 0, reason: "constant_pool_count must be at least 1".to_owned() });
		}

		let mut inner = Vec::with_capacity(constant_pool_count);
		inner.push(None);
		while inner.len() < constant_pool_count {
			let index = inner.len() as u16;
			let offset = reader.offset();
			let entry = PoolEntry::read(reader, index)
				.with_context(|| anyhow!("while reading constant pool entry at index {index}, at offset {offset}"))?;
			if entry.kind().slots() == 2 {
				if inner.len() + 1 >= constant_pool_count {
					bail!(ClassFileError::MalformedConstant {
						index,
						reason: format!("{} entry in the last slot has no room for its second slot", entry.kind()),
					});
				}
				inner.push(Some(entry));
				inner.push(None);
			} else {
				inner.push(Some(entry));
			}
		}

		let pool = ConstantPool { inner };
		pool.validate()?;
		Ok(pool)
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_usize_as_u16(self.inner.len())?;
		for (index, entry) in self.entries() {
			entry.write(writer)
				.with_context(|| anyhow!("while writing constant pool entry at index {index}"))?;
		}
		Ok(())
	}
}

const ALL_KINDS: [PoolKind; 17] = [
	PoolKind::Utf8, PoolKind::Integer, PoolKind::Float, PoolKind::Long, PoolKind::Double, PoolKind::Class,
	PoolKind::String, PoolKind::Fieldref, PoolKind::Methodref, PoolKind::InterfaceMethodref, PoolKind::NameAndType,
	PoolKind::MethodHandle, PoolKind::MethodType, PoolKind::Dynamic, PoolKind::InvokeDynamic, PoolKind::Module,
	PoolKind::Package,
];

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::ByteReader;
	use crate::error::{BadIndex, ClassFileError};
	use crate::pool::{ConstantPool, PoolEntry, PoolKind};

	fn sample() -> Result<ConstantPool> {
		let mut pool = ConstantPool::new();
		let name = pool.push(PoolEntry::utf8("java/lang/Object"))?;
		pool.push(PoolEntry::Class { name_index: name })?;
		pool.push(PoolEntry::Long(0x0123_4567_89ab_cdef))?;
		pool.push(PoolEntry::Integer(42))?;
		Ok(pool)
	}

	fn problem(error: &anyhow::Error) -> Option<BadIndex> {
		match ClassFileError::of(error) {
			Some(ClassFileError::InvalidConstantPoolIndex { problem, .. }) => Some(*problem),
			_ => None,
		}
	}

	#[test]
	fn long_takes_two_slots() -> Result<()> {
		let pool = sample()?;
		assert_eq!(pool.count(), 6);
		assert_eq!(pool.get(3), Some(&PoolEntry::Long(0x0123_4567_89ab_cdef)));
		assert_eq!(pool.get(4), None);
		assert_eq!(pool.get(5), Some(&PoolEntry::Integer(42)));
		Ok(())
	}

	#[test]
	fn resolve_failures() -> Result<()> {
		let pool = sample()?;
		assert_eq!(problem(&pool.resolve(0, PoolKind::Utf8).unwrap_err()), Some(BadIndex::Zero));
		assert_eq!(problem(&pool.resolve(4, PoolKind::Integer).unwrap_err()), Some(BadIndex::Tombstone));
		assert_eq!(problem(&pool.resolve(6, PoolKind::Integer).unwrap_err()), Some(BadIndex::OutOfRange { count: 6 }));
		assert_eq!(problem(&pool.resolve(2, PoolKind::Utf8).unwrap_err()), Some(BadIndex::WrongKind { found: PoolKind::Class }));
		assert_eq!(pool.get_class_name(2)?.as_str_lossy(), "java/lang/Object");
		Ok(())
	}

	#[test]
	fn read_write() -> Result<()> {
		let pool = sample()?;
		let mut bytes = Vec::new();
		pool.write(&mut bytes)?;
		assert_eq!(&bytes[..3], &[0x00, 0x06, 0x01]);

		let read = ConstantPool::read(&mut ByteReader::new(&bytes))?;
		assert_eq!(read, pool);
		Ok(())
	}

	#[test]
	fn dangling_reference_rejected_on_read() {
		// count 2, Class { name_index: 1 } refers to itself
		let bytes = [0x00, 0x02, 0x07, 0x00, 0x01];
		let error = ConstantPool::read(&mut ByteReader::new(&bytes)).unwrap_err();
		assert_eq!(problem(&error), Some(BadIndex::WrongKind { found: PoolKind::Class }));
	}

	#[test]
	fn long_in_last_slot() {
		let bytes = [0x00, 0x02, 0x05, 0, 0, 0, 0, 0, 0, 0, 1];
		let error = ConstantPool::read(&mut ByteReader::new(&bytes)).unwrap_err();
		assert!(matches!(ClassFileError::of(&error), Some(ClassFileError::MalformedConstant { index: 1, .. })), "{error:?}");
	}

	#[test]
	fn unknown_tag() {
		let bytes = [0x00, 0x02, 0x02];
		let error = ConstantPool::read(&mut ByteReader::new(&bytes)).unwrap_err();
		assert_eq!(ClassFileError::of(&error), Some(&ClassFileError::InvalidConstantPoolTag { tag: 2, index: 1 }));
	}

	#[test]
	fn replace_keeps_references_valid() -> Result<()> {
		let mut pool = sample()?;
		// the Class entry at 2 refers to 1, so 1 has to stay Utf8
		assert!(pool.replace(1, PoolEntry::Integer(1)).is_err());
		assert_eq!(pool.get(1), Some(&PoolEntry::utf8("java/lang/Object")));

		let old = pool.replace(1, PoolEntry::utf8("java/lang/String"))?;
		assert_eq!(old, PoolEntry::utf8("java/lang/Object"));
		assert_eq!(pool.get_class_name(2)?.as_str_lossy(), "java/lang/String");

		// a Long can't become an Integer, as that would free up a slot
		assert!(pool.replace(3, PoolEntry::Integer(3)).is_err());
		Ok(())
	}

	#[test]
	fn describe() -> Result<()> {
		let mut pool = sample()?;
		let name = pool.push(PoolEntry::utf8("hashCode"))?;
		let descriptor = pool.push(PoolEntry::utf8("()I"))?;
		let name_and_type = pool.push(PoolEntry::NameAndType { name_index: name, descriptor_index: descriptor })?;
		let method = pool.push(PoolEntry::Methodref { class_index: 2, name_and_type_index: name_and_type })?;
		let handle = pool.push(PoolEntry::MethodHandle { reference_kind: 5, reference_index: method })?;

		assert_eq!(pool.describe(method)?, "method java/lang/Object.hashCode:()I");
		assert_eq!(pool.describe(handle)?, "REF_invokeVirtual method java/lang/Object.hashCode:()I");
		assert_eq!(pool.describe(3)?, "long 81985529216486895");
		Ok(())
	}

	#[test]
	fn method_handle_kind_checked() -> Result<()> {
		let mut pool = sample()?;
		// REF_getField must point at a Fieldref
		assert!(pool.push(PoolEntry::MethodHandle { reference_kind: 1, reference_index: 2 }).is_err());
		let error = pool.push(PoolEntry::MethodHandle { reference_kind: 10, reference_index: 2 }).unwrap_err();
		assert!(matches!(ClassFileError::of(&error), Some(ClassFileError::MalformedConstant { .. })));
		Ok(())
	}
}
