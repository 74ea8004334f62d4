//! Attributes, and the registry that maps attribute names to the structures they're decoded into.
//!
//! Every attribute is read from exactly the number of bytes its header declares. An attribute with a name not in the
//! registry, or a known attribute found somewhere it isn't allowed to be, is kept as [`Attribute::Other`] and written
//! back unchanged.

pub mod annotation;
pub mod code;
pub mod entries;
pub mod module;
pub mod stack_map;
pub mod type_annotation;

use std::fmt::{Display, Formatter};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, trace};
use crate::{ByteReader, ClassRead, ClassWrite, ReadOptions};
use crate::class_constants::attribute as name;
use crate::error::ClassFileError;
use crate::pool::{ConstantPool, PoolEntry, PoolKind, CONSTANT_VALUE};

pub use annotation::{Annotation, ElementValue, ElementValuePair};
pub use code::{CodeAttribute, ExceptionTableEntry};
pub use entries::{BootstrapMethod, InnerClass, LineNumber, LocalVariable, MethodParameter, RecordComponent};
pub use module::{ModuleAttribute, ModulePackageTargets, ModuleProvides, ModuleRequires};
pub use stack_map::{StackMapFrame, VerificationType};
pub use type_annotation::{LocalVarTarget, TargetInfo, TargetInfoKind, TargetType, TypeAnnotation, TypePath, TypePathKind};

use code::CodeContext;

/// Where an attribute list is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeContext {
	Class,
	Field,
	Method,
	/// The attributes of a `Code` attribute.
	Code,
	RecordComponent,
}

impl Display for AttributeContext {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			AttributeContext::Class => "class",
			AttributeContext::Field => "field",
			AttributeContext::Method => "method",
			AttributeContext::Code => "Code attribute",
			AttributeContext::RecordComponent => "record component",
		})
	}
}

/// Everything an attribute may need to know about its surroundings while it's read.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadContext<'a> {
	pub(crate) pool: &'a ConstantPool,
	pub(crate) options: &'a ReadOptions,
	pub(crate) location: AttributeContext,
	/// The number of interfaces of the class, for checking `supertype_target`.
	pub(crate) interfaces_count: usize,
	/// Only present for attributes of a `Code` attribute.
	pub(crate) code: Option<&'a CodeContext>,
}

impl<'a> ReadContext<'a> {
	pub(crate) fn new(pool: &'a ConstantPool, options: &'a ReadOptions, interfaces_count: usize) -> ReadContext<'a> {
		ReadContext {
			pool,
			options,
			location: AttributeContext::Class,
			interfaces_count,
			code: None,
		}
	}

	pub(crate) fn at(&self, location: AttributeContext) -> ReadContext<'a> {
		ReadContext { location, code: None, ..*self }
	}

	pub(crate) fn within_code<'b>(&self, code: &'b CodeContext) -> ReadContext<'b> where 'a: 'b {
		ReadContext {
			pool: self.pool,
			options: self.options,
			location: AttributeContext::Code,
			interfaces_count: self.interfaces_count,
			code: Some(code),
		}
	}

	pub(crate) fn code(&self) -> Result<&'a CodeContext> {
		self.code.ok_or_else(|| anyhow!(ClassFileError::malformed(format!(
			"code offsets are only allowed in attributes of a Code attribute, not on a {}", self.location
		))))
	}
}

/// An attribute together with the index of its name.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
	/// Refers to a `Utf8` constant holding the name of the attribute.
	pub name_index: u16,
	pub attribute: Attribute,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
	ConstantValue {
		/// Refers to an `Integer`, `Float`, `Long`, `Double` or `String` constant.
		constantvalue_index: u16,
	},
	Code(CodeAttribute),
	StackMapTable(Vec<StackMapFrame>),
	/// Each refers to a `Class` constant.
	Exceptions(Vec<u16>),
	InnerClasses(Vec<InnerClass>),
	EnclosingMethod {
		class_index: u16,
		/// Refers to a `NameAndType` constant, zero if the class isn't enclosed by a method.
		method_index: u16,
	},
	Synthetic,
	Signature {
		signature_index: u16,
	},
	SourceFile {
		sourcefile_index: u16,
	},
	SourceDebugExtension(Vec<u8>),
	LineNumberTable(Vec<LineNumber>),
	LocalVariableTable(Vec<LocalVariable>),
	LocalVariableTypeTable(Vec<LocalVariable>),
	Deprecated,
	RuntimeVisibleAnnotations(Vec<Annotation>),
	RuntimeInvisibleAnnotations(Vec<Annotation>),
	/// One list of annotations for each parameter.
	RuntimeVisibleParameterAnnotations(Vec<Vec<Annotation>>),
	RuntimeInvisibleParameterAnnotations(Vec<Vec<Annotation>>),
	RuntimeVisibleTypeAnnotations(Vec<TypeAnnotation>),
	RuntimeInvisibleTypeAnnotations(Vec<TypeAnnotation>),
	AnnotationDefault(ElementValue),
	BootstrapMethods(Vec<BootstrapMethod>),
	MethodParameters(Vec<MethodParameter>),
	Module(ModuleAttribute),
	/// Each refers to a `Package` constant.
	ModulePackages(Vec<u16>),
	ModuleMainClass {
		main_class_index: u16,
	},
	NestHost {
		host_class_index: u16,
	},
	/// Each refers to a `Class` constant.
	NestMembers(Vec<u16>),
	Record(Vec<RecordComponent>),
	/// Each refers to a `Class` constant.
	PermittedSubclasses(Vec<u16>),
	/// The raw body of an attribute that isn't decoded.
	Other(Vec<u8>),
}

type ReadFn = fn(&mut ByteReader, &ReadContext) -> Result<Attribute>;

struct Registration {
	name: &'static str,
	contexts: &'static [AttributeContext],
	read: ReadFn,
}

const CLASS: &[AttributeContext] = &[AttributeContext::Class];
const FIELD: &[AttributeContext] = &[AttributeContext::Field];
const METHOD: &[AttributeContext] = &[AttributeContext::Method];
const CODE: &[AttributeContext] = &[AttributeContext::Code];
const MEMBERS: &[AttributeContext] = &[AttributeContext::Class, AttributeContext::Field, AttributeContext::Method];
const DECLARATIONS: &[AttributeContext] = &[
	AttributeContext::Class, AttributeContext::Field, AttributeContext::Method, AttributeContext::RecordComponent,
];
const EVERYWHERE: &[AttributeContext] = &[
	AttributeContext::Class, AttributeContext::Field, AttributeContext::Method, AttributeContext::Code,
	AttributeContext::RecordComponent,
];

/// The known attributes, with the locations they're allowed at.
static REGISTRY: &[Registration] = &[
	Registration { name: name::CONSTANT_VALUE, contexts: FIELD, read: |reader, ctx| {
		let constantvalue_index = reader.read_u16()?;
		ctx.pool.resolve_any(constantvalue_index, CONSTANT_VALUE)?;
		Ok(Attribute::ConstantValue { constantvalue_index })
	} },
	Registration { name: name::CODE, contexts: METHOD, read: CodeAttribute::read },
	Registration { name: name::STACK_MAP_TABLE, contexts: CODE, read: |reader, ctx| {
		Ok(Attribute::StackMapTable(stack_map::read_frames(reader, ctx.pool, ctx.code)?))
	} },
	Registration { name: name::EXCEPTIONS, contexts: METHOD, read: |reader, ctx| {
		Ok(Attribute::Exceptions(read_indices(reader, ctx.pool, PoolKind::Class)?))
	} },
	Registration { name: name::INNER_CLASSES, contexts: CLASS, read: |reader, ctx| {
		Ok(Attribute::InnerClasses(reader.read_vec(|r| r.read_u16_as_usize(), |r| InnerClass::read(r, ctx.pool))?))
	} },
	Registration { name: name::ENCLOSING_METHOD, contexts: CLASS, read: |reader, ctx| {
		let class_index = reader.read_u16()?;
		let method_index = reader.read_u16()?;
		ctx.pool.resolve(class_index, PoolKind::Class)?;
		ctx.pool.resolve_optional(method_index, PoolKind::NameAndType)?;
		Ok(Attribute::EnclosingMethod { class_index, method_index })
	} },
	Registration { name: name::SYNTHETIC, contexts: MEMBERS, read: |_, _| Ok(Attribute::Synthetic) },
	Registration { name: name::SIGNATURE, contexts: DECLARATIONS, read: |reader, ctx| {
		let signature_index = reader.read_u16()?;
		ctx.pool.resolve(signature_index, PoolKind::Utf8)?;
		Ok(Attribute::Signature { signature_index })
	} },
	Registration { name: name::SOURCE_FILE, contexts: CLASS, read: |reader, ctx| {
		let sourcefile_index = reader.read_u16()?;
		ctx.pool.resolve(sourcefile_index, PoolKind::Utf8)?;
		Ok(Attribute::SourceFile { sourcefile_index })
	} },
	Registration { name: name::SOURCE_DEBUG_EXTENSION, contexts: CLASS, read: |reader, _| {
		let length = reader.remaining();
		Ok(Attribute::SourceDebugExtension(reader.read_u8_vec(length)?))
	} },
	Registration { name: name::LINE_NUMBER_TABLE, contexts: CODE, read: |reader, ctx| {
		Ok(Attribute::LineNumberTable(reader.read_vec(|r| r.read_u16_as_usize(), |r| LineNumber::read(r, ctx))?))
	} },
	Registration { name: name::LOCAL_VARIABLE_TABLE, contexts: CODE, read: |reader, ctx| {
		Ok(Attribute::LocalVariableTable(reader.read_vec(|r| r.read_u16_as_usize(), |r| LocalVariable::read(r, ctx))?))
	} },
	Registration { name: name::LOCAL_VARIABLE_TYPE_TABLE, contexts: CODE, read: |reader, ctx| {
		Ok(Attribute::LocalVariableTypeTable(reader.read_vec(|r| r.read_u16_as_usize(), |r| LocalVariable::read(r, ctx))?))
	} },
	Registration { name: name::DEPRECATED, contexts: MEMBERS, read: |_, _| Ok(Attribute::Deprecated) },
	Registration { name: name::RUNTIME_VISIBLE_ANNOTATIONS, contexts: DECLARATIONS, read: |reader, ctx| {
		Ok(Attribute::RuntimeVisibleAnnotations(Annotation::read_list(reader, ctx.pool)?))
	} },
	Registration { name: name::RUNTIME_INVISIBLE_ANNOTATIONS, contexts: DECLARATIONS, read: |reader, ctx| {
		Ok(Attribute::RuntimeInvisibleAnnotations(Annotation::read_list(reader, ctx.pool)?))
	} },
	Registration { name: name::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS, contexts: METHOD, read: |reader, ctx| {
		Ok(Attribute::RuntimeVisibleParameterAnnotations(read_parameter_annotations(reader, ctx.pool)?))
	} },
	Registration { name: name::RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS, contexts: METHOD, read: |reader, ctx| {
		Ok(Attribute::RuntimeInvisibleParameterAnnotations(read_parameter_annotations(reader, ctx.pool)?))
	} },
	Registration { name: name::RUNTIME_VISIBLE_TYPE_ANNOTATIONS, contexts: EVERYWHERE, read: |reader, ctx| {
		Ok(Attribute::RuntimeVisibleTypeAnnotations(TypeAnnotation::read_list(reader, ctx)?))
	} },
	Registration { name: name::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS, contexts: EVERYWHERE, read: |reader, ctx| {
		Ok(Attribute::RuntimeInvisibleTypeAnnotations(TypeAnnotation::read_list(reader, ctx)?))
	} },
	Registration { name: name::ANNOTATION_DEFAULT, contexts: METHOD, read: |reader, ctx| {
		Ok(Attribute::AnnotationDefault(ElementValue::read_default(reader, ctx.pool)?))
	} },
	Registration { name: name::BOOTSTRAP_METHODS, contexts: CLASS, read: |reader, ctx| {
		let mut index = 0;
		let methods = reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| {
				let method = BootstrapMethod::read(r, ctx.pool)
					.with_context(|| anyhow!("in bootstrap method {index}"));
				index += 1;
				method
			}
		)?;
		Ok(Attribute::BootstrapMethods(methods))
	} },
	Registration { name: name::METHOD_PARAMETERS, contexts: METHOD, read: |reader, ctx| {
		Ok(Attribute::MethodParameters(reader.read_vec(|r| r.read_u8_as_usize(), |r| MethodParameter::read(r, ctx.pool))?))
	} },
	Registration { name: name::MODULE, contexts: CLASS, read: |reader, ctx| {
		Ok(Attribute::Module(ModuleAttribute::read(reader, ctx.pool)?))
	} },
	Registration { name: name::MODULE_PACKAGES, contexts: CLASS, read: |reader, ctx| {
		Ok(Attribute::ModulePackages(read_indices(reader, ctx.pool, PoolKind::Package)?))
	} },
	Registration { name: name::MODULE_MAIN_CLASS, contexts: CLASS, read: |reader, ctx| {
		let main_class_index = reader.read_u16()?;
		ctx.pool.resolve(main_class_index, PoolKind::Class)?;
		Ok(Attribute::ModuleMainClass { main_class_index })
	} },
	Registration { name: name::NEST_HOST, contexts: CLASS, read: |reader, ctx| {
		let host_class_index = reader.read_u16()?;
		ctx.pool.resolve(host_class_index, PoolKind::Class)?;
		Ok(Attribute::NestHost { host_class_index })
	} },
	Registration { name: name::NEST_MEMBERS, contexts: CLASS, read: |reader, ctx| {
		Ok(Attribute::NestMembers(read_indices(reader, ctx.pool, PoolKind::Class)?))
	} },
	Registration { name: name::RECORD, contexts: CLASS, read: |reader, ctx| {
		Ok(Attribute::Record(reader.read_vec(|r| r.read_u16_as_usize(), |r| RecordComponent::read(r, ctx))?))
	} },
	Registration { name: name::PERMITTED_SUBCLASSES, contexts: CLASS, read: |reader, ctx| {
		Ok(Attribute::PermittedSubclasses(read_indices(reader, ctx.pool, PoolKind::Class)?))
	} },
];

/// Reads a `u16` count followed by that many constant pool indices of the given kind.
pub(crate) fn read_indices(reader: &mut ByteReader, pool: &ConstantPool, kind: PoolKind) -> Result<Vec<u16>> {
	reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| {
			let index = r.read_u16()?;
			pool.resolve(index, kind)?;
			Ok(index)
		}
	)
}

pub(crate) fn write_indices(writer: &mut impl ClassWrite, indices: &[u16]) -> Result<()> {
	writer.write_slice(indices, |w, size| w.write_usize_as_u16(size), |w, &index| w.write_u16(index))
}

fn read_parameter_annotations(reader: &mut ByteReader, pool: &ConstantPool) -> Result<Vec<Vec<Annotation>>> {
	let mut parameter = 0;
	reader.read_vec(
		|r| r.read_u8_as_usize(),
		|r| {
			let annotations = Annotation::read_list(r, pool)
				.with_context(|| anyhow!("in annotations of parameter {parameter}"));
			parameter += 1;
			annotations
		}
	)
}

/// Turns running out of bytes inside the body of an attribute into a [`ClassFileError::LengthMismatch`].
fn length_mismatch(error: anyhow::Error, attribute: &str, declared: u32, start: usize) -> anyhow::Error {
	match ClassFileError::of(&error) {
		Some(&ClassFileError::Truncated { offset, needed, .. }) => {
			let actual = (offset + needed).saturating_sub(start);
			error.context(ClassFileError::LengthMismatch { attribute: attribute.to_owned(), declared, actual })
		},
		_ => error,
	}
}

impl AttributeInfo {
	/// Creates an attribute, finding or adding the constant holding its name.
	///
	/// Fails for [`Attribute::Other`], since it has no name of its own.
	pub fn new(pool: &mut ConstantPool, attribute: Attribute) -> Result<AttributeInfo> {
		let Some(name) = attribute.name() else {
			bail!("an attribute of unknown kind needs an explicit name_index");
		};
		let name_index = match pool.find_utf8(name) {
			Some(index) => index,
			None => pool.push(PoolEntry::utf8(name))?,
		};
		Ok(AttributeInfo { name_index, attribute })
	}

	/// The name of the attribute, as stored in the constant pool.
	pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<std::borrow::Cow<'a, str>> {
		Ok(pool.get_utf8(self.name_index)?.as_str_lossy())
	}

	pub(crate) fn read(reader: &mut ByteReader, ctx: &ReadContext) -> Result<AttributeInfo> {
		let offset = reader.offset();
		let name_index = reader.read_u16()?;
		let attribute_name = ctx.pool.get_utf8(name_index)
			.with_context(|| anyhow!("while reading the name of the attribute at offset {offset}"))?;
		let display_name = attribute_name.as_str_lossy();
		let length = reader.read_u32()?;
		let mut body = reader.sub_reader(length as usize)
			.with_context(|| anyhow!("while reading attribute {display_name:?} at offset {offset}"))?;
		let start = body.offset();

		let registration = REGISTRY.iter()
			.find(|registration| registration.name.as_bytes() == attribute_name.as_bytes());

		let attribute = match registration {
			Some(registration) if registration.contexts.contains(&ctx.location) => {
				trace!("reading attribute {} ({length} bytes) at offset {offset}", registration.name);
				(registration.read)(&mut body, ctx)
					.and_then(|attribute| {
						if !body.is_empty() {
							bail!(ClassFileError::LengthMismatch {
								attribute: registration.name.to_owned(),
								declared: length,
								actual: body.position(),
							});
						}
						Ok(attribute)
					})
					.map_err(|e| length_mismatch(e, registration.name, length, start))
					.with_context(|| anyhow!("while reading attribute {} at offset {offset}", registration.name))?
			},
			Some(registration) => {
				debug!("attribute {} at offset {offset} is not allowed on a {}, keeping it as raw bytes", registration.name, ctx.location);
				Attribute::Other(body.read_u8_vec(length as usize)?)
			},
			None => {
				debug!("unknown attribute {display_name:?} ({length} bytes) at offset {offset}, keeping it as raw bytes");
				Attribute::Other(body.read_u8_vec(length as usize)?)
			},
		};

		Ok(AttributeInfo { name_index, attribute })
	}

	/// Reads a `u16` count followed by that many attributes.
	pub(crate) fn read_list(reader: &mut ByteReader, ctx: &ReadContext) -> Result<Vec<AttributeInfo>> {
		reader.read_vec(|r| r.read_u16_as_usize(), |r| AttributeInfo::read(r, ctx))
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite, pool: &ConstantPool) -> Result<()> {
		match self.attribute.name() {
			Some(expected) => {
				if !pool.is_utf8(self.name_index, expected) {
					bail!(ClassFileError::malformed(format!(
						"name_index {} of a {expected} attribute doesn't refer to {expected:?}", self.name_index
					)));
				}
			},
			None => {
				pool.resolve(self.name_index, PoolKind::Utf8)?;
			},
		}

		let mut body = Vec::new();
		self.attribute.write_body(&mut body, pool)
			.with_context(|| anyhow!("while writing attribute {}", self.attribute.name().unwrap_or("with unknown name")))?;

		writer.write_u16(self.name_index)?;
		writer.write_usize_as_u32(body.len())?;
		writer.write_u8_slice(&body)
	}

	pub(crate) fn write_list(writer: &mut impl ClassWrite, attributes: &[AttributeInfo], pool: &ConstantPool) -> Result<()> {
		writer.write_slice(attributes, |w, size| w.write_usize_as_u16(size), |w, attribute| attribute.write(w, pool))
	}
}

impl Attribute {
	/// The name the attribute is stored under, or `None` for [`Attribute::Other`].
	pub fn name(&self) -> Option<&'static str> {
		Some(match self {
			Attribute::ConstantValue { .. } => name::CONSTANT_VALUE,
			Attribute::Code(_) => name::CODE,
			Attribute::StackMapTable(_) => name::STACK_MAP_TABLE,
			Attribute::Exceptions(_) => name::EXCEPTIONS,
			Attribute::InnerClasses(_) => name::INNER_CLASSES,
			Attribute::EnclosingMethod { .. } => name::ENCLOSING_METHOD,
			Attribute::Synthetic => name::SYNTHETIC,
			Attribute::Signature { .. } => name::SIGNATURE,
			Attribute::SourceFile { .. } => name::SOURCE_FILE,
			Attribute::SourceDebugExtension(_) => name::SOURCE_DEBUG_EXTENSION,
			Attribute::LineNumberTable(_) => name::LINE_NUMBER_TABLE,
			Attribute::LocalVariableTable(_) => name::LOCAL_VARIABLE_TABLE,
			Attribute::LocalVariableTypeTable(_) => name::LOCAL_VARIABLE_TYPE_TABLE,
			Attribute::Deprecated => name::DEPRECATED,
			Attribute::RuntimeVisibleAnnotations(_) => name::RUNTIME_VISIBLE_ANNOTATIONS,
			Attribute::RuntimeInvisibleAnnotations(_) => name::RUNTIME_INVISIBLE_ANNOTATIONS,
			Attribute::RuntimeVisibleParameterAnnotations(_) => name::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS,
			Attribute::RuntimeInvisibleParameterAnnotations(_) => name::RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS,
			Attribute::RuntimeVisibleTypeAnnotations(_) => name::RUNTIME_VISIBLE_TYPE_ANNOTATIONS,
			Attribute::RuntimeInvisibleTypeAnnotations(_) => name::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS,
			Attribute::AnnotationDefault(_) => name::ANNOTATION_DEFAULT,
			Attribute::BootstrapMethods(_) => name::BOOTSTRAP_METHODS,
			Attribute::MethodParameters(_) => name::METHOD_PARAMETERS,
			Attribute::Module(_) => name::MODULE,
			Attribute::ModulePackages(_) => name::MODULE_PACKAGES,
			Attribute::ModuleMainClass { .. } => name::MODULE_MAIN_CLASS,
			Attribute::NestHost { .. } => name::NEST_HOST,
			Attribute::NestMembers(_) => name::NEST_MEMBERS,
			Attribute::Record(_) => name::RECORD,
			Attribute::PermittedSubclasses(_) => name::PERMITTED_SUBCLASSES,
			Attribute::Other(_) => return None,
		})
	}

	fn write_body(&self, writer: &mut impl ClassWrite, pool: &ConstantPool) -> Result<()> {
		match self {
			&Attribute::ConstantValue { constantvalue_index } => writer.write_u16(constantvalue_index),
			Attribute::Code(code) => code.write(writer, pool),
			Attribute::StackMapTable(frames) => stack_map::write_frames(writer, frames),
			Attribute::Exceptions(indices) |
			Attribute::ModulePackages(indices) |
			Attribute::NestMembers(indices) |
			Attribute::PermittedSubclasses(indices) => write_indices(writer, indices),
			Attribute::InnerClasses(classes) => {
				writer.write_slice(classes, |w, size| w.write_usize_as_u16(size), |w, class| class.write(w))
			},
			&Attribute::EnclosingMethod { class_index, method_index } => {
				writer.write_u16(class_index)?;
				writer.write_u16(method_index)
			},
			Attribute::Synthetic | Attribute::Deprecated => Ok(()),
			&Attribute::Signature { signature_index: index } |
			&Attribute::SourceFile { sourcefile_index: index } |
			&Attribute::ModuleMainClass { main_class_index: index } |
			&Attribute::NestHost { host_class_index: index } => writer.write_u16(index),
			Attribute::SourceDebugExtension(bytes) | Attribute::Other(bytes) => writer.write_u8_slice(bytes),
			Attribute::LineNumberTable(lines) => {
				writer.write_slice(lines, |w, size| w.write_usize_as_u16(size), |w, line| line.write(w))
			},
			Attribute::LocalVariableTable(variables) | Attribute::LocalVariableTypeTable(variables) => {
				writer.write_slice(variables, |w, size| w.write_usize_as_u16(size), |w, variable| variable.write(w))
			},
			Attribute::RuntimeVisibleAnnotations(annotations) |
			Attribute::RuntimeInvisibleAnnotations(annotations) => Annotation::write_list(writer, annotations),
			Attribute::RuntimeVisibleParameterAnnotations(parameters) |
			Attribute::RuntimeInvisibleParameterAnnotations(parameters) => {
				writer.write_slice(parameters, |w, size| w.write_usize_as_u8(size), |w, annotations| Annotation::write_list(w, annotations))
			},
			Attribute::RuntimeVisibleTypeAnnotations(annotations) |
			Attribute::RuntimeInvisibleTypeAnnotations(annotations) => TypeAnnotation::write_list(writer, annotations),
			Attribute::AnnotationDefault(value) => value.write(writer),
			Attribute::BootstrapMethods(methods) => {
				writer.write_slice(methods, |w, size| w.write_usize_as_u16(size), |w, method| method.write(w))
			},
			Attribute::MethodParameters(parameters) => {
				writer.write_slice(parameters, |w, size| w.write_usize_as_u8(size), |w, parameter| parameter.write(w))
			},
			Attribute::Module(module) => module.write(writer),
			Attribute::Record(components) => {
				writer.write_slice(components, |w, size| w.write_usize_as_u16(size), |w, component| component.write(w, pool))
			},
		}
	}

	/// A human readable one-line description of the attribute, with constant pool references resolved.
	pub fn summary(&self, pool: &ConstantPool) -> Result<String> {
		let class_names = |indices: &[u16]| -> Result<String> {
			let names: Result<Vec<_>> = indices.iter()
				.map(|&index| Ok(pool.get_class_name(index)?.as_str_lossy().into_owned()))
				.collect();
			Ok(names?.join(", "))
		};
		let annotations = |annotations: &[Annotation]| -> Result<String> {
			let summaries: Result<Vec<_>> = annotations.iter().map(|annotation| annotation.summary(pool)).collect();
			Ok(summaries?.join(" "))
		};

		Ok(match self {
			&Attribute::ConstantValue { constantvalue_index } => pool.describe(constantvalue_index)?,
			Attribute::Code(code) => format!(
				"max_stack {}, max_locals {}, {} instructions, {} exception handlers, {} attributes",
				code.max_stack, code.max_locals, code.instructions.len(), code.exception_table.len(), code.attributes.len()
			),
			Attribute::StackMapTable(frames) => format!("{} frames", frames.len()),
			Attribute::Exceptions(indices) |
			Attribute::NestMembers(indices) |
			Attribute::PermittedSubclasses(indices) => class_names(indices)?,
			Attribute::InnerClasses(classes) => {
				let names: Result<Vec<_>> = classes.iter()
					.map(|class| Ok(pool.get_class_name(class.inner_class_info_index)?.as_str_lossy().into_owned()))
					.collect();
				names?.join(", ")
			},
			&Attribute::EnclosingMethod { class_index, method_index } => {
				let class = pool.get_class_name(class_index)?.as_str_lossy();
				if method_index == 0 {
					class.into_owned()
				} else {
					let (name, descriptor) = pool.get_name_and_type(method_index)?;
					format!("{class}.{}:{}", name.as_str_lossy(), descriptor.as_str_lossy())
				}
			},
			Attribute::Synthetic | Attribute::Deprecated => "<none>".to_owned(),
			&Attribute::Signature { signature_index: index } |
			&Attribute::SourceFile { sourcefile_index: index } => pool.get_utf8(index)?.as_str_lossy().into_owned(),
			Attribute::SourceDebugExtension(bytes) => format!("{} bytes of debug extension", bytes.len()),
			Attribute::LineNumberTable(lines) => {
				let lines: Vec<_> = lines.iter().map(|line| format!("{}: line {}", line.start_pc, line.line_number)).collect();
				lines.join(", ")
			},
			Attribute::LocalVariableTable(variables) | Attribute::LocalVariableTypeTable(variables) => {
				let variables: Result<Vec<_>> = variables.iter()
					.map(|variable| Ok(format!(
						"{} {} {} [{}, {})",
						variable.index,
						pool.get_utf8(variable.name_index)?.as_str_lossy(),
						pool.get_utf8(variable.descriptor_index)?.as_str_lossy(),
						variable.start_pc,
						variable.start_pc as u32 + variable.length as u32,
					)))
					.collect();
				variables?.join(", ")
			},
			Attribute::RuntimeVisibleAnnotations(list) |
			Attribute::RuntimeInvisibleAnnotations(list) => annotations(list)?,
			Attribute::RuntimeVisibleParameterAnnotations(parameters) |
			Attribute::RuntimeInvisibleParameterAnnotations(parameters) => {
				let parameters: Result<Vec<_>> = parameters.iter()
					.enumerate()
					.map(|(parameter, list)| Ok(format!("parameter {parameter}: {}", annotations(list)?)))
					.collect();
				parameters?.join(", ")
			},
			Attribute::RuntimeVisibleTypeAnnotations(list) |
			Attribute::RuntimeInvisibleTypeAnnotations(list) => {
				let summaries: Result<Vec<_>> = list.iter().map(|annotation| annotation.summary(pool)).collect();
				summaries?.join(", ")
			},
			Attribute::AnnotationDefault(value) => value.summary(pool)?,
			Attribute::BootstrapMethods(methods) => {
				let methods: Result<Vec<_>> = methods.iter()
					.map(|method| {
						let arguments: Result<Vec<_>> = method.bootstrap_arguments.iter()
							.map(|&argument| pool.describe(argument))
							.collect();
						Ok(format!("{} [{}]", pool.describe(method.bootstrap_method_ref)?, arguments?.join(", ")))
					})
					.collect();
				methods?.join(", ")
			},
			Attribute::MethodParameters(parameters) => {
				let parameters: Result<Vec<_>> = parameters.iter()
					.map(|parameter| match parameter.name_index {
						0 => Ok("<unnamed>".to_owned()),
						index => Ok(pool.get_utf8(index)?.as_str_lossy().into_owned()),
					})
					.collect();
				parameters?.join(", ")
			},
			Attribute::Module(module) => module.summary(pool)?,
			Attribute::ModulePackages(indices) => {
				let names: Result<Vec<_>> = indices.iter()
					.map(|&index| Ok(pool.get_package_name(index)?.as_str_lossy().into_owned()))
					.collect();
				names?.join(", ")
			},
			&Attribute::ModuleMainClass { main_class_index: index } |
			&Attribute::NestHost { host_class_index: index } => pool.get_class_name(index)?.as_str_lossy().into_owned(),
			Attribute::Record(components) => {
				let components: Result<Vec<_>> = components.iter()
					.map(|component| Ok(format!(
						"{} {}",
						pool.get_utf8(component.descriptor_index)?.as_str_lossy(),
						pool.get_utf8(component.name_index)?.as_str_lossy(),
					)))
					.collect();
				components?.join(", ")
			},
			Attribute::Other(bytes) => format!("{} bytes of unknown data", bytes.len()),
		})
	}
}

/// Checks the `THROWS` type annotations of a method against its `Exceptions` attribute.
pub(crate) fn check_method_throws(attributes: &[AttributeInfo]) -> Result<()> {
	let exceptions = attributes.iter()
		.find_map(|info| match &info.attribute {
			Attribute::Exceptions(exceptions) => Some(exceptions.len()),
			_ => None,
		})
		.unwrap_or(0);
	for info in attributes {
		if let Attribute::RuntimeVisibleTypeAnnotations(annotations) | Attribute::RuntimeInvisibleTypeAnnotations(annotations) = &info.attribute {
			type_annotation::check_throws(annotations, exceptions)?;
		}
	}
	Ok(())
}
