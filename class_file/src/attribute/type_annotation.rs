//! Type annotations, and the `target_info` union selected by their `target_type`.
//!
//! See <https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.7.20>.

use std::fmt::{Display, Formatter};
use anyhow::{anyhow, bail, Context, Result};
use crate::{ByteReader, ClassRead, ClassWrite};
use crate::attribute::{AttributeContext, ReadContext};
use crate::attribute::annotation::Annotation;
use crate::class_constants::type_annotation;
use crate::error::ClassFileError;
use crate::pool::ConstantPool;

/// The `target_type` of a type annotation: which kind of type usage the annotation is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TargetType {
	ClassTypeParameter = type_annotation::CLASS_TYPE_PARAMETER,
	MethodTypeParameter = type_annotation::METHOD_TYPE_PARAMETER,
	ClassExtends = type_annotation::CLASS_EXTENDS,
	ClassTypeParameterBound = type_annotation::CLASS_TYPE_PARAMETER_BOUND,
	MethodTypeParameterBound = type_annotation::METHOD_TYPE_PARAMETER_BOUND,
	Field = type_annotation::FIELD,
	MethodReturn = type_annotation::METHOD_RETURN,
	MethodReceiver = type_annotation::METHOD_RECEIVER,
	MethodFormalParameter = type_annotation::METHOD_FORMAL_PARAMETER,
	Throws = type_annotation::THROWS,
	LocalVariable = type_annotation::LOCAL_VARIABLE,
	ResourceVariable = type_annotation::RESOURCE_VARIABLE,
	ExceptionParameter = type_annotation::EXCEPTION_PARAMETER,
	InstanceOf = type_annotation::INSTANCE_OF,
	New = type_annotation::NEW,
	ConstructorReference = type_annotation::CONSTRUCTOR_REFERENCE,
	MethodReference = type_annotation::METHOD_REFERENCE,
	Cast = type_annotation::CAST,
	ConstructorInvocationTypeArgument = type_annotation::CONSTRUCTOR_INVOCATION_TYPE_ARGUMENT,
	MethodInvocationTypeArgument = type_annotation::METHOD_INVOCATION_TYPE_ARGUMENT,
	ConstructorReferenceTypeArgument = type_annotation::CONSTRUCTOR_REFERENCE_TYPE_ARGUMENT,
	MethodReferenceTypeArgument = type_annotation::METHOD_REFERENCE_TYPE_ARGUMENT,
}

/// Which of the `target_info` items a `target_type` selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetInfoKind {
	TypeParameter,
	Supertype,
	TypeParameterBound,
	Empty,
	FormalParameter,
	Throws,
	LocalVar,
	Catch,
	Offset,
	TypeArgument,
}

struct TargetTypeRow {
	target_type: TargetType,
	name: &'static str,
	info: TargetInfoKind,
	contexts: &'static [AttributeContext],
}

const CLASS: &[AttributeContext] = &[AttributeContext::Class];
const METHOD: &[AttributeContext] = &[AttributeContext::Method];
const FIELD: &[AttributeContext] = &[AttributeContext::Field, AttributeContext::RecordComponent];
const CODE: &[AttributeContext] = &[AttributeContext::Code];

/// Tables 4.7.20-A, 4.7.20-B and 4.7.20-C of the Java Virtual Machine Specification in one.
static TARGET_TYPES: [TargetTypeRow; 22] = [
	TargetTypeRow { target_type: TargetType::ClassTypeParameter, name: "CLASS_TYPE_PARAMETER", info: TargetInfoKind::TypeParameter, contexts: CLASS },
	TargetTypeRow { target_type: TargetType::MethodTypeParameter, name: "METHOD_TYPE_PARAMETER", info: TargetInfoKind::TypeParameter, contexts: METHOD },
	TargetTypeRow { target_type: TargetType::ClassExtends, name: "CLASS_EXTENDS", info: TargetInfoKind::Supertype, contexts: CLASS },
	TargetTypeRow { target_type: TargetType::ClassTypeParameterBound, name: "CLASS_TYPE_PARAMETER_BOUND", info: TargetInfoKind::TypeParameterBound, contexts: CLASS },
	TargetTypeRow { target_type: TargetType::MethodTypeParameterBound, name: "METHOD_TYPE_PARAMETER_BOUND", info: TargetInfoKind::TypeParameterBound, contexts: METHOD },
	TargetTypeRow { target_type: TargetType::Field, name: "FIELD", info: TargetInfoKind::Empty, contexts: FIELD },
	TargetTypeRow { target_type: TargetType::MethodReturn, name: "METHOD_RETURN", info: TargetInfoKind::Empty, contexts: METHOD },
	TargetTypeRow { target_type: TargetType::MethodReceiver, name: "METHOD_RECEIVER", info: TargetInfoKind::Empty, contexts: METHOD },
	TargetTypeRow { target_type: TargetType::MethodFormalParameter, name: "METHOD_FORMAL_PARAMETER", info: TargetInfoKind::FormalParameter, contexts: METHOD },
	TargetTypeRow { target_type: TargetType::Throws, name: "THROWS", info: TargetInfoKind::Throws, contexts: METHOD },
	TargetTypeRow { target_type: TargetType::LocalVariable, name: "LOCAL_VARIABLE", info: TargetInfoKind::LocalVar, contexts: CODE },
	TargetTypeRow { target_type: TargetType::ResourceVariable, name: "RESOURCE_VARIABLE", info: TargetInfoKind::LocalVar, contexts: CODE },
	TargetTypeRow { target_type: TargetType::ExceptionParameter, name: "EXCEPTION_PARAMETER", info: TargetInfoKind::Catch, contexts: CODE },
	TargetTypeRow { target_type: TargetType::InstanceOf, name: "INSTANCEOF", info: TargetInfoKind::Offset, contexts: CODE },
	TargetTypeRow { target_type: TargetType::New, name: "NEW", info: TargetInfoKind::Offset, contexts: CODE },
	TargetTypeRow { target_type: TargetType::ConstructorReference, name: "CONSTRUCTOR_REFERENCE", info: TargetInfoKind::Offset, contexts: CODE },
	TargetTypeRow { target_type: TargetType::MethodReference, name: "METHOD_REFERENCE", info: TargetInfoKind::Offset, contexts: CODE },
	TargetTypeRow { target_type: TargetType::Cast, name: "CAST", info: TargetInfoKind::TypeArgument, contexts: CODE },
	TargetTypeRow { target_type: TargetType::ConstructorInvocationTypeArgument, name: "CONSTRUCTOR_INVOCATION_TYPE_ARGUMENT", info: TargetInfoKind::TypeArgument, contexts: CODE },
	TargetTypeRow { target_type: TargetType::MethodInvocationTypeArgument, name: "METHOD_INVOCATION_TYPE_ARGUMENT", info: TargetInfoKind::TypeArgument, contexts: CODE },
	TargetTypeRow { target_type: TargetType::ConstructorReferenceTypeArgument, name: "CONSTRUCTOR_REFERENCE_TYPE_ARGUMENT", info: TargetInfoKind::TypeArgument, contexts: CODE },
	TargetTypeRow { target_type: TargetType::MethodReferenceTypeArgument, name: "METHOD_REFERENCE_TYPE_ARGUMENT", info: TargetInfoKind::TypeArgument, contexts: CODE },
];

impl TargetType {
	/// Every target type, in the order of their values.
	pub fn all() -> impl Iterator<Item=TargetType> {
		TARGET_TYPES.iter().map(|row| row.target_type)
	}

	pub fn from_u8(value: u8) -> Option<TargetType> {
		TARGET_TYPES.iter()
			.find(|row| row.target_type as u8 == value)
			.map(|row| row.target_type)
	}

	pub fn value(self) -> u8 {
		self as u8
	}

	fn row(self) -> &'static TargetTypeRow {
		// the table has a row for every variant, in declaration order
		&TARGET_TYPES[self.position()]
	}

	fn position(self) -> usize {
		match self {
			TargetType::ClassTypeParameter => 0,
			TargetType::MethodTypeParameter => 1,
			TargetType::ClassExtends => 2,
			TargetType::ClassTypeParameterBound => 3,
			TargetType::MethodTypeParameterBound => 4,
			TargetType::Field => 5,
			TargetType::MethodReturn => 6,
			TargetType::MethodReceiver => 7,
			TargetType::MethodFormalParameter => 8,
			TargetType::Throws => 9,
			TargetType::LocalVariable => 10,
			TargetType::ResourceVariable => 11,
			TargetType::ExceptionParameter => 12,
			TargetType::InstanceOf => 13,
			TargetType::New => 14,
			TargetType::ConstructorReference => 15,
			TargetType::MethodReference => 16,
			TargetType::Cast => 17,
			TargetType::ConstructorInvocationTypeArgument => 18,
			TargetType::MethodInvocationTypeArgument => 19,
			TargetType::ConstructorReferenceTypeArgument => 20,
			TargetType::MethodReferenceTypeArgument => 21,
		}
	}

	/// The name used in the Java Virtual Machine Specification, like `METHOD_RETURN`.
	pub fn name(self) -> &'static str {
		self.row().name
	}

	/// The `target_info` item this target type is followed by.
	pub fn info_kind(self) -> TargetInfoKind {
		self.row().info
	}

	/// Where a type annotation with this target type may appear.
	pub fn contexts(self) -> &'static [AttributeContext] {
		self.row().contexts
	}
}

impl Display for TargetType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} ({:#04x})", self.name(), self.value())
	}
}

/// One row of the table of a `localvar_target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVarTarget {
	pub start_pc: u16,
	pub length: u16,
	pub index: u16,
}

/// The `target_info` union: which type usage within the annotated declaration or code is annotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetInfo {
	TypeParameter {
		type_parameter_index: u8,
	},
	Supertype {
		/// [`u16::MAX`] for the superclass, otherwise an index into `interfaces`.
		supertype_index: u16,
	},
	TypeParameterBound {
		type_parameter_index: u8,
		bound_index: u8,
	},
	/// No locator data at all, used for fields, method return types and receiver types.
	Empty,
	FormalParameter {
		formal_parameter_index: u8,
	},
	Throws {
		/// Index into the `exception_index_table` of the `Exceptions` attribute.
		throws_type_index: u16,
	},
	LocalVar {
		table: Vec<LocalVarTarget>,
	},
	Catch {
		/// Index into the exception table of the `Code` attribute.
		exception_table_index: u16,
	},
	Offset {
		offset: u16,
	},
	TypeArgument {
		offset: u16,
		type_argument_index: u8,
	},
}

impl TargetInfo {
	pub fn kind(&self) -> TargetInfoKind {
		match self {
			TargetInfo::TypeParameter { .. } => TargetInfoKind::TypeParameter,
			TargetInfo::Supertype { .. } => TargetInfoKind::Supertype,
			TargetInfo::TypeParameterBound { .. } => TargetInfoKind::TypeParameterBound,
			TargetInfo::Empty => TargetInfoKind::Empty,
			TargetInfo::FormalParameter { .. } => TargetInfoKind::FormalParameter,
			TargetInfo::Throws { .. } => TargetInfoKind::Throws,
			TargetInfo::LocalVar { .. } => TargetInfoKind::LocalVar,
			TargetInfo::Catch { .. } => TargetInfoKind::Catch,
			TargetInfo::Offset { .. } => TargetInfoKind::Offset,
			TargetInfo::TypeArgument { .. } => TargetInfoKind::TypeArgument,
		}
	}

	/// The number of bytes this `target_info` takes up in the class file.
	pub fn length(&self) -> usize {
		match self {
			TargetInfo::Empty => 0,
			TargetInfo::TypeParameter { .. } | TargetInfo::FormalParameter { .. } => 1,
			TargetInfo::Supertype { .. } | TargetInfo::TypeParameterBound { .. } |
			TargetInfo::Throws { .. } | TargetInfo::Catch { .. } | TargetInfo::Offset { .. } => 2,
			TargetInfo::TypeArgument { .. } => 3,
			TargetInfo::LocalVar { table } => 2 + 6 * table.len(),
		}
	}

	/// A human readable description of the located type usage.
	pub fn verbose(&self) -> String {
		match self {
			TargetInfo::Empty => "<none>".to_owned(),
			TargetInfo::TypeParameter { type_parameter_index } => format!("type parameter {type_parameter_index}"),
			TargetInfo::Supertype { supertype_index: u16::MAX } => "superclass".to_owned(),
			TargetInfo::Supertype { supertype_index } => format!("interface {supertype_index}"),
			TargetInfo::TypeParameterBound { type_parameter_index, bound_index } => {
				format!("bound {bound_index} of type parameter {type_parameter_index}")
			},
			TargetInfo::FormalParameter { formal_parameter_index } => format!("formal parameter {formal_parameter_index}"),
			TargetInfo::Throws { throws_type_index } => format!("thrown type {throws_type_index}"),
			TargetInfo::LocalVar { table } => {
				let ranges: Vec<String> = table.iter()
					.map(|row| format!("pc {}..{} in slot {}", row.start_pc, row.start_pc as u32 + row.length as u32, row.index))
					.collect();
				format!("local variable [{}]", ranges.join(", "))
			},
			TargetInfo::Catch { exception_table_index } => format!("exception table entry {exception_table_index}"),
			TargetInfo::Offset { offset } => format!("offset {offset}"),
			TargetInfo::TypeArgument { offset, type_argument_index } => format!("offset {offset}, type argument {type_argument_index}"),
		}
	}

	fn read(kind: TargetInfoKind, reader: &mut ByteReader, ctx: &ReadContext) -> Result<TargetInfo> {
		Ok(match kind {
			TargetInfoKind::Empty => TargetInfo::Empty,
			TargetInfoKind::TypeParameter => TargetInfo::TypeParameter { type_parameter_index: reader.read_u8()? },
			TargetInfoKind::Supertype => {
				let supertype_index = reader.read_u16()?;
				if supertype_index != u16::MAX && supertype_index as usize >= ctx.interfaces_count {
					bail!(ClassFileError::malformed(format!(
						"supertype_index {supertype_index} is out of bounds for {} interfaces", ctx.interfaces_count
					)));
				}
				TargetInfo::Supertype { supertype_index }
			},
			TargetInfoKind::TypeParameterBound => TargetInfo::TypeParameterBound {
				type_parameter_index: reader.read_u8()?,
				bound_index: reader.read_u8()?,
			},
			TargetInfoKind::FormalParameter => TargetInfo::FormalParameter { formal_parameter_index: reader.read_u8()? },
			// checked against the Exceptions attribute once all attributes of the method are read
			TargetInfoKind::Throws => TargetInfo::Throws { throws_type_index: reader.read_u16()? },
			TargetInfoKind::LocalVar => {
				let code = ctx.code()?;
				let table = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| {
						let start_pc = r.read_u16()?;
						let length = r.read_u16()?;
						let index = r.read_u16()?;
						code.check_range(start_pc, length, "localvar_target")?;
						Ok(LocalVarTarget { start_pc, length, index })
					}
				)?;
				TargetInfo::LocalVar { table }
			},
			TargetInfoKind::Catch => {
				let exception_table_index = reader.read_u16()?;
				let code = ctx.code()?;
				if exception_table_index as usize >= code.exception_table_length {
					bail!(ClassFileError::malformed(format!(
						"exception_table_index {exception_table_index} is out of bounds for an exception table of length {}",
						code.exception_table_length
					)));
				}
				TargetInfo::Catch { exception_table_index }
			},
			TargetInfoKind::Offset => {
				let offset = reader.read_u16()?;
				ctx.code()?.check_offset(offset as u32, "offset_target")?;
				TargetInfo::Offset { offset }
			},
			TargetInfoKind::TypeArgument => {
				let offset = reader.read_u16()?;
				let type_argument_index = reader.read_u8()?;
				ctx.code()?.check_offset(offset as u32, "type_argument_target")?;
				TargetInfo::TypeArgument { offset, type_argument_index }
			},
		})
	}

	fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		match self {
			TargetInfo::Empty => Ok(()),
			&TargetInfo::TypeParameter { type_parameter_index } => writer.write_u8(type_parameter_index),
			&TargetInfo::Supertype { supertype_index } => writer.write_u16(supertype_index),
			&TargetInfo::TypeParameterBound { type_parameter_index, bound_index } => {
				writer.write_u8(type_parameter_index)?;
				writer.write_u8(bound_index)
			},
			&TargetInfo::FormalParameter { formal_parameter_index } => writer.write_u8(formal_parameter_index),
			&TargetInfo::Throws { throws_type_index } => writer.write_u16(throws_type_index),
			TargetInfo::LocalVar { table } => {
				writer.write_slice(table, |w, size| w.write_usize_as_u16(size), |w, row| {
					w.write_u16(row.start_pc)?;
					w.write_u16(row.length)?;
					w.write_u16(row.index)
				})
			},
			&TargetInfo::Catch { exception_table_index } => writer.write_u16(exception_table_index),
			&TargetInfo::Offset { offset } => writer.write_u16(offset),
			&TargetInfo::TypeArgument { offset, type_argument_index } => {
				writer.write_u16(offset)?;
				writer.write_u8(type_argument_index)
			},
		}
	}
}

/// One step of a type path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypePathKind {
	ArrayDeeper,
	NestedDeeper,
	WildcardBound,
	TypeArgument {
		index: u8,
	},
}

/// Specifies exactly where in the type the annotation is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypePath {
	pub path: Vec<TypePathKind>,
}

impl TypePath {
	fn read(reader: &mut ByteReader) -> Result<TypePath> {
		let mut path = Vec::new();
		for _ in 0..reader.read_u8()? {
			let type_path_kind = reader.read_u8()?;
			let type_argument_index = reader.read_u8()?;
			let kind = match type_path_kind {
				0 => TypePathKind::ArrayDeeper,
				1 => TypePathKind::NestedDeeper,
				2 => TypePathKind::WildcardBound,
				3 => TypePathKind::TypeArgument { index: type_argument_index },
				kind => bail!(ClassFileError::malformed(format!("type_path_kind not in range from 0 to 3, got {kind}"))),
			};
			if type_path_kind != 3 && type_argument_index != 0 {
				bail!(ClassFileError::malformed(format!("for {kind:?}, type_argument_index must be zero, got {type_argument_index}")));
			}
			path.push(kind);
		}
		Ok(TypePath { path })
	}

	fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_slice(&self.path, |w, size| w.write_usize_as_u8(size), |w, kind| {
			let (type_path_kind, type_argument_index) = match *kind {
				TypePathKind::ArrayDeeper => (0, 0),
				TypePathKind::NestedDeeper => (1, 0),
				TypePathKind::WildcardBound => (2, 0),
				TypePathKind::TypeArgument { index } => (3, index),
			};
			w.write_u8(type_path_kind)?;
			w.write_u8(type_argument_index)
		})
	}
}

impl Display for TypePath {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		for kind in &self.path {
			match kind {
				TypePathKind::ArrayDeeper => write!(f, "[")?,
				TypePathKind::NestedDeeper => write!(f, ".")?,
				TypePathKind::WildcardBound => write!(f, "*")?,
				TypePathKind::TypeArgument { index } => write!(f, "{index};")?,
			}
		}
		Ok(())
	}
}

/// An entry of the `RuntimeVisibleTypeAnnotations` or `RuntimeInvisibleTypeAnnotations` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
	pub target_type: TargetType,
	pub target_info: TargetInfo,
	pub target_path: TypePath,
	pub annotation: Annotation,
}

impl TypeAnnotation {
	pub(crate) fn read(reader: &mut ByteReader, ctx: &ReadContext) -> Result<TypeAnnotation> {
		let offset = reader.offset();
		let value = reader.read_u8()?;
		let target_type = TargetType::from_u8(value)
			.ok_or(ClassFileError::UnknownTargetType(value))?;
		if !target_type.contexts().contains(&ctx.location) {
			bail!(ClassFileError::TargetTypeContextMismatch { target_type: value, context: ctx.location.to_string() });
		}

		let target_info = TargetInfo::read(target_type.info_kind(), reader, ctx)
			.with_context(|| anyhow!("in target_info of {target_type} at offset {offset}"))?;
		let target_path = TypePath::read(reader)?;
		let annotation = Annotation::read(reader, ctx.pool)?;
		Ok(TypeAnnotation { target_type, target_info, target_path, annotation })
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		if self.target_info.kind() != self.target_type.info_kind() {
			bail!(ClassFileError::malformed(format!(
				"target type {} needs a {:?} target_info, got {:?}",
				self.target_type, self.target_type.info_kind(), self.target_info.kind()
			)));
		}
		writer.write_u8(self.target_type.value())?;
		self.target_info.write(writer)?;
		self.target_path.write(writer)?;
		self.annotation.write(writer)
	}

	pub(crate) fn read_list(reader: &mut ByteReader, ctx: &ReadContext) -> Result<Vec<TypeAnnotation>> {
		let mut index = 0;
		reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| {
				let annotation = TypeAnnotation::read(r, ctx)
					.with_context(|| anyhow!("while reading type annotation {index}"));
				index += 1;
				annotation
			}
		)
	}

	pub(crate) fn write_list(writer: &mut impl ClassWrite, annotations: &[TypeAnnotation]) -> Result<()> {
		writer.write_slice(annotations, |w, size| w.write_usize_as_u16(size), |w, annotation| annotation.write(w))
	}

	pub fn summary(&self, pool: &ConstantPool) -> Result<String> {
		let path = if self.target_path.path.is_empty() { String::new() } else { format!(" path {}", self.target_path) };
		Ok(format!("{} {}{} {}", self.target_type.name(), self.target_info.verbose(), path, self.annotation.summary(pool)?))
	}
}

/// Checks the `throws_type_index` of every `THROWS` type annotation against the number of exceptions a method declares.
pub(crate) fn check_throws(annotations: &[TypeAnnotation], exceptions: usize) -> Result<()> {
	for annotation in annotations {
		if let TargetInfo::Throws { throws_type_index } = annotation.target_info {
			if throws_type_index as usize >= exceptions {
				bail!(ClassFileError::malformed(format!(
					"throws_type_index {throws_type_index} is out of bounds for {exceptions} declared exceptions"
				)));
			}
		}
	}
	Ok(())
}
