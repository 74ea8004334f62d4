use anyhow::{anyhow, bail, Context, Result};
use crate::{ByteReader, ClassRead, ClassWrite};
use crate::error::ClassFileError;
use crate::pool::{ConstantPool, PoolKind};

/// How deep annotations and arrays may be nested inside element values.
const MAX_NESTING: usize = 256;

/// A single annotation, as found in the annotation attributes and inside element values.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
	/// Refers to a field descriptor, like `Ljava/lang/Deprecated;`.
	pub type_index: u16,
	pub element_value_pairs: Vec<ElementValuePair>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementValuePair {
	pub element_name_index: u16,
	pub value: ElementValue,
}

/// The value of an annotation element.
///
/// The primitive variants and `String` hold the index of the constant pool entry that stores the value.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
	Byte(u16),
	Char(u16),
	Double(u16),
	Float(u16),
	Int(u16),
	Long(u16),
	Short(u16),
	Boolean(u16),
	String(u16),
	Enum {
		type_name_index: u16,
		const_name_index: u16,
	},
	/// Refers to a return descriptor, like `V` or `Ljava/lang/Object;`.
	Class(u16),
	Annotation(Annotation),
	Array(Vec<ElementValue>),
}

impl Annotation {
	pub(crate) fn read(reader: &mut ByteReader, pool: &ConstantPool) -> Result<Annotation> {
		Annotation::read_nested(reader, pool, 0)
	}

	fn read_nested(reader: &mut ByteReader, pool: &ConstantPool, depth: usize) -> Result<Annotation> {
		let type_index = reader.read_u16()?;
		let type_name = pool.get_utf8(type_index)
			.context("while reading the type of an annotation")?;
		let element_value_pairs = reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| {
				let element_name_index = r.read_u16()?;
				pool.resolve(element_name_index, PoolKind::Utf8)?;
				let value = ElementValue::read(r, pool, depth)?;
				Ok(ElementValuePair { element_name_index, value })
			}
		).with_context(|| anyhow!("in annotation {:?}", type_name.as_str_lossy()))?;
		Ok(Annotation { type_index, element_value_pairs })
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.type_index)?;
		writer.write_slice(&self.element_value_pairs, |w, size| w.write_usize_as_u16(size), |w, pair| {
			w.write_u16(pair.element_name_index)?;
			pair.value.write(w)
		})
	}

	/// Reads a `u16` count followed by that many annotations.
	pub(crate) fn read_list(reader: &mut ByteReader, pool: &ConstantPool) -> Result<Vec<Annotation>> {
		let mut index = 0;
		reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| {
				let annotation = Annotation::read(r, pool)
					.with_context(|| anyhow!("while reading annotation {index}"));
				index += 1;
				annotation
			}
		)
	}

	pub(crate) fn write_list(writer: &mut impl ClassWrite, annotations: &[Annotation]) -> Result<()> {
		writer.write_slice(annotations, |w, size| w.write_usize_as_u16(size), |w, annotation| annotation.write(w))
	}

	pub fn summary(&self, pool: &ConstantPool) -> Result<String> {
		let type_name = pool.get_utf8(self.type_index)?;
		let mut pairs = Vec::with_capacity(self.element_value_pairs.len());
		for pair in &self.element_value_pairs {
			let name = pool.get_utf8(pair.element_name_index)?;
			pairs.push(format!("{}={}", name.as_str_lossy(), pair.value.summary(pool)?));
		}
		Ok(format!("@{}({})", type_name.as_str_lossy(), pairs.join(", ")))
	}
}

impl ElementValue {
	/// Reads the `element_value` of an `AnnotationDefault` attribute.
	pub(crate) fn read_default(reader: &mut ByteReader, pool: &ConstantPool) -> Result<ElementValue> {
		ElementValue::read(reader, pool, 0)
	}

	fn read(reader: &mut ByteReader, pool: &ConstantPool, depth: usize) -> Result<ElementValue> {
		if depth >= MAX_NESTING {
			bail!(ClassFileError::malformed(format!("element values nested deeper than {MAX_NESTING} levels")));
		}

		let offset = reader.offset();
		let tag = reader.read_u8()?;
		let constant = |reader: &mut ByteReader, kind: PoolKind| -> Result<u16> {
			let index = reader.read_u16()?;
			pool.resolve(index, kind)
				.with_context(|| anyhow!("in element value with tag {:?} at offset {offset}", tag as char))?;
			Ok(index)
		};
		Ok(match tag {
			b'B' => ElementValue::Byte(constant(reader, PoolKind::Integer)?),
			b'C' => ElementValue::Char(constant(reader, PoolKind::Integer)?),
			b'D' => ElementValue::Double(constant(reader, PoolKind::Double)?),
			b'F' => ElementValue::Float(constant(reader, PoolKind::Float)?),
			b'I' => ElementValue::Int(constant(reader, PoolKind::Integer)?),
			b'J' => ElementValue::Long(constant(reader, PoolKind::Long)?),
			b'S' => ElementValue::Short(constant(reader, PoolKind::Integer)?),
			b'Z' => ElementValue::Boolean(constant(reader, PoolKind::Integer)?),
			b's' => ElementValue::String(constant(reader, PoolKind::Utf8)?),
			b'e' => {
				let type_name_index = constant(reader, PoolKind::Utf8)?;
				let const_name_index = constant(reader, PoolKind::Utf8)?;
				ElementValue::Enum { type_name_index, const_name_index }
			},
			b'c' => ElementValue::Class(constant(reader, PoolKind::Utf8)?),
			b'@' => ElementValue::Annotation(Annotation::read_nested(reader, pool, depth + 1)?),
			b'[' => {
				let values = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| ElementValue::read(r, pool, depth + 1)
				)?;
				ElementValue::Array(values)
			},
			tag => bail!(ClassFileError::malformed(format!("unknown element_value tag {:?} at offset {offset}", tag as char))),
		})
	}

	pub fn tag(&self) -> u8 {
		match self {
			ElementValue::Byte(_) => b'B',
			ElementValue::Char(_) => b'C',
			ElementValue::Double(_) => b'D',
			ElementValue::Float(_) => b'F',
			ElementValue::Int(_) => b'I',
			ElementValue::Long(_) => b'J',
			ElementValue::Short(_) => b'S',
			ElementValue::Boolean(_) => b'Z',
			ElementValue::String(_) => b's',
			ElementValue::Enum { .. } => b'e',
			ElementValue::Class(_) => b'c',
			ElementValue::Annotation(_) => b'@',
			ElementValue::Array(_) => b'[',
		}
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u8(self.tag())?;
		match self {
			&ElementValue::Byte(index) |
			&ElementValue::Char(index) |
			&ElementValue::Double(index) |
			&ElementValue::Float(index) |
			&ElementValue::Int(index) |
			&ElementValue::Long(index) |
			&ElementValue::Short(index) |
			&ElementValue::Boolean(index) |
			&ElementValue::String(index) |
			&ElementValue::Class(index) => writer.write_u16(index),
			&ElementValue::Enum { type_name_index, const_name_index } => {
				writer.write_u16(type_name_index)?;
				writer.write_u16(const_name_index)
			},
			ElementValue::Annotation(annotation) => annotation.write(writer),
			ElementValue::Array(values) => {
				writer.write_slice(values, |w, size| w.write_usize_as_u16(size), |w, value| value.write(w))
			},
		}
	}

	pub fn summary(&self, pool: &ConstantPool) -> Result<String> {
		Ok(match self {
			&ElementValue::Byte(index) |
			&ElementValue::Char(index) |
			&ElementValue::Double(index) |
			&ElementValue::Float(index) |
			&ElementValue::Int(index) |
			&ElementValue::Long(index) |
			&ElementValue::Short(index) |
			&ElementValue::Boolean(index) => pool.describe(index)?,
			&ElementValue::String(index) => format!("{:?}", pool.get_utf8(index)?.as_str_lossy()),
			&ElementValue::Class(index) => format!("{}.class", pool.get_utf8(index)?.as_str_lossy()),
			&ElementValue::Enum { type_name_index, const_name_index } => {
				format!("{}.{}", pool.get_utf8(type_name_index)?.as_str_lossy(), pool.get_utf8(const_name_index)?.as_str_lossy())
			},
			ElementValue::Annotation(annotation) => annotation.summary(pool)?,
			ElementValue::Array(values) => {
				let values: Result<Vec<String>> = values.iter().map(|value| value.summary(pool)).collect();
				format!("{{{}}}", values?.join(", "))
			},
		})
	}
}
