use std::io::Write;
use anyhow::{anyhow, Context, Result};
use class_file::access::{self, AccessContext};
use class_file::attribute::{Attribute, AttributeInfo};
use class_file::{ClassFile, ConstantPool, MemberInfo};

/// Prints everything about a class, indenting nested attributes.
pub(crate) fn print(out: &mut impl Write, class: &ClassFile) -> Result<()> {
	let pool = &class.constant_pool;

	writeln!(out, "class {}", class.class_name()?.as_str_lossy())?;
	writeln!(out, "  version: {}.{}", class.major_version, class.minor_version)?;
	writeln!(out, "  access: {}", access::describe(class.access_flags, AccessContext::Class))?;
	if let Some(super_class) = class.super_class_name()? {
		writeln!(out, "  extends: {}", super_class.as_str_lossy())?;
	}
	for interface in class.interface_names()? {
		writeln!(out, "  implements: {}", interface.as_str_lossy())?;
	}

	writeln!(out, "constant pool ({} slots):", pool.count())?;
	for (index, _) in pool.entries() {
		writeln!(out, "  #{index} = {}", pool.describe(index)?)?;
	}

	for field in &class.fields {
		print_member(out, "field", AccessContext::Field, field, pool)?;
	}
	for method in &class.methods {
		print_member(out, "method", AccessContext::Method, method, pool)?;
	}

	writeln!(out, "attributes:")?;
	print_attributes(out, &class.attributes, pool, 1)
}

fn print_member(out: &mut impl Write, kind: &str, context: AccessContext, member: &MemberInfo, pool: &ConstantPool) -> Result<()> {
	let name = member.name(pool)?.as_str_lossy();
	let descriptor = member.descriptor(pool)?.as_str_lossy();
	writeln!(out, "{kind} {name}:{descriptor}")?;
	writeln!(out, "  access: {}", access::describe(member.access_flags, context))?;
	print_attributes(out, &member.attributes, pool, 1)
		.with_context(|| anyhow!("in {kind} {name}:{descriptor}"))
}

fn print_attributes(out: &mut impl Write, attributes: &[AttributeInfo], pool: &ConstantPool, depth: usize) -> Result<()> {
	let indent = "  ".repeat(depth);
	for info in attributes {
		writeln!(out, "{indent}{}: {}", info.name(pool)?, info.attribute.summary(pool)?)?;
		if let Attribute::Code(code) = &info.attribute {
			for line in code.disassemble(pool)? {
				writeln!(out, "{indent}  {line}")?;
			}
			for entry in &code.exception_table {
				let catch_type = match entry.catch_type {
					0 => "any".into(),
					index => pool.get_class_name(index)?.as_str_lossy(),
				};
				writeln!(out, "{indent}  handler [{}, {}) -> {} for {catch_type}", entry.start_pc, entry.end_pc, entry.handler_pc)?;
			}
			print_attributes(out, &code.attributes, pool, depth + 1)?;
		}
	}
	Ok(())
}
