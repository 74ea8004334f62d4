mod common;

use anyhow::Result;
use pretty_assertions::assert_eq;
use class_file::{BadIndex, ClassFileError, ReadOptions};
use common::{attribute, ClassBuilder};

fn kind(bytes: &[u8]) -> ClassFileError {
	match class_file::read_class(bytes) {
		Ok(class) => panic!("expected an error, got {class:?}"),
		Err(error) => match ClassFileError::of(&error) {
			Some(kind) => kind.clone(),
			None => panic!("error without a kind: {error:#}"),
		},
	}
}

#[test]
fn invalid_magic() {
	let mut bytes = ClassBuilder::new("A").build();
	bytes[3] = 0xBF;
	assert_eq!(kind(&bytes), ClassFileError::InvalidMagic(0xCAFEBABF));
}

#[test]
fn truncated_header() {
	let bytes = ClassBuilder::new("A").build();
	assert_eq!(kind(&bytes[..9]), ClassFileError::Truncated { offset: 8, needed: 2, available: 1 });
}

#[test]
fn truncated_at_end() {
	let bytes = ClassBuilder::new("A").build();
	assert!(matches!(kind(&bytes[..bytes.len() - 1]), ClassFileError::Truncated { .. }));
}

#[test]
fn this_class_of_wrong_kind() {
	let mut builder = ClassBuilder::new("A");
	builder.this_class = builder.pool.utf8("A");
	assert!(matches!(
		kind(&builder.build()),
		ClassFileError::InvalidConstantPoolIndex { problem: BadIndex::WrongKind { .. }, .. }
	));
}

#[test]
fn this_class_zero_or_out_of_range() {
	let mut builder = ClassBuilder::new("A");
	builder.this_class = 0;
	assert!(matches!(
		kind(&builder.build()),
		ClassFileError::InvalidConstantPoolIndex { index: 0, problem: BadIndex::Zero, .. }
	));

	builder.this_class = 1000;
	assert!(matches!(
		kind(&builder.build()),
		ClassFileError::InvalidConstantPoolIndex { index: 1000, problem: BadIndex::OutOfRange { .. }, .. }
	));
}

#[test]
fn reference_to_second_slot_of_long() {
	let mut builder = ClassBuilder::new("A");
	let long = builder.pool.long(1);
	let constant_value = builder.pool.utf8("ConstantValue");
	let name = builder.pool.utf8("value");
	let descriptor = builder.pool.utf8("J");
	builder.fields.push(common::member(0, name, descriptor, &[
		attribute(constant_value, &(long + 1).to_be_bytes()),
	]));

	assert!(matches!(
		kind(&builder.build()),
		ClassFileError::InvalidConstantPoolIndex { problem: BadIndex::Tombstone, .. }
	));
}

#[test]
fn attribute_shorter_than_its_body() {
	let mut builder = ClassBuilder::new("A");
	let source_file = builder.pool.utf8("SourceFile");
	let file_name = builder.pool.utf8("A.java");
	let mut bytes = attribute(source_file, &file_name.to_be_bytes());
	bytes[5] = 1; // declared length 1 instead of 2
	builder.attributes.push(bytes);

	assert_eq!(kind(&builder.build()), ClassFileError::LengthMismatch {
		attribute: "SourceFile".to_owned(),
		declared: 1,
		actual: 2,
	});
}

#[test]
fn attribute_longer_than_its_body() {
	let mut builder = ClassBuilder::new("A");
	let source_file = builder.pool.utf8("SourceFile");
	let file_name = builder.pool.utf8("A.java");
	let [high, low] = file_name.to_be_bytes();
	builder.attributes.push(attribute(source_file, &[high, low, 0]));

	assert_eq!(kind(&builder.build()), ClassFileError::LengthMismatch {
		attribute: "SourceFile".to_owned(),
		declared: 3,
		actual: 2,
	});
}

#[test]
fn invalid_opcode() {
	let mut builder = ClassBuilder::new("A");
	builder.method_with_code("run", "()V", &[0x00, 0xcb], &[]);
	assert_eq!(kind(&builder.build()), ClassFileError::InvalidOpcode { opcode: 0xcb, offset: 1 });
}

#[test]
fn instruction_past_end_of_code() {
	let mut builder = ClassBuilder::new("A");
	// sipush needs two operand bytes
	builder.method_with_code("run", "()V", &[0x11, 0x01], &[]);
	assert!(matches!(kind(&builder.build()), ClassFileError::MalformedAttribute(_)));
}

#[test]
fn bad_switch_padding() {
	let mut builder = ClassBuilder::new("A");
	let mut code = vec![0xaa, 0x00, 0x01, 0x00]; // tableswitch at 0, padding not zero
	code.extend_from_slice(&[0, 0, 0, 16, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 16, 0xb1]);
	builder.method_with_code("run", "()V", &code, &[]);
	assert!(matches!(kind(&builder.build()), ClassFileError::MalformedAttribute(_)));
}

#[test]
fn branch_into_the_middle_of_an_instruction() -> Result<()> {
	let mut builder = ClassBuilder::new("A");
	// ifeq -> 2, which is an operand byte of the ifeq itself
	builder.method_with_code("run", "()V", &[0x99, 0x00, 0x02, 0xb1], &[]);
	let bytes = builder.build();
	assert!(matches!(kind(&bytes), ClassFileError::MalformedAttribute(_)));

	let options = ReadOptions { verify_code_offsets: false };
	let class = class_file::read_class_with(&bytes, &options)?;
	assert_eq!(class_file::write_class(&class)?, bytes);
	Ok(())
}

#[test]
fn line_number_not_on_instruction() {
	let mut builder = ClassBuilder::new("A");
	let line_numbers = builder.pool.utf8("LineNumberTable");
	builder.method_with_code("run", "()V", &[0x10, 0x05, 0x57, 0xb1], &[
		attribute(line_numbers, &[0, 1, 0, 1, 0, 7]),
	]);
	assert!(matches!(kind(&builder.build()), ClassFileError::MalformedAttribute(_)));
}

#[test]
fn bootstrap_method_missing() {
	let mut builder = ClassBuilder::new("A");
	builder.pool.invoke_dynamic(0, "run", "()Ljava/lang/Runnable;");
	assert_eq!(kind(&builder.build()), ClassFileError::BootstrapMethodIndexOutOfBounds { index: 0, count: 0 });
}

#[test]
fn trailing_data() {
	let mut bytes = ClassBuilder::new("A").build();
	bytes.push(0);
	assert!(matches!(kind(&bytes), ClassFileError::MalformedAttribute(_)));
}

#[test]
fn error_names_the_path() {
	let mut builder = ClassBuilder::new("com/example/Broken");
	builder.method_with_code("run", "()V", &[0x00, 0xcb], &[]);
	let error = class_file::read_class(&builder.build()).unwrap_err();

	let message = format!("{error:#}");
	assert!(message.contains("com/example/Broken"), "{message}");
	assert!(message.contains("run:()V"), "{message}");
	assert!(message.contains("Code"), "{message}");
	assert!(message.contains("code offset 1"), "{message}");
}
