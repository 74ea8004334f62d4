mod common;

use anyhow::{bail, Result};
use pretty_assertions::assert_eq;
use class_file::attribute::{Attribute, CodeAttribute, StackMapFrame, TargetInfo, TargetType, VerificationType};
use class_file::instruction::Operands;
use class_file::{BadIndex, ClassFile, ClassFileError, ConstantPool, PoolKind};
use common::{attribute, code_body, member, u16s, ClassBuilder, ACC_ABSTRACT, ACC_FINAL, ACC_MODULE, ACC_PUBLIC, ACC_STATIC};

/// A record-like class using most of the class, method and code level attributes.
fn declarations() -> Vec<u8> {
	let mut builder = ClassBuilder::new("com/example/Outer");
	let outer = builder.this_class;
	let inner = builder.pool.class("com/example/Outer$Inner");
	let inner_name = builder.pool.utf8("Inner");
	let anonymous = builder.pool.class("com/example/Outer$1");
	let enclosing = builder.pool.class("com/example/Enclosing");
	let enclosing_method = builder.pool.name_and_type("run", "()V");
	let host = builder.pool.class("com/example/Host");
	let sub = builder.pool.class("com/example/Sub");
	let string_class = builder.pool.class("java/lang/String");
	let non_null = builder.pool.utf8("Lcom/example/NonNull;");

	let metafactory = builder.pool.methodref("java/lang/invoke/LambdaMetafactory", "metafactory", "()Ljava/lang/invoke/CallSite;");
	let handle = builder.pool.method_handle(6, metafactory);
	let argument = builder.pool.string("argument");
	builder.pool.invoke_dynamic(0, "get", "()Ljava/util/function/Supplier;");

	let name = builder.pool.utf8("InnerClasses");
	builder.attributes.push(attribute(name, &u16s(&[
		2,
		inner, outer, inner_name, ACC_PUBLIC | ACC_STATIC,
		anonymous, 0, 0, 0,
	])));
	let name = builder.pool.utf8("EnclosingMethod");
	builder.attributes.push(attribute(name, &u16s(&[enclosing, enclosing_method])));
	let name = builder.pool.utf8("NestHost");
	builder.attributes.push(attribute(name, &u16s(&[host])));
	let name = builder.pool.utf8("NestMembers");
	builder.attributes.push(attribute(name, &u16s(&[1, inner])));
	let name = builder.pool.utf8("PermittedSubclasses");
	builder.attributes.push(attribute(name, &u16s(&[1, sub])));
	let name = builder.pool.utf8("Signature");
	let signature = builder.pool.utf8("<T:Ljava/lang/Object;>Ljava/lang/Record;");
	builder.attributes.push(attribute(name, &u16s(&[signature])));
	let name = builder.pool.utf8("SourceDebugExtension");
	builder.attributes.push(attribute(name, b"SMAP\nOuter.java\n"));
	let name = builder.pool.utf8("BootstrapMethods");
	builder.attributes.push(attribute(name, &u16s(&[1, handle, 1, argument])));

	let component_name = builder.pool.utf8("value");
	let component_descriptor = builder.pool.utf8("Ljava/lang/Object;");
	let signature_name = builder.pool.utf8("Signature");
	let component_signature = builder.pool.utf8("TT;");
	let type_annotations = builder.pool.utf8("RuntimeVisibleTypeAnnotations");
	let mut type_annotation = u16s(&[1]);
	type_annotation.extend_from_slice(&[0x13, 0]); // FIELD, empty type_path
	type_annotation.extend_from_slice(&u16s(&[non_null, 0]));
	let mut record = u16s(&[1, component_name, component_descriptor, 2]);
	record.extend_from_slice(&attribute(signature_name, &u16s(&[component_signature])));
	record.extend_from_slice(&attribute(type_annotations, &type_annotation));
	let name = builder.pool.utf8("Record");
	builder.attributes.push(attribute(name, &record));

	let count_name = builder.pool.utf8("count");
	let text_name = builder.pool.utf8("text");
	let int_descriptor = builder.pool.utf8("I");
	let string_descriptor = builder.pool.utf8("Ljava/lang/String;");

	let parameters_name = builder.pool.utf8("MethodParameters");
	let mut parameters = vec![2];
	parameters.extend_from_slice(&u16s(&[count_name, 0, 0, ACC_FINAL]));
	let parameter_annotations_name = builder.pool.utf8("RuntimeVisibleParameterAnnotations");
	let mut parameter_annotations = vec![2];
	parameter_annotations.extend_from_slice(&u16s(&[1, non_null, 0, 0]));

	let code = [
		0x1a, // 0: iload_0
		0x99, 0x00, 0x05, // 1: ifeq -> 6
		0x04, // 4: iconst_1
		0xac, // 5: ireturn
		0x03, // 6: iconst_0
		0xac, // 7: ireturn
	];
	let stack_map_name = builder.pool.utf8("StackMapTable");
	let mut stack_map = u16s(&[1]);
	stack_map.push(255);
	stack_map.extend_from_slice(&u16s(&[6, 2]));
	stack_map.extend_from_slice(&[1, 7]);
	stack_map.extend_from_slice(&u16s(&[string_class, 0]));
	let local_variables_name = builder.pool.utf8("LocalVariableTable");
	let local_variable_types_name = builder.pool.utf8("LocalVariableTypeTable");
	let code_name = builder.pool.utf8("Code");
	let body = code_body(1, 2, &code, &[], &[
		attribute(stack_map_name, &stack_map),
		attribute(local_variables_name, &u16s(&[
			2,
			0, 8, count_name, int_descriptor, 0,
			0, 8, text_name, string_descriptor, 1,
		])),
		attribute(local_variable_types_name, &u16s(&[1, 0, 8, text_name, string_descriptor, 1])),
	]);

	let method_name = builder.pool.utf8("compute");
	let method_descriptor = builder.pool.utf8("(ILjava/lang/String;)I");
	builder.methods.push(member(ACC_PUBLIC | ACC_STATIC, method_name, method_descriptor, &[
		attribute(parameters_name, &parameters),
		attribute(parameter_annotations_name, &parameter_annotations),
		attribute(code_name, &body),
	]));

	let default_name = builder.pool.utf8("AnnotationDefault");
	let forty_two = builder.pool.integer(42);
	let mut default = vec![b'I'];
	default.extend_from_slice(&u16s(&[forty_two]));
	let method_name = builder.pool.utf8("limit");
	let method_descriptor = builder.pool.utf8("()I");
	builder.methods.push(member(ACC_PUBLIC | ACC_ABSTRACT, method_name, method_descriptor, &[
		attribute(default_name, &default),
	]));

	builder.build()
}

/// A `module-info` class.
fn module_info() -> Vec<u8> {
	let mut builder = ClassBuilder::new("module-info");
	builder.access_flags = ACC_MODULE;
	builder.super_class = 0;

	let app = builder.pool.module("com.example.app");
	let java_base = builder.pool.module("java.base");
	let friend = builder.pool.module("com.example.friend");
	let api = builder.pool.package("com/example/api");
	let internal = builder.pool.package("com/example/internal");
	let service = builder.pool.class("com/example/spi/Service");
	let service_impl = builder.pool.class("com/example/internal/ServiceImpl");
	let main = builder.pool.class("com/example/Main");

	let name = builder.pool.utf8("Module");
	builder.attributes.push(attribute(name, &u16s(&[
		app, 0, 0,
		1, java_base, 0x8000, 0,
		1, api, 0, 0,
		1, internal, 0, 1, friend,
		1, service,
		1, service, 1, service_impl,
	])));
	let name = builder.pool.utf8("ModulePackages");
	builder.attributes.push(attribute(name, &u16s(&[2, api, internal])));
	let name = builder.pool.utf8("ModuleMainClass");
	builder.attributes.push(attribute(name, &u16s(&[main])));

	builder.build()
}

fn summary(class: &ClassFile, name: &str) -> Result<String> {
	let Some(attribute) = class.find_attribute(name) else { bail!("no {name} attribute") };
	attribute.summary(&class.constant_pool)
}

fn nested<'a>(code: &'a CodeAttribute, pool: &ConstantPool, name: &str) -> Option<&'a Attribute> {
	code.attributes.iter()
		.find(|info| pool.is_utf8(info.name_index, name))
		.map(|info| &info.attribute)
}

#[test]
fn declarations_round_trip() -> Result<()> {
	let bytes = declarations();
	let class = class_file::read_class(&bytes)?;
	assert_eq!(class_file::write_class(&class)?, bytes);
	Ok(())
}

#[test]
fn class_attributes() -> Result<()> {
	let class = class_file::read_class(&declarations())?;

	assert_eq!(summary(&class, "InnerClasses")?, "com/example/Outer$Inner, com/example/Outer$1");
	let Some(Attribute::InnerClasses(classes)) = class.find_attribute("InnerClasses") else { bail!("no InnerClasses") };
	assert_eq!(classes[0].inner_class_access_flags, ACC_PUBLIC | ACC_STATIC);
	assert_eq!((classes[1].outer_class_info_index, classes[1].inner_name_index), (0, 0));

	assert_eq!(summary(&class, "EnclosingMethod")?, "com/example/Enclosing.run:()V");
	assert_eq!(summary(&class, "NestHost")?, "com/example/Host");
	assert_eq!(summary(&class, "NestMembers")?, "com/example/Outer$Inner");
	assert_eq!(summary(&class, "PermittedSubclasses")?, "com/example/Sub");
	assert_eq!(summary(&class, "Signature")?, "<T:Ljava/lang/Object;>Ljava/lang/Record;");
	assert_eq!(
		class.find_attribute("SourceDebugExtension"),
		Some(&Attribute::SourceDebugExtension(b"SMAP\nOuter.java\n".to_vec()))
	);
	assert_eq!(
		summary(&class, "BootstrapMethods")?,
		"REF_invokeStatic method java/lang/invoke/LambdaMetafactory.metafactory:()Ljava/lang/invoke/CallSite; [string \"argument\"]"
	);
	Ok(())
}

#[test]
fn record_component_attributes() -> Result<()> {
	let class = class_file::read_class(&declarations())?;
	let pool = &class.constant_pool;

	assert_eq!(summary(&class, "Record")?, "Ljava/lang/Object; value");
	let Some(Attribute::Record(components)) = class.find_attribute("Record") else { bail!("no Record") };
	let attributes = &components[0].attributes;
	assert_eq!(attributes.len(), 2);
	assert_eq!(attributes[0].attribute.summary(pool)?, "TT;");

	let Attribute::RuntimeVisibleTypeAnnotations(annotations) = &attributes[1].attribute else {
		bail!("expected type annotations, got {:?}", attributes[1].attribute)
	};
	assert_eq!(annotations.len(), 1);
	assert_eq!(annotations[0].target_type, TargetType::Field);
	assert_eq!(annotations[0].target_info, TargetInfo::Empty);
	assert_eq!(annotations[0].annotation.summary(pool)?, "@Lcom/example/NonNull;()");
	Ok(())
}

#[test]
fn method_attributes() -> Result<()> {
	let class = class_file::read_class(&declarations())?;
	let pool = &class.constant_pool;

	let Some(compute) = class.find_method("compute", "(ILjava/lang/String;)I") else { bail!("method not found") };
	let Some(parameters) = compute.find_attribute("MethodParameters") else { bail!("no MethodParameters") };
	assert_eq!(parameters.summary(pool)?, "count, <unnamed>");

	let Some(Attribute::RuntimeVisibleParameterAnnotations(annotations)) = compute.find_attribute("RuntimeVisibleParameterAnnotations") else {
		bail!("no RuntimeVisibleParameterAnnotations")
	};
	assert_eq!(annotations.len(), 2);
	assert_eq!(annotations[0].len(), 1);
	assert!(annotations[1].is_empty());

	let Some(limit) = class.find_method("limit", "()I") else { bail!("method not found") };
	let Some(default) = limit.find_attribute("AnnotationDefault") else { bail!("no AnnotationDefault") };
	assert_eq!(default.summary(pool)?, "int 42");
	Ok(())
}

#[test]
fn code_attributes() -> Result<()> {
	let class = class_file::read_class(&declarations())?;
	let pool = &class.constant_pool;

	let Some(compute) = class.find_method("compute", "(ILjava/lang/String;)I") else { bail!("method not found") };
	let Some(Attribute::Code(code)) = compute.find_attribute("Code") else { bail!("no Code") };

	let Some(Attribute::StackMapTable(frames)) = nested(code, pool, "StackMapTable") else { bail!("no StackMapTable") };
	let [StackMapFrame::Full { offset_delta: 6, locals, stack }] = frames.as_slice() else { bail!("unexpected frames {frames:?}") };
	assert!(stack.is_empty());
	let [VerificationType::Integer, VerificationType::Object { cpool_index }] = locals.as_slice() else { bail!("unexpected locals {locals:?}") };
	assert_eq!(pool.get_class_name(*cpool_index)?.as_str_lossy(), "java/lang/String");

	let Some(variables) = nested(code, pool, "LocalVariableTable") else { bail!("no LocalVariableTable") };
	assert_eq!(variables.summary(pool)?, "0 count I [0, 8), 1 text Ljava/lang/String; [0, 8)");
	let Some(types) = nested(code, pool, "LocalVariableTypeTable") else { bail!("no LocalVariableTypeTable") };
	assert_eq!(types.summary(pool)?, "1 text Ljava/lang/String; [0, 8)");
	Ok(())
}

#[test]
fn module_info_round_trip() -> Result<()> {
	let bytes = module_info();
	let class = class_file::read_class(&bytes)?;
	assert_eq!(class_file::write_class(&class)?, bytes);
	assert_eq!(class.super_class_name()?, None);

	assert_eq!(summary(&class, "Module")?, "module com.example.app (1 requires, 1 exports, 1 opens, 1 uses, 1 provides)");
	assert_eq!(summary(&class, "ModulePackages")?, "com/example/api, com/example/internal");
	assert_eq!(summary(&class, "ModuleMainClass")?, "com/example/Main");

	let Some(Attribute::Module(module)) = class.find_attribute("Module") else { bail!("no Module") };
	let pool = &class.constant_pool;
	assert_eq!(pool.get_module_name(module.requires[0].requires_index)?.as_str_lossy(), "java.base");
	assert!(module.exports[0].to.is_empty());
	assert_eq!(pool.get_module_name(module.opens[0].to[0])?.as_str_lossy(), "com.example.friend");
	assert_eq!(pool.get_class_name(module.provides[0].provides_with[0])?.as_str_lossy(), "com/example/internal/ServiceImpl");
	Ok(())
}

#[test]
fn wide_increment_and_lookupswitch() -> Result<()> {
	let mut builder = ClassBuilder::new("com/example/Loop");
	let stack_map = builder.pool.utf8("StackMapTable");
	let code = [
		0x1a, // 0: iload_0
		0xab, 0x00, 0x00, // 1: lookupswitch, two bytes of padding
		0x00, 0x00, 0x00, 0x19, // default -> 26
		0x00, 0x00, 0x00, 0x01, // npairs
		0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x13, // 5 -> 20
		0xc4, 0x84, 0x01, 0x00, 0x00, 0x02, // 20: wide iinc 256 2
		0xb1, // 26: return
	];
	// a full frame at 20, then a same frame at 26
	let mut frames = u16s(&[2]);
	frames.push(255);
	frames.extend_from_slice(&u16s(&[20, 1]));
	frames.push(1);
	frames.extend_from_slice(&u16s(&[0]));
	frames.push(5);
	builder.method_with_code("spin", "(I)V", &code, &[attribute(stack_map, &frames)]);

	let bytes = builder.build();
	let class = class_file::read_class(&bytes)?;
	assert_eq!(class_file::write_class(&class)?, bytes);

	let Some(method) = class.find_method("spin", "(I)V") else { bail!("method not found") };
	let Some(Attribute::Code(code)) = method.find_attribute("Code") else { bail!("no Code") };
	let offsets: Vec<u32> = code.instructions.iter().map(|instruction| instruction.offset).collect();
	assert_eq!(offsets, vec![0, 1, 20, 26]);
	assert_eq!(code.instructions[1].operands, Operands::LookupSwitch { default: 25, pairs: vec![(5, 19)] });
	assert_eq!(code.instructions[1].branch_targets(), vec![26, 20]);
	assert_eq!(code.instructions[2].operands, Operands::Increment { index: 256, constant: 2, wide: true });

	let Some(Attribute::StackMapTable(frames)) = nested(code, &class.constant_pool, "StackMapTable") else { bail!("no StackMapTable") };
	assert_eq!(frames, &vec![
		StackMapFrame::Full { offset_delta: 20, locals: vec![VerificationType::Integer], stack: vec![] },
		StackMapFrame::Same { offset_delta: 5 },
	]);
	Ok(())
}

/// A class with a single `run` method, `[iconst_0, ifeq -> 4, return]`, carrying the given code attribute.
fn class_with_code_attribute(name: &str, body: &[u8]) -> Vec<u8> {
	let mut builder = ClassBuilder::new("com/example/Broken");
	let name = builder.pool.utf8(name);
	builder.method_with_code("run", "()V", &[0x03, 0x99, 0x00, 0x03, 0xb1], &[attribute(name, body)]);
	builder.build()
}

#[test]
fn local_variable_inside_instruction() {
	let mut builder = ClassBuilder::new("com/example/Broken");
	let variable_name = builder.pool.utf8("x");
	let descriptor = builder.pool.utf8("I");
	let name = builder.pool.utf8("LocalVariableTable");
	// starts at 2, inside the ifeq
	builder.method_with_code("run", "()V", &[0x03, 0x99, 0x00, 0x03, 0xb1], &[
		attribute(name, &u16s(&[1, 2, 3, variable_name, descriptor, 0])),
	]);

	let error = class_file::read_class(&builder.build()).unwrap_err();
	assert!(matches!(ClassFileError::of(&error), Some(ClassFileError::MalformedAttribute(_))), "{error:?}");
}

#[test]
fn reserved_stack_map_frame() {
	let error = class_file::read_class(&class_with_code_attribute("StackMapTable", &[0, 1, 200])).unwrap_err();
	assert!(matches!(ClassFileError::of(&error), Some(ClassFileError::MalformedAttribute(_))), "{error:?}");
}

#[test]
fn stack_map_frame_inside_instruction() {
	// a same frame at offset 2
	let error = class_file::read_class(&class_with_code_attribute("StackMapTable", &[0, 1, 2])).unwrap_err();
	assert!(matches!(ClassFileError::of(&error), Some(ClassFileError::MalformedAttribute(_))), "{error:?}");
}

#[test]
fn module_packages_must_be_packages() {
	let mut builder = ClassBuilder::new("module-info");
	builder.access_flags = ACC_MODULE;
	let this_class = builder.this_class;
	let name = builder.pool.utf8("ModulePackages");
	builder.attributes.push(attribute(name, &u16s(&[1, this_class])));

	let error = class_file::read_class(&builder.build()).unwrap_err();
	assert_eq!(ClassFileError::of(&error), Some(&ClassFileError::InvalidConstantPoolIndex {
		index: this_class,
		expected: vec![PoolKind::Package],
		problem: BadIndex::WrongKind { found: PoolKind::Class },
	}));
}

#[test]
fn bootstrap_argument_must_be_loadable() {
	let mut builder = ClassBuilder::new("com/example/Broken");
	let metafactory = builder.pool.methodref("com/example/Factory", "make", "()V");
	let handle = builder.pool.method_handle(6, metafactory);
	let text = builder.pool.utf8("not loadable");
	let name = builder.pool.utf8("BootstrapMethods");
	builder.attributes.push(attribute(name, &u16s(&[1, handle, 1, text])));

	let error = class_file::read_class(&builder.build()).unwrap_err();
	assert!(matches!(
		ClassFileError::of(&error),
		Some(ClassFileError::InvalidConstantPoolIndex { problem: BadIndex::WrongKind { found: PoolKind::Utf8 }, .. })
	), "{error:?}");
}
