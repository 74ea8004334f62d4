//! A small builder for class files, so tests don't need binary fixtures.
#![allow(dead_code)]

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_MODULE: u16 = 0x8000;

fn u16_bytes(value: u16) -> [u8; 2] {
	value.to_be_bytes()
}

/// Builds up the constant pool, handing out the indices of the added entries.
#[derive(Debug, Default)]
pub struct PoolBuilder {
	bytes: Vec<u8>,
	next: u16,
}

impl PoolBuilder {
	fn push(&mut self, tag: u8, data: &[u8], slots: u16) -> u16 {
		if self.next == 0 {
			self.next = 1;
		}
		let index = self.next;
		self.bytes.push(tag);
		self.bytes.extend_from_slice(data);
		self.next += slots;
		index
	}

	pub fn utf8(&mut self, string: &str) -> u16 {
		let mut data = u16_bytes(string.len() as u16).to_vec();
		data.extend_from_slice(string.as_bytes());
		self.push(1, &data, 1)
	}

	pub fn integer(&mut self, value: i32) -> u16 {
		self.push(3, &value.to_be_bytes(), 1)
	}

	pub fn long(&mut self, value: i64) -> u16 {
		self.push(5, &value.to_be_bytes(), 2)
	}

	pub fn class(&mut self, name: &str) -> u16 {
		let name_index = self.utf8(name);
		self.push(7, &u16_bytes(name_index), 1)
	}

	pub fn string(&mut self, string: &str) -> u16 {
		let string_index = self.utf8(string);
		self.push(8, &u16_bytes(string_index), 1)
	}

	pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
		let name_index = self.utf8(name);
		let descriptor_index = self.utf8(descriptor);
		let mut data = u16_bytes(name_index).to_vec();
		data.extend_from_slice(&u16_bytes(descriptor_index));
		self.push(12, &data, 1)
	}

	pub fn methodref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
		let class_index = self.class(class);
		let name_and_type_index = self.name_and_type(name, descriptor);
		let mut data = u16_bytes(class_index).to_vec();
		data.extend_from_slice(&u16_bytes(name_and_type_index));
		self.push(10, &data, 1)
	}

	pub fn invoke_dynamic(&mut self, bootstrap_method_attr_index: u16, name: &str, descriptor: &str) -> u16 {
		let name_and_type_index = self.name_and_type(name, descriptor);
		let mut data = u16_bytes(bootstrap_method_attr_index).to_vec();
		data.extend_from_slice(&u16_bytes(name_and_type_index));
		self.push(18, &data, 1)
	}

	pub fn method_handle(&mut self, reference_kind: u8, reference_index: u16) -> u16 {
		let mut data = vec![reference_kind];
		data.extend_from_slice(&u16_bytes(reference_index));
		self.push(15, &data, 1)
	}

	pub fn module(&mut self, name: &str) -> u16 {
		let name_index = self.utf8(name);
		self.push(19, &u16_bytes(name_index), 1)
	}

	pub fn package(&mut self, name: &str) -> u16 {
		let name_index = self.utf8(name);
		self.push(20, &u16_bytes(name_index), 1)
	}

	/// The `constant_pool_count` and the entries, as they appear in the class file.
	fn encode(&self) -> Vec<u8> {
		let mut out = u16_bytes(self.next.max(1)).to_vec();
		out.extend_from_slice(&self.bytes);
		out
	}
}

/// Big endian `u16` values back to back, for attribute bodies.
pub fn u16s(values: &[u16]) -> Vec<u8> {
	values.iter().flat_map(|value| value.to_be_bytes()).collect()
}

/// Encodes an attribute with the given name and body.
pub fn attribute(name_index: u16, body: &[u8]) -> Vec<u8> {
	let mut out = u16_bytes(name_index).to_vec();
	out.extend_from_slice(&(body.len() as u32).to_be_bytes());
	out.extend_from_slice(body);
	out
}

/// Encodes an attribute list, with its `u16` count.
pub fn attributes(attributes: &[Vec<u8>]) -> Vec<u8> {
	let mut out = u16_bytes(attributes.len() as u16).to_vec();
	for attribute in attributes {
		out.extend_from_slice(attribute);
	}
	out
}

/// Encodes the body of a `Code` attribute.
pub fn code_body(max_stack: u16, max_locals: u16, code: &[u8], exception_table: &[[u16; 4]], nested: &[Vec<u8>]) -> Vec<u8> {
	let mut out = u16_bytes(max_stack).to_vec();
	out.extend_from_slice(&u16_bytes(max_locals));
	out.extend_from_slice(&(code.len() as u32).to_be_bytes());
	out.extend_from_slice(code);
	out.extend_from_slice(&u16_bytes(exception_table.len() as u16));
	for row in exception_table {
		for value in row {
			out.extend_from_slice(&u16_bytes(*value));
		}
	}
	out.extend_from_slice(&attributes(nested));
	out
}

/// Encodes a field or a method.
pub fn member(access_flags: u16, name_index: u16, descriptor_index: u16, member_attributes: &[Vec<u8>]) -> Vec<u8> {
	let mut out = u16_bytes(access_flags).to_vec();
	out.extend_from_slice(&u16_bytes(name_index));
	out.extend_from_slice(&u16_bytes(descriptor_index));
	out.extend_from_slice(&attributes(member_attributes));
	out
}

#[derive(Debug, Default)]
pub struct ClassBuilder {
	pub pool: PoolBuilder,
	pub access_flags: u16,
	pub this_class: u16,
	pub super_class: u16,
	pub interfaces: Vec<u16>,
	pub fields: Vec<Vec<u8>>,
	pub methods: Vec<Vec<u8>>,
	pub attributes: Vec<Vec<u8>>,
}

impl ClassBuilder {
	/// A public class extending `java/lang/Object`.
	pub fn new(name: &str) -> ClassBuilder {
		let mut builder = ClassBuilder::default();
		builder.access_flags = ACC_PUBLIC | ACC_SUPER;
		builder.this_class = builder.pool.class(name);
		builder.super_class = builder.pool.class("java/lang/Object");
		builder
	}

	pub fn build(&self) -> Vec<u8> {
		let mut out = 0xCAFEBABEu32.to_be_bytes().to_vec();
		out.extend_from_slice(&u16_bytes(0)); // minor
		out.extend_from_slice(&u16_bytes(61)); // major, Java 17
		out.extend_from_slice(&self.pool.encode());
		out.extend_from_slice(&u16_bytes(self.access_flags));
		out.extend_from_slice(&u16_bytes(self.this_class));
		out.extend_from_slice(&u16_bytes(self.super_class));
		out.extend_from_slice(&u16_bytes(self.interfaces.len() as u16));
		for interface in &self.interfaces {
			out.extend_from_slice(&u16_bytes(*interface));
		}
		out.extend_from_slice(&u16_bytes(self.fields.len() as u16));
		for field in &self.fields {
			out.extend_from_slice(field);
		}
		out.extend_from_slice(&u16_bytes(self.methods.len() as u16));
		for method in &self.methods {
			out.extend_from_slice(method);
		}
		out.extend_from_slice(&attributes(&self.attributes));
		out
	}

	/// Adds a method with a `Code` attribute holding the given code and nested attributes.
	pub fn method_with_code(&mut self, name: &str, descriptor: &str, code: &[u8], nested: &[Vec<u8>]) {
		let name_index = self.pool.utf8(name);
		let descriptor_index = self.pool.utf8(descriptor);
		let code_name = self.pool.utf8("Code");
		let body = code_body(2, 2, code, &[], nested);
		self.methods.push(member(ACC_PUBLIC | ACC_STATIC, name_index, descriptor_index, &[attribute(code_name, &body)]));
	}
}
