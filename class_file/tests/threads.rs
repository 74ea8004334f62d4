mod common;

use anyhow::Result;
use pretty_assertions::assert_eq;
use class_file::ClassFile;
use common::{attribute, ClassBuilder};

fn class(index: usize) -> Vec<u8> {
	let mut builder = ClassBuilder::new(&format!("com/example/Class{index}"));
	let line_numbers = builder.pool.utf8("LineNumberTable");
	builder.method_with_code("run", "()V", &[0x04, 0x57, 0xb1], &[
		attribute(line_numbers, &[0, 1, 0, 0, 0, index as u8]),
	]);
	builder.build()
}

#[test]
fn independent_decodes_on_many_threads() -> Result<()> {
	let inputs: Vec<Vec<u8>> = (0..64).map(class).collect();

	let results: Vec<Result<(String, Vec<u8>)>> = std::thread::scope(|scope| {
		let handles: Vec<_> = inputs.iter()
			.map(|bytes| scope.spawn(move || -> Result<(String, Vec<u8>)> {
				let class = class_file::read_class(bytes)?;
				let name = class.class_name()?.as_str_lossy().into_owned();
				Ok((name, class_file::write_class(&class)?))
			}))
			.collect();
		handles.into_iter()
			.map(|handle| handle.join().unwrap_or_else(|_| panic!("decoding thread panicked")))
			.collect()
	});

	for (index, (result, bytes)) in results.into_iter().zip(&inputs).enumerate() {
		let (name, written) = result?;
		assert_eq!(name, format!("com/example/Class{index}"));
		assert_eq!(&written, bytes);
	}
	Ok(())
}

#[test]
fn decoded_classes_are_shared_between_threads() -> Result<()> {
	let bytes = class(7);
	let decoded = class_file::read_class(&bytes)?;
	let shared: &ClassFile = &decoded;

	let written: Vec<Vec<u8>> = std::thread::scope(|scope| {
		let handles: Vec<_> = (0..4).map(|_| scope.spawn(move || class_file::write_class(shared))).collect();
		handles.into_iter()
			.map(|handle| handle.join().unwrap_or_else(|_| panic!("encoding thread panicked")))
			.collect::<Result<Vec<_>>>()
	})?;

	for written in written {
		assert_eq!(written, bytes);
	}
	Ok(())
}
