use anyhow::{anyhow, Context, Result};
use crate::{ByteReader, ClassRead, ClassWrite};
use crate::attribute::{read_indices, write_indices};
use crate::pool::{ConstantPool, PoolKind};

/// The `Module` attribute of a `module-info.class`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAttribute {
	/// Refers to a `Module` constant.
	pub module_name_index: u16,
	pub module_flags: u16,
	/// Zero if no version is given.
	pub module_version_index: u16,
	pub requires: Vec<ModuleRequires>,
	pub exports: Vec<ModulePackageTargets>,
	pub opens: Vec<ModulePackageTargets>,
	/// Each refers to a `Class` constant.
	pub uses: Vec<u16>,
	pub provides: Vec<ModuleProvides>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleRequires {
	pub requires_index: u16,
	pub requires_flags: u16,
	pub requires_version_index: u16,
}

/// An `exports` or `opens` entry: a package and the modules it is exported or opened to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePackageTargets {
	/// Refers to a `Package` constant.
	pub package_index: u16,
	pub flags: u16,
	/// Each refers to a `Module` constant. Empty if the package isn't qualified.
	pub to: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProvides {
	/// Refers to the `Class` constant of the service interface.
	pub provides_index: u16,
	pub provides_with: Vec<u16>,
}

impl ModulePackageTargets {
	fn read(reader: &mut ByteReader, pool: &ConstantPool) -> Result<ModulePackageTargets> {
		let package_index = reader.read_u16()?;
		pool.resolve(package_index, PoolKind::Package)?;
		let flags = reader.read_u16()?;
		let to = read_indices(reader, pool, PoolKind::Module)?;
		Ok(ModulePackageTargets { package_index, flags, to })
	}

	fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.package_index)?;
		writer.write_u16(self.flags)?;
		write_indices(writer, &self.to)
	}
}

impl ModuleAttribute {
	pub(crate) fn read(reader: &mut ByteReader, pool: &ConstantPool) -> Result<ModuleAttribute> {
		let module_name_index = reader.read_u16()?;
		pool.resolve(module_name_index, PoolKind::Module)?;
		let module_flags = reader.read_u16()?;
		let module_version_index = reader.read_u16()?;
		pool.resolve_optional(module_version_index, PoolKind::Utf8)?;

		let requires = reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| {
				let requires_index = r.read_u16()?;
				pool.resolve(requires_index, PoolKind::Module)?;
				let requires_flags = r.read_u16()?;
				let requires_version_index = r.read_u16()?;
				pool.resolve_optional(requires_version_index, PoolKind::Utf8)?;
				Ok(ModuleRequires { requires_index, requires_flags, requires_version_index })
			}
		).context("in requires")?;
		let exports = reader.read_vec(|r| r.read_u16_as_usize(), |r| ModulePackageTargets::read(r, pool))
			.context("in exports")?;
		let opens = reader.read_vec(|r| r.read_u16_as_usize(), |r| ModulePackageTargets::read(r, pool))
			.context("in opens")?;
		let uses = read_indices(reader, pool, PoolKind::Class).context("in uses")?;
		let provides = reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| {
				let provides_index = r.read_u16()?;
				pool.resolve(provides_index, PoolKind::Class)?;
				let provides_with = read_indices(r, pool, PoolKind::Class)?;
				Ok(ModuleProvides { provides_index, provides_with })
			}
		).context("in provides")?;

		Ok(ModuleAttribute { module_name_index, module_flags, module_version_index, requires, exports, opens, uses, provides })
	}

	pub(crate) fn write(&self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.module_name_index)?;
		writer.write_u16(self.module_flags)?;
		writer.write_u16(self.module_version_index)?;
		writer.write_slice(&self.requires, |w, size| w.write_usize_as_u16(size), |w, requires| {
			w.write_u16(requires.requires_index)?;
			w.write_u16(requires.requires_flags)?;
			w.write_u16(requires.requires_version_index)
		})?;
		writer.write_slice(&self.exports, |w, size| w.write_usize_as_u16(size), |w, exports| exports.write(w))?;
		writer.write_slice(&self.opens, |w, size| w.write_usize_as_u16(size), |w, opens| opens.write(w))?;
		write_indices(writer, &self.uses)?;
		writer.write_slice(&self.provides, |w, size| w.write_usize_as_u16(size), |w, provides| {
			w.write_u16(provides.provides_index)?;
			write_indices(w, &provides.provides_with)
		})
	}

	pub fn summary(&self, pool: &ConstantPool) -> Result<String> {
		let name = pool.get_module_name(self.module_name_index)
			.with_context(|| anyhow!("while describing module"))?;
		Ok(format!(
			"module {} ({} requires, {} exports, {} opens, {} uses, {} provides)",
			name.as_str_lossy(), self.requires.len(), self.exports.len(), self.opens.len(), self.uses.len(), self.provides.len()
		))
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use crate::ByteReader;
	use crate::attribute::module::{ModuleAttribute, ModulePackageTargets, ModuleProvides, ModuleRequires};
	use crate::error::ClassFileError;
	use crate::pool::{ConstantPool, PoolEntry};

	fn pool() -> Result<ConstantPool> {
		let mut pool = ConstantPool::new();
		pool.push(PoolEntry::utf8("com.example.app"))?; // 1
		pool.push(PoolEntry::Module { name_index: 1 })?; // 2
		pool.push(PoolEntry::utf8("java.base"))?; // 3
		pool.push(PoolEntry::Module { name_index: 3 })?; // 4
		pool.push(PoolEntry::utf8("17"))?; // 5
		pool.push(PoolEntry::utf8("com/example/api"))?; // 6
		pool.push(PoolEntry::Package { name_index: 6 })?; // 7
		pool.push(PoolEntry::utf8("com.example.friend"))?; // 8
		pool.push(PoolEntry::Module { name_index: 8 })?; // 9
		pool.push(PoolEntry::utf8("com/example/spi/Service"))?; // 10
		pool.push(PoolEntry::Class { name_index: 10 })?; // 11
		pool.push(PoolEntry::utf8("com/example/impl/ServiceImpl"))?; // 12
		pool.push(PoolEntry::Class { name_index: 12 })?; // 13
		Ok(pool)
	}

	#[test]
	fn module() -> Result<()> {
		let pool = pool()?;
		let bytes = [
			0x00, 0x02, // module_name_index
			0x00, 0x20, // module_flags
			0x00, 0x00, // module_version_index
			0x00, 0x01, // requires
				0x00, 0x04, 0x80, 0x00, 0x00, 0x05,
			0x00, 0x01, // exports
				0x00, 0x07, 0x00, 0x00, 0x00, 0x00,
			0x00, 0x01, // opens
				0x00, 0x07, 0x00, 0x00, 0x00, 0x01, 0x00, 0x09,
			0x00, 0x01, // uses
				0x00, 0x0b,
			0x00, 0x01, // provides
				0x00, 0x0b, 0x00, 0x01, 0x00, 0x0d,
		];
		let mut reader = ByteReader::new(&bytes);
		let module = ModuleAttribute::read(&mut reader, &pool)?;
		assert!(reader.is_empty());
		assert_eq!(module, ModuleAttribute {
			module_name_index: 2,
			module_flags: 0x0020,
			module_version_index: 0,
			requires: vec![
				ModuleRequires { requires_index: 4, requires_flags: 0x8000, requires_version_index: 5 },
			],
			exports: vec![
				ModulePackageTargets { package_index: 7, flags: 0, to: vec![] },
			],
			opens: vec![
				ModulePackageTargets { package_index: 7, flags: 0, to: vec![9] },
			],
			uses: vec![11],
			provides: vec![
				ModuleProvides { provides_index: 11, provides_with: vec![13] },
			],
		});
		assert_eq!(module.summary(&pool)?, "module com.example.app (1 requires, 1 exports, 1 opens, 1 uses, 1 provides)");

		let mut written = Vec::new();
		module.write(&mut written)?;
		assert_eq!(written, bytes);
		Ok(())
	}

	#[test]
	fn name_must_be_module() -> Result<()> {
		let pool = pool()?;
		let bytes = [0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
		let error = ModuleAttribute::read(&mut ByteReader::new(&bytes), &pool).unwrap_err();
		assert!(matches!(ClassFileError::of(&error), Some(ClassFileError::InvalidConstantPoolIndex { index: 1, .. })), "{error:?}");
		Ok(())
	}

	#[test]
	fn exported_package_must_be_package() -> Result<()> {
		let pool = pool()?;
		let bytes = [
			0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
			0x00, 0x00, // requires
			0x00, 0x01, // exports
				0x00, 0x0b, 0x00, 0x00, 0x00, 0x00,
			0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
		];
		let error = ModuleAttribute::read(&mut ByteReader::new(&bytes), &pool).unwrap_err();
		assert!(matches!(ClassFileError::of(&error), Some(ClassFileError::InvalidConstantPoolIndex { index: 11, .. })), "{error:?}");
		Ok(())
	}

	#[test]
	fn requires_version_is_optional() -> Result<()> {
		let pool = pool()?;
		let bytes = [
			0x00, 0x02, 0x00, 0x00, 0x00, 0x05,
			0x00, 0x01,
				0x00, 0x04, 0x00, 0x00, 0x00, 0x00,
			0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
		];
		let module = ModuleAttribute::read(&mut ByteReader::new(&bytes), &pool)?;
		assert_eq!(module.module_version_index, 5);
		assert_eq!(module.requires, vec![
			ModuleRequires { requires_index: 4, requires_flags: 0, requires_version_index: 0 },
		]);
		Ok(())
	}
}
