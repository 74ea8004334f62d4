use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use walkdir::WalkDir;
use zip::ZipArchive;

/// The bytes of a single class file, and where they came from.
#[derive(Debug)]
pub(crate) struct ClassInput {
	pub(crate) origin: String,
	pub(crate) bytes: Vec<u8>,
}

fn has_extension(path: &Path, extension: &str) -> bool {
	path.extension().is_some_and(|e| e == extension)
}

/// Collects all class files from the given paths.
///
/// A path may be a `.class` file, a `.jar` file, or a directory that is searched for both.
pub(crate) fn collect(paths: &[PathBuf]) -> Result<Vec<ClassInput>> {
	let mut inputs = Vec::new();
	for path in paths {
		if path.is_dir() {
			let entries = WalkDir::new(path)
				.follow_links(false)
				.sort_by_file_name()
				.into_iter()
				.collect::<Result<Vec<_>, walkdir::Error>>()
				.with_context(|| anyhow!("failed to walk directory {path:?}"))?;
			for entry in entries {
				if entry.file_type().is_dir() {
					continue;
				}
				let file = entry.into_path();
				if has_extension(&file, "class") || has_extension(&file, "jar") {
					collect_file(&file, &mut inputs)?;
				} else {
					debug!("skipping {file:?}");
				}
			}
		} else {
			collect_file(path, &mut inputs)?;
		}
	}
	Ok(inputs)
}

fn collect_file(path: &Path, inputs: &mut Vec<ClassInput>) -> Result<()> {
	if has_extension(path, "jar") {
		let file = File::open(path)
			.with_context(|| anyhow!("failed to open jar {path:?}"))?;
		let mut zip = ZipArchive::new(file)
			.with_context(|| anyhow!("failed to read jar {path:?}"))?;

		let before = inputs.len();
		for index in 0..zip.len() {
			let mut entry = zip.by_index(index)?;
			if entry.is_dir() || !entry.name().ends_with(".class") {
				continue;
			}
			let mut bytes = Vec::new();
			entry.read_to_end(&mut bytes)
				.with_context(|| anyhow!("failed to read {:?} from jar {path:?}", entry.name()))?;
			inputs.push(ClassInput {
				origin: format!("{}!/{}", path.display(), entry.name()),
				bytes,
			});
		}
		info!("found {} class files in {path:?}", inputs.len() - before);
	} else {
		let bytes = std::fs::read(path)
			.with_context(|| anyhow!("failed to read {path:?}"))?;
		inputs.push(ClassInput {
			origin: path.display().to_string(),
			bytes,
		});
	}
	Ok(())
}
