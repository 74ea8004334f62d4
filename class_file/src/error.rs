use std::fmt::{Display, Formatter};
use thiserror::Error;
use crate::pool::PoolKind;

/// The kind of failure at the root of every error this crate produces.
///
/// Errors are returned as [`anyhow::Error`] with the structural path (class, member, attribute, entry, byte offset)
/// attached as context. The kind can be recovered with [`ClassFileError::of`], or directly with
/// [`anyhow::Error::downcast_ref`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassFileError {
	#[error("unexpected end of data at offset {offset}: needed {needed} bytes, only {available} available")]
	Truncated {
		offset: usize,
		needed: usize,
		available: usize,
	},
	#[error("bad constant pool index {index}: {problem}, expected {}", kinds_list(.expected))]
	InvalidConstantPoolIndex {
		index: u16,
		expected: Vec<PoolKind>,
		problem: BadIndex,
	},
	#[error("attribute {attribute:?} declares a length of {declared} bytes, but its body is {actual} bytes long")]
	LengthMismatch {
		attribute: String,
		declared: u32,
		actual: usize,
	},
	#[error("unknown type annotation target_type {0:#04x}")]
	UnknownTargetType(u8),
	#[error("type annotation target_type {target_type:#04x} is not allowed on a {context}")]
	TargetTypeContextMismatch {
		target_type: u8,
		context: String,
	},
	#[error("invalid opcode {opcode:#04x} at code offset {offset}")]
	InvalidOpcode {
		opcode: u8,
		offset: u32,
	},
	#[error("malformed attribute: {0}")]
	MalformedAttribute(String),
	#[error("malformed constant pool entry at index {index}: {reason}")]
	MalformedConstant {
		index: u16,
		reason: String,
	},
	#[error("invalid constant pool tag {tag} at index {index}")]
	InvalidConstantPoolTag {
		tag: u8,
		index: u16,
	},
	#[error("invalid magic: got {0:#x}, expected 0xCAFEBABE")]
	InvalidMagic(u32),
	#[error("bootstrap method index {index} out of bounds for {count} bootstrap methods")]
	BootstrapMethodIndexOutOfBounds {
		index: u16,
		count: usize,
	},
}

impl ClassFileError {
	/// Finds the kind of failure of an error returned by this crate.
	pub fn of(error: &anyhow::Error) -> Option<&ClassFileError> {
		error.downcast_ref()
	}

	pub(crate) fn malformed(reason: impl Into<String>) -> ClassFileError {
		ClassFileError::MalformedAttribute(reason.into())
	}
}

/// Why a constant pool index couldn't be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadIndex {
	Zero,
	OutOfRange {
		count: u16,
	},
	/// The second slot taken up by a `Long` or `Double` entry.
	Tombstone,
	WrongKind {
		found: PoolKind,
	},
}

impl Display for BadIndex {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			BadIndex::Zero => write!(f, "index zero is reserved"),
			BadIndex::OutOfRange { count } => write!(f, "out of range for constant_pool_count {count}"),
			BadIndex::Tombstone => write!(f, "unusable slot after a Long or Double entry"),
			BadIndex::WrongKind { found } => write!(f, "found {found}"),
		}
	}
}

fn kinds_list(kinds: &[PoolKind]) -> String {
	match kinds {
		[] => "nothing".to_owned(),
		[single] => single.to_string(),
		[init @ .., last] => {
			let init: Vec<String> = init.iter().map(ToString::to_string).collect();
			format!("{} or {last}", init.join(", "))
		},
	}
}
