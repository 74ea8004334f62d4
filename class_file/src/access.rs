//! Access flags, and turning them into the keywords they stand for.

pub const ACC_PUBLIC: u16       = 0x0001; // class, field, method, inner class
pub const ACC_PRIVATE: u16      = 0x0002; // field, method, inner class
pub const ACC_PROTECTED: u16    = 0x0004; // field, method, inner class
pub const ACC_STATIC: u16       = 0x0008; // field, method, inner class
pub const ACC_FINAL: u16        = 0x0010; // class, field, method, inner class, parameter
pub const ACC_SUPER: u16        = 0x0020; // class
pub const ACC_OPEN: u16         = 0x0020; // module
pub const ACC_TRANSITIVE: u16   = 0x0020; // module requires
pub const ACC_SYNCHRONIZED: u16 = 0x0020; // method
pub const ACC_VOLATILE: u16     = 0x0040; // field
pub const ACC_BRIDGE: u16       = 0x0040; // method
pub const ACC_STATIC_PHASE: u16 = 0x0040; // module requires
pub const ACC_TRANSIENT: u16    = 0x0080; // field
pub const ACC_VARARGS: u16      = 0x0080; // method
pub const ACC_NATIVE: u16       = 0x0100; // method
pub const ACC_INTERFACE: u16    = 0x0200; // class, inner class
pub const ACC_ABSTRACT: u16     = 0x0400; // class, method, inner class
pub const ACC_STRICT: u16       = 0x0800; // method
pub const ACC_SYNTHETIC: u16    = 0x1000; // everything
pub const ACC_ANNOTATION: u16   = 0x2000; // class, inner class
pub const ACC_ENUM: u16         = 0x4000; // class, field, inner class
pub const ACC_MODULE: u16       = 0x8000; // class
pub const ACC_MANDATED: u16     = 0x8000; // parameter, module, module requires, module exports, module opens

/// What an access flags item belongs to, which decides the meaning of the overloaded bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessContext {
	Class,
	InnerClass,
	Field,
	Method,
	Parameter,
	Module,
	ModuleRequires,
	/// `exports` and `opens` of a module.
	ModuleExportsOpens,
}

impl AccessContext {
	fn table(self) -> &'static [(u16, &'static str)] {
		match self {
			AccessContext::Class => &[
				(ACC_PUBLIC, "public"), (ACC_FINAL, "final"), (ACC_SUPER, "super"), (ACC_INTERFACE, "interface"),
				(ACC_ABSTRACT, "abstract"), (ACC_SYNTHETIC, "synthetic"), (ACC_ANNOTATION, "annotation"),
				(ACC_ENUM, "enum"), (ACC_MODULE, "module"),
			],
			AccessContext::InnerClass => &[
				(ACC_PUBLIC, "public"), (ACC_PRIVATE, "private"), (ACC_PROTECTED, "protected"), (ACC_STATIC, "static"),
				(ACC_FINAL, "final"), (ACC_INTERFACE, "interface"), (ACC_ABSTRACT, "abstract"),
				(ACC_SYNTHETIC, "synthetic"), (ACC_ANNOTATION, "annotation"), (ACC_ENUM, "enum"),
			],
			AccessContext::Field => &[
				(ACC_PUBLIC, "public"), (ACC_PRIVATE, "private"), (ACC_PROTECTED, "protected"), (ACC_STATIC, "static"),
				(ACC_FINAL, "final"), (ACC_VOLATILE, "volatile"), (ACC_TRANSIENT, "transient"),
				(ACC_SYNTHETIC, "synthetic"), (ACC_ENUM, "enum"),
			],
			AccessContext::Method => &[
				(ACC_PUBLIC, "public"), (ACC_PRIVATE, "private"), (ACC_PROTECTED, "protected"), (ACC_STATIC, "static"),
				(ACC_FINAL, "final"), (ACC_SYNCHRONIZED, "synchronized"), (ACC_BRIDGE, "bridge"),
				(ACC_VARARGS, "varargs"), (ACC_NATIVE, "native"), (ACC_ABSTRACT, "abstract"), (ACC_STRICT, "strict"),
				(ACC_SYNTHETIC, "synthetic"),
			],
			AccessContext::Parameter => &[
				(ACC_FINAL, "final"), (ACC_SYNTHETIC, "synthetic"), (ACC_MANDATED, "mandated"),
			],
			AccessContext::Module => &[
				(ACC_OPEN, "open"), (ACC_SYNTHETIC, "synthetic"), (ACC_MANDATED, "mandated"),
			],
			AccessContext::ModuleRequires => &[
				(ACC_TRANSITIVE, "transitive"), (ACC_STATIC_PHASE, "static_phase"), (ACC_SYNTHETIC, "synthetic"),
				(ACC_MANDATED, "mandated"),
			],
			AccessContext::ModuleExportsOpens => &[
				(ACC_SYNTHETIC, "synthetic"), (ACC_MANDATED, "mandated"),
			],
		}
	}
}

/// Lists the flags set in `flags` as lower case keywords, separated by spaces.
///
/// Bits without a meaning in the given context are shown as a hex number at the end.
pub fn describe(flags: u16, context: AccessContext) -> String {
	let mut words = Vec::new();
	let mut unknown = flags;
	for &(flag, name) in context.table() {
		if flags & flag != 0 {
			words.push(name.to_owned());
			unknown &= !flag;
		}
	}
	if unknown != 0 {
		words.push(format!("{unknown:#06x}"));
	}
	words.join(" ")
}
