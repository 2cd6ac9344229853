use miette::SourceSpan;
use std::fmt;

/// Identifies a parsed module inside a result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

/// Index of a declaration inside its module's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

impl DeclId {
    /// The module root always occupies the first arena slot.
    pub const ROOT: DeclId = DeclId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A declaration addressed across modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclRef {
    pub module: ModuleId,
    pub decl: DeclId,
}

impl DeclRef {
    pub fn new(module: ModuleId, decl: DeclId) -> Self {
        Self { module, decl }
    }

    /// Reference to the root declaration of `module`.
    pub fn root(module: ModuleId) -> Self {
        Self { module, decl: DeclId::ROOT }
    }
}

impl fmt::Display for DeclRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.module.0, self.decl.0)
    }
}

/// A span with no meaningful location, used by constructors that build
/// trees programmatically.
pub fn dummy_span() -> SourceSpan {
    SourceSpan::from((0usize, 0usize))
}

/// Exclusive end offset of a span.
pub fn span_end(span: SourceSpan) -> usize {
    span.offset() + span.len()
}

/// Whether `offset` lies inside `span` (start inclusive, end exclusive).
pub fn span_contains(span: SourceSpan, offset: usize) -> bool {
    offset >= span.offset() && offset < span_end(span)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
    Package,
    Export,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Attributes {
    pub visibility: Visibility,
    pub is_static: bool,
}

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Void,
    Bool,
    Byte,
    Ubyte,
    Short,
    Ushort,
    Int,
    Uint,
    Long,
    Ulong,
    Float,
    Double,
    Real,
    Char,
    Wchar,
    Dchar,
}

impl PrimitiveKind {
    /// The type `length`, `sizeof` and friends evaluate to.
    pub const SIZE_T: PrimitiveKind = PrimitiveKind::Ulong;

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Ubyte => "ubyte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Ushort => "ushort",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Uint => "uint",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Ulong => "ulong",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Real => "real",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Wchar => "wchar",
            PrimitiveKind::Dchar => "dchar",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "void" => PrimitiveKind::Void,
            "bool" => PrimitiveKind::Bool,
            "byte" => PrimitiveKind::Byte,
            "ubyte" => PrimitiveKind::Ubyte,
            "short" => PrimitiveKind::Short,
            "ushort" => PrimitiveKind::Ushort,
            "int" => PrimitiveKind::Int,
            "uint" => PrimitiveKind::Uint,
            "long" => PrimitiveKind::Long,
            "ulong" => PrimitiveKind::Ulong,
            "float" => PrimitiveKind::Float,
            "double" => PrimitiveKind::Double,
            "real" => PrimitiveKind::Real,
            "char" => PrimitiveKind::Char,
            "wchar" => PrimitiveKind::Wchar,
            "dchar" => PrimitiveKind::Dchar,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::Ubyte
                | PrimitiveKind::Short
                | PrimitiveKind::Ushort
                | PrimitiveKind::Int
                | PrimitiveKind::Uint
                | PrimitiveKind::Long
                | PrimitiveKind::Ulong
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double | PrimitiveKind::Real)
    }

    pub fn is_character(self) -> bool {
        matches!(self, PrimitiveKind::Char | PrimitiveKind::Wchar | PrimitiveKind::Dchar)
    }

    /// Integral, floating, character and boolean types all take part in
    /// implicit arithmetic conversions.
    pub fn is_arithmetic(self) -> bool {
        self.is_integral() || self.is_floating() || self.is_character() || self == PrimitiveKind::Bool
    }

    /// Size in bytes on the 64-bit targets the engine models.
    pub fn size_of(self) -> u64 {
        match self {
            PrimitiveKind::Void | PrimitiveKind::Bool | PrimitiveKind::Byte | PrimitiveKind::Ubyte | PrimitiveKind::Char => 1,
            PrimitiveKind::Short | PrimitiveKind::Ushort | PrimitiveKind::Wchar => 2,
            PrimitiveKind::Int | PrimitiveKind::Uint | PrimitiveKind::Float | PrimitiveKind::Dchar => 4,
            PrimitiveKind::Long | PrimitiveKind::Ulong | PrimitiveKind::Double => 8,
            PrimitiveKind::Real => 16,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
