use super::common::{dummy_span, PrimitiveKind};
use super::expr::Expr;
use miette::SourceSpan;

/// A syntactic type as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub kind: TypeDeclKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDeclKind {
    Primitive(PrimitiveKind),
    /// `Foo` or `Foo!(args)`.
    Identifier {
        name: String,
        template_args: Option<Vec<TemplateArg>>,
    },
    /// `base.Name` or `base.Name!(args)`.
    Qualified {
        base: Box<TypeDecl>,
        name: String,
        template_args: Option<Vec<TemplateArg>>,
    },
    Pointer(Box<TypeDecl>),
    Array {
        element: Box<TypeDecl>,
        length: Option<Box<Expr>>,
    },
    AssocArray {
        key: Box<TypeDecl>,
        value: Box<TypeDecl>,
    },
    Delegate {
        return_type: Box<TypeDecl>,
        params: Vec<TypeDecl>,
        is_function: bool,
    },
    Typeof(Box<Expr>),
    Modified {
        modifier: TypeModifier,
        inner: Box<TypeDecl>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeModifier {
    Const,
    Immutable,
    Shared,
    Inout,
}

/// An explicit template argument. The parser cannot always tell a type from a
/// symbol, so identifiers are emitted as `Type` and sorted out during
/// resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArg {
    Type(TypeDecl),
    Value(Expr),
}

impl TypeDecl {
    pub fn new(kind: TypeDeclKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new(TypeDeclKind::Primitive(kind), dummy_span())
    }

    pub fn int() -> Self {
        Self::primitive(PrimitiveKind::Int)
    }

    pub fn bool() -> Self {
        Self::primitive(PrimitiveKind::Bool)
    }

    pub fn void() -> Self {
        Self::primitive(PrimitiveKind::Void)
    }

    pub fn ident(name: &str) -> Self {
        Self::new(
            TypeDeclKind::Identifier { name: name.to_string(), template_args: None },
            dummy_span(),
        )
    }

    /// `name!(args)`
    pub fn instance(name: &str, args: Vec<TemplateArg>) -> Self {
        Self::new(
            TypeDeclKind::Identifier { name: name.to_string(), template_args: Some(args) },
            dummy_span(),
        )
    }

    pub fn qualified(base: TypeDecl, name: &str) -> Self {
        Self::new(
            TypeDeclKind::Qualified { base: Box::new(base), name: name.to_string(), template_args: None },
            dummy_span(),
        )
    }

    /// Builds `a.b.c` from dotted text.
    pub fn path(dotted: &str) -> Self {
        let mut parts = dotted.split('.');
        let first = parts.next().unwrap_or_default();
        parts.fold(Self::ident(first), |base, part| Self::qualified(base, part))
    }

    pub fn pointer(inner: TypeDecl) -> Self {
        Self::new(TypeDeclKind::Pointer(Box::new(inner)), dummy_span())
    }

    pub fn array(element: TypeDecl) -> Self {
        Self::new(TypeDeclKind::Array { element: Box::new(element), length: None }, dummy_span())
    }

    pub fn static_array(element: TypeDecl, length: Expr) -> Self {
        Self::new(
            TypeDeclKind::Array { element: Box::new(element), length: Some(Box::new(length)) },
            dummy_span(),
        )
    }

    pub fn assoc(key: TypeDecl, value: TypeDecl) -> Self {
        Self::new(TypeDeclKind::AssocArray { key: Box::new(key), value: Box::new(value) }, dummy_span())
    }

    pub fn delegate(return_type: TypeDecl, params: Vec<TypeDecl>) -> Self {
        Self::new(
            TypeDeclKind::Delegate { return_type: Box::new(return_type), params, is_function: false },
            dummy_span(),
        )
    }

    pub fn function_pointer(return_type: TypeDecl, params: Vec<TypeDecl>) -> Self {
        Self::new(
            TypeDeclKind::Delegate { return_type: Box::new(return_type), params, is_function: true },
            dummy_span(),
        )
    }

    pub fn typeof_expr(expr: Expr) -> Self {
        Self::new(TypeDeclKind::Typeof(Box::new(expr)), dummy_span())
    }

    pub fn modified(modifier: TypeModifier, inner: TypeDecl) -> Self {
        Self::new(TypeDeclKind::Modified { modifier, inner: Box::new(inner) }, dummy_span())
    }

    /// The identifier this type starts with, if it is a plain name.
    pub fn simple_name(&self) -> Option<&str> {
        match &self.kind {
            TypeDeclKind::Identifier { name, template_args: None } => Some(name),
            _ => None,
        }
    }

    /// Strips storage modifiers.
    pub fn unqualified(&self) -> &TypeDecl {
        let mut current = self;
        while let TypeDeclKind::Modified { inner, .. } = &current.kind {
            current = inner;
        }
        current
    }
}
