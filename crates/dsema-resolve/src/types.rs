//! Resolved semantic types.
//!
//! An [`AbstractType`] is what a type declaration, identifier or expression
//! resolves to. The variant set is closed; consumers match on
//! [`AbstractKind`] exhaustively.

use dsema_syntax::{DeclRef, ModuleId, PrimitiveKind};
use indexmap::IndexMap;
use miette::SourceSpan;
use std::fmt;
use std::sync::Arc;

/// A declaration referenced from a resolved type. The name is kept so types
/// can be displayed without going back to the syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclHandle {
    pub decl: DeclRef,
    pub name: Arc<str>,
}

impl DeclHandle {
    pub fn new(decl: DeclRef, name: &str) -> Self {
        Self { decl, name: Arc::from(name) }
    }
}

/// Pseudo-symbols that have no declaration in any module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyntheticKind {
    /// `sizeof`, `length`, `classinfo`, ...
    StaticProperty,
    /// The compile-time-evaluation flag.
    CtfeFlag,
    /// The named return value inside a function's `out` contract.
    ResultVariable { function: DeclRef },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyntheticSymbol {
    pub name: String,
    pub kind: SyntheticKind,
}

/// Anything the scope walker can yield.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolRef {
    Decl(DeclRef),
    Synthetic(Arc<SyntheticSymbol>),
}

impl SymbolRef {
    pub fn synthetic(name: &str, kind: SyntheticKind) -> Self {
        SymbolRef::Synthetic(Arc::new(SyntheticSymbol { name: name.to_string(), kind }))
    }

    pub fn decl(&self) -> Option<DeclRef> {
        match self {
            SymbolRef::Decl(decl) => Some(*decl),
            SymbolRef::Synthetic(_) => None,
        }
    }

    pub fn as_synthetic(&self) -> Option<&SyntheticSymbol> {
        match self {
            SymbolRef::Decl(_) => None,
            SymbolRef::Synthetic(symbol) => Some(symbol),
        }
    }
}

/// Compile-time constant values bound to value template parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i128),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(String),
    Null,
}

impl ConstValue {
    /// The type a literal with this value would have.
    pub fn natural_type(&self) -> AbstractType {
        match self {
            ConstValue::Int(_) => AbstractType::primitive(PrimitiveKind::Int),
            ConstValue::Float(_) => AbstractType::primitive(PrimitiveKind::Double),
            ConstValue::Bool(_) => AbstractType::primitive(PrimitiveKind::Bool),
            ConstValue::Char(_) => AbstractType::primitive(PrimitiveKind::Char),
            ConstValue::Str(_) => AbstractType::string(),
            ConstValue::Null => AbstractType::pointer(AbstractType::primitive(PrimitiveKind::Void)),
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            ConstValue::Int(v) => Some(*v),
            ConstValue::Char(c) => Some(*c as i128),
            ConstValue::Bool(b) => Some(*b as i128),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
            ConstValue::Char(c) => write!(f, "'{c}'"),
            ConstValue::Str(s) => write!(f, "\"{s}\""),
            ConstValue::Null => f.write_str("null"),
        }
    }
}

/// What a template parameter is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Type(AbstractType),
    /// A constant and the type it was converted to.
    Value(ConstValue, AbstractType),
    /// A non-type symbol bound through an alias parameter.
    Symbol(AbstractType),
    Tuple(Vec<TemplateValue>),
}

impl TemplateValue {
    /// The type carried by the binding, if any.
    pub fn as_type(&self) -> Option<&AbstractType> {
        match self {
            TemplateValue::Type(ty) | TemplateValue::Symbol(ty) | TemplateValue::Value(_, ty) => Some(ty),
            TemplateValue::Tuple(_) => None,
        }
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateValue::Type(ty) | TemplateValue::Symbol(ty) => write!(f, "{ty}"),
            TemplateValue::Value(value, _) => write!(f, "{value}"),
            TemplateValue::Tuple(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// Ordered map from template parameter to its binding; `None` is unbound.
///
/// Shared between frames and copied on write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeducedParams(Arc<IndexMap<DeclRef, Option<TemplateValue>>>);

impl DeducedParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every parameter in `params` starts out unbound.
    pub fn unbound(params: impl IntoIterator<Item = DeclRef>) -> Self {
        Self(Arc::new(params.into_iter().map(|p| (p, None)).collect()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, param: DeclRef) -> bool {
        self.0.contains_key(&param)
    }

    /// The binding of `param`, if it is bound.
    pub fn get(&self, param: DeclRef) -> Option<&TemplateValue> {
        self.0.get(&param).and_then(Option::as_ref)
    }

    pub fn is_bound(&self, param: DeclRef) -> bool {
        self.get(param).is_some()
    }

    pub fn declare(&mut self, param: DeclRef) {
        if !self.0.contains_key(&param) {
            Arc::make_mut(&mut self.0).insert(param, None);
        }
    }

    pub fn bind(&mut self, param: DeclRef, value: TemplateValue) {
        Arc::make_mut(&mut self.0).insert(param, Some(value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclRef, Option<&TemplateValue>)> {
        self.0.iter().map(|(k, v)| (*k, v.as_ref()))
    }

    /// Parameters that are declared but still unbound.
    pub fn unbound_params(&self) -> impl Iterator<Item = DeclRef> + '_ {
        self.0.iter().filter(|(_, v)| v.is_none()).map(|(k, _)| *k)
    }

    /// `self` overlaid with `other`; bound entries of `other` win.
    pub fn merged(&self, other: &DeducedParams) -> DeducedParams {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut merged = self.clone();
        for (param, value) in other.iter() {
            match value {
                Some(value) => merged.bind(param, value.clone()),
                None => merged.declare(param),
            }
        }
        merged
    }
}

/// Where a resolved type came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Decl(DeclRef),
    Span(SourceSpan),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbstractType {
    pub kind: AbstractKind,
    pub origin: Option<Origin>,
    /// Template parameter bindings of a generic instance.
    pub deduced: DeducedParams,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AbstractKind {
    Primitive(PrimitiveKind),
    Pointer(Box<AbstractType>),
    Array {
        element: Box<AbstractType>,
        length: Option<u64>,
    },
    AssocArray {
        key: Box<AbstractType>,
        value: Box<AbstractType>,
    },
    Delegate {
        return_type: Box<AbstractType>,
        params: Vec<AbstractType>,
        /// Produced by a function literal rather than a declared type.
        is_literal: bool,
        is_function: bool,
    },
    Struct(DeclHandle),
    Union(DeclHandle),
    Class {
        decl: DeclHandle,
        base: Option<Box<AbstractType>>,
        interfaces: Vec<AbstractType>,
    },
    Interface {
        decl: DeclHandle,
        bases: Vec<AbstractType>,
    },
    Template(DeclHandle),
    Enum {
        decl: DeclHandle,
        base: Option<Box<AbstractType>>,
    },
    Module {
        module: ModuleId,
        name: Arc<str>,
    },
    Package(Arc<str>),
    /// A resolved variable, function, enum member or pseudo-property. `base`
    /// is the value's type (a function's return type).
    Member {
        symbol: SymbolRef,
        name: Arc<str>,
        base: Option<Box<AbstractType>>,
    },
    /// Transparent; stripped before any further chaining.
    Aliased {
        decl: DeclHandle,
        base: Option<Box<AbstractType>>,
    },
    TemplateParameter {
        param: DeclHandle,
        value: Option<Box<TemplateValue>>,
    },
}

/// Strip chains are acyclic by construction; this only guards malformed input.
const MAX_STRIP_DEPTH: usize = 64;

impl AbstractType {
    pub fn new(kind: AbstractKind) -> Self {
        Self { kind, origin: None, deduced: DeducedParams::default() }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_deduced(mut self, deduced: DeducedParams) -> Self {
        self.deduced = deduced;
        self
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new(AbstractKind::Primitive(kind))
    }

    pub fn bool() -> Self {
        Self::primitive(PrimitiveKind::Bool)
    }

    pub fn size_t() -> Self {
        Self::primitive(PrimitiveKind::SIZE_T)
    }

    pub fn void() -> Self {
        Self::primitive(PrimitiveKind::Void)
    }

    pub fn pointer(base: AbstractType) -> Self {
        Self::new(AbstractKind::Pointer(Box::new(base)))
    }

    pub fn array(element: AbstractType) -> Self {
        Self::new(AbstractKind::Array { element: Box::new(element), length: None })
    }

    /// `immutable(char)[]`; qualifiers are not modelled.
    pub fn string() -> Self {
        Self::array(Self::primitive(PrimitiveKind::Char))
    }

    pub fn member(symbol: SymbolRef, name: &str, base: Option<AbstractType>) -> Self {
        Self::new(AbstractKind::Member { symbol, name: Arc::from(name), base: base.map(Box::new) })
    }

    /// Follows `Aliased`, `Member` and bound `TemplateParameter` wrappers to
    /// the underlying type. `None` when a wrapper has nothing underneath.
    pub fn strip(&self) -> Option<&AbstractType> {
        let mut current = self;
        for _ in 0..MAX_STRIP_DEPTH {
            current = match &current.kind {
                AbstractKind::Aliased { base, .. } | AbstractKind::Member { base, .. } => base.as_deref()?,
                AbstractKind::TemplateParameter { value: Some(value), .. } => match value.as_type() {
                    Some(ty) => ty,
                    None => return Some(current),
                },
                _ => return Some(current),
            };
        }
        None
    }

    /// Like [`Self::strip`] but only removes aliases, keeping members.
    pub fn strip_aliases(&self) -> Option<&AbstractType> {
        let mut current = self;
        for _ in 0..MAX_STRIP_DEPTH {
            current = match &current.kind {
                AbstractKind::Aliased { base, .. } => base.as_deref()?,
                _ => return Some(current),
            };
        }
        None
    }

    /// The declaration this type was built from, for declaration-backed kinds.
    pub fn declaration(&self) -> Option<DeclRef> {
        match &self.kind {
            AbstractKind::Struct(handle)
            | AbstractKind::Union(handle)
            | AbstractKind::Template(handle)
            | AbstractKind::Class { decl: handle, .. }
            | AbstractKind::Interface { decl: handle, .. }
            | AbstractKind::Enum { decl: handle, .. }
            | AbstractKind::Aliased { decl: handle, .. }
            | AbstractKind::TemplateParameter { param: handle, .. } => Some(handle.decl),
            AbstractKind::Member { symbol, .. } => symbol.decl(),
            AbstractKind::Module { module, .. } => Some(DeclRef::root(*module)),
            _ => None,
        }
    }

    pub fn symbol(&self) -> Option<&SymbolRef> {
        match &self.kind {
            AbstractKind::Member { symbol, .. } => Some(symbol),
            _ => None,
        }
    }

    /// Struct, union, class, interface or template.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.kind,
            AbstractKind::Struct(_)
                | AbstractKind::Union(_)
                | AbstractKind::Class { .. }
                | AbstractKind::Interface { .. }
                | AbstractKind::Template(_)
        )
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, AbstractKind::Primitive(_))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self.kind {
            AbstractKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    /// Element type of arrays, value type of associative arrays, pointee of
    /// pointers.
    pub fn element_type(&self) -> Option<&AbstractType> {
        match &self.kind {
            AbstractKind::Array { element, .. } => Some(element),
            AbstractKind::AssocArray { value, .. } => Some(value),
            AbstractKind::Pointer(base) => Some(base),
            _ => None,
        }
    }

    /// Base class of a class type.
    pub fn base_class(&self) -> Option<&AbstractType> {
        match &self.kind {
            AbstractKind::Class { base, .. } => base.as_deref(),
            _ => None,
        }
    }

    /// Name of the declaration or symbol behind this type, if it has one.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            AbstractKind::Struct(handle)
            | AbstractKind::Union(handle)
            | AbstractKind::Template(handle)
            | AbstractKind::Class { decl: handle, .. }
            | AbstractKind::Interface { decl: handle, .. }
            | AbstractKind::Enum { decl: handle, .. }
            | AbstractKind::Aliased { decl: handle, .. }
            | AbstractKind::TemplateParameter { param: handle, .. } => Some(&handle.name),
            AbstractKind::Member { name, .. } | AbstractKind::Module { name, .. } | AbstractKind::Package(name) => {
                Some(name)
            }
            _ => None,
        }
    }

    fn write_instance_args(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound: Vec<&TemplateValue> = self.deduced.iter().filter_map(|(_, v)| v).collect();
        if bound.is_empty() {
            return Ok(());
        }
        f.write_str("!(")?;
        for (i, value) in bound.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for AbstractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AbstractKind::Primitive(kind) => write!(f, "{kind}"),
            AbstractKind::Pointer(base) => write!(f, "{base}*"),
            AbstractKind::Array { element, length: Some(n) } => write!(f, "{element}[{n}]"),
            AbstractKind::Array { element, length: None } => write!(f, "{element}[]"),
            AbstractKind::AssocArray { key, value } => write!(f, "{value}[{key}]"),
            AbstractKind::Delegate { return_type, params, is_function, .. } => {
                let keyword = if *is_function { "function" } else { "delegate" };
                write!(f, "{return_type} {keyword}(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{param}")?;
                }
                f.write_str(")")
            }
            AbstractKind::Struct(handle)
            | AbstractKind::Union(handle)
            | AbstractKind::Template(handle)
            | AbstractKind::Class { decl: handle, .. }
            | AbstractKind::Interface { decl: handle, .. }
            | AbstractKind::Enum { decl: handle, .. } => {
                f.write_str(&handle.name)?;
                self.write_instance_args(f)
            }
            AbstractKind::Module { name, .. } => write!(f, "module {name}"),
            AbstractKind::Package(name) => write!(f, "package {name}"),
            AbstractKind::Member { name, base, .. } | AbstractKind::Aliased { decl: DeclHandle { name, .. }, base } => {
                match base {
                    Some(base) => write!(f, "{base}"),
                    None => f.write_str(name),
                }
            }
            AbstractKind::TemplateParameter { param, value } => match value {
                Some(value) => write!(f, "{value}"),
                None => f.write_str(&param.name),
            },
        }
    }
}
