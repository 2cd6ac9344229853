use super::common::{Attributes, DeclId, Visibility};
use super::expr::Expr;
use super::stmt::Block;
use super::types::{TemplateArg, TypeDecl};
use miette::SourceSpan;

/// A declaration node in a module arena.
///
/// `children` lists every declaration whose `parent` is this node: members of
/// an aggregate, parameters and locals of a function, top-level symbols of a
/// module.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub span: SourceSpan,
    pub parent: Option<DeclId>,
    pub children: Vec<DeclId>,
    /// Declared type, alias target, enum base type, or function return type.
    pub ty: Option<TypeDecl>,
    pub attributes: Attributes,
    pub kind: DeclKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Module,
    Import(ImportDecl),
    Variable(VariableDecl),
    Parameter(ParameterDecl),
    /// `alias Name = ty;`
    Alias,
    Function(FunctionDecl),
    Aggregate(AggregateDecl),
    Enum,
    EnumMember(Option<Expr>),
    TemplateParameter(TemplateParamKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    /// Fully qualified module name, e.g. `std.stdio`.
    pub module_name: String,
    /// `import io = std.stdio;`
    pub alias: Option<String>,
    pub is_public: bool,
    pub is_static: bool,
    /// `import std.stdio : writeln, w = write;`
    pub bindings: Vec<ImportBinding>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportBinding {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportBinding {
    pub fn visible_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl ImportDecl {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            alias: None,
            is_public: false,
            is_static: false,
            bindings: Vec::new(),
        }
    }

    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    pub fn renamed(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn static_only(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn bind(mut self, name: &str, alias: Option<&str>) -> Self {
        self.bindings.push(ImportBinding { name: name.to_string(), alias: alias.map(str::to_string) });
        self
    }

    pub fn is_selective(&self) -> bool {
        !self.bindings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableDecl {
    pub initializer: Option<Expr>,
    /// Set for `foreach` iteration variables.
    pub iteration: Option<IterationSource>,
}

/// Where a `foreach` variable takes its values from.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSource {
    pub aggregate: Expr,
    /// Upper bound of `foreach (i; lower .. upper)`.
    pub upper: Option<Expr>,
    /// Position of this variable among the loop's variables.
    pub index: usize,
    pub count: usize,
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterDecl {
    pub default: Option<Expr>,
    pub is_variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionDecl {
    pub params: Vec<DeclId>,
    pub template_params: Vec<DeclId>,
    pub body: Option<Block>,
    pub in_contract: Option<Block>,
    pub out_contract: Option<Block>,
    /// Name bound to the return value inside `out (name) { ... }`.
    pub out_result: Option<String>,
    /// Return type is inferred from the body.
    pub is_auto: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Struct,
    Union,
    Class,
    Interface,
    Template,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateDecl {
    pub kind: AggregateKind,
    pub base_classes: Vec<TypeDecl>,
    pub template_params: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateParamKind {
    /// `T`, `T : int`, `T = int`
    Type {
        specialization: Option<TypeDecl>,
        default: Option<TypeDecl>,
    },
    /// `int N`, `int N : 3`, `int N = 3`; the value type lives in `Declaration::ty`.
    Value {
        specialization: Option<Expr>,
        default: Option<Expr>,
    },
    /// `alias A`
    Alias {
        specialization: Option<TypeDecl>,
        default: Option<TemplateArg>,
    },
    /// `T...`
    Tuple,
    /// `this T`
    This,
}

impl Declaration {
    pub fn new(name: &str, kind: DeclKind, span: SourceSpan) -> Self {
        Self {
            name: name.to_string(),
            span,
            parent: None,
            children: Vec::new(),
            ty: None,
            attributes: Attributes::default(),
            kind,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionDecl> {
        match &self.kind {
            DeclKind::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggregateDecl> {
        match &self.kind {
            DeclKind::Aggregate(aggregate) => Some(aggregate),
            _ => None,
        }
    }

    pub fn as_import(&self) -> Option<&ImportDecl> {
        match &self.kind {
            DeclKind::Import(import) => Some(import),
            _ => None,
        }
    }

    pub fn as_template_parameter(&self) -> Option<&TemplateParamKind> {
        match &self.kind {
            DeclKind::TemplateParameter(kind) => Some(kind),
            _ => None,
        }
    }

    /// Template parameters declared directly on this node.
    pub fn template_params(&self) -> &[DeclId] {
        match &self.kind {
            DeclKind::Function(function) => &function.template_params,
            DeclKind::Aggregate(aggregate) => &aggregate.template_params,
            _ => &[],
        }
    }

    pub fn is_templated(&self) -> bool {
        !self.template_params().is_empty()
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, DeclKind::Function(_))
    }

    /// Struct, union, class, interface or template.
    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, DeclKind::Aggregate(_))
    }

    /// Declarations that name a type: aggregates, enums and aliases.
    pub fn is_type(&self) -> bool {
        matches!(self.kind, DeclKind::Aggregate(_) | DeclKind::Enum | DeclKind::Alias)
    }

    pub fn is_private(&self) -> bool {
        self.attributes.visibility == Visibility::Private
    }

    pub fn is_static(&self) -> bool {
        self.attributes.is_static
    }

    /// Anonymous enums inject their members into the enclosing scope.
    pub fn is_anonymous_enum(&self) -> bool {
        matches!(self.kind, DeclKind::Enum) && self.name.is_empty()
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            DeclKind::Module => "module",
            DeclKind::Import(_) => "import",
            DeclKind::Variable(_) => "variable",
            DeclKind::Parameter(_) => "parameter",
            DeclKind::Alias => "alias",
            DeclKind::Function(_) => "function",
            DeclKind::Aggregate(aggregate) => match aggregate.kind {
                AggregateKind::Struct => "struct",
                AggregateKind::Union => "union",
                AggregateKind::Class => "class",
                AggregateKind::Interface => "interface",
                AggregateKind::Template => "template",
            },
            DeclKind::Enum => "enum",
            DeclKind::EnumMember(_) => "enum member",
            DeclKind::TemplateParameter(_) => "template parameter",
        }
    }
}
