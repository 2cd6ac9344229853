//! Compiler-intrinsic properties (`sizeof`, `length`, `classinfo`, ...).
//!
//! Consulted after ordinary member lookup comes back empty. Each property
//! resolves to a `Member` whose symbol is synthetic and whose base is the
//! property's type.

use dsema_syntax::PrimitiveKind;

use crate::context::ResolutionContext;
use crate::core::Resolver;
use crate::types::{AbstractKind, AbstractType, SymbolRef, SyntheticKind};

/// Resolves the intrinsic property `name` of `target`, or `None` if the
/// type has no such property.
pub fn resolve(
    resolver: &Resolver,
    target: &AbstractType,
    name: &str,
    ctx: &mut ResolutionContext,
) -> Option<AbstractType> {
    let ty = property_type(resolver, target, name, ctx)?;
    log::trace!("`{target}.{name}` is an intrinsic property");
    let symbol = SymbolRef::synthetic(name, SyntheticKind::StaticProperty);
    Some(AbstractType::member(symbol, name, Some(ty)))
}

fn property_type(
    resolver: &Resolver,
    target: &AbstractType,
    name: &str,
    ctx: &mut ResolutionContext,
) -> Option<AbstractType> {
    if matches!(target.kind, AbstractKind::Module { .. } | AbstractKind::Package(_)) {
        return None;
    }
    match name {
        "sizeof" | "alignof" => return Some(AbstractType::size_t()),
        "mangleof" | "stringof" => return Some(AbstractType::string()),
        "init" => return Some(target.clone()),
        _ => {}
    }
    match &target.kind {
        AbstractKind::Primitive(kind) => numeric_property(*kind, target, name),
        AbstractKind::Array { element, .. } => match name {
            "length" => Some(AbstractType::size_t()),
            "ptr" => Some(AbstractType::pointer((**element).clone())),
            "dup" | "idup" => Some(AbstractType::array((**element).clone())),
            "reverse" | "sort" => Some(target.clone()),
            _ => None,
        },
        AbstractKind::AssocArray { key, value } => match name {
            "length" => Some(AbstractType::size_t()),
            "keys" | "byKey" => Some(AbstractType::array((**key).clone())),
            "values" | "byValue" => Some(AbstractType::array((**value).clone())),
            "dup" | "rehash" => Some(target.clone()),
            _ => None,
        },
        AbstractKind::Enum { .. } => match name {
            "min" | "max" => Some(target.clone()),
            _ => None,
        },
        AbstractKind::Class { .. } => match name {
            "classinfo" => Some(class_info(resolver, ctx)),
            _ => None,
        },
        AbstractKind::Delegate { return_type, params, is_literal, .. } => match name {
            "ptr" => Some(AbstractType::pointer(AbstractType::void())),
            "funcptr" => Some(AbstractType::new(AbstractKind::Delegate {
                return_type: return_type.clone(),
                params: params.clone(),
                is_literal: *is_literal,
                is_function: true,
            })),
            _ => None,
        },
        _ => None,
    }
}

fn numeric_property(kind: PrimitiveKind, target: &AbstractType, name: &str) -> Option<AbstractType> {
    if kind.is_floating() {
        return match name {
            "min" | "max" | "nan" | "infinity" | "epsilon" | "min_normal" => Some(target.clone()),
            "dig" | "mant_dig" | "max_exp" | "min_exp" | "max_10_exp" | "min_10_exp" => {
                Some(AbstractType::primitive(PrimitiveKind::Int))
            }
            _ => None,
        };
    }
    match name {
        "min" | "max" if kind.is_integral() || kind.is_character() => Some(target.clone()),
        _ => None,
    }
}

/// `TypeInfo_Class` from the object module when it is loaded, `void*`
/// otherwise.
fn class_info(resolver: &Resolver, ctx: &mut ResolutionContext) -> AbstractType {
    let declared = resolver.index.types_named("TypeInfo_Class").first().copied();
    declared
        .and_then(|decl| resolver.aggregate_type(decl, ctx))
        .unwrap_or_else(|| AbstractType::pointer(AbstractType::void()))
}
