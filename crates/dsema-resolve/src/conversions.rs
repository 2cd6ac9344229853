//! Type identity and implicit conversion rules used by overload filtering.

use dsema_syntax::PrimitiveKind;

use crate::types::{AbstractKind, AbstractType, ConstValue, TemplateValue};

/// Structural type identity after stripping aliases and members.
pub fn same_type(a: &AbstractType, b: &AbstractType) -> bool {
    let (Some(a), Some(b)) = (a.strip(), b.strip()) else {
        return false;
    };
    match (&a.kind, &b.kind) {
        (AbstractKind::Primitive(x), AbstractKind::Primitive(y)) => x == y,
        (AbstractKind::Pointer(x), AbstractKind::Pointer(y)) => same_type(x, y),
        (
            AbstractKind::Array { element: x, length: lx },
            AbstractKind::Array { element: y, length: ly },
        ) => lx == ly && same_type(x, y),
        (
            AbstractKind::AssocArray { key: kx, value: vx },
            AbstractKind::AssocArray { key: ky, value: vy },
        ) => same_type(kx, ky) && same_type(vx, vy),
        (
            AbstractKind::Delegate { return_type: rx, params: px, is_function: fx, .. },
            AbstractKind::Delegate { return_type: ry, params: py, is_function: fy, .. },
        ) => {
            fx == fy
                && px.len() == py.len()
                && same_type(rx, ry)
                && px.iter().zip(py).all(|(x, y)| same_type(x, y))
        }
        (AbstractKind::Module { module: x, .. }, AbstractKind::Module { module: y, .. }) => x == y,
        (AbstractKind::Package(x), AbstractKind::Package(y)) => x == y,
        (AbstractKind::TemplateParameter { param: x, .. }, AbstractKind::TemplateParameter { param: y, .. }) => {
            x.decl == y.decl
        }
        _ => match (a.declaration(), b.declaration()) {
            (Some(x), Some(y)) if x == y => same_instance_args(a, b),
            _ => false,
        },
    }
}

/// Two instances of one template are the same type when their bound
/// arguments agree.
fn same_instance_args(a: &AbstractType, b: &AbstractType) -> bool {
    a.deduced.iter().all(|(param, value)| match (value, b.deduced.get(param)) {
        (Some(x), Some(y)) => same_value(x, y),
        _ => true,
    })
}

pub fn same_value(a: &TemplateValue, b: &TemplateValue) -> bool {
    match (a, b) {
        (TemplateValue::Type(x), TemplateValue::Type(y)) | (TemplateValue::Symbol(x), TemplateValue::Symbol(y)) => {
            same_type(x, y) || x.declaration().is_some() && x.declaration() == y.declaration()
        }
        (TemplateValue::Value(x, _), TemplateValue::Value(y, _)) => x == y,
        (TemplateValue::Tuple(x), TemplateValue::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| same_value(x, y))
        }
        _ => false,
    }
}

/// Whether `class` is `target` or derives from it through base classes or
/// interfaces.
pub fn derives_from(class: &AbstractType, target: &AbstractType) -> bool {
    let Some(target_decl) = target.strip().and_then(AbstractType::declaration) else {
        return false;
    };
    let mut pending = vec![class];
    let mut budget = 64usize;
    while let Some(current) = pending.pop() {
        if budget == 0 {
            break;
        }
        budget -= 1;
        let Some(current) = current.strip() else { continue };
        if current.declaration() == Some(target_decl) {
            return true;
        }
        match &current.kind {
            AbstractKind::Class { base, interfaces, .. } => {
                pending.extend(base.as_deref());
                pending.extend(interfaces.iter());
            }
            AbstractKind::Interface { bases, .. } => pending.extend(bases.iter()),
            _ => {}
        }
    }
    false
}

/// Whether a value of type `from` converts implicitly to `to`.
///
/// Unbound template parameters on either side are accepted; the deduction
/// step is responsible for them.
pub fn is_implicitly_convertible(from: &AbstractType, to: &AbstractType) -> bool {
    let (Some(from), Some(to)) = (from.strip(), to.strip()) else {
        return true;
    };
    if same_type(from, to) {
        return true;
    }
    match (&from.kind, &to.kind) {
        (AbstractKind::TemplateParameter { value: None, .. }, _)
        | (_, AbstractKind::TemplateParameter { value: None, .. }) => true,
        (AbstractKind::Primitive(x), AbstractKind::Primitive(y)) => primitive_converts(*x, *y),
        (AbstractKind::Enum { base, .. }, AbstractKind::Primitive(_)) => match base {
            Some(base) => is_implicitly_convertible(base, to),
            None => matches!(to.kind, AbstractKind::Primitive(y) if primitive_converts(PrimitiveKind::Int, y)),
        },
        // `null` is typed `void*` and converts to any reference type.
        (AbstractKind::Pointer(pointee), _) if is_void(pointee) && is_reference(to) => true,
        (AbstractKind::Pointer(_), AbstractKind::Pointer(target)) => is_void(target),
        (AbstractKind::Array { element: x, .. }, AbstractKind::Array { element: y, length: None }) => {
            same_type(x, y)
        }
        (AbstractKind::Class { .. }, AbstractKind::Class { .. } | AbstractKind::Interface { .. })
        | (AbstractKind::Interface { .. }, AbstractKind::Interface { .. }) => derives_from(from, to),
        (AbstractKind::Delegate { is_literal: true, params: px, .. }, AbstractKind::Delegate { params: py, .. }) => {
            px.len() == py.len()
        }
        _ => false,
    }
}

/// Whether the constant `value` fits the primitive or array type `to`.
pub fn value_converts(value: &ConstValue, to: &AbstractType) -> bool {
    let Some(to) = to.strip() else { return true };
    match (&to.kind, value) {
        (AbstractKind::Primitive(kind), ConstValue::Int(v)) if kind.is_integral() || kind.is_character() => {
            int_fits(*v, *kind)
        }
        (AbstractKind::Primitive(kind), ConstValue::Int(v)) if *kind == PrimitiveKind::Bool => *v == 0 || *v == 1,
        (AbstractKind::Primitive(kind), ConstValue::Int(_) | ConstValue::Float(_)) => kind.is_floating(),
        (AbstractKind::Primitive(kind), ConstValue::Char(c)) => {
            kind.is_character() || kind.is_integral() && int_fits(*c as i128, *kind)
        }
        (AbstractKind::Primitive(kind), ConstValue::Bool(_)) => *kind == PrimitiveKind::Bool || kind.is_integral(),
        (AbstractKind::Array { element, .. }, ConstValue::Str(_)) => {
            element.strip().and_then(AbstractType::as_primitive).is_some_and(PrimitiveKind::is_character)
        }
        (AbstractKind::Enum { base: Some(base), .. }, _) => value_converts(value, base),
        (_, ConstValue::Null) => is_reference(to),
        _ => false,
    }
}

fn int_fits(value: i128, kind: PrimitiveKind) -> bool {
    let (min, max): (i128, i128) = match kind {
        PrimitiveKind::Byte => (i8::MIN.into(), i8::MAX.into()),
        PrimitiveKind::Ubyte | PrimitiveKind::Char => (0, u8::MAX.into()),
        PrimitiveKind::Short => (i16::MIN.into(), i16::MAX.into()),
        PrimitiveKind::Ushort | PrimitiveKind::Wchar => (0, u16::MAX.into()),
        PrimitiveKind::Int => (i32::MIN.into(), i32::MAX.into()),
        PrimitiveKind::Uint | PrimitiveKind::Dchar => (0, u32::MAX.into()),
        PrimitiveKind::Long => (i64::MIN.into(), i64::MAX.into()),
        PrimitiveKind::Ulong => (0, u64::MAX.into()),
        _ => return false,
    };
    (min..=max).contains(&value)
}

/// Arithmetic widening; narrowing from floating to integral is rejected.
fn primitive_converts(from: PrimitiveKind, to: PrimitiveKind) -> bool {
    if from == PrimitiveKind::Void || to == PrimitiveKind::Void {
        return from == to;
    }
    if from.is_floating() && !to.is_floating() {
        return false;
    }
    from.is_arithmetic() && to.is_arithmetic()
}

fn is_void(ty: &AbstractType) -> bool {
    ty.strip().and_then(AbstractType::as_primitive) == Some(PrimitiveKind::Void)
}

fn is_reference(ty: &AbstractType) -> bool {
    matches!(
        ty.kind,
        AbstractKind::Pointer(_)
            | AbstractKind::Class { .. }
            | AbstractKind::Interface { .. }
            | AbstractKind::Array { length: None, .. }
            | AbstractKind::AssocArray { .. }
            | AbstractKind::Delegate { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeclHandle;
    use dsema_syntax::{DeclId, DeclRef, ModuleId};

    fn class(decl: u32, name: &str, base: Option<AbstractType>) -> AbstractType {
        AbstractType::new(AbstractKind::Class {
            decl: DeclHandle::new(DeclRef::new(ModuleId(0), DeclId(decl)), name),
            base: base.map(Box::new),
            interfaces: Vec::new(),
        })
    }

    #[test]
    fn derived_classes_convert_to_their_bases() {
        let base = class(1, "Base", None);
        let derived = class(2, "Derived", Some(base.clone()));
        assert!(is_implicitly_convertible(&derived, &base));
        assert!(!is_implicitly_convertible(&base, &derived));
    }

    #[test]
    fn arithmetic_widens_but_does_not_truncate_floats() {
        let int = AbstractType::primitive(PrimitiveKind::Int);
        let double = AbstractType::primitive(PrimitiveKind::Double);
        assert!(is_implicitly_convertible(&int, &double));
        assert!(!is_implicitly_convertible(&double, &int));
    }

    #[test]
    fn null_converts_to_references_only() {
        let null = ConstValue::Null.natural_type();
        assert!(is_implicitly_convertible(&null, &class(1, "C", None)));
        assert!(!is_implicitly_convertible(&null, &AbstractType::primitive(PrimitiveKind::Int)));
    }

    #[test]
    fn constants_are_range_checked() {
        let ubyte = AbstractType::primitive(PrimitiveKind::Ubyte);
        assert!(value_converts(&ConstValue::Int(255), &ubyte));
        assert!(!value_converts(&ConstValue::Int(256), &ubyte));
        assert!(value_converts(&ConstValue::Str("x".into()), &AbstractType::string()));
    }
}
