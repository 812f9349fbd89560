use std::any::TypeId;

/// Identity of a single Rust type, captured without allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    /// Create a key for a type
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Structural descriptor of a requested or provided contract type.
///
/// Matching is structural, not subtype-polymorphic: a provider declares the
/// full set of contract exprs it can satisfy, and a request either names an
/// exact type or a parameterized shape whose arguments may be wildcards.
/// `Parameterized` exists for contracts erased behind a shared raw key;
/// ordinary Rust generics are distinct `TypeId`s and match via `Exact`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A concrete type, matched by `TypeId` equality
    Exact(TypeKey),
    /// A raw contract key applied to argument descriptors
    Parameterized { raw: TypeKey, args: Vec<TypeExpr> },
    /// Matches any declared type or argument
    Wildcard,
}

impl TypeExpr {
    /// Exact expr for a type
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeExpr::Exact(TypeKey::of::<T>())
    }

    /// Parameterized expr with a raw contract key and argument exprs
    pub fn parameterized<T: ?Sized + 'static>(args: Vec<TypeExpr>) -> Self {
        TypeExpr::Parameterized {
            raw: TypeKey::of::<T>(),
            args,
        }
    }

    pub fn wildcard() -> Self {
        TypeExpr::Wildcard
    }

    /// Check whether this expr, used as the pattern side, accepts a declared
    /// expr. Wildcards live in the pattern; arguments match covariantly.
    pub fn accepts(&self, declared: &TypeExpr) -> bool {
        match (self, declared) {
            (TypeExpr::Wildcard, _) => true,
            (TypeExpr::Exact(a), TypeExpr::Exact(b)) => a == b,
            (
                TypeExpr::Parameterized { raw: a, args: x },
                TypeExpr::Parameterized { raw: b, args: y },
            ) => a == b && x.len() == y.len() && x.iter().zip(y).all(|(p, d)| p.accepts(d)),
            _ => false,
        }
    }

    /// Human-readable name of the underlying type, for diagnostics
    pub fn type_name(&self) -> String {
        match self {
            TypeExpr::Exact(key) => key.type_name().to_string(),
            TypeExpr::Parameterized { raw, args } => {
                let inner: Vec<String> = args.iter().map(|a| a.type_name()).collect();
                format!("{}<{}>", raw.type_name(), inner.join(", "))
            }
            TypeExpr::Wildcard => "_".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    struct Repository;
    #[allow(dead_code)]
    struct User;
    #[allow(dead_code)]
    struct Order;

    #[test]
    fn test_exact_match() {
        let req = TypeExpr::of::<String>();
        assert!(req.accepts(&TypeExpr::of::<String>()));
        assert!(!req.accepts(&TypeExpr::of::<u32>()));
    }

    #[test]
    fn test_wildcard_accepts_anything() {
        let req = TypeExpr::wildcard();
        assert!(req.accepts(&TypeExpr::of::<String>()));
        assert!(req.accepts(&TypeExpr::parameterized::<Repository>(vec![
            TypeExpr::of::<User>()
        ])));
    }

    #[test]
    fn test_covariant_argument_match() {
        let declared = TypeExpr::parameterized::<Repository>(vec![TypeExpr::of::<User>()]);

        let exact_req = TypeExpr::parameterized::<Repository>(vec![TypeExpr::of::<User>()]);
        let open_req = TypeExpr::parameterized::<Repository>(vec![TypeExpr::wildcard()]);
        let other_req = TypeExpr::parameterized::<Repository>(vec![TypeExpr::of::<Order>()]);

        assert!(exact_req.accepts(&declared));
        assert!(open_req.accepts(&declared));
        assert!(!other_req.accepts(&declared));
    }

    #[test]
    fn test_exact_and_parameterized_are_disjoint() {
        let exact = TypeExpr::of::<Repository>();
        let parameterized = TypeExpr::parameterized::<Repository>(vec![TypeExpr::of::<User>()]);
        assert!(!exact.accepts(&parameterized));
        assert!(!parameterized.accepts(&exact));
    }

    #[test]
    fn test_type_name() {
        let expr = TypeExpr::parameterized::<Repository>(vec![TypeExpr::wildcard()]);
        assert!(expr.type_name().contains("Repository"));
        assert!(expr.type_name().ends_with("<_>"));
    }
}
