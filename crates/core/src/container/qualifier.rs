use std::collections::{BTreeMap, BTreeSet};

/// A member value inside a qualifier.
///
/// Qualifiers carry an ordered set of named members; equality of a qualifier
/// includes equality of every member value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemberValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<bool> for MemberValue {
    fn from(value: bool) -> Self {
        MemberValue::Bool(value)
    }
}

impl From<i64> for MemberValue {
    fn from(value: i64) -> Self {
        MemberValue::Int(value)
    }
}

impl From<&str> for MemberValue {
    fn from(value: &str) -> Self {
        MemberValue::Str(value.to_string())
    }
}

impl From<String> for MemberValue {
    fn from(value: String) -> Self {
        MemberValue::Str(value)
    }
}

impl std::fmt::Display for MemberValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberValue::Bool(v) => write!(f, "{}", v),
            MemberValue::Int(v) => write!(f, "{}", v),
            MemberValue::Str(v) => write!(f, "{}", v),
        }
    }
}

/// An opaque tagged value identifying a provider variant.
///
/// A qualifier is a type identifier plus named member values. Two qualifiers
/// are equal when the type identifier and all member values match. Compared
/// structurally; there is no reflection involved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Qualifier {
    name: String,
    members: BTreeMap<String, MemberValue>,
}

impl Qualifier {
    /// Create a qualifier with the given type identifier and no members
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    /// Add a member value
    pub fn with_member(mut self, key: impl Into<String>, value: impl Into<MemberValue>) -> Self {
        self.members.insert(key.into(), value.into());
        self
    }

    /// The built-in qualifier implied by an unqualified request
    pub fn default_qualifier() -> Self {
        Self::new("Default")
    }

    /// The built-in qualifier carried by every provider
    pub fn any() -> Self {
        Self::new("Any")
    }

    /// Qualifier type identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member values, ordered by member name
    pub fn members(&self) -> &BTreeMap<String, MemberValue> {
        &self.members
    }
}

impl std::fmt::Display for Qualifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.members.is_empty() {
            return write!(f, "@{}", self.name);
        }
        write!(f, "@{}(", self.name)?;
        for (i, (key, value)) in self.members.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, ")")
    }
}

/// Deduplicated, order-independent set of qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QualifierSet {
    items: BTreeSet<Qualifier>,
}

impl QualifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from a slice, deduplicating structurally equal entries
    pub fn from_slice(qualifiers: &[Qualifier]) -> Self {
        Self {
            items: qualifiers.iter().cloned().collect(),
        }
    }

    /// Insert a qualifier; structurally equal duplicates collapse
    pub fn insert(&mut self, qualifier: Qualifier) {
        self.items.insert(qualifier);
    }

    pub fn contains(&self, qualifier: &Qualifier) -> bool {
        self.items.contains(qualifier)
    }

    /// Check that every qualifier of `other` is present in this set
    pub fn contains_all(&self, other: &QualifierSet) -> bool {
        other.items.iter().all(|q| self.items.contains(q))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Qualifier> {
        self.items.iter()
    }
}

impl FromIterator<Qualifier> for QualifierSet {
    fn from_iter<I: IntoIterator<Item = Qualifier>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = Qualifier::new("Tenant").with_member("id", 42i64);
        let b = Qualifier::new("Tenant").with_member("id", 42i64);
        let c = Qualifier::new("Tenant").with_member("id", 7i64);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Qualifier::new("Tenant"));
    }

    #[test]
    fn test_member_order_does_not_matter() {
        let a = Qualifier::new("Endpoint")
            .with_member("host", "localhost")
            .with_member("port", 8080i64);
        let b = Qualifier::new("Endpoint")
            .with_member("port", 8080i64)
            .with_member("host", "localhost");

        assert_eq!(a, b);
    }

    #[test]
    fn test_set_dedup_and_superset() {
        let set = QualifierSet::from_slice(&[
            Qualifier::any(),
            Qualifier::new("Fast"),
            Qualifier::new("Fast"),
        ]);
        assert_eq!(set.len(), 2);

        let requested = QualifierSet::from_slice(&[Qualifier::new("Fast")]);
        assert!(set.contains_all(&requested));

        let missing = QualifierSet::from_slice(&[Qualifier::new("Slow")]);
        assert!(!set.contains_all(&missing));

        // Empty request is satisfied by anything
        assert!(set.contains_all(&QualifierSet::new()));
    }

    #[test]
    fn test_display() {
        let q = Qualifier::new("Endpoint")
            .with_member("host", "localhost")
            .with_member("secure", true);
        assert_eq!(format!("{}", q), "@Endpoint(host=localhost, secure=true)");
        assert_eq!(format!("{}", Qualifier::any()), "@Any");
    }
}
