/// Scope tags supported by the container.
///
/// Every provider declares exactly one scope. Each scope tag maps to one
/// context implementation at runtime; multiple context instances of the same
/// tag may coexist (one per request, for example), with at most one active
/// per logical execution unit at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Single instance shared across the whole container
    Singleton,
    /// Instance per request-like unit of work
    Request,
    /// Instance per session-like unit of work
    Session,
    /// Caller-managed: a fresh instance per resolution, owned by the handle
    Dependent,
    /// Application-defined scope tag
    Custom(&'static str),
}

impl Scope {
    /// Check if the scope is singleton
    pub fn is_singleton(&self) -> bool {
        matches!(self, Scope::Singleton)
    }

    /// Check if the scope is caller-managed
    pub fn is_dependent(&self) -> bool {
        matches!(self, Scope::Dependent)
    }

    /// Check if instances of this scope live in a shared context
    pub fn is_context_backed(&self) -> bool {
        !self.is_dependent()
    }

    /// Get the scope name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Singleton => "singleton",
            Scope::Request => "request",
            Scope::Session => "session",
            Scope::Dependent => "dependent",
            Scope::Custom(name) => name,
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Dependent
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = crate::errors::ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "singleton" => Ok(Scope::Singleton),
            "request" => Ok(Scope::Request),
            "session" => Ok(Scope::Session),
            "dependent" => Ok(Scope::Dependent),
            _ => Err(crate::errors::ContainerError::UnknownScope {
                scope: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_str() {
        assert_eq!("singleton".parse::<Scope>().unwrap(), Scope::Singleton);
        assert_eq!("request".parse::<Scope>().unwrap(), Scope::Request);
        assert_eq!("session".parse::<Scope>().unwrap(), Scope::Session);
        assert_eq!("dependent".parse::<Scope>().unwrap(), Scope::Dependent);

        assert!("invalid".parse::<Scope>().is_err());
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(format!("{}", Scope::Singleton), "singleton");
        assert_eq!(format!("{}", Scope::Request), "request");
        assert_eq!(format!("{}", Scope::Custom("conversation")), "conversation");
    }

    #[test]
    fn test_scope_predicates() {
        assert!(Scope::Singleton.is_singleton());
        assert!(Scope::Dependent.is_dependent());
        assert!(!Scope::Dependent.is_context_backed());
        assert!(Scope::Request.is_context_backed());
    }
}
