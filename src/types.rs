// src/types.rs

//! Small value types shared across the crate.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which half of a module a build target compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Production,
    Test,
}

impl Variant {
    /// Phase order: production sources are always built before tests.
    pub const ALL: [Variant; 2] = [Variant::Production, Variant::Test];

    pub fn for_tests(tests: bool) -> Self {
        if tests { Variant::Test } else { Variant::Production }
    }

    pub fn is_tests(self) -> bool {
        self == Variant::Test
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Production => "production",
            Variant::Test => "test",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" => Ok(Variant::Production),
            "test" | "tests" => Ok(Variant::Test),
            other => Err(format!(
                "invalid target variant: {other} (expected \"production\" or \"test\")"
            )),
        }
    }
}

/// The four classpaths a module dependency can contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClasspathKind {
    ProductionCompile,
    ProductionRuntime,
    TestCompile,
    TestRuntime,
}

impl ClasspathKind {
    pub fn compile(tests: bool) -> Self {
        if tests {
            ClasspathKind::TestCompile
        } else {
            ClasspathKind::ProductionCompile
        }
    }

    pub fn runtime(tests: bool) -> Self {
        if tests {
            ClasspathKind::TestRuntime
        } else {
            ClasspathKind::ProductionRuntime
        }
    }

    pub fn is_tests(self) -> bool {
        matches!(self, ClasspathKind::TestCompile | ClasspathKind::TestRuntime)
    }

    pub fn is_runtime(self) -> bool {
        matches!(
            self,
            ClasspathKind::ProductionRuntime | ClasspathKind::TestRuntime
        )
    }
}

/// Scope of a module-to-module dependency edge.
///
/// - `Compile`: visible everywhere (default).
/// - `Provided`: compile-only; absent from the production runtime.
/// - `Runtime`: runtime classpaths only, never used for compilation order.
/// - `Test`: test classpaths only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    #[default]
    Compile,
    Provided,
    Runtime,
    Test,
}

impl DependencyScope {
    pub fn is_included_in(self, kind: ClasspathKind) -> bool {
        match self {
            DependencyScope::Compile => true,
            DependencyScope::Provided => kind != ClasspathKind::ProductionRuntime,
            DependencyScope::Runtime => kind.is_runtime(),
            DependencyScope::Test => kind.is_tests(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_inclusion_matches_classpath_rules() {
        use ClasspathKind::*;

        assert!(DependencyScope::Compile.is_included_in(ProductionCompile));
        assert!(DependencyScope::Provided.is_included_in(TestCompile));
        assert!(!DependencyScope::Provided.is_included_in(ProductionRuntime));
        assert!(!DependencyScope::Runtime.is_included_in(ProductionCompile));
        assert!(DependencyScope::Runtime.is_included_in(TestRuntime));
        assert!(!DependencyScope::Test.is_included_in(ProductionCompile));
        assert!(DependencyScope::Test.is_included_in(TestCompile));
    }

    #[test]
    fn variant_parses_both_spellings() {
        assert_eq!("tests".parse::<Variant>(), Ok(Variant::Test));
        assert_eq!(" Production ".parse::<Variant>(), Ok(Variant::Production));
        assert!("main".parse::<Variant>().is_err());
    }
}
