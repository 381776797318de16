// src/project/target.rs

use std::fmt;

use crate::types::Variant;

/// One compilable half of a module.
///
/// Ordering is by module name, then variant, which is the order targets are
/// listed inside a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildTarget {
    pub module: String,
    pub variant: Variant,
}

impl BuildTarget {
    pub fn new(module: impl Into<String>, variant: Variant) -> Self {
        Self {
            module: module.into(),
            variant,
        }
    }

    pub fn production(module: impl Into<String>) -> Self {
        Self::new(module, Variant::Production)
    }

    pub fn test(module: impl Into<String>) -> Self {
        Self::new(module, Variant::Test)
    }

    pub fn is_tests(&self) -> bool {
        self.variant.is_tests()
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.variant)
    }
}
