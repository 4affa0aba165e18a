/*!
 * Core Types
 * Common types used across the adaptor
 */

use serde::{Deserialize, Serialize};

/// Concurrent processing lane identifier, in `[0, lane_count)`
pub type LaneId = u32;

/// Index disambiguating concurrently open run scopes
pub type RunIndex = u32;

/// Index disambiguating concurrently open luminosity block scopes
pub type LuminosityBlockIndex = u32;

/// Identifier under which a produced item is committed to a scope container
pub type ProductId = u32;

/// Unique identity of one scope container instance
pub type ContainerId = u64;

/// Common result type for adaptor operations
pub type AdaptorResult<T> = Result<T, super::errors::AdaptorError>;

/// Scope classification for a product's destination container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Event,
    LuminosityBlock,
    Run,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 3] = [ScopeKind::Event, ScopeKind::LuminosityBlock, ScopeKind::Run];

    /// Dense index for per-scope lookup tables
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ScopeKind::Event => 0,
            ScopeKind::LuminosityBlock => 1,
            ScopeKind::Run => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Event => "event",
            ScopeKind::LuminosityBlock => "luminosity_block",
            ScopeKind::Run => "run",
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved reference to a product's storage slot in a scope container
///
/// Resolved once per declared product per [`ScopeKind`], then cached so
/// per-event input fetches never repeat the name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductHandle(u32);

impl ProductHandle {
    /// Sentinel for a "may consume" product the resolver could not find
    pub const ABSENT: ProductHandle = ProductHandle(u32::MAX);

    #[inline]
    pub const fn new(raw: u32) -> Self {
        ProductHandle(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_absent(self) -> bool {
        self.0 == u32::MAX
    }
}

/// Immutable identity of one adaptor instance
///
/// Injected at construction and read-only afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModuleDescription {
    pub label: String,
    pub type_name: String,
    pub config_id: u64,
}

impl ModuleDescription {
    pub fn new(label: impl Into<String>, type_name: impl Into<String>, config_id: u64) -> Self {
        Self {
            label: label.into(),
            type_name: type_name.into(),
            config_id,
        }
    }
}

impl std::fmt::Display for ModuleDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.label, self.type_name)
    }
}

/// Input file boundary notification payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileBlock {
    pub file_name: String,
    /// Monotonically increasing open ordinal assigned by the input source
    pub ordinal: u64,
}

impl FileBlock {
    pub fn new(file_name: impl Into<String>, ordinal: u64) -> Self {
        Self {
            file_name: file_name.into(),
            ordinal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_kind_indices_are_dense() {
        for (i, kind) in ScopeKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_absent_handle_sentinel() {
        assert!(ProductHandle::ABSENT.is_absent());
        assert!(!ProductHandle::new(0).is_absent());
        assert!(!ProductHandle::new(42).is_absent());
    }

    #[test]
    fn test_module_description_display() {
        let md = ModuleDescription::new("tracker", "HitProducer", 7);
        assert_eq!(md.to_string(), "tracker/HitProducer");
    }
}
