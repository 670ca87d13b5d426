//! Index stacks for nonterminal symbols.
//!
//! An indexed nonterminal carries a pushdown-style *index*: an ordered
//! sequence of symbols that refines the abstraction (e.g. the height of a
//! balanced tree). Three symbol kinds exist:
//!
//! - **concrete** symbols from a fixed, finite alphabet;
//! - **abstract** symbols, placeholders that can be *materialized* into a
//!   concrete sequence (an abstract symbol only ever occurs as the last
//!   element of an index);
//! - the distinguished **variable**, which stands for "and whatever follows"
//!   and likewise only occurs last. Substituting the variable by a sequence
//!   is called *instantiation*.
//!
//! Materialization rules are owned by an external collaborator; this crate
//! only asks a [`MaterializationRuleProvider`] whether a computed expansion
//! is admissible.

use std::fmt;

/// A single symbol of an index stack.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum IndexSymbol {
    /// A concrete symbol of the index alphabet.
    Concrete(String),
    /// An abstract symbol that can be materialized; only valid as the last
    /// element of an index.
    Abstract(String),
    /// The stack variable; only valid as the last element of an index.
    Variable,
}

impl IndexSymbol {
    pub fn concrete(name: impl Into<String>) -> Self {
        IndexSymbol::Concrete(name.into())
    }

    pub fn abstracted(name: impl Into<String>) -> Self {
        IndexSymbol::Abstract(name.into())
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, IndexSymbol::Concrete(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, IndexSymbol::Abstract(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, IndexSymbol::Variable)
    }
}

impl fmt::Display for IndexSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexSymbol::Concrete(name) => write!(f, "{}", name),
            IndexSymbol::Abstract(name) => write!(f, "{}", name),
            IndexSymbol::Variable => write!(f, "()"),
        }
    }
}

/// An index stack attached to a nonterminal.
///
/// Invariant: an [`IndexSymbol::Abstract`] or [`IndexSymbol::Variable`]
/// symbol occurs only as the last element. Constructors assert this.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Index {
    symbols: Vec<IndexSymbol>,
}

impl Index {
    pub fn new(symbols: Vec<IndexSymbol>) -> Self {
        for (i, symbol) in symbols.iter().enumerate() {
            if i + 1 < symbols.len() {
                assert!(
                    symbol.is_concrete(),
                    "non-concrete index symbol {} before the last position",
                    symbol
                );
            }
        }
        Index { symbols }
    }

    pub fn symbols(&self) -> &[IndexSymbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn last(&self) -> Option<&IndexSymbol> {
        self.symbols.last()
    }

    pub fn ends_with_variable(&self) -> bool {
        matches!(self.last(), Some(IndexSymbol::Variable))
    }

    pub fn ends_with_abstract(&self) -> bool {
        matches!(self.last(), Some(IndexSymbol::Abstract(_)))
    }

    /// Replace the last symbol by `tail`, i.e. apply a materialization or an
    /// instantiation to this index.
    ///
    /// The last symbol must be abstract or the variable.
    pub fn with_prolonged(&self, tail: &[IndexSymbol]) -> Index {
        assert!(
            self.ends_with_abstract() || self.ends_with_variable(),
            "cannot prolong an index ending with a concrete symbol"
        );
        let mut symbols = self.symbols.clone();
        symbols.pop();
        symbols.extend_from_slice(tail);
        Index::new(symbols)
    }

    /// Positional matching against a pattern index.
    ///
    /// Symbols must be pairwise equal; a [`IndexSymbol::Variable`] in the
    /// pattern absorbs any remaining suffix of `self` (including the empty
    /// one).
    pub fn matches(&self, pattern: &Index) -> bool {
        let mut i = 0;
        loop {
            match (self.symbols.get(i), pattern.symbols.get(i)) {
                (_, Some(IndexSymbol::Variable)) => return true,
                (Some(a), Some(b)) if a == b => i += 1,
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for symbol in &self.symbols {
            write!(f, "{}", symbol)?;
        }
        Ok(())
    }
}

/// External provider of materialization rules.
///
/// The index matcher computes which expansion an abstract symbol *needs*;
/// the provider decides whether that expansion is *admissible*. A provider
/// that rejects an expansion the grammar requires indicates a data
/// inconsistency between grammar and materializer, reported as
/// [`MaterializeError`](crate::index_check::MaterializeError).
pub trait MaterializationRuleProvider {
    fn can_materialize(&self, symbol: &str, expansion: &[IndexSymbol]) -> bool;
}

/// Provider that admits every expansion. Suitable when the grammar is the
/// single source of truth for index alphabets.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveMaterialization;

impl MaterializationRuleProvider for PermissiveMaterialization {
    fn can_materialize(&self, _symbol: &str, _expansion: &[IndexSymbol]) -> bool {
        true
    }
}

/// Table-driven provider: each abstract symbol owns the set of symbol names
/// that may appear in its expansions.
#[derive(Debug, Default, Clone)]
pub struct MaterializationRules {
    allowed: std::collections::HashMap<String, std::collections::HashSet<String>>,
}

impl MaterializationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the alphabet an abstract symbol may expand into.
    pub fn allow(&mut self, symbol: impl Into<String>, alphabet: &[&str]) {
        self.allowed
            .entry(symbol.into())
            .or_default()
            .extend(alphabet.iter().map(|s| s.to_string()));
    }
}

impl MaterializationRuleProvider for MaterializationRules {
    fn can_materialize(&self, symbol: &str, expansion: &[IndexSymbol]) -> bool {
        let Some(alphabet) = self.allowed.get(symbol) else {
            return false;
        };
        expansion.iter().all(|s| match s {
            IndexSymbol::Concrete(name) | IndexSymbol::Abstract(name) => alphabet.contains(name),
            IndexSymbol::Variable => false,
        })
    }
}
