//! Seams to the outside world
//!
//! The registry never resolves items itself. It asks an [`ItemCatalog`]
//! whether an identifier exists and which intrinsic traits it carries, and
//! lets individual item instances answer for themselves through a
//! [`StackClassifier`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::Identifier;

/// Intrinsic classification defaults supplied by the catalog
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntrinsicTraits {
    /// Intrinsically a sword (e.g. a sword item type)
    pub sword: bool,
    /// Intrinsically a weapon-like tool (e.g. an axe)
    pub weapon: bool,
}

impl IntrinsicTraits {
    pub const NONE: IntrinsicTraits = IntrinsicTraits {
        sword: false,
        weapon: false,
    };

    pub const SWORD: IntrinsicTraits = IntrinsicTraits {
        sword: true,
        weapon: false,
    };

    pub const WEAPON: IntrinsicTraits = IntrinsicTraits {
        sword: false,
        weapon: true,
    };
}

/// Item catalog - resolves identifiers to known items
pub trait ItemCatalog: Send + Sync {
    /// Does the catalog know this item?
    fn contains(&self, id: &Identifier) -> bool;

    /// Intrinsic traits of the item; unknown items have none
    fn traits(&self, id: &Identifier) -> IntrinsicTraits;

    fn has_sword_trait(&self, id: &Identifier) -> bool {
        self.traits(id).sword
    }

    fn has_weapon_trait(&self, id: &Identifier) -> bool {
        self.traits(id).weapon
    }
}

/// Read-only view of the forbidden lists
///
/// This is the only registry context a [`StackClassifier`] receives, so a
/// classifier cannot call back into the identifier predicates it shadows.
pub trait ForbiddenQuery {
    fn is_sword_forbidden(&self, id: &Identifier) -> bool;
    fn is_weapon_forbidden(&self, id: &Identifier) -> bool;
}

/// Per-instance classification override
///
/// An item instance exposing this capability decides for itself whether it
/// is a sword or a weapon. `is_weapon` should return true whenever
/// `is_sword` does.
pub trait StackClassifier: Send + Sync {
    fn is_sword(&self, id: &Identifier, registry: &dyn ForbiddenQuery) -> bool;
    fn is_weapon(&self, id: &Identifier, registry: &dyn ForbiddenQuery) -> bool;
}

/// A concrete item instance
pub trait ItemInstance: Send + Sync {
    fn identifier(&self) -> &Identifier;

    /// Empty instances are never swords or weapons
    fn is_empty(&self) -> bool {
        false
    }

    fn classifier(&self) -> Option<&dyn StackClassifier> {
        None
    }
}

/// A stack of items with an optional classifier capability
#[derive(Clone)]
pub struct ItemStack {
    pub id: Identifier,
    pub count: u32,
    classifier: Option<Arc<dyn StackClassifier>>,
}

impl ItemStack {
    pub fn new(id: Identifier, count: u32) -> Self {
        ItemStack {
            id,
            count,
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn StackClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }
}

impl ItemInstance for ItemStack {
    fn identifier(&self) -> &Identifier {
        &self.id
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn classifier(&self) -> Option<&dyn StackClassifier> {
        self.classifier.as_deref()
    }
}

impl fmt::Debug for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemStack")
            .field("id", &self.id)
            .field("count", &self.count)
            .field("classifier", &self.classifier.is_some())
            .finish()
    }
}

/// In-memory catalog
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    items: HashMap<Identifier, IntrinsicTraits>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        StaticCatalog::default()
    }

    /// Insert or update an item
    pub fn insert(&mut self, id: Identifier, traits: IntrinsicTraits) {
        self.items.insert(id, traits);
    }

    /// Builder-style insert
    pub fn with(mut self, id: Identifier, traits: IntrinsicTraits) -> Self {
        self.insert(id, traits);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ItemCatalog for StaticCatalog {
    fn contains(&self, id: &Identifier) -> bool {
        self.items.contains_key(id)
    }

    fn traits(&self, id: &Identifier) -> IntrinsicTraits {
        self.items.get(id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    struct AlwaysSword;

    impl StackClassifier for AlwaysSword {
        fn is_sword(&self, id: &Identifier, registry: &dyn ForbiddenQuery) -> bool {
            !registry.is_sword_forbidden(id)
        }

        fn is_weapon(&self, id: &Identifier, registry: &dyn ForbiddenQuery) -> bool {
            !registry.is_weapon_forbidden(id)
        }
    }

    #[test]
    fn test_static_catalog_traits() {
        let catalog = StaticCatalog::new()
            .with(id("vanilla:iron_sword"), IntrinsicTraits::SWORD)
            .with(id("vanilla:iron_axe"), IntrinsicTraits::WEAPON)
            .with(id("vanilla:stick"), IntrinsicTraits::NONE);

        assert_eq!(catalog.len(), 3);
        assert!(catalog.has_sword_trait(&id("vanilla:iron_sword")));
        assert!(!catalog.has_weapon_trait(&id("vanilla:iron_sword")));
        assert!(catalog.has_weapon_trait(&id("vanilla:iron_axe")));
        assert!(catalog.contains(&id("vanilla:stick")));
        assert!(!catalog.contains(&id("vanilla:missing")));
        assert_eq!(catalog.traits(&id("vanilla:missing")), IntrinsicTraits::NONE);
    }

    #[test]
    fn test_item_stack_capability() {
        let plain = ItemStack::new(id("modx:club"), 1);
        assert!(plain.classifier().is_none());
        assert!(!plain.is_empty());

        let empty = ItemStack::new(id("modx:club"), 0);
        assert!(empty.is_empty());

        let custom = ItemStack::new(id("modx:rapier"), 1).with_classifier(Arc::new(AlwaysSword));
        assert!(custom.classifier().is_some());
    }
}
