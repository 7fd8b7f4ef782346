//! Weapon registry - conflict resolution and classification
//!
//! All four category lists sit behind one lock. `register` holds the write
//! lock across the whole find / remove-others / add sequence, and every
//! predicate evaluates under a single read lock, so no reader ever sees an
//! override half applied.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info};

use armory_core::{
    ArmoryError, Category, ForbiddenQuery, Identifier, ItemCatalog, ItemInstance, WeaponKind,
};

use crate::{RegistryStore, Snapshot};

/// A request to put an identifier into a category
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Provenance for diagnostics, e.g. "Config", "Command", "Message:modx"
    pub origin: String,
    pub id: Identifier,
    pub category: Category,
    /// Relocate the identifier if it is already in another category
    pub override_existing: bool,
}

impl Registration {
    pub fn new(origin: impl Into<String>, id: Identifier, category: Category) -> Self {
        Registration {
            origin: origin.into(),
            id,
            category,
            override_existing: false,
        }
    }

    pub fn with_override(mut self, override_existing: bool) -> Self {
        self.override_existing = override_existing;
        self
    }
}

/// Result of a registration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Membership changed
    Added,
    /// Already in the target category
    Unchanged,
    /// Already in another category and no override was requested
    Conflict(Category),
}

impl RegisterOutcome {
    /// True only when set membership actually changed
    pub fn changed(self) -> bool {
        self == RegisterOutcome::Added
    }
}

/// Outbound replication hook
///
/// Implementations must not block: a slow replica is queued or dropped,
/// never waited on.
pub trait SyncSink: Send + Sync {
    fn push_entry(&self, category: Category, id: &Identifier);
}

/// The weapon classification registry
pub struct WeaponRegistry {
    store: RwLock<RegistryStore>,
    catalog: Arc<dyn ItemCatalog>,
    sink: Option<Arc<dyn SyncSink>>,
    serving: AtomicBool,
}

impl WeaponRegistry {
    /// Create an empty registry backed by `catalog`
    pub fn new(catalog: Arc<dyn ItemCatalog>) -> Self {
        WeaponRegistry {
            store: RwLock::new(RegistryStore::new()),
            catalog,
            sink: None,
            serving: AtomicBool::new(false),
        }
    }

    /// Attach the replication hook used once serving
    pub fn with_sink(mut self, sink: Arc<dyn SyncSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn catalog(&self) -> &Arc<dyn ItemCatalog> {
        &self.catalog
    }

    /// Signal that startup loading is finished; from now on every change is
    /// pushed to replicas
    pub fn start_serving(&self) {
        if !self.serving.swap(true, Ordering::AcqRel) {
            info!("registry is serving, changes will be pushed to replicas");
        }
    }

    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    /// Apply a registration request
    pub fn register(&self, request: &Registration) -> RegisterOutcome {
        let Registration {
            origin,
            id,
            category,
            override_existing,
        } = request;
        let mut store = self.store.write();

        if let Some(existing) = store.find_category(id, Some(*category)) {
            if !override_existing {
                let conflict = ArmoryError::Conflict {
                    id: id.clone(),
                    target: *category,
                    existing,
                };
                error!(origin = %origin, "{}", conflict);
                return RegisterOutcome::Conflict(existing);
            }
            for other in Category::ALL {
                if other != *category && store.remove(other, id) {
                    info!(origin = %origin, "Removed {} from the {} list", id, other);
                }
            }
        }

        if store.add(*category, id.clone()) {
            info!(origin = %origin, "Added {} to the {} list", id, category);
            if self.is_serving() {
                if let Some(sink) = &self.sink {
                    // Still under the write lock so replicas see changes in order
                    sink.push_entry(*category, id);
                }
            }
            RegisterOutcome::Added
        } else {
            debug!(origin = %origin, "{} was already on the {} list", id, category);
            RegisterOutcome::Unchanged
        }
    }

    /// Category currently holding `id`
    pub fn category_of(&self, id: &Identifier) -> Option<Category> {
        self.store.read().find_category(id, None)
    }

    pub fn contains(&self, category: Category, id: &Identifier) -> bool {
        self.store.read().contains(category, id)
    }

    /// Number of classified identifiers
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    pub fn count(&self, category: Category) -> usize {
        self.store.read().count(category)
    }

    /// Forbidden as a sword, directly or by being forbidden as a weapon
    pub fn is_sword_forbidden(&self, id: &Identifier) -> bool {
        sword_forbidden(&self.store.read(), id)
    }

    pub fn is_weapon_forbidden(&self, id: &Identifier) -> bool {
        weapon_forbidden(&self.store.read(), id)
    }

    /// Usable as a sword
    pub fn is_sword(&self, id: &Identifier) -> bool {
        self.sword_in(&self.store.read(), id)
    }

    /// Usable as a weapon; every sword is a weapon
    pub fn is_weapon(&self, id: &Identifier) -> bool {
        self.weapon_in(&self.store.read(), id)
    }

    pub fn query(&self, kind: WeaponKind, id: &Identifier) -> bool {
        match kind {
            WeaponKind::Sword => self.is_sword(id),
            WeaponKind::Weapon => self.is_weapon(id),
        }
    }

    /// Stack-level sword check; an instance with its own classifier decides
    /// for itself
    pub fn is_sword_stack(&self, item: &dyn ItemInstance) -> bool {
        if item.is_empty() {
            return false;
        }
        match item.classifier() {
            Some(classifier) => classifier.is_sword(item.identifier(), self),
            None => self.is_sword(item.identifier()),
        }
    }

    /// Stack-level weapon check
    pub fn is_weapon_stack(&self, item: &dyn ItemInstance) -> bool {
        if item.is_empty() {
            return false;
        }
        match item.classifier() {
            Some(classifier) => classifier.is_weapon(item.identifier(), self),
            None => self.is_weapon(item.identifier()),
        }
    }

    pub fn query_stack(&self, kind: WeaponKind, item: &dyn ItemInstance) -> bool {
        match kind {
            WeaponKind::Sword => self.is_sword_stack(item),
            WeaponKind::Weapon => self.is_weapon_stack(item),
        }
    }

    /// Copy of the four lists
    pub fn snapshot(&self) -> Snapshot {
        self.store.read().snapshot()
    }

    /// Run `f` on a snapshot while holding the read lock
    ///
    /// No registration can complete while `f` runs, which lets a caller
    /// hand out the snapshot and attach a new replica atomically.
    pub fn snapshot_then<R>(&self, f: impl FnOnce(Snapshot) -> R) -> R {
        let store = self.store.read();
        f(store.snapshot())
    }

    /// Replace every list wholesale (replica full sync)
    pub fn replace_all(&self, snapshot: Snapshot) {
        self.store.write().replace(snapshot);
    }

    /// Move `id` into `category`, dropping it from every other list
    /// (replica incremental sync; no conflict policy)
    pub fn apply_entry(&self, category: Category, id: Identifier) {
        let mut store = self.store.write();
        store.remove_any(&id);
        store.add(category, id);
    }

    fn sword_in(&self, store: &RegistryStore, id: &Identifier) -> bool {
        !sword_forbidden(store, id)
            && (self.catalog.has_sword_trait(id) || store.contains(Category::AllowedSword, id))
    }

    fn weapon_in(&self, store: &RegistryStore, id: &Identifier) -> bool {
        !weapon_forbidden(store, id)
            && (self.sword_in(store, id)
                || self.catalog.has_weapon_trait(id)
                || store.contains(Category::AllowedWeapon, id))
    }
}

fn sword_forbidden(store: &RegistryStore, id: &Identifier) -> bool {
    store.contains(Category::ForbiddenSword, id) || weapon_forbidden(store, id)
}

fn weapon_forbidden(store: &RegistryStore, id: &Identifier) -> bool {
    store.contains(Category::ForbiddenWeapon, id)
}

impl ForbiddenQuery for WeaponRegistry {
    fn is_sword_forbidden(&self, id: &Identifier) -> bool {
        WeaponRegistry::is_sword_forbidden(self, id)
    }

    fn is_weapon_forbidden(&self, id: &Identifier) -> bool {
        WeaponRegistry::is_weapon_forbidden(self, id)
    }
}

impl fmt::Debug for WeaponRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.read();
        f.debug_struct("WeaponRegistry")
            .field("entries", &store.len())
            .field("serving", &self.is_serving())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armory_core::{IntrinsicTraits, ItemStack, StackClassifier, StaticCatalog};
    use parking_lot::Mutex;
    use proptest::prelude::*;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    fn catalog() -> Arc<dyn ItemCatalog> {
        Arc::new(
            StaticCatalog::new()
                .with(id("vanilla:iron_sword"), IntrinsicTraits::SWORD)
                .with(id("vanilla:iron_axe"), IntrinsicTraits::WEAPON)
                .with(id("modx:greatsword"), IntrinsicTraits::NONE)
                .with(id("modx:club"), IntrinsicTraits::NONE),
        )
    }

    #[derive(Default)]
    struct RecordingSink {
        pushed: Mutex<Vec<(Category, Identifier)>>,
    }

    impl SyncSink for RecordingSink {
        fn push_entry(&self, category: Category, id: &Identifier) {
            self.pushed.lock().push((category, id.clone()));
        }
    }

    #[test]
    fn test_register_new_sword() {
        let registry = WeaponRegistry::new(catalog());
        let sword = id("modx:greatsword");

        let outcome = registry.register(&Registration::new(
            "Config",
            sword.clone(),
            Category::AllowedSword,
        ));

        assert_eq!(outcome, RegisterOutcome::Added);
        assert!(registry.is_sword(&sword));
        assert!(registry.is_weapon(&sword));
    }

    #[test]
    fn test_conflict_without_override() {
        let registry = WeaponRegistry::new(catalog());
        let club = id("modx:club");
        registry.register(&Registration::new("Config", club.clone(), Category::AllowedWeapon));

        let outcome = registry.register(&Registration::new(
            "Command",
            club.clone(),
            Category::ForbiddenWeapon,
        ));

        assert_eq!(outcome, RegisterOutcome::Conflict(Category::AllowedWeapon));
        assert!(!outcome.changed());
        assert!(registry.is_weapon(&club));
        assert_eq!(registry.category_of(&club), Some(Category::AllowedWeapon));
    }

    #[test]
    fn test_override_relocates() {
        let registry = WeaponRegistry::new(catalog());
        let club = id("modx:club");
        registry.register(&Registration::new("Config", club.clone(), Category::AllowedWeapon));

        let outcome = registry.register(
            &Registration::new("Command", club.clone(), Category::ForbiddenWeapon)
                .with_override(true),
        );

        assert_eq!(outcome, RegisterOutcome::Added);
        assert!(!registry.contains(Category::AllowedWeapon, &club));
        assert!(registry.contains(Category::ForbiddenWeapon, &club));
        assert!(!registry.is_weapon(&club));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_twice_is_unchanged() {
        let registry = WeaponRegistry::new(catalog());
        let sword = id("modx:greatsword");
        let request = Registration::new("Config", sword, Category::AllowedSword);

        assert!(registry.register(&request).changed());
        assert_eq!(registry.register(&request), RegisterOutcome::Unchanged);
        assert_eq!(registry.count(Category::AllowedSword), 1);
    }

    #[test]
    fn test_forbidden_weapon_is_not_sword() {
        let registry = WeaponRegistry::new(catalog());
        let sword = id("vanilla:iron_sword");
        assert!(registry.is_sword(&sword));

        registry.register(&Registration::new("Config", sword.clone(), Category::ForbiddenWeapon));

        assert!(registry.is_sword_forbidden(&sword));
        assert!(!registry.is_sword(&sword));
        assert!(!registry.is_weapon(&sword));
    }

    #[test]
    fn test_forbidden_sword_may_stay_weapon() {
        let registry = WeaponRegistry::new(catalog());
        let sword = id("vanilla:iron_sword");
        registry.register(&Registration::new("Config", sword.clone(), Category::ForbiddenSword));

        assert!(!registry.is_sword(&sword));
        assert!(!registry.is_weapon_forbidden(&sword));
        // No weapon trait and not allowed as a weapon
        assert!(!registry.is_weapon(&sword));

        let axe = id("vanilla:iron_axe");
        registry.register(&Registration::new("Config", axe.clone(), Category::ForbiddenSword));
        assert!(registry.is_weapon(&axe));
        assert!(!registry.is_sword(&axe));
    }

    #[test]
    fn test_push_only_when_serving() {
        let sink = Arc::new(RecordingSink::default());
        let registry = WeaponRegistry::new(catalog()).with_sink(sink.clone());

        registry.register(&Registration::new("Config", id("modx:club"), Category::AllowedWeapon));
        assert!(sink.pushed.lock().is_empty());

        registry.start_serving();
        registry.register(&Registration::new(
            "Command",
            id("modx:greatsword"),
            Category::AllowedSword,
        ));
        // Unchanged and conflicting requests push nothing
        registry.register(&Registration::new(
            "Command",
            id("modx:greatsword"),
            Category::AllowedSword,
        ));
        registry.register(&Registration::new("Command", id("modx:club"), Category::ForbiddenWeapon));

        let pushed = sink.pushed.lock();
        assert_eq!(pushed.as_slice(), [(Category::AllowedSword, id("modx:greatsword"))]);
    }

    #[test]
    fn test_apply_entry_moves_without_policy() {
        let registry = WeaponRegistry::new(catalog());
        let club = id("modx:club");
        registry.register(&Registration::new("Config", club.clone(), Category::AllowedWeapon));

        registry.apply_entry(Category::ForbiddenSword, club.clone());
        assert_eq!(registry.category_of(&club), Some(Category::ForbiddenSword));
        assert_eq!(registry.len(), 1);
    }

    struct TagClassifier;

    impl StackClassifier for TagClassifier {
        fn is_sword(&self, id: &Identifier, registry: &dyn ForbiddenQuery) -> bool {
            !registry.is_sword_forbidden(id)
        }

        fn is_weapon(&self, id: &Identifier, registry: &dyn ForbiddenQuery) -> bool {
            !registry.is_weapon_forbidden(id)
        }
    }

    #[test]
    fn test_stack_classifier_takes_precedence() {
        let registry = WeaponRegistry::new(catalog());
        let rapier = id("modx:rapier");
        let plain = ItemStack::new(rapier.clone(), 1);
        let custom = ItemStack::new(rapier.clone(), 1).with_classifier(Arc::new(TagClassifier));

        assert!(!registry.is_sword_stack(&plain));
        assert!(registry.is_sword_stack(&custom));
        assert!(registry.is_weapon_stack(&custom));

        registry.register(&Registration::new("Config", rapier, Category::ForbiddenSword));
        assert!(!registry.is_sword_stack(&custom));
        assert!(registry.is_weapon_stack(&custom));
    }

    #[test]
    fn test_empty_stack_is_nothing() {
        let registry = WeaponRegistry::new(catalog());
        let empty = ItemStack::new(id("vanilla:iron_sword"), 0);
        assert!(!registry.query_stack(WeaponKind::Sword, &empty));
        assert!(!registry.query_stack(WeaponKind::Weapon, &empty));
    }

    #[test]
    fn test_concurrent_conflicting_registrations() {
        let registry = Arc::new(WeaponRegistry::new(catalog()));
        let club = id("modx:club");

        let handles: Vec<_> = Category::ALL
            .into_iter()
            .map(|category| {
                let registry = Arc::clone(&registry);
                let club = club.clone();
                std::thread::spawn(move || {
                    registry
                        .register(&Registration::new("Thread", club, category))
                        .changed()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }

    fn arb_category() -> impl Strategy<Value = Category> {
        (0u8..4).prop_map(|b| Category::from_byte(b).unwrap())
    }

    fn arb_item() -> impl Strategy<Value = Identifier> {
        prop_oneof![
            Just(id("vanilla:iron_sword")),
            Just(id("vanilla:iron_axe")),
            Just(id("modx:greatsword")),
            Just(id("modx:club")),
            Just(id("modx:unknown")),
        ]
    }

    proptest! {
        #[test]
        fn prop_sword_implies_weapon(
            ops in proptest::collection::vec((arb_item(), arb_category(), any::<bool>()), 0..40)
        ) {
            let registry = WeaponRegistry::new(catalog());
            for (item, category, force) in ops {
                registry.register(&Registration::new("Prop", item, category).with_override(force));
                for probe in ["vanilla:iron_sword", "vanilla:iron_axe", "modx:greatsword", "modx:club", "modx:unknown"] {
                    let probe = id(probe);
                    if registry.is_sword(&probe) {
                        prop_assert!(registry.is_weapon(&probe));
                    }
                    if registry.contains(Category::ForbiddenWeapon, &probe) {
                        prop_assert!(!registry.is_sword(&probe));
                        prop_assert!(!registry.is_weapon(&probe));
                    }
                }
            }
        }

        #[test]
        fn prop_override_correctness(
            item in arb_item(),
            first in arb_category(),
            second in arb_category(),
            force in any::<bool>(),
        ) {
            let registry = WeaponRegistry::new(catalog());
            registry.register(&Registration::new("Prop", item.clone(), first));
            let before = registry.snapshot();
            let outcome = registry.register(
                &Registration::new("Prop", item.clone(), second).with_override(force),
            );

            if first == second {
                prop_assert_eq!(outcome, RegisterOutcome::Unchanged);
            } else if force {
                prop_assert_eq!(outcome, RegisterOutcome::Added);
                prop_assert!(registry.contains(second, &item));
                prop_assert!(!registry.contains(first, &item));
            } else {
                prop_assert_eq!(outcome, RegisterOutcome::Conflict(first));
                prop_assert_eq!(registry.snapshot(), before);
            }
        }

        #[test]
        fn prop_replace_snapshot_preserves_predicates(
            ops in proptest::collection::vec((arb_item(), arb_category()), 0..20)
        ) {
            let registry = WeaponRegistry::new(catalog());
            for (item, category) in ops {
                registry.register(&Registration::new("Prop", item, category).with_override(true));
            }
            let copy = WeaponRegistry::new(catalog());
            copy.replace_all(registry.snapshot());
            for probe in ["vanilla:iron_sword", "vanilla:iron_axe", "modx:greatsword", "modx:club", "modx:unknown"] {
                let probe = id(probe);
                prop_assert_eq!(copy.is_sword(&probe), registry.is_sword(&probe));
                prop_assert_eq!(copy.is_weapon(&probe), registry.is_weapon(&probe));
            }
        }
    }
}
