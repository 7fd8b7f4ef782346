//! Registry Fuzzer - Randomized registration sequences
//!
//! Tests:
//! - Exclusivity after every step
//! - Derived predicate consistency
//! - Replica convergence through the wire encoding

use std::sync::Arc;

use armory_core::{Category, Identifier, IntrinsicTraits, ItemCatalog, StaticCatalog, WeaponKind};
use armory_runtime::{
    AdminFacade, InboundMessage, MessageAdapter, Payload, KEY_ALLOW_SWORD, KEY_ALLOW_WEAPON,
    KEY_FORBID_SWORD, KEY_FORBID_WEAPON, KEY_OVERRIDE_SUFFIX, LEGACY_SWORD_KEY, LEGACY_WEAPON_KEY,
};
use armory_state::{
    entry_message, full_state_message, Registration, Replica, Snapshot, SyncSink, WeaponRegistry,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Items known to the catalog; at least one is always created
    pub item_count: usize,
    /// Operations to run
    pub op_count: usize,
    /// Probability a direct registration overrides
    pub override_prob: f64,
    /// Probability an operation uses text that is malformed or unknown
    pub garbage_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            item_count: 16,
            op_count: 1000,
            override_prob: 0.4,
            garbage_prob: 0.1,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            item_count: 6,
            op_count: 200,
            ..FuzzerConfig::default()
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            item_count: 64,
            op_count: 20_000,
            override_prob: 0.5,
            garbage_prob: 0.2,
            seed: 42,
        }
    }
}

/// Replays every pushed entry into a replica as an encoded frame
struct FrameSink {
    replica: Arc<Replica>,
}

impl SyncSink for FrameSink {
    fn push_entry(&self, category: Category, id: &Identifier) {
        if let Ok(frame) = entry_message(category, id).encode() {
            self.replica.handle_frame(&frame);
        }
    }
}

/// Fuzzing result
#[derive(Clone, Debug, Default)]
pub struct FuzzResult {
    pub steps: usize,
    pub changes: usize,
    pub exclusivity_violations: u32,
    pub predicate_violations: u32,
    pub converged: bool,
}

impl FuzzResult {
    pub fn is_valid(&self) -> bool {
        self.converged && self.exclusivity_violations == 0 && self.predicate_violations == 0
    }
}

/// Registry fuzzer
pub struct RegistryFuzzer {
    config: FuzzerConfig,
    registry: Arc<WeaponRegistry>,
    replica: Arc<Replica>,
    adapter: MessageAdapter,
    admin: AdminFacade,
    items: Vec<Identifier>,
    rng: StdRng,
}

impl RegistryFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);

        let item_count = config.item_count.max(1);
        let mut catalog = StaticCatalog::new();
        let mut items = Vec::with_capacity(item_count);
        for i in 0..item_count {
            let Ok(id) = Identifier::new("fuzz", &format!("item{i}")) else {
                continue;
            };
            let traits = match rng.gen_range(0..4) {
                0 => IntrinsicTraits::SWORD,
                1 => IntrinsicTraits::WEAPON,
                _ => IntrinsicTraits::NONE,
            };
            catalog.insert(id.clone(), traits);
            items.push(id);
        }
        let catalog: Arc<dyn ItemCatalog> = Arc::new(catalog);

        let replica = Arc::new(Replica::new(catalog.clone()));
        let sink = Arc::new(FrameSink {
            replica: replica.clone(),
        });
        let registry = Arc::new(WeaponRegistry::new(catalog).with_sink(sink));

        RegistryFuzzer {
            adapter: MessageAdapter::new(registry.clone()),
            admin: AdminFacade::new(registry.clone(), "Command"),
            config,
            registry,
            replica,
            items,
            rng,
        }
    }

    pub fn registry(&self) -> &Arc<WeaponRegistry> {
        &self.registry
    }

    /// Run the fuzzer
    pub fn run(&mut self) -> FuzzResult {
        let mut result = FuzzResult::default();

        // The replica joins before serving starts and is brought up to date
        // with a full state, the same way a hub accept does
        self.replica.on_connect();
        if let Ok(frame) = full_state_message(&self.registry.snapshot()).encode() {
            self.replica.handle_frame(&frame);
        }
        self.registry.start_serving();

        for _ in 0..self.config.op_count {
            if self.step() {
                result.changes += 1;
            }
            result.steps += 1;
            result.exclusivity_violations += self.check_exclusivity();
            result.predicate_violations += self.check_predicates();
        }

        result.converged = self.replica.registry().snapshot() == self.registry.snapshot();
        result
    }

    /// One random operation; true if membership changed
    fn step(&mut self) -> bool {
        match self.rng.gen_range(0..4) {
            0 => {
                let id = self.pick_item();
                let category = self.pick_category();
                let force = self.rng.gen::<f64>() < self.config.override_prob;
                self.registry
                    .register(&Registration::new("Fuzz", id, category).with_override(force))
                    .changed()
            }
            1 => {
                let message = self.generate_message();
                self.adapter
                    .process(&message)
                    .map_or(false, |outcome| outcome.changed())
            }
            2 => {
                let verb = ["allow", "forbid", "is"][self.rng.gen_range(0..3)];
                let kind = ["sword", "weapon"][self.rng.gen_range(0..2)];
                let raw = self.pick_text();
                let before = self.registry.snapshot();
                let _ = self.admin.execute(&[verb, kind, raw.as_str()]);
                before != self.registry.snapshot()
            }
            _ => {
                let entries: Vec<(String, Category)> = (0..self.rng.gen_range(1..5))
                    .map(|_| (self.pick_text(), self.pick_category()))
                    .collect();
                self.adapter
                    .register_batch("Config:fuzz", true, entries)
                    .registered
                    > 0
            }
        }
    }

    fn generate_message(&mut self) -> InboundMessage {
        let base = [
            KEY_ALLOW_SWORD,
            KEY_ALLOW_WEAPON,
            KEY_FORBID_SWORD,
            KEY_FORBID_WEAPON,
            LEGACY_SWORD_KEY,
            LEGACY_WEAPON_KEY,
            "promote",
        ][self.rng.gen_range(0..7)];
        let key = if self.rng.gen_bool(0.5) {
            format!("{base}{KEY_OVERRIDE_SUFFIX}")
        } else {
            base.to_string()
        };
        let payload = if self.rng.gen_bool(0.5) {
            Payload::Identifier(self.pick_item())
        } else {
            Payload::Text(self.pick_text())
        };
        InboundMessage::new(format!("mod{}", self.rng.gen_range(0..3)), key, payload)
    }

    fn pick_item(&mut self) -> Identifier {
        self.items[self.rng.gen_range(0..self.items.len())].clone()
    }

    fn pick_category(&mut self) -> Category {
        Category::ALL[self.rng.gen_range(0..Category::ALL.len())]
    }

    /// Text naming a known item, or now and then garbage
    fn pick_text(&mut self) -> String {
        if self.rng.gen::<f64>() < self.config.garbage_prob {
            match self.rng.gen_range(0..3) {
                0 => "bad-format".to_string(),
                1 => "fuzz:ghost".to_string(),
                _ => "fuzz:".to_string(),
            }
        } else {
            self.pick_item().to_string()
        }
    }

    fn check_exclusivity(&self) -> u32 {
        let snapshot = self.registry.snapshot();
        self.items
            .iter()
            .filter(|id| holders(&snapshot, id) > 1)
            .count() as u32
    }

    fn check_predicates(&self) -> u32 {
        let registry = &self.registry;
        let mut violations = 0;
        for id in &self.items {
            let sword = registry.query(WeaponKind::Sword, id);
            let weapon = registry.query(WeaponKind::Weapon, id);
            if sword && !weapon {
                violations += 1;
            }
            if registry.contains(Category::ForbiddenWeapon, id) && (sword || weapon) {
                violations += 1;
            }
            if registry.contains(Category::ForbiddenSword, id) && sword {
                violations += 1;
            }
        }
        violations
    }
}

fn holders(snapshot: &Snapshot, id: &Identifier) -> usize {
    Category::ALL
        .into_iter()
        .filter(|category| snapshot.list(*category).contains(id))
        .count()
}
