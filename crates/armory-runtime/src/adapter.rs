//! Message adapter - inbound registration messages and batch loading
//!
//! A message carries a key such as `allow_sword` or `forbid_weapon_override`
//! and a payload naming an item. Each message becomes at most one
//! registration; anything unreadable is logged and dropped.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use armory_core::{ArmoryError, ArmoryResult, Category, Identifier, ItemInstance};
use armory_state::{RegisterOutcome, Registration, WeaponRegistry};

/// Adds an item to the allowed swords
pub const KEY_ALLOW_SWORD: &str = "allow_sword";
/// Adds an item to the allowed non-sword weapons
pub const KEY_ALLOW_WEAPON: &str = "allow_weapon";
/// Adds an item to the forbidden swords
pub const KEY_FORBID_SWORD: &str = "forbid_sword";
/// Adds an item to the forbidden weapons
pub const KEY_FORBID_WEAPON: &str = "forbid_weapon";
/// Suffix requesting override of an existing classification
pub const KEY_OVERRIDE_SUFFIX: &str = "_override";

/// Deprecated alias of `allow_sword`; never overrides
pub const LEGACY_SWORD_KEY: &str = "ZssRegisterSword";
/// Deprecated alias of `allow_weapon`; never overrides
pub const LEGACY_WEAPON_KEY: &str = "ZssRegisterWeapon";

/// Map a message key to its target category and override flag
///
/// Keys are case-insensitive.
pub fn resolve_key(key: &str) -> ArmoryResult<(Category, bool)> {
    let lowered = key.to_lowercase();
    let (method, override_existing) = match lowered.strip_suffix(KEY_OVERRIDE_SUFFIX) {
        Some(method) => (method, true),
        None => (lowered.as_str(), false),
    };

    let category = match method {
        KEY_ALLOW_SWORD => Category::AllowedSword,
        KEY_ALLOW_WEAPON => Category::AllowedWeapon,
        KEY_FORBID_SWORD => Category::ForbiddenSword,
        KEY_FORBID_WEAPON => Category::ForbiddenWeapon,
        _ if method.eq_ignore_ascii_case(LEGACY_SWORD_KEY) => {
            return Ok((Category::AllowedSword, false))
        }
        _ if method.eq_ignore_ascii_case(LEGACY_WEAPON_KEY) => {
            return Ok((Category::AllowedWeapon, false))
        }
        _ => return Err(ArmoryError::UnknownKey(key.to_string())),
    };
    Ok((category, override_existing))
}

/// What a message names
#[derive(Clone)]
pub enum Payload {
    /// A live item instance
    Item(Arc<dyn ItemInstance>),
    /// An already parsed identifier
    Identifier(Identifier),
    /// Text expected to parse as `namespace:name`
    Text(String),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Item(item) => f.debug_tuple("Item").field(item.identifier()).finish(),
            Payload::Identifier(id) => f.debug_tuple("Identifier").field(id).finish(),
            Payload::Text(text) => f.debug_tuple("Text").field(text).finish(),
        }
    }
}

/// One inbound registration message
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Sending component, used in the origin
    pub sender: String,
    pub key: String,
    pub payload: Payload,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, key: impl Into<String>, payload: Payload) -> Self {
        InboundMessage {
            sender: sender.into(),
            key: key.into(),
            payload,
        }
    }
}

/// Tally of a batch registration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub registered: usize,
    pub unchanged: usize,
    pub conflicts: usize,
    /// Unreadable or unknown identifiers
    pub skipped: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: RegisterOutcome) {
        match outcome {
            RegisterOutcome::Added => self.registered += 1,
            RegisterOutcome::Unchanged => self.unchanged += 1,
            RegisterOutcome::Conflict(_) => self.conflicts += 1,
        }
    }

    /// Entries looked at
    pub fn total(&self) -> usize {
        self.registered + self.unchanged + self.conflicts + self.skipped
    }
}

/// Turns messages and batches into registrations
#[derive(Clone, Debug)]
pub struct MessageAdapter {
    registry: Arc<WeaponRegistry>,
}

impl MessageAdapter {
    pub fn new(registry: Arc<WeaponRegistry>) -> Self {
        MessageAdapter { registry }
    }

    pub fn registry(&self) -> &Arc<WeaponRegistry> {
        &self.registry
    }

    /// Apply one message
    ///
    /// Errors are already logged; callers may ignore them.
    pub fn process(&self, message: &InboundMessage) -> ArmoryResult<RegisterOutcome> {
        let id = self.resolve_payload(&message.payload).map_err(|e| {
            warn!(sender = %message.sender, "Dropping registration message: {}", e);
            e
        })?;
        let (category, override_existing) = resolve_key(&message.key).map_err(|e| {
            warn!(sender = %message.sender, "Dropping registration message: {}", e);
            e
        })?;

        let request = Registration::new(format!("Message:{}", message.sender), id, category)
            .with_override(override_existing);
        Ok(self.registry.register(&request))
    }

    /// Apply every message in order; failures do not stop the rest
    pub fn process_all<'a>(
        &self,
        messages: impl IntoIterator<Item = &'a InboundMessage>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for message in messages {
            match self.process(message) {
                Ok(outcome) => report.record(outcome),
                Err(_) => report.skipped += 1,
            }
        }
        report
    }

    /// Register a sequence of textual identifiers under one origin
    pub fn register_batch<S: AsRef<str>>(
        &self,
        origin: &str,
        override_existing: bool,
        entries: impl IntoIterator<Item = (S, Category)>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for (raw, category) in entries {
            match self.lookup(raw.as_ref()) {
                Ok(id) => {
                    let request = Registration::new(origin, id, category)
                        .with_override(override_existing);
                    report.record(self.registry.register(&request));
                }
                Err(e) => {
                    warn!(origin = %origin, "Skipping {} entry: {}", category, e);
                    report.skipped += 1;
                }
            }
        }
        report
    }

    fn resolve_payload(&self, payload: &Payload) -> ArmoryResult<Identifier> {
        match payload {
            Payload::Item(item) => Ok(item.identifier().clone()),
            Payload::Identifier(id) => self.known(id.clone()),
            Payload::Text(text) => self.lookup(text),
        }
    }

    fn lookup(&self, raw: &str) -> ArmoryResult<Identifier> {
        self.known(Identifier::parse(raw)?)
    }

    fn known(&self, id: Identifier) -> ArmoryResult<Identifier> {
        if self.registry.catalog().contains(&id) {
            Ok(id)
        } else {
            Err(ArmoryError::NotFound(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armory_core::{IntrinsicTraits, ItemStack, StaticCatalog};
    use proptest::prelude::*;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    fn adapter() -> MessageAdapter {
        let catalog = StaticCatalog::new()
            .with(id("modx:greatsword"), IntrinsicTraits::NONE)
            .with(id("modx:club"), IntrinsicTraits::NONE)
            .with(id("vanilla:iron_sword"), IntrinsicTraits::SWORD);
        MessageAdapter::new(Arc::new(WeaponRegistry::new(Arc::new(catalog))))
    }

    #[test]
    fn test_resolve_key_table() {
        assert_eq!(resolve_key("allow_sword"), Ok((Category::AllowedSword, false)));
        assert_eq!(resolve_key("ALLOW_WEAPON"), Ok((Category::AllowedWeapon, false)));
        assert_eq!(resolve_key("forbid_sword_override"), Ok((Category::ForbiddenSword, true)));
        assert_eq!(resolve_key("Forbid_Weapon_Override"), Ok((Category::ForbiddenWeapon, true)));
        assert_eq!(
            resolve_key("nonsense"),
            Err(ArmoryError::UnknownKey("nonsense".to_string()))
        );
        assert!(resolve_key("_override").is_err());
    }

    #[test]
    fn test_legacy_keys_never_override() {
        assert_eq!(resolve_key(LEGACY_SWORD_KEY), Ok((Category::AllowedSword, false)));
        assert_eq!(resolve_key("zssregisterweapon"), Ok((Category::AllowedWeapon, false)));
        assert_eq!(
            resolve_key("ZssRegisterSword_override"),
            Ok((Category::AllowedSword, false))
        );
    }

    #[test]
    fn test_allow_override_moves_out_of_forbidden() {
        let adapter = adapter();
        let sword = id("modx:greatsword");
        adapter.registry().register(&Registration::new(
            "Config",
            sword.clone(),
            Category::ForbiddenWeapon,
        ));
        assert!(!adapter.registry().is_sword(&sword));

        let message = InboundMessage::new(
            "modx",
            "allow_sword_override",
            Payload::Identifier(sword.clone()),
        );
        assert_eq!(adapter.process(&message), Ok(RegisterOutcome::Added));
        assert!(adapter.registry().contains(Category::AllowedSword, &sword));
        assert!(!adapter.registry().contains(Category::ForbiddenWeapon, &sword));
        assert!(adapter.registry().is_sword(&sword));
    }

    #[test]
    fn test_plain_key_reports_conflict() {
        let adapter = adapter();
        let club = id("modx:club");
        adapter.registry().register(&Registration::new("Config", club.clone(), Category::AllowedWeapon));

        let message = InboundMessage::new("modx", "forbid_weapon", Payload::Text("modx:club".into()));
        assert_eq!(
            adapter.process(&message),
            Ok(RegisterOutcome::Conflict(Category::AllowedWeapon))
        );
        assert!(adapter.registry().is_weapon(&club));
    }

    #[test]
    fn test_item_payload() {
        let adapter = adapter();
        let item: Arc<dyn ItemInstance> = Arc::new(ItemStack::new(id("modx:club"), 1));
        let message = InboundMessage::new("modx", "allow_weapon", Payload::Item(item));
        assert_eq!(adapter.process(&message), Ok(RegisterOutcome::Added));
        assert!(adapter.registry().is_weapon(&id("modx:club")));
    }

    #[test]
    fn test_bad_payloads_dropped() {
        let adapter = adapter();
        let bad = InboundMessage::new("modx", "allow_sword", Payload::Text("bad-format".into()));
        assert!(matches!(adapter.process(&bad), Err(ArmoryError::Parse { .. })));

        let missing = InboundMessage::new("modx", "allow_sword", Payload::Text("modx:missing".into()));
        assert_eq!(
            adapter.process(&missing),
            Err(ArmoryError::NotFound(id("modx:missing")))
        );

        let unknown = InboundMessage::new("modx", "promote", Payload::Text("modx:club".into()));
        assert!(matches!(adapter.process(&unknown), Err(ArmoryError::UnknownKey(_))));
        assert!(adapter.registry().is_empty());
    }

    #[test]
    fn test_batch_skips_malformed() {
        let adapter = adapter();
        let report = adapter.register_batch(
            "Config:armory",
            true,
            [
                ("bad-format", Category::AllowedSword),
                ("modx:greatsword", Category::AllowedSword),
                ("modx:nothing", Category::AllowedWeapon),
                ("modx:greatsword", Category::AllowedSword),
            ],
        );

        assert_eq!(
            report,
            BatchReport {
                registered: 1,
                unchanged: 1,
                conflicts: 0,
                skipped: 2,
            }
        );
        assert_eq!(report.total(), 4);
        assert_eq!(adapter.registry().len(), 1);
    }

    #[test]
    fn test_batch_only_malformed_leaves_registry_unchanged() {
        let adapter = adapter();
        let report = adapter.register_batch("Config:armory", true, [("bad-format", Category::AllowedSword)]);
        assert_eq!(report.skipped, 1);
        assert!(adapter.registry().is_empty());
    }

    #[test]
    fn test_process_all_counts() {
        let adapter = adapter();
        let messages = [
            InboundMessage::new("a", "allow_weapon", Payload::Text("modx:club".into())),
            InboundMessage::new("b", "forbid_weapon", Payload::Text("modx:club".into())),
            InboundMessage::new("c", "bogus", Payload::Text("modx:club".into())),
        ];
        let report = adapter.process_all(&messages);
        assert_eq!(report.registered, 1);
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.skipped, 1);
    }

    fn arb_key() -> impl Strategy<Value = String> {
        (
            prop_oneof![
                Just(KEY_ALLOW_SWORD),
                Just(KEY_ALLOW_WEAPON),
                Just(KEY_FORBID_SWORD),
                Just(KEY_FORBID_WEAPON),
            ],
            any::<bool>(),
            proptest::collection::vec(any::<bool>(), 32),
        )
            .prop_map(|(base, suffix, upper)| {
                let key = if suffix {
                    format!("{base}{KEY_OVERRIDE_SUFFIX}")
                } else {
                    base.to_string()
                };
                key.chars()
                    .zip(upper.into_iter().cycle())
                    .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
                    .collect::<String>()
            })
    }

    proptest! {
        #[test]
        fn prop_keys_case_insensitive(key in arb_key()) {
            prop_assert_eq!(resolve_key(&key), resolve_key(&key.to_lowercase()));
            prop_assert!(resolve_key(&key).is_ok());
            let (_, override_existing) = resolve_key(&key).unwrap();
            prop_assert_eq!(override_existing, key.to_lowercase().ends_with(KEY_OVERRIDE_SUFFIX));
        }

        #[test]
        fn prop_resolve_key_never_panics(key in ".*") {
            let _ = resolve_key(&key);
        }
    }
}
