//! Weapon category definitions
//!
//! Every item is in at most one of four categories:
//! - AllowedSword: usable as a sword (and therefore as a weapon)
//! - AllowedWeapon: usable as a generic weapon
//! - ForbiddenSword: never a sword, may still be a weapon
//! - ForbiddenWeapon: neither a weapon nor a sword

use std::fmt;

/// Registry category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Category {
    AllowedSword = 0x00,
    AllowedWeapon = 0x01,
    ForbiddenSword = 0x02,
    ForbiddenWeapon = 0x03,
}

impl Category {
    /// All categories in wire order
    pub const ALL: [Category; 4] = [
        Category::AllowedSword,
        Category::AllowedWeapon,
        Category::ForbiddenSword,
        Category::ForbiddenWeapon,
    ];

    /// Parse from wire byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Category::AllowedSword),
            0x01 => Some(Category::AllowedWeapon),
            0x02 => Some(Category::ForbiddenSword),
            0x03 => Some(Category::ForbiddenWeapon),
            _ => None,
        }
    }

    /// Convert to wire byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Position in [`Category::ALL`]
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Category that allows an item as the given kind
    pub fn allowed(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Sword => Category::AllowedSword,
            WeaponKind::Weapon => Category::AllowedWeapon,
        }
    }

    /// Category that forbids an item as the given kind
    pub fn forbidden(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Sword => Category::ForbiddenSword,
            WeaponKind::Weapon => Category::ForbiddenWeapon,
        }
    }

    /// Human-readable list name used in diagnostics
    pub fn list_name(self) -> &'static str {
        match self {
            Category::AllowedSword => "Allowed Swords",
            Category::AllowedWeapon => "Allowed Weapons",
            Category::ForbiddenSword => "Forbidden Swords",
            Category::ForbiddenWeapon => "Forbidden Weapons",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.list_name())
    }
}

/// The two classification questions downstream logic asks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WeaponKind {
    Sword,
    Weapon,
}

impl WeaponKind {
    /// Case-insensitive parse of `sword` / `weapon`
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("sword") {
            Some(WeaponKind::Sword)
        } else if s.eq_ignore_ascii_case("weapon") {
            Some(WeaponKind::Weapon)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WeaponKind::Sword => "sword",
            WeaponKind::Weapon => "weapon",
        }
    }
}

impl fmt::Display for WeaponKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
