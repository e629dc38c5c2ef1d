//! Melee combat: attack definitions, the combo state machine, per-actor
//! attack hooks, health and the combo hit counter.

pub mod attacks;
pub mod combo;
pub mod health;
pub mod hooks;
pub mod weapon;

pub use attacks::{
    AttackDictionary, AttackDictionaryDef, AttackEntry, AttackId, AttackInput, DictionaryError,
    FollowUp, Opener, Stance,
};
pub use combo::{AimInput, AttackFrame, ComboPhase, ComboState};
pub use health::{ComboHitCounter, Health, HealthUpdate};
pub use hooks::{BaseCombat, CombatActor, CombatHooks, PlayerCombat};
pub use weapon::{BodyPart, WeaponState};
