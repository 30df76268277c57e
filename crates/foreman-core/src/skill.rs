//! Skill tiers and the eligibility table used by task selection.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Ordered capability tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkillLevel {
    Junior,
    Senior,
    Principal,
}

/// Which task tiers each agent tier may take.
///
/// Absorption is monotonic: a tier covers every tier listed on its row.
/// Adding a tier means adding a row here and nothing else.
const ELIGIBILITY: &[(SkillLevel, &[SkillLevel])] = &[
    (SkillLevel::Junior, &[SkillLevel::Junior]),
    (SkillLevel::Senior, &[SkillLevel::Junior, SkillLevel::Senior]),
    (
        SkillLevel::Principal,
        &[SkillLevel::Junior, SkillLevel::Senior, SkillLevel::Principal],
    ),
];

impl SkillLevel {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Junior => "junior",
            Self::Senior => "senior",
            Self::Principal => "principal",
        }
    }

    /// Task tiers an agent of this tier is eligible for.
    #[must_use]
    pub fn eligible_targets(self) -> &'static [Self] {
        ELIGIBILITY
            .iter()
            .find(|(agent, _)| *agent == self)
            .map_or(&[], |(_, targets)| targets)
    }

    /// Returns true if an agent of this tier may take a task targeted at `target`.
    #[must_use]
    pub fn covers(self, target: Self) -> bool {
        self.eligible_targets().contains(&target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorption_matrix() {
        assert!(SkillLevel::Junior.covers(SkillLevel::Junior));
        assert!(!SkillLevel::Junior.covers(SkillLevel::Senior));
        assert!(!SkillLevel::Junior.covers(SkillLevel::Principal));

        assert!(SkillLevel::Senior.covers(SkillLevel::Junior));
        assert!(SkillLevel::Senior.covers(SkillLevel::Senior));
        assert!(!SkillLevel::Senior.covers(SkillLevel::Principal));

        assert!(SkillLevel::Principal.covers(SkillLevel::Junior));
        assert!(SkillLevel::Principal.covers(SkillLevel::Senior));
        assert!(SkillLevel::Principal.covers(SkillLevel::Principal));
    }

    #[test]
    fn test_every_tier_has_a_row() {
        for tier in [SkillLevel::Junior, SkillLevel::Senior, SkillLevel::Principal] {
            assert!(tier.covers(tier), "{tier} must cover itself");
        }
    }

    #[test]
    fn test_string_forms_agree() -> Result<(), strum::ParseError> {
        assert_eq!(SkillLevel::Principal.to_string(), "principal");
        assert_eq!("senior".parse::<SkillLevel>()?, SkillLevel::Senior);
        Ok(())
    }
}
