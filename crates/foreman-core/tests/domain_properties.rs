//! Property-based tests for the pure coordination rules.
//!
//! # Invariants tested:
//! - Transitions: only forward steps and the QA rejection edge are legal
//! - Skill absorption: monotonic in the agent's tier
//! - Mentions: never include the author, never repeat, only known agents
//!
//! Reproducible: set PROPTEST_SEED for deterministic runs

#![allow(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use foreman_core::{extract_mentions, AgentId, SkillLevel, TaskStatus, TransitionKind};
use proptest::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════
// STRATEGIES
// ═══════════════════════════════════════════════════════════════════════════

fn status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::all().to_vec())
}

fn skill_strategy() -> impl Strategy<Value = SkillLevel> {
    prop_oneof![
        Just(SkillLevel::Junior),
        Just(SkillLevel::Senior),
        Just(SkillLevel::Principal),
    ]
}

fn agent_id_strategy() -> impl Strategy<Value = AgentId> {
    "[a-z][a-z0-9_]{2,12}".prop_filter_map("valid agent id", |s| AgentId::parse(s).ok())
}

// ═══════════════════════════════════════════════════════════════════════════
// STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_only_forward_steps_and_qa_reject_are_legal(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        let expected = from.next() == Some(to)
            || (from == TaskStatus::QaDone && to == TaskStatus::Created);
        prop_assert_eq!(from.can_transition_to(to), expected);
    }

    #[test]
    fn prop_self_transition_always_rejected(status in status_strategy()) {
        prop_assert!(!status.can_transition_to(status));
    }

    #[test]
    fn prop_only_created_claims(from in status_strategy(), to in status_strategy()) {
        if let Ok(TransitionKind::Claim) = from.validate_transition(to) {
            prop_assert_eq!(from, TaskStatus::Created);
            prop_assert_eq!(to, TaskStatus::UnderWork);
        }
    }

    #[test]
    fn prop_status_string_round_trip(status in status_strategy()) {
        let parsed: TaskStatus = status.as_str().parse().map_err(|e| proptest::test_runner::TestCaseError::fail(format!("{e}")))?;
        prop_assert_eq!(parsed, status);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SKILL ABSORPTION
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn prop_higher_tier_covers_everything_lower_tier_does(
        agent in skill_strategy(),
        higher in skill_strategy(),
        target in skill_strategy(),
    ) {
        if higher >= agent && agent.covers(target) {
            prop_assert!(higher.covers(target));
        }
    }

    #[test]
    fn prop_covers_matches_ordering(agent in skill_strategy(), target in skill_strategy()) {
        prop_assert_eq!(agent.covers(target), target <= agent);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MENTIONS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_mentions_are_known_unique_and_not_author(
        known in prop::collection::vec(agent_id_strategy(), 1..6),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
        filler in "[ a-z.,]{0,20}",
    ) {
        let author = known[0].clone();
        let content = picks
            .iter()
            .map(|i| format!("@{}", i.get(&known)))
            .collect::<Vec<_>>()
            .join(&filler);

        let found = extract_mentions(&content, &known, &author);

        prop_assert!(!found.contains(&author));
        prop_assert!(found.iter().all(|id| known.contains(id)));
        let mut deduped = found.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), found.len());
    }
}
