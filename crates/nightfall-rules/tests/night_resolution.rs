//! Integration tests for roles acting together on one match state.
//!
//! Each test seats a small table, then calls role actions in the same
//! order the engine uses: wolves, witch, guard, seer.

use nightfall_protocol::{ParticipantId, Phase, Team};
use nightfall_rules::{
    Capability, DeathCause, MatchConfig, MatchState, Role, RoleKind, Skill, VictoryEvaluator,
    VoteTally,
};

// =========================================================================
// Helpers
// =========================================================================

fn id(raw: &str) -> ParticipantId {
    ParticipantId::from(raw)
}

fn table(seats: &[(&str, RoleKind)]) -> (MatchState, Vec<Role>) {
    let config = MatchConfig::standard();
    let mut state = MatchState::new();
    let mut roles = Vec::new();
    for (raw, kind) in seats {
        state.seat(id(raw), *kind);
        roles.push(Role::new(*kind, id(raw), &config));
    }
    state.set_phase(Phase::Night);
    (state, roles)
}

fn role<'a>(roles: &'a mut [Role], owner: &str) -> &'a mut Role {
    roles
        .iter_mut()
        .find(|r| r.owner().as_str() == owner)
        .unwrap()
}

// =========================================================================
// Night order
// =========================================================================

#[test]
fn test_guard_clears_wolf_kill_and_poison_keeps_its_charge() {
    let (mut state, mut roles) = table(&[
        ("wolf", RoleKind::Wolf),
        ("witch", RoleKind::Witch),
        ("guard", RoleKind::Guard),
        ("anna", RoleKind::Villager),
    ]);

    let Role::Wolf(wolf) = role(&mut roles, "wolf") else { unreachable!() };
    assert!(wolf.kill(&id("anna"), &mut state.scope()));

    let Role::Witch(witch) = role(&mut roles, "witch") else { unreachable!() };
    assert!(!witch.poison(&id("anna"), &mut state.scope()));
    assert!(witch.has_poison());

    let Role::Guard(guard) = role(&mut roles, "guard") else { unreachable!() };
    assert!(guard.protect(&id("anna"), &mut state.scope()));

    assert!(state.night_deaths().is_empty());
    assert!(state.participant(&id("anna")).unwrap().status.protected);
}

#[test]
fn test_protection_blocks_a_later_kill_but_not_a_hunter_shot() {
    let (mut state, mut roles) = table(&[
        ("wolf", RoleKind::Wolf),
        ("guard", RoleKind::Guard),
        ("hunter", RoleKind::Hunter),
        ("anna", RoleKind::Villager),
    ]);

    let Role::Guard(guard) = role(&mut roles, "guard") else { unreachable!() };
    assert!(guard.protect(&id("anna"), &mut state.scope()));

    let Role::Wolf(wolf) = role(&mut roles, "wolf") else { unreachable!() };
    assert!(!wolf.kill(&id("anna"), &mut state.scope()));

    state.mark_dead(&id("hunter"));
    let Role::Hunter(hunter) = role(&mut roles, "hunter") else { unreachable!() };
    assert!(hunter.retaliate(&id("anna"), &mut state.scope()));
    assert_eq!(state.night_deaths().cause_of(&id("anna")), Some(DeathCause::HunterShot));
}

#[test]
fn test_witch_heal_then_poison_elsewhere() {
    let (mut state, mut roles) = table(&[
        ("wolf", RoleKind::Wolf),
        ("witch", RoleKind::Witch),
        ("anna", RoleKind::Villager),
        ("bo", RoleKind::Villager),
    ]);

    let Role::Wolf(wolf) = role(&mut roles, "wolf") else { unreachable!() };
    assert!(wolf.kill(&id("anna"), &mut state.scope()));

    let Role::Witch(witch) = role(&mut roles, "witch") else { unreachable!() };
    assert!(witch.heal(&id("anna"), &mut state.scope()));
    assert!(witch.poison(&id("bo"), &mut state.scope()));
    assert!(!witch.has_heal() && !witch.has_poison());

    let deaths: Vec<_> = state.night_deaths().ids().cloned().collect();
    assert_eq!(deaths, [id("bo")]);
    assert!(state.participant(&id("bo")).unwrap().status.poisoned);
}

#[test]
fn test_seer_reads_role_and_team() {
    let (mut state, mut roles) = table(&[("seer", RoleKind::Seer), ("wolf", RoleKind::Wolf)]);

    let Role::Seer(seer) = role(&mut roles, "seer") else { unreachable!() };
    assert!(!seer.check(&id("seer"), &mut state.scope()));
    assert!(seer.check(&id("wolf"), &mut state.scope()));
    assert_eq!(seer.last_result(), Some("wolf => wolf (wolf)"));

    state.set_phase(Phase::DayDiscussion);
    assert!(!seer.check(&id("wolf"), &mut state.scope()));
}

// =========================================================================
// Cooldowns
// =========================================================================

#[test]
fn test_cooldown_returns_after_exactly_its_default_decays() {
    let (mut state, mut roles) = table(&[("seer", RoleKind::Seer), ("a", RoleKind::Villager)]);
    let default = MatchConfig::standard().cooldowns_for(RoleKind::Seer)[&Skill::Check];
    assert!(default > 0);

    let seer = role(&mut roles, "seer");
    let Role::Seer(s) = seer else { unreachable!() };
    assert!(s.check(&id("a"), &mut state.scope()));
    let status = state.participant(&id("seer")).unwrap().status;
    assert!(!seer.capability().can_use(Skill::Check, &status));

    for _ in 0..default {
        assert!(!seer.capability().can_use(Skill::Check, &status));
        seer.capability_mut().on_phase_enter(Phase::Night);
    }
    assert!(seer.capability().can_use(Skill::Check, &status));
}

// =========================================================================
// Votes and victory
// =========================================================================

#[test]
fn test_plurality_requires_a_unique_leader() {
    let mut tally = VoteTally::new();
    for (voter, target) in [("v1", "a"), ("v2", "a"), ("v3", "b"), ("v4", "b")] {
        tally.cast(id(voter), Some(id(target)));
    }
    assert_eq!(tally.resolve(), None);

    tally.cast(id("v5"), Some(id("a")));
    assert_eq!(tally.resolve(), Some(id("a")));
    assert_eq!(tally.summary(), [(id("a"), 3), (id("b"), 2)]);

    tally.reset();
    assert_eq!(tally.resolve(), None);
}

#[test]
fn test_victory_examples() {
    let cases: [(&[(&str, Team)], Option<Team>); 4] = [
        (&[("l1", Team::Lovers), ("l2", Team::Lovers)], Some(Team::Lovers)),
        (
            &[("w1", Team::Wolf), ("w2", Team::Wolf), ("v1", Team::Village)],
            Some(Team::Wolf),
        ),
        (
            &[("v1", Team::Village), ("v2", Team::Village), ("v3", Team::Village)],
            Some(Team::Village),
        ),
        (&[("w1", Team::Wolf), ("v1", Team::Village), ("v2", Team::Village), ("n1", Team::Neutral)], None),
    ];

    for (alive, expected) in cases {
        let mut evaluator = VictoryEvaluator::new(None);
        for (raw, team) in alive {
            evaluator.register(id(raw), *team);
        }
        assert_eq!(evaluator.evaluate(), expected, "{alive:?}");
    }
}
