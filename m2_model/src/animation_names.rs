//! Names for sequence ids.

/// The name for each sequence id starting from `0`.
pub static ANIMATION_NAMES: [&str; 102] = [
    "Stand",
    "Death",
    "Spell",
    "Stop",
    "Walk",
    "Run",
    "Dead",
    "Rise",
    "StandWound",
    "CombatWound",
    "CombatCritical",
    "ShuffleLeft",
    "ShuffleRight",
    "Walkbackwards",
    "Stun",
    "HandsClosed",
    "AttackUnarmed",
    "Attack1H",
    "Attack2H",
    "Attack2HL",
    "ParryUnarmed",
    "Parry1H",
    "Parry2H",
    "Parry2HL",
    "ShieldBlock",
    "ReadyUnarmed",
    "Ready1H",
    "Ready2H",
    "Ready2HL",
    "ReadyBow",
    "Dodge",
    "SpellPrecast",
    "SpellCast",
    "SpellCastArea",
    "NPCWelcome",
    "NPCGoodbye",
    "Block",
    "JumpStart",
    "Jump",
    "JumpEnd",
    "Fall",
    "SwimIdle",
    "Swim",
    "SwimLeft",
    "SwimRight",
    "SwimBackwards",
    "AttackBow",
    "FireBow",
    "ReadyRifle",
    "AttackRifle",
    "Loot",
    "ReadySpellDirected",
    "ReadySpellOmni",
    "SpellCastDirected",
    "SpellCastOmni",
    "BattleRoar",
    "ReadyAbility",
    "Special1H",
    "Special2H",
    "ShieldBash",
    "EmoteTalk",
    "EmoteEat",
    "EmoteWork",
    "EmoteUseStanding",
    "EmoteTalkExclamation",
    "EmoteTalkQuestion",
    "EmoteBow",
    "EmoteWave",
    "EmoteCheer",
    "EmoteDance",
    "EmoteLaugh",
    "EmoteSleep",
    "EmoteSitGround",
    "EmoteRude",
    "EmoteRoar",
    "EmoteKneel",
    "EmoteKiss",
    "EmoteCry",
    "EmoteChicken",
    "EmoteBeg",
    "EmoteApplaud",
    "EmoteShout",
    "EmoteFlex",
    "EmoteShy",
    "EmotePoint",
    "Attack1HPierce",
    "Attack2HLoosePierce",
    "AttackOff",
    "AttackOffPierce",
    "Sheath",
    "HipSheath",
    "Mount",
    "RunRight",
    "RunLeft",
    "MountSpecial",
    "Kick",
    "SitGroundDown",
    "SitGround",
    "SitGroundUp",
    "SleepDown",
    "Sleep",
    "SleepUp",
];

/// The name for the sequence `id` or [None] if the id is not known.
pub fn animation_name(id: u16) -> Option<&'static str> {
    ANIMATION_NAMES.get(id as usize).copied()
}
