//! Two-pass template corpus loader
//!
//! The corpus is a line-oriented keyword format, one `keyword value` pair per
//! line. `template <name>` opens a record, `end` closes it, a bare `more`
//! line marks the following record as a continuation part of the previous
//! one, and `msg`/`endmsg` bracket free message text. Blank lines and `#`
//! comments are tolerated anywhere.
//!
//! The first pass builds the catalogue and resolves part chains. Once the
//! probe table exists the same stream is rewound and scanned again to resolve
//! named cross-references (`turns_into`, `loot`, nested `item` blocks) that
//! could point forward in the file.

use std::io::{BufRead, Seek};

use ahash::AHashSet;
use thiserror::Error;

use crate::core::config::TEMPLATE_TABLE_SIZE;
use crate::core::types::{EntityKind, MoveType, SUBKIND_SUMMON};
use crate::entity::Entity;

use super::store::{StoreError, Template, TemplateRegistry};

use glam::IVec2;

/// Initial speed phase for a freshly-loaded default state
const INITIAL_SPEED_LEFT: f32 = -0.1;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A `template` line in pass two named a record that pass one never
    /// built. The corpus is internally inconsistent.
    #[error("unresolved template reference '{0}' in reference-resolution pass")]
    UnresolvedTemplate(String),

    #[error("malformed corpus: {0}")]
    Malformed(String),

    /// Post-load validation found corpus errors; each is also logged.
    #[error("corpus validation failed with {} problem(s)", .0.len())]
    Validation(Vec<String>),
}

/// Names of known loot tables, for second-pass `loot` resolution.
///
/// Loot generation itself lives outside this core; the loader only needs to
/// know which assignments resolve.
#[derive(Debug, Default)]
pub struct LootTables {
    names: AHashSet<String>,
}

impl LootTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Load a corpus with the default table size
pub fn load_templates<R: BufRead + Seek>(
    reader: &mut R,
    loot: &LootTables,
) -> Result<TemplateRegistry, LoadError> {
    load_templates_sized(reader, TEMPLATE_TABLE_SIZE, loot)
}

/// Load a corpus into a registry with an explicit probe-table size
pub fn load_templates_sized<R: BufRead + Seek>(
    reader: &mut R,
    table_size: usize,
    loot: &LootTables,
) -> Result<TemplateRegistry, LoadError> {
    let mut registry = TemplateRegistry::with_table_size(table_size);

    tracing::debug!("template pass 1...");
    first_pass(reader, &mut registry)?;
    registry.build_table()?;

    reader.rewind()?;
    tracing::debug!("template pass 2...");
    second_pass(reader, &mut registry, loot)?;

    validate(&registry)?;
    tracing::debug!("loaded {} templates", registry.len());
    Ok(registry)
}

fn split_keyword(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((k, v)) => (k, v.trim()),
        None => (line, ""),
    }
}

fn read_trimmed<R: BufRead>(reader: &mut R, buf: &mut String) -> std::io::Result<bool> {
    buf.clear();
    Ok(reader.read_line(buf)? > 0)
}

/// Parse one `keyword value` attribute into the record body.
///
/// Returns false for keywords this pass does not recognize.
fn apply_attribute(e: &mut Entity, keyword: &str, value: &str, record: &str) -> bool {
    fn num<T: std::str::FromStr + Default>(value: &str, keyword: &str, record: &str) -> T {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!("bad {} value '{}' in record {}", keyword, value, record);
            T::default()
        })
    }
    fn flag(value: &str) -> bool {
        value != "0"
    }

    match keyword {
        "name" => e.name = value.to_string(),
        "name_pl" => e.name_pl = Some(value.to_string()),
        "title" => e.title = Some(value.to_string()),
        "race" => e.race = Some(value.to_string()),
        "matches" => e.matches = Some(value.to_string()),
        "skill" => e.skill = Some(value.to_string()),
        "face" => e.face = value.to_string(),
        "kind" => match EntityKind::from_keyword(value) {
            Some(kind) => e.kind = kind,
            None => tracing::warn!("unknown kind '{}' in record {}", value, record),
        },
        "subkind" => {
            e.subkind = match value {
                "summon" => SUBKIND_SUMMON,
                other => num::<u8>(other, keyword, record),
            }
        }
        "match_kind" => match EntityKind::from_keyword(value) {
            Some(kind) => e.match_kind = Some(kind),
            None => tracing::warn!("unknown match_kind '{}' in record {}", value, record),
        },
        "x" => e.pos.x = num(value, keyword, record),
        "y" => e.pos.y = num(value, keyword, record),
        "weight" => e.weight = num(value, keyword, record),
        "carrying" => e.carrying = num(value, keyword, record),
        "nrof" => e.nrof = num(value, keyword, record),
        "worth" => e.worth = num(value, keyword, record),
        "state" => e.state = num(value, keyword, record),
        "anim_frame" => e.anim_frame = num(value, keyword, record),
        "speed" => e.speed = num(value, keyword, record),
        "move_type" => match MoveType::parse(value) {
            Some(mt) => e.move_type = mt,
            None => tracing::warn!("bad move_type '{}' in record {}", value, record),
        },
        "move_on" => match MoveType::parse(value) {
            Some(mt) => e.move_on = mt,
            None => tracing::warn!("bad move_on '{}' in record {}", value, record),
        },
        "hp" => e.stats.hp = num(value, keyword, record),
        "maxhp" => e.stats.maxhp = num(value, keyword, record),
        "sp" => e.stats.sp = num(value, keyword, record),
        "maxsp" => e.stats.maxsp = num(value, keyword, record),
        "food" => e.stats.food = num(value, keyword, record),
        "exp" => e.stats.exp = num(value, keyword, record),
        "last_sp" => e.stats.last_sp = num(value, keyword, record),
        "last_heal" => e.stats.last_heal = num(value, keyword, record),
        "last_eat" => e.stats.last_eat = num(value, keyword, record),
        "alive" => e.flags.alive = flag(value),
        "unpaid" => e.flags.unpaid = flag(value),
        "no_pick" => e.flags.no_pick = flag(value),
        "monster" => e.flags.monster = flag(value),
        "generator" => e.flags.generator = flag(value),
        "content_on_gen" => e.flags.content_on_gen = flag(value),
        "activate_on_push" => e.flags.activate_on_push = flag(value),
        "activate_on_release" => e.flags.activate_on_release = flag(value),
        "animated" => e.flags.animated = flag(value),
        _ => return false,
    }
    true
}

/// Structural pass: build the catalogue and resolve part chains.
fn first_pass<R: BufRead>(reader: &mut R, registry: &mut TemplateRegistry) -> Result<(), LoadError> {
    let mut line = String::new();

    // Chain bookkeeping across records
    let mut head: Option<crate::core::types::TemplateId> = None;
    let mut last_more: Option<crate::core::types::TemplateId> = None;
    let mut next_is_part = false;

    // Current record, when inside template .. end
    let mut current: Option<(String, Entity, bool)> = None;

    while read_trimmed(reader, &mut line)? {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (keyword, value) = split_keyword(trimmed);

        if current.is_none() {
            match keyword {
                "template" => {
                    if value.is_empty() {
                        return Err(LoadError::Malformed("template record without a name".into()));
                    }
                    let mut body = Entity::default();
                    body.name = value.to_string();
                    current = Some((value.to_string(), body, next_is_part));
                    next_is_part = false;
                }
                "more" => next_is_part = true,
                _ => {
                    tracing::debug!("stray keyword '{}' between records", keyword);
                }
            }
            continue;
        }

        if keyword == "end" {
            let (name, mut body, is_part) = current.take().unwrap();
            body.speed_left = INITIAL_SPEED_LEFT;
            let mut template = Template::new(&name, body);

            if is_part {
                let head_id = head.ok_or_else(|| {
                    LoadError::Malformed(format!(
                        "continuation record {} has no preceding head",
                        name
                    ))
                })?;
                template.head = Some(head_id);
                if registry.get(head_id).body.flags.monster {
                    template.body.flags.monster = true;
                }
                let part_face = template.body.face.clone();
                let part_pos = template.body.pos;
                let tid = registry.push(template);
                if let Some(prev) = last_more {
                    registry.get_mut(prev).more = Some(tid);
                }

                // Grow the head's footprint to cover this part. A part whose
                // face differs from the head's zeroes the extent instead:
                // secondary-map transmission then only ever consults the head.
                let head_face = registry.get(head_id).body.face.clone();
                let head_t = registry.get_mut(head_id);
                if part_face != head_face {
                    head_t.tail = IVec2::ZERO;
                } else {
                    head_t.tail.x = head_t.tail.x.max(part_pos.x);
                    head_t.tail.y = head_t.tail.y.max(part_pos.y);
                }
                last_more = Some(tid);
            } else {
                let tid = registry.push(template);
                head = Some(tid);
                last_more = Some(tid);
            }
            continue;
        }

        let (name, body, _) = current.as_mut().unwrap();
        match keyword {
            "msg" => {
                let mut text = String::new();
                loop {
                    if reader.read_line(&mut text)? == 0 {
                        return Err(LoadError::Malformed(format!(
                            "unterminated msg block in record {}",
                            name
                        )));
                    }
                    if text.lines().last() == Some("endmsg") {
                        let cut = text.rfind("endmsg").unwrap();
                        text.truncate(cut);
                        break;
                    }
                }
                body.msg = Some(text);
            }
            // Cross-references wait for the resolution pass.
            "turns_into" | "loot" => {}
            "item" => {
                // Nested inventory is resolved in pass two; skip the block.
                // Message text inside it is opaque and may contain a literal
                // "end" line, so msg..endmsg is stepped over as a unit.
                loop {
                    if !read_trimmed(reader, &mut line)? {
                        return Err(LoadError::Malformed(format!(
                            "unterminated item block in record {}",
                            name
                        )));
                    }
                    match line.trim() {
                        "end" => break,
                        "msg" => loop {
                            if !read_trimmed(reader, &mut line)? {
                                return Err(LoadError::Malformed(format!(
                                    "unterminated msg block in item of record {}",
                                    name
                                )));
                            }
                            if line.trim() == "endmsg" {
                                break;
                            }
                        },
                        _ => {}
                    }
                }
            }
            _ => {
                if !apply_attribute(body, keyword, value, name) {
                    tracing::debug!("unknown keyword '{}' in record {}", keyword, name);
                }
            }
        }
    }

    if let Some((name, _, _)) = current {
        return Err(LoadError::Malformed(format!("unterminated record {}", name)));
    }
    Ok(())
}

/// Reference-resolution pass: re-scan the stream now that the probe table is
/// populated, resolving product references, loot assignments and nested
/// inventory.
fn second_pass<R: BufRead>(
    reader: &mut R,
    registry: &mut TemplateRegistry,
    loot: &LootTables,
) -> Result<(), LoadError> {
    let mut line = String::new();
    let mut current: Option<crate::core::types::TemplateId> = None;

    while read_trimmed(reader, &mut line)? {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (keyword, value) = split_keyword(trimmed);

        match keyword {
            "template" => match registry.find_quiet(value) {
                Some(id) => current = Some(id),
                None => {
                    tracing::error!(
                        "fatal: failed to find template {} in reference-resolution pass",
                        value
                    );
                    return Err(LoadError::UnresolvedTemplate(value.to_string()));
                }
            },
            "turns_into" => {
                if let Some(at) = current {
                    if registry.get(at).body.turns_into.is_none() {
                        match registry.find_quiet(value) {
                            Some(other) => registry.get_mut(at).body.turns_into = Some(other),
                            None => tracing::warn!("failed to find turns_into target {}", value),
                        }
                    }
                }
            }
            "loot" => {
                if let Some(at) = current {
                    if loot.contains(value) {
                        registry.get_mut(at).body.loot = Some(value.to_string());
                    } else {
                        tracing::warn!(
                            "failed to link loot table to template {}: {}",
                            registry.get(at).name,
                            value
                        );
                    }
                }
            }
            "item" => {
                let item_name = value.to_string();
                let item = read_item_block(reader, &mut line, registry, &item_name)?;
                match current {
                    Some(at) => {
                        let parent = registry.get_mut(at);
                        parent.body.carrying += item.stacked_weight();
                        parent.body.inv.push(item);
                    }
                    None => {
                        tracing::error!("got an item {} not inside a record", item_name);
                    }
                }
            }
            // Everything else was handled structurally in pass one.
            _ => {}
        }
    }
    Ok(())
}

/// Instantiate a nested inventory item and apply its attribute overrides.
fn read_item_block<R: BufRead>(
    reader: &mut R,
    line: &mut String,
    registry: &TemplateRegistry,
    name: &str,
) -> Result<Entity, LoadError> {
    let mut item = registry.instantiate_by_name(name);
    loop {
        if !read_trimmed(reader, line)? {
            return Err(LoadError::Malformed(format!(
                "unterminated item block for {}",
                name
            )));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (keyword, value) = split_keyword(trimmed);
        match keyword {
            "end" => return Ok(item),
            "msg" => {
                let mut text = String::new();
                loop {
                    if !read_trimmed(reader, line)? {
                        return Err(LoadError::Malformed(format!(
                            "unterminated msg block in item {}",
                            name
                        )));
                    }
                    if line.trim() == "endmsg" {
                        break;
                    }
                    text.push_str(line.trim_end_matches('\n'));
                    text.push('\n');
                }
                item.msg = Some(text);
            }
            _ => {
                if !apply_attribute(&mut item, keyword, value, name) {
                    tracing::debug!("unknown keyword '{}' in item {}", keyword, name);
                }
            }
        }
    }
}

/// Post-load corpus validation. Every violation is logged, then the load
/// fails as a whole: a corpus that trips any of these cannot be safely run.
fn validate(registry: &TemplateRegistry) -> Result<(), LoadError> {
    let mut problems = Vec::new();

    for (_, t) in registry.iter() {
        if t.head.is_some() {
            continue; // checks apply per chain, through the head
        }
        let body = &t.body;

        if body.flags.generator {
            if !body.flags.content_on_gen && body.turns_into.is_none() {
                let msg = format!(
                    "{} is a generator without content_on_gen but lacks a product",
                    t.name
                );
                tracing::error!("fatal: {}", msg);
                problems.push(msg);
            } else if body.flags.content_on_gen && body.inv.is_empty() {
                let msg = format!(
                    "{} is a generator with content_on_gen but lacks inventory",
                    t.name
                );
                tracing::error!("fatal: {}", msg);
                problems.push(msg);
            }
        }

        if body.kind == EntityKind::Spell {
            if body.skill.is_none() {
                let msg = format!("spell template {} has no skill defined", t.name);
                tracing::error!("fatal: {}", msg);
                problems.push(msg);
            }
            if body.subkind == SUBKIND_SUMMON {
                if let Some(product) = body.turns_into {
                    if registry.get(product).body.move_type.is_unset() {
                        let msg = format!(
                            "summonable template {} has no move_type defined",
                            registry.get(product).name
                        );
                        tracing::error!("fatal: {}", msg);
                        problems.push(msg);
                    }
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(LoadError::Validation(problems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn load(corpus: &str) -> Result<TemplateRegistry, LoadError> {
        load_templates_sized(&mut Cursor::new(corpus), 256, &LootTables::new())
    }

    fn load_with_loot(corpus: &str, tables: &[&str]) -> Result<TemplateRegistry, LoadError> {
        let mut loot = LootTables::new();
        for t in tables {
            loot.register(t);
        }
        load_templates_sized(&mut Cursor::new(corpus), 256, &loot)
    }

    const BASIC: &str = "\
# a lever and the gate it drives
template lever_1
name lever
kind handle
face lever.111
end

template gate_iron
name iron gate
kind gate
face gate.111
speed 0
maxsp 0
end
";

    #[test]
    fn test_basic_records() {
        let reg = load(BASIC).unwrap();
        assert_eq!(reg.len(), 2);
        let lever = reg.get(reg.find("lever_1").unwrap());
        assert_eq!(lever.body.kind, EntityKind::Handle);
        assert_eq!(lever.body.name, "lever");
        assert!((lever.body.speed_left - INITIAL_SPEED_LEFT).abs() < f32::EPSILON);
    }

    #[test]
    fn test_part_chain_same_face_grows_tail() {
        let corpus = "\
template door_big
name big door
kind gate
face big_door.111
end
more
template door_big_2
face big_door.111
x 1
end
more
template door_big_3
face big_door.111
x 2
y 1
end
";
        let reg = load(corpus).unwrap();
        let head_id = reg.find("door_big").unwrap();
        let head = reg.get(head_id);
        assert_eq!(head.tail, IVec2::new(2, 1));
        assert!(head.head.is_none());

        // Forward list terminated by an absent more; every part points at
        // the same head.
        let p2 = reg.get(head.more.unwrap());
        assert_eq!(p2.name, "door_big_2");
        assert_eq!(p2.head, Some(head_id));
        let p3 = reg.get(p2.more.unwrap());
        assert_eq!(p3.name, "door_big_3");
        assert_eq!(p3.head, Some(head_id));
        assert!(p3.more.is_none());
    }

    #[test]
    fn test_part_chain_differing_face_zeroes_tail() {
        let corpus = "\
template wall_pair
name wall
face wall_left.111
x 0
end
more
template wall_pair_2
face wall_right.111
x 1
end
";
        let reg = load(corpus).unwrap();
        let head = reg.get(reg.find("wall_pair").unwrap());
        assert_eq!(head.tail, IVec2::ZERO);
    }

    #[test]
    fn test_monster_flag_propagates_to_parts() {
        let corpus = "\
template dragon
name dragon
monster 1
face dragon.111
end
more
template dragon_2
face dragon.111
x 1
end
";
        let reg = load(corpus).unwrap();
        let head = reg.get(reg.find("dragon").unwrap());
        let part = reg.get(head.more.unwrap());
        assert!(part.body.flags.monster);
    }

    #[test]
    fn test_second_pass_resolves_turns_into() {
        let corpus = "\
template converter
name gold maker
turns_into gold_coin
end

template gold_coin
name gold coin
kind money
worth 10
end
";
        let reg = load(corpus).unwrap();
        let conv = reg.get(reg.find("converter").unwrap());
        // Forward reference resolves because pass two runs after the table
        // is fully populated.
        assert_eq!(conv.body.turns_into, Some(reg.find("gold_coin").unwrap()));
    }

    #[test]
    fn test_second_pass_missing_optional_is_warning_only() {
        let corpus = "\
template converter
name lead maker
turns_into no_such_template
end
";
        let reg = load(corpus).unwrap();
        assert!(reg
            .get(reg.find("converter").unwrap())
            .body
            .turns_into
            .is_none());
    }

    #[test]
    fn test_loot_resolution() {
        let corpus = "\
template goblin
name goblin
monster 1
loot goblin_drops
end

template orc
name orc
monster 1
loot missing_table
end
";
        let reg = load_with_loot(corpus, &["goblin_drops"]).unwrap();
        assert_eq!(
            reg.get(reg.find("goblin").unwrap()).body.loot.as_deref(),
            Some("goblin_drops")
        );
        assert!(reg.get(reg.find("orc").unwrap()).body.loot.is_none());
    }

    #[test]
    fn test_nested_inventory_items() {
        let corpus = "\
template guard
name guard
monster 1
item sword_short
nrof 1
end
item gold_coin
nrof 25
end
end

template sword_short
name short sword
weight 30
end

template gold_coin
name gold coin
kind money
worth 10
weight 1
end
";
        let reg = load(corpus).unwrap();
        let guard = reg.get(reg.find("guard").unwrap());
        assert_eq!(guard.body.inv.len(), 2);
        assert_eq!(guard.body.inv[0].name, "short sword");
        assert_eq!(guard.body.inv[1].nrof, 25);
        // Container weight accounting follows the nested items.
        assert_eq!(guard.body.carrying, 30 + 25);
    }

    #[test]
    fn test_unknown_item_template_becomes_singularity() {
        let corpus = "\
template guard
name guard
item mystery_blade
end
end
";
        let reg = load(corpus).unwrap();
        let guard = reg.get(reg.find("guard").unwrap());
        assert_eq!(guard.body.inv.len(), 1);
        assert_eq!(guard.body.inv[0].name, "mystery_blade");
        assert!(guard.body.inv[0].flags.no_pick);
    }

    #[test]
    fn test_item_msg_with_literal_end_line_does_not_desync() {
        let corpus = "\
template courier
name courier
item sealed_letter
msg
The last word is:
end
endmsg
end
weight 60
end

template next_record
name next record
end
";
        let reg = load(corpus).unwrap();
        assert_eq!(reg.len(), 2);
        let courier = reg.get(reg.find("courier").unwrap());
        // The attribute after the item block still lands on the record.
        assert_eq!(courier.body.weight, 60);
        assert_eq!(courier.body.inv.len(), 1);
        assert_eq!(
            courier.body.inv[0].msg.as_deref(),
            Some("The last word is:\nend\n")
        );
    }

    #[test]
    fn test_generator_without_product_is_fatal() {
        let corpus = "\
template rat_hole
name rat hole
generator 1
end
";
        match load(corpus) {
            Err(LoadError::Validation(problems)) => {
                assert_eq!(problems.len(), 1);
                assert!(problems[0].contains("rat_hole"));
            }
            other => panic!("expected validation failure, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_generator_with_product_passes() {
        let corpus = "\
template rat_hole
name rat hole
generator 1
turns_into rat
end

template rat
name rat
monster 1
move_type walk
end
";
        assert!(load(corpus).is_ok());
    }

    #[test]
    fn test_generator_content_on_gen_requires_inventory() {
        let corpus = "\
template nest
name nest
generator 1
content_on_gen 1
end
";
        assert!(matches!(load(corpus), Err(LoadError::Validation(_))));
    }

    #[test]
    fn test_spell_without_skill_is_fatal() {
        let corpus = "\
template spell_fireball
name fireball
kind spell
end
";
        assert!(matches!(load(corpus), Err(LoadError::Validation(_))));
    }

    #[test]
    fn test_summon_product_needs_move_type() {
        let corpus = "\
template spell_summon_golem
name summon golem
kind spell
subkind summon
skill summoning
turns_into golem
end

template golem
name golem
monster 1
end
";
        match load(corpus) {
            Err(LoadError::Validation(problems)) => {
                assert!(problems[0].contains("golem"));
            }
            other => panic!("expected validation failure, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_msg_blocks() {
        let corpus = "\
template sign_warning
name warning sign
kind sign
msg
Beware of the dog.
It bites.
endmsg
end
";
        let reg = load(corpus).unwrap();
        let sign = reg.get(reg.find("sign_warning").unwrap());
        assert_eq!(sign.body.msg.as_deref(), Some("Beware of the dog.\nIt bites.\n"));
    }
}
