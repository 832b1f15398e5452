//! Optimización de IR.
//!
//! Cuatro pasadas se aplican en un orden fijo: eliminación de definiciones
//! duplicadas, fusión de apariciones redundantes, plegado de constantes y
//! eliminación de código muerto. Cada pasada recibe la secuencia completa
//! producida por la anterior y construye una nueva, sin mutar la original.
//! Ninguna pasada reordena instrucciones; solo las elimina o les agrega
//! metadatos.

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;
use tracing::{debug, info_span};

use crate::ir::{key, Instruction, Opcode, Program};

bitflags! {
    /// Pasadas de optimización habilitadas.
    ///
    /// Deshabilitar una pasada no altera el orden de las demás.
    pub struct Passes: u32 {
        /// Eliminación de definiciones duplicadas.
        const DEDUP = 0x01;

        /// Fusión de apariciones redundantes dentro de una oleada.
        const MERGE = 0x02;

        /// Cálculo de `dps` y `total_duration`.
        const FOLD = 0x04;

        /// Eliminación de enemigos y torres sin referencias.
        const DCE = 0x08;
    }
}

impl Default for Passes {
    fn default() -> Self {
        Passes::all()
    }
}

type Pass = fn(&Program) -> Program;

const PIPELINE: &[(Passes, &str, Pass)] = &[
    (Passes::DEDUP, "duplicate-definition removal", remove_duplicate_definitions),
    (Passes::MERGE, "redundant spawn merging", merge_spawns),
    (Passes::FOLD, "constant folding", fold_constants),
    (Passes::DCE, "dead code elimination", eliminate_dead_code),
];

/// Aplica las pasadas habilitadas, en su orden fijo.
pub fn optimize(program: &Program, passes: Passes) -> Program {
    let _span = info_span!("optimize", passes = ?passes).entered();

    let mut current = program.clone();
    for &(flag, name, pass) in PIPELINE {
        if passes.contains(flag) {
            let next = pass(&current);
            debug!(pass = name, before = current.len(), after = next.len(), "pass complete");
            current = next;
        }
    }

    current
}

/// Conserva únicamente la primera definición de cada (categoría, nombre).
pub fn remove_duplicate_definitions(program: &Program) -> Program {
    let mut seen = HashSet::new();

    program
        .iter()
        .filter(|instruction| match instruction.name() {
            Some(name) if instruction.opcode.is_definition() => {
                let fresh = seen.insert((instruction.opcode, name));
                if !fresh {
                    debug!(opcode = %instruction.opcode, name, "removing duplicate definition");
                }

                fresh
            }

            _ => true,
        })
        .cloned()
        .collect()
}

/// Clave de agrupación de apariciones: (oleada, enemigo, inicio, intervalo).
type SpawnKey<'a> = (&'a str, &'a str, i64, i64);

fn spawn_key(instruction: &Instruction) -> Option<SpawnKey<'_>> {
    match (instruction.opcode, instruction.operands.as_slice()) {
        (Opcode::SpawnEnemy, [wave, enemy, ..]) => Some((
            wave,
            enemy,
            instruction.metadata.int(key::START)?,
            instruction.metadata.int(key::INTERVAL)?,
        )),

        _ => None,
    }
}

/// Fusiona apariciones de un mismo grupo en la primera de ellas.
///
/// El primer miembro del grupo permanece en su posición y su `count`
/// pasa a ser la suma del grupo completo; los demás miembros se eliminan.
pub fn merge_spawns(program: &Program) -> Program {
    let mut merged: Vec<Instruction> = Vec::with_capacity(program.len());
    let mut groups: HashMap<SpawnKey<'_>, usize> = HashMap::new();

    for instruction in program.iter() {
        let group = match spawn_key(instruction) {
            Some(group) => group,
            None => {
                merged.push(instruction.clone());
                continue;
            }
        };

        match groups.get(&group) {
            Some(&index) => {
                let first = &mut merged[index];
                let total = first
                    .metadata
                    .int(key::COUNT)
                    .unwrap_or(0)
                    .saturating_add(instruction.metadata.int(key::COUNT).unwrap_or(0));

                first.metadata.insert(key::COUNT, total);
                debug!(wave = group.0, enemy = group.1, count = total, "merged redundant spawn");
            }

            None => {
                groups.insert(group, merged.len());
                merged.push(instruction.clone());
            }
        }
    }

    Program(merged)
}

/// Agrega metadatos derivados a torres y apariciones.
///
/// `dps = damage * fire_rate` y `total_duration = count * interval`.
/// Un `dps` que no es finito se omite.
pub fn fold_constants(program: &Program) -> Program {
    program
        .iter()
        .map(|instruction| {
            let mut folded = instruction.clone();
            let metadata = &instruction.metadata;

            match instruction.opcode {
                Opcode::DefineTower => {
                    if let (Some(damage), Some(fire_rate)) =
                        (metadata.int(key::DAMAGE), metadata.float(key::FIRE_RATE))
                    {
                        let dps = damage as f64 * fire_rate;
                        if dps.is_finite() {
                            folded.metadata.insert(key::DPS, dps);
                        } else {
                            debug!(tower = ?instruction.name(), "dps overflows, not folding");
                        }
                    }
                }

                Opcode::SpawnEnemy => {
                    if let (Some(count), Some(interval)) =
                        (metadata.int(key::COUNT), metadata.int(key::INTERVAL))
                    {
                        folded
                            .metadata
                            .insert(key::TOTAL_DURATION, count.saturating_mul(interval));
                    }
                }

                _ => (),
            }

            folded
        })
        .collect()
}

/// Elimina enemigos y torres sin referencias, así como todo `NOP`.
///
/// Mapas, oleadas, apariciones y colocaciones nunca se eliminan.
pub fn eliminate_dead_code(program: &Program) -> Program {
    let mut enemies = HashSet::new();
    let mut towers = HashSet::new();

    for instruction in program.iter() {
        match (instruction.opcode, instruction.operands.as_slice()) {
            (Opcode::SpawnEnemy, [_, enemy, ..]) => {
                enemies.insert(enemy.as_str());
            }

            (Opcode::PlaceTower, [tower, ..]) => {
                towers.insert(tower.as_str());
            }

            _ => (),
        }
    }

    program
        .iter()
        .filter(|instruction| {
            let referenced = match (instruction.opcode, instruction.name()) {
                (Opcode::Nop, _) => false,
                (Opcode::DefineEnemy, Some(name)) => enemies.contains(name),
                (Opcode::DefineTower, Some(name)) => towers.contains(name),
                _ => true,
            };

            if !referenced {
                debug!(opcode = %instruction.opcode, name = ?instruction.name(), "removing dead code");
            }

            referenced
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::Metadata;
    use proptest::prelude::*;

    fn define(opcode: Opcode, name: &str) -> Instruction {
        Instruction::new(opcode, vec![name.to_owned()], Metadata::default())
    }

    fn spawn(wave: &str, enemy: &str, count: i64, start: i64, interval: i64) -> Instruction {
        Instruction::new(
            Opcode::SpawnEnemy,
            vec![wave.to_owned(), enemy.to_owned()],
            metadata! {
                key::COUNT => count,
                key::START => start,
                key::INTERVAL => interval,
            },
        )
    }

    fn tower(name: &str, damage: i64, fire_rate: f64) -> Instruction {
        Instruction::new(
            Opcode::DefineTower,
            vec![name.to_owned()],
            metadata! {
                key::RANGE => 1i64,
                key::DAMAGE => damage,
                key::FIRE_RATE => fire_rate,
                key::COST => 0i64,
            },
        )
    }

    fn place(tower: &str) -> Instruction {
        Instruction::new(
            Opcode::PlaceTower,
            vec![tower.to_owned()],
            metadata! { key::X => 0i64, key::Y => 0i64 },
        )
    }

    fn names(program: &Program) -> Vec<(Opcode, String)> {
        program
            .iter()
            .map(|i| (i.opcode, i.operands.join(" ")))
            .collect()
    }

    fn arbitrary_instruction() -> impl Strategy<Value = Instruction> {
        let opcode = prop_oneof![
            Just(Opcode::DefineMap),
            Just(Opcode::DefineEnemy),
            Just(Opcode::DefineTower),
            Just(Opcode::DefineWave),
            Just(Opcode::PlaceTower),
            Just(Opcode::Nop),
        ];

        prop_oneof![
            (opcode, "[A-C]").prop_map(|(opcode, name)| define(opcode, &name)),
            ("[WV]", "[A-C]", 1i64..5, 0i64..3, 1i64..3).prop_map(
                |(wave, enemy, count, start, interval)| spawn(&wave, &enemy, count, start, interval)
            ),
        ]
    }

    proptest! {
        #[test]
        fn dedup_is_idempotent(code in prop::collection::vec(arbitrary_instruction(), 0..24)) {
            let once = remove_duplicate_definitions(&Program(code));
            let twice = remove_duplicate_definitions(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn merging_preserves_spawn_totals(code in prop::collection::vec(arbitrary_instruction(), 0..24)) {
            let program = Program(code);
            let total = |program: &Program| -> HashMap<(String, String, i64, i64), i64> {
                let mut totals = HashMap::new();
                for instruction in program.iter() {
                    if let Some((wave, enemy, start, interval)) = spawn_key(instruction) {
                        *totals
                            .entry((wave.to_owned(), enemy.to_owned(), start, interval))
                            .or_insert(0) += instruction.metadata.int(key::COUNT).unwrap_or(0);
                    }
                }

                totals
            };

            let merged = merge_spawns(&program);
            prop_assert_eq!(total(&program), total(&merged));

            // Como mucho una aparición por grupo
            let groups: HashSet<_> = merged.iter().filter_map(spawn_key).collect();
            let spawns = merged.iter().filter(|i| i.opcode == Opcode::SpawnEnemy).count();
            prop_assert_eq!(groups.len(), spawns);
        }

        #[test]
        fn passes_only_delete(code in prop::collection::vec(arbitrary_instruction(), 0..24)) {
            let program = Program(code);
            let optimized = optimize(&program, Passes::all());

            // La salida es una subsecuencia de la entrada
            let mut remaining = program.iter().map(|i| (i.opcode, i.operands.clone()));
            for instruction in optimized.iter() {
                let wanted = (instruction.opcode, instruction.operands.clone());
                prop_assert!(remaining.any(|candidate| candidate == wanted));
            }
        }
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let mut first = define(Opcode::DefineEnemy, "E");
        first.metadata.insert(key::HP, 1i64);
        let mut second = define(Opcode::DefineEnemy, "E");
        second.metadata.insert(key::HP, 2i64);

        let program = Program(vec![
            define(Opcode::DefineMap, "M"),
            first,
            define(Opcode::DefineTower, "E"),
            second,
            define(Opcode::DefineMap, "M"),
            define(Opcode::Nop, "E"),
        ]);

        let deduped = remove_duplicate_definitions(&program);
        assert_eq!(
            names(&deduped),
            vec![
                (Opcode::DefineMap, "M".to_owned()),
                (Opcode::DefineEnemy, "E".to_owned()),
                (Opcode::DefineTower, "E".to_owned()),
                (Opcode::Nop, "E".to_owned()),
            ]
        );

        assert_eq!(deduped.0[1].metadata.int(key::HP), Some(1));
    }

    #[test]
    fn merges_matching_spawns() {
        let program = Program(vec![
            define(Opcode::DefineWave, "W"),
            spawn("W", "E", 3, 0, 2),
            spawn("W", "F", 1, 0, 2),
            spawn("W", "E", 2, 0, 2),
        ]);

        let merged = merge_spawns(&program);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.0[1].operands, vec!["W", "E"]);
        assert_eq!(merged.0[1].metadata.int(key::COUNT), Some(5));
        assert_eq!(merged.0[2].operands, vec!["W", "F"]);

        // La entrada no se modifica
        assert_eq!(program.0[1].metadata.int(key::COUNT), Some(3));
    }

    #[test]
    fn distinct_groups_never_merge() {
        let program = Program(vec![
            spawn("W", "E", 1, 0, 2),
            spawn("V", "E", 1, 0, 2),
            spawn("W", "F", 1, 0, 2),
            spawn("W", "E", 1, 1, 2),
            spawn("W", "E", 1, 0, 3),
        ]);

        assert_eq!(merge_spawns(&program), program);
    }

    #[test]
    fn folds_derived_metadata() {
        let program = Program(vec![tower("T", 10, 2.0), spawn("W", "E", 5, 0, 3)]);
        let folded = fold_constants(&program);

        assert_eq!(folded.0[0].metadata.float(key::DPS), Some(20.0));
        assert_eq!(folded.0[1].metadata.int(key::TOTAL_DURATION), Some(15));
        assert!(!program.0[0].metadata.contains(key::DPS));
    }

    #[test]
    fn infinite_dps_is_not_folded() {
        let program = Program(vec![tower("T", i32::MAX.into(), f64::MAX)]);
        let folded = fold_constants(&program);

        assert!(!folded.0[0].metadata.contains(key::DPS));
        assert_eq!(folded.0[0].metadata.float(key::FIRE_RATE), Some(f64::MAX));
    }

    #[test]
    fn folding_sees_merged_counts() {
        let program = Program(vec![
            define(Opcode::DefineWave, "W"),
            spawn("W", "E", 3, 0, 2),
            spawn("W", "E", 2, 0, 2),
        ]);

        let optimized = optimize(&program, Passes::MERGE | Passes::FOLD);
        assert_eq!(optimized.0[1].metadata.int(key::COUNT), Some(5));
        assert_eq!(optimized.0[1].metadata.int(key::TOTAL_DURATION), Some(10));
    }

    #[test]
    fn removes_unreferenced_definitions() {
        let program = Program(vec![
            define(Opcode::DefineMap, "M"),
            define(Opcode::DefineEnemy, "Used"),
            define(Opcode::DefineEnemy, "Unused"),
            tower("Placed", 1, 1.0),
            tower("Idle", 1, 1.0),
            define(Opcode::DefineWave, "Empty"),
            define(Opcode::Nop, ""),
            define(Opcode::DefineWave, "W"),
            spawn("W", "Used", 1, 0, 1),
            spawn("W", "Ghost", 1, 0, 1),
            place("Placed"),
        ]);

        let live = eliminate_dead_code(&program);
        assert_eq!(
            names(&live),
            vec![
                (Opcode::DefineMap, "M".to_owned()),
                (Opcode::DefineEnemy, "Used".to_owned()),
                (Opcode::DefineTower, "Placed".to_owned()),
                (Opcode::DefineWave, "Empty".to_owned()),
                (Opcode::DefineWave, "W".to_owned()),
                (Opcode::SpawnEnemy, "W Used".to_owned()),
                (Opcode::SpawnEnemy, "W Ghost".to_owned()),
                (Opcode::PlaceTower, "Placed".to_owned()),
            ]
        );
    }

    #[test]
    fn disabled_passes_are_skipped() {
        let program = Program(vec![
            define(Opcode::DefineEnemy, "E"),
            define(Opcode::DefineEnemy, "E"),
            tower("T", 2, 1.5),
        ]);

        assert_eq!(optimize(&program, Passes::empty()), program);

        let folded_only = optimize(&program, Passes::FOLD);
        assert_eq!(folded_only.len(), 3);
        assert_eq!(folded_only.0[2].metadata.float(key::DPS), Some(3.0));

        let all = optimize(&program, Passes::default());
        assert!(all.is_empty());
    }
}
