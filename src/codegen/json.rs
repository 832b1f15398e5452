//! Documento estructurado.

use std::io::Write;

use serde::{ser::Error as _, Serialize, Serializer};
use serde_json::value::RawValue;

use super::{float, int, operand, Codegen, CodegenError};
use crate::ir::{key, Instruction, Opcode, Program};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    game_config: GameConfig,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GameConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    map: Option<Map>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    enemies: Vec<Enemy>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    towers: Vec<Tower>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    waves: Vec<Wave>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    initial_placements: Vec<Placement>,
}

#[derive(Serialize)]
struct Map {
    name: String,
    width: i64,
    height: i64,
    path: Vec<Coordinate>,
}

#[derive(Serialize)]
struct Coordinate {
    x: i64,
    y: i64,
}

#[derive(Serialize)]
struct Enemy {
    name: String,
    hp: i64,
    speed: Fixed,
    reward: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tower {
    name: String,
    range: i64,
    damage: i64,
    fire_rate: Fixed,
    cost: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    dps: Option<Fixed>,
}

#[derive(Serialize)]
struct Wave {
    name: String,
    spawns: Vec<Spawn>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Spawn {
    enemy_type: String,
    count: i64,
    start: i64,
    interval: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    total_duration: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Placement {
    tower_type: String,
    x: i64,
    y: i64,
}

/// Flotante que se serializa con exactamente dos decimales.
struct Fixed(f64);

impl Serialize for Fixed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = RawValue::from_string(format!("{:.2}", self.0)).map_err(S::Error::custom)?;
        raw.serialize(serializer)
    }
}

pub(super) fn emit<W: Write>(program: &Program, output: &mut W) -> Codegen<()> {
    let document = Document {
        game_config: collect(program)?,
    };

    serde_json::to_writer_pretty(&mut *output, &document)?;
    writeln!(output)?;

    Ok(())
}

fn collect(program: &Program) -> Codegen<GameConfig> {
    let mut config = GameConfig::default();
    let code = &program.0;

    for (index, instruction) in code.iter().enumerate() {
        match instruction.opcode {
            Opcode::DefineMap if config.map.is_none() => config.map = Some(map(instruction)?),

            Opcode::DefineEnemy => config.enemies.push(Enemy {
                name: operand(instruction, 0)?.to_owned(),
                hp: int(instruction, key::HP)?,
                speed: Fixed(float(instruction, key::SPEED)?),
                reward: int(instruction, key::REWARD)?,
            }),

            Opcode::DefineTower => config.towers.push(Tower {
                name: operand(instruction, 0)?.to_owned(),
                range: int(instruction, key::RANGE)?,
                damage: int(instruction, key::DAMAGE)?,
                fire_rate: Fixed(float(instruction, key::FIRE_RATE)?),
                cost: int(instruction, key::COST)?,
                dps: instruction.metadata.float(key::DPS).map(Fixed),
            }),

            Opcode::DefineWave => {
                let spawns = code[index + 1..]
                    .iter()
                    .take_while(|next| next.opcode == Opcode::SpawnEnemy)
                    .map(spawn)
                    .collect::<Codegen<_>>()?;

                config.waves.push(Wave {
                    name: operand(instruction, 0)?.to_owned(),
                    spawns,
                });
            }

            Opcode::PlaceTower => config.initial_placements.push(Placement {
                tower_type: operand(instruction, 0)?.to_owned(),
                x: int(instruction, key::X)?,
                y: int(instruction, key::Y)?,
            }),

            // Mapas posteriores al primero, apariciones ya consumidas y NOP
            _ => (),
        }
    }

    Ok(config)
}

fn map(instruction: &Instruction) -> Codegen<Map> {
    let path = instruction
        .metadata
        .path(key::PATH)
        .ok_or(CodegenError::Metadata {
            opcode: instruction.opcode,
            key: key::PATH,
            expected: "path",
        })?;

    Ok(Map {
        name: operand(instruction, 0)?.to_owned(),
        width: int(instruction, key::WIDTH)?,
        height: int(instruction, key::HEIGHT)?,
        path: path
            .iter()
            .map(|point| Coordinate {
                x: point.x.into(),
                y: point.y.into(),
            })
            .collect(),
    })
}

fn spawn(instruction: &Instruction) -> Codegen<Spawn> {
    Ok(Spawn {
        enemy_type: operand(instruction, 1)?.to_owned(),
        count: int(instruction, key::COUNT)?,
        start: int(instruction, key::START)?,
        interval: int(instruction, key::INTERVAL)?,
        total_duration: instruction.metadata.int(key::TOTAL_DURATION),
    })
}
