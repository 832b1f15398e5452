//! Representación intermedia.
//!
//! El IR es una secuencia plana de instrucciones, cada una compuesta por
//! un [`Opcode`], operandos de texto ordenados y metadatos indexados por
//! clave. Ninguna instrucción hace referencia a otra por posición; toda
//! referencia cruzada ocurre por nombre. El árbol sintáctico se consume
//! al generar el IR y no sobrevive a esta fase.

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use crate::parse::{self, Declaration, Point};

/// Claves de metadatos conocidas.
pub mod key {
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const PATH: &str = "path";
    pub const HP: &str = "hp";
    pub const SPEED: &str = "speed";
    pub const REWARD: &str = "reward";
    pub const RANGE: &str = "range";
    pub const DAMAGE: &str = "damage";
    pub const FIRE_RATE: &str = "fire_rate";
    pub const COST: &str = "cost";
    pub const COUNT: &str = "count";
    pub const START: &str = "start";
    pub const INTERVAL: &str = "interval";
    pub const X: &str = "x";
    pub const Y: &str = "y";

    /// Derivada por plegado de constantes: `damage * fire_rate`.
    pub const DPS: &str = "dps";

    /// Derivada por plegado de constantes: `count * interval`.
    pub const TOTAL_DURATION: &str = "total_duration";
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    DefineMap,
    DefineEnemy,
    DefineTower,
    DefineWave,
    SpawnEnemy,
    PlaceTower,
    Nop,
}

impl Opcode {
    /// Determina si la instrucción define un nombre en alguna categoría.
    pub fn is_definition(self) -> bool {
        matches!(
            self,
            Opcode::DefineMap | Opcode::DefineEnemy | Opcode::DefineTower | Opcode::DefineWave
        )
    }
}

impl Display for Opcode {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::DefineMap => "DEFINE_MAP",
            Opcode::DefineEnemy => "DEFINE_ENEMY",
            Opcode::DefineTower => "DEFINE_TOWER",
            Opcode::DefineWave => "DEFINE_WAVE",
            Opcode::SpawnEnemy => "SPAWN_ENEMY",
            Opcode::PlaceTower => "PLACE_TOWER",
            Opcode::Nop => "NOP",
        };

        fmt.write_str(name)
    }
}

/// Valor de un metadato.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Path(Vec<Point>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(int) => Some(*int),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(float) => Some(*float),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&[Point]> {
        match self {
            Value::Path(path) => Some(path),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(int) => write!(fmt, "{}", int),
            Value::Float(float) => write!(fmt, "{}", float),
            Value::Str(string) => fmt.write_str(string),
            Value::Path(path) => {
                fmt.write_str("[")?;
                for (i, Point { x, y }) in path.iter().enumerate() {
                    if i > 0 {
                        fmt.write_str(";")?;
                    }

                    write!(fmt, "{},{}", x, y)?;
                }

                fmt.write_str("]")
            }
        }
    }
}

impl From<i32> for Value {
    fn from(int: i32) -> Self {
        Value::Int(int.into())
    }
}

impl From<i64> for Value {
    fn from(int: i64) -> Self {
        Value::Int(int)
    }
}

impl From<f64> for Value {
    fn from(float: f64) -> Self {
        Value::Float(float)
    }
}

impl From<String> for Value {
    fn from(string: String) -> Self {
        Value::Str(string)
    }
}

impl From<Vec<Point>> for Value {
    fn from(path: Vec<Point>) -> Self {
        Value::Path(path)
    }
}

/// Metadatos de una instrucción, en orden determinista de clave.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_float)
    }

    pub fn path(&self, key: &str) -> Option<&[Point]> {
        self.get(key).and_then(Value::as_path)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<String>,
    pub metadata: Metadata,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<String>, metadata: Metadata) -> Self {
        Instruction {
            opcode,
            operands,
            metadata,
        }
    }

    /// Primer operando, que corresponde al nombre definido o referenciado.
    pub fn name(&self) -> Option<&str> {
        self.operands.first().map(String::as_str)
    }
}

/// Secuencia completa de instrucciones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program(pub Vec<Instruction>);

impl Program {
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Program(iter.into_iter().collect())
    }
}

impl parse::Ast {
    /// Traduce el árbol a IR, en orden de declaración.
    ///
    /// Cada oleada produce un `DEFINE_WAVE` seguido inmediatamente por
    /// un `SPAWN_ENEMY` por cada una de sus apariciones.
    pub fn lower(self) -> Program {
        use key::*;

        let mut code = Vec::new();
        for declaration in self.0 {
            match declaration {
                Declaration::Map(map) => {
                    let path: Vec<Point> = map.path.into_iter().map(|p| p.into_inner()).collect();
                    code.push(Instruction::new(
                        Opcode::DefineMap,
                        vec![map.name.into_inner().to_string()],
                        metadata! {
                            WIDTH => map.width,
                            HEIGHT => map.height,
                            PATH => path,
                        },
                    ));
                }

                Declaration::Enemy(enemy) => code.push(Instruction::new(
                    Opcode::DefineEnemy,
                    vec![enemy.name.into_inner().to_string()],
                    metadata! {
                        HP => enemy.hp,
                        SPEED => enemy.speed,
                        REWARD => enemy.reward,
                    },
                )),

                Declaration::Tower(tower) => code.push(Instruction::new(
                    Opcode::DefineTower,
                    vec![tower.name.into_inner().to_string()],
                    metadata! {
                        RANGE => tower.range,
                        DAMAGE => tower.damage,
                        FIRE_RATE => tower.fire_rate,
                        COST => tower.cost,
                    },
                )),

                Declaration::Wave(wave) => {
                    let name = wave.name.into_inner().to_string();
                    code.push(Instruction::new(
                        Opcode::DefineWave,
                        vec![name.clone()],
                        metadata! {},
                    ));

                    for spawn in wave.spawns {
                        code.push(Instruction::new(
                            Opcode::SpawnEnemy,
                            vec![name.clone(), spawn.enemy.into_inner().to_string()],
                            metadata! {
                                COUNT => spawn.count,
                                START => spawn.start,
                                INTERVAL => spawn.interval,
                            },
                        ));
                    }
                }

                Declaration::Place(place) => {
                    let Point { x, y } = place.at.into_inner();
                    code.push(Instruction::new(
                        Opcode::PlaceTower,
                        vec![place.tower.into_inner().to_string()],
                        metadata! { X => x, Y => y },
                    ));
                }
            }
        }

        Program(code)
    }
}
