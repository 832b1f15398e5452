//! Análisis semántico.
//!
//! Se recorre el árbol una única vez, en orden de declaración. Por esta
//! razón las referencias hacia adelante se rechazan: un enemigo debe
//! declararse antes que cualquier oleada que lo utilice, una torre antes
//! de cualquier colocación suya y un mapa antes de cualquier colocación.
//! El primer error encontrado aborta el análisis.

use thiserror::Error;

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

use crate::{
    lex::Identifier,
    parse::{self, Declaration, EnemyDecl, MapDecl, Point, TowerDecl, WaveDecl},
    source::Located,
};

/// Tablas de símbolos resultantes de un análisis exitoso.
///
/// Cada categoría tiene su propio espacio de nombres, por lo que un
/// mismo nombre puede referirse a la vez a un enemigo y a una torre.
#[derive(Default)]
pub struct SymbolTable<'a> {
    maps: HashMap<&'a Identifier, &'a MapDecl>,
    enemies: HashMap<&'a Identifier, &'a EnemyDecl>,
    towers: HashMap<&'a Identifier, &'a TowerDecl>,
    waves: HashMap<&'a Identifier, &'a WaveDecl>,
    current_map: Option<&'a MapDecl>,
}

impl<'a> SymbolTable<'a> {
    pub fn map(&self, name: &Identifier) -> Option<&'a MapDecl> {
        self.maps.get(name).copied()
    }

    pub fn enemy(&self, name: &Identifier) -> Option<&'a EnemyDecl> {
        self.enemies.get(name).copied()
    }

    pub fn tower(&self, name: &Identifier) -> Option<&'a TowerDecl> {
        self.towers.get(name).copied()
    }

    pub fn wave(&self, name: &Identifier) -> Option<&'a WaveDecl> {
        self.waves.get(name).copied()
    }

    /// Último mapa declarado, contra el cual se validan las colocaciones.
    pub fn current_map(&self) -> Option<&'a MapDecl> {
        self.current_map
    }
}

/// Categoría de una declaración o sentencia.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Map,
    Enemy,
    Tower,
    Wave,
    Spawn,
}

impl Display for Category {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Map => fmt.write_str("map"),
            Category::Enemy => fmt.write_str("enemy"),
            Category::Tower => fmt.write_str("tower"),
            Category::Wave => fmt.write_str("wave"),
            Category::Spawn => fmt.write_str("spawn of"),
        }
    }
}

/// Cota inferior de un campo numérico.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bound {
    /// `> 0`
    Positive,

    /// `>= 0`
    NonNegative,
}

impl Bound {
    fn admits(self, value: f64) -> bool {
        match self {
            Bound::Positive => value > 0.0,
            Bound::NonNegative => value >= 0.0,
        }
    }
}

impl Display for Bound {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Positive => fmt.write_str("positive"),
            Bound::NonNegative => fmt.write_str("non-negative"),
        }
    }
}

pub type Semantic<T> = Result<T, Located<SemanticError>>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Duplicate {0} name `{1}`")]
    Duplicate(Category, Identifier),

    #[error("Invalid map size {width}x{height}, both dimensions must be positive")]
    InvalidMapSize { width: i32, height: i32 },

    #[error("Invalid {field} `{value}` in {category} `{name}`, expected a {bound} value")]
    OutOfRange {
        category: Category,
        name: Identifier,
        field: &'static str,
        value: f64,
        bound: Bound,
    },

    #[error("Path coordinate {point} is out of bounds for map `{map}` ({width}x{height})")]
    PathOutOfBounds {
        point: Point,
        map: Identifier,
        width: i32,
        height: i32,
    },

    #[error("Wave `{wave}` spawns undefined enemy `{enemy}`")]
    UndefinedEnemy { wave: Identifier, enemy: Identifier },

    #[error("Placing undefined tower type `{0}`")]
    UndefinedTower(Identifier),

    #[error("Tower `{0}` is placed before any map definition")]
    PlacementBeforeMap(Identifier),

    #[error("Tower placement {point} is out of bounds for map `{map}` ({width}x{height})")]
    PlacementOutOfBounds {
        point: Point,
        map: Identifier,
        width: i32,
        height: i32,
    },
}

impl parse::Ast {
    /// Valida nombres, rangos y referencias cruzadas.
    pub fn analyze(&self) -> Semantic<SymbolTable<'_>> {
        let mut table = SymbolTable::default();

        for declaration in self.iter() {
            match declaration {
                Declaration::Map(map) => table.check_map(map)?,
                Declaration::Enemy(enemy) => table.check_enemy(enemy)?,
                Declaration::Tower(tower) => table.check_tower(tower)?,
                Declaration::Wave(wave) => table.check_wave(wave)?,
                Declaration::Place(place) => table.check_place(place)?,
            }
        }

        Ok(table)
    }
}

impl<'a> SymbolTable<'a> {
    fn check_map(&mut self, map: &'a MapDecl) -> Semantic<()> {
        define(&mut self.maps, Category::Map, &map.name, map)?;
        self.current_map = Some(map);

        if map.width <= 0 || map.height <= 0 {
            return Err(Located::at(
                SemanticError::InvalidMapSize {
                    width: map.width,
                    height: map.height,
                },
                map.name.location().clone(),
            ));
        }

        for point in &map.path {
            if !within(map, point.val()) {
                return Err(Located::at(
                    SemanticError::PathOutOfBounds {
                        point: *point.val(),
                        map: map.name.val().clone(),
                        width: map.width,
                        height: map.height,
                    },
                    point.location().clone(),
                ));
            }
        }

        Ok(())
    }

    fn check_enemy(&mut self, enemy: &'a EnemyDecl) -> Semantic<()> {
        define(&mut self.enemies, Category::Enemy, &enemy.name, enemy)?;

        let fields = [
            ("hp", f64::from(enemy.hp), Bound::Positive),
            ("speed", enemy.speed, Bound::Positive),
            ("reward", f64::from(enemy.reward), Bound::NonNegative),
        ];

        check_fields(Category::Enemy, &enemy.name, &fields)
    }

    fn check_tower(&mut self, tower: &'a TowerDecl) -> Semantic<()> {
        define(&mut self.towers, Category::Tower, &tower.name, tower)?;

        let fields = [
            ("range", f64::from(tower.range), Bound::Positive),
            ("damage", f64::from(tower.damage), Bound::Positive),
            ("cost", f64::from(tower.cost), Bound::NonNegative),
            ("fire_rate", tower.fire_rate, Bound::Positive),
        ];

        check_fields(Category::Tower, &tower.name, &fields)
    }

    fn check_wave(&mut self, wave: &'a WaveDecl) -> Semantic<()> {
        define(&mut self.waves, Category::Wave, &wave.name, wave)?;

        for spawn in &wave.spawns {
            if !self.enemies.contains_key(spawn.enemy.val()) {
                return Err(Located::at(
                    SemanticError::UndefinedEnemy {
                        wave: wave.name.val().clone(),
                        enemy: spawn.enemy.val().clone(),
                    },
                    spawn.enemy.location().clone(),
                ));
            }

            let fields = [
                ("count", f64::from(spawn.count), Bound::Positive),
                ("start", f64::from(spawn.start), Bound::NonNegative),
                ("interval", f64::from(spawn.interval), Bound::Positive),
            ];

            check_fields(Category::Spawn, &spawn.enemy, &fields)?;
        }

        Ok(())
    }

    fn check_place(&mut self, place: &'a parse::PlaceStmt) -> Semantic<()> {
        let tower = place.tower.val();
        if !self.towers.contains_key(tower) {
            return Err(Located::at(
                SemanticError::UndefinedTower(tower.clone()),
                place.tower.location().clone(),
            ));
        }

        let map = self.current_map.ok_or_else(|| {
            Located::at(
                SemanticError::PlacementBeforeMap(tower.clone()),
                place.tower.location().clone(),
            )
        })?;

        if !within(map, place.at.val()) {
            return Err(Located::at(
                SemanticError::PlacementOutOfBounds {
                    point: *place.at.val(),
                    map: map.name.val().clone(),
                    width: map.width,
                    height: map.height,
                },
                place.at.location().clone(),
            ));
        }

        Ok(())
    }
}

/// Inserta una declaración en su tabla, rechazando nombres repetidos.
fn define<'a, T>(
    table: &mut HashMap<&'a Identifier, &'a T>,
    category: Category,
    name: &'a Located<Identifier>,
    declaration: &'a T,
) -> Semantic<()> {
    if table.insert(name.val(), declaration).is_some() {
        return Err(Located::at(
            SemanticError::Duplicate(category, name.val().clone()),
            name.location().clone(),
        ));
    }

    Ok(())
}

fn check_fields(
    category: Category,
    name: &Located<Identifier>,
    fields: &[(&'static str, f64, Bound)],
) -> Semantic<()> {
    match fields.iter().find(|(_, value, bound)| !bound.admits(*value)) {
        None => Ok(()),
        Some(&(field, value, bound)) => Err(Located::at(
            SemanticError::OutOfRange {
                category,
                name: name.val().clone(),
                field,
                value,
                bound,
            },
            name.location().clone(),
        )),
    }
}

fn within(map: &MapDecl, point: &Point) -> bool {
    (0..map.width).contains(&point.x) && (0..map.height).contains(&point.y)
}
