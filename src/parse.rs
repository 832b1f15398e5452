//! Análisis sintáctico.
//!
//! Parser descendente recursivo con un único token de lookahead. No
//! existe recuperación de errores: el primer token que no corresponde
//! a la gramática aborta el análisis con un [`ParserError`] ubicado en
//! ese token.

use std::{fmt, rc::Rc};
use thiserror::Error;

use crate::{
    lex::{Identifier, Keyword, Lexer, Token, TokenKind},
    source::{Located, Location, Source},
};

/// Árbol sintáctico de un programa completo.
///
/// Las declaraciones se conservan en el mismo orden del código fuente,
/// ya que el análisis semántico depende de él.
#[derive(Debug, Clone)]
pub struct Ast(pub Vec<Declaration>);

impl Ast {
    pub fn iter(&self) -> std::slice::Iter<'_, Declaration> {
        self.0.iter()
    }
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Map(MapDecl),
    Enemy(EnemyDecl),
    Tower(TowerDecl),
    Wave(WaveDecl),
    Place(PlaceStmt),
}

#[derive(Debug, Clone)]
pub struct MapDecl {
    pub name: Located<Identifier>,
    pub width: i32,
    pub height: i32,
    pub path: Vec<Located<Point>>,
}

#[derive(Debug, Clone)]
pub struct EnemyDecl {
    pub name: Located<Identifier>,
    pub hp: i32,
    pub speed: f64,
    pub reward: i32,
}

#[derive(Debug, Clone)]
pub struct TowerDecl {
    pub name: Located<Identifier>,
    pub range: i32,
    pub damage: i32,
    pub fire_rate: f64,
    pub cost: i32,
}

#[derive(Debug, Clone)]
pub struct WaveDecl {
    pub name: Located<Identifier>,
    pub spawns: Vec<SpawnStmt>,
}

/// Aparición de enemigos dentro de una oleada.
#[derive(Debug, Clone)]
pub struct SpawnStmt {
    pub enemy: Located<Identifier>,
    pub count: i32,
    pub start: i32,
    pub interval: i32,
}

#[derive(Debug, Clone)]
pub struct PlaceStmt {
    pub tower: Located<Identifier>,
    pub at: Located<Point>,
}

/// Coordenada de celda en un mapa.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl fmt::Display for Point {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "({}, {})", self.x, self.y)
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {expected}, found {found} instead")]
    UnexpectedToken { expected: &'static str, found: Token },

    #[error("Expected a declaration (`map`, `enemy`, `tower`, `wave` or `place`), found {0} instead")]
    ExpectedDeclaration(Token),

    #[error("Integer literal `{0}` overflows, valid range is [0, 2147483647]")]
    IntOverflow(String),

    #[error("Malformed float literal `{0}`")]
    BadFloat(String),

    #[error("Float literal `{0}` is too large to be represented")]
    FloatOverflow(String),
}

type Parse<T> = Result<T, Located<ParserError>>;

/// Construye el árbol sintáctico de un origen completo.
pub fn parse(source: &Rc<Source>) -> Parse<Ast> {
    Parser::new(Lexer::new(source)).program()
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Located<Token>,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Self {
        let current = lexer.next_token();
        Parser { lexer, current }
    }

    pub fn program(mut self) -> Parse<Ast> {
        let mut declarations = Vec::new();
        while self.current.val().kind() != TokenKind::Eof {
            declarations.push(self.declaration()?);
        }

        Ok(Ast(declarations))
    }

    fn declaration(&mut self) -> Parse<Declaration> {
        let declaration = if self.accept(TokenKind::Keyword(Keyword::Map)) {
            Declaration::Map(self.map_decl()?)
        } else if self.accept(TokenKind::Keyword(Keyword::Enemy)) {
            Declaration::Enemy(self.enemy_decl()?)
        } else if self.accept(TokenKind::Keyword(Keyword::Tower)) {
            Declaration::Tower(self.tower_decl()?)
        } else if self.accept(TokenKind::Keyword(Keyword::Wave)) {
            Declaration::Wave(self.wave_decl()?)
        } else if self.accept(TokenKind::Keyword(Keyword::Place)) {
            Declaration::Place(self.place_stmt()?)
        } else {
            let (location, found) = self.current.clone().split();
            return Err(Located::at(ParserError::ExpectedDeclaration(found), location));
        };

        Ok(declaration)
    }

    fn map_decl(&mut self) -> Parse<MapDecl> {
        let name = self.name("map name")?;
        self.expect(TokenKind::OpenCurly, "`{`")?;

        self.keyword(Keyword::Size, "`size`")?;
        self.expect(TokenKind::Assign, "`=`")?;
        self.expect(TokenKind::OpenParen, "`(`")?;
        let width = self.int("map width")?;
        self.expect(TokenKind::Comma, "`,`")?;
        let height = self.int("map height")?;
        self.expect(TokenKind::CloseParen, "`)`")?;
        self.expect(TokenKind::Semicolon, "`;`")?;

        self.keyword(Keyword::Path, "`path`")?;
        self.expect(TokenKind::Assign, "`=`")?;
        self.expect(TokenKind::OpenSquare, "`[`")?;

        // Las comas entre puntos son opcionales, incluso al final
        let mut path = Vec::new();
        while !self.accept(TokenKind::CloseSquare) {
            path.push(self.point()?);
            self.accept(TokenKind::Comma);
        }

        self.expect(TokenKind::Semicolon, "`;`")?;
        self.expect(TokenKind::CloseCurly, "`}`")?;

        Ok(MapDecl {
            name,
            width,
            height,
            path,
        })
    }

    fn enemy_decl(&mut self) -> Parse<EnemyDecl> {
        let name = self.name("enemy name")?;
        self.expect(TokenKind::OpenCurly, "`{`")?;

        self.field("`hp`")?;
        let hp = self.int("hp value")?;
        self.expect(TokenKind::Semicolon, "`;`")?;

        self.field("`speed`")?;
        let speed = self.float("speed value")?;
        self.expect(TokenKind::Semicolon, "`;`")?;

        self.field("`reward`")?;
        let reward = self.int("reward value")?;
        self.expect(TokenKind::Semicolon, "`;`")?;

        self.expect(TokenKind::CloseCurly, "`}`")?;

        Ok(EnemyDecl {
            name,
            hp,
            speed,
            reward,
        })
    }

    fn tower_decl(&mut self) -> Parse<TowerDecl> {
        let name = self.name("tower name")?;
        self.expect(TokenKind::OpenCurly, "`{`")?;

        self.field("`range`")?;
        let range = self.int("range value")?;
        self.expect(TokenKind::Semicolon, "`;`")?;

        self.field("`damage`")?;
        let damage = self.int("damage value")?;
        self.expect(TokenKind::Semicolon, "`;`")?;

        self.field("`fire_rate`")?;
        let fire_rate = self.float("fire_rate value")?;
        self.expect(TokenKind::Semicolon, "`;`")?;

        self.field("`cost`")?;
        let cost = self.int("cost value")?;
        self.expect(TokenKind::Semicolon, "`;`")?;

        self.expect(TokenKind::CloseCurly, "`}`")?;

        Ok(TowerDecl {
            name,
            range,
            damage,
            fire_rate,
            cost,
        })
    }

    fn wave_decl(&mut self) -> Parse<WaveDecl> {
        let name = self.name("wave name")?;
        self.expect(TokenKind::OpenCurly, "`{`")?;

        let mut spawns = Vec::new();
        while self.accept(TokenKind::Keyword(Keyword::Spawn)) {
            spawns.push(self.spawn_stmt()?);
        }

        self.expect(TokenKind::CloseCurly, "`}` or `spawn`")?;
        Ok(WaveDecl { name, spawns })
    }

    fn spawn_stmt(&mut self) -> Parse<SpawnStmt> {
        self.expect(TokenKind::OpenParen, "`(`")?;
        let enemy = self.name("enemy type")?;

        self.expect(TokenKind::Comma, "`,`")?;
        self.keyword(Keyword::Count, "`count`")?;
        self.expect(TokenKind::Assign, "`=`")?;
        let count = self.int("count")?;

        self.expect(TokenKind::Comma, "`,`")?;
        self.keyword(Keyword::Start, "`start`")?;
        self.expect(TokenKind::Assign, "`=`")?;
        let start = self.int("start")?;

        self.expect(TokenKind::Comma, "`,`")?;
        self.keyword(Keyword::Interval, "`interval`")?;
        self.expect(TokenKind::Assign, "`=`")?;
        let interval = self.int("interval")?;

        self.expect(TokenKind::CloseParen, "`)`")?;
        self.expect(TokenKind::Semicolon, "`;`")?;

        Ok(SpawnStmt {
            enemy,
            count,
            start,
            interval,
        })
    }

    fn place_stmt(&mut self) -> Parse<PlaceStmt> {
        let tower = self.name("tower type")?;
        self.keyword(Keyword::At, "`at`")?;
        let at = self.point()?;
        self.expect(TokenKind::Semicolon, "`;`")?;

        Ok(PlaceStmt { tower, at })
    }

    /// `'(' INT ',' INT ')'`
    fn point(&mut self) -> Parse<Located<Point>> {
        let open = self.expect(TokenKind::OpenParen, "`(`")?;
        let x = self.int("x coordinate")?;
        self.expect(TokenKind::Comma, "`,`")?;
        let y = self.int("y coordinate")?;
        let close = self.expect(TokenKind::CloseParen, "`)`")?;

        let location = Location::span(open.location().clone(), close.location());
        Ok(Located::at(Point { x, y }, location))
    }

    /// Nombre de campo seguido de `=`.
    ///
    /// Los nombres de campo son identificadores comunes; su significado
    /// lo determina su posición y no su ortografía.
    fn field(&mut self, what: &'static str) -> Parse<()> {
        self.expect(TokenKind::Id, what)?;
        self.expect(TokenKind::Assign, "`=`")?;
        Ok(())
    }

    fn name(&mut self, what: &'static str) -> Parse<Located<Identifier>> {
        let token = self.expect(TokenKind::Id, what)?;
        Ok(token.map(|token| Identifier::from(token.lexeme())))
    }

    fn int(&mut self, what: &'static str) -> Parse<i32> {
        let (location, token) = self.expect(TokenKind::Integer, what)?.split();
        token.lexeme().parse().map_err(|_| {
            Located::at(ParserError::IntOverflow(token.lexeme().to_owned()), location)
        })
    }

    fn float(&mut self, what: &'static str) -> Parse<f64> {
        let (location, token) = self.expect(TokenKind::Float, what)?.split();
        let lexeme = token.lexeme().to_owned();

        match lexeme.parse::<f64>() {
            Ok(float) if float.is_finite() => Ok(float),
            Ok(_) => Err(Located::at(ParserError::FloatOverflow(lexeme), location)),
            Err(_) => Err(Located::at(ParserError::BadFloat(lexeme), location)),
        }
    }

    fn keyword(&mut self, keyword: Keyword, what: &'static str) -> Parse<()> {
        self.expect(TokenKind::Keyword(keyword), what).map(drop)
    }

    /// Consume el token actual solo si es de la clase indicada.
    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.current.val().kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume el token actual, fallando si no es de la clase indicada.
    fn expect(&mut self, kind: TokenKind, what: &'static str) -> Parse<Located<Token>> {
        if self.current.val().kind() == kind {
            Ok(self.advance())
        } else {
            let (location, found) = self.current.clone().split();
            Err(Located::at(
                ParserError::UnexpectedToken {
                    expected: what,
                    found,
                },
                location,
            ))
        }
    }

    fn advance(&mut self) -> Located<Token> {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current, next)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse_str(text: &str) -> Parse<Ast> {
        let source = Source::new("<test>", text);
        parse(&source)
    }

    #[test]
    fn full_program() {
        let ast = parse_str(
            "// nivel de prueba
            map M { size = (5, 5); path = [(0,0), (4,4)]; }
            enemy E { hp = 10; speed = 1.5; reward = 5; }
            tower T { range = 3; damage = 4; fire_rate = 2.0; cost = 50; }
            wave W {
                spawn(E, count=3, start=0, interval=2);
                spawn(E, count=2, start=0, interval=2);
            }
            place T at (1, 1);",
        )
        .unwrap();

        assert_eq!(ast.0.len(), 5);
        match &ast.0[0] {
            Declaration::Map(map) => {
                assert_eq!(map.name.val().as_ref(), "M");
                assert_eq!((map.width, map.height), (5, 5));
                let path: Vec<_> = map.path.iter().map(|p| *p.val()).collect();
                assert_eq!(path, vec![Point { x: 0, y: 0 }, Point { x: 4, y: 4 }]);
            }
            other => panic!("expected map, found {:?}", other),
        }

        match &ast.0[1] {
            Declaration::Enemy(enemy) => {
                assert_eq!((enemy.hp, enemy.speed, enemy.reward), (10, 1.5, 5));
            }
            other => panic!("expected enemy, found {:?}", other),
        }

        match &ast.0[2] {
            Declaration::Tower(tower) => {
                assert_eq!(tower.name.val().as_ref(), "T");
                assert_eq!((tower.range, tower.damage, tower.cost), (3, 4, 50));
                assert_eq!(tower.fire_rate, 2.0);
            }
            other => panic!("expected tower, found {:?}", other),
        }

        match &ast.0[3] {
            Declaration::Wave(wave) => {
                assert_eq!(wave.spawns.len(), 2);
                assert_eq!(wave.spawns[0].enemy.val().as_ref(), "E");
                assert_eq!(wave.spawns[1].count, 2);
            }
            other => panic!("expected wave, found {:?}", other),
        }

        match &ast.0[4] {
            Declaration::Place(place) => {
                assert_eq!(place.tower.val().as_ref(), "T");
                assert_eq!(*place.at.val(), Point { x: 1, y: 1 });
            }
            other => panic!("expected placement, found {:?}", other),
        }
    }

    #[test]
    fn empty_program_and_empty_wave() {
        assert!(parse_str("").unwrap().0.is_empty());
        assert!(parse_str("  // nada\n").unwrap().0.is_empty());

        let ast = parse_str("wave W { }").unwrap();
        assert!(matches!(&ast.0[0], Declaration::Wave(wave) if wave.spawns.is_empty()));
    }

    #[test]
    fn path_commas_are_optional() {
        let ast = parse_str("map M { size = (3, 3); path = [(0,0) (1,1), (2,2),]; }").unwrap();
        match &ast.0[0] {
            Declaration::Map(map) => assert_eq!(map.path.len(), 3),
            other => panic!("expected map, found {:?}", other),
        }

        let ast = parse_str("map M { size = (3, 3); path = []; }").unwrap();
        assert!(matches!(&ast.0[0], Declaration::Map(map) if map.path.is_empty()));
    }

    #[test]
    fn field_names_are_positional() {
        let ast = parse_str("enemy E { a = 10; b = 1.0; c = 0; }").unwrap();
        assert!(matches!(&ast.0[0], Declaration::Enemy(enemy) if enemy.hp == 10));
    }

    #[test]
    fn first_error_aborts_with_line() {
        let error = parse_str("map M {\n  size = (5 5);\n}").unwrap_err();
        assert!(matches!(
            error.val(),
            ParserError::UnexpectedToken { expected: "`,`", .. }
        ));
        assert_eq!(error.location().start().line(), 2);
    }

    #[test]
    fn rejects_unknown_characters() {
        let error = parse_str("enemy E { hp = 10; speed = 1.0; reward = $; }").unwrap_err();
        match error.val() {
            ParserError::UnexpectedToken { expected, found } => {
                assert_eq!(*expected, "reward value");
                assert_eq!(found.kind(), TokenKind::Unknown);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn rejects_negative_literals_and_wrong_kinds() {
        assert!(parse_str("place T at (-1, 0);").is_err());
        assert!(parse_str("enemy E { hp = 10; speed = 1; reward = 0; }").is_err());
        assert!(parse_str("tower T { range = 1.0; damage = 1; fire_rate = 1.0; cost = 0; }").is_err());
    }

    #[test]
    fn rejects_stray_tokens() {
        let error = parse_str("map M { size = (1, 1); path = []; } 42").unwrap_err();
        assert!(matches!(error.val(), ParserError::ExpectedDeclaration(_)));

        let error = parse_str("wave W { spawn(E, count=1, start=0, interval=1) }").unwrap_err();
        assert!(matches!(
            error.val(),
            ParserError::UnexpectedToken { expected: "`;`", .. }
        ));
    }

    #[test]
    fn rejects_truncated_input() {
        let error = parse_str("tower T { range = 3;").unwrap_err();
        match error.val() {
            ParserError::UnexpectedToken { found, .. } => assert_eq!(found.kind(), TokenKind::Eof),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn integer_overflow() {
        let error = parse_str("place T at (99999999999, 0);").unwrap_err();
        assert!(matches!(error.val(), ParserError::IntOverflow(digits) if digits == "99999999999"));
    }

    #[test]
    fn float_overflow() {
        let huge = format!("{}.0", "9".repeat(400));
        let text = format!("enemy E {{ hp = 1;\n  speed = {}; reward = 0; }}", huge);

        let error = parse_str(&text).unwrap_err();
        assert!(matches!(error.val(), ParserError::FloatOverflow(lexeme) if *lexeme == huge));
        assert_eq!(error.location().start().line(), 2);
        assert_eq!(error.location().start().column(), 11);

        // Los flotantes grandes pero finitos se aceptan
        let text = format!("tower T {{ range = 1; damage = 1; fire_rate = 1{}.5; cost = 0; }}", "0".repeat(300));
        assert!(parse_str(&text).is_ok());
    }
}
