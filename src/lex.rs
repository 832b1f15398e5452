//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto de un
//! [`Source`] en unidades léxicas denominadas tokens. Los espacios en
//! blanco y los comentarios de línea (`//`) se descartan durante esta
//! operación. Cada token emitido está asociado a una ubicación en el
//! código fuente original, lo cual permite rastrear errores tanto en los
//! mismos como en constructos más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Todo token conserva su lexema original. Las constantes numéricas no se
//! resuelven aquí, ya que su rango solo es relevante para el parser.
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores son de la forma `(alpha|_)(alnum|_)*`.
//! - El lenguaje es case-sensitive: `map` es palabra clave, `Map` no.
//! - Un flotante es `dígitos.dígitos`; no hay signo, exponente ni punto
//!   inicial, por lo cual no existen literales negativos.
//!
//! # Errores
//! El lexer nunca falla. Un carácter desconocido produce un token
//! [`TokenKind::Unknown`], el cual será rechazado por el parser como
//! token inesperado.

use crate::source::{Located, Location, Position, Source};
use std::{
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
    str::{Chars, FromStr},
};

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Rc<str>);

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Clase de un token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Palabra clave.
    Keyword(Keyword),

    /// Identificador.
    Id,

    /// Literal de entero.
    Integer,

    /// Literal de punto flotante.
    Float,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenSquare,

    /// `]`
    CloseSquare,

    /// `,`
    Comma,

    /// `;`
    Semicolon,

    /// `=`
    Assign,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// Fin de la entrada.
    Eof,

    /// Carácter no reconocido.
    Unknown,
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    lexeme: String,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Texto original del token. Vacío para [`TokenKind::Eof`].
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        match self.kind {
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            Id => write!(fmt, "identifier `{}`", self.lexeme),
            Integer | Float => write!(fmt, "literal `{}`", self.lexeme),
            Eof => fmt.write_str("end of input"),
            Unknown => write!(fmt, "unknown character `{}`", self.lexeme),
            _ => write!(fmt, "`{}`", self.lexeme),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Map,
    Enemy,
    Tower,
    Wave,
    Spawn,
    Place,
    At,
    Size,
    Path,
    Count,
    Start,
    Interval,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("map",      Keyword::Map),
    ("enemy",    Keyword::Enemy),
    ("tower",    Keyword::Tower),
    ("wave",     Keyword::Wave),
    ("spawn",    Keyword::Spawn),
    ("place",    Keyword::Place),
    ("at",       Keyword::At),
    ("size",     Keyword::Size),
    ("path",     Keyword::Path),
    ("count",    Keyword::Count),
    ("start",    Keyword::Start),
    ("interval", Keyword::Interval),
];

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = KEYWORDS
            .iter()
            .find(|&&(_, keyword)| keyword == *self)
            .map_or("?", |&(name, _)| name);

        fmt.write_str(name)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Produce tokens bajo demanda por medio de [`Lexer::next_token()`].
/// El lexer es barato de clonar, lo cual permite lookahead sin consumo
/// en [`Lexer::peek_token()`]: se lexea desde una copia de la posición
/// actual y la copia se descarta.
#[derive(Clone)]
pub struct Lexer<'a> {
    source: &'a Rc<Source>,
    chars: Peekable<Chars<'a>>,
    next: Position,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de completitud; siempre emite el token incluido
    /// sin consumir más entrada.
    Complete(TokenKind, String),

    /// Se encontró `/`.
    ///
    /// Si sigue otro `/` se entra en un comentario, de lo contrario
    /// se trata de [`TokenKind::Slash`].
    Divide,

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Constante numérica, entera o flotante.
    Number(String),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<'a> Lexer<'a> {
    /// Crea un lexer al inicio de un origen.
    pub fn new(source: &'a Rc<Source>) -> Self {
        Lexer {
            source,
            chars: source.text().chars().peekable(),
            next: Position::default(),
        }
    }

    /// Observa el siguiente token sin consumirlo.
    pub fn peek_token(&self) -> Located<Token> {
        self.clone().next_token()
    }

    /// Consume todos los tokens restantes, incluyendo el [`TokenKind::Eof`] final.
    pub fn tokens(mut self) -> Vec<Located<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.val().kind == TokenKind::Eof;

            tokens.push(token);
            if done {
                break tokens;
            }
        }
    }

    /// Construye el siguiente token.
    ///
    /// Una vez alcanzado el final de la entrada, toda llamada
    /// subsecuente retorna [`TokenKind::Eof`].
    pub fn next_token(&mut self) -> Located<Token> {
        use {State::*, TokenKind::*};

        let mut state = Start;
        let mut start = self.next;

        let (kind, lexeme) = loop {
            let next_char = self.chars.peek().copied();

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = state {
                start = self.next;
            }

            match (&mut state, next_char) {
                (Start, None) => break (Eof, String::new()),

                // Tokens triviales
                (Start, Some(c)) if punctuation(c).is_some() => {
                    let kind = punctuation(c).unwrap_or(Unknown);
                    state = Complete(kind, c.to_string());
                }

                (Start, Some('/')) => state = Divide,

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    state = Word(c.to_string())
                }

                (Start, Some(c)) if c.is_ascii_digit() => state = Number(c.to_string()),

                // Espacios en blanco y caracteres inesperados
                (Start, Some(' ' | '\t' | '\r' | '\n')) => (),
                (Start, Some(c)) => state = Complete(Unknown, c.to_string()),

                // Emisión retardada de tokens cualesquiera
                (Complete(kind, lexeme), _) => break (*kind, std::mem::take(lexeme)),

                (Divide, Some('/')) => state = Comment,
                (Divide, _) => break (Slash, String::from("/")),

                // Los comentarios descartan el resto de la línea
                (Comment, Some('\n')) | (Comment, None) => state = Start,
                (Comment, Some(_)) => (),

                (Number(digits), Some(c)) if c.is_ascii_digit() => digits.push(c),

                // Un punto solo forma parte del literal si le sigue un dígito
                (Number(digits), Some('.')) if !digits.contains('.') && self.digit_after_dot() => {
                    digits.push('.')
                }

                (Number(digits), _) => {
                    let kind = if digits.contains('.') { Float } else { Integer };
                    break (kind, std::mem::take(digits));
                }

                (Word(word), Some(c)) if c.is_ascii_alphanumeric() || c == '_' => word.push(c),

                (Word(word), _) => {
                    let kind = match self::Keyword::from_str(word.as_str()) {
                        Ok(keyword) => TokenKind::Keyword(keyword),
                        Err(()) => Id,
                    };

                    break (kind, std::mem::take(word));
                }
            }

            // Aquí se consume el carácter que se observó con lookahead
            if let Some(c) = self.chars.next() {
                self.next = self.next.after(c);
            }
        };

        let end = if kind == Eof { start.advance() } else { self.next };
        let location = Location::new(Rc::clone(self.source), start..end);

        Located::at(Token { kind, lexeme }, location)
    }

    /// Determina si al `.` siguiente le sigue un dígito.
    fn digit_after_dot(&self) -> bool {
        let mut ahead = self.chars.clone();
        ahead.next();

        matches!(ahead.next(), Some(c) if c.is_ascii_digit())
    }
}

/// Puntuación de un solo carácter, con excepción de `/`.
fn punctuation(c: char) -> Option<TokenKind> {
    use TokenKind::*;

    let kind = match c {
        '{' => OpenCurly,
        '}' => CloseCurly,
        '(' => OpenParen,
        ')' => CloseParen,
        '[' => OpenSquare,
        ']' => CloseSquare,
        ',' => Comma,
        ';' => Semicolon,
        '=' => Assign,
        '+' => Plus,
        '-' => Minus,
        '*' => Times,
        _ => return None,
    };

    Some(kind)
}
