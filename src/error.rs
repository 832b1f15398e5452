//! Errores de compilación y su presentación.
//!
//! Toda fase aborta ante el primer error. El error resultante se
//! propaga hasta el punto de entrada como un [`CompileError`], y
//! [`Diagnostics`] se encarga de mostrarlo junto a la línea de código
//! fuente que lo originó.

use std::fmt::{self, Display};

use thiserror::Error;

use crate::{
    codegen::CodegenError,
    parse::ParserError,
    semantic::SemanticError,
    source::{Located, Location},
};

/// Error de cualquier fase del compilador.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{0}")]
    Syntax(Located<ParserError>),

    #[error("{0}")]
    Semantic(Located<SemanticError>),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

impl CompileError {
    /// Nombre corto de la fase que falló.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Syntax(_) => "syntax error",
            CompileError::Semantic(_) => "semantic error",
            CompileError::Codegen(_) => "error",
        }
    }

    /// Ubicación en el código fuente, si la hay.
    pub fn location(&self) -> Option<&Location> {
        match self {
            CompileError::Syntax(error) => Some(error.location()),
            CompileError::Semantic(error) => Some(error.location()),
            CompileError::Codegen(_) => None,
        }
    }
}

impl From<Located<ParserError>> for CompileError {
    fn from(error: Located<ParserError>) -> Self {
        CompileError::Syntax(error)
    }
}

impl From<Located<SemanticError>> for CompileError {
    fn from(error: Located<SemanticError>) -> Self {
        CompileError::Semantic(error)
    }
}

/// Presentación legible de un error.
pub struct Diagnostics<'a>(pub &'a CompileError);

impl Display for Diagnostics<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics(error) = self;
        writeln!(fmt, "{}: {}", error.kind(), error)?;

        let location = match error.location() {
            Some(location) => location,
            None => return Ok(()),
        };

        writeln!(fmt, " --> {}", location)?;

        let (start, end) = (location.start(), location.end());
        let line_number = start.line();
        let line = match location.source().line(line_number) {
            Some(line) => line,
            None => return Ok(()),
        };

        let digits = line_number.to_string().chars().count();
        writeln!(fmt, "{:digits$} |", "", digits = digits)?;
        writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)?;

        // Un rango de varias líneas se subraya hasta el final de la primera
        let from = start.column();
        let to = if end.line() == line_number {
            end.column().saturating_sub(1)
        } else {
            line.chars().count() as u32
        };

        let skip = from.saturating_sub(1) as usize;
        let highlight = (to.max(from) - from + 1) as usize;

        writeln!(
            fmt,
            "{:digits$} | {:skip$}{:^<highlight$}",
            "",
            "",
            "",
            digits = digits,
            skip = skip,
            highlight = highlight
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{codegen::CodegenError, ir::Opcode, parse, source::Source};

    fn diagnose(name: &str, text: &str) -> String {
        let source = Source::new(name, text);
        let error: CompileError = match parse::parse(&source) {
            Ok(ast) => ast.analyze().map(|_| ()).map_err(CompileError::from),
            Err(error) => Err(error.into()),
        }
        .unwrap_err();

        Diagnostics(&error).to_string()
    }

    #[test]
    fn syntax_error_points_at_token() {
        let rendered = diagnose("level.td", "enemy E {\n  hp = 10 speed = 1.0;\n}");
        let expected = "\
syntax error: Expected `;`, found identifier `speed` instead
 --> level.td:[2:11-2:15]
  |
2 |   hp = 10 speed = 1.0;
  |           ^^^^^
";

        assert_eq!(rendered, expected);
    }

    #[test]
    fn semantic_error_names_kind() {
        let rendered = diagnose(
            "level.td",
            "enemy E { hp = 1; speed = 1.0; reward = 0; }\nenemy E { hp = 1; speed = 1.0; reward = 0; }",
        );

        assert!(rendered.starts_with("semantic error: Duplicate enemy name `E`\n --> level.td:"));
        assert!(rendered.contains("\n2 | enemy E {"));
    }

    #[test]
    fn codegen_errors_have_no_location() {
        let error = CompileError::from(CodegenError::MissingOperand(Opcode::Nop));
        assert!(error.location().is_none());
        assert_eq!(
            Diagnostics(&error).to_string(),
            "error: Instruction NOP is missing an operand\n"
        );
    }
}
