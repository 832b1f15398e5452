//! Compilador para el lenguaje de niveles de ParseTower.
//!
//! # Front end
//! Cada programa deriva de un único texto fuente, descrito por
//! [`source::Source`]. Este texto se somete primero a análisis léxico
//! en [`lex`], de lo cual se obtiene un flujo de tokens. El flujo de
//! tokens se dispone en un AST por medio de análisis sintáctico
//! descendente recursivo en [`parse`]. El árbol sintáctico es validado
//! por análisis semántico en [`semantic`], el cual construye tablas de
//! símbolos por categoría y rechaza nombres duplicados, valores fuera
//! de rango, referencias a nombres no definidos y coordenadas fuera del
//! mapa.
//!
//! # Back end
//! El árbol validado se traduce a una secuencia plana de instrucciones
//! descrita en [`ir`]. Sobre esta secuencia operan las pasadas de
//! [`opt`], y finalmente [`codegen`] produce ya sea un documento JSON
//! para el motor de juego o una traza legible.
//!
//! Cada fase aborta ante el primer error, el cual se reporta como un
//! [`error::CompileError`].

#[macro_use]
mod macros;

pub mod codegen;
pub mod error;
pub mod ir;
pub mod lex;
pub mod opt;
pub mod parse;
pub mod semantic;
pub mod source;

use std::rc::Rc;

use tracing::debug;

use crate::{codegen::Format, error::CompileError, opt::Passes, source::Source};

/// Opciones de compilación.
#[derive(Copy, Clone, Debug, Default)]
pub struct Options {
    /// Formato de salida.
    pub format: Format,

    /// Pasadas de optimización habilitadas.
    pub passes: Passes,
}

/// Ejecuta todas las fases sobre un texto fuente.
pub fn compile(source: &Rc<Source>, options: &Options) -> Result<String, CompileError> {
    let ast = parse::parse(source)?;
    debug!(source = source.name(), declarations = ast.0.len(), "parsed");

    ast.analyze()?;
    debug!(source = source.name(), "analysis passed");

    let program = ast.lower();
    debug!(instructions = program.len(), "lowered to IR");

    let program = opt::optimize(&program, options.passes);
    let output = codegen::render(&program, options.format)?;
    debug!(format = %options.format, bytes = output.len(), "generated output");

    Ok(output)
}
