//! Generación de salida.
//!
//! La secuencia final de instrucciones se traduce a uno de dos formatos:
//! un documento JSON estructurado que consumen los motores de juego, o
//! una traza legible de una instrucción por línea. Ambas salidas son
//! funciones deterministas del IR.

use std::{
    fmt::{self, Display},
    io::{self, Write},
    str::FromStr,
    string::FromUtf8Error,
};

use thiserror::Error;

use crate::ir::{Instruction, Opcode, Program};

mod json;
mod trace;

/// Formato de salida.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    /// Documento `{"gameConfig": ...}`.
    Json,

    /// Traza legible.
    Trace,
}

impl Default for Format {
    fn default() -> Self {
        Format::Json
    }
}

impl FromStr for Format {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string {
            "json" => Ok(Format::Json),
            "trace" => Ok(Format::Trace),
            _ => Err(()),
        }
    }
}

impl Display for Format {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => fmt.write_str("json"),
            Format::Trace => fmt.write_str("trace"),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("Instruction {0} is missing an operand")]
    MissingOperand(Opcode),

    #[error("Instruction {opcode} requires {expected} metadata `{key}`")]
    Metadata {
        opcode: Opcode,
        key: &'static str,
        expected: &'static str,
    },

    #[error("Failed to serialize document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Output is not valid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Codegen<T> = Result<T, CodegenError>;

/// Escribe el programa en el formato indicado.
pub fn write<W: Write>(program: &Program, format: Format, output: &mut W) -> Codegen<()> {
    match format {
        Format::Json => json::emit(program, output),
        Format::Trace => trace::emit(program, output),
    }
}

/// Igual que [`write()`], pero produce una cadena.
pub fn render(program: &Program, format: Format) -> Codegen<String> {
    let mut buffer = Vec::new();
    write(program, format, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

fn operand(instruction: &Instruction, index: usize) -> Codegen<&str> {
    instruction
        .operands
        .get(index)
        .map(String::as_str)
        .ok_or(CodegenError::MissingOperand(instruction.opcode))
}

fn int(instruction: &Instruction, key: &'static str) -> Codegen<i64> {
    instruction.metadata.int(key).ok_or(CodegenError::Metadata {
        opcode: instruction.opcode,
        key,
        expected: "integer",
    })
}

fn float(instruction: &Instruction, key: &'static str) -> Codegen<f64> {
    instruction.metadata.float(key).ok_or(CodegenError::Metadata {
        opcode: instruction.opcode,
        key,
        expected: "float",
    })
}
