//! Traza legible.
//!
//! Una línea por instrucción, con sus metadatos en un orden fijo por
//! opcode. Las apariciones se indentan bajo la oleada que las contiene.
//! Los metadatos derivados por plegado de constantes no se muestran.

use std::io::Write;

use super::{operand, Codegen};
use crate::ir::{key, Opcode, Program};

const BANNER: &str = "=== ParseTower Compiled Output ===";

pub(super) fn emit<W: Write>(program: &Program, output: &mut W) -> Codegen<()> {
    writeln!(output, "{}\n", BANNER)?;

    for instruction in program.iter() {
        let opcode = instruction.opcode;
        match opcode {
            Opcode::DefineMap => emit!(
                output, instruction, format!("{} {}", opcode, operand(instruction, 0)?);
                "WIDTH" => key::WIDTH,
                "HEIGHT" => key::HEIGHT,
                "PATH" => key::PATH,
            )?,

            Opcode::DefineEnemy => emit!(
                output, instruction, format!("{} {}", opcode, operand(instruction, 0)?);
                "HP" => key::HP,
                "SPEED" => key::SPEED,
                "REWARD" => key::REWARD,
            )?,

            Opcode::DefineTower => emit!(
                output, instruction, format!("{} {}", opcode, operand(instruction, 0)?);
                "RANGE" => key::RANGE,
                "DAMAGE" => key::DAMAGE,
                "FIRERATE" => key::FIRE_RATE,
                "COST" => key::COST,
            )?,

            Opcode::DefineWave => emit!(
                output, instruction, format!("{} {}", opcode, operand(instruction, 0)?);
            )?,

            Opcode::SpawnEnemy => {
                let head = format!(
                    "  {} {} IN_WAVE={}",
                    opcode,
                    operand(instruction, 1)?,
                    operand(instruction, 0)?
                );

                emit!(
                    output, instruction, head;
                    "COUNT" => key::COUNT,
                    "START" => key::START,
                    "INTERVAL" => key::INTERVAL,
                )?;
            }

            Opcode::PlaceTower => emit!(
                output, instruction, format!("{} {}", opcode, operand(instruction, 0)?);
                "X" => key::X,
                "Y" => key::Y,
            )?,

            Opcode::Nop => emit!(output, instruction, opcode;)?,
        }
    }

    Ok(())
}
