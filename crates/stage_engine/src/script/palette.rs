use thiserror::Error;

use super::command::{Command, FieldError, DEFAULT_SAY_TEXT, DEFAULT_THINK_TEXT};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    #[error("palette has no block in slot {0}")]
    UnknownSlot(u32),
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Template block the editor copies into scripts.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteBlock {
    pub slot: u32,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    blocks: Vec<PaletteBlock>,
}

impl Default for Palette {
    fn default() -> Self {
        let commands = [
            Command::move_steps(10.0),
            Command::turn_degrees(15.0),
            Command::goto(0.0, 0.0),
            Command::repeat(2, Vec::new()),
            Command::wait(1.0),
            Command::say(DEFAULT_SAY_TEXT),
            Command::think(DEFAULT_THINK_TEXT),
            Command::Show,
            Command::Hide,
        ];
        let blocks = commands
            .into_iter()
            .enumerate()
            .map(|(index, command)| PaletteBlock {
                slot: index as u32 + 1,
                command,
            })
            .collect();
        Self { blocks }
    }
}

impl Palette {
    pub fn blocks(&self) -> &[PaletteBlock] {
        &self.blocks
    }

    pub fn block(&self, slot: u32) -> Result<&PaletteBlock, PaletteError> {
        self.blocks
            .iter()
            .find(|block| block.slot == slot)
            .ok_or(PaletteError::UnknownSlot(slot))
    }

    /// Copy of the template, ready to append to a script.
    pub fn instantiate(&self, slot: u32) -> Result<Command, PaletteError> {
        self.block(slot).map(|block| block.command.clone())
    }

    pub fn set_field(&mut self, slot: u32, field: &str, raw: &str) -> Result<(), PaletteError> {
        let block = self
            .blocks
            .iter_mut()
            .find(|block| block.slot == slot)
            .ok_or(PaletteError::UnknownSlot(slot))?;
        block.command.set_field(field, raw)?;
        Ok(())
    }
}
