// zensh-core/src/progress/term.rs
//! Relative cursor bookkeeping for a block of rows printed below the prompt.

use std::io::{self, Write};

use crossterm::cursor::{MoveDown, MoveToColumn, MoveUp};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;

/// Tracks the cursor row relative to the first rendered row. `max_y` is the
/// first row that has never been written, so moving past it prints newlines
/// instead of cursor-down sequences, which stop at the screen bottom.
pub struct TermManager<W: Write> {
    out: W,
    y: usize,
    max_y: usize,
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

impl<W: Write> TermManager<W> {
    pub fn new(out: W) -> Self {
        Self { out, y: 0, max_y: 0 }
    }

    pub fn move_y(&mut self, y: usize) -> io::Result<()> {
        if y < self.y {
            queue!(self.out, MoveUp(to_u16(self.y - y)))?;
        } else if y > self.y {
            if y > self.max_y {
                let to_bottom = self.max_y.saturating_sub(self.y);
                if to_bottom > 0 {
                    queue!(self.out, MoveDown(to_u16(to_bottom)))?;
                }
                for _ in self.y.max(self.max_y)..y {
                    queue!(self.out, Print("\n"))?;
                }
                self.max_y = y;
            } else {
                queue!(self.out, MoveDown(to_u16(y - self.y)))?;
            }
        }
        self.y = y;
        Ok(())
    }

    pub fn move_to(&mut self, x: usize, y: usize) -> io::Result<()> {
        self.move_y(y)?;
        queue!(self.out, MoveToColumn(to_u16(x)))
    }

    pub fn write(&mut self, s: &str) -> io::Result<()> {
        queue!(self.out, Print(s))
    }

    pub fn writeln(&mut self, s: &str) -> io::Result<()> {
        queue!(self.out, Print(s), Print("\n"))?;
        self.y += 1;
        self.max_y = self.max_y.max(self.y);
        Ok(())
    }

    pub fn erase_right(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::UntilNewLine))
    }

    /// Parks the cursor on the line after the last row.
    pub fn to_end(&mut self) -> io::Result<()> {
        self.move_to(0, self.max_y)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn row(&self) -> usize {
        self.y
    }

    pub fn rows_used(&self) -> usize {
        self.max_y
    }
}
