// zensh-core/src/progress/spinner.rs

const FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Braille spinner cycling through ten phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spinner {
    phase: usize,
}

impl Spinner {
    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn glyph(&self) -> char {
        FRAMES[self.phase]
    }

    pub fn advance(&mut self) {
        self.phase = (self.phase + 1) % FRAMES.len();
    }
}
