//! Spinner animation frames

/// Braille spinner characters
const SPINNER_CHARS: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

pub struct Spinner {
    state: usize,
}

impl Spinner {
    pub fn new(state: usize) -> Self {
        Self { state }
    }

    pub fn char(&self) -> char {
        SPINNER_CHARS[self.state % SPINNER_CHARS.len()]
    }
}
