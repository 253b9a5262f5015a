use serde::{Deserialize, Serialize};

/// Latest held keys for one player plus the jump intent buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    /// Ticks a pressed jump stays armed while waiting for ground contact.
    pub jump_buffer_ticks: u8,
}

impl InputState {
    /// Overwrite the held keys. A fresh jump press arms the buffer.
    pub fn apply(&mut self, left: bool, right: bool, jump: bool, buffer_ticks: u8) {
        if jump && !self.jump {
            self.jump_buffer_ticks = buffer_ticks;
        }
        self.left = left;
        self.right = right;
        self.jump = jump;
    }

    /// Spend the buffered jump if grounded, otherwise age it by one tick.
    pub fn consume_jump(&mut self, grounded: bool) -> bool {
        if self.jump_buffer_ticks == 0 {
            return false;
        }
        if grounded {
            self.jump_buffer_ticks = 0;
            true
        } else {
            self.jump_buffer_ticks -= 1;
            false
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
