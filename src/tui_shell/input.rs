/// Single-line text input used by dialogs.
#[derive(Debug, Default)]
pub(super) struct Input {
    pub(super) buf: String,
    pub(super) cursor: usize,
}

impl Input {
    pub(super) fn with(s: &str) -> Self {
        let mut input = Self::default();
        input.set(s.to_string());
        input
    }

    pub(super) fn insert_char(&mut self, c: char) {
        self.buf.insert(self.byte_at(self.cursor), c);
        self.cursor += 1;
    }

    pub(super) fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        self.buf.remove(self.byte_at(self.cursor));
    }

    pub(super) fn delete(&mut self) {
        if self.cursor >= self.len() {
            return;
        }
        self.buf.remove(self.byte_at(self.cursor));
    }

    pub(super) fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub(super) fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.len());
    }

    pub(super) fn set(&mut self, s: String) {
        self.buf = s;
        self.cursor = self.len();
    }

    pub(super) fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.buf)
    }

    fn len(&self) -> usize {
        self.buf.chars().count()
    }

    // `cursor` counts chars; String edits need byte offsets.
    fn byte_at(&self, chars: usize) -> usize {
        self.buf
            .char_indices()
            .nth(chars)
            .map(|(i, _)| i)
            .unwrap_or(self.buf.len())
    }
}
