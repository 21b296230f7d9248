/// Word-wraps `text` into display lines no wider than `width` characters.
/// Words longer than a line are split; explicit newlines are kept.
pub fn wrap_lines(text: &str, width: u16) -> Vec<String> {
    let width = usize::from(width.max(1));
    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0usize;
        for word in raw_line.split(' ') {
            let word_len = word.chars().count();
            let needed = if current_len == 0 {
                word_len
            } else {
                current_len + 1 + word_len
            };
            if needed <= width {
                if current_len > 0 {
                    current.push(' ');
                }
                current.push_str(word);
                current_len = needed;
                continue;
            }
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let mut chars = word.chars().peekable();
            while chars.peek().is_some() {
                let chunk: String = chars.by_ref().take(width).collect();
                let chunk_len = chunk.chars().count();
                if chunk_len == width && chars.peek().is_some() {
                    lines.push(chunk);
                } else {
                    current = chunk;
                    current_len = chunk_len;
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// Display position `(line, col)` of every char boundary of `text` when hard
/// wrapped at `width`. The result has `chars + 1` entries.
pub fn char_positions(text: &str, width: u16) -> Vec<(u16, u16)> {
    let width = width.max(1);
    let mut positions = Vec::with_capacity(text.chars().count() + 1);
    let (mut line, mut col) = (0u16, 0u16);
    positions.push((line, col));
    for ch in text.chars() {
        if ch == '\n' {
            line = line.saturating_add(1);
            col = 0;
        } else {
            col = col.saturating_add(1);
            if col >= width {
                line = line.saturating_add(1);
                col = 0;
            }
        }
        positions.push((line, col));
    }
    positions
}

/// Hard-wraps `text` at `width` to match `char_positions`.
pub fn hard_wrap(text: &str, width: u16) -> Vec<String> {
    let width = width.max(1);
    let mut lines = vec![String::new()];
    let mut col = 0u16;
    for ch in text.chars() {
        if ch == '\n' {
            lines.push(String::new());
            col = 0;
            continue;
        }
        if let Some(last) = lines.last_mut() {
            last.push(ch);
        }
        col = col.saturating_add(1);
        if col >= width {
            lines.push(String::new());
            col = 0;
        }
    }
    lines
}
