use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Text,
    Image,
}

impl ContextKind {
    fn label(self) -> &'static str {
        match self {
            Self::Text => "TXT",
            Self::Image => "IMAGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextItem {
    pub kind: ContextKind,
    pub path: PathBuf,
}

impl ContextItem {
    pub fn text(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ContextKind::Text,
            path: path.into(),
        }
    }

    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ContextKind::Image,
            path: path.into(),
        }
    }

    /// Short label for the context pane, e.g. `TXT: notes.txt`.
    pub fn display_label(&self) -> String {
        format!("{}: {}", self.kind.label(), display_file_name(&self.path))
    }
}

/// Attached files for the next prompt. Holds at most one image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStore {
    items: Vec<ContextItem>,
}

impl ContextStore {
    pub fn add_text(&mut self, path: impl Into<PathBuf>) {
        self.items.push(ContextItem::text(path));
    }

    pub fn add_image(&mut self, path: impl Into<PathBuf>) {
        self.items.retain(|item| item.kind != ContextKind::Image);
        self.items.push(ContextItem::image(path));
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[ContextItem] {
        &self.items
    }

    pub fn image(&self) -> Option<&ContextItem> {
        self.items
            .iter()
            .find(|item| item.kind == ContextKind::Image)
    }

    pub fn text_items(&self) -> impl Iterator<Item = &ContextItem> {
        self.items
            .iter()
            .filter(|item| item.kind == ContextKind::Text)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
