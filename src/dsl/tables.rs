//! Interning tables for identifiers and string literals.
//!
//! Ids are handed out in first-seen order starting at 0 and stay stable for the
//! lifetime of one compilation. Tables live inside a [`CompilationContext`], so
//! two compilations never share ids.

use std::collections::HashMap;

/// Bidirectional text ↔ id map.
///
/// Entries are raw bytes: string literals keep whatever encoding the source
/// used and are written out unchanged.
#[derive(Debug, Clone, Default)]
pub struct InternTable {
    entries: Vec<Vec<u8>>,
    index: HashMap<Vec<u8>, i32>,
}

impl InternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning the existing id if it was seen before.
    pub fn insert(&mut self, text: impl AsRef<[u8]>) -> i32 {
        let text = text.as_ref();
        if let Some(&id) = self.index.get(text) {
            return id;
        }
        let id = i32::try_from(self.entries.len()).unwrap_or(i32::MAX);
        self.entries.push(text.to_vec());
        self.index.insert(text.to_vec(), id);
        id
    }

    pub fn get(&self, id: i32) -> Option<&[u8]> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.entries.get(i))
            .map(Vec::as_slice)
    }

    /// The entry as text, if it is valid UTF-8.
    pub fn get_str(&self, id: i32) -> Option<&str> {
        self.get(id).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn find(&self, text: impl AsRef<[u8]>) -> Option<i32> {
        self.index.get(text.as_ref()).copied()
    }

    /// Swap the text behind `id`, keeping the id. Unknown ids are ignored.
    pub fn replace(&mut self, id: i32, text: impl AsRef<[u8]>) {
        let text = text.as_ref();
        let Some(slot) = usize::try_from(id).ok().and_then(|i| self.entries.get_mut(i)) else {
            return;
        };
        let old = std::mem::replace(slot, text.to_vec());
        if self.index.get(&old) == Some(&id) {
            self.index.remove(&old);
        }
        self.index.insert(text.to_vec(), id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &[u8])> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, s)| (i32::try_from(i).unwrap_or(i32::MAX), s.as_slice()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

/// Identifier names: dialogues, variables, speakers, states, events.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable(InternTable);

/// String literal texts. Supports in-place replacement for i18n keys.
#[derive(Debug, Clone, Default)]
pub struct ConstantTable(InternTable);

impl std::ops::Deref for SymbolTable {
    type Target = InternTable;
    fn deref(&self) -> &InternTable {
        &self.0
    }
}

impl std::ops::DerefMut for SymbolTable {
    fn deref_mut(&mut self) -> &mut InternTable {
        &mut self.0
    }
}

impl std::ops::Deref for ConstantTable {
    type Target = InternTable;
    fn deref(&self) -> &InternTable {
        &self.0
    }
}

impl std::ops::DerefMut for ConstantTable {
    fn deref_mut(&mut self) -> &mut InternTable {
        &mut self.0
    }
}

/// Per-compilation state shared by the lexer, parser and emitter.
#[derive(Debug, Clone, Default)]
pub struct CompilationContext {
    pub symbols: SymbolTable,
    pub constants: ConstantTable,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.constants.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_first_seen_order() {
        let mut table = InternTable::new();
        assert_eq!(table.insert("test1"), 0);
        assert_eq!(table.insert("test2"), 1);
        assert_eq!(table.insert("test1"), 0);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get_str(1), Some("test2"));
        assert_eq!(table.get(2), None);
        assert_eq!(table.get(-1), None);
    }

    #[test]
    fn replace_keeps_id() {
        let mut table = ConstantTable::default();
        let id = table.insert("Hello!");
        table.insert("Bye");
        table.replace(id, "p0");
        assert_eq!(table.get_str(id), Some("p0"));
        assert_eq!(table.find("p0"), Some(id));
        assert_eq!(table.find("Hello!"), None);
        assert_eq!(table.len(), 2);
        // A later literal with the old text gets a fresh id.
        assert_eq!(table.insert("Hello!"), 2);
    }

    #[test]
    fn replace_unknown_id_is_ignored() {
        let mut table = InternTable::new();
        table.insert("a");
        table.replace(7, "b");
        assert_eq!(table.len(), 1);
        assert_eq!(table.find("b"), None);
    }

    #[test]
    fn context_clear_resets_both_tables() {
        let mut ctx = CompilationContext::new();
        ctx.symbols.insert("x");
        ctx.constants.insert("y");
        ctx.clear();
        assert!(ctx.symbols.is_empty());
        assert!(ctx.constants.is_empty());
        assert_eq!(ctx.symbols.insert("z"), 0);
    }

    #[test]
    fn iter_is_in_id_order() {
        let mut table = SymbolTable::default();
        table.insert("b");
        table.insert("a");
        let all: Vec<_> = table.iter().collect();
        assert_eq!(all, vec![(0, &b"b"[..]), (1, &b"a"[..])]);
    }

    #[test]
    fn non_utf8_entries_are_kept_verbatim() {
        let mut table = ConstantTable::default();
        let id = table.insert([0xE9u8]);
        assert_eq!(table.get(id), Some(&[0xE9u8][..]));
        assert_eq!(table.get_str(id), None);
        assert_eq!(table.find([0xE9u8]), Some(id));
    }
}
