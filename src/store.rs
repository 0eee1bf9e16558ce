//! Backing string store (C1).
//!
//! A process-wide, append-only sequence of entries. Each entry is either
//! a concrete owned string, or a redirect to an earlier concrete entry.
//! `recode` relies on the redirect form to let an unmodified segment keep
//! referring to its original text even after a sibling segment in the
//! same input has been recoded to a freshly registered string.
//!
//! Grounded on `LTTL/Segmentation.py`'s module-level `data` list and its
//! `get_data`/`set_data` static methods, translated from a class-level
//! global into a thread-local cell: the original is explicitly
//! "process-wide" and single-threaded (§5), so a `thread_local!` cell
//! plays the same role without requiring unsafe global mutable statics.

use std::cell::RefCell;

use crate::error::{SegError, SegResult};

#[derive(Debug, Clone)]
enum Entry {
    Concrete(String),
    Redirect(usize),
}

#[derive(Debug, Default)]
pub struct StringStore {
    entries: Vec<Entry>,
}

impl StringStore {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a new concrete entry and returns its index.
    pub fn append_string(&mut self, s: impl Into<String>) -> usize {
        self.entries.push(Entry::Concrete(s.into()));
        self.entries.len() - 1
    }

    /// Resolves `i` to the concrete string it (possibly transitively,
    /// though redirects never chain more than one hop by construction)
    /// refers to.
    pub fn resolve(&self, i: usize) -> &str {
        match &self.entries[i] {
            Entry::Concrete(s) => s,
            Entry::Redirect(j) => match &self.entries[*j] {
                Entry::Concrete(s) => s,
                Entry::Redirect(_) => unreachable!("redirect-to-redirect is collapsed at set time"),
            },
        }
    }

    /// Installs a redirect at index `i`, pointing to the concrete entry
    /// at `j`. Only a slot already holding a redirect may be overwritten
    /// this way (the original text of a freshly-registered concrete
    /// string is never silently replaced). `j` itself may be a redirect;
    /// it is collapsed to the concrete entry it resolves to, so redirects
    /// never chain.
    pub fn set_redirect(&mut self, i: usize, j: usize) -> SegResult<()> {
        if i >= self.entries.len() || j >= self.entries.len() {
            return Err(SegError::Range(format!(
                "redirect index out of bounds: {i} -> {j} (len {})",
                self.entries.len()
            )));
        }
        if i == j {
            return Err(SegError::Range(format!("redirect cannot self-reference: {i}")));
        }
        if matches!(self.entries[i], Entry::Concrete(_)) {
            return Err(SegError::Range(format!(
                "index {i} already holds a concrete entry; only a redirect may be replaced"
            )));
        }
        let concrete_target = match &self.entries[j] {
            Entry::Concrete(_) => j,
            Entry::Redirect(k) => *k,
        };
        self.entries[i] = Entry::Redirect(concrete_target);
        Ok(())
    }

    /// Appends a fresh redirect entry pointing at `target` (which must
    /// already be concrete, or will be collapsed to whichever concrete
    /// entry it ultimately points to) and returns its index. Used by
    /// `recode` to give an unmodified segment its own str_index distinct
    /// from its sibling's, while still resolving to the same text.
    pub fn append_redirect(&mut self, target: usize) -> usize {
        let concrete_target = match &self.entries[target] {
            Entry::Concrete(_) => target,
            Entry::Redirect(k) => *k,
        };
        self.entries.push(Entry::Redirect(concrete_target));
        self.entries.len() - 1
    }

    /// The concrete index that `i` ultimately refers to (one hop at most).
    pub fn real_index(&self, i: usize) -> usize {
        match &self.entries[i] {
            Entry::Concrete(_) => i,
            Entry::Redirect(j) => *j,
        }
    }

    pub fn is_redirect(&self, i: usize) -> bool {
        matches!(self.entries[i], Entry::Redirect(_))
    }
}

thread_local! {
    static STORE: RefCell<StringStore> = RefCell::new(StringStore::new());
}

/// Runs `f` with mutable access to the process-wide store.
pub fn with_store_mut<R>(f: impl FnOnce(&mut StringStore) -> R) -> R {
    STORE.with(|cell| f(&mut cell.borrow_mut()))
}

/// Runs `f` with shared access to the process-wide store.
pub fn with_store<R>(f: impl FnOnce(&StringStore) -> R) -> R {
    STORE.with(|cell| f(&cell.borrow()))
}

pub fn append_string(s: impl Into<String>) -> usize {
    with_store_mut(|store| store.append_string(s))
}

pub fn resolve(i: usize) -> String {
    with_store(|store| store.resolve(i).to_string())
}

pub fn resolve_len(i: usize) -> usize {
    with_store(|store| store.resolve(i).chars().count())
}

pub fn real_index(i: usize) -> usize {
    with_store(|store| store.real_index(i))
}

pub fn append_redirect(target: usize) -> usize {
    with_store_mut(|store| store.append_redirect(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_collapses_one_hop() {
        let mut store = StringStore::new();
        let a = store.append_string("abc");
        let r = store.append_redirect(a);
        assert!(store.is_redirect(r));
        assert_eq!(store.real_index(r), a);
        assert_eq!(store.resolve(r), "abc");

        // redirect-to-redirect collapses
        let r2 = store.append_redirect(r);
        assert_eq!(store.real_index(r2), a);
    }

    #[test]
    fn set_redirect_rejects_self_reference() {
        let mut store = StringStore::new();
        let a = store.append_string("abc");
        let r = store.append_redirect(a);
        assert!(store.set_redirect(r, r).is_err());
    }

    #[test]
    fn set_redirect_rejects_overwriting_concrete() {
        let mut store = StringStore::new();
        let a = store.append_string("abc");
        let b = store.append_string("def");
        assert!(store.set_redirect(a, b).is_err());
    }
}
