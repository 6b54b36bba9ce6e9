use std::sync::Mutex;

use crate::error::StoreError;
use crate::path::{tokenize, ABS_PATH_MAX};

/// A single store entry (§3 "Node"). Children are kept in insertion order
/// and addressed by linear scan, matching the source's doubly-linked list
/// of entries — trees here are shallow and narrow enough that this never
/// needs to be a map.
struct Node {
    name: Vec<u8>,
    value: Option<Vec<u8>>,
    children: Vec<Node>,
}

impl Node {
    fn new(name: Vec<u8>) -> Self {
        Self { name, value: None, children: Vec::new() }
    }

    fn child_mut(&mut self, name: &[u8]) -> Option<&mut Node> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    fn child(&self, name: &[u8]) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child_index(&self, name: &[u8]) -> Option<usize> {
        self.children.iter().position(|c| c.name == name)
    }

    fn get_or_insert_child(&mut self, name: &[u8]) -> &mut Node {
        if self.child_index(name).is_none() {
            self.children.push(Node::new(name.to_vec()));
        }
        // Re-find by index: avoids holding the Option<&mut> across the push,
        // which the borrow checker won't allow on the same expression.
        let idx = self.child_index(name).unwrap();
        &mut self.children[idx]
    }
}

/// The hierarchical key/value tree (§4.C). Every public operation takes the
/// single writer lock for its whole duration; this crate does not know
/// about watches, so callers that need mutation notifications (everyone but
/// tests) go through `DirectoryService` instead of this type directly.
pub struct Store {
    root: Mutex<Node>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self { root: Mutex::new(Node::new(Vec::new())) }
    }

    /// Creates every missing ancestor along `path`, then sets the leaf's
    /// value. Idempotent when the leaf already holds `value`.
    ///
    /// # Errors
    ///
    /// [`StoreError::OutOfMemory`] if `path` exceeds [`ABS_PATH_MAX`]. The
    /// check happens before any node is created, so — unlike the C source,
    /// which can fail mid-walk on a real allocator — there is never a
    /// partial ancestor chain to roll back in this implementation; see
    /// DESIGN.md.
    pub fn write(&self, path: &[u8], value: &[u8]) -> Result<(), StoreError> {
        if path.len() + 1 > ABS_PATH_MAX {
            return Err(StoreError::OutOfMemory);
        }
        let tokens = tokenize(path);
        let mut root = self.root.lock().unwrap();
        let mut node = &mut *root;
        for tok in &tokens {
            node = node.get_or_insert_child(tok);
        }
        node.value = Some(value.to_vec());
        Ok(())
    }

    /// Equivalent to [`Self::write`] with an empty value, except it never
    /// clears a value that's already there.
    pub fn mkdir(&self, path: &[u8]) -> Result<(), StoreError> {
        if path.len() + 1 > ABS_PATH_MAX {
            return Err(StoreError::OutOfMemory);
        }
        let tokens = tokenize(path);
        let mut root = self.root.lock().unwrap();
        let mut node = &mut *root;
        for tok in &tokens {
            node = node.get_or_insert_child(tok);
        }
        Ok(())
    }

    /// Exact lookup. A node with no value reads as the empty string.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if any path segment is missing.
    pub fn read(&self, path: &[u8]) -> Result<Vec<u8>, StoreError> {
        let tokens = tokenize(path);
        let root = self.root.lock().unwrap();
        let node = Self::find(&root, &tokens).ok_or(StoreError::NotFound)?;
        Ok(node.value.clone().unwrap_or_default())
    }

    /// Insertion-ordered child names.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the node itself is absent.
    pub fn directory(&self, path: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        let tokens = tokenize(path);
        let root = self.root.lock().unwrap();
        let node = Self::find(&root, &tokens).ok_or(StoreError::NotFound)?;
        Ok(node.children.iter().map(|c| c.name.clone()).collect())
    }

    /// Destroys a node and its whole subtree.
    ///
    /// # Errors
    ///
    /// [`StoreError::Invalid`] if the node is absent or the path is the
    /// root (removing the root is never valid).
    pub fn rm(&self, path: &[u8]) -> Result<(), StoreError> {
        let tokens = tokenize(path);
        let Some((last, ancestors)) = tokens.split_last() else {
            return Err(StoreError::Invalid);
        };
        let mut root = self.root.lock().unwrap();
        let parent = Self::find_mut(&mut root, ancestors).ok_or(StoreError::Invalid)?;
        let idx = parent.child_index(last).ok_or(StoreError::Invalid)?;
        parent.children.remove(idx);
        Ok(())
    }

    /// `true` if `path` currently resolves to a node (used by the watch
    /// registry's "fire once for existing state" rule, §4.D `add`).
    #[must_use]
    pub fn exists(&self, path: &[u8]) -> bool {
        let tokens = tokenize(path);
        let root = self.root.lock().unwrap();
        Self::find(&root, &tokens).is_some()
    }

    fn find<'a>(mut node: &'a Node, tokens: &[&[u8]]) -> Option<&'a Node> {
        for tok in tokens {
            node = node.child(tok)?;
        }
        Some(node)
    }

    fn find_mut<'a>(mut node: &'a mut Node, tokens: &[&[u8]]) -> Option<&'a mut Node> {
        for tok in tokens {
            node = node.child_mut(tok)?;
        }
        Some(node)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let store = Store::new();
        store.write(b"/a/b", b"v").unwrap();
        assert_eq!(store.read(b"/a/b").unwrap(), b"v");
    }

    #[test]
    fn write_empty_value_reads_back_as_empty_not_not_found() {
        let store = Store::new();
        store.write(b"/a", b"").unwrap();
        assert_eq!(store.read(b"/a").unwrap(), b"");
    }

    #[test]
    fn read_missing_segment_is_not_found() {
        let store = Store::new();
        assert_eq!(store.read(b"/missing"), Err(StoreError::NotFound));
    }

    #[test]
    fn rm_destroys_subtree_recursively() {
        let store = Store::new();
        store.write(b"/x/y/z", b"v").unwrap();
        store.rm(b"/x").unwrap();
        assert_eq!(store.read(b"/x/y/z"), Err(StoreError::NotFound));
        assert_eq!(store.directory(b"/").unwrap(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn rm_missing_node_is_invalid() {
        let store = Store::new();
        assert_eq!(store.rm(b"/nope"), Err(StoreError::Invalid));
    }

    #[test]
    fn rm_root_is_invalid() {
        let store = Store::new();
        assert_eq!(store.rm(b"/"), Err(StoreError::Invalid));
    }

    #[test]
    fn mkdir_is_idempotent_and_preserves_existing_value() {
        let store = Store::new();
        store.write(b"/a", b"v").unwrap();
        store.mkdir(b"/a").unwrap();
        store.mkdir(b"/a").unwrap();
        assert_eq!(store.read(b"/a").unwrap(), b"v");
    }

    #[test]
    fn directory_is_insertion_ordered() {
        let store = Store::new();
        store.write(b"/a/one", b"").unwrap();
        store.write(b"/a/two", b"").unwrap();
        store.write(b"/a/three", b"").unwrap();
        assert_eq!(
            store.directory(b"/a").unwrap(),
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );
    }

    #[test]
    fn trailing_and_doubled_slashes_tokenize_the_same() {
        let store = Store::new();
        store.write(b"/a/b/", b"v").unwrap();
        assert_eq!(store.read(b"/a//b").unwrap(), b"v");
    }
}
