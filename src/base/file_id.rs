//! File identifiers for tracking indexed source files.

use std::fmt;

/// A lightweight handle for a source file known to the indexer.
///
/// Definitions and diagnostics refer to files through a `FileId`; the
/// path itself lives in the [`FileSet`](crate::hir::FileSet). Ids are never
/// reused within one process, so a stale id can never alias a new file.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FileId(pub u32);

impl FileId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

impl From<u32> for FileId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_file_id_hash() {
        let mut set = FxHashSet::default();
        set.insert(FileId::new(1));
        set.insert(FileId::new(2));
        set.insert(FileId::new(1));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_file_id_display() {
        assert_eq!(FileId::new(7).to_string(), "file#7");
        assert_eq!(format!("{:?}", FileId::new(7)), "FileId(7)");
    }
}
