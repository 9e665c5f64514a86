//! File-cache collaborator used by preload requests.

use crate::catalog::DataScope;
use crate::ids::FileEntryId;

/// Owns the memory of cached audio files. Preload requests only keep the IDs
/// it hands out.
pub trait FileCache {
    /// Registers the file described by `node`.
    ///
    /// Returns `None` if the entry is malformed or could not be added.
    fn try_add_file_cache_entry(
        &mut self,
        node: roxmltree::Node<'_, '_>,
        scope: DataScope,
        auto_load: bool,
    ) -> Option<FileEntryId>;

    fn try_remove_file_cache_entry(&mut self, id: FileEntryId, scope: DataScope) -> bool;
}
