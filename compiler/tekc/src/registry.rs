//! File and library registries.
//!
//! Files are deduplicated by canonical path: the interned path id is the
//! key of a [`claim_or_find`] table, and the claimer of a fresh slot builds
//! the [`File`] (segments, mapped source) and publishes it. Anyone who
//! finds the key waits for that publication.
//!
//! Each file and each lib owns its own [`SegmentSet`], so per-file token
//! and node arrays never move while other files are registered.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::mem;
use std::num::NonZeroU32;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use memmap2::Mmap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tek_arena::{claim_or_find, Claim, PublishSlots, SegmentSet, VirtMemError, ZeroInit};
use tek_diagnostic::{Error, ErrorArg, ErrorKind, ErrorLog};
use tek_ir::{FileId, LibId, StrId, StringTable, SynNode, TokenKind, TokenLoc, TokenValue};
use tek_lexer::LexedFile;

use crate::compiler::JobType;
use crate::config::Capacities;
use crate::flags::RunFlags;
use crate::jobs::JobSystem;

const FILE_PATHS: usize = 0;
const FILES: usize = 1;
const LIBS: usize = 2;

/// Who asked for a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileOrigin {
    /// The root file of a library being created.
    LibRoot(LibId),
    /// An `#import` in an already registered file; relative paths resolve
    /// against that file's directory.
    Import(FileId),
}

/// How far a file has been processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum FileStage {
    Created,
    Lexed,
    Parsed,
    Validated,
    Failed,
}

impl FileStage {
    fn from_u8(raw: u8) -> FileStage {
        match raw {
            0 => FileStage::Created,
            1 => FileStage::Lexed,
            2 => FileStage::Parsed,
            3 => FileStage::Validated,
            _ => FileStage::Failed,
        }
    }
}

/// A file's source bytes.
pub enum Source {
    Empty,
    Mapped(Mmap),
}

impl Source {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Source::Empty => &[],
            Source::Mapped(map) => map,
        }
    }
}

/// The shared tables registration writes into.
pub(crate) struct Sinks<'a> {
    pub(crate) strings: &'a StringTable,
    pub(crate) errors: &'a ErrorLog,
    pub(crate) jobs: &'a JobSystem<JobType>,
}

impl Sinks<'_> {
    fn out_of_memory(&self, err: &VirtMemError) {
        tracing::warn!(%err, "segment reservation failed");
        self.jobs.flags().insert(RunFlags::OUT_OF_MEMORY);
        self.errors.add(Error::new(
            ErrorKind::VirtMem,
            ErrorArg::Errno(err.raw_os_error().unwrap_or(libc::ENOMEM)),
            ErrorArg::None,
        ));
    }
}

fn errno(err: &io::Error) -> ErrorArg {
    ErrorArg::Errno(err.raw_os_error().unwrap_or(libc::EIO))
}

fn path_bytes(path: &Path) -> &[u8] {
    path.as_os_str().as_bytes()
}

/// Path-deduplicated file table plus the lib table.
pub struct Registry {
    segments: SegmentSet,
    files_count: AtomicU32,
    libs_count: AtomicU32,
    file_capacity: usize,
    lib_capacity: usize,
    capacities: Capacities,
}

impl Registry {
    pub fn new(capacities: &Capacities) -> Result<Self, VirtMemError> {
        let files = capacities.files.max(1);
        let libs = capacities.libs.max(1);
        let segments = SegmentSet::reserve(&[
            files.saturating_mul(mem::size_of::<AtomicU32>()),
            PublishSlots::<File>::bytes_for(files),
            PublishSlots::<Lib>::bytes_for(libs),
        ])?;
        let file_capacity = segments
            .capacity_of::<AtomicU32>(FILE_PATHS)
            .min(segments.publish_slots::<File>(FILES).capacity())
            .min(u32::MAX as usize);
        let lib_capacity = segments
            .publish_slots::<Lib>(LIBS)
            .capacity()
            .min(u32::MAX as usize);
        Ok(Registry {
            segments,
            files_count: AtomicU32::new(0),
            libs_count: AtomicU32::new(0),
            file_capacity,
            lib_capacity,
            capacities: *capacities,
        })
    }

    /// Number of claimed file slots.
    pub fn file_count(&self) -> usize {
        (self.files_count.load(Ordering::Acquire) as usize).min(self.file_capacity)
    }

    pub fn lib_count(&self) -> usize {
        (self.libs_count.load(Ordering::Acquire) as usize).min(self.lib_capacity)
    }

    /// The file, once published.
    pub fn file(&self, id: FileId) -> Option<&File> {
        self.file_slots().get(id.index())
    }

    pub fn lib(&self, id: LibId) -> Option<&Lib> {
        self.lib_slots().get(id.index())
    }

    /// Published files in registration order.
    pub fn files(&self) -> impl Iterator<Item = &File> + '_ {
        let slots = self.file_slots();
        (0..self.file_count()).filter_map(move |index| slots.get(index))
    }

    /// The file registered under the interned canonical `path`.
    pub fn file_by_path(&self, path: StrId) -> Option<FileId> {
        let keys = self.path_keys();
        (0..self.file_count())
            .find(|&index| keys[index].load(Ordering::Acquire) == path.raw())
            .map(FileId::from_index)
    }

    /// Creates a library rooted at `root_path` and registers its root file.
    ///
    /// Returns `None` after logging when the path is invalid, a reservation
    /// fails or the root file cannot be registered.
    pub(crate) fn lib_create(&self, sinks: &Sinks<'_>, root_path: &Path) -> Option<LibId> {
        let canonical = match fs::canonicalize(root_path) {
            Ok(canonical) => canonical,
            Err(err) => {
                let path = sinks.strings.get_or_insert(path_bytes(root_path));
                sinks.errors.add(Error::new(
                    ErrorKind::InvalidFilePath,
                    ErrorArg::Str(path),
                    errno(&err),
                ));
                return None;
            }
        };
        let root = sinks.strings.get_or_insert(path_bytes(&canonical));

        let index = self.libs_count.fetch_add(1, Ordering::AcqRel) as usize;
        if index >= self.lib_capacity {
            tek_arena::fatal!("lib table is full ({} libs)", self.lib_capacity);
        }
        let id = LibId::from_index(index);
        let lib = match Lib::new(id, root, &self.capacities) {
            Ok(lib) => lib,
            Err(err) => {
                sinks.out_of_memory(&err);
                return None;
            }
        };
        let lib = publish(&self.lib_slots(), index, lib, "lib");
        tracing::debug!(lib = id.raw(), root = %canonical.display(), "lib created");

        let file = self.file_get_or_create(sinks, &canonical, FileOrigin::LibRoot(id))?;
        lib.root_file.store(file.raw(), Ordering::Release);
        Some(id)
    }

    /// Returns the file at `path`, registering it and queueing its lex job
    /// if this is the first reference.
    ///
    /// Returns `None` after logging when the path cannot be resolved, the
    /// file cannot be read, or a lib root is already part of another lib.
    pub(crate) fn file_get_or_create(
        &self,
        sinks: &Sinks<'_>,
        path: &Path,
        origin: FileOrigin,
    ) -> Option<FileId> {
        let (lib, base) = match origin {
            FileOrigin::LibRoot(lib) => (lib, None),
            FileOrigin::Import(importer) => {
                let Some(importer) = self.file(importer) else {
                    tek_arena::fatal!("import from unregistered file {importer:?}");
                };
                let importer_path = Path::new(OsStr::from_bytes(sinks.strings.get(importer.path)));
                (importer.lib, importer_path.parent())
            }
        };
        let resolved = match base {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        };
        let canonical = match fs::canonicalize(&resolved) {
            Ok(canonical) => canonical,
            Err(err) => {
                let resolved = sinks.strings.get_or_insert(path_bytes(&resolved));
                sinks.errors.add(Error::new(
                    ErrorKind::InvalidFilePath,
                    ErrorArg::Str(resolved),
                    errno(&err),
                ));
                return None;
            }
        };
        let path_id = sinks.strings.get_or_insert(path_bytes(&canonical));

        let claim = claim_or_find(self.path_keys(), &self.files_count, path_id.key(), |_| true)
            .unwrap_or_else(|full| tek_arena::fatal!("file table is full: {full}"));
        match claim {
            Claim::Existing(index) => {
                let file = self.file_slots().wait(index);
                if let FileOrigin::LibRoot(root_lib) = origin {
                    if file.lib != root_lib {
                        let other = self
                            .lib(file.lib)
                            .map_or(ErrorArg::File(file.id), |lib| ErrorArg::Str(lib.root_path));
                        sinks.errors.add(Error::new(
                            ErrorKind::LibRootFileIsUsedInAnotherLib,
                            ErrorArg::Str(path_id),
                            other,
                        ));
                        return None;
                    }
                }
                (file.stage() != FileStage::Failed).then_some(file.id)
            }
            Claim::Claimed(index) => {
                self.create_file(sinks, FileId::from_index(index), path_id, lib, &canonical)
            }
        }
    }

    fn create_file(
        &self,
        sinks: &Sinks<'_>,
        id: FileId,
        path: StrId,
        lib: LibId,
        canonical: &Path,
    ) -> Option<FileId> {
        let mut failed = false;
        let segments = match FileData::reserve(&self.capacities) {
            Ok(segments) => Some(segments),
            Err(err) => {
                sinks.out_of_memory(&err);
                failed = true;
                None
            }
        };
        let source = if failed {
            Source::Empty
        } else {
            match map_source(canonical) {
                Ok(source) => source,
                Err(err) => {
                    sinks.errors.add(Error::new(
                        ErrorKind::LexerFileReadFailed,
                        ErrorArg::File(id),
                        errno(&err),
                    ));
                    failed = true;
                    Source::Empty
                }
            }
        };
        let stage = if failed {
            FileStage::Failed
        } else {
            FileStage::Created
        };
        let file = File {
            id,
            path,
            lib,
            source,
            stage: AtomicU8::new(stage as u8),
            data: RwLock::new(FileData::new(segments)),
        };
        // Failed files are published too: waiters on this slot and error
        // rendering both need the record.
        publish(&self.file_slots(), id.index(), file, "file");
        if failed {
            return None;
        }

        if let Some(lib) = self.lib(lib) {
            lib.add_file(id);
        }
        sinks.jobs.queue(JobType::FileLex, id.raw());
        tracing::debug!(file = id.raw(), path = %canonical.display(), "file registered");
        Some(id)
    }

    fn path_keys(&self) -> &[AtomicU32] {
        &self.segments.slice::<AtomicU32>(FILE_PATHS)[..self.file_capacity]
    }

    fn file_slots(&self) -> PublishSlots<'_, File> {
        self.segments.publish_slots(FILES)
    }

    fn lib_slots(&self) -> PublishSlots<'_, Lib> {
        self.segments.publish_slots(LIBS)
    }
}

impl Registry {
    /// Drops every file and lib, releasing their segments and source maps,
    /// and empties both tables. Ids from before the reset must not be used
    /// afterwards.
    pub(crate) fn reset(&mut self) -> Result<(), VirtMemError> {
        self.drop_records();
        self.segments.reset()?;
        *self.files_count.get_mut() = 0;
        *self.libs_count.get_mut() = 0;
        Ok(())
    }

    fn drop_records(&mut self) {
        let files = self.file_count();
        let libs = self.lib_count();
        self.segments.drop_published::<File>(FILES, files);
        self.segments.drop_published::<Lib>(LIBS, libs);
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.drop_records();
    }
}

fn publish<'a, T>(slots: &PublishSlots<'a, T>, index: usize, record: T, what: &str) -> &'a T
where
    T: Send + Sync,
{
    slots
        .publish(index, record)
        .unwrap_or_else(|_| tek_arena::fatal!("{what} slot {index} published twice"))
}

#[allow(unsafe_code)]
fn map_source(path: &Path) -> io::Result<Source> {
    let file = fs::File::open(path)?;
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        return Err(io::Error::from_raw_os_error(libc::EISDIR));
    }
    if metadata.len() == 0 {
        return Ok(Source::Empty);
    }
    // Token offsets are u32.
    if metadata.len() > u64::from(u32::MAX) {
        return Err(io::Error::from_raw_os_error(libc::EFBIG));
    }
    // SAFETY: source files are only read, and are not expected to change
    // while the compiler runs.
    let map = unsafe { Mmap::map(&file)? };
    Ok(Source::Mapped(map))
}

const TOKEN_LOCS: usize = 0;
const TOKENS: usize = 1;
const TOKEN_VALUES: usize = 2;
const LINE_STARTS: usize = 3;
const SYN_NODES: usize = 4;

/// One registered source file.
pub struct File {
    pub id: FileId,
    /// Interned canonical path.
    pub path: StrId,
    pub lib: LibId,
    source: Source,
    stage: AtomicU8,
    data: RwLock<FileData>,
}

impl File {
    pub fn source(&self) -> &[u8] {
        self.source.bytes()
    }

    pub fn stage(&self) -> FileStage {
        FileStage::from_u8(self.stage.load(Ordering::Acquire))
    }

    pub fn set_stage(&self, stage: FileStage) {
        tracing::trace!(file = self.id.raw(), ?stage, "file stage");
        self.stage.store(stage as u8, Ordering::Release);
    }

    /// Token and node arrays. Written by the job processing the file, read
    /// by later jobs and by error rendering.
    pub fn data(&self) -> RwLockReadGuard<'_, FileData> {
        self.data.read()
    }

    pub fn data_mut(&self) -> RwLockWriteGuard<'_, FileData> {
        self.data.write()
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("lib", &self.lib)
            .field("stage", &self.stage())
            .finish_non_exhaustive()
    }
}

/// A file's token, line and syntax arrays, each in its own segment.
pub struct FileData {
    segments: Option<SegmentSet>,
    token_count: usize,
    line_count: usize,
    node_count: usize,
}

impl FileData {
    fn new(segments: Option<SegmentSet>) -> Self {
        FileData {
            segments,
            token_count: 0,
            line_count: 0,
            node_count: 0,
        }
    }

    fn reserve(capacities: &Capacities) -> Result<SegmentSet, VirtMemError> {
        let tokens = capacities.tokens_per_file.max(1);
        SegmentSet::reserve(&[
            tokens.saturating_mul(mem::size_of::<TokenLoc>()),
            tokens.saturating_mul(mem::size_of::<TokenKind>()),
            tokens.saturating_mul(mem::size_of::<TokenValue>()),
            capacities
                .lines_per_file
                .max(1)
                .saturating_mul(mem::size_of::<u32>()),
            capacities
                .nodes_per_file
                .max(1)
                .saturating_mul(mem::size_of::<SynNode>()),
        ])
    }

    pub fn tokens(&self) -> &[TokenKind] {
        self.view(TOKENS, self.token_count)
    }

    pub fn token_locs(&self) -> &[TokenLoc] {
        self.view(TOKEN_LOCS, self.token_count)
    }

    pub fn token_values(&self) -> &[TokenValue] {
        self.view(TOKEN_VALUES, self.token_count)
    }

    pub fn line_starts(&self) -> &[u32] {
        self.view(LINE_STARTS, self.line_count)
    }

    pub fn nodes(&self) -> &[SynNode] {
        self.view(SYN_NODES, self.node_count)
    }

    /// Copies a lexer's output in. Aborts if it exceeds the file segments.
    pub fn store_tokens(&mut self, lexed: LexedFile<'_>) {
        let Some(segments) = self.segments.as_mut() else {
            return;
        };
        copy_into(segments, TOKENS, lexed.kinds, "tokens");
        copy_into(segments, TOKEN_LOCS, lexed.locs, "tokens");
        copy_into(segments, TOKEN_VALUES, lexed.values, "tokens");
        copy_into(segments, LINE_STARTS, lexed.line_starts, "lines");
        self.token_count = lexed.kinds.len();
        self.line_count = lexed.line_starts.len();
    }

    /// Copies a syntax tree in. Aborts if it exceeds the node segment.
    pub fn store_nodes(&mut self, nodes: &[SynNode]) {
        let Some(segments) = self.segments.as_mut() else {
            return;
        };
        copy_into(segments, SYN_NODES, nodes, "syntax nodes");
        self.node_count = nodes.len();
    }

    fn view<T: ZeroInit + Sync>(&self, index: usize, len: usize) -> &[T] {
        match &self.segments {
            Some(segments) => &segments.slice(index)[..len],
            None => &[],
        }
    }
}

fn copy_into<T: ZeroInit + Copy>(segments: &mut SegmentSet, index: usize, items: &[T], what: &str) {
    let slots = segments.slice_mut::<T>(index);
    if items.len() > slots.len() {
        tek_arena::fatal!(
            "file has too many {what} ({} > {})",
            items.len(),
            slots.len()
        );
    }
    slots[..items.len()].copy_from_slice(items);
}

const LIB_FILES: usize = 0;
const LIB_DEPENDENCIES: usize = 1;
const LIB_DEPENDERS: usize = 2;

/// One compilation unit: its files and the libs it depends on or is
/// depended on by. Every list is deduplicated.
pub struct Lib {
    pub id: LibId,
    /// Interned canonical path of the root file.
    pub root_path: StrId,
    root_file: AtomicU32,
    segments: SegmentSet,
    files_count: AtomicU32,
    dependencies_count: AtomicU32,
    dependers_count: AtomicU32,
}

impl Lib {
    fn new(id: LibId, root_path: StrId, capacities: &Capacities) -> Result<Self, VirtMemError> {
        let deps = capacities.deps_per_lib.max(1).saturating_mul(4);
        let segments = SegmentSet::reserve(&[
            capacities.files_per_lib.max(1).saturating_mul(4),
            deps,
            deps,
        ])?;
        Ok(Lib {
            id,
            root_path,
            root_file: AtomicU32::new(0),
            segments,
            files_count: AtomicU32::new(0),
            dependencies_count: AtomicU32::new(0),
            dependers_count: AtomicU32::new(0),
        })
    }

    pub fn root_file(&self) -> Option<FileId> {
        FileId::new(self.root_file.load(Ordering::Acquire))
    }

    pub fn files(&self) -> Vec<FileId> {
        self.read(LIB_FILES, &self.files_count)
            .filter_map(FileId::new)
            .collect()
    }

    pub fn dependencies(&self) -> Vec<LibId> {
        self.read(LIB_DEPENDENCIES, &self.dependencies_count)
            .filter_map(LibId::new)
            .collect()
    }

    pub fn dependers(&self) -> Vec<LibId> {
        self.read(LIB_DEPENDERS, &self.dependers_count)
            .filter_map(LibId::new)
            .collect()
    }

    pub(crate) fn add_file(&self, file: FileId) -> bool {
        self.add(LIB_FILES, &self.files_count, file.key(), "file")
    }

    /// Records that this lib imports from `lib`. Returns `false` if the
    /// edge was already known.
    pub fn add_dependency(&self, lib: LibId) -> bool {
        self.add(LIB_DEPENDENCIES, &self.dependencies_count, lib.key(), "dependency")
    }

    pub fn add_depender(&self, lib: LibId) -> bool {
        self.add(LIB_DEPENDERS, &self.dependers_count, lib.key(), "depender")
    }

    fn add(&self, index: usize, count: &AtomicU32, key: NonZeroU32, what: &str) -> bool {
        match claim_or_find(self.segments.slice(index), count, key, |_| true) {
            Ok(Claim::Existing(_)) => false,
            Ok(Claim::Claimed(_)) => true,
            Err(full) => tek_arena::fatal!("lib {what} list is full: {full}"),
        }
    }

    fn read<'a>(&'a self, index: usize, count: &AtomicU32) -> impl Iterator<Item = u32> + 'a {
        let keys = self.segments.slice::<AtomicU32>(index);
        let len = (count.load(Ordering::Acquire) as usize).min(keys.len());
        keys[..len].iter().map(|key| key.load(Ordering::Acquire))
    }
}

impl std::fmt::Debug for Lib {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lib")
            .field("id", &self.id)
            .field("root_path", &self.root_path)
            .field("root_file", &self.root_file())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
