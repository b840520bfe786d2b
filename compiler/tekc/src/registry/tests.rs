use super::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tek_ir::SynNodeKind;

struct Tables {
    strings: StringTable,
    errors: ErrorLog,
    jobs: JobSystem<JobType>,
    registry: Registry,
}

impl Tables {
    fn new() -> Self {
        let capacities = Capacities::small();
        Tables {
            strings: StringTable::with_capacity(capacities.strings, capacities.string_bytes)
                .unwrap(),
            errors: ErrorLog::with_capacity(capacities.errors).unwrap(),
            jobs: JobSystem::new(1, capacities.jobs).unwrap(),
            registry: Registry::new(&capacities).unwrap(),
        }
    }

    fn sinks(&self) -> Sinks<'_> {
        Sinks {
            strings: &self.strings,
            errors: &self.errors,
            jobs: &self.jobs,
        }
    }

    fn lib_create(&self, path: &Path) -> Option<LibId> {
        self.registry.lib_create(&self.sinks(), path)
    }

    fn import(&self, path: &str, from: FileId) -> Option<FileId> {
        self.registry
            .file_get_or_create(&self.sinks(), Path::new(path), FileOrigin::Import(from))
    }

    fn path_of(&self, file: FileId) -> PathBuf {
        let path = self.registry.file(file).unwrap().path;
        PathBuf::from(self.strings.get_str(path).unwrap())
    }
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_lib_create_registers_root_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "main.tek", "x: var = 1\n");
    let tables = Tables::new();

    let lib = tables.lib_create(&root).unwrap();
    let lib = tables.registry.lib(lib).unwrap();
    let file = lib.root_file().unwrap();

    assert_eq!(lib.files(), vec![file]);
    assert_eq!(tables.path_of(file), fs::canonicalize(&root).unwrap());
    assert_eq!(tables.registry.file(file).unwrap().source(), b"x: var = 1\n");
    assert_eq!(tables.registry.file(file).unwrap().stage(), FileStage::Created);
    assert_eq!(tables.jobs.available_len(JobType::FileLex), 1);
    assert!(tables.errors.is_empty());
}

#[test]
fn test_imports_resolve_against_importer_and_dedup() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "main.tek", "");
    let util = write(dir.path(), "sub/util.tek", "u: var\n");
    let tables = Tables::new();

    let lib = tables.lib_create(&root).unwrap();
    let main = tables.registry.lib(lib).unwrap().root_file().unwrap();

    let first = tables.import("sub/util.tek", main).unwrap();
    let second = tables.import("./sub/../sub/util.tek", main).unwrap();
    assert_eq!(first, second);
    assert_eq!(tables.path_of(first), fs::canonicalize(&util).unwrap());

    // Relative to the importing file, not the working directory.
    assert_eq!(tables.import("../main.tek", first), Some(main));

    assert_eq!(tables.registry.file_count(), 2);
    assert_eq!(tables.jobs.available_len(JobType::FileLex), 2);
    assert_eq!(tables.registry.file(first).unwrap().lib, lib);
    assert_eq!(tables.registry.lib(lib).unwrap().files(), vec![main, first]);
}

#[test]
fn test_missing_import_is_invalid_file_path() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "a.tek", "");
    let tables = Tables::new();
    let lib = tables.lib_create(&root).unwrap();
    let a = tables.registry.lib(lib).unwrap().root_file().unwrap();

    assert_eq!(tables.import("b.tek", a), None);

    let errors: Vec<Error> = tables.errors.iter().copied().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::InvalidFilePath);
    let ErrorArg::Str(path) = errors[0].args[0] else {
        panic!("expected a path argument, got {:?}", errors[0].args[0]);
    };
    let expected = fs::canonicalize(dir.path()).unwrap().join("b.tek");
    assert_eq!(tables.strings.get(path), path_bytes(&expected));
    assert_eq!(errors[0].args[1], ErrorArg::Errno(libc::ENOENT));
    assert_eq!(tables.registry.file_count(), 1);
}

#[test]
fn test_missing_root_logs_and_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let tables = Tables::new();
    assert_eq!(tables.lib_create(&dir.path().join("nope.tek")), None);
    assert_eq!(tables.errors.count_of(ErrorKind::InvalidFilePath), 1);
    assert_eq!(tables.registry.lib_count(), 0);
    assert_eq!(tables.jobs.stats().queued, 0);
}

#[test]
fn test_root_file_of_another_lib() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "main.tek", "");
    let tables = Tables::new();

    let first = tables.lib_create(&root).unwrap();
    assert_eq!(tables.lib_create(&root), None);

    let errors: Vec<Error> = tables.errors.iter().copied().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::LibRootFileIsUsedInAnotherLib);
    let root_path = tables.registry.lib(first).unwrap().root_path;
    assert_eq!(errors[0].args[1], ErrorArg::Str(root_path));
    assert_eq!(tables.registry.file_count(), 1);
}

#[test]
fn test_directory_fails_to_read() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "main.tek", "");
    fs::create_dir(dir.path().join("folder.tek")).unwrap();
    let tables = Tables::new();
    let lib = tables.lib_create(&root).unwrap();
    let main = tables.registry.lib(lib).unwrap().root_file().unwrap();

    assert_eq!(tables.import("folder.tek", main), None);
    assert_eq!(tables.errors.count_of(ErrorKind::LexerFileReadFailed), 1);
    let failed = tables.registry.files().nth(1).unwrap();
    assert_eq!(failed.stage(), FileStage::Failed);

    // Known to be unreadable: no second error, no job.
    assert_eq!(tables.import("folder.tek", main), None);
    assert_eq!(tables.errors.len(), 1);
    assert_eq!(tables.jobs.available_len(JobType::FileLex), 1);
}

#[test]
fn test_file_by_path() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "main.tek", "");
    let tables = Tables::new();
    let lib = tables.lib_create(&root).unwrap();
    let main = tables.registry.lib(lib).unwrap().root_file().unwrap();

    let canonical = fs::canonicalize(&root).unwrap();
    let path = tables.strings.lookup(path_bytes(&canonical)).unwrap();
    assert_eq!(tables.registry.file_by_path(path), Some(main));
}

#[test]
fn test_lib_edges_are_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a/main.tek", "");
    let b = write(dir.path(), "b/main.tek", "");
    let tables = Tables::new();
    let a = tables.lib_create(&a).unwrap();
    let b = tables.lib_create(&b).unwrap();
    let lib_a = tables.registry.lib(a).unwrap();

    assert!(lib_a.add_dependency(b));
    assert!(!lib_a.add_dependency(b));
    assert!(tables.registry.lib(b).unwrap().add_depender(a));
    assert_eq!(lib_a.dependencies(), vec![b]);
    assert_eq!(tables.registry.lib(b).unwrap().dependers(), vec![a]);
    assert!(lib_a.dependers().is_empty());
}

#[test]
fn test_file_data_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "main.tek", "x: var\n");
    let tables = Tables::new();
    let lib = tables.lib_create(&root).unwrap();
    let file = tables.registry.lib(lib).unwrap().root_file().unwrap();
    let file = tables.registry.file(file).unwrap();

    let kinds = [
        TokenKind::Ident,
        TokenKind::Colon,
        TokenKind::KwVar,
        TokenKind::Newline,
        TokenKind::Eof,
    ];
    let locs: Vec<TokenLoc> = (0..5)
        .map(|i| TokenLoc {
            offset: i,
            len: 1,
            line: 1,
            column: i + 1,
        })
        .collect();
    let values = [TokenValue::NONE; 5];
    let lines = [0u32, 7];
    file.data_mut().store_tokens(LexedFile {
        kinds: &kinds,
        locs: &locs,
        values: &values,
        line_starts: &lines,
    });
    file.data_mut().store_nodes(&[SynNode::new(SynNodeKind::Mod, 0)]);

    let data = file.data();
    assert_eq!(data.tokens(), &kinds);
    assert_eq!(data.token_locs(), locs.as_slice());
    assert_eq!(data.token_values().len(), 5);
    assert_eq!(data.line_starts(), &lines);
    assert_eq!(data.nodes().len(), 1);
    assert_eq!(data.nodes()[0].kind, SynNodeKind::Mod);
}

#[test]
fn test_records_are_stored_in_the_registry_segments() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "main.tek", "");
    let tables = Tables::new();
    let lib = tables.lib_create(&root).unwrap();
    let segments = &tables.registry.segments;

    let lib = std::ptr::from_ref(tables.registry.lib(lib).unwrap()) as usize;
    assert!(lib >= segments.addr(LIBS) && lib < segments.addr(LIBS) + segments.capacity(LIBS));
    let file = tables.registry.files().next().unwrap();
    let file = std::ptr::from_ref(file) as usize;
    assert!(file >= segments.addr(FILES) && file < segments.addr(FILES) + segments.capacity(FILES));
}

#[test]
fn test_reset_forgets_files_and_libs() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "main.tek", "a: var\n");
    let other = write(dir.path(), "other.tek", "");
    let mut tables = Tables::new();
    let lib = tables.lib_create(&root).unwrap();
    let main = tables.registry.lib(lib).unwrap().root_file().unwrap();

    tables.registry.reset().unwrap();
    assert_eq!(tables.registry.file_count(), 0);
    assert_eq!(tables.registry.lib_count(), 0);
    assert!(tables.registry.lib(lib).is_none());
    assert!(tables.registry.file(main).is_none());
    assert_eq!(tables.registry.files().count(), 0);

    // The first slots are handed out again, to whatever registers next.
    let again = tables.lib_create(&other).unwrap();
    assert_eq!(again, lib);
    let file = tables.registry.lib(again).unwrap().root_file().unwrap();
    assert_eq!(file, main);
    assert_eq!(tables.path_of(file), fs::canonicalize(&other).unwrap());
    assert!(tables.registry.file(file).unwrap().source().is_empty());
}
