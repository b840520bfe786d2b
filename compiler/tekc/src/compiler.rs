//! The compiler root: every shared table of one run, and the job host the
//! worker pool drives.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tek_diagnostic::{ErrorLog, SourceMap, TerminalEmitter};
use tek_ir::{FileId, LibId, StrId, StringTable, TokenKind, TokenLoc};
use tek_lexer::Lexer;
use tek_parse::TreeGenerator;

use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::flags::RunFlags;
use crate::jobs::{JobKind, JobSystem};
use crate::pool::{JobHost, WorkerPool};
use crate::registry::{FileOrigin, Registry, Sinks};
use crate::work;

/// The compiler's job types, in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobType {
    /// Lex a file; queues [`JobType::FileGenSyntax`].
    FileLex,
    /// Build a file's syntax tree, registering its imports; queues
    /// [`JobType::FileValidate`].
    FileGenSyntax,
    /// Wait for a file's imports to be parsed, then record lib
    /// dependencies.
    FileValidate,
}

impl JobKind for JobType {
    const ALL: &'static [JobType] = &[
        JobType::FileLex,
        JobType::FileGenSyntax,
        JobType::FileValidate,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn is_critical(self) -> bool {
        matches!(self, JobType::FileLex | JobType::FileGenSyntax)
    }
}

/// Per-thread scratch state.
pub struct Worker {
    pub(crate) index: usize,
    pub(crate) lexer: Lexer,
    pub(crate) generator: TreeGenerator,
}

/// One compilation: string table, error log, scheduler and registries.
pub struct Compiler {
    config: CompilerConfig,
    root_path: PathBuf,
    strings: StringTable,
    errors: ErrorLog,
    jobs: JobSystem<JobType>,
    registry: Registry,
}

impl Compiler {
    /// Reserves every table. Nothing runs until [`Compiler::run`].
    pub fn new(
        root_path: impl Into<PathBuf>,
        config: CompilerConfig,
    ) -> Result<Self, CompileError> {
        let root_path = root_path.into();
        if root_path.as_os_str().is_empty() {
            return Err(CompileError::NoRootPath);
        }
        let capacities = &config.capacities;
        let strings = StringTable::with_capacity(capacities.strings, capacities.string_bytes)
            .map_err(CompileError::reserve("string table"))?;
        let errors =
            ErrorLog::with_capacity(capacities.errors).map_err(CompileError::reserve("error log"))?;
        let jobs = JobSystem::new(config.workers, capacities.jobs)
            .map_err(CompileError::reserve("job pool"))?;
        let registry = Registry::new(capacities).map_err(CompileError::reserve("file registry"))?;
        Ok(Compiler {
            config,
            root_path,
            strings,
            errors,
            jobs,
            registry,
        })
    }

    /// Runs the worker pool to completion and hands the finished compiler
    /// back for reporting.
    ///
    /// A compiler whose previous run finished can run again: every file and
    /// lib of that run is released and all tables start empty. Libs created
    /// before the first run are kept.
    pub fn run(mut self) -> Result<Arc<Self>, CompileError> {
        if self.jobs.is_stopping() {
            self.reset()?;
        }
        let compiler = Arc::new(self);
        let pool = WorkerPool::start(Arc::clone(&compiler))?;
        pool.wait()?;
        let stats = compiler.jobs.stats();
        tracing::debug!(
            files = compiler.registry.file_count(),
            errors = compiler.errors.len(),
            ?stats,
            "compilation finished"
        );
        Ok(compiler)
    }

    fn reset(&mut self) -> Result<(), CompileError> {
        self.registry
            .reset()
            .map_err(CompileError::reset("file registry"))?;
        self.jobs.reset().map_err(CompileError::reset("job pool"))?;
        self.errors.reset().map_err(CompileError::reset("error log"))?;
        self.strings
            .reset()
            .map_err(CompileError::reset("string table"))?;
        tracing::debug!(root = %self.root_path.display(), "compiler reset for another run");
        Ok(())
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn jobs(&self) -> &JobSystem<JobType> {
        &self.jobs
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Creates a library rooted at `root_path`. See [`Registry`].
    pub fn lib_create(&self, root_path: &Path) -> Option<LibId> {
        self.registry.lib_create(&self.sinks(), root_path)
    }

    /// Looks up or registers the file at `path`. See [`Registry`].
    pub fn file_get_or_create(&self, path: &Path, origin: FileOrigin) -> Option<FileId> {
        self.registry.file_get_or_create(&self.sinks(), path, origin)
    }

    /// Whether a segment reservation failed during the run.
    pub fn out_of_memory(&self) -> bool {
        self.jobs.flags().contains(RunFlags::OUT_OF_MEMORY)
    }

    pub fn has_errors(&self) -> bool {
        self.out_of_memory() || self.errors.has_errors()
    }

    /// Writes every lexed file's tokens, one per line, under a header naming
    /// the file. Valued tokens are followed by `-> value`.
    pub fn dump_tokens<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for file in self.registry.files() {
            let path = String::from_utf8_lossy(self.strings.get(file.path));
            writeln!(out, "########## FILE: {path} ##########")?;
            let data = file.data();
            for (&kind, value) in data.tokens().iter().zip(data.token_values()) {
                match kind {
                    TokenKind::Newline => writeln!(out)?,
                    TokenKind::LitBool => writeln!(out, "{} -> {}", kind.name(), value.as_bool())?,
                    TokenKind::LitUint => writeln!(out, "{} -> {}", kind.name(), value.as_u64())?,
                    TokenKind::LitFloat => {
                        writeln!(out, "{} -> {:.6}", kind.name(), value.as_f64())?;
                    }
                    _ if kind.has_value() => {
                        let text = value
                            .str_id()
                            .and_then(|id| self.strings.try_get(id))
                            .unwrap_or_default();
                        let text = String::from_utf8_lossy(text);
                        writeln!(out, "{} -> \"{text}\"", kind.name())?;
                    }
                    _ => writeln!(out, "{}", kind.name())?,
                }
            }
        }
        out.flush()
    }

    /// Renders the error log followed by a summary line. Returns the
    /// number of errors.
    pub fn report<W: Write>(&self, emitter: &mut TerminalEmitter<W>) -> usize {
        let count = emitter.emit_all(self.errors.iter(), self);
        emitter.emit_summary(count);
        emitter.flush();
        count
    }

    fn sinks(&self) -> Sinks<'_> {
        Sinks {
            strings: &self.strings,
            errors: &self.errors,
            jobs: &self.jobs,
        }
    }
}

impl JobHost for Compiler {
    type Kind = JobType;
    type Worker = Worker;

    fn jobs(&self) -> &JobSystem<JobType> {
        &self.jobs
    }

    fn create_worker(&self, index: usize) -> Worker {
        Worker {
            index,
            lexer: Lexer::new(),
            generator: TreeGenerator::new(),
        }
    }

    fn seed(&self, _worker: &mut Worker) {
        if self.lib_create(&self.root_path).is_none() {
            tracing::debug!(root = %self.root_path.display(), "root lib not created");
        }
    }

    fn dispatch(&self, worker: &mut Worker, kind: JobType, payload: u32) -> bool {
        let Some(file) = FileId::new(payload) else {
            tracing::warn!(?kind, "job without a file");
            return false;
        };
        match kind {
            JobType::FileLex => work::lex(self, worker, file),
            JobType::FileGenSyntax => work::gen_syntax(self, worker, file),
            JobType::FileValidate => work::validate(self, worker, file),
        }
    }
}

impl SourceMap for Compiler {
    fn file_path(&self, file: FileId) -> Option<String> {
        let file = self.registry.file(file)?;
        Some(String::from_utf8_lossy(self.strings.get(file.path)).into_owned())
    }

    fn source(&self, file: FileId) -> Option<&[u8]> {
        self.registry.file(file).map(|file| file.source())
    }

    fn token_loc(&self, file: FileId, token: u32) -> Option<TokenLoc> {
        let file = self.registry.file(file)?;
        let data = file.data();
        data.token_locs().get(token as usize).copied()
    }

    fn string(&self, id: StrId) -> Option<String> {
        self.strings
            .try_get(id)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("root_path", &self.root_path)
            .field("config", &self.config)
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}
