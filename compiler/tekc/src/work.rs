//! Work functions, one per [`JobType`]. Each returns whether the job
//! succeeded; diagnostics go to the error log.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tek_diagnostic::Error;
use tek_ir::{FileId, StrId, SynNodeKind};
use tek_parse::{ParseError, Tokens};

use crate::compiler::{Compiler, JobType, Worker};
use crate::registry::{FileOrigin, FileStage};

#[tracing::instrument(level = "debug", skip_all, fields(worker = worker.index, file = id.raw()))]
pub(crate) fn lex(compiler: &Compiler, worker: &mut Worker, id: FileId) -> bool {
    let Some(file) = compiler.registry().file(id) else {
        return false;
    };
    let ok = worker
        .lexer
        .lex(id, file.source(), compiler.strings(), compiler.errors());
    // Stored even on failure: the error points at the last token.
    file.data_mut().store_tokens(worker.lexer.output());
    if !ok {
        file.set_stage(FileStage::Failed);
        return false;
    }
    file.set_stage(FileStage::Lexed);
    compiler.jobs().queue(JobType::FileGenSyntax, id.raw());
    true
}

#[tracing::instrument(level = "debug", skip_all, fields(worker = worker.index, file = id.raw()))]
pub(crate) fn gen_syntax(compiler: &Compiler, worker: &mut Worker, id: FileId) -> bool {
    let Some(file) = compiler.registry().file(id) else {
        return false;
    };
    let result = {
        let data = file.data();
        let tokens = Tokens {
            kinds: data.tokens(),
            values: data.token_values(),
        };
        let mut resolver = |path: StrId, _token: u32| {
            let path = Path::new(OsStr::from_bytes(compiler.strings().get(path)));
            compiler.file_get_or_create(path, FileOrigin::Import(id))
        };
        worker.generator.generate(tokens, &mut resolver)
    };
    file.data_mut().store_nodes(worker.generator.nodes());

    match result {
        Ok(()) => {
            file.set_stage(FileStage::Parsed);
            compiler.jobs().queue(JobType::FileValidate, id.raw());
            true
        }
        Err(ParseError::Syntax { kind, token }) => {
            compiler.errors().add(Error::at_token(kind, id, token));
            file.set_stage(FileStage::Failed);
            false
        }
        // The registry has already logged why.
        Err(ParseError::Import { token }) => {
            tracing::debug!(token, "import not resolved");
            file.set_stage(FileStage::Failed);
            false
        }
    }
}

/// Succeeds once every imported file is parsed; until then the job fails
/// and waits on its failed list for the next retry pass.
#[tracing::instrument(level = "debug", skip_all, fields(worker = worker.index, file = id.raw()))]
pub(crate) fn validate(compiler: &Compiler, worker: &mut Worker, id: FileId) -> bool {
    let registry = compiler.registry();
    let Some(file) = registry.file(id) else {
        return false;
    };
    // A file may import the same path more than once under different aliases.
    let mut seen = FxHashSet::default();
    let imports: SmallVec<[FileId; 8]> = file
        .data()
        .nodes()
        .iter()
        .filter(|node| node.kind == SynNodeKind::Import)
        .filter_map(|node| FileId::new(node.lhs))
        .filter(|&import| seen.insert(import))
        .collect();

    for &import in &imports {
        let parsed = registry.file(import).is_some_and(|imported| {
            matches!(imported.stage(), FileStage::Parsed | FileStage::Validated)
        });
        if !parsed {
            tracing::trace!(import = import.raw(), "import not parsed yet");
            return false;
        }
    }

    for import in imports {
        let Some(imported) = registry.file(import) else {
            continue;
        };
        if imported.lib == file.lib {
            continue;
        }
        let (Some(lib), Some(dependency)) = (registry.lib(file.lib), registry.lib(imported.lib))
        else {
            continue;
        };
        if lib.add_dependency(dependency.id) {
            dependency.add_depender(lib.id);
            tracing::debug!(
                lib = lib.id.raw(),
                dependency = dependency.id.raw(),
                "lib dependency"
            );
        }
    }
    file.set_stage(FileStage::Validated);
    true
}
