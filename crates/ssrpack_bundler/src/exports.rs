use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;

use rayon::prelude::*;
use swc_core::common::input::StringInput;
use swc_core::common::sync::Lrc;
use swc_core::common::BytePos;
use swc_core::common::FileName;
use swc_core::common::SourceMap;
use swc_core::common::Spanned;
use swc_core::ecma::ast::ExportSpecifier;
use swc_core::ecma::ast::ModuleDecl;
use swc_core::ecma::ast::ModuleExportName;
use swc_core::ecma::ast::ModuleItem;
use swc_core::ecma::parser::lexer::Lexer;
use swc_core::ecma::parser::Parser;

use crate::dependencies::collect_js_files;

/// An `export { … }` or `export { … } from '…'` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportStatement {
  /// Byte offset of `export`
  pub start: usize,
  /// Byte offset just past the statement
  pub end: usize,
  /// Exported names in source order
  pub names: Vec<String>,
  /// Source range of each specifier, parallel to `names`
  pub specifiers: Vec<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportFixOutcome {
  Fixed { removed: usize, rewritten: usize },
  Unchanged,
  Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFixReport {
  pub path: PathBuf,
  pub outcome: ExportFixOutcome,
}

/// Rewritten source of a module that had duplicate exports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFix {
  pub code: String,
  pub removed: usize,
  pub rewritten: usize,
}

fn module_export_name(name: &ModuleExportName) -> String {
  match name {
    ModuleExportName::Ident(ident) => ident.sym.to_string(),
    ModuleExportName::Str(str) => str.value.to_string(),
  }
}

fn exported_name(specifier: &ExportSpecifier) -> String {
  match specifier {
    ExportSpecifier::Named(named) => named
      .exported
      .as_ref()
      .map(module_export_name)
      .unwrap_or_else(|| module_export_name(&named.orig)),
    ExportSpecifier::Namespace(namespace) => module_export_name(&namespace.name),
    ExportSpecifier::Default(_) => "default".to_string(),
  }
}

/// Parse `source` as an ES module and list its brace-form export statements in source order
pub fn parse_export_statements(source: &str) -> anyhow::Result<Vec<ExportStatement>> {
  let source_map = Lrc::new(SourceMap::default());
  let source_file = source_map.new_source_file(Lrc::new(FileName::Anon), source.into());

  let lexer = Lexer::new(
    Default::default(),
    Default::default(),
    StringInput::from(&*source_file),
    None,
  );

  let mut parser = Parser::new_from(lexer);
  let module = parser
    .parse_module()
    .map_err(|err| anyhow::anyhow!("Failed to parse module: {:?}", err.kind()))?;

  let start_pos = source_file.start_pos;
  let offset = |pos: BytePos| (pos.0 - start_pos.0) as usize;

  let statements = module
    .body
    .iter()
    .filter_map(|item| match item {
      ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(export)) => Some(export),
      _ => None,
    })
    .map(|export| ExportStatement {
      start: offset(export.span.lo),
      end: offset(export.span.hi),
      names: export.specifiers.iter().map(exported_name).collect(),
      specifiers: export
        .specifiers
        .iter()
        .map(|specifier| {
          let span = specifier.span();
          offset(span.lo)..offset(span.hi)
        })
        .collect(),
    })
    .collect();

  Ok(statements)
}

/// Extends a statement range over one trailing `;` and one line break
fn removal_range(source: &str, statement: &ExportStatement) -> Range<usize> {
  let mut end = statement.end;
  if source[end..].starts_with(';') {
    end += 1;
  }
  if source[end..].starts_with("\r\n") {
    end += 2;
  } else if source[end..].starts_with('\n') {
    end += 1;
  }
  statement.start..end
}

/// Range between the braces of a statement, exclusive of the braces themselves
fn brace_contents_range(source: &str, statement: &ExportStatement) -> Option<Range<usize>> {
  let open = statement.start + source[statement.start..statement.end].find('{')?;
  let last_specifier_end = statement.specifiers.last()?.end;
  let close = last_specifier_end + source[last_specifier_end..statement.end].find('}')?;
  Some(open + 1..close)
}

/// Remove exports that an earlier statement in the same module already exported.
///
/// Statements whose names were all exported before are dropped along with one
/// trailing `;` and line break. Statements mixing new and repeated names keep
/// only the new names, in their original order. Returns `None` when nothing
/// needed fixing.
pub fn fix_duplicate_exports(source: &str) -> anyhow::Result<Option<ExportFix>> {
  fix_duplicate_exports_with_seen(source, &mut HashSet::new())
}

/// Like [`fix_duplicate_exports`], treating every name in `seen` as already
/// exported. Names this module keeps exporting are added to `seen`.
pub fn fix_duplicate_exports_with_seen(
  source: &str,
  seen: &mut HashSet<String>,
) -> anyhow::Result<Option<ExportFix>> {
  let statements = parse_export_statements(source)?;

  let mut edits: Vec<(Range<usize>, String)> = Vec::new();
  let mut removed = 0;
  let mut rewritten = 0;

  for statement in &statements {
    let duplicates = statement
      .names
      .iter()
      .map(|name| seen.contains(name))
      .collect::<Vec<bool>>();

    if statement.names.is_empty() || !duplicates.iter().any(|duplicate| *duplicate) {
      seen.extend(statement.names.iter().cloned());
      continue;
    }

    if duplicates.iter().all(|duplicate| *duplicate) {
      edits.push((removal_range(source, statement), String::new()));
      removed += 1;
      continue;
    }

    let Some(braces) = brace_contents_range(source, statement) else {
      anyhow::bail!(
        "Could not locate the braces of the export statement at byte {}",
        statement.start
      );
    };

    let kept = statement
      .specifiers
      .iter()
      .zip(&duplicates)
      .filter(|(_, duplicate)| !**duplicate)
      .map(|(range, _)| &source[range.clone()])
      .collect::<Vec<&str>>();

    edits.push((braces, format!(" {} ", kept.join(", "))));
    rewritten += 1;

    for (name, duplicate) in statement.names.iter().zip(&duplicates) {
      if !duplicate {
        seen.insert(name.clone());
      }
    }
  }

  if edits.is_empty() {
    return Ok(None);
  }

  edits.sort_by_key(|(range, _)| range.start);

  let mut code = String::with_capacity(source.len());
  let mut cursor = 0;
  for (range, replacement) in &edits {
    code.push_str(&source[cursor..range.start]);
    code.push_str(replacement);
    cursor = range.end;
  }
  code.push_str(&source[cursor..]);

  Ok(Some(ExportFix {
    code,
    removed,
    rewritten,
  }))
}

fn write_fix(path: &Path, fix: Option<ExportFix>) -> anyhow::Result<ExportFixOutcome> {
  let Some(fix) = fix else {
    return Ok(ExportFixOutcome::Unchanged);
  };

  std::fs::write(path, fix.code)?;
  Ok(ExportFixOutcome::Fixed {
    removed: fix.removed,
    rewritten: fix.rewritten,
  })
}

fn report(path: PathBuf, result: anyhow::Result<ExportFixOutcome>) -> ExportFixReport {
  let outcome = match result {
    Ok(outcome) => outcome,
    Err(err) => {
      tracing::warn!(file = %path.display(), "Failed to fix duplicate exports: {err:#}");
      ExportFixOutcome::Failed(format!("{err:#}"))
    }
  };

  if let ExportFixOutcome::Fixed { removed, rewritten } = outcome {
    tracing::info!(file = %path.display(), removed, rewritten, "Fixed duplicate exports");
  }

  ExportFixReport { path, outcome }
}

/// Repair duplicate re-exports within each `.js` file under `dir`.
///
/// Files are processed in parallel and written back only when edited. A file
/// that cannot be read, parsed or written is reported as failed and does not
/// affect the others.
#[tracing::instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub fn fix_duplicate_exports_in_directory(dir: &Path) -> anyhow::Result<Vec<ExportFixReport>> {
  let reports = collect_js_files(dir)?
    .into_par_iter()
    .map(|path| {
      let result = std::fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|source| fix_duplicate_exports(&source))
        .and_then(|fix| write_fix(&path, fix));
      report(path, result)
    })
    .collect();

  Ok(reports)
}

/// Repair names re-exported by more than one `.js` file under `dir`.
///
/// Files are visited in sorted path order with one set of names shared across
/// all of them, so the first file to export a name keeps it and later files
/// lose it. Only suitable for output where every file is loaded into the same
/// scope. A failing file contributes no names and does not stop the pass.
#[tracing::instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub fn fix_duplicate_exports_across_directory(
  dir: &Path,
) -> anyhow::Result<Vec<ExportFixReport>> {
  let mut seen = HashSet::new();

  let reports = collect_js_files(dir)?
    .into_iter()
    .map(|path| {
      let result = std::fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|source| {
          let mut file_seen = seen.clone();
          let fix = fix_duplicate_exports_with_seen(&source, &mut file_seen)?;
          seen = file_seen;
          Ok(fix)
        })
        .and_then(|fix| write_fix(&path, fix));
      report(path, result)
    })
    .collect();

  Ok(reports)
}
