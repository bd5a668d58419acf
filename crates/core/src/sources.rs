//! Source texts and resolution of compiler-reported paths.

use crate::lines::{LineColumn, LineIndex};
use alloy_primitives::map::HashMap;
use sourcetrace_config::PathStrategy;
use std::{borrow::Cow, collections::BTreeMap};

/// A source text together with its line table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    text: String,
    lines: LineIndex,
}

impl SourceFile {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = LineIndex::new(&text);
        Self { text, lines }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn line_column(&self, offset: usize) -> LineColumn {
        self.lines.line_column(offset)
    }
}

/// The source texts available for a contract, keyed by path.
///
/// Compilers refer to sources by numeric id. The id of a source is its position in the
/// `source_list`; if there is no list, every id refers to the owning `default_path`, or to the
/// only file if there is exactly one.
#[derive(Clone, Debug, Default)]
pub struct SourceFiles {
    files: BTreeMap<String, SourceFile>,
    source_list: Vec<String>,
    default_path: Option<String>,
}

impl SourceFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set from `(path, text)` pairs.
    pub fn from_sources<P, T>(sources: impl IntoIterator<Item = (P, T)>) -> Self
    where
        P: Into<String>,
        T: Into<String>,
    {
        let mut files = Self::new();
        for (path, text) in sources {
            files.insert(path, text);
        }
        files
    }

    /// Sets the compiler's source list, where the position of a path is its source id.
    pub fn with_source_list(mut self, source_list: Vec<String>) -> Self {
        self.source_list = source_list;
        self
    }

    /// Sets the path of the file that owns the source map.
    pub fn with_default_path(mut self, path: impl Into<String>) -> Self {
        self.default_path = Some(path.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), SourceFile::new(text));
    }

    pub fn get(&self, path: &str) -> Option<&SourceFile> {
        self.files.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceFile)> {
        self.files.iter().map(|(path, file)| (path.as_str(), file))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn default_path(&self) -> Option<&str> {
        self.default_path.as_deref()
    }

    /// Returns the path the compiler reports for `source_index`.
    pub fn reported_path(&self, source_index: u32) -> Option<&str> {
        if !self.source_list.is_empty() {
            return self.source_list.get(source_index as usize).map(String::as_str);
        }
        self.default_path.as_deref().or_else(|| match self.files.len() {
            1 => self.paths().next(),
            _ => None,
        })
    }

    /// Finds the key of the file a compiler-reported path refers to.
    ///
    /// Each strategy is tried in order against every file; the first match wins.
    pub fn resolve_path(&self, reported: &str, strategies: &[PathStrategy]) -> Option<&str> {
        strategies.iter().find_map(|&strategy| {
            self.paths().find(|path| path_matches(strategy, reported, path))
        })
    }

    /// Returns a resolver that memoizes resolution per source id.
    pub fn resolver<'a>(&'a self, strategies: &'a [PathStrategy]) -> PathResolver<'a> {
        PathResolver { files: self, strategies, cache: HashMap::default() }
    }
}

/// Resolves source ids to file keys, remembering earlier answers.
#[derive(Debug)]
pub struct PathResolver<'a> {
    files: &'a SourceFiles,
    strategies: &'a [PathStrategy],
    cache: HashMap<u32, Option<&'a str>>,
}

impl<'a> PathResolver<'a> {
    /// Returns the key of the file with the given source id, if any file matches.
    pub fn resolve(&mut self, source_index: u32) -> Option<&'a str> {
        let (files, strategies) = (self.files, self.strategies);
        *self.cache.entry(source_index).or_insert_with(|| {
            let Some(reported) = files.reported_path(source_index) else {
                debug!(source_index, "no path known for source id");
                return None;
            };
            let resolved = files.resolve_path(reported, strategies);
            match resolved {
                Some(path) => trace!(source_index, reported, path, "resolved source path"),
                None => debug!(source_index, reported, "no local file matches source path"),
            }
            resolved
        })
    }

    /// Returns the file with the given source id along with its key.
    pub fn file(&mut self, source_index: u32) -> Option<(&'a str, &'a SourceFile)> {
        let path = self.resolve(source_index)?;
        self.files.get(path).map(|file| (path, file))
    }
}

fn path_matches(strategy: PathStrategy, reported: &str, key: &str) -> bool {
    let (reported, key) = (normalize(reported), normalize(key));
    match strategy {
        PathStrategy::Exact => reported == key,
        PathStrategy::Basename => basename(&reported) == basename(&key),
        PathStrategy::Stem => stem(&reported) == stem(&key),
        PathStrategy::Prefix => {
            let (a, b) = (stem(&reported), stem(&key));
            !a.is_empty() && !b.is_empty() && (a.starts_with(b) || b.starts_with(a))
        }
    }
}

/// Uses forward slashes and drops any leading `./`.
fn normalize(path: &str) -> Cow<'_, str> {
    let path = if path.contains('\\') { Cow::Owned(path.replace('\\', "/")) } else { path.into() };
    match path {
        Cow::Borrowed(path) => Cow::Borrowed(path.trim_start_matches("./")),
        Cow::Owned(path) => Cow::Owned(path.trim_start_matches("./").to_string()),
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn stem(path: &str) -> &str {
    let name = basename(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}
