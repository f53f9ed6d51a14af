//! Candidate instruction-pointer traces for directed execution.

use crate::address::{self, Address};
use crate::error::{Result, SuccError};
use std::fs;
use std::path::Path as FsPath;

pub type PathId = usize;

/// An immutable, non-empty sequence of instruction addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    id: PathId,
    addrs: Vec<Address>,
}

impl Path {
    pub fn new(id: PathId, addrs: Vec<Address>) -> Result<Self> {
        if addrs.is_empty() {
            return Err(SuccError::Paths(format!("path {} is empty", id)));
        }
        Ok(Path { id, addrs })
    }

    pub fn id(&self) -> PathId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn last_address(&self) -> Address {
        // never empty, checked in `new`
        self.addrs[self.addrs.len() - 1]
    }

    /// Address expected at `step`, or `None` once the path is exhausted.
    pub fn get(&self, step: usize) -> Option<Address> {
        self.addrs.get(step).copied()
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addrs
    }
}

/// The candidate paths of one run. Path ids are positions in the set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathSet {
    paths: Vec<Path>,
}

impl PathSet {
    pub fn new(paths: Vec<Vec<Address>>) -> Result<Self> {
        let paths = paths
            .into_iter()
            .enumerate()
            .map(|(id, addrs)| Path::new(id, addrs))
            .collect::<Result<Vec<_>>>()?;
        Ok(PathSet { paths })
    }

    pub fn from_raw(paths: Vec<Vec<u64>>) -> Result<Self> {
        Self::new(
            paths
                .into_iter()
                .map(|p| p.into_iter().map(Address).collect())
                .collect(),
        )
    }

    /// Parse one path per line. Addresses are hex and separated by commas or
    /// whitespace; `#` starts a comment.
    pub fn parse(text: &str) -> Result<Self> {
        let mut paths = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default();
            let addrs = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|tok| !tok.is_empty())
                .map(|tok| {
                    tok.parse::<Address>().map_err(|e| {
                        SuccError::Paths(format!("line {}: '{}' {}", lineno + 1, tok, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if !addrs.is_empty() {
                paths.push(addrs);
            }
        }
        Self::non_empty(Self::new(paths)?)
    }

    /// Parse a JSON array of paths, each an array of hex strings or integers.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let rows = value
            .as_array()
            .ok_or_else(|| SuccError::Paths("expected an array of paths".to_owned()))?;
        let mut paths = Vec::with_capacity(rows.len());
        for (id, row) in rows.iter().enumerate() {
            let items = row
                .as_array()
                .ok_or_else(|| SuccError::Paths(format!("path {} is not an array", id)))?;
            let addrs = items
                .iter()
                .map(|item| match item {
                    serde_json::Value::Number(n) => n
                        .as_u64()
                        .map(Address)
                        .ok_or_else(|| SuccError::Paths(format!("path {}: bad address {}", id, n))),
                    serde_json::Value::String(s) => s
                        .parse::<Address>()
                        .map_err(|e| SuccError::Paths(format!("path {}: '{}' {}", id, s, e))),
                    other => Err(SuccError::Paths(format!("path {}: bad address {}", id, other))),
                })
                .collect::<Result<Vec<_>>>()?;
            paths.push(addrs);
        }
        Self::non_empty(Self::new(paths)?)
    }

    /// Load a path file; `.json` files are read as JSON, anything else as text.
    pub fn load<P: AsRef<FsPath>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let text = fs::read_to_string(file)?;
        match file.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::parse(&text),
        }
    }

    fn non_empty(set: Self) -> Result<Self> {
        if set.is_empty() {
            Err(SuccError::Paths("no paths given".to_owned()))
        } else {
            Ok(set)
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, id: PathId) -> Option<&Path> {
        self.paths.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = PathId> + '_ {
        self.paths.iter().map(|p| p.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter()
    }

    /// Paths ordered by length; equal lengths keep their id order.
    pub fn sorted_by_len(&self) -> Vec<&Path> {
        let mut sorted: Vec<&Path> = self.paths.iter().collect();
        sorted.sort_by_key(|p| p.len());
        sorted
    }

    /// Render every path as a comma separated line.
    pub fn describe(&self) -> Vec<String> {
        self.paths.iter().map(|p| address::join(p.addresses())).collect()
    }
}
