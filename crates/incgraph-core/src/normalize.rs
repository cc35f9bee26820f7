//! Mapping `#include` spellings onto canonical snapshot paths
//!
//! Oracles and change lists name headers the way they appear in source, either
//! `<vector>` or `"base/files/file.h"`, while the snapshot names every file
//! by its root-relative path. Matching is exact-string membership in the
//! store; there is no fuzzy or suffix fallback.

use crate::graph::GraphStore;
use crate::model::FileId;

pub const LIBCXX_INCLUDE_DIR: &str = "third_party/libc++/src/include";

const SYSROOT_PLACEHOLDER: &str = "{sysroot}";
const SYSROOT_PLATFORM_PLACEHOLDER: &str = "{sysroot-platform}";
const GEN_PLACEHOLDER: &str = "{gen}";

/// Join `relative` onto `base` and fold `.` and `..` components lexically.
pub fn join_path(base: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in base.split('/').chain(relative.split('/')) {
        match component {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Directory portion of a root-relative path.
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn strip_placeholder<'a>(dir: &'a str, placeholder: &str) -> Option<&'a str> {
    dir.strip_prefix(placeholder)
        .map(|rest| rest.trim_start_matches('/'))
}

/// Resolves header spellings against one loaded snapshot.
pub struct HeaderResolver<'a> {
    store: &'a GraphStore,
}

impl<'a> HeaderResolver<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        HeaderResolver { store }
    }

    fn lookup(&self, path: &str) -> Option<FileId> {
        self.store.file_id(path)
    }

    /// Canonical file for `header` as written in `includer`, searching
    /// `include_dirs` in order after the built-in locations.
    pub fn resolve(&self, includer: &str, header: &str, include_dirs: &[String]) -> Option<FileId> {
        if let Some(id) = self.lookup(header) {
            return Some(id);
        }

        let resolved = match header.strip_prefix('<').and_then(|h| h.strip_suffix('>')) {
            Some(system) => self.resolve_system(system, include_dirs),
            None => {
                let quoted = header.trim_matches('"');
                self.lookup(quoted)
                    .or_else(|| self.resolve_quoted(includer, quoted, include_dirs))
            }
        };
        if resolved.is_none() {
            tracing::debug!("Could not resolve include {} from {}", header, includer);
        }
        resolved
    }

    /// Canonical path for `header`, or `None` when unresolvable.
    pub fn resolve_path(&self, includer: &str, header: &str, include_dirs: &[String]) -> Option<&'a str> {
        self.resolve(includer, header, include_dirs)
            .map(|id| self.store.path(id))
    }

    fn resolve_system(&self, header: &str, include_dirs: &[String]) -> Option<FileId> {
        if let Some(id) = self.lookup(&join_path(LIBCXX_INCLUDE_DIR, header)) {
            return Some(id);
        }

        let meta = self.store.meta();
        let sysroot = meta.sysroot.as_deref()?;
        let platform = meta.sysroot_platform.as_deref();

        let usr_include = join_path(sysroot, "usr/include");
        if let Some(id) = self.lookup(&join_path(&usr_include, header)) {
            return Some(id);
        }
        if let Some(platform) = platform {
            if let Some(id) = self.lookup(&join_path(&join_path(&usr_include, platform), header)) {
                return Some(id);
            }
        }

        for dir in include_dirs {
            if let Some(rest) = strip_placeholder(dir, SYSROOT_PLATFORM_PLACEHOLDER) {
                let Some(platform) = platform else { continue };
                for part in ["include", "lib"] {
                    let base = join_path(sysroot, &format!("usr/{part}/{platform}/{rest}"));
                    if let Some(id) = self.lookup(&join_path(&base, header)) {
                        return Some(id);
                    }
                }
            } else if let Some(rest) = strip_placeholder(dir, SYSROOT_PLACEHOLDER) {
                let base = join_path(sysroot, rest);
                if let Some(id) = self.lookup(&join_path(&base, header)) {
                    return Some(id);
                }
            }
        }
        None
    }

    fn resolve_quoted(&self, includer: &str, header: &str, include_dirs: &[String]) -> Option<FileId> {
        if let Some(id) = self.lookup(&join_path(parent_dir(includer), header)) {
            return Some(id);
        }

        let gen_prefix = self.store.meta().gen_prefix.as_deref();
        if let Some(gen_prefix) = gen_prefix {
            if let Some(id) = self.lookup(&join_path(gen_prefix, header)) {
                return Some(id);
            }
        }

        for dir in include_dirs {
            let base = if let Some(rest) = strip_placeholder(dir, GEN_PLACEHOLDER) {
                let Some(gen_prefix) = gen_prefix else { continue };
                join_path(gen_prefix, rest)
            } else if dir.starts_with(SYSROOT_PLACEHOLDER) || dir.starts_with(SYSROOT_PLATFORM_PLACEHOLDER) {
                continue;
            } else {
                dir.clone()
            };
            if let Some(id) = self.lookup(&join_path(&base, header)) {
                return Some(id);
            }
        }
        None
    }
}
