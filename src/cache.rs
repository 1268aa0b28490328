//! Process-wide cache of compiled programs.
//!
//! Keyed by (dialect, pattern source, option bits) and bounded by the total
//! byte size of the cached bytecode. The map is insertion ordered so "evict
//! oldest" is well defined; re-inserting an existing key does not refresh
//! its position.

use crate::api::{Dialect, Flags};
use crate::insn::CompiledProgram;
use indexmap::IndexMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Ceiling on the total bytecode bytes kept in the cache.
pub const MAX_CACHED_BYTECODE_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    dialect: Dialect,
    pattern: String,
    options_bits: u32,
}

#[derive(Default)]
struct ProgramCache {
    entries: IndexMap<CacheKey, Arc<CompiledProgram>>,
    cached_bytecode_size: usize,
}

impl ProgramCache {
    fn lookup(&self, key: &CacheKey) -> Option<Arc<CompiledProgram>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: CacheKey, program: Arc<CompiledProgram>) {
        let byte_size = program.byte_size();
        if byte_size > MAX_CACHED_BYTECODE_SIZE {
            return;
        }

        if let Some(existing) = self.entries.get_mut(&key) {
            self.cached_bytecode_size -= existing.byte_size();
            self.cached_bytecode_size += byte_size;
            *existing = program;
            return;
        }

        while byte_size + self.cached_bytecode_size > MAX_CACHED_BYTECODE_SIZE {
            match self.entries.shift_remove_index(0) {
                Some((_, evicted)) => {
                    self.cached_bytecode_size -= evicted.byte_size();
                    log::debug!("Evicted a cached program to make room");
                }
                None => break,
            }
        }

        self.cached_bytecode_size += byte_size;
        self.entries.insert(key, program);
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.cached_bytecode_size = 0;
    }
}

fn cache() -> &'static Mutex<ProgramCache> {
    static CACHE: OnceLock<Mutex<ProgramCache>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(ProgramCache::default()))
}

fn locked() -> std::sync::MutexGuard<'static, ProgramCache> {
    match cache().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn lookup(
    dialect: Dialect,
    pattern: &str,
    options: Flags,
) -> Option<Arc<CompiledProgram>> {
    let key = CacheKey {
        dialect,
        pattern: pattern.to_string(),
        options_bits: options.bits(),
    };
    let hit = locked().lookup(&key);
    if hit.is_some() {
        log::trace!("Program cache hit for {:?}", pattern);
    }
    hit
}

pub(crate) fn insert(dialect: Dialect, pattern: &str, options: Flags, program: Arc<CompiledProgram>) {
    let key = CacheKey {
        dialect,
        pattern: pattern.to_string(),
        options_bits: options.bits(),
    };
    locked().insert(key, program);
}

/// Drop every cached program.
pub(crate) fn clear() {
    locked().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insn::Insn;
    use crate::Regex;

    fn key(pattern: &str) -> CacheKey {
        CacheKey {
            dialect: Dialect::Ecma262,
            pattern: pattern.to_string(),
            options_bits: 0,
        }
    }

    /// A synthetic program with a controllable byte size.
    fn program_of_insns(count: usize) -> Arc<CompiledProgram> {
        Arc::new(CompiledProgram {
            insns: vec![Insn::Exit; count],
            capture_group_count: 0,
            named_capture_group_count: 0,
            group_names: Box::new([]),
            match_length_minimum: 0,
            checkpoint_count: 0,
            repeat_count: 0,
            starting_ranges: Vec::new(),
            starting_ranges_insensitive: Vec::new(),
            only_start_of_line: false,
            flags: Flags::default(),
            dialect: Dialect::Ecma262,
        })
    }

    fn insns_for_bytes(bytes: usize) -> usize {
        bytes / core::mem::size_of::<Insn>()
    }

    #[test]
    fn evicts_oldest_first() {
        let mut cache = ProgramCache::default();
        let quarter = insns_for_bytes(MAX_CACHED_BYTECODE_SIZE / 4);
        for name in ["a", "b", "c", "d"] {
            cache.insert(key(name), program_of_insns(quarter));
        }
        assert_eq!(cache.entries.len(), 4);

        // A fifth entry pushes out the first.
        cache.insert(key("e"), program_of_insns(quarter));
        assert!(cache.lookup(&key("a")).is_none());
        assert!(cache.lookup(&key("b")).is_some());
        assert!(cache.cached_bytecode_size <= MAX_CACHED_BYTECODE_SIZE);
    }

    #[test]
    fn oversized_entry_is_skipped() {
        let mut cache = ProgramCache::default();
        cache.insert(key("small"), program_of_insns(4));
        cache.insert(
            key("huge"),
            program_of_insns(insns_for_bytes(MAX_CACHED_BYTECODE_SIZE) + 1),
        );
        assert!(cache.lookup(&key("huge")).is_none());
        assert!(cache.lookup(&key("small")).is_some());
    }

    #[test]
    fn reinsertion_does_not_refresh_position() {
        let mut cache = ProgramCache::default();
        let third = insns_for_bytes(MAX_CACHED_BYTECODE_SIZE / 3);
        cache.insert(key("a"), program_of_insns(third));
        cache.insert(key("b"), program_of_insns(third));
        cache.insert(key("a"), program_of_insns(third));

        // "a" is still the oldest entry, so it goes first.
        cache.insert(key("c"), program_of_insns(third));
        cache.insert(key("d"), program_of_insns(third));
        assert!(cache.lookup(&key("a")).is_none());
        assert!(cache.lookup(&key("d")).is_some());
    }

    #[test]
    fn distinct_options_are_distinct_keys() {
        let mut cache = ProgramCache::default();
        let mut insensitive = key("same");
        insensitive.options_bits = Flags::INSENSITIVE.bits();
        cache.insert(key("same"), program_of_insns(2));
        assert!(cache.lookup(&insensitive).is_none());
        assert!(cache.lookup(&key("same")).is_some());
    }

    #[test]
    fn compiling_twice_shares_the_program() {
        // Unique pattern so parallel tests cannot interfere.
        let pattern = "cache_hit_xyzzy_[a-q]+42";
        let first = Regex::new(pattern).unwrap();
        let second = Regex::new(pattern).unwrap();
        assert!(Arc::ptr_eq(&first.program, &second.program));
    }
}
