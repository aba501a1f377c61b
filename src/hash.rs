//! Content hashing for compiled shader modules.
//!
//! BLAKE3 over the serialized byte stream; consumers use the digest as a
//! pipeline-cache key, and `glint hash` prints it.

use std::collections::BTreeMap;

use crate::ast::Statement;
use crate::serialize::serialize_shader;
use crate::validate::Module;

/// Hash of a serialized module byte stream.
pub fn module_hash(bytes: &[u8]) -> blake3::Hash {
    blake3::hash(bytes)
}

/// Per-function content hashes, keyed by function name. Each function's
/// subtree is serialized on its own, so an unchanged function keeps its
/// hash when its neighbors change.
pub fn function_hashes(module: &Module) -> BTreeMap<String, blake3::Hash> {
    let mut hashes = BTreeMap::new();
    collect(&module.root, &mut hashes);
    hashes
}

fn collect(stmt: &Statement, hashes: &mut BTreeMap<String, blake3::Hash>) {
    match stmt {
        Statement::DeclareFunction(func) => {
            let bytes = serialize_shader(&Statement::DeclareFunction(func.clone()));
            hashes.insert(func.name.clone(), blake3::hash(&bytes));
        }
        Statement::Multi(statements) => {
            for statement in statements {
                collect(statement, hashes);
            }
        }
        Statement::Conditional { statement, .. } => collect(statement, hashes),
        _ => {}
    }
}

/// Short display form: first eight bytes of the hex digest.
pub fn short_hash(hash: &blake3::Hash) -> String {
    hash.to_hex()[..16].to_string()
}
