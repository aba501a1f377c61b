use std::path::Path;
use std::process;

use glint::hash::{function_hashes, module_hash, short_hash};

use super::load_module_or_exit;

pub fn run(input: &Path, full: bool) {
    let bytes = match std::fs::read(input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", input.display(), e);
            process::exit(1);
        }
    };
    let module = load_module_or_exit(input);

    let file_hash = module_hash(&bytes);
    if full {
        eprintln!("Module: {} {}", file_hash.to_hex(), input.display());
    } else {
        eprintln!("Module: {} {}", short_hash(&file_hash), input.display());
    }

    for (name, hash) in function_hashes(&module) {
        if full {
            println!("  {} {}", hash.to_hex(), name);
        } else {
            println!("  {} {}", short_hash(&hash), name);
        }
    }
}
