pub mod build;
pub mod check;
pub mod hash;
pub mod view;

use std::collections::BTreeMap;
use std::path::Path;
use std::process;

use glint::validate::Module;

/// Read and validate a `.gsb` module, exiting with a rendered error when
/// anything is wrong with it.
pub fn load_module_or_exit(path: &Path) -> Module {
    if !path.extension().is_some_and(|e| e == "gsb") {
        eprintln!("error: input must be a .gsb shader module");
        process::exit(1);
    }
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            process::exit(1);
        }
    };
    match glint::load_module(&bytes) {
        Ok(module) => module,
        Err(e) => {
            e.render();
            process::exit(1);
        }
    }
}

/// Parse repeated `NAME=VALUE` option flags into the writer option map.
pub fn parse_option_values(raw: &[String]) -> BTreeMap<String, u64> {
    let mut options = BTreeMap::new();
    for entry in raw {
        let Some((name, value)) = entry.split_once('=') else {
            eprintln!("error: option '{}' is not of the form NAME=VALUE", entry);
            process::exit(1);
        };
        let Ok(value) = value.parse::<u64>() else {
            eprintln!("error: option '{}' has a non-numeric value", entry);
            process::exit(1);
        };
        options.insert(name.to_string(), value);
    }
    options
}

/// Parse a `MAJOR.MINOR` OpenGL version argument.
pub fn parse_gl_version(raw: &str) -> (u32, u32) {
    let parsed = raw
        .split_once('.')
        .and_then(|(major, minor)| Some((major.parse().ok()?, minor.parse().ok()?)));
    match parsed {
        Some(version) => version,
        None => {
            eprintln!("error: '{}' is not a MAJOR.MINOR version", raw);
            process::exit(1);
        }
    }
}
