use std::path::Path;

use super::load_module_or_exit;

/// Deserialize + validate; `load_module_or_exit` already exits with a
/// rendered error on any failure.
pub fn run(input: &Path) {
    let module = load_module_or_exit(input);
    eprintln!(
        "OK: {} ({} function(s), {} struct(s), {} external(s))",
        input.display(),
        module.functions.len(),
        module.structs.len(),
        module.externals.len()
    );
}
