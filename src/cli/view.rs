use std::path::Path;

use glint::ast::find_attribute;
use glint::ast::AttributeKind;

use super::load_module_or_exit;

/// Print a readable summary of a module's declarations.
pub fn run(input: &Path) {
    let module = load_module_or_exit(input);

    println!("module {}", input.display());

    if !module.structs.is_empty() {
        println!("\nstructs:");
        for (index, desc) in &module.structs {
            println!("  #{} {}", index, desc.name);
            for member in &desc.members {
                let mut notes = Vec::new();
                if let Some(attr) = find_attribute(&member.attributes, AttributeKind::Builtin) {
                    if let Some(name) = attr.as_str() {
                        notes.push(format!("builtin({})", name));
                    }
                }
                if let Some(attr) = find_attribute(&member.attributes, AttributeKind::Location) {
                    if let Some(slot) = attr.as_int() {
                        notes.push(format!("location({})", slot));
                    }
                }
                let notes = if notes.is_empty() {
                    String::new()
                } else {
                    format!("  [{}]", notes.join(", "))
                };
                println!("    {}: {}{}", member.name, member.ty, notes);
            }
        }
    }

    if !module.externals.is_empty() {
        println!("\nexternals:");
        for (index, external) in &module.externals {
            let binding = find_attribute(&external.attributes, AttributeKind::Binding)
                .and_then(|a| a.as_int())
                .map(|b| format!(" binding({})", b))
                .unwrap_or_default();
            println!("  #{} {}: {}{}", index, external.name, external.ty, binding);
        }
    }

    if !module.functions.is_empty() {
        println!("\nfunctions:");
        for (index, func) in &module.functions {
            let params: Vec<String> = func
                .parameters
                .iter()
                .map(|p| format!("{}: {}", p.name, p.ty))
                .collect();
            let entry = func
                .entry_stage
                .map(|stage| format!("  [entry: {}]", stage))
                .unwrap_or_default();
            println!(
                "  #{} fn {}({}) -> {}{}",
                index,
                func.name,
                params.join(", "),
                func.return_type,
                entry
            );
        }
    }

    println!("\n{} variable slot(s)", module.variable_count);
}
