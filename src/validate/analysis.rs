//! Call-graph analysis: shading targets do not support recursion, so any
//! call cycle is rejected during validation.

use std::collections::BTreeMap;

use super::Validator;
use crate::diagnostic::CompileError;

impl Validator {
    /// DFS over the call graph collected while validating bodies; reports
    /// the first cycle found.
    pub(super) fn check_recursion(&self) -> Result<(), CompileError> {
        // 0 = unvisited, 1 = in-stack, 2 = done
        let mut state: BTreeMap<u32, u8> = BTreeMap::new();
        for index in self.call_graph.keys() {
            state.insert(*index, 0);
        }

        for index in self.call_graph.keys() {
            if state[index] == 0 {
                let mut path = Vec::new();
                if self.dfs_cycle(*index, &mut state, &mut path) {
                    let names: Vec<&str> = path
                        .iter()
                        .map(|i| self.functions[i].name.as_str())
                        .collect();
                    return Err(CompileError::semantic(format!(
                        "recursive call cycle detected: {}",
                        names.join(" -> ")
                    ))
                    .with_help("shader stages cannot recurse; restructure into loops"));
                }
            }
        }
        Ok(())
    }

    fn dfs_cycle(&self, node: u32, state: &mut BTreeMap<u32, u8>, path: &mut Vec<u32>) -> bool {
        state.insert(node, 1);
        path.push(node);

        if let Some(callees) = self.call_graph.get(&node) {
            for callee in callees {
                let s = state.get(callee).copied().unwrap_or(2);
                if s == 1 {
                    path.push(*callee);
                    return true;
                }
                if s == 0 && self.dfs_cycle(*callee, state, path) {
                    return true;
                }
            }
        }

        path.pop();
        state.insert(node, 2);
        false
    }
}
