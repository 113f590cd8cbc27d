use serde::{Deserialize, Serialize};

/// Default cap on call arguments, matching the engine-wide variadic limit.
pub const DEFAULT_MAX_ARGUMENTS: usize = 255;

/// Default cap on nested calls, set literals and lambdas.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    pub max_depth: usize,
    pub max_arguments: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_arguments: DEFAULT_MAX_ARGUMENTS,
        }
    }
}
