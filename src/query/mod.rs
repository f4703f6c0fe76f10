// Submodules for separation of concerns
mod eval;
mod options;
mod translate;
mod types;

// Public API re-exports
pub use eval::{compare_json, eval_condition, eval_query};
pub use options::{UNSUPPORTED_OPTIONS, check_options, ensure_supported, unsupported_option};
pub use translate::{filter_query, translate, translate_with_logic};
pub use types::{Clause, CmpOp, Condition, Join, Logic, TableQuery, format_literal};
