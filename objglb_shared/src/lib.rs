pub mod aabb;

pub use chrono;
pub use crossbeam_channel;
pub use float_cmp;
pub use indoc;
pub use itertools;
pub use log;
pub use nalgebra;
pub use pathdiff;
pub use rayon;
pub use serde_json;
pub use serde_yaml;
pub use thiserror;
pub use walkdir;

/// Name of the function this macro is called in
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        &name[..name.len() - 3]
    }};
}
