//! 语言文件处理管道
//!
//! 提供文件收集、键的扁平化与展开，以及源与目标之间的差异计算

pub mod collector;
pub mod diff;
pub mod flatten;

// 重新导出主要类型
pub use collector::{discover, locales_in, FileFormat, LocaleFile};
pub use diff::{count_missing, inspect, keys_to_translate, EntryInspection, EntryStatus};
pub use flatten::{expand, flatten, get_path, set_path, FlatKeyMap};
