//! 源语言与目标语言扁平表的差异计算

use serde::{Deserialize, Serialize};

use super::flatten::FlatKeyMap;

/// 目标语言中一个键的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// 目标中不存在
    Missing,
    /// 存在但为空白
    Empty,
    /// 已有译文
    Translated,
}

/// 单个键的检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInspection {
    pub key: String,
    pub source: String,
    pub target: Option<String>,
    pub status: EntryStatus,
}

/// 需要翻译的键
///
/// 非强制模式下是源中有而目标中没有的键；强制模式下是全部源键。
pub fn keys_to_translate<'a>(
    source: &'a FlatKeyMap,
    target: &FlatKeyMap,
    force: bool,
) -> Vec<(&'a str, &'a str)> {
    source
        .iter()
        .filter(|(key, _)| force || !target.contains_key(*key))
        .map(|(key, text)| (key.as_str(), text.as_str()))
        .collect()
}

pub fn count_missing(source: &FlatKeyMap, target: &FlatKeyMap, force: bool) -> usize {
    if force {
        source.len()
    } else {
        source.keys().filter(|key| !target.contains_key(*key)).count()
    }
}

/// 按目标状态对每个源键分类
pub fn inspect(source: &FlatKeyMap, target: &FlatKeyMap) -> Vec<EntryInspection> {
    source
        .iter()
        .map(|(key, text)| {
            let existing = target.get(key);
            let status = match existing {
                None => EntryStatus::Missing,
                Some(value) if value.trim().is_empty() => EntryStatus::Empty,
                Some(_) => EntryStatus::Translated,
            };
            EntryInspection {
                key: key.clone(),
                source: text.clone(),
                target: existing.cloned(),
                status,
            }
        })
        .collect()
}
