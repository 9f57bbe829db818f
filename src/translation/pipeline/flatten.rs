//! 嵌套键值树与点路径扁平表之间的转换

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// 点路径键到原文的映射
pub type FlatKeyMap = BTreeMap<String, String>;

/// 把嵌套对象展开成点路径扁平表
///
/// 只收集字符串叶子；数字、布尔值、数组等不参与翻译。
pub fn flatten(tree: &Value) -> FlatKeyMap {
    let mut flat = FlatKeyMap::new();
    flatten_into(tree, "", &mut flat);
    flat
}

fn flatten_into(value: &Value, prefix: &str, flat: &mut FlatKeyMap) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(child, &path, flat);
            }
        }
        Value::String(text) if !prefix.is_empty() => {
            flat.insert(prefix.to_string(), text.clone());
        }
        _ => {}
    }
}

/// 把扁平表还原成嵌套对象
pub fn expand(flat: &FlatKeyMap) -> Value {
    let mut tree = Value::Object(Map::new());
    for (key, text) in flat {
        set_path(&mut tree, key, Value::String(text.clone()));
    }
    tree
}

/// 按点路径写入值，缺失或非对象的中间节点会被替换成对象
pub fn set_path(tree: &mut Value, key: &str, value: Value) {
    let mut node = tree;
    let mut segments = key.split('.').peekable();

    while let Some(segment) = segments.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return;
        };

        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }

        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// 按点路径读取值
pub fn get_path<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(tree, |node, segment| node.as_object()?.get(segment))
}
