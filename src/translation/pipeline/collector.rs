//! 语言文件收集器
//!
//! 扫描语言根目录，列出某个语言的全部可翻译文件，并负责文件的读写。
//! 支持两种布局：
//!
//! - 结构化目录：`<root>/<locale>/**/*.json` 或 `*.toml`，内容为嵌套对象
//! - 扁平 JSON：`<root>/<locale>.json`，单层对象

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::translation::error::{helpers, TranslationError, TranslationResult};

/// 语言文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// 语言目录下的嵌套 JSON 文件
    TreeJson,
    /// 语言目录下的嵌套 TOML 文件
    TreeToml,
    /// 与语言目录同级的 `<locale>.json`
    FlatJson,
}

impl FileFormat {
    fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(FileFormat::TreeJson),
            "toml" => Some(FileFormat::TreeToml),
            _ => None,
        }
    }

    pub fn is_flat(self) -> bool {
        self == FileFormat::FlatJson
    }

    /// 新建目标文件时写入的内容
    pub fn empty_contents(self) -> &'static str {
        match self {
            FileFormat::TreeJson | FileFormat::FlatJson => "{}\n",
            FileFormat::TreeToml => "",
        }
    }
}

/// 一个可翻译单元
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocaleFile {
    pub root: PathBuf,
    /// 相对于语言目录的路径；扁平文件为空
    pub relative: PathBuf,
    pub format: FileFormat,
}

impl LocaleFile {
    pub fn tree<P: Into<PathBuf>, R: Into<PathBuf>>(root: P, relative: R) -> Option<Self> {
        let relative = relative.into();
        let format = FileFormat::from_extension(&relative)?;
        Some(Self {
            root: root.into(),
            relative,
            format,
        })
    }

    pub fn flat<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            relative: PathBuf::new(),
            format: FileFormat::FlatJson,
        }
    }

    /// 该单元在指定语言下的文件路径
    pub fn path_for(&self, locale: &str) -> PathBuf {
        match self.format {
            FileFormat::FlatJson => self.root.join(format!("{}.json", locale)),
            _ => self.root.join(locale).join(&self.relative),
        }
    }

    /// 面向用户的文件名：结构化文件为语言目录内的相对路径，扁平文件为 `<locale>.json`
    pub fn name_for(&self, locale: &str) -> String {
        match self.format {
            FileFormat::FlatJson => format!("{}.json", locale),
            _ => self.relative.to_string_lossy().replace('\\', "/"),
        }
    }

    pub fn matches(&self, name: &str, locale: &str) -> bool {
        self.name_for(locale) == name
    }

    pub fn read(&self, locale: &str) -> TranslationResult<Value> {
        read_tree(&self.path_for(locale), self.format)
    }

    pub fn write(&self, locale: &str, tree: &Value) -> TranslationResult<()> {
        write_tree(&self.path_for(locale), self.format, tree)
    }
}

/// 列出某个语言在根目录下的全部文件，按文件名排序，扁平文件排在最后
pub fn discover(root: &Path, locale: &str) -> TranslationResult<Vec<LocaleFile>> {
    let mut files = Vec::new();
    let locale_dir = root.join(locale);

    if locale_dir.is_dir() {
        for entry in WalkDir::new(&locale_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| helpers::fs_error(&locale_dir, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&locale_dir) else {
                continue;
            };
            if let Some(file) = LocaleFile::tree(root, relative) {
                files.push(file);
            }
        }
    }

    if root.join(format!("{}.json", locale)).is_file() {
        files.push(LocaleFile::flat(root));
    }

    Ok(files)
}

/// 根目录下出现过的语言：子目录名与 `*.json` 文件名
pub fn locales_in(root: &Path) -> TranslationResult<BTreeSet<String>> {
    let mut locales = BTreeSet::new();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(locales),
        Err(e) => return Err(helpers::fs_error(root, e)),
    };

    for entry in entries {
        let path = entry.map_err(|e| helpers::fs_error(root, e))?.path();
        if path.is_dir() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                locales.insert(name.to_string());
            }
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|n| n.to_str()) {
                locales.insert(stem.to_string());
            }
        }
    }

    Ok(locales)
}

/// 读取语言文件，不存在或为空时返回空对象
pub fn read_tree(path: &Path, format: FileFormat) -> TranslationResult<Value> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let content = fs::read_to_string(path).map_err(|e| helpers::fs_error(path, e))?;
    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value = match format {
        FileFormat::TreeJson | FileFormat::FlatJson => serde_json::from_str::<Value>(&content)
            .map_err(|e| TranslationError::ParseError(format!("{}: {}", path.display(), e)))?,
        FileFormat::TreeToml => {
            let table = toml::from_str::<toml::Table>(&content)
                .map_err(|e| TranslationError::ParseError(format!("{}: {}", path.display(), e)))?;
            serde_json::to_value(table)?
        }
    };

    if !value.is_object() {
        return Err(TranslationError::ParseError(format!(
            "{}: 顶层必须是对象",
            path.display()
        )));
    }

    Ok(value)
}

/// 原子写入语言文件：先写同目录临时文件，再重命名
pub fn write_tree(path: &Path, format: FileFormat, tree: &Value) -> TranslationResult<()> {
    let content = match format {
        FileFormat::TreeJson | FileFormat::FlatJson => {
            let mut json = serde_json::to_string_pretty(tree)?;
            json.push('\n');
            json
        }
        FileFormat::TreeToml => toml::to_string_pretty(tree)?,
    };
    write_atomic(path, &content)
}

/// 创建空的目标文件
pub fn initialize(path: &Path, format: FileFormat) -> TranslationResult<()> {
    write_atomic(path, format.empty_contents())
}

pub(crate) fn write_atomic(path: &Path, content: &str) -> TranslationResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| helpers::fs_error(parent, e))?;

    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(|e| helpers::fs_error(parent, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| helpers::fs_error(path, e))?;
    file.persist(path).map_err(|e| helpers::fs_error(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discover_tree_and_flat_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("en/admin")).unwrap();
        fs::write(root.join("en/messages.json"), "{}").unwrap();
        fs::write(root.join("en/admin/users.toml"), "").unwrap();
        fs::write(root.join("en/notes.txt"), "skip").unwrap();
        fs::write(root.join("en.json"), "{}").unwrap();

        let files = discover(root, "en").unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name_for("en")).collect();
        assert_eq!(names, vec!["admin/users.toml", "messages.json", "en.json"]);
        assert_eq!(files[2].path_for("tr"), root.join("tr.json"));
        assert_eq!(files[1].path_for("tr"), root.join("tr").join("messages.json"));
    }

    #[test]
    fn test_read_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = read_tree(&dir.path().join("nope.json"), FileFormat::TreeJson).unwrap();
        assert_eq!(missing, json!({}));

        let empty = dir.path().join("empty.toml");
        fs::write(&empty, "  \n").unwrap();
        assert_eq!(read_tree(&empty, FileFormat::TreeToml).unwrap(), json!({}));

        let array = dir.path().join("array.json");
        fs::write(&array, "[1, 2]").unwrap();
        assert!(matches!(
            read_tree(&array, FileFormat::TreeJson),
            Err(TranslationError::ParseError(_))
        ));
    }

    #[test]
    fn test_toml_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tr").join("auth.toml");
        let tree = json!({"failed": "Hatalı bilgiler", "throttle": {"short": "Çok fazla deneme"}});

        write_tree(&path, FileFormat::TreeToml, &tree).unwrap();
        assert_eq!(read_tree(&path, FileFormat::TreeToml).unwrap(), tree);
    }

    #[test]
    fn test_json_write_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tr.json");
        write_tree(&path, FileFormat::FlatJson, &json!({"Hello": "Merhaba dünya"})).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("Merhaba dünya"));
        assert!(written.ends_with('\n'));
    }

    #[test]
    fn test_locales_in_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("en")).unwrap();
        fs::create_dir_all(dir.path().join("tr")).unwrap();
        fs::write(dir.path().join("de.json"), "{}").unwrap();

        let locales: Vec<_> = locales_in(dir.path()).unwrap().into_iter().collect();
        assert_eq!(locales, vec!["de", "en", "tr"]);
        assert!(locales_in(&dir.path().join("missing")).unwrap().is_empty());
    }
}
