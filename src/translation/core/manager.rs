//! 翻译管理器
//!
//! 遍历语言根目录，对每个文件比较源语言与目标语言的扁平表，
//! 通过执行器翻译缺失的键并写回目标文件，同时汇总每个文件的统计和报告。
//!
//! 任意一个键在所有服务上都失败时，整次运行立即中止；
//! 之前已经写完的文件保持不变，失败的文件不写入。

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::performer::{TranslationOutput, TranslationPerformer, TranslationRequest};
use super::stats::{FileRunStats, FileStats, ReportEntry, ServiceStatsSnapshot, Totals};
use crate::translation::config::{constants, TranslatorConfig};
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::pipeline::{self, collector, diff, EntryInspection, FileFormat, LocaleFile};
use crate::translation::providers::ProviderRegistry;
use crate::translation::storage::{CacheStats, ReportStore, RunReport, TranslationCache};

/// 进度回调：(文件, 键, 源文本)，在翻译每个键之前调用
pub type ProgressFn<'a> = &'a mut (dyn FnMut(&str, &str, &str) + Send);

/// 翻译选项
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// 只翻译不写文件
    pub dry_run: bool,
    /// 翻译全部源键，而不仅是缺失的键
    pub force: bool,
    /// 优先使用的服务
    pub provider: Option<String>,
    /// 审阅模式，隐含 dry_run
    pub review: bool,
}

impl TranslateOptions {
    pub fn is_dry_run(&self) -> bool {
        self.dry_run || self.review
    }
}

/// 审阅模式下单个键的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub source: String,
    pub translation: String,
    pub provider: String,
    pub cache: bool,
    pub degraded: bool,
}

/// 单个文件的翻译结果
#[derive(Debug, Clone)]
pub struct FileTranslation {
    pub file: FileStats,
    pub preview: BTreeMap<String, String>,
    pub reviews: BTreeMap<String, ReviewItem>,
    pub stats: FileRunStats,
    pub report: ReportEntry,
}

/// 一次 `translate` 调用的汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranslationSummary {
    pub files: Vec<FileStats>,
    pub totals: Totals,
    /// 文件 → 键 → 译文，只在预演（`dry_run` 或 `review`）时填充；
    /// 实际写入文件的运行不保留译文预览
    pub previews: BTreeMap<String, BTreeMap<String, String>>,
    /// 只在 `review` 时填充
    pub reviews: BTreeMap<String, BTreeMap<String, ReviewItem>>,
    pub report: Vec<ReportEntry>,
}

impl TranslationSummary {
    fn push(&mut self, result: FileTranslation, review: bool) {
        self.totals.missing += result.file.missing;
        self.totals.translated += result.file.translated;

        if !result.preview.is_empty() {
            self.previews.insert(result.file.name.clone(), result.preview);
        }
        if review && !result.reviews.is_empty() {
            self.reviews.insert(result.file.name.clone(), result.reviews);
        }

        self.report.push(result.report);
        self.files.push(result.file);
    }
}

/// 某个文件的条目视图
#[derive(Debug, Clone, Serialize)]
pub struct FileInspection {
    pub file: String,
    pub entries: Vec<EntryInspection>,
}

/// 对外 HTTP 接口的单段文本翻译结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextTranslation {
    pub translation: String,
    pub provider: String,
    pub cache_hit: bool,
    pub duration_ms: f64,
}

/// 服务连通性检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderCheck {
    pub ok: bool,
    pub message: String,
}

/// 管理器统计
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    pub service: ServiceStatsSnapshot,
    pub cache: CacheStats,
}

/// 翻译管理器
#[derive(Debug, Clone)]
pub struct TranslationManager {
    config: TranslatorConfig,
    roots: Vec<PathBuf>,
    performer: TranslationPerformer,
    reports: Option<ReportStore>,
}

impl TranslationManager {
    /// 按配置创建管理器：构建服务表和缓存，解析语言根目录
    pub fn new(config: TranslatorConfig) -> TranslationResult<Self> {
        config.validate()?;
        let registry = ProviderRegistry::from_config(&config)?;
        let cache = TranslationCache::from_settings(&config.cache, &config.cache_path())?;
        Ok(Self::with_parts(config, registry, cache))
    }

    /// 使用现成的服务表和缓存创建管理器
    pub fn with_parts(
        config: TranslatorConfig,
        registry: ProviderRegistry,
        cache: TranslationCache,
    ) -> Self {
        let roots = resolve_roots(&config);
        tracing::debug!("语言根目录: {:?}", roots);

        Self {
            config,
            roots,
            performer: TranslationPerformer::new(registry, cache),
            reports: None,
        }
    }

    /// 每次 `translate` 完成后写入运行报告
    pub fn with_reports(mut self, reports: ReportStore) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn performer(&self) -> &TranslationPerformer {
        &self.performer
    }

    // ========================================================================
    // 批量翻译
    // ========================================================================

    /// 把源语言中缺失的键翻译到目标语言
    pub async fn translate(
        &self,
        from: &str,
        to: &str,
        mut progress: Option<ProgressFn<'_>>,
        options: &TranslateOptions,
    ) -> TranslationResult<TranslationSummary> {
        let order = self.provider_order(options.provider.as_deref());
        let files = self.discover(from)?;
        tracing::info!(
            "开始翻译 {} → {}: {} 个文件, 服务顺序 {:?}",
            from,
            to,
            files.len(),
            order
        );

        let mut summary = TranslationSummary::default();
        for file in &files {
            let result = self
                .translate_unit(file, from, to, &order, options, reborrow(&mut progress))
                .await
                .map_err(|e| attach_completed(e, &summary.files))?;
            summary.push(result, options.review);
        }

        tracing::info!(
            "翻译完成 {} → {}: 缺失 {}, 已翻译 {}",
            from,
            to,
            summary.totals.missing,
            summary.totals.translated
        );

        if !options.is_dry_run() {
            self.append_report(from, to, options.provider.as_deref(), summary.report.clone(), Some("sync"))?;
        }

        Ok(summary)
    }

    /// 统计需要翻译的键数量，不调用任何服务
    pub fn count_missing(&self, from: &str, to: &str, force: bool) -> TranslationResult<usize> {
        let mut total = 0;
        for file in self.discover(from)? {
            let source = pipeline::flatten(&file.read(from)?);
            let target = pipeline::flatten(&file.read(to)?);
            total += diff::count_missing(&source, &target, force);
        }
        Ok(total)
    }

    /// 每个文件中每个源键在目标语言中的状态
    pub fn inspect_missing(&self, from: &str, to: &str) -> TranslationResult<Vec<FileInspection>> {
        self.discover(from)?
            .iter()
            .map(|file| {
                Ok(FileInspection {
                    file: self.display_name(&file.path_for(to)),
                    entries: self.inspect_file(file, from, to)?,
                })
            })
            .collect()
    }

    /// 单个文件的条目视图
    pub fn file_entries(&self, from: &str, to: &str, name: &str) -> TranslationResult<Vec<EntryInspection>> {
        let file = self.resolve_file(name, from, to)?;
        self.inspect_file(&file, from, to)
    }

    fn inspect_file(&self, file: &LocaleFile, from: &str, to: &str) -> TranslationResult<Vec<EntryInspection>> {
        let source = pipeline::flatten(&file.read(from)?);
        let target = pipeline::flatten(&file.read(to)?);
        Ok(diff::inspect(&source, &target))
    }

    // ========================================================================
    // 单文件与单键操作
    // ========================================================================

    /// 翻译单个文件
    pub async fn translate_file(
        &self,
        file: &LocaleFile,
        from: &str,
        to: &str,
        progress: Option<ProgressFn<'_>>,
        options: &TranslateOptions,
    ) -> TranslationResult<FileTranslation> {
        let order = self.provider_order(options.provider.as_deref());
        self.translate_unit(file, from, to, &order, options, progress).await
    }

    /// 按文件名翻译单个文件
    pub async fn translate_path(
        &self,
        name: &str,
        from: &str,
        to: &str,
        progress: Option<ProgressFn<'_>>,
        options: &TranslateOptions,
    ) -> TranslationResult<FileTranslation> {
        let file = self.resolve_file(name, from, to)?;
        self.translate_file(&file, from, to, progress, options).await
    }

    /// 翻译单个键并写入目标文件；`force` 时先删除该文本的缓存
    pub async fn translate_entry(
        &self,
        name: &str,
        key: &str,
        from: &str,
        to: &str,
        provider: Option<&str>,
        force: bool,
    ) -> TranslationResult<TranslationOutput> {
        let file = self.resolve_file(name, from, to)?;
        let source = pipeline::flatten(&file.read(from)?);
        let text = source.get(key).ok_or_else(|| TranslationError::KeyNotFound {
            file: file.name_for(from),
            key: key.to_string(),
        })?;

        let order = self.provider_order(provider);
        if force {
            self.performer.forget(text, from, to, &order);
        }

        let output = self
            .performer
            .perform(TranslationRequest {
                text,
                from,
                to,
                providers: &order,
            })
            .await?;
        self.performer.stats().inc_keys_translated();

        self.write_entry(&file, to, key, &output.translation)?;
        tracing::info!("已翻译 {} 中的 {} (服务 {})", file.name_for(to), key, output.provider);
        Ok(output)
    }

    /// 手动写入一条译文
    pub fn update_translation_entry(
        &self,
        from: &str,
        to: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> TranslationResult<()> {
        let file = self.resolve_file(name, from, to)?;
        self.write_entry(&file, to, key, value)?;
        tracing::info!("已更新 {} 中的 {}", file.name_for(to), key);
        Ok(())
    }

    /// 翻译一段文本，不涉及文件
    pub async fn translate_text(
        &self,
        text: &str,
        from: &str,
        to: &str,
        provider: Option<&str>,
    ) -> TranslationResult<TextTranslation> {
        if text.trim().is_empty() {
            return Err(helpers::validation_error("文本不能为空"));
        }

        let order = self.provider_order(provider);
        let output = self
            .performer
            .perform(TranslationRequest {
                text,
                from,
                to,
                providers: &order,
            })
            .await?;

        Ok(TextTranslation {
            translation: output.translation,
            provider: output.provider,
            cache_hit: output.cache_hit,
            duration_ms: (output.duration_secs * 1000.0 * 100.0).round() / 100.0,
        })
    }

    /// 只用指定服务翻译 "ping"，检查凭据与连通性
    pub async fn test_provider(&self, name: &str) -> ProviderCheck {
        let Some(provider) = self.performer.registry().get(name) else {
            return ProviderCheck {
                ok: false,
                message: format!("未注册的翻译服务: {}", name),
            };
        };

        match provider.translate("ping", None, Some("en")).await {
            Ok(reply) => ProviderCheck {
                ok: true,
                message: format!("{} 可用: {}", name, reply),
            },
            Err(e) => {
                tracing::warn!("服务检查失败: {}", e);
                ProviderCheck {
                    ok: false,
                    message: e.to_string(),
                }
            }
        }
    }

    // ========================================================================
    // 查询
    // ========================================================================

    pub fn available_providers(&self) -> Vec<String> {
        self.performer.registry().names()
    }

    /// 所有根目录中出现过的语言
    pub fn available_locales(&self) -> TranslationResult<BTreeSet<String>> {
        let mut locales = BTreeSet::new();
        for root in &self.roots {
            locales.extend(collector::locales_in(root)?);
        }
        Ok(locales)
    }

    /// 源语言下的全部文件，在处理前一次性确定
    pub fn discover(&self, from: &str) -> TranslationResult<Vec<LocaleFile>> {
        let mut files = Vec::new();
        for root in &self.roots {
            files.extend(collector::discover(root, from)?);
        }
        Ok(files)
    }

    /// 按名称查找文件，名称可以是源语言或目标语言下的文件名
    pub fn resolve_file(&self, name: &str, from: &str, to: &str) -> TranslationResult<LocaleFile> {
        let name = name.trim_start_matches('/');
        self.discover(from)?
            .into_iter()
            .find(|file| file.matches(name, from) || file.matches(name, to))
            .ok_or_else(|| helpers::validation_error(format!("找不到语言文件: {}", name)))
    }

    pub fn clear_cache(&self) -> TranslationResult<()> {
        self.performer.cache().clear()
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            service: self.performer.stats().snapshot(),
            cache: self.performer.cache().stats(),
        }
    }

    /// 调用方指定的服务优先，其次默认服务和回退列表
    pub fn provider_order(&self, requested: Option<&str>) -> Vec<String> {
        self.performer.resolve_provider_order(
            requested,
            &self.config.provider,
            &self.config.fallback_order,
        )
    }

    /// 写入运行报告；未配置报告存储时跳过
    pub fn append_report(
        &self,
        from: &str,
        to: &str,
        provider: Option<&str>,
        files: Vec<ReportEntry>,
        context: Option<&str>,
    ) -> TranslationResult<Option<RunReport>> {
        match &self.reports {
            Some(reports) => reports
                .append_translation_run(from, to, provider, files, context)
                .map(Some),
            None => Ok(None),
        }
    }

    // ========================================================================
    // 内部实现
    // ========================================================================

    async fn translate_unit(
        &self,
        file: &LocaleFile,
        from: &str,
        to: &str,
        order: &[String],
        options: &TranslateOptions,
        mut progress: Option<ProgressFn<'_>>,
    ) -> TranslationResult<FileTranslation> {
        let dry_run = options.is_dry_run();
        let target_path = file.path_for(to);
        let name = self.display_name(&target_path);

        let source = pipeline::flatten(&file.read(from)?);
        let mut target_tree = file.read(to)?;
        let target = pipeline::flatten(&target_tree);

        let missing = diff::count_missing(&source, &target, false);
        let keys = diff::keys_to_translate(&source, &target, options.force);

        let mut stats = FileRunStats::default();
        let mut preview = BTreeMap::new();
        let mut reviews = BTreeMap::new();
        let mut translated = 0;

        for (key, text) in keys {
            if let Some(callback) = progress.as_deref_mut() {
                callback(&name, key, text);
            }

            let output = self
                .performer
                .perform(TranslationRequest {
                    text,
                    from,
                    to,
                    providers: order,
                })
                .await
                .map_err(|e| {
                    tracing::error!("{} 中的键 {} 翻译失败: {}", name, key, e);
                    TranslationError::KeyFailed {
                        file: name.clone(),
                        key: key.to_string(),
                        completed: Vec::new(),
                        source: Box::new(e),
                    }
                })?;

            stats.record(&output.provider, output.cache_hit, output.degraded, output.duration());
            self.performer.stats().inc_keys_translated();

            if options.review {
                reviews.insert(
                    key.to_string(),
                    ReviewItem {
                        source: text.to_string(),
                        translation: output.translation.clone(),
                        provider: output.provider.clone(),
                        cache: output.cache_hit,
                        degraded: output.degraded,
                    },
                );
            }

            if dry_run {
                preview.insert(key.to_string(), output.translation);
            } else {
                apply_entry(&mut target_tree, file.format, key, output.translation);
            }
            translated += 1;
        }

        if !dry_run {
            if translated > 0 {
                file.write(to, &target_tree)?;
                tracing::info!("已写入 {}: {} 个键", name, translated);
            } else if self.config.auto_create_missing_files && !target_path.exists() {
                collector::initialize(&target_path, file.format)?;
                tracing::info!("已创建空的目标文件 {}", name);
            }
        }

        let report = stats.report_entry(&name, translated, missing);
        Ok(FileTranslation {
            file: FileStats {
                name,
                missing,
                translated,
            },
            preview,
            reviews,
            stats,
            report,
        })
    }

    fn write_entry(&self, file: &LocaleFile, to: &str, key: &str, value: &str) -> TranslationResult<()> {
        let mut tree = file.read(to)?;
        apply_entry(&mut tree, file.format, key, value.to_string());
        file.write(to, &tree)
    }

    /// 相对于项目根目录的路径，用于统计和报告
    fn display_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.config.base_path)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// 扁平文件直接写顶层键，结构化文件按点路径写入，保留其他非字符串节点
fn apply_entry(tree: &mut Value, format: FileFormat, key: &str, value: String) {
    if format.is_flat() {
        if let Some(object) = tree.as_object_mut() {
            object.insert(key.to_string(), Value::String(value));
            return;
        }
    }
    pipeline::set_path(tree, key, Value::String(value));
}

fn reborrow<'a>(progress: &'a mut Option<ProgressFn<'_>>) -> Option<ProgressFn<'a>> {
    match progress {
        Some(callback) => {
            let callback: ProgressFn<'a> = &mut **callback;
            Some(callback)
        }
        None => None,
    }
}

fn attach_completed(error: TranslationError, completed: &[FileStats]) -> TranslationError {
    match error {
        TranslationError::KeyFailed {
            file, key, source, ..
        } => TranslationError::KeyFailed {
            file,
            key,
            completed: completed.to_vec(),
            source,
        },
        other => other,
    }
}

/// 解析语言根目录：展开通配符，只保留目录，去重并保持顺序
pub fn resolve_roots(config: &TranslatorConfig) -> Vec<PathBuf> {
    let candidates: Vec<PathBuf> = if config.paths.is_empty() {
        vec![default_language_root(&config.base_path)]
    } else {
        config
            .paths
            .iter()
            .map(|p| config.resolve_path(Path::new(shellexpand::tilde(p).as_ref())))
            .collect()
    };

    let mut roots: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        for root in expand_pattern(&candidate) {
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
    }
    roots
}

/// 优先 `<base>/lang`，其次 `<base>/resources/lang`，都不存在时返回前者
fn default_language_root(base: &Path) -> PathBuf {
    constants::LANGUAGE_ROOTS
        .iter()
        .map(|root| base.join(root))
        .find(|path| path.is_dir())
        .unwrap_or_else(|| base.join(constants::LANGUAGE_ROOTS[0]))
}

fn expand_pattern(path: &Path) -> Vec<PathBuf> {
    let raw = path.to_string_lossy();
    if !raw.contains(['*', '?', '[']) {
        return vec![path.to_path_buf()];
    }

    match glob::glob(&raw) {
        Ok(paths) => {
            let mut dirs: Vec<PathBuf> = paths.filter_map(Result::ok).filter(|p| p.is_dir()).collect();
            dirs.sort();
            dirs
        }
        Err(e) => {
            tracing::warn!("无效的路径模式 {}: {}", raw, e);
            Vec::new()
        }
    }
}
