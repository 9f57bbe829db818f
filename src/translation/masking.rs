//! 占位符保护
//!
//! 翻译前把 HTML 标签、`:name` 占位符、`{{ ... }}` 模板插值和 `%s` / `%1$s`
//! 格式符替换成 `__AI_<类别>_<序号>__` 形式的不透明标记，翻译后再还原。
//! 如果译文丢失了任何标记，则放弃译文，把标记还原回原文。

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// 受保护片段的类别，按匹配优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Html,
    Placeholder,
    Blade,
    Format,
}

impl PlaceholderKind {
    fn token_prefix(self) -> &'static str {
        match self {
            PlaceholderKind::Html => "HTML",
            PlaceholderKind::Placeholder => "PLACEHOLDER",
            PlaceholderKind::Blade => "BLADE",
            PlaceholderKind::Format => "FORMAT",
        }
    }
}

static PATTERNS: LazyLock<Vec<(PlaceholderKind, Regex)>> = LazyLock::new(|| {
    [
        (PlaceholderKind::Html, r"</?[A-Za-z][^>]*>"),
        (PlaceholderKind::Placeholder, r":[A-Za-z0-9_\-]+"),
        (PlaceholderKind::Blade, r"(?s)\{\{\s*.*?\s*\}\}"),
        (PlaceholderKind::Format, r"%(?:\d+\$)?s"),
    ]
    .into_iter()
    .filter_map(|(kind, pattern)| match Regex::new(pattern) {
        Ok(regex) => Some((kind, regex)),
        Err(e) => {
            tracing::error!("占位符正则无效 {}: {}", pattern, e);
            None
        }
    })
    .collect()
});

/// 单个被替换的片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedToken {
    pub kind: PlaceholderKind,
    pub token: String,
    pub original: String,
}

/// 屏蔽后的文本及标记表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedText {
    pub normalized: String,
    pub tokens: Vec<MaskedToken>,
}

impl MaskedText {
    pub fn has_placeholders(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// 后生成的标记可能包住先生成的标记，所以倒序替换
    fn substitute(&self, text: &str) -> String {
        self.tokens
            .iter()
            .rev()
            .fold(text.to_string(), |acc, t| acc.replace(&t.token, &t.original))
    }
}

/// 还原结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub text: String,
    /// 译文丢失标记，已退回原文
    pub degraded: bool,
}

/// 屏蔽文本中的受保护片段
///
/// 序号在所有类别间全局递增，先匹配到的类别先编号。
pub fn mask(text: &str) -> MaskedText {
    let mut normalized = text.to_string();
    let mut tokens: Vec<MaskedToken> = Vec::new();

    for (kind, regex) in PATTERNS.iter() {
        if !regex.is_match(&normalized) {
            continue;
        }
        normalized = regex
            .replace_all(&normalized, |caps: &Captures<'_>| {
                let token = format!("__AI_{}_{}__", kind.token_prefix(), tokens.len());
                tokens.push(MaskedToken {
                    kind: *kind,
                    token: token.clone(),
                    original: caps[0].to_string(),
                });
                token
            })
            .into_owned();
    }

    MaskedText { normalized, tokens }
}

/// 把标记还原进译文
pub fn restore(translated: &str, masked: &MaskedText) -> Restored {
    if !masked.has_placeholders() {
        return Restored {
            text: translated.to_string(),
            degraded: false,
        };
    }

    let lost = masked
        .tokens
        .iter()
        .filter(|t| masked.normalized.contains(&t.token))
        .any(|t| !translated.contains(&t.token));

    if lost {
        return Restored {
            text: masked.substitute(&masked.normalized),
            degraded: true,
        };
    }

    Restored {
        text: masked.substitute(translated),
        degraded: false,
    }
}
