use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// 题目分类 - 固定的三个顶级分组，同时决定所在的标签页
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// 数据结构与算法
    DataStructures,
    /// 低层设计（面向对象设计）
    LowLevelDesign,
    /// 高层设计（分布式系统设计）
    HighLevelDesign,
}

impl Category {
    /// 标签页的固定顺序
    pub const ALL: [Category; 3] = [
        Category::DataStructures,
        Category::LowLevelDesign,
        Category::HighLevelDesign,
    ];

    /// URL、JSON 与数据文件名中使用的标识
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DataStructures => "data-structures",
            Category::LowLevelDesign => "low-level-design",
            Category::HighLevelDesign => "high-level-design",
        }
    }

    /// 标签页标题
    pub fn title(&self) -> &'static str {
        match self {
            Category::DataStructures => "Data Structures",
            Category::LowLevelDesign => "Low Level Design",
            Category::HighLevelDesign => "High Level Design",
        }
    }

    /// 窄屏下的标签缩写
    pub fn short_label(&self) -> &'static str {
        match self {
            Category::DataStructures => "DS",
            Category::LowLevelDesign => "LLD",
            Category::HighLevelDesign => "HLD",
        }
    }

    /// 标签页说明文字
    pub fn description(&self) -> &'static str {
        match self {
            Category::DataStructures => "Practice fundamental data structures and algorithms problems",
            Category::LowLevelDesign => "Design object-oriented systems and solve design problems",
            Category::HighLevelDesign => "Design scalable distributed systems and architectures",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::DataStructures
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("未知的题目分类: {}", s))
    }
}

/// 题目难度
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// 徽章上显示的大写文字
    pub fn label(&self) -> String {
        self.as_str().to_uppercase()
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("未知的题目难度: {}", other)),
        }
    }
}

/// 题目 - 归一化之后的完整记录，以 `id` 为标识
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// 题目唯一标识符
    pub id: String,
    /// 题目标题
    pub title: String,
    /// 题目描述
    pub description: String,
    /// 所属分类
    pub category: Category,
    /// 难度
    pub difficulty: Difficulty,
    /// 标签列表（保留原始顺序用于展示）
    pub tags: Vec<String>,
    /// 参考解答
    #[serde(default)]
    pub solution: Option<String>,
    /// 示例列表
    #[serde(default)]
    pub examples: Option<Vec<String>>,
    /// 代码片段
    #[serde(default)]
    pub code_snippet: Option<String>,
    /// 讲解视频链接（YouTube）
    #[serde(default)]
    pub video: Option<String>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// 题目源记录 - 静态数据文件中的原始形态，时间戳可能缺失
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub examples: Option<Vec<String>>,
    #[serde(default)]
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// 解析数据文件中的时间戳：RFC 3339、不带时区的日期时间（按 UTC）或仅日期（UTC 零点）。
/// 无法识别时返回 None。
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }
    if let Ok(time) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(time.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|time| time.and_utc())
}

// 无法识别的时间戳按缺失处理，不让单条记录拖垮整个文档
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| parse_timestamp(&value)))
}

impl QuestionRecord {
    /// 归一化：缺失的时间戳取调用时刻 `now`
    pub fn normalize(&self, now: DateTime<Utc>) -> Question {
        self.normalize_with(now, None)
    }

    /// 归一化，缺失的时间戳优先沿用 `fallback` 中已有的值
    pub fn normalize_with(&self, now: DateTime<Utc>, fallback: Option<&Question>) -> Question {
        let created_at = self
            .created_at
            .or_else(|| fallback.map(|q| q.created_at))
            .unwrap_or(now);
        let updated_at = self
            .updated_at
            .or_else(|| fallback.map(|q| q.updated_at))
            .unwrap_or(now);

        Question {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category,
            difficulty: self.difficulty,
            tags: self.tags.clone(),
            solution: self.solution.clone(),
            examples: self.examples.clone(),
            code_snippet: self.code_snippet.clone(),
            video: self.video.clone(),
            created_at,
            updated_at,
        }
    }
}

/// 题库数据文档 - 每个 JSON 文件的顶层结构
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CatalogDocument {
    pub questions: Vec<QuestionRecord>,
}

/// 新建题目时提交的数据
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub examples: Option<Vec<String>>,
    #[serde(default)]
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
}

impl QuestionDraft {
    /// 以给定的 id 和时间生成完整题目，两个时间戳相同
    pub fn into_question(self, id: String, now: DateTime<Utc>) -> Question {
        Question {
            id,
            title: self.title,
            description: self.description,
            category: self.category,
            difficulty: self.difficulty,
            tags: self.tags,
            solution: self.solution,
            examples: self.examples,
            code_snippet: self.code_snippet,
            video: self.video,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 更新题目时提交的数据，只覆盖提供了的字段
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub examples: Option<Vec<String>>,
    #[serde(default)]
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
}

impl Question {
    /// 合并更新字段并刷新 `updated_at`，`id` 与 `created_at` 不变
    pub fn apply_patch(&mut self, patch: QuestionPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(difficulty) = patch.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if patch.solution.is_some() {
            self.solution = patch.solution;
        }
        if patch.examples.is_some() {
            self.examples = patch.examples;
        }
        if patch.code_snippet.is_some() {
            self.code_snippet = patch.code_snippet;
        }
        if patch.video.is_some() {
            self.video = patch.video;
        }
        self.updated_at = now;
    }
}
