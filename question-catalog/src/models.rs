use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utils_common::QuestionRecord;

/// 题库打包 - 由构建工具合并各分类文档后生成
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CatalogBundle {
    /// 打包时间
    pub generated_at: DateTime<Utc>,
    /// 按合并顺序排列的来源文档名
    pub sources: Vec<String>,
    /// 合并后的全部题目（保持文档拼接顺序）
    pub questions: Vec<QuestionRecord>,
    /// 构建时发现的重复 id
    pub duplicate_ids: Vec<String>,
}
