use utils_common::compression::{to_compressed, BUNDLE_VERSION};
use utils_common::{CatalogDocument, QuestionRecord};
use crate::models::CatalogBundle;
use chrono::Utc;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;

/// 题库打包构建器
pub struct CatalogBuilder {
    documents: Vec<(String, CatalogDocument)>,
}

impl CatalogBuilder {
    /// 创建新的题库打包构建器
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
        }
    }

    /// 按顺序添加一个题目文档
    pub fn add_document(&mut self, name: &str, document: CatalogDocument) {
        self.documents.push((name.to_string(), document));
    }

    /// 解析并添加 JSON 文档
    pub fn add_json(&mut self, name: &str, json: &str) -> Result<(), String> {
        let document: CatalogDocument = serde_json::from_str(json)
            .map_err(|e| format!("解析题目文档 {} 失败: {}", name, e))?;
        self.add_document(name, document);
        Ok(())
    }

    /// 已添加的题目数
    pub fn question_count(&self) -> usize {
        self.documents.iter().map(|(_, doc)| doc.questions.len()).sum()
    }

    /// 合并所有文档，保持添加顺序
    pub fn merged_document(&self) -> CatalogDocument {
        CatalogDocument {
            questions: self
                .documents
                .iter()
                .flat_map(|(_, doc)| doc.questions.iter().cloned())
                .collect(),
        }
    }

    /// 构建题库打包
    pub fn build_bundle(&self) -> Result<CatalogBundle, String> {
        if self.question_count() == 0 {
            println!("错误: 无法构建题库，没有题目数据");
            return Err("无法构建题库: 没有题目数据".to_string());
        }

        println!("开始构建题库打包，文档数量: {}, 题目数量: {}",
                 self.documents.len(), self.question_count());

        let questions = self.merged_document().questions;
        let duplicate_ids = find_duplicates(&questions);
        for id in &duplicate_ids {
            println!("警告: 题目 id 重复，查询时只会命中第一条: {}", id);
        }

        Ok(CatalogBundle {
            generated_at: Utc::now(),
            sources: self.documents.iter().map(|(name, _)| name.clone()).collect(),
            questions,
            duplicate_ids,
        })
    }

    /// 保存题库打包到文件
    pub fn save_bundle(&self, path: &str) -> Result<CatalogBundle, String> {
        println!("开始保存题库打包到文件: {}", path);

        let bundle = self.build_bundle()?;
        let compressed = to_compressed(&bundle, BUNDLE_VERSION)
            .map_err(|e| format!("压缩题库打包失败: {}", e))?;

        let mut file = File::create(path)
            .map_err(|e| format!("无法创建题库打包文件: {}", e))?;
        file.write_all(&compressed)
            .map_err(|e| format!("无法写入题库打包文件: {}", e))?;

        println!("题库打包已写入: {}，大小: {} 字节", path, compressed.len());
        Ok(bundle)
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// 按首次重复出现的顺序返回重复 id
fn find_duplicates(questions: &[QuestionRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for question in questions {
        if !seen.insert(question.id.as_str()) && !duplicates.contains(&question.id) {
            duplicates.push(question.id.clone());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{DATA_STRUCTURES, HIGH_LEVEL_DESIGN, LOW_LEVEL_DESIGN};
    use crate::catalog::QuestionCatalog;

    #[test]
    fn empty_builder_is_rejected() {
        assert!(CatalogBuilder::new().build_bundle().is_err());
    }

    #[test]
    fn saved_bundle_loads_into_catalog() {
        let mut builder = CatalogBuilder::new();
        builder.add_json("data-structures", DATA_STRUCTURES).unwrap();
        builder.add_json("low-level-design", LOW_LEVEL_DESIGN).unwrap();
        builder.add_json("high-level-design", HIGH_LEVEL_DESIGN).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.bin");
        let bundle = builder.save_bundle(path.to_str().unwrap()).unwrap();
        assert_eq!(bundle.sources, vec!["data-structures", "low-level-design", "high-level-design"]);
        assert!(bundle.duplicate_ids.is_empty());

        let data = std::fs::read(&path).unwrap();
        let catalog = QuestionCatalog::from_bundle(&data).unwrap();
        let ids: Vec<String> = catalog.list_all().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec!["two-sum", "lru", "42", "url-shortener"]);
    }

    #[test]
    fn duplicates_are_reported() {
        let mut builder = CatalogBuilder::new();
        builder.add_json("a", LOW_LEVEL_DESIGN).unwrap();
        builder.add_json("b", LOW_LEVEL_DESIGN).unwrap();

        let bundle = builder.build_bundle().unwrap();
        assert_eq!(bundle.duplicate_ids, vec!["42".to_string()]);
        assert_eq!(bundle.questions.len(), 2);
    }

    #[test]
    fn invalid_json_names_the_document() {
        let err = CatalogBuilder::new().add_json("broken.json", "[]").unwrap_err();
        assert!(err.contains("broken.json"));
    }
}
