//! 题库服务：加载静态题目、归一化时间戳、按分类和 id 查询。
//!
//! 只读模式下写操作一律返回 `NotSupported`；接入快照存储后支持
//! 新建、更新和删除，每次写操作整体读取并写回一次快照。

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use utils_common::{CatalogDocument, Category, Question, QuestionDraft, QuestionPatch, QuestionRecord};

use crate::error::{CatalogError, Result};
use crate::logging;
use crate::models::CatalogBundle;
use crate::store::SnapshotStore;

/// 时间来源
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 控制器使用的只读查询接口
pub trait QuestionLookup {
    /// 按 id 查找题目
    fn find_question(&self, id: &str) -> Option<Question>;
    /// 某分类下的全部题目
    fn questions_in(&self, category: Category) -> Vec<Question>;
}

/// 题库服务
pub struct QuestionCatalog {
    sources: Vec<QuestionRecord>,
    store: Option<Box<dyn SnapshotStore>>,
    clock: Box<dyn Clock>,
}

impl QuestionCatalog {
    /// 由已按顺序拼接好的源记录创建只读题库
    pub fn new(sources: Vec<QuestionRecord>) -> Self {
        let catalog = Self {
            sources,
            store: None,
            clock: Box::new(SystemClock),
        };

        let duplicates = catalog.duplicate_ids();
        if !duplicates.is_empty() {
            logging::warn(&format!("题库中存在重复的题目 id，查询时只取第一条: {}", duplicates.join(", ")));
        }

        catalog
    }

    /// 解析一个或多个 `{"questions": [...]}` 文档，按给定顺序拼接
    pub fn from_documents(documents: &[&str]) -> Result<Self> {
        let mut sources = Vec::new();
        for (i, document) in documents.iter().enumerate() {
            let parsed: CatalogDocument = serde_json::from_str(document)
                .map_err(|e| CatalogError::Parse(format!("第 {} 个题目文档解析失败: {}", i + 1, e)))?;
            sources.extend(parsed.questions);
        }
        Ok(Self::new(sources))
    }

    /// 加载构建工具生成的压缩打包
    pub fn from_bundle(data: &[u8]) -> Result<Self> {
        let bundle: CatalogBundle = utils_common::from_compressed(data)
            .map_err(|e| CatalogError::Parse(format!("解析题库打包失败: {}", e)))?;
        logging::log(&format!(
            "已加载题库打包: {} 道题目，来源 {}",
            bundle.questions.len(),
            bundle.sources.join(", ")
        ));
        Ok(Self::new(bundle.questions))
    }

    /// 替换时间来源
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 接入快照存储，切换为可写模式并立即用静态数据播种快照
    pub fn with_store(mut self, store: Box<dyn SnapshotStore>) -> Result<Self> {
        self.store = Some(store);
        self.seed_store()?;
        Ok(self)
    }

    /// 是否为可写模式
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// 静态数据中出现多次的 id，按首次重复的顺序
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for record in &self.sources {
            if !seen.insert(record.id.as_str()) && !duplicates.contains(&record.id) {
                duplicates.push(record.id.clone());
            }
        }
        duplicates
    }

    /// 全部题目，顺序与源数据拼接顺序一致
    pub fn list_all(&self) -> Vec<Question> {
        if self.store.is_none() {
            return self.static_questions(self.clock.now(), &[]);
        }

        match self.read_snapshot() {
            Ok(Some(questions)) => questions,
            Ok(None) => self.static_questions(self.clock.now(), &[]),
            Err(e) => {
                logging::warn(&format!("读取题库快照失败，回退到静态数据: {}", e));
                self.static_questions(self.clock.now(), &[])
            }
        }
    }

    /// 指定分类下的题目，保持相对顺序；没有匹配时返回空列表
    pub fn list_by_category(&self, category: Category) -> Vec<Question> {
        self.list_all()
            .into_iter()
            .filter(|q| q.category == category)
            .collect()
    }

    /// 按 id 查找，返回第一条匹配
    pub fn get_by_id(&self, id: &str) -> Option<Question> {
        self.list_all().into_iter().find(|q| q.id == id)
    }

    /// 新建题目：分配新 id，两个时间戳都取当前时间
    pub fn create(&mut self, draft: QuestionDraft) -> Result<Question> {
        if self.store.is_none() {
            return Err(CatalogError::NotSupported("create"));
        }

        let now = self.clock.now();
        let mut questions = self.current_questions(now)?;
        let id = fresh_id(&questions, now);
        let question = draft.into_question(id, now);

        questions.push(question.clone());
        self.write_snapshot(&questions)?;

        logging::log(&format!("已新建题目 {}", question.id));
        Ok(question)
    }

    /// 更新题目：合并提供的字段并刷新 `updated_at`
    pub fn update(&mut self, id: &str, patch: QuestionPatch) -> Result<Question> {
        if self.store.is_none() {
            return Err(CatalogError::NotSupported("update"));
        }

        let now = self.clock.now();
        let mut questions = self.current_questions(now)?;
        let question = questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        question.apply_patch(patch, now);
        let updated = question.clone();
        self.write_snapshot(&questions)?;

        Ok(updated)
    }

    /// 删除题目，目标不存在时快照保持不变
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if self.store.is_none() {
            return Err(CatalogError::NotSupported("delete"));
        }

        let now = self.clock.now();
        let mut questions = self.current_questions(now)?;
        let position = questions
            .iter()
            .position(|q| q.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        questions.remove(position);
        self.write_snapshot(&questions)
    }

    // 静态数据归一化；缓存中同 id 记录的时间戳优先于 `now`
    fn static_questions(&self, now: DateTime<Utc>, cached: &[Question]) -> Vec<Question> {
        self.sources
            .iter()
            .map(|record| record.normalize_with(now, cached.iter().find(|q| q.id == record.id)))
            .collect()
    }

    // 播种：静态数据覆盖缓存中的同 id 记录，用户新建的记录排在后面
    fn seed_store(&mut self) -> Result<()> {
        let cached = match self.read_snapshot() {
            Ok(cached) => cached.unwrap_or_default(),
            Err(e) => {
                logging::warn(&format!("丢弃无法解析的题库快照: {}", e));
                Vec::new()
            }
        };

        let mut merged = self.static_questions(self.clock.now(), &cached);
        let static_ids: HashSet<String> = self.sources.iter().map(|r| r.id.clone()).collect();
        merged.extend(cached.into_iter().filter(|q| !static_ids.contains(&q.id)));

        logging::log(&format!("题库快照已播种: {} 道题目", merged.len()));
        self.write_snapshot(&merged)
    }

    fn current_questions(&self, now: DateTime<Utc>) -> Result<Vec<Question>> {
        Ok(match self.read_snapshot()? {
            Some(questions) => questions,
            None => self.static_questions(now, &[]),
        })
    }

    fn read_snapshot(&self) -> Result<Option<Vec<Question>>> {
        let store = match &self.store {
            Some(store) => store,
            None => return Ok(None),
        };

        match store.load()? {
            Some(snapshot) => serde_json::from_str(&snapshot)
                .map(Some)
                .map_err(|e| CatalogError::Parse(format!("题库快照格式错误: {}", e))),
            None => Ok(None),
        }
    }

    fn write_snapshot(&mut self, questions: &[Question]) -> Result<()> {
        let snapshot = serde_json::to_string(questions)
            .map_err(|e| CatalogError::Parse(format!("序列化题库快照失败: {}", e)))?;

        match self.store.as_mut() {
            Some(store) => store.save(&snapshot),
            None => Err(CatalogError::NotSupported("save")),
        }
    }
}

// 以毫秒时间戳生成 id，冲突时追加序号
fn fresh_id(questions: &[Question], now: DateTime<Utc>) -> String {
    let base = format!("q-{}", now.timestamp_millis());
    let taken = |candidate: &str| questions.iter().any(|q| q.id == candidate);

    if !taken(&base) {
        return base;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

impl QuestionLookup for QuestionCatalog {
    fn find_question(&self, id: &str) -> Option<Question> {
        self.get_by_id(id)
    }

    fn questions_in(&self, category: Category) -> Vec<Question> {
        self.list_by_category(category)
    }
}

impl QuestionLookup for Rc<RefCell<QuestionCatalog>> {
    fn find_question(&self, id: &str) -> Option<Question> {
        self.borrow().get_by_id(id)
    }

    fn questions_in(&self, category: Category) -> Vec<Question> {
        self.borrow().list_by_category(category)
    }
}
