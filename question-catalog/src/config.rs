use serde::Deserialize;
use utils_common::Category;

/// 题库配置 - 客户端以 JSON 传入，缺省字段使用默认值
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogConfig {
    /// 本地存储中快照所在的键
    pub storage_key: String,
    /// 模拟写操作的网络延迟（毫秒）
    pub mutation_latency_ms: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            storage_key: "interview-questions".to_string(),
            mutation_latency_ms: 300,
        }
    }
}

/// 选择状态控制器配置
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectionConfig {
    /// 携带题目 id 的查询参数名
    pub query_param: String,
    /// 没有选中题目时显示的分类
    pub default_category: Category,
    /// 等待界面渲染后再滚动定位的延迟（毫秒）
    pub reveal_delay_ms: u32,
    /// 高亮保持时间（毫秒）
    pub highlight_ms: u32,
    /// “已复制”提示保持时间（毫秒）
    pub copied_ms: u32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            query_param: "q".to_string(),
            default_category: Category::DataStructures,
            reveal_delay_ms: 100,
            highlight_ms: 2000,
            copied_ms: 2000,
        }
    }
}

impl SelectionConfig {
    /// 从 JSON 字符串解析，空字符串视为全部默认
    pub fn from_json(json: &str) -> Result<Self, String> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| format!("解析选择配置失败: {}", e))
    }
}

impl CatalogConfig {
    /// 从 JSON 字符串解析，空字符串视为全部默认
    pub fn from_json(json: &str) -> Result<Self, String> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| format!("解析题库配置失败: {}", e))
    }
}
