use std::fs;
use std::path::{Path, PathBuf};
use clap::{Command, Arg, ArgAction};
use walkdir::WalkDir;

use question_catalog::builder::CatalogBuilder;
use utils_common::Category;

// 主函数
fn main() {
    // 设置命令行参数
    let matches = Command::new("题库打包工具")
        .version(env!("CARGO_PKG_VERSION"))
        .about("合并各分类题目文档，生成题库 JSON 与压缩打包")
        .arg(Arg::new("source")
            .short('s')
            .long("source")
            .value_name("SOURCE_DIR")
            .help("题目文档目录路径")
            .required(true))
        .arg(Arg::new("output")
            .short('o')
            .long("output")
            .value_name("OUTPUT_DIR")
            .help("输出目录路径")
            .required(true))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("显示详细信息")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("strict")
            .long("strict")
            .help("发现重复的题目 id 时失败")
            .action(ArgAction::SetTrue))
        .get_matches();

    // 两个参数都是 required，clap 已保证存在
    let source_dir = matches.get_one::<String>("source").map(String::as_str).unwrap_or_default();
    let output_dir = matches.get_one::<String>("output").map(String::as_str).unwrap_or_default();
    let verbose = matches.get_flag("verbose");
    let strict = matches.get_flag("strict");

    let source_path = Path::new(source_dir);
    if !source_path.is_dir() {
        eprintln!("错误: 源目录不存在或不是有效目录 '{}'", source_dir);
        std::process::exit(1);
    }

    let output_path = Path::new(output_dir);
    if !output_path.exists() {
        if let Err(e) = fs::create_dir_all(output_path) {
            eprintln!("错误: 无法创建输出目录 '{}': {}", output_dir, e);
            std::process::exit(1);
        }
    }

    println!("开始生成题库...");
    println!("源目录: {}", source_dir);
    println!("输出目录: {}", output_dir);

    match generate_catalog(source_path, output_path, verbose, strict) {
        Ok(count) => println!("题库生成成功！共 {} 道题目", count),
        Err(e) => {
            eprintln!("错误: 题库生成失败: {}", e);
            std::process::exit(1);
        }
    }
}

// 生成题库，返回题目数量
fn generate_catalog(source_dir: &Path, output_dir: &Path, verbose: bool, strict: bool) -> Result<usize, String> {
    let start_time = std::time::Instant::now();

    println!("扫描题目文档...");
    let documents = scan_documents(source_dir, verbose)?;
    if documents.is_empty() {
        return Err("没有找到题目文档".to_string());
    }

    let mut builder = CatalogBuilder::new();
    for path in &documents {
        let name = document_name(path);
        let json = fs::read_to_string(path)
            .map_err(|e| format!("无法读取文件 {}: {}", path.display(), e))?;
        builder.add_json(&name, &json)?;
        if verbose {
            println!("已添加文档 {}", path.display());
        }
    }

    let bundle = builder.build_bundle()?;
    if strict && !bundle.duplicate_ids.is_empty() {
        return Err(format!("存在重复的题目 id: {}", bundle.duplicate_ids.join(", ")));
    }

    // 合并后的单文件 JSON
    let merged = serde_json::to_string_pretty(&builder.merged_document())
        .map_err(|e| format!("序列化题库失败: {}", e))?;
    let json_path = output_dir.join("questions.json");
    fs::write(&json_path, merged)
        .map_err(|e| format!("无法写入 {}: {}", json_path.display(), e))?;

    let bundle_path = output_dir.join("catalog.bin");
    builder.save_bundle(&bundle_path.to_string_lossy())?;

    println!("题库生成完成！耗时: {:.2}秒", start_time.elapsed().as_secs_f32());
    Ok(bundle.questions.len())
}

// 递归查找 JSON 文档，并按固定顺序排列
fn scan_documents(dir_path: &Path, verbose: bool) -> Result<Vec<PathBuf>, String> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(dir_path) {
        let entry = entry.map_err(|e| format!("遍历目录时出错: {}", e))?;

        if !entry.file_type().is_file() || !entry.path().extension().map_or(false, |ext| ext == "json") {
            continue;
        }
        documents.push(entry.into_path());
    }

    documents.sort_by_key(|path| (document_rank(path), document_name(path)));

    if verbose {
        println!("找到 {} 个题目文档", documents.len());
    }
    Ok(documents)
}

fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// 分类文档按标签页顺序排在前面，其余按文件名
fn document_rank(path: &Path) -> usize {
    let name = document_name(path);
    Category::ALL
        .iter()
        .position(|c| c.as_str() == name)
        .unwrap_or(Category::ALL.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, category: &str) -> String {
        format!(
            r#"{{"id": "{}", "title": "T{}", "description": "d", "category": "{}", "difficulty": "easy", "tags": []}}"#,
            id, id, category
        )
    }

    fn write_doc(dir: &Path, file: &str, questions: &[String]) {
        let json = format!(r#"{{"questions": [{}]}}"#, questions.join(","));
        fs::write(dir.join(file), json).unwrap();
    }

    #[test]
    fn category_documents_come_first() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["extra.json", "high-level-design.json", "data-structures.json", "low-level-design.json"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let names: Vec<String> = scan_documents(dir.path(), false)
            .unwrap()
            .iter()
            .map(|p| document_name(p))
            .collect();
        assert_eq!(names, vec!["data-structures", "low-level-design", "high-level-design", "extra"]);
    }

    #[test]
    fn writes_json_and_bundle() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_doc(source.path(), "low-level-design.json", &[question("42", "low-level-design")]);
        write_doc(source.path(), "data-structures.json", &[question("1", "data-structures")]);

        let count = generate_catalog(source.path(), output.path(), false, false).unwrap();
        assert_eq!(count, 2);

        let merged = fs::read_to_string(output.path().join("questions.json")).unwrap();
        assert!(merged.find("\"1\"").unwrap() < merged.find("\"42\"").unwrap());

        let data = fs::read(output.path().join("catalog.bin")).unwrap();
        let catalog = question_catalog::QuestionCatalog::from_bundle(&data).unwrap();
        assert_eq!(catalog.get_by_id("42").unwrap().category, Category::LowLevelDesign);
    }

    #[test]
    fn strict_mode_rejects_duplicates() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_doc(source.path(), "data-structures.json", &[question("1", "data-structures")]);
        write_doc(source.path(), "high-level-design.json", &[question("1", "high-level-design")]);

        assert!(generate_catalog(source.path(), output.path(), false, false).is_ok());
        let err = generate_catalog(source.path(), output.path(), false, true).unwrap_err();
        assert!(err.contains('1'));
    }

    #[test]
    fn empty_source_fails() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        assert!(generate_catalog(source.path(), output.path(), false, false).is_err());
    }
}
