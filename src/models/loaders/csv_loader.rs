use crate::error::{AppError, AppResult};
use crate::models::outcome::{InputRow, Outcome};
use std::path::Path;
use tokio::fs;

/// 结果文件的表头
const OUTCOME_HEADER: [&str; 3] = ["topic", "status", "error"];

/// 从 CSV 文件读取所有输入行
///
/// 文件需带 `subject,topic` 表头，多余的列会被忽略，字段值保持原样（不做 trim）。
///
/// # 错误
/// - 文件不存在或无法读取：`AppError::FileSystem`
/// - 内容格式错误（包括未闭合的引号字段）：`AppError::Parse`
pub async fn read_rows(path: impl AsRef<Path>) -> AppResult<Vec<InputRow>> {
    let path = path.as_ref();
    let path_display = path.display().to_string();

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_system(&path_display, e))?;

    // 合法 CSV 中引号总是成对出现（转义引号为 ""），奇数说明有未闭合的字段
    if content.matches('"').count() % 2 != 0 {
        return Err(AppError::parse(&path_display, "存在未闭合的引号字段"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::None)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<InputRow>().enumerate() {
        let row = record.map_err(|e| AppError::parse(&path_display, format!("第 {} 行: {}", index + 1, e)))?;
        rows.push(row);
    }

    tracing::debug!("从 {} 读取到 {} 行", path_display, rows.len());
    Ok(rows)
}

/// 将处理结果写入 CSV 文件
///
/// 即使没有任何结果也会写出表头；父目录不存在时自动创建。
pub async fn write_outcomes(path: impl AsRef<Path>, outcomes: &[Outcome]) -> AppResult<()> {
    let path = path.as_ref();
    let path_display = path.display().to_string();

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer
        .write_record(OUTCOME_HEADER)
        .map_err(|e| AppError::file_system(&path_display, e))?;
    for outcome in outcomes {
        writer
            .write_record([
                outcome.topic.as_str(),
                outcome.status.as_str(),
                outcome.error.as_deref().unwrap_or(""),
            ])
            .map_err(|e| AppError::file_system(&path_display, e))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::file_system(&path_display, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::file_system(parent.display().to_string(), e))?;
    }

    fs::write(path, bytes)
        .await
        .map_err(|e| AppError::file_system(&path_display, e))?;

    Ok(())
}
