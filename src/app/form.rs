// ==========================================
// 工单系统 - multipart 表单读取
// ==========================================
// 职责: 把 multipart 请求体读成 文件字段 + 文本字段
// 规则:
// - 带 filename 的字段视为文件；空文件视为未提供
// - 文本字段去除首尾空白，空值视为缺失
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::import_api::UploadedFile;
use crate::domain::types::ConflictPolicy;
use crate::importer::error::ImportError;
use axum::extract::Multipart;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MultipartForm {
    files: HashMap<String, UploadedFile>,
    texts: HashMap<String, String>,
}

/// 旧接口的 options 字段
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyImportOptions {
    update_names: Option<bool>,
}

impl MultipartForm {
    /// 读取整个 multipart 请求体
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::InvalidInput(format!("multipart 解析失败: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::InvalidInput(format!("文件读取失败 ({}): {}", name, e)))?;
                    if !bytes.is_empty() {
                        form.files.insert(name, UploadedFile::new(file_name, bytes.to_vec()));
                    }
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidInput(format!("字段读取失败 ({}): {}", name, e)))?;
                    form.texts.insert(name, text);
                }
            }
        }

        tracing::debug!(
            files = ?form.files.keys().collect::<Vec<_>>(),
            fields = ?form.texts.keys().collect::<Vec<_>>(),
            "multipart 表单已读取"
        );
        Ok(form)
    }

    /// 取出文件字段
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// 文本字段（去空白，空值为 None）
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn text_owned(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }

    /// 非负整数字段
    pub fn usize_field(&self, name: &str) -> ApiResult<Option<usize>> {
        self.text(name)
            .map(|raw| {
                raw.parse::<usize>().map_err(|_| {
                    ApiError::from(ImportError::InvalidOption {
                        name: name.to_string(),
                        message: format!("需要非负整数，实际为 \"{}\"", raw),
                    })
                })
            })
            .transpose()
    }

    /// 布尔字段（"true" / "1" 为真）
    pub fn bool_field(&self, name: &str) -> bool {
        matches!(self.text(name), Some(v) if v.eq_ignore_ascii_case("true") || v == "1")
    }

    /// conflictResolution 字段
    pub fn conflict_policy(&self) -> ApiResult<Option<ConflictPolicy>> {
        self.text("conflictResolution")
            .map(|raw| {
                raw.parse::<ConflictPolicy>().map_err(|message| {
                    ApiError::from(ImportError::InvalidOption {
                        name: "conflictResolution".to_string(),
                        message,
                    })
                })
            })
            .transpose()
    }

    /// options 字段中的 updateNames（JSON）
    pub fn update_names(&self) -> ApiResult<Option<bool>> {
        let Some(raw) = self.text("options") else {
            return Ok(None);
        };
        let options: LegacyImportOptions =
            serde_json::from_str(raw).map_err(|e| ImportError::InvalidOption {
                name: "options".to_string(),
                message: e.to_string(),
            })?;
        Ok(options.update_names)
    }
}

#[cfg(test)]
impl MultipartForm {
    pub(crate) fn with_texts(pairs: &[(&str, &str)]) -> Self {
        Self {
            files: HashMap::new(),
            texts: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}
