// ==========================================
// 工单系统 - 表格解析器
// ==========================================
// 支持: TSV (.tsv/.txt) / CSV (.csv) / Excel (.xlsx/.xls)
// 输出: 表头序列 + 惰性记录序列（表头 -> 去空白后的原始字符串）
// 规则:
// - 行长度不足时缺失字段为空字符串，不报错
// - 重复表头直接报告，不静默去重
// - 行号为源文件行号（有表头时首行数据为 2，无表头时为 1）
// - 完全空白的行跳过
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto_from_rs, Reader};
use csv::{ReaderBuilder, StringRecordsIntoIter};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;

/// 无表头模式下自动生成的列名前缀
pub const GENERATED_HEADER_PREFIX: &str = "Колонка";

// ==========================================
// 文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Tsv,
    Csv,
    Spreadsheet,
}

impl TabularFormat {
    /// 根据文件名扩展名判断格式
    pub fn from_file_name(file_name: &str) -> ImportResult<Self> {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "tsv" | "txt" => Ok(TabularFormat::Tsv),
            "csv" => Ok(TabularFormat::Csv),
            "xlsx" | "xls" => Ok(TabularFormat::Spreadsheet),
            _ => Err(ImportError::UnsupportedFormat(file_name.to_string())),
        }
    }

    fn delimiter(&self) -> u8 {
        match self {
            TabularFormat::Csv => b',',
            _ => b'\t',
        }
    }
}

// ==========================================
// RawRecord - 原始记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub row_number: usize,
    pub fields: HashMap<String, String>,
}

impl RawRecord {
    /// 按表头取值（不存在时为空字符串）
    pub fn get(&self, header: &str) -> &str {
        self.fields.get(header).map(String::as_str).unwrap_or("")
    }

    /// 按映射后的表头取值（未映射时为空字符串）
    pub fn get_mapped(&self, header: Option<&str>) -> &str {
        header.map(|h| self.get(h)).unwrap_or("")
    }

    pub fn is_blank(&self) -> bool {
        self.fields.values().all(|v| v.is_empty())
    }
}

// ==========================================
// TabularFile - 上传的表格文件
// ==========================================
#[derive(Debug, Clone)]
pub struct TabularFile {
    name: String,
    bytes: Vec<u8>,
    format: TabularFormat,
    has_header: bool,
}

impl TabularFile {
    /// 按文件名识别格式
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> ImportResult<Self> {
        let name = name.into();
        let format = TabularFormat::from_file_name(&name)?;
        Ok(Self::with_format(name, bytes, format))
    }

    pub fn with_format(name: impl Into<String>, bytes: Vec<u8>, format: TabularFormat) -> Self {
        Self {
            name: name.into(),
            bytes,
            format,
            has_header: true,
        }
    }

    /// 首行作为数据（自动生成“Колонка N”列名）
    pub fn without_headers(mut self) -> Self {
        self.has_header = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> TabularFormat {
        self.format
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    /// 读取表头
    pub fn headers(&self) -> ImportResult<Vec<String>> {
        Ok(self.records()?.headers().to_vec())
    }

    /// 打开惰性记录流
    pub fn records(&self) -> ImportResult<RecordStream<'_>> {
        let mut source = match self.format {
            TabularFormat::Spreadsheet => RowSource::Sheet(read_sheet_rows(&self.bytes)?.into_iter()),
            TabularFormat::Tsv | TabularFormat::Csv => {
                RowSource::Delimited(self.delimited_reader().into_records())
            }
        };

        let (headers, pending) = if self.has_header {
            let (_, header_row) = source
                .next_row()
                .transpose()?
                .ok_or_else(|| ImportError::EmptyInput(self.name.clone()))?;
            let mut headers: Vec<String> = header_row.iter().map(|h| h.trim().to_string()).collect();
            if let Some(first) = headers.first_mut() {
                *first = first.trim_start_matches('\u{feff}').to_string();
            }
            check_duplicate_headers(&headers)?;
            (headers, None)
        } else {
            // 列数取全文件最长行，首行较短时后续行的尾部列不丢失
            let width = match &source {
                RowSource::Sheet(rows) => max_width(rows.as_slice()),
                RowSource::Delimited(_) => self.delimited_width()?,
            };
            let first = source.next_row().transpose()?;
            if width == 0 {
                return Err(ImportError::EmptyInput(self.name.clone()));
            }
            let headers = (1..=width)
                .map(|i| format!("{} {}", GENERATED_HEADER_PREFIX, i))
                .collect();
            (headers, first)
        };

        Ok(RecordStream {
            headers,
            source,
            pending,
        })
    }

    fn delimited_reader(&self) -> csv::Reader<&[u8]> {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(self.format.delimiter())
            .has_headers(false)
            .flexible(true); // 允许行长度不一致
        if self.format == TabularFormat::Tsv {
            // 旧系统导出的 TSV 中常见裸引号
            builder.quoting(false);
        }
        builder.from_reader(self.bytes.as_slice())
    }

    /// 分隔文本的最大列数（独立的一次遍历）
    fn delimited_width(&self) -> ImportResult<usize> {
        self.delimited_reader()
            .into_records()
            .try_fold(0usize, |width, record| -> ImportResult<usize> {
                Ok(width.max(record?.len()))
            })
    }

    /// 统计数据行数（独立的一次遍历，用于确定 total）
    pub fn count_records(&self) -> ImportResult<usize> {
        self.records()?.try_fold(0usize, |count, record| record.map(|_| count + 1))
    }

    /// 预览前 n 行（一次性读取）
    pub fn preview(&self, n: usize) -> ImportResult<Vec<RawRecord>> {
        self.records()?.take(n).collect()
    }
}

/// 检查重复表头（空表头不参与检查）
fn check_duplicate_headers(headers: &[String]) -> ImportResult<()> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for header in headers.iter().filter(|h| !h.is_empty()) {
        if !seen.insert(header.as_str()) && !duplicates.contains(header) {
            duplicates.push(header.clone());
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ImportError::DuplicateHeaders(duplicates))
    }
}

/// 读取第一个工作表的所有行（行号, 单元格文本）
fn read_sheet_rows(bytes: &[u8]) -> ImportResult<Vec<(usize, Vec<String>)>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))??;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let rows = range
        .rows()
        .enumerate()
        .map(|(idx, row)| {
            let values = row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect();
            (first_row + idx + 1, values)
        })
        .collect();

    Ok(rows)
}

/// 工作表各行的最大列数
fn max_width(rows: &[(usize, Vec<String>)]) -> usize {
    rows.iter().map(|(_, values)| values.len()).max().unwrap_or(0)
}

// ==========================================
// RecordStream - 惰性记录流
// ==========================================
enum RowSource<'a> {
    Delimited(StringRecordsIntoIter<&'a [u8]>),
    Sheet(std::vec::IntoIter<(usize, Vec<String>)>),
}

impl RowSource<'_> {
    fn next_row(&mut self) -> Option<ImportResult<(usize, Vec<String>)>> {
        match self {
            RowSource::Delimited(records) => records.next().map(|result| {
                let record = result?;
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or_default();
                Ok((line, record.iter().map(str::to_string).collect()))
            }),
            RowSource::Sheet(rows) => rows.next().map(Ok),
        }
    }

}

pub struct RecordStream<'a> {
    headers: Vec<String>,
    source: RowSource<'a>,
    pending: Option<(usize, Vec<String>)>,
}

impl RecordStream<'_> {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for RecordStream<'_> {
    type Item = ImportResult<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (row_number, values) = match self.pending.take() {
                Some(row) => row,
                None => match self.source.next_row()? {
                    Ok(row) => row,
                    Err(e) => return Some(Err(e)),
                },
            };

            let fields: HashMap<String, String> = self
                .headers
                .iter()
                .enumerate()
                .filter(|(_, header)| !header.is_empty())
                .map(|(idx, header)| {
                    let value = values.get(idx).map(|v| v.trim()).unwrap_or("");
                    (header.clone(), value.to_string())
                })
                .collect();

            let record = RawRecord { row_number, fields };

            // 跳过完全空白的行
            if record.is_blank() {
                continue;
            }

            return Some(Ok(record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tsv(content: &str) -> TabularFile {
        TabularFile::new("orders.tsv", content.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(TabularFormat::from_file_name("a.TSV").unwrap(), TabularFormat::Tsv);
        assert_eq!(TabularFormat::from_file_name("a.txt").unwrap(), TabularFormat::Tsv);
        assert_eq!(TabularFormat::from_file_name("a.csv").unwrap(), TabularFormat::Csv);
        assert_eq!(
            TabularFormat::from_file_name("stock.xlsx").unwrap(),
            TabularFormat::Spreadsheet
        );
        assert!(matches!(
            TabularFormat::from_file_name("a.pdf"),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_short_lines_yield_empty_fields() {
        let file = tsv("nid\tfield_etap_value\tfield_all_fio_value\n1\t1. Новая заявка\n2\n");
        let records: Vec<RawRecord> = file.records().unwrap().map(Result::unwrap).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row_number, 2);
        assert_eq!(records[0].get("field_etap_value"), "1. Новая заявка");
        assert_eq!(records[0].get("field_all_fio_value"), "");
        assert_eq!(records[1].row_number, 3);
        assert_eq!(records[1].get("nid"), "2");
    }

    #[test]
    fn test_values_are_trimmed_and_quotes_kept_in_tsv() {
        let file = tsv("code\tname\n  A-1 \t Кабель \"UTP\" 5e \n");
        let records = file.preview(10).unwrap();
        assert_eq!(records[0].get("code"), "A-1");
        assert_eq!(records[0].get("name"), "Кабель \"UTP\" 5e");
    }

    #[test]
    fn test_csv_quoting() {
        let file =
            TabularFile::new("stock.csv", b"code,name\nA1,\"Patch, 1m\"\n".to_vec()).unwrap();
        let records = file.preview(10).unwrap();
        assert_eq!(records[0].get("name"), "Patch, 1m");
    }

    #[test]
    fn test_duplicate_headers_are_reported() {
        let file = tsv("code\tname\tcode\n1\t2\t3\n");
        match file.records() {
            Err(ImportError::DuplicateHeaders(dups)) => assert_eq!(dups, vec!["code".to_string()]),
            other => panic!("expected duplicate header error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_no_header_mode_generates_names() {
        let file = tsv("A1\tКабель\t10\nA2\tРозетка\t5\n").without_headers();
        let stream = file.records().unwrap();
        assert_eq!(
            stream.headers(),
            &["Колонка 1".to_string(), "Колонка 2".to_string(), "Колонка 3".to_string()]
        );

        let records: Vec<RawRecord> = stream.map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row_number, 1);
        assert_eq!(records[0].get("Колонка 2"), "Кабель");
        assert_eq!(records[1].row_number, 2);
    }

    #[test]
    fn test_no_header_mode_short_first_row_keeps_later_columns() {
        let file = tsv("A1\tКабель\nA2\tРозетка\t5\n").without_headers();
        let stream = file.records().unwrap();
        assert_eq!(stream.headers().len(), 3);

        let records: Vec<RawRecord> = stream.map(Result::unwrap).collect();
        assert_eq!(records[0].get("Колонка 3"), "");
        assert_eq!(records[1].get("Колонка 2"), "Розетка");
        assert_eq!(records[1].get("Колонка 3"), "5");
    }

    #[test]
    fn test_blank_rows_skipped_and_counted_once() {
        let file = tsv("code\tname\nA\tB\n\t\n\nC\tD\n");
        assert_eq!(file.count_records().unwrap(), 2);

        let records = file.preview(10).unwrap();
        assert_eq!(records[1].get("code"), "C");
        assert_eq!(records[1].row_number, 5);
    }

    #[test]
    fn test_empty_file_is_setup_error() {
        let file = tsv("");
        assert!(matches!(file.records(), Err(ImportError::EmptyInput(_))));
    }

    #[test]
    fn test_bom_stripped_from_first_header() {
        let file = TabularFile::new("a.csv", "\u{feff}code,name\n1,2\n".as_bytes().to_vec()).unwrap();
        assert_eq!(file.headers().unwrap()[0], "code");
    }
}
