// ==========================================
// 工单系统 - 数据清洗器
// ==========================================
// 职责: NULL 标准化 / HTML 清洗 / 数值与日期解析 / 单位与分类识别
// 红线: 纯函数，不访问数据库
// ==========================================

use crate::domain::types::ServiceType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// 大于该值的纯数字按 UNIX 秒解析
const UNIX_TIMESTAMP_THRESHOLD: i64 = 100_000_000;

/// 默认计量单位
pub const DEFAULT_UNIT: &str = "шт";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Excel 序列日期的有效范围（1900-01-01 .. 9999-12-31）
const EXCEL_SERIAL_RANGE: std::ops::RangeInclusive<f64> = 1.0..=2_958_465.0;

pub struct DataCleaner;

impl DataCleaner {
    /// NULL 标准化：空串 / 纯空白 / "NULL" 视为缺失
    pub fn non_null(value: &str) -> Option<&str> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NULL") {
            None
        } else {
            Some(trimmed)
        }
    }

    pub fn non_null_owned(value: &str) -> Option<String> {
        Self::non_null(value).map(str::to_string)
    }

    /// 评论正文清洗
    ///
    /// - `<br>` / `</p>` 转换为换行，其余标签去除
    /// - 解码常见 HTML 实体
    pub fn clean_comment_html(text: &str) -> String {
        let stripped = strip_tags(text, |tag| match tag {
            "br" | "br/" | "/p" => "\n",
            _ => "",
        });
        decode_entities(&stripped).trim().to_string()
    }

    /// 工单正文清洗
    ///
    /// - 字面量 `\n` 还原为换行
    /// - 去除所有标签、解码实体、合并空白
    pub fn clean_body(text: &str) -> String {
        let unescaped = text.replace("\\n", "\n");
        let stripped = strip_tags(&unescaped, |_| "");
        collapse_whitespace(&decode_entities(&stripped))
    }

    /// 解析带本地化格式的数字
    ///
    /// 规则:
    /// - 去除空格与不换行空格
    /// - 同时存在逗号与点时，靠后的一个是小数点
    /// - 只有逗号时，逗号是小数点
    pub fn parse_number(value: &str) -> Option<f64> {
        let mut cleaned: String = value
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\u{00A0}')
            .collect();
        if cleaned.is_empty() {
            return None;
        }

        let last_comma = cleaned.rfind(',');
        let last_dot = cleaned.rfind('.');
        cleaned = match (last_comma, last_dot) {
            (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replacen(',', ".", 1),
            (Some(_), Some(_)) => cleaned.replace(',', ""),
            (Some(_), None) => cleaned.replacen(',', ".", 1),
            _ => cleaned,
        };

        cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// 计量单位标准化
    pub fn normalize_unit(unit: Option<&str>) -> String {
        let raw = match unit.and_then(Self::non_null) {
            Some(u) => u,
            None => return DEFAULT_UNIT.to_string(),
        };
        let normalized = raw.to_lowercase();

        // “компл” 含 “м”，需先于 “м” 判断
        let canonical = if normalized.contains("шт") {
            "шт"
        } else if normalized.contains("мм") {
            "мм"
        } else if normalized.contains("компл") {
            "компл"
        } else if normalized.contains("рул") {
            "рул"
        } else if normalized.contains("бух") {
            "бухта"
        } else if normalized.contains("уп") {
            "уп"
        } else if normalized.contains("кг") {
            "кг"
        } else if normalized.contains('л') {
            "л"
        } else if normalized.contains('м') {
            "м"
        } else {
            return raw.to_string();
        };

        canonical.to_string()
    }

    /// 按物料名称识别分类
    pub fn detect_category(name: &str) -> Option<&'static str> {
        let lower = name.to_lowercase();
        let has_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has_any(&["кабель", "витая пара", "utp", "ftp"]) {
            Some("кабель")
        } else if has_any(&["разъем", "разъём", "rj45", "вилка", "розетка", "keystone"]) {
            Some("разъём")
        } else if has_any(&["короб", "канал", "лоток"]) {
            Some("короб")
        } else if has_any(&["саморез", "дюбель", "скоба", "стяжка", "хомут", "гвоздь"]) {
            Some("крепёж")
        } else if has_any(&["коммутатор", "switch", "роутер", "router", "медиаконвертер"]) {
            Some("оборудование")
        } else if has_any(&["sfp", "патчкорд", "патч-корд", "шнур"]) {
            Some("оптика")
        } else if has_any(&["муфта", "бокс", "шкаф"]) {
            Some("монтаж")
        } else if has_any(&["инструмент", "отвертка", "кримпер", "тестер"]) {
            Some("инструмент")
        } else {
            None
        }
    }

    /// 解析旧系统时间字段（UNIX 秒或日期时间文本）
    pub fn parse_legacy_datetime(value: &str) -> Option<DateTime<Utc>> {
        let value = Self::non_null(value)?;

        if let Ok(seconds) = value.parse::<i64>() {
            if seconds > UNIX_TIMESTAMP_THRESHOLD {
                return Utc.timestamp_opt(seconds, 0).single();
            }
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }

        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
                return Some(Utc.from_utc_datetime(&dt));
            }
        }

        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
                return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
            }
        }

        None
    }

    /// 节点编码清洗: 去掉超链接残留等杂字符，只保留字母、数字、`_` 与 `-`
    pub fn clean_node_code(value: &str) -> Option<String> {
        let cleaned: String = value
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    /// 节点创建日期
    ///
    /// 依次尝试:
    /// - 文本中任意位置的 `DD.MM.YYYY`
    /// - Excel 序列日期（以 1899-12-30 为第 0 天）
    /// - 旧系统时间格式
    pub fn parse_node_date(value: &str) -> Option<NaiveDate> {
        let value = Self::non_null(value)?;

        if let Some(date) = find_dotted_date(value) {
            return Some(date);
        }

        if let Ok(serial) = value.parse::<f64>() {
            if !EXCEL_SERIAL_RANGE.contains(&serial) {
                return None;
            }
            let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
            return epoch.checked_add_days(chrono::Days::new(serial.trunc() as u64));
        }

        Self::parse_legacy_datetime(value).map(|dt| dt.date_naive())
    }

    /// 旧系统的工单类型文本 -> 服务类型
    pub fn map_service_type(value: &str) -> ServiceType {
        let normalized = value.trim().to_lowercase();
        if ["домашн", "квартир", "дом"].iter().any(|n| normalized.contains(n)) {
            ServiceType::Apartment
        } else if ["офис", "юр"].iter().any(|n| normalized.contains(n)) {
            ServiceType::Office
        } else if ["скс", "сеть"].iter().any(|n| normalized.contains(n)) {
            ServiceType::Scs
        } else {
            ServiceType::Apartment
        }
    }
}

/// 扫描第一个形如 `DD.MM.YYYY` 的片段
fn find_dotted_date(value: &str) -> Option<NaiveDate> {
    let chars: Vec<char> = value.chars().collect();
    chars.windows(10).find_map(|w| {
        let shape_ok = w.iter().enumerate().all(|(i, c)| match i {
            2 | 5 => *c == '.',
            _ => c.is_ascii_digit(),
        });
        if !shape_ok {
            return None;
        }
        let token: String = w.iter().collect();
        NaiveDate::parse_from_str(&token, "%d.%m.%Y").ok()
    })
}

/// 去除 `<...>` 标签，标签由 `replace` 决定替换内容（参数为小写、去空白后的标签名）
fn strip_tags(text: &str, replace: impl Fn(&str) -> &'static str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start + 1..].find('>') else {
            break;
        };
        out.push_str(&rest[..start]);

        let inner = &rest[start + 1..start + 1 + len];
        let tag: String = inner
            .split_whitespace()
            .collect::<String>()
            .to_lowercase();
        if inner.is_empty() {
            out.push_str("<>");
        } else {
            out.push_str(replace(&tag));
        }
        rest = &rest[start + len + 2..];
    }

    out.push_str(rest);
    out
}

fn decode_entities(text: &str) -> String {
    const ENTITIES: &[(&str, &str)] = &[
        ("&nbsp;", " "),
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
    ];

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'outer: while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        for (entity, replacement) in ENTITIES {
            if rest[pos..].starts_with(entity) {
                out.push_str(replacement);
                rest = &rest[pos + entity.len()..];
                continue 'outer;
            }
        }
        out.push('&');
        rest = &rest[pos + 1..];
    }
    out.push_str(rest);
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
