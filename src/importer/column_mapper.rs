// ==========================================
// 工单系统 - 列映射器
// ==========================================
// 职责: 目标字段 <- 源表头 的映射（自动识别 + 人工覆盖 + 必填校验）
// 规则:
// - 自动识别: 按字段声明顺序，依次扫描表头，取第一个“小写后包含任一同义词”的表头
// - 已被某字段占用的表头不再复用
// - 校验: 必填字段必须映射，且映射的表头必须存在于文件中
// ==========================================

use crate::domain::types::SourceType;
use crate::importer::error::{ImportError, ImportResult};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// 目标字段定义
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    /// 自动识别用的同义词（小写子串）
    pub synonyms: &'static [&'static str],
    /// 旧系统导出文件中的固定列名
    pub default_header: Option<&'static str>,
}

impl FieldSpec {
    const fn new(name: &'static str, required: bool, synonyms: &'static [&'static str]) -> Self {
        Self {
            name,
            required,
            synonyms,
            default_header: None,
        }
    }

    const fn legacy(name: &'static str, required: bool, header: &'static str) -> Self {
        Self {
            name,
            required,
            synonyms: &[],
            default_header: Some(header),
        }
    }
}

// ==========================================
// ColumnMapping Trait
// ==========================================
pub trait ColumnMapping: Default + Clone + Send + 'static {
    /// 对应的导入来源
    const SOURCE: SourceType;

    /// 目标字段定义（声明顺序即自动识别顺序）
    fn field_specs() -> &'static [FieldSpec];

    /// 读取某字段映射的表头
    fn header_for(&self, field: &str) -> Option<&str>;

    /// 设置某字段映射的表头
    fn assign(&mut self, field: &str, header: Option<String>);

    /// 旧系统固定列名构成的映射
    fn legacy_default() -> Self {
        let mut mapping = Self::default();
        for spec in Self::field_specs() {
            if let Some(header) = spec.default_header {
                mapping.assign(spec.name, Some(header.to_string()));
            }
        }
        mapping
    }

    /// 按同义词自动识别
    fn auto_detect(headers: &[String]) -> Self {
        let mut mapping = Self::default();
        let mut used: HashSet<&str> = HashSet::new();

        for spec in Self::field_specs() {
            let found = headers.iter().find(|header| {
                if header.is_empty() || used.contains(header.as_str()) {
                    return false;
                }
                let lower = header.to_lowercase();
                spec.synonyms.iter().any(|syn| lower.contains(syn))
            });

            if let Some(header) = found {
                used.insert(header.as_str());
                mapping.assign(spec.name, Some(header.clone()));
            }
        }

        mapping
    }

    /// 以 base 为基础，用 JSON 对象 `{field: header}` 覆盖（空字符串表示取消映射）
    fn from_json_over(base: Self, raw: &str) -> ImportResult<Self> {
        let overrides: HashMap<String, Option<String>> = serde_json::from_str(raw)
            .map_err(|e| ImportError::InvalidColumnMapping(e.to_string()))?;

        let mut mapping = base;
        for spec in Self::field_specs() {
            if let Some(value) = overrides.get(spec.name) {
                let header = value
                    .as_deref()
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string);
                mapping.assign(spec.name, header);
            }
        }
        Ok(mapping)
    }

    /// 校验必填字段
    ///
    /// # 返回
    /// - Err(MissingRequiredField): 未映射或映射的表头不在文件中的必填字段列表
    fn validate(&self, headers: &[String]) -> ImportResult<()> {
        let missing: Vec<String> = Self::field_specs()
            .iter()
            .filter(|spec| spec.required)
            .filter(|spec| match self.header_for(spec.name) {
                Some(header) => !headers.iter().any(|h| h == header),
                None => true,
            })
            .map(|spec| spec.name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ImportError::MissingRequiredField(missing))
        }
    }

    /// 以 `{field: header}` 形式导出（用于预览接口）
    fn to_map(&self) -> HashMap<&'static str, Option<String>> {
        Self::field_specs()
            .iter()
            .map(|spec| (spec.name, self.header_for(spec.name).map(str::to_string)))
            .collect()
    }
}

// ==========================================
// 仓库库存映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StockColumnMapping {
    pub code: Option<String>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub price: Option<String>,
    pub quantity: Option<String>,
}

const CODE_SYNONYMS: &[&str] = &["код", "code", "артикул", "id"];
const NAME_SYNONYMS: &[&str] = &["наименование", "название", "name", "материал"];
const UNIT_SYNONYMS: &[&str] = &["ед.изм", "ед. изм", "единица", "unit"];
const PRICE_SYNONYMS: &[&str] = &["цена", "price", "стоимость", "сумма"];
const QUANTITY_SYNONYMS: &[&str] = &["остаток", "количество", "кол-во", "qty", "stock"];

const STOCK_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("code", true, CODE_SYNONYMS),
    FieldSpec::new("name", true, NAME_SYNONYMS),
    FieldSpec::new("unit", false, UNIT_SYNONYMS),
    FieldSpec::new("price", false, PRICE_SYNONYMS),
    FieldSpec::new("quantity", true, QUANTITY_SYNONYMS),
];

impl ColumnMapping for StockColumnMapping {
    const SOURCE: SourceType = SourceType::WarehouseStock;

    fn field_specs() -> &'static [FieldSpec] {
        STOCK_FIELDS
    }

    fn header_for(&self, field: &str) -> Option<&str> {
        match field {
            "code" => self.code.as_deref(),
            "name" => self.name.as_deref(),
            "unit" => self.unit.as_deref(),
            "price" => self.price.as_deref(),
            "quantity" => self.quantity.as_deref(),
            _ => None,
        }
    }

    fn assign(&mut self, field: &str, header: Option<String>) {
        match field {
            "code" => self.code = header,
            "name" => self.name = header,
            "unit" => self.unit = header,
            "price" => self.price = header,
            "quantity" => self.quantity = header,
            _ => {}
        }
    }
}

// ==========================================
// 物料目录映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterialCatalogColumnMapping {
    pub code: Option<String>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub price: Option<String>,
    pub quantity: Option<String>,
}

const CATALOG_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("code", false, CODE_SYNONYMS),
    FieldSpec::new("name", true, NAME_SYNONYMS),
    FieldSpec::new("unit", false, UNIT_SYNONYMS),
    FieldSpec::new("price", false, PRICE_SYNONYMS),
    FieldSpec::new("quantity", false, QUANTITY_SYNONYMS),
];

impl ColumnMapping for MaterialCatalogColumnMapping {
    const SOURCE: SourceType = SourceType::Materials;

    fn field_specs() -> &'static [FieldSpec] {
        CATALOG_FIELDS
    }

    fn header_for(&self, field: &str) -> Option<&str> {
        match field {
            "code" => self.code.as_deref(),
            "name" => self.name.as_deref(),
            "unit" => self.unit.as_deref(),
            "price" => self.price.as_deref(),
            "quantity" => self.quantity.as_deref(),
            _ => None,
        }
    }

    fn assign(&mut self, field: &str, header: Option<String>) {
        match field {
            "code" => self.code = header,
            "name" => self.name = header,
            "unit" => self.unit = header,
            "price" => self.price = header,
            "quantity" => self.quantity = header,
            _ => {}
        }
    }
}

// ==========================================
// 网络节点映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeColumnMapping {
    pub code: Option<String>,
    pub address: Option<String>,
    pub location_details: Option<String>,
    pub comm_info: Option<String>,
    pub status: Option<String>,
    pub contract_link: Option<String>,
    pub created_date: Option<String>,
}

const NODE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "code",
        required: true,
        synonyms: &["код", "code"],
        default_header: Some("Код"),
    },
    FieldSpec {
        name: "address",
        required: true,
        synonyms: &["адрес", "address"],
        default_header: Some("Адрес"),
    },
    FieldSpec {
        name: "location_details",
        required: false,
        synonyms: &["местоположение", "location"],
        default_header: Some("Местоположение"),
    },
    FieldSpec {
        name: "comm_info",
        required: false,
        synonyms: &["ком.информация", "ком. информация", "comm"],
        default_header: Some("Ком.информация"),
    },
    FieldSpec {
        name: "status",
        required: false,
        synonyms: &["статус", "status"],
        default_header: Some("Статус"),
    },
    FieldSpec {
        name: "contract_link",
        required: false,
        synonyms: &["договор", "contract"],
        default_header: Some("Договор"),
    },
    FieldSpec {
        name: "created_date",
        required: false,
        synonyms: &["дата создания", "created"],
        default_header: Some("Дата создания"),
    },
];

impl ColumnMapping for NodeColumnMapping {
    const SOURCE: SourceType = SourceType::Nodes;

    fn field_specs() -> &'static [FieldSpec] {
        NODE_FIELDS
    }

    fn header_for(&self, field: &str) -> Option<&str> {
        match field {
            "code" => self.code.as_deref(),
            "address" => self.address.as_deref(),
            "location_details" => self.location_details.as_deref(),
            "comm_info" => self.comm_info.as_deref(),
            "status" => self.status.as_deref(),
            "contract_link" => self.contract_link.as_deref(),
            "created_date" => self.created_date.as_deref(),
            _ => None,
        }
    }

    fn assign(&mut self, field: &str, header: Option<String>) {
        match field {
            "code" => self.code = header,
            "address" => self.address = header,
            "location_details" => self.location_details = header,
            "comm_info" => self.comm_info = header,
            "status" => self.status = header,
            "contract_link" => self.contract_link = header,
            "created_date" => self.created_date = header,
            _ => {}
        }
    }
}

// ==========================================
// 工单正文映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BodyColumnMapping {
    pub nid: Option<String>,
    pub number: Option<String>,
    pub body: Option<String>,
}

const BODY_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "nid",
        required: true,
        synonyms: &["zakaz_nid", "nid"],
        default_header: Some("zakaz_nid"),
    },
    FieldSpec {
        name: "number",
        required: false,
        synonyms: &["zakaz_number", "number"],
        default_header: Some("zakaz_number"),
    },
    FieldSpec {
        name: "body",
        required: true,
        synonyms: &["body"],
        default_header: Some("body"),
    },
];

impl ColumnMapping for BodyColumnMapping {
    const SOURCE: SourceType = SourceType::Body;

    fn field_specs() -> &'static [FieldSpec] {
        BODY_FIELDS
    }

    fn header_for(&self, field: &str) -> Option<&str> {
        match field {
            "nid" => self.nid.as_deref(),
            "number" => self.number.as_deref(),
            "body" => self.body.as_deref(),
            _ => None,
        }
    }

    fn assign(&mut self, field: &str, header: Option<String>) {
        match field {
            "nid" => self.nid = header,
            "number" => self.number = header,
            "body" => self.body = header,
            _ => {}
        }
    }
}

// ==========================================
// 旧系统工单映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderColumnMapping {
    pub nid: Option<String>,
    pub stage: Option<String>,
    pub order_type: Option<String>,
    pub company: Option<String>,
    pub fio: Option<String>,
    pub fio2: Option<String>,
    pub number: Option<String>,
    pub phone1: Option<String>,
    pub phone2: Option<String>,
    pub address: Option<String>,
    pub address2: Option<String>,
    pub created_at: Option<String>,
}

const ORDER_FIELDS: &[FieldSpec] = &[
    FieldSpec::legacy("nid", true, "nid"),
    FieldSpec::legacy("stage", false, "field_etap_value"),
    FieldSpec::legacy("order_type", false, "field_all_type_value"),
    FieldSpec::legacy("company", false, "field_all_company_value"),
    FieldSpec::legacy("fio", false, "field_all_fio_value"),
    FieldSpec::legacy("fio2", false, "field_all_fio2_value"),
    FieldSpec::legacy("number", false, "field_all_number_value"),
    FieldSpec::legacy("phone1", false, "field_all_phone1_value"),
    FieldSpec::legacy("phone2", false, "field_all_phone2_value"),
    FieldSpec::legacy("address", false, "field_all_adres_value"),
    FieldSpec::legacy("address2", false, "field_all_adres2_value"),
    FieldSpec::legacy("created_at", false, "node_created_at"),
];

impl ColumnMapping for OrderColumnMapping {
    const SOURCE: SourceType = SourceType::Orders;

    fn field_specs() -> &'static [FieldSpec] {
        ORDER_FIELDS
    }

    fn header_for(&self, field: &str) -> Option<&str> {
        match field {
            "nid" => self.nid.as_deref(),
            "stage" => self.stage.as_deref(),
            "order_type" => self.order_type.as_deref(),
            "company" => self.company.as_deref(),
            "fio" => self.fio.as_deref(),
            "fio2" => self.fio2.as_deref(),
            "number" => self.number.as_deref(),
            "phone1" => self.phone1.as_deref(),
            "phone2" => self.phone2.as_deref(),
            "address" => self.address.as_deref(),
            "address2" => self.address2.as_deref(),
            "created_at" => self.created_at.as_deref(),
            _ => None,
        }
    }

    fn assign(&mut self, field: &str, header: Option<String>) {
        match field {
            "nid" => self.nid = header,
            "stage" => self.stage = header,
            "order_type" => self.order_type = header,
            "company" => self.company = header,
            "fio" => self.fio = header,
            "fio2" => self.fio2 = header,
            "number" => self.number = header,
            "phone1" => self.phone1 = header,
            "phone2" => self.phone2 = header,
            "address" => self.address = header,
            "address2" => self.address2 = header,
            "created_at" => self.created_at = header,
            _ => {}
        }
    }
}

// ==========================================
// 旧系统评论映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommentColumnMapping {
    pub cid: Option<String>,
    pub nid: Option<String>,
    pub subject: Option<String>,
    pub comment: Option<String>,
    pub user_name: Option<String>,
    pub created_at: Option<String>,
}

const COMMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::legacy("cid", true, "cid"),
    FieldSpec::legacy("nid", true, "nid"),
    FieldSpec::legacy("subject", false, "subject"),
    FieldSpec::legacy("comment", false, "comment"),
    FieldSpec::legacy("user_name", false, "user_name"),
    FieldSpec::legacy("created_at", false, "created_at"),
];

impl ColumnMapping for CommentColumnMapping {
    const SOURCE: SourceType = SourceType::Comments;

    fn field_specs() -> &'static [FieldSpec] {
        COMMENT_FIELDS
    }

    fn header_for(&self, field: &str) -> Option<&str> {
        match field {
            "cid" => self.cid.as_deref(),
            "nid" => self.nid.as_deref(),
            "subject" => self.subject.as_deref(),
            "comment" => self.comment.as_deref(),
            "user_name" => self.user_name.as_deref(),
            "created_at" => self.created_at.as_deref(),
            _ => None,
        }
    }

    fn assign(&mut self, field: &str, header: Option<String>) {
        match field {
            "cid" => self.cid = header,
            "nid" => self.nid = header,
            "subject" => self.subject = header,
            "comment" => self.comment = header,
            "user_name" => self.user_name = header,
            "created_at" => self.created_at = header,
            _ => {}
        }
    }
}

// ==========================================
// 旧系统附件映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileColumnMapping {
    pub fid: Option<String>,
    pub nid: Option<String>,
    pub filename: Option<String>,
    pub filepath: Option<String>,
    pub file_url: Option<String>,
    pub filemime: Option<String>,
    pub filesize: Option<String>,
    pub description: Option<String>,
    pub uploaded_at: Option<String>,
}

const FILE_FIELDS: &[FieldSpec] = &[
    FieldSpec::legacy("fid", true, "fid"),
    FieldSpec::legacy("nid", true, "nid"),
    FieldSpec::legacy("filename", false, "filename"),
    FieldSpec::legacy("filepath", false, "filepath"),
    FieldSpec::legacy("file_url", false, "file_url"),
    FieldSpec::legacy("filemime", false, "filemime"),
    FieldSpec::legacy("filesize", false, "filesize"),
    FieldSpec::legacy("description", false, "description"),
    FieldSpec::legacy("uploaded_at", false, "uploaded_at"),
];

impl ColumnMapping for FileColumnMapping {
    const SOURCE: SourceType = SourceType::Files;

    fn field_specs() -> &'static [FieldSpec] {
        FILE_FIELDS
    }

    fn header_for(&self, field: &str) -> Option<&str> {
        match field {
            "fid" => self.fid.as_deref(),
            "nid" => self.nid.as_deref(),
            "filename" => self.filename.as_deref(),
            "filepath" => self.filepath.as_deref(),
            "file_url" => self.file_url.as_deref(),
            "filemime" => self.filemime.as_deref(),
            "filesize" => self.filesize.as_deref(),
            "description" => self.description.as_deref(),
            "uploaded_at" => self.uploaded_at.as_deref(),
            _ => None,
        }
    }

    fn assign(&mut self, field: &str, header: Option<String>) {
        match field {
            "fid" => self.fid = header,
            "nid" => self.nid = header,
            "filename" => self.filename = header,
            "filepath" => self.filepath = header,
            "file_url" => self.file_url = header,
            "filemime" => self.filemime = header,
            "filesize" => self.filesize = header,
            "description" => self.description = header,
            "uploaded_at" => self.uploaded_at = header,
            _ => {}
        }
    }
}

// ==========================================
// 旧系统用户映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserColumnMapping {
    pub uid: Option<String>,
    pub name: Option<String>,
    pub mail: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub created: Option<String>,
    pub last_access: Option<String>,
    pub access: Option<String>,
    pub last_login: Option<String>,
    pub login: Option<String>,
}

const USER_FIELDS: &[FieldSpec] = &[
    FieldSpec::legacy("uid", true, "uid"),
    FieldSpec::legacy("name", true, "name"),
    FieldSpec::legacy("mail", false, "mail"),
    FieldSpec::legacy("status", false, "status"),
    FieldSpec::legacy("created_at", false, "created_at"),
    FieldSpec::legacy("created", false, "created"),
    FieldSpec::legacy("last_access", false, "last_access"),
    FieldSpec::legacy("access", false, "access"),
    FieldSpec::legacy("last_login", false, "last_login"),
    FieldSpec::legacy("login", false, "login"),
];

impl ColumnMapping for UserColumnMapping {
    const SOURCE: SourceType = SourceType::Users;

    fn field_specs() -> &'static [FieldSpec] {
        USER_FIELDS
    }

    fn header_for(&self, field: &str) -> Option<&str> {
        match field {
            "uid" => self.uid.as_deref(),
            "name" => self.name.as_deref(),
            "mail" => self.mail.as_deref(),
            "status" => self.status.as_deref(),
            "created_at" => self.created_at.as_deref(),
            "created" => self.created.as_deref(),
            "last_access" => self.last_access.as_deref(),
            "access" => self.access.as_deref(),
            "last_login" => self.last_login.as_deref(),
            "login" => self.login.as_deref(),
            _ => None,
        }
    }

    fn assign(&mut self, field: &str, header: Option<String>) {
        match field {
            "uid" => self.uid = header,
            "name" => self.name = header,
            "mail" => self.mail = header,
            "status" => self.status = header,
            "created_at" => self.created_at = header,
            "created" => self.created = header,
            "last_access" => self.last_access = header,
            "access" => self.access = header,
            "last_login" => self.last_login = header,
            "login" => self.login = header,
            _ => {}
        }
    }
}
