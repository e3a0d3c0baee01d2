// ==========================================
// 后厨出餐引擎 - CSV 导入
// ==========================================
// 支持:
//   - 工位: station_id,name,display_order,color,active
//   - 产品-工位关联: product_id,station_id,estimated_minutes,complexity
// 流程: 读取 → 逐行校验(任一行失败则整体不写入) → 逐行 UPSERT
// ==========================================

use crate::domain::station::{Station, StationAssignment};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{AssignmentRepository, StationRepository};
use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// 导入结果汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped_blank: usize,
}

/// 一行原始数据(表头 → 值)
struct RawRow {
    line: u64,
    fields: HashMap<String, String>,
}

impl RawRow {
    fn required(&self, field: &str) -> ImportResult<&str> {
        match self.fields.get(field).map(|v| v.as_str()) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(ImportError::RequiredFieldMissing {
                row: self.line,
                field: field.to_string(),
            }),
        }
    }

    fn optional(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    fn int_in_range(&self, field: &str, raw: &str, min: i64, max: i64) -> ImportResult<i32> {
        let value = raw
            .parse::<i64>()
            .map_err(|e| ImportError::TypeConversionError {
                row: self.line,
                field: field.to_string(),
                message: format!("'{}' 不是整数: {}", raw, e),
            })?;
        if value < min || value > max {
            return Err(ImportError::ValueRangeError {
                row: self.line,
                field: field.to_string(),
                value,
                min,
                max,
            });
        }
        Ok(value as i32)
    }
}

/// 读取 CSV 为原始行,跳过完全空白的行
fn read_rows(path: &Path, required_columns: &[&str]) -> ImportResult<(Vec<RawRow>, usize)> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    if let Some(ext) = path.extension() {
        if !ext.eq_ignore_ascii_case("csv") {
            return Err(ImportError::UnsupportedFormat(ext.to_string_lossy().to_string()));
        }
    }

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // 允许行长度不一致
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    for column in required_columns {
        if !headers.iter().any(|h| h == column) {
            return Err(ImportError::MissingColumn(column.to_string()));
        }
    }

    let mut rows = Vec::new();
    let mut skipped_blank = 0usize;
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let fields: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.trim().to_string()))
            .collect();

        if fields.values().all(|v| v.is_empty()) {
            skipped_blank += 1;
            continue;
        }
        rows.push(RawRow { line, fields });
    }

    Ok((rows, skipped_blank))
}

fn parse_bool(row: &RawRow, field: &str, raw: Option<&str>) -> ImportResult<bool> {
    match raw.map(|v| v.to_lowercase()) {
        None => Ok(true),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "y" => Ok(true),
            "0" | "false" | "no" | "n" => Ok(false),
            _ => Err(ImportError::TypeConversionError {
                row: row.line,
                field: field.to_string(),
                message: format!("'{}' 不是布尔值", v),
            }),
        },
    }
}

// ==========================================
// StationCsvImporter - 工位导入
// ==========================================
pub struct StationCsvImporter {
    repo: Arc<StationRepository>,
}

impl StationCsvImporter {
    pub fn new(repo: Arc<StationRepository>) -> Self {
        Self { repo }
    }

    /// 导入工位
    ///
    /// 列: station_id(必填), name(必填), display_order(默认0), color(默认 #808080), active(默认 true)
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn import_file<P: AsRef<Path>>(&self, path: P) -> ImportResult<ImportSummary> {
        let (rows, skipped_blank) = read_rows(path.as_ref(), &["station_id", "name"])?;

        let stations = rows
            .iter()
            .map(|row| {
                let display_order = match row.optional("display_order") {
                    Some(raw) => row.int_in_range("display_order", raw, -10_000, 10_000)?,
                    None => 0,
                };
                Ok((
                    row.line,
                    Station {
                        station_id: row.required("station_id")?.to_string(),
                        name: row.required("name")?.to_string(),
                        display_order,
                        color: row.optional("color").unwrap_or("#808080").to_string(),
                        active: parse_bool(row, "active", row.optional("active"))?,
                    },
                ))
            })
            .collect::<ImportResult<Vec<_>>>()?;

        for (line, station) in &stations {
            self.repo
                .upsert(station)
                .map_err(|e| ImportError::from_repository(*line, e))?;
        }

        tracing::info!(imported = stations.len(), skipped_blank, "工位导入完成");
        Ok(ImportSummary {
            imported: stations.len(),
            skipped_blank,
        })
    }
}

// ==========================================
// AssignmentCsvImporter - 产品-工位关联导入
// ==========================================
pub struct AssignmentCsvImporter {
    repo: Arc<AssignmentRepository>,
}

impl AssignmentCsvImporter {
    pub fn new(repo: Arc<AssignmentRepository>) -> Self {
        Self { repo }
    }

    /// 导入产品-工位关联
    ///
    /// 列: product_id(必填), station_id(必填), estimated_minutes(0-600), complexity(1-5,默认1)
    ///
    /// station_id 必须已存在(先导入工位)
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn import_file<P: AsRef<Path>>(&self, path: P) -> ImportResult<ImportSummary> {
        let (rows, skipped_blank) = read_rows(
            path.as_ref(),
            &["product_id", "station_id", "estimated_minutes"],
        )?;

        let assignments = rows
            .iter()
            .map(|row| {
                let estimated_minutes = row.int_in_range(
                    "estimated_minutes",
                    row.required("estimated_minutes")?,
                    0,
                    600,
                )?;
                let complexity = match row.optional("complexity") {
                    Some(raw) => row.int_in_range("complexity", raw, 1, 5)?,
                    None => 1,
                };
                Ok((
                    row.line,
                    StationAssignment {
                        product_id: row.required("product_id")?.to_string(),
                        station_id: row.required("station_id")?.to_string(),
                        estimated_minutes,
                        complexity,
                    },
                ))
            })
            .collect::<ImportResult<Vec<_>>>()?;

        for (line, assignment) in &assignments {
            self.repo
                .upsert(assignment)
                .map_err(|e| ImportError::from_repository(*line, e))?;
        }

        tracing::info!(imported = assignments.len(), skipped_blank, "产品-工位关联导入完成");
        Ok(ImportSummary {
            imported: assignments.len(),
            skipped_blank,
        })
    }
}
