//! Output formatting: JSON, YAML and tables

use azscale_core::resolve::format_dtu;
use azscale_core::size::bytes_to_human;
use azscale_core::{PoolCatalog, SkuCatalog};
use comfy_table::Table;
use serde::Serialize;
use serde_json::Value;

use crate::cli;
use crate::error::Result as CliResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Table,
}

impl OutputFormat {
    /// Structured format for a global `-o` value; `None` means human text
    pub fn structured(format: cli::OutputFormat) -> Option<Self> {
        match format {
            cli::OutputFormat::Json => Some(OutputFormat::Json),
            cli::OutputFormat::Yaml => Some(OutputFormat::Yaml),
            cli::OutputFormat::Table => Some(OutputFormat::Table),
            cli::OutputFormat::Auto => None,
        }
    }
}

pub fn print_output<T: Serialize>(data: T, format: OutputFormat) -> CliResult<()> {
    let json_value = serde_json::to_value(data)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json_value)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(&json_value)?);
        }
        OutputFormat::Table => {
            println!("{}", value_table(&json_value));
        }
    }

    Ok(())
}

/// Generic table for arbitrary JSON: arrays of objects get one column per
/// key, objects become key/value rows
fn value_table(value: &Value) -> String {
    match value {
        Value::Array(arr) if !arr.is_empty() => {
            let mut table = Table::new();

            if let Value::Object(first) = &arr[0] {
                let headers: Vec<String> = first.keys().cloned().collect();
                table.set_header(&headers);

                for item in arr {
                    if let Value::Object(obj) = item {
                        let row: Vec<String> = headers
                            .iter()
                            .map(|h| format_value(obj.get(h).unwrap_or(&Value::Null)))
                            .collect();
                        table.add_row(row);
                    }
                }
            } else {
                table.set_header(vec!["Value"]);
                for item in arr {
                    table.add_row(vec![format_value(item)]);
                }
            }

            table.to_string()
        }
        Value::Object(obj) => {
            let mut table = Table::new();
            table.set_header(vec!["Key", "Value"]);

            for (key, val) in obj {
                table.add_row(vec![key.clone(), format_value(val)]);
            }

            table.to_string()
        }
        _ => format_value(value),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(","),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Selectable plan SKUs, one row per SKU in catalog order
pub fn sku_table(catalog: &SkuCatalog) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "SKU_NAME",
        "TIER",
        "MIN_WORKERS",
        "MAX_WORKERS",
        "DEFAULT_WORKERS",
    ]);
    for option in catalog.options() {
        table.add_row(vec![
            option.name().to_string(),
            or_dash(option.sku.tier.as_deref()),
            or_dash(option.bounds.minimum),
            or_dash(option.bounds.maximum),
            or_dash(option.bounds.default),
        ]);
    }
    table
}

/// Pool options sorted by tier, then eDTU
pub fn pool_option_table(catalog: &PoolCatalog) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["TIER", "DTU", "SKU_NAME", "DB_MAX_VALUES", "MAX_POOL_SIZE"]);
    for option in catalog.sorted() {
        let max_values = if option.per_unit_max_values.is_empty() {
            "-".to_string()
        } else {
            option
                .per_unit_max_values
                .iter()
                .map(|v| format_dtu(*v))
                .collect::<Vec<_>>()
                .join(",")
        };
        table.add_row(vec![
            option.tier.to_string(),
            option.capacity_units.to_string(),
            option.sku_name.clone(),
            max_values,
            bytes_to_human(option.pool_max_bytes),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sku_table_layout() {
        let catalog = SkuCatalog::from_response(&json!({"value": [
            {"sku": {"name": "S1", "tier": "Standard"}, "capacity": {"minimum": 1, "maximum": 10, "default": 1}},
            {"sku": {"name": "P1v3", "tier": "PremiumV3"}}
        ]}));
        let rendered = sku_table(&catalog).to_string();

        assert!(rendered.contains("DEFAULT_WORKERS"));
        assert!(rendered.contains("S1"));
        assert!(rendered.contains("PremiumV3"));
        let p1v3_line = rendered.lines().find(|l| l.contains("P1v3")).unwrap();
        assert_eq!(p1v3_line.matches('-').count(), 3);
    }

    #[test]
    fn test_pool_table_sorted_by_tier_then_dtu() {
        let capabilities = json!({"supportedElasticPoolEditions": [
            {"name": "Standard", "supportedElasticPoolPerformanceLevels": [
                {"performanceLevel": {"value": 100},
                 "supportedPerDatabaseMaxPerformanceLevels": [{"limit": 10}, {"limit": 100}]},
                {"performanceLevel": {"value": 50}}
            ]},
            {"name": "Basic", "supportedElasticPoolPerformanceLevels": [
                {"performanceLevel": {"value": 100}}
            ]}
        ]});
        let catalog = PoolCatalog::from_capabilities(&capabilities);
        let rendered = pool_option_table(&catalog).to_string();

        let rows: Vec<&str> = rendered
            .lines()
            .filter(|l| l.contains("Pool"))
            .collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].contains("BasicPool"));
        assert!(rows[1].contains("StandardPool") && rows[1].contains(" 50 "));
        assert!(rows[2].contains("10,100"));
    }

    #[test]
    fn test_value_table_for_objects() {
        let rendered = value_table(&json!({"outcome": "no_change", "detail": null}));
        assert!(rendered.contains("outcome"));
        assert!(rendered.contains("no_change"));
    }
}
