//! `strenum inspect`: show an enum type's labels and the columns using it.

use crate::cli::config::LoadedConfig;
use crate::cli::error::HelpfulError;
use crate::cli::output::{or_dash, print_json, print_table};
use anyhow::Result;
use clap::Args;
use strenum_db::{EnumMigrator, EnumType, MigrationError, PgExecutor, SqlExecutor, TypeName, DEFAULT_SCHEMA};

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Enum type, optionally schema-qualified (`shop.color`)
    pub type_name: String,

    /// Schema for an unqualified type name
    #[arg(long)]
    pub schema: Option<String>,

    /// PostgreSQL connection URL
    #[arg(long, env = "STRENUM_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl InspectArgs {
    fn resolve_type(&self, loaded: &LoadedConfig) -> TypeName {
        let schema = self
            .schema
            .as_deref()
            .or(loaded.default_schema())
            .unwrap_or(DEFAULT_SCHEMA);
        TypeName::parse(&self.type_name, schema)
    }
}

pub fn describe_with<E: SqlExecutor>(executor: E, type_name: &TypeName) -> Result<EnumType, MigrationError> {
    EnumMigrator::new(executor).describe(type_name)
}

pub fn run(args: InspectArgs, loaded: &LoadedConfig) -> Result<()> {
    let type_name = args.resolve_type(loaded);
    let url = loaded.database_url(args.database_url.as_deref())?;
    let context = format!("While inspecting {}", type_name);

    let mut executor = PgExecutor::connect(&url)
        .map_err(|e| HelpfulError::migration_failed(&MigrationError::from(e), context.clone()))?;
    let described = describe_with(&mut executor, &type_name)
        .map_err(|e| HelpfulError::migration_failed(&e, context.clone()))?;
    executor
        .close()
        .map_err(|e| HelpfulError::migration_failed(&MigrationError::from(e), context))?;

    if args.json {
        return print_json(&described);
    }
    print_enum_type(&described);
    Ok(())
}

fn print_enum_type(described: &EnumType) {
    println!("{}", described.type_name);
    let rows = described
        .labels
        .iter()
        .enumerate()
        .map(|(idx, l)| vec![(idx + 1).to_string(), l.label.clone(), l.sort_order.to_string()])
        .collect();
    print_table(&["#", "Label", "Sort key"], rows);

    if described.dependents.is_empty() {
        println!("No columns use this type");
        return;
    }
    let rows = described
        .dependents
        .iter()
        .map(|d| vec![d.to_string(), or_dash(d.default.as_deref())])
        .collect();
    print_table(&["Column", "Default"], rows);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::parse_config;
    use strenum_db::{ColumnDef, MemoryCatalog, TableName};

    fn args(type_name: &str, schema: Option<&str>) -> InspectArgs {
        InspectArgs {
            type_name: type_name.to_string(),
            schema: schema.map(str::to_string),
            database_url: None,
            json: false,
        }
    }

    #[test]
    fn test_resolve_type_precedence() {
        let loaded = LoadedConfig {
            config: parse_config("[migrate]\ndefault_schema = \"shop\"").unwrap(),
            source: None,
        };
        assert_eq!(args("color", None).resolve_type(&loaded), TypeName::new("shop", "color"));
        assert_eq!(
            args("color", Some("billing")).resolve_type(&loaded),
            TypeName::new("billing", "color")
        );
        assert_eq!(
            args("crm.color", Some("billing")).resolve_type(&loaded),
            TypeName::new("crm", "color")
        );
        assert_eq!(
            args("color", None).resolve_type(&LoadedConfig::default()),
            TypeName::public("color")
        );
    }

    #[test]
    fn test_describe_lists_labels_and_dependents() {
        let color = TypeName::public("color");
        let products = TableName::new("products");
        let mut catalog = MemoryCatalog::new();
        EnumMigrator::new(&mut catalog)
            .create_enum(&color, ["red", "green"])
            .unwrap();
        catalog
            .create_table(&products, vec![ColumnDef::enumerated("color", color.clone())])
            .unwrap();

        let described = describe_with(&mut catalog, &color).unwrap();
        assert_eq!(described.label_names(), vec!["red", "green"]);
        assert_eq!(described.dependents.len(), 1);
        assert_eq!(described.dependents[0].to_string(), "public.products.color");
    }

    #[test]
    fn test_describe_missing_type() {
        let err = describe_with(MemoryCatalog::new(), &TypeName::public("color")).unwrap_err();
        assert!(err.is_precondition());
    }
}
