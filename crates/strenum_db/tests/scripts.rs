use std::io::Write;
use strenum_db::{
    ColumnDef, DbValue, DryRun, EnumMigrator, MemoryCatalog, MigrationError, MigrationScript,
    TableName, TypeName,
};

const SCRIPT: &str = r#"
[[step]]
op = "create_enum"
name = "color"
values = ["red", "green"]

[[step]]
op = "add_value"
name = "color"
value = "blue"
before = "green"

[[step]]
op = "rename_value"
name = "color"
from = "red"
to = "crimson"

[[step]]
op = "reorder_values"
name = "color"
values = ["green"]

[[step]]
op = "int_to_enum"
table = "users"
column = "partner_type"
enum_name = "partner"
mapping = [{ label = "retail", code = 0 }, { label = "affiliate", code = 1 }]
default = "retail"
"#;

fn users_catalog() -> MemoryCatalog {
    let users = TableName::new("users");
    let mut catalog = MemoryCatalog::new();
    catalog
        .create_table(&users, vec![ColumnDef::integer("partner_type").with_default(0)])
        .unwrap();
    catalog
        .insert(&users, &[("partner_type", DbValue::from(1))])
        .unwrap();
    catalog
}

#[test]
fn test_script_applies_steps_in_order() {
    let script = MigrationScript::from_toml_str(SCRIPT).unwrap();
    let mut catalog = users_catalog();
    let report = EnumMigrator::new(&mut catalog).run_script(&script).unwrap();

    let counts: Vec<usize> = report.steps.iter().map(|s| s.statements).collect();
    assert_eq!(counts, vec![1, 1, 1, 1, 2]);
    assert_eq!(report.total_statements(), 6);
    assert!(report.finished_at >= report.started_at);

    assert_eq!(
        catalog.enum_labels(&TypeName::public("color")).unwrap(),
        vec!["green", "crimson", "blue"]
    );
    let users = TableName::new("users");
    assert_eq!(
        catalog.column_values(&users, "partner_type").unwrap(),
        vec![DbValue::from("affiliate")]
    );
    assert_eq!(
        catalog.column_default(&users, "partner_type").as_deref(),
        Some("'retail'::partner")
    );
}

#[test]
fn test_failing_step_is_reported_and_stops_the_run() {
    let script = MigrationScript::from_toml_str(
        r#"
        [[step]]
        op = "create_enum"
        name = "size"
        values = ["s", "m"]

        [[step]]
        op = "delete_value"
        name = "size"
        value = "xl"

        [[step]]
        op = "drop_enum"
        name = "size"
        "#,
    )
    .unwrap();
    let mut catalog = MemoryCatalog::new();

    let err = EnumMigrator::new(&mut catalog)
        .run_script(&script)
        .unwrap_err();

    match &err {
        MigrationError::Script {
            step, description, ..
        } => {
            assert_eq!(*step, 2);
            assert_eq!(description, "delete_value size.xl");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.is_precondition());
    assert!(err.to_string().contains("label \"xl\" does not exist"));
    assert!(catalog.has_type(&TypeName::public("size")));
}

#[test]
fn test_dry_run_records_plan_from_live_state() {
    let script = MigrationScript::from_toml_str(
        r#"
        schema = "shop"

        [[step]]
        op = "add_value"
        name = "color"
        value = "blue"

        [[step]]
        op = "add_value"
        name = "color"
        value = "red"
        "#,
    )
    .unwrap();

    let shop_color = TypeName::new("shop", "color");
    let mut catalog = MemoryCatalog::new();
    EnumMigrator::new(&mut catalog)
        .create_enum(&shop_color, ["red"])
        .unwrap();

    let mut migrator = EnumMigrator::new(DryRun::new(&mut catalog));
    let report = migrator.run_script(&script).unwrap();
    let planned = migrator.into_inner().into_parts().1;

    assert_eq!(
        planned,
        vec!["ALTER TYPE \"shop\".\"color\" ADD VALUE IF NOT EXISTS 'blue'"]
    );
    assert_eq!(report.steps[1].statements, 0);
    assert_eq!(catalog.enum_labels(&shop_color).unwrap(), vec!["red"]);
}

#[test]
fn test_dry_run_sees_earlier_planned_steps() {
    let script = MigrationScript::from_toml_str(SCRIPT).unwrap();
    let mut catalog = users_catalog();

    let mut migrator = EnumMigrator::new(DryRun::new(&mut catalog));
    let report = migrator.run_script(&script).unwrap();
    let dry = migrator.into_inner();

    let counts: Vec<usize> = report.steps.iter().map(|s| s.statements).collect();
    assert_eq!(counts, vec![1, 1, 1, 1, 2]);
    assert_eq!(dry.planned().len(), 6);
    assert_eq!(
        dry.planned()[1],
        "ALTER TYPE \"public\".\"color\" ADD VALUE IF NOT EXISTS 'blue' BEFORE 'green'"
    );
    assert_eq!(
        dry.overlay().enum_labels(&TypeName::public("color")).unwrap(),
        vec!["green", "crimson", "blue"]
    );

    let users = TableName::new("users");
    assert!(!catalog.has_type(&TypeName::public("color")));
    assert!(!catalog.has_type(&TypeName::public("partner")));
    assert!(catalog.executed().is_empty());
    assert_eq!(catalog.column_type(&users, "partner_type").as_deref(), Some("integer"));
    assert_eq!(
        catalog.column_values(&users, "partner_type").unwrap(),
        vec![DbValue::from(1)]
    );
}

#[test]
fn test_dry_run_reports_refusals_from_planned_state() {
    let script = MigrationScript::from_toml_str(
        r#"
        [[step]]
        op = "create_enum"
        name = "size"
        values = ["s", "m"]

        [[step]]
        op = "drop_enum"
        name = "size"

        [[step]]
        op = "add_value"
        name = "size"
        value = "l"
        "#,
    )
    .unwrap();
    let mut catalog = MemoryCatalog::new();

    let err = EnumMigrator::new(DryRun::new(&mut catalog))
        .run_script(&script)
        .unwrap_err();
    assert!(matches!(err, MigrationError::Script { step: 3, .. }));
    assert!(err.is_precondition());
    assert!(!catalog.has_type(&TypeName::public("size")));
}

#[test]
fn test_script_loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SCRIPT.as_bytes()).unwrap();

    let script = MigrationScript::load(file.path()).unwrap();
    assert_eq!(script.steps.len(), 5);

    let missing = MigrationScript::load(&file.path().with_extension("missing")).unwrap_err();
    assert!(matches!(missing, MigrationError::InvalidScript(_)));
}

#[test]
fn test_report_serializes_to_json() {
    let script = MigrationScript::from_toml_str(
        r#"
        [[step]]
        op = "create_enum"
        name = "size"
        values = ["s"]
        "#,
    )
    .unwrap();
    let report = EnumMigrator::new(MemoryCatalog::new())
        .run_script(&script)
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["steps"][0]["description"], "create_enum size");
    assert_eq!(json["steps"][0]["statements"], 1);
    assert!(json["started_at"].is_string());
}
