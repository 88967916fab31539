//! `strenum compile`: compile enum declarations and list the generated members.
//!
//! Declarations are TOML:
//!
//! ```toml
//! [[model]]
//! name = "Product"
//!
//! [[model.enum]]
//! attribute = "status"
//! values = ["active", "archived"]
//! scopes = "singular"
//! ```

use crate::cli::config::LoadedConfig;
use crate::cli::error::HelpfulError;
use crate::cli::output::{print_json, print_table};
use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strenum_definition::{
    CapabilitySet, ClassMember, Constant, EnumRegistry, EnumSpec, InstanceMember, LocaleCatalog,
    ModelDescriptor,
};
use tracing::info;

#[derive(Debug, Args)]
pub struct CompileArgs {
    /// Declarations file (TOML)
    pub file: PathBuf,

    /// Locale file for labels (repeatable; later files win)
    #[arg(short = 'l', long = "locale-file")]
    pub locale_files: Vec<PathBuf>,

    /// Locale to read from the locale files (default: config or "en")
    #[arg(long)]
    pub locale: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Persistence layer a model is backed by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    ActiveRecord,
    Plain,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDeclaration {
    pub name: String,
    #[serde(default)]
    pub kind: ModelKind,
    /// Hierarchy root for label lookup
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub reserved_instance_methods: Vec<String>,
    #[serde(default)]
    pub reserved_class_methods: Vec<String>,
    #[serde(default)]
    pub reserved_constants: Vec<String>,
    #[serde(default, rename = "enum")]
    pub enums: Vec<EnumSpec>,
}

impl ModelDeclaration {
    fn descriptor(&self) -> ModelDescriptor {
        let descriptor = match self.kind {
            ModelKind::ActiveRecord => ModelDescriptor::active_record(self.name.clone()),
            ModelKind::Plain => ModelDescriptor::plain(self.name.clone()),
        }
        .with_instance_methods(self.reserved_instance_methods.iter().cloned())
        .with_class_methods(self.reserved_class_methods.iter().cloned())
        .with_constants(self.reserved_constants.iter().cloned());

        match &self.base {
            Some(base) => descriptor.with_base(base.clone()),
            None => descriptor,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarationFile {
    #[serde(default, rename = "model")]
    pub models: Vec<ModelDeclaration>,
}

impl DeclarationFile {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HelpfulError::file_not_found(path).into());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| HelpfulError::cannot_read_file(path, e.to_string()))?;
        Self::parse(&text).map_err(|e| {
            HelpfulError::cannot_read_file(path, e.to_string())
                .with_suggestion("TRY: Declare models as [[model]] tables with [[model.enum]] entries")
                .into()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledMember {
    pub name: String,
    pub kind: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledEnum {
    pub attribute: String,
    pub values: Vec<String>,
    pub i18n_scope: String,
    pub instance_members: Vec<CompiledMember>,
    pub class_members: Vec<CompiledMember>,
    pub constants: Vec<CompiledMember>,
    /// `(value, label)` in declared order
    pub labels: Vec<(String, String)>,
    pub advisories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledModel {
    pub model: String,
    pub enums: Vec<CompiledEnum>,
}

fn instance_member(name: &str, member: &InstanceMember) -> CompiledMember {
    let (kind, detail) = match member {
        InstanceMember::Predicate(p) => ("predicate", format!("{} == {:?}", p.attribute(), p.value())),
        InstanceMember::Updater(u) => ("updater", format!("{} = {:?}", u.attribute(), u.value())),
        InstanceMember::Label(l) => ("label", format!("label of {}", l.attribute())),
        InstanceMember::LabelOf(l) => ("label_of", format!("label of any {} value", l.attribute())),
    };
    CompiledMember {
        name: name.to_string(),
        kind,
        detail,
    }
}

fn class_member(name: &str, member: &ClassMember) -> CompiledMember {
    let (kind, detail) = match member {
        ClassMember::Scope(s) => ("scope", format!("where {} = {:?}", s.attribute(), s.value())),
        ClassMember::LabelFor(l) => ("label_for", format!("label of any {} value", l.attribute())),
        ClassMember::Labels(l) => ("labels", format!("all {} labels", l.attribute())),
    };
    CompiledMember {
        name: name.to_string(),
        kind,
        detail,
    }
}

fn constant(name: &str, constant: &Constant) -> CompiledMember {
    let (kind, detail) = match constant {
        Constant::Value(v) => ("value", format!("{:?}", v)),
        Constant::Values(vs) => ("values", format!("{:?}", vs)),
    };
    CompiledMember {
        name: name.to_string(),
        kind,
        detail,
    }
}

fn summarize(set: &CapabilitySet, catalog: &LocaleCatalog) -> CompiledEnum {
    CompiledEnum {
        attribute: set.attribute().to_string(),
        values: set.values().to_vec(),
        i18n_scope: set.label_set().scope().to_string(),
        instance_members: set
            .instance_members()
            .map(|(name, m)| instance_member(name, m))
            .collect(),
        class_members: set
            .class_members()
            .map(|(name, m)| class_member(name, m))
            .collect(),
        constants: set.constants().map(|(name, c)| constant(name, c)).collect(),
        labels: set
            .label_set()
            .labels(catalog)
            .iter()
            .map(|(v, l)| (v.to_string(), l.to_string()))
            .collect(),
        advisories: set.advisories().to_vec(),
    }
}

/// Compile every model. The first rejected declaration fails the run.
pub fn compile_declarations(
    file: &DeclarationFile,
    catalog: &LocaleCatalog,
) -> Result<Vec<CompiledModel>> {
    let mut compiled = Vec::with_capacity(file.models.len());
    for model in &file.models {
        let mut registry = EnumRegistry::new(model.descriptor());
        for spec in &model.enums {
            registry.declare(spec.clone()).map_err(|e| {
                HelpfulError::declaration_failed(&model.name, &spec.attribute, &e)
            })?;
        }
        info!(model = %model.name, enums = registry.enums().len(), "Compiled model");
        compiled.push(CompiledModel {
            model: model.name.clone(),
            enums: registry.enums().iter().map(|set| summarize(set, catalog)).collect(),
        });
    }
    Ok(compiled)
}

/// Merge locale files in order; later files win.
pub fn load_locales(paths: &[PathBuf], locale: &str) -> Result<LocaleCatalog> {
    let mut catalog = LocaleCatalog::new();
    for path in paths {
        if !path.exists() {
            return Err(HelpfulError::file_not_found(path).into());
        }
        let loaded = LocaleCatalog::load(path, locale)
            .map_err(|e| HelpfulError::cannot_read_file(path, e.to_string()))?;
        catalog.merge(loaded);
    }
    Ok(catalog)
}

pub fn run(args: CompileArgs, loaded: &LoadedConfig) -> Result<()> {
    let declarations = DeclarationFile::load(&args.file)?;

    let locale = args
        .locale
        .clone()
        .unwrap_or_else(|| loaded.config.locales.locale.clone());
    let mut locale_paths = loaded.locale_paths();
    locale_paths.extend(args.locale_files.iter().cloned());
    let catalog = load_locales(&locale_paths, &locale)?;

    let compiled = compile_declarations(&declarations, &catalog)?;

    if args.json {
        return print_json(&serde_json::json!({ "models": compiled }));
    }

    for model in &compiled {
        println!("{}", model.model);
        for compiled_enum in &model.enums {
            println!(
                "  enum {} [{}] (labels: {})",
                compiled_enum.attribute,
                compiled_enum.values.join(", "),
                compiled_enum.i18n_scope
            );
            let rows = compiled_enum
                .instance_members
                .iter()
                .map(|m| ("instance", m))
                .chain(compiled_enum.class_members.iter().map(|m| ("class", m)))
                .chain(compiled_enum.constants.iter().map(|m| ("constant", m)))
                .map(|(on, m)| vec![on.to_string(), m.name.clone(), m.kind.to_string(), m.detail.clone()])
                .collect();
            print_table(&["On", "Member", "Kind", "Detail"], rows);

            let label_rows = compiled_enum
                .labels
                .iter()
                .map(|(value, label)| vec![value.clone(), label.clone()])
                .collect();
            print_table(&["Value", "Label"], label_rows);

            for advisory in &compiled_enum.advisories {
                println!("  note: {}", advisory);
            }
        }
        println!();
    }
    Ok(())
}
