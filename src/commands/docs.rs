use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap_markdown::help_markdown;
use indexmap::IndexMap;
use schemars::JsonSchema;
use schemars::schema::InstanceType;
use schemars::schema::RootSchema;
use schemars::schema::Schema;
use schemars::schema::SchemaObject;
use schemars::schema::SingleOrVec;
use schemars::schema_for;

use crate::Narzedziownik;
use crate::algorithms::renumbering::RenumberingPlan;
use crate::commands::Task;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::project::group_layer::document_layer_group_layer;
use crate::project::style_layer::document_layer_style_layer;
use crate::subcommand_def;
use crate::typed_map::fields::FieldTypeDocumentation;
use crate::typed_map::layers::LayerDocumentation;

fn list_schemas() -> Vec<LayerDocumentation> {
    vec![
        document_layer_group_layer(),
        document_layer_style_layer()
    ]
}

fn write_project_schema_docs(target: PathBuf) -> Result<(), CommandError> {
    let mut target = File::create(target)?;

    writeln!(&mut target,"# Project File Schema")?;
    writeln!(&mut target)?;
    writeln!(&mut target, r#"
The project file written by `create-templates` is a Geopackage (GPKG) file. Besides the template layers, it contains the tables described below, which have no geometry. Every table also has the `fid` identifier field added by gdal.
"#)?;

    let mut formats: IndexMap<String,FieldTypeDocumentation> = IndexMap::new();

    for schema in list_schemas() {
        writeln!(&mut target,"## Layer `{}`",schema.name)?;
        writeln!(&mut target)?;
        writeln!(&mut target,"{}",schema.description)?;
        writeln!(&mut target)?;
        for field in schema.fields {
            writeln!(&mut target,"### `{}`",field.name)?;
            writeln!(&mut target,"**field type**: {}",field.field_type.name())?;
            writeln!(&mut target)?;
            writeln!(&mut target,"{}",field.description)?;
            writeln!(&mut target)?;
            _ = formats.entry(field.field_type.name().to_owned()).or_insert(field.field_type);
        }
    }

    formats.sort_keys();

    writeln!(&mut target,"## Field Types")?;

    for (name,field_type) in formats {
        writeln!(&mut target,"### {name}")?;
        writeln!(&mut target,"**storage type**: {}",field_type.storage_type())?;
        writeln!(&mut target)?;
        writeln!(&mut target,"{}",field_type.description())?;
        writeln!(&mut target)?;
    }

    Ok(())

}

const TAB: &str = "  ";

fn instance_type_name(instance_type: InstanceType) -> &'static str {
    match instance_type {
        InstanceType::Null => "Null",
        InstanceType::Boolean => "Boolean",
        InstanceType::Object => "Object",
        InstanceType::Array => "Array",
        InstanceType::Number => "Number",
        InstanceType::String => "String",
        InstanceType::Integer => "Integer",
    }
}

fn type_description(schema: &SchemaObject) -> Option<String> {
    if let Some(reference) = &schema.reference {
        let name = reference.strip_prefix("#/definitions/").unwrap_or(reference);
        return Some(format!("[{name}](#definitions/{name})"))
    }
    schema.instance_type.as_ref().map(|instance_type| match instance_type {
        SingleOrVec::Single(instance_type) => instance_type_name(**instance_type).to_owned(),
        SingleOrVec::Vec(instance_types) => instance_types.iter().map(|instance_type| instance_type_name(*instance_type)).collect::<Vec<_>>().join(" | ")
    })
}

fn write_schema(schema: &Schema, name: Option<&str>, required: bool, level: usize, target: &mut File) -> Result<(),CommandError> {

    let Schema::Object(schema) = schema else {
        return Ok(())
    };

    let indent = TAB.repeat(level);
    write!(target,"{indent}*")?;
    if let Some(name) = name {
        write!(target," **`{name}`**")?;
    }

    let mut qualifiers: Vec<String> = type_description(schema).into_iter().collect();
    if required {
        qualifiers.push("Required".to_owned());
    }
    if !qualifiers.is_empty() {
        write!(target," *({})*",qualifiers.join(", "))?;
    }

    if let Some(description) = schema.metadata.as_ref().and_then(|metadata| metadata.description.as_ref()) {
        write!(target,": {}",description.replace('\n'," "))?;
    }
    writeln!(target)?;

    if let Some(object) = &schema.object {
        for (property,property_schema) in &object.properties {
            write_schema(property_schema, Some(property), object.required.contains(property), level + 1, target)?;
        }
        if let Some(additional) = &object.additional_properties {
            write!(target,"{indent}{TAB}* **Values**:")?;
            writeln!(target)?;
            write_schema(additional, None, false, level + 2, target)?;
        }
    }

    if let Some(items) = schema.array.as_ref().and_then(|array| array.items.as_ref()) {
        writeln!(target,"{indent}{TAB}* **Items**:")?;
        match items {
            SingleOrVec::Single(item) => write_schema(item, None, false, level + 2, target)?,
            SingleOrVec::Vec(items) => for item in items {
                write_schema(item, None, false, level + 2, target)?
            }
        }
    }

    if let Some(any_of) = schema.subschemas.as_ref().and_then(|subschemas| subschemas.any_of.as_ref()) {
        writeln!(target,"{indent}{TAB}* **Any of**")?;
        for item in any_of {
            write_schema(item, None, false, level + 2, target)?;
        }
    }

    Ok(())
}

fn write_root_schema(default_title: &str, root: &RootSchema, target: &mut File) -> Result<(),CommandError> {

    let title = root.schema.metadata.as_ref().and_then(|metadata| metadata.title.as_deref()).unwrap_or(default_title);
    writeln!(target,"# {title}")?;
    writeln!(target)?;

    if let Some(description) = root.schema.metadata.as_ref().and_then(|metadata| metadata.description.as_ref()) {
        writeln!(target,"{description}")?;
        writeln!(target)?;
    }

    if let Some(object) = &root.schema.object {
        writeln!(target,"## Properties")?;
        for (name,property_schema) in &object.properties {
            write_schema(property_schema, Some(name), object.required.contains(name), 0, target)?;
        }
    }

    if !root.definitions.is_empty() {
        writeln!(target)?;
        writeln!(target,"## Definitions")?;
        for (name,schema) in &root.definitions {
            writeln!(target,"<a id=\"definitions/{name}\"></a>")?;
            write_schema(schema, Some(name), false, 0, target)?;
        }
    }

    Ok(())

}

fn write_command_help(target: PathBuf) -> Result<(),CommandError> {
    let mut target = File::create(target)?;
    write!(&mut target,"{}",help_markdown::<Narzedziownik>())?;
    Ok(())
}

fn write_schema_docs<Document: JsonSchema>(title: &str, schema_target: PathBuf, docs_target: PathBuf) -> Result<(),CommandError> {
    let mut schema_target = File::create(schema_target)?;
    let schema = schema_for!(Document);
    write!(&mut schema_target,"{}",serde_json::to_string_pretty(&schema)?)?;
    write_root_schema(title,&schema,&mut File::create(docs_target)?)
}


subcommand_def!{
    /// Writes generated documentation and json schemas to folders
    #[command(hide=true)]
    pub struct Docs {

        #[arg(long)]
        /// The folder to output the generated documentation to
        docs: PathBuf,

        #[arg(long)]
        /// The folder to output generated schemas to
        schemas: PathBuf

    }
}

impl Task for Docs {
    fn run<Progress: ProgressObserver>(self, _: &mut Progress) -> Result<(),CommandError> {
        write_command_help(self.docs.join("Commands.md"))?;
        write_project_schema_docs(self.docs.join("Project File Schema.md"))?;

        let plan_schema = self.schemas.join("renumbering_plan.schema.json");
        let plan_docs = self.docs.join("Renumbering Plan Schema.md");
        write_schema_docs::<RenumberingPlan>("Renumbering Plan",plan_schema,plan_docs)
    }
}
