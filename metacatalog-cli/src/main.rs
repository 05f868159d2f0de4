use clap::{Parser, Subcommand, ValueEnum};
use metacatalog::{Catalog, Config, Document, EntityHandle};
use std::path::{Path, PathBuf};
use std::process;

/// metacatalog CLI — administer a metadata catalog from the command line
#[derive(Parser)]
#[command(name = "metacatalog", version, about)]
struct Cli {
    /// Path to a config YAML file (default: $METACATALOG_CONFIG, then built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Get a single document by ID
    Get {
        /// Entity name or route (e.g. study or studies)
        entity: String,
        /// Document ID
        id: String,
        /// Replace references with the referenced documents
        #[arg(long)]
        embedded: bool,
    },

    /// List document IDs of an entity type
    List {
        /// Entity name or route
        entity: String,
        /// Print full documents instead of IDs
        #[arg(long)]
        documents: bool,
    },

    /// Add a new document
    Add {
        /// Entity name or route
        entity: String,
        /// Document as a JSON object
        #[arg(long)]
        json: Option<String>,
        /// Field values (e.g. --field title="Test Study")
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Update fields of an existing document
    Update {
        /// Entity name or route
        entity: String,
        /// Document ID
        id: String,
        /// Partial document as a JSON object
        #[arg(long)]
        json: Option<String>,
        /// Field values to update (e.g. --field title="Modified")
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Load fixture files (<route>.json holding {"<route>": [...]}) from a directory
    Load {
        /// Directory holding the fixture files
        dir: PathBuf,
    },

    /// Delete all documents and reset ID counters
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show document counts per entity type
    Status,

    /// Show the entity schema
    Schema,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| {
        format!("Invalid key=value pair: no '=' found in '{s}'")
    })?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(cli.config.as_deref())?;
    let catalog = Catalog::open(&config)?;

    match cli.command {
        Command::Get {
            entity,
            id,
            embedded,
        } => {
            let doc = resolve_entity(&catalog, &entity)?.get(&id, embedded)?;
            print_output(&doc.into_value(), &cli.format)?;
        }

        Command::List { entity, documents } => {
            let handle = resolve_entity(&catalog, &entity)?;
            let value = if documents {
                serde_json::to_value(handle.list_documents()?)?
            } else {
                serde_json::to_value(handle.list()?)?
            };
            print_output(&value, &cli.format)?;
        }

        Command::Add {
            entity,
            json,
            fields,
        } => {
            let document = build_document(json.as_deref(), &fields)?;
            let added = resolve_entity(&catalog, &entity)?.add(document)?;
            print_output(&added.into_value(), &cli.format)?;
        }

        Command::Update {
            entity,
            id,
            json,
            fields,
        } => {
            let partial = build_document(json.as_deref(), &fields)?;
            let updated = resolve_entity(&catalog, &entity)?.update(&id, partial)?;
            print_output(&updated.into_value(), &cli.format)?;
        }

        Command::Load { dir } => {
            let loaded = load_dir(&catalog, &dir)?;
            print_output(&loaded, &cli.format)?;
        }

        Command::Reset { yes } => {
            if !yes {
                return Err("refusing to delete all records without --yes".into());
            }
            let removed = catalog.reset()?;
            print_output(&serde_json::json!({ "ok": true, "deleted": removed }), &cli.format)?;
        }

        Command::Status => {
            let result = catalog.status()?;
            print_output(&result, &cli.format)?;
        }

        Command::Schema => {
            let entities: Vec<_> = catalog
                .registry()
                .entities()
                .iter()
                .map(|entity| {
                    serde_json::json!({
                        "name": entity.name,
                        "title": entity.title,
                        "collection": entity.collection,
                        "route": entity.route,
                        "prefix": entity.prefix,
                        "references": entity.references.iter().map(|r| serde_json::json!({
                            "field": r.field,
                            "target": r.target,
                            "many": r.many,
                        })).collect::<Vec<_>>(),
                    })
                })
                .collect();
            print_output(&serde_json::json!({ "entities": entities }), &cli.format)?;
        }
    }

    Ok(())
}

/// Accept either an entity name or its route segment
fn resolve_entity<'a>(catalog: &'a Catalog, name: &str) -> metacatalog::Result<EntityHandle<'a>> {
    match catalog.route(name) {
        Some(handle) => Ok(handle),
        None => catalog.entity(name),
    }
}

fn build_document(
    json: Option<&str>,
    fields: &[(String, String)],
) -> Result<Document, Box<dyn std::error::Error>> {
    let mut document = match json {
        Some(json) => Document::from_value(serde_json::from_str(json)?)?,
        None => Document::new(),
    };
    for (key, val) in fields {
        // Try to parse as JSON value (for numbers, booleans, arrays, objects)
        let json_val = serde_json::from_str(val).unwrap_or(serde_json::Value::String(val.clone()));
        document.insert(key.clone(), json_val);
    }
    Ok(document)
}

/// Load every `<route>.json` fixture found in `dir`. Returns the IDs
/// assigned per entity type.
fn load_dir(catalog: &Catalog, dir: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("Fixture directory not found: {}", dir.display()).into());
    }

    let mut loaded = serde_json::Map::new();
    for entity in catalog.registry().entities() {
        let path = dir.join(format!("{}.json", entity.route));
        if !path.exists() {
            continue;
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read fixture file '{}': {e}", path.display()))?;
        let mut fixture: serde_json::Value = serde_json::from_str(&content)?;
        let records = match fixture.get_mut(entity.route.as_str()).map(serde_json::Value::take) {
            Some(serde_json::Value::Array(records)) => records,
            _ => {
                return Err(format!(
                    "Fixture '{}' must hold a '{}' list",
                    path.display(),
                    entity.route
                )
                .into())
            }
        };

        let documents = records
            .into_iter()
            .map(Document::from_value)
            .collect::<metacatalog::Result<Vec<_>>>()?;
        let ids = catalog.entity(&entity.name)?.load(documents)?;
        log::info!("Loaded {} {} records", ids.len(), entity.title);
        loaded.insert(entity.name.clone(), serde_json::json!(ids));
    }

    Ok(serde_json::Value::Object(loaded))
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(value)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("title=A=B").unwrap(),
            ("title".to_string(), "A=B".to_string())
        );
        assert!(parse_key_value("title").is_err());
    }

    #[test]
    fn test_build_document() {
        let doc = build_document(
            Some(r#"{"id": "FILE:1", "size": "1"}"#),
            &[
                ("size".into(), "42".into()),
                ("name".into(), "reads.bam".into()),
            ],
        )
        .unwrap();
        assert_eq!(
            doc.into_value(),
            json!({"id": "FILE:1", "size": 42, "name": "reads.bam"})
        );

        assert!(build_document(Some("[1, 2]"), &[]).is_err());
    }

    #[test]
    fn test_resolve_entity_by_name_or_route() {
        let catalog = Catalog::open_in_memory().unwrap();
        assert_eq!(resolve_entity(&catalog, "studies").unwrap().entity_type().name, "study");
        assert_eq!(resolve_entity(&catalog, "study").unwrap().entity_type().name, "study");
        assert!(resolve_entity(&catalog, "unicorns").is_err());
    }

    #[test]
    fn test_load_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("studies.json"),
            r#"{"studies": [{"title": "A", "has_experiment": "EXP:1"}, {"title": "B"}]}"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("experiments.json"),
            r#"{"experiments": [{"id": "EXP:1", "name": "X"}]}"#,
        )
        .unwrap();

        let catalog = Catalog::open_in_memory().unwrap();
        let loaded = load_dir(&catalog, tmp.path()).unwrap();
        assert_eq!(loaded["study"], json!(["STU:0000001", "STU:0000002"]));
        assert_eq!(loaded["experiment"], json!(["EXP:1"]));

        let study = catalog.entity("study").unwrap().get("STU:0000001", true).unwrap();
        assert_eq!(study.get("has_experiment").unwrap()["name"], json!("X"));
    }

    #[test]
    fn test_load_bundled_fixtures() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures");
        let catalog = Catalog::open_in_memory().unwrap();
        load_dir(&catalog, &dir).unwrap();

        let dataset = catalog
            .entity("dataset")
            .unwrap()
            .get("DAT:0000001", true)
            .unwrap()
            .into_value();
        assert_eq!(dataset["files"][1]["format"], json!("vcf"));
        assert_eq!(dataset["has_study"]["has_experiment"]["name"], json!("WGS of Proband"));
        assert_eq!(
            dataset["has_study"]["publications"][0]["id"],
            json!("PMID:24472223")
        );
        assert_eq!(
            dataset["has_data_access_policy"]["has_data_access_committee"]["title"],
            json!("Rare Disease Data Access Committee")
        );
    }

    #[test]
    fn test_load_dir_rejects_bad_fixture() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("files.json"), r#"{"file": []}"#).unwrap();

        let catalog = Catalog::open_in_memory().unwrap();
        assert!(load_dir(&catalog, tmp.path()).is_err());
        assert!(load_dir(&catalog, &tmp.path().join("missing")).is_err());
    }
}
