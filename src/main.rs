use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};

use geojson_importer::db::DbConfig;
use geojson_importer::{
    analyze_file, deciles, import_file, init_schema, reproject, split_file, validator,
    ImportRequest, ImportVariant, TableMapping,
};

fn file_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn cli() -> Command {
    Command::new("geojson-importer")
        .version("0.1")
        .about("Loads GeoJSON feature collections into PostGIS and inspects them")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("analyze")
                .about("Report feature count, geometry types and suggested column types")
                .arg(file_arg("file", "GeoJSON file to analyze")),
        )
        .subcommand(
            Command::new("validate")
                .about("Check that a file is a GeoJSON FeatureCollection")
                .arg(file_arg("file", "File to check")),
        )
        .subcommand(
            Command::new("split")
                .about("Write one GeoJSON file per value of a property")
                .arg(file_arg("file", "GeoJSON file to split"))
                .arg(
                    Arg::new("property")
                        .short('p')
                        .long("property")
                        .default_value("County")
                        .help("Property to group features by"),
                )
                .arg(
                    Arg::new("out-dir")
                        .short('o')
                        .long("out-dir")
                        .default_value(".")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory for the per-group files"),
                ),
        )
        .subcommand(
            Command::new("reproject")
                .about("Transform every geometry to another coordinate reference system")
                .arg(file_arg("input", "GeoJSON file to read"))
                .arg(
                    Arg::new("output")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("GeoJSON file to write"),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .help("Source CRS (defaults to the CRS declared in the file)"),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .default_value(reproject::DEFAULT_TARGET_CRS)
                        .help("Target CRS"),
                ),
        )
        .subcommand(Command::new("deciles").about("Print the decile weighting table"))
        .subcommand(
            Command::new("import")
                .about("Insert or update one row per feature")
                .arg(
                    Arg::new("variant")
                        .required(true)
                        .value_parser(ImportVariant::NAMES)
                        .help("Which table and write mode to use"),
                )
                .arg(file_arg("file", "GeoJSON file to import"))
                .arg(
                    Arg::new("mapping")
                        .short('m')
                        .long("mapping")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON mapping file replacing the built-in column mapping"),
                )
                .arg(
                    Arg::new("municipality")
                        .long("municipality")
                        .help("Parent name (defaults to the first token of the file name)"),
                ),
        )
        .subcommand(Command::new("init-schema").about("Create the target tables if missing"))
}

fn path<'a>(matches: &'a ArgMatches, name: &str) -> &'a Path {
    matches
        .get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new(""))
}

// Fail early on missing input, before any connection is opened
fn require_file(file: &Path) {
    if !file.exists() {
        eprintln!("Error: File not found: {}", file.display());
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> geojson_importer::Result<()> {
    match matches.subcommand() {
        Some(("analyze", sub)) => {
            let file = path(sub, "file");
            require_file(file);
            match analyze_file(file)? {
                Some(analysis) => {
                    println!("File analysis: {}", file.display());
                    print!("{analysis}");
                }
                None => println!("No features found in the file."),
            }
        }
        Some(("validate", sub)) => {
            let file = path(sub, "file");
            require_file(file);
            if validator::validate_file(file)? {
                println!("This is a valid GeoJSON file.");
            } else {
                println!("This is NOT a valid GeoJSON file.");
            }
        }
        Some(("split", sub)) => {
            let file = path(sub, "file");
            require_file(file);
            let property = sub
                .get_one::<String>("property")
                .map(String::as_str)
                .unwrap_or("County");
            for group in split_file(file, property, path(sub, "out-dir"))? {
                println!(
                    "Saved {} with {} features.",
                    group.path.display(),
                    group.feature_count
                );
            }
        }
        Some(("reproject", sub)) => {
            let input = path(sub, "input");
            require_file(input);
            let output = path(sub, "output");
            let from = sub.get_one::<String>("from").map(String::as_str);
            let to = sub
                .get_one::<String>("to")
                .map(String::as_str)
                .unwrap_or(reproject::DEFAULT_TARGET_CRS);
            let count = reproject::reproject_file(input, output, from, to)?;
            println!("Wrote {} features to {}", count, output.display());
        }
        Some(("deciles", _)) => {
            for line in deciles::decile_report() {
                println!("{line}");
            }
        }
        Some(("import", sub)) => {
            let file = path(sub, "file");
            require_file(file);
            let mapping = match sub.get_one::<PathBuf>("mapping") {
                Some(mapping_file) => TableMapping::from_file(mapping_file)?,
                None => sub
                    .get_one::<String>("variant")
                    .and_then(|name| ImportVariant::from_name(name))
                    .map(ImportVariant::mapping)
                    .ok_or_else(|| {
                        geojson_importer::ImportError::Config("unknown import variant".to_string())
                    })?,
            };

            let mut request = ImportRequest::new(file.to_path_buf(), mapping);
            request.parent_name = sub.get_one::<String>("municipality").cloned();

            let db = DbConfig::from_env()?;
            let summary = import_file(&request, &db)?;
            println!("{summary}");
            println!("{}", summary.confirmation(file));
        }
        Some(("init-schema", _)) => {
            let db = DbConfig::from_env()?;
            init_schema(&db)?;
            println!("Schema is ready.");
        }
        _ => unreachable!("subcommand_required is set"),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();

    if let Err(e) = run(&matches) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
