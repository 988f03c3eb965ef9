use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tablekit::{config, Database, Records, Row};
use tracing::{error, info};

fn main() -> ExitCode {
    // Logs go to stderr so query output on stdout stays machine readable
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    // Parse CLI arguments: [CONFIG] [SQL...]
    let mut args = std::env::args().skip(1);
    let config_path = match args.next().map(PathBuf::from).or_else(config::default_config_path) {
        Some(path) => path,
        None => {
            eprintln!("No configuration file given and no default configuration directory.");
            return ExitCode::FAILURE;
        }
    };
    let sql = args.collect::<Vec<_>>().join(" ");

    match run(&config_path, &sql) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(config = %config_path.display(), "tablekit failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &Path, sql: &str) -> tablekit::Result<()> {
    let config = config::load_config(config_path)?;
    info!(database = %config.database.path.display(), "Starting tablekit...");

    let mut db = Database::new();
    db.connect_with_config(&config)?;

    if sql.trim().is_empty() {
        for table in db.table_names()? {
            println!("{}\t{}", table, db.count_records(&table)?);
        }
        return Ok(());
    }

    match db.get_records_using_custom_query(sql)? {
        Records::Rows(rows) => {
            for row in &rows {
                println!("{}", row_to_json(row));
            }
        }
        Records::Empty => println!("(no rows)"),
    }

    Ok(())
}

fn row_to_json(row: &Row) -> Value {
    let object: Map<String, Value> = row
        .fields
        .iter()
        .map(|f| (f.name.clone(), Value::String(f.value.clone())))
        .collect();
    Value::Object(object)
}
